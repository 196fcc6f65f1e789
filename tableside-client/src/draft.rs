//! 本地购物车 + 会话订单映射
//!
//! Both are keyed by table id and live behind an injected
//! [`DraftRepository`]: [`MemoryDraftRepository`] for tests and kiosks,
//! [`JsonFileDraftRepository`] for devices that must survive a restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::order::{CartLineInput, CartModifier};

use crate::ClientResult;

/// Upper bound the server accepts for one line
pub const MAX_LINE_QTY: u32 = 99;

/// Modifier choice shown in the cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftModifier {
    pub group_id: String,
    pub option_ids: Vec<String>,
    /// Display only; the server prices the line at submit
    #[serde(default)]
    pub price_adjustment_cents: i64,
}

/// 购物车行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftLine {
    /// Same item + modifiers + note merge into one line
    pub key: String,
    pub item_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub qty: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<DraftModifier>,
}

impl DraftLine {
    pub fn new(
        item_id: impl Into<String>,
        name: impl Into<String>,
        unit_price_cents: i64,
        modifiers: Vec<DraftModifier>,
        note: Option<String>,
    ) -> Self {
        let item_id = item_id.into();
        let key = line_key(&item_id, &modifiers, note.as_deref());
        Self {
            key,
            item_id,
            name: name.into(),
            unit_price_cents,
            qty: 1,
            note,
            modifiers,
        }
    }

    pub fn with_qty(mut self, qty: u32) -> Self {
        self.qty = qty.clamp(1, MAX_LINE_QTY);
        self
    }

    /// Display estimate; the server's total is authoritative
    pub fn total_cents(&self) -> i64 {
        let adjustments: i64 = self.modifiers.iter().map(|m| m.price_adjustment_cents).sum();
        (self.unit_price_cents + adjustments) * i64::from(self.qty)
    }

    pub fn to_input(&self) -> CartLineInput {
        CartLineInput {
            item_id: self.item_id.clone(),
            qty: self.qty,
            note: self.note.clone(),
            modifiers: self
                .modifiers
                .iter()
                .map(|m| CartModifier {
                    group_id: m.group_id.clone(),
                    option_ids: m.option_ids.clone(),
                })
                .collect(),
        }
    }
}

fn line_key(item_id: &str, modifiers: &[DraftModifier], note: Option<&str>) -> String {
    let mut parts: Vec<String> = modifiers
        .iter()
        .map(|m| {
            let mut options = m.option_ids.clone();
            options.sort();
            format!("{}={}", m.group_id, options.join(","))
        })
        .collect();
    parts.sort();
    format!("{}|{}|{}", item_id, parts.join(";"), note.unwrap_or_default().trim())
}

/// 购物车
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftCart {
    pub table_id: String,
    pub lines: Vec<DraftLine>,
    #[serde(default)]
    pub order_note: String,
}

impl DraftCart {
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            ..Self::default()
        }
    }

    /// Add a line, merging with an identical one
    pub fn add_line(&mut self, line: DraftLine) {
        match self.lines.iter_mut().find(|l| l.key == line.key) {
            Some(existing) => existing.qty = (existing.qty + line.qty).min(MAX_LINE_QTY),
            None => self.lines.push(line),
        }
    }

    pub fn increment(&mut self, key: &str) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.key == key) {
            line.qty = (line.qty + 1).min(MAX_LINE_QTY);
        }
    }

    /// Decrement; a line at 1 is removed
    pub fn decrement(&mut self, key: &str) {
        let Some(idx) = self.lines.iter().position(|l| l.key == key) else {
            return;
        };
        if self.lines[idx].qty <= 1 {
            self.lines.remove(idx);
        } else {
            self.lines[idx].qty -= 1;
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.lines.retain(|l| l.key != key);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.order_note.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total item count
    pub fn count(&self) -> u32 {
        self.lines.iter().map(|l| l.qty).sum()
    }

    pub fn subtotal_cents(&self) -> i64 {
        self.lines.iter().map(DraftLine::total_cents).sum()
    }

    /// Lines in the shape the draft-items endpoint takes
    pub fn to_inputs(&self) -> Vec<CartLineInput> {
        self.lines.iter().map(DraftLine::to_input).collect()
    }

    pub fn order_note(&self) -> Option<String> {
        let note = self.order_note.trim();
        (!note.is_empty()).then(|| note.to_string())
    }
}

/// Draft order of the session the cart belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSessionOrder {
    pub order_id: String,
    pub session_key: String,
}

/// Persistence for client-side draft state, keyed by table id
#[async_trait]
pub trait DraftRepository: Send + Sync {
    async fn load_cart(&self, table_id: &str) -> ClientResult<Option<DraftCart>>;
    async fn save_cart(&self, cart: &DraftCart) -> ClientResult<()>;
    async fn clear_cart(&self, table_id: &str) -> ClientResult<()>;

    async fn load_session_order(&self, table_id: &str) -> ClientResult<Option<StoredSessionOrder>>;
    async fn save_session_order(
        &self,
        table_id: &str,
        stored: &StoredSessionOrder,
    ) -> ClientResult<()>;
    async fn clear_session_order(&self, table_id: &str) -> ClientResult<()>;
}

// ========== Memory ==========

#[derive(Debug, Default)]
pub struct MemoryDraftRepository {
    carts: Mutex<HashMap<String, DraftCart>>,
    session_orders: Mutex<HashMap<String, StoredSessionOrder>>,
}

impl MemoryDraftRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftRepository for MemoryDraftRepository {
    async fn load_cart(&self, table_id: &str) -> ClientResult<Option<DraftCart>> {
        Ok(lock(&self.carts).get(table_id).cloned())
    }

    async fn save_cart(&self, cart: &DraftCart) -> ClientResult<()> {
        lock(&self.carts).insert(cart.table_id.clone(), cart.clone());
        Ok(())
    }

    async fn clear_cart(&self, table_id: &str) -> ClientResult<()> {
        lock(&self.carts).remove(table_id);
        Ok(())
    }

    async fn load_session_order(&self, table_id: &str) -> ClientResult<Option<StoredSessionOrder>> {
        Ok(lock(&self.session_orders).get(table_id).cloned())
    }

    async fn save_session_order(
        &self,
        table_id: &str,
        stored: &StoredSessionOrder,
    ) -> ClientResult<()> {
        lock(&self.session_orders).insert(table_id.to_string(), stored.clone());
        Ok(())
    }

    async fn clear_session_order(&self, table_id: &str) -> ClientResult<()> {
        lock(&self.session_orders).remove(table_id);
        Ok(())
    }
}

/// A poisoned map is still usable; the data is plain values
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ========== JSON files ==========

/// One JSON file per table and kind under `dir`
#[derive(Debug, Clone)]
pub struct JsonFileDraftRepository {
    dir: PathBuf,
}

impl JsonFileDraftRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, kind: &str, table_id: &str) -> PathBuf {
        let safe: String = table_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{kind}.{safe}.json"))
    }

    async fn read<T: serde::de::DeserializeOwned>(&self, path: &Path) -> ClientResult<Option<T>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // 损坏的文件当作不存在
                tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable draft file");
                Ok(None)
            }
        }
    }

    /// Write to a temp file then rename, so a crash never leaves half a file
    async fn write<T: Serialize>(&self, path: &Path, value: &T) -> ClientResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(value)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn remove(&self, path: &Path) -> ClientResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DraftRepository for JsonFileDraftRepository {
    async fn load_cart(&self, table_id: &str) -> ClientResult<Option<DraftCart>> {
        self.read(&self.path("cart", table_id)).await
    }

    async fn save_cart(&self, cart: &DraftCart) -> ClientResult<()> {
        self.write(&self.path("cart", &cart.table_id), cart).await
    }

    async fn clear_cart(&self, table_id: &str) -> ClientResult<()> {
        self.remove(&self.path("cart", table_id)).await
    }

    async fn load_session_order(&self, table_id: &str) -> ClientResult<Option<StoredSessionOrder>> {
        let stored: Option<StoredSessionOrder> =
            self.read(&self.path("session-order", table_id)).await?;
        Ok(stored.filter(|s| !s.order_id.is_empty() && !s.session_key.is_empty()))
    }

    async fn save_session_order(
        &self,
        table_id: &str,
        stored: &StoredSessionOrder,
    ) -> ClientResult<()> {
        self.write(&self.path("session-order", table_id), stored)
            .await
    }

    async fn clear_session_order(&self, table_id: &str) -> ClientResult<()> {
        self.remove(&self.path("session-order", table_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pho(size: &str) -> DraftLine {
        DraftLine::new(
            "pho",
            "Pho",
            6500,
            vec![DraftModifier {
                group_id: "size".into(),
                option_ids: vec![size.into()],
                price_adjustment_cents: if size == "large" { 1500 } else { 0 },
            }],
            None,
        )
    }

    #[test]
    fn test_cart_merges_identical_lines() {
        let mut cart = DraftCart::new("t1");
        cart.add_line(pho("small"));
        cart.add_line(pho("small").with_qty(2));
        cart.add_line(pho("large"));
        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.count(), 4);
        assert_eq!(cart.subtotal_cents(), 3 * 6500 + 8000);

        let key = cart.lines[1].key.clone();
        cart.decrement(&key);
        assert_eq!(cart.lines.len(), 1);

        let inputs = cart.to_inputs();
        assert_eq!(inputs[0].qty, 3);
        assert_eq!(inputs[0].modifiers[0].option_ids, vec!["small".to_string()]);
    }

    #[test]
    fn test_qty_is_capped() {
        let mut cart = DraftCart::new("t1");
        cart.add_line(pho("small").with_qty(500));
        assert_eq!(cart.lines[0].qty, MAX_LINE_QTY);
        let key = cart.lines[0].key.clone();
        cart.increment(&key);
        assert_eq!(cart.lines[0].qty, MAX_LINE_QTY);
    }

    #[test]
    fn test_order_note() {
        let mut cart = DraftCart::new("t1");
        cart.order_note = "  ".into();
        assert_eq!(cart.order_note(), None);
        cart.order_note = " no chili ".into();
        assert_eq!(cart.order_note(), Some("no chili".into()));
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.order_note(), None);
    }

    #[tokio::test]
    async fn test_json_repository_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileDraftRepository::new(dir.path().join("drafts"));

        assert_eq!(repo.load_cart("t/1").await.unwrap(), None);

        let mut cart = DraftCart::new("t/1");
        cart.add_line(pho("large"));
        repo.save_cart(&cart).await.unwrap();
        assert_eq!(repo.load_cart("t/1").await.unwrap(), Some(cart));

        let stored = StoredSessionOrder {
            order_id: "o1".into(),
            session_key: "k1".into(),
        };
        repo.save_session_order("t/1", &stored).await.unwrap();
        assert_eq!(repo.load_session_order("t/1").await.unwrap(), Some(stored));

        repo.clear_cart("t/1").await.unwrap();
        repo.clear_session_order("t/1").await.unwrap();
        // clearing twice is fine
        repo.clear_cart("t/1").await.unwrap();
        assert_eq!(repo.load_cart("t/1").await.unwrap(), None);
        assert_eq!(repo.load_session_order("t/1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileDraftRepository::new(dir.path());
        std::fs::write(dir.path().join("cart.t1.json"), b"{not json").unwrap();
        assert_eq!(repo.load_cart("t1").await.unwrap(), None);
    }
}
