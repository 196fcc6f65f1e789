//! Order line types

use crate::lifecycle::Lifecycle;
use serde::{Deserialize, Serialize};

// ============================================================================
// Line status
// ============================================================================

/// 菜品行状态 (KDS)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    #[default]
    Queued,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

impl LineStatus {
    /// Explicit edge table for per-line actions
    pub fn can_transition_to(&self, next: LineStatus) -> bool {
        use LineStatus::*;
        matches!(
            (self, next),
            (Queued, Preparing)
                | (Preparing, Ready)
                | (Ready, Served)
                | (Queued, Cancelled)
                | (Preparing, Cancelled)
                | (Ready, Cancelled)
        )
    }

    pub fn is_live(&self) -> bool {
        !matches!(self, LineStatus::Cancelled)
    }
}

impl Lifecycle for LineStatus {
    fn rank(&self) -> u8 {
        match self {
            LineStatus::Queued => 0,
            LineStatus::Preparing => 1,
            LineStatus::Ready => 2,
            LineStatus::Served => 3,
            LineStatus::Cancelled => 4,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, LineStatus::Served | LineStatus::Cancelled)
    }

    fn as_str(&self) -> &'static str {
        match self {
            LineStatus::Queued => "queued",
            LineStatus::Preparing => "preparing",
            LineStatus::Ready => "ready",
            LineStatus::Served => "served",
            LineStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for LineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Cart input
// ============================================================================

/// Modifier selection as sent by the customer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct CartModifier {
    pub group_id: String,
    #[serde(default)]
    pub option_ids: Vec<String>,
}

/// One draft line as sent by the customer (replace-all semantics)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartLineInput {
    pub item_id: String,
    pub qty: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<CartModifier>,
}

// ============================================================================
// Order line
// ============================================================================

/// Priced modifier selection frozen on a line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LineModifier {
    pub group_id: String,
    pub option_ids: Vec<String>,
    pub price_adjustment_cents_snapshot: i64,
}

/// 订单行
///
/// Name, unit price and modifier adjustments are snapshots frozen at submit;
/// catalog changes after that never touch them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub line_id: String,
    pub item_id: String,
    pub name_snapshot: String,
    pub unit_price_cents_snapshot: i64,
    #[serde(default)]
    pub modifiers: Vec<LineModifier>,
    pub qty: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Recomputed on every save, see [`OrderLine::compute_total`]
    pub line_total_cents: i64,
    pub status: LineStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
}

impl OrderLine {
    /// `(unit price + Σ modifier adjustments) × qty`
    pub fn compute_total(&self) -> i64 {
        let adjustments: i64 = self
            .modifiers
            .iter()
            .map(|m| m.price_adjustment_cents_snapshot)
            .sum();
        (self.unit_price_cents_snapshot + adjustments) * i64::from(self.qty)
    }

    /// Cart-equivalent view of this line (for re-pricing at submit)
    pub fn as_input(&self) -> CartLineInput {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn line(unit: i64, adjustments: &[i64], qty: u32) -> OrderLine {
        OrderLine {
            line_id: "l1".into(),
            item_id: "pho".into(),
            name_snapshot: "Pho".into(),
            unit_price_cents_snapshot: unit,
            modifiers: adjustments
                .iter()
                .enumerate()
                .map(|(i, adj)| LineModifier {
                    group_id: format!("g{i}"),
                    option_ids: vec![format!("o{i}")],
                    price_adjustment_cents_snapshot: *adj,
                })
                .collect(),
            qty,
            note: None,
            line_total_cents: 0,
            status: LineStatus::Queued,
            started_at: None,
            ready_at: None,
            served_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn test_line_total_with_modifiers() {
        assert_eq!(line(5000, &[], 2).compute_total(), 10000);
        assert_eq!(line(5000, &[1000, -500], 3).compute_total(), 16500);
    }

    #[test]
    fn test_line_edges() {
        assert!(LineStatus::Queued.can_transition_to(LineStatus::Preparing));
        assert!(LineStatus::Preparing.can_transition_to(LineStatus::Ready));
        assert!(!LineStatus::Queued.can_transition_to(LineStatus::Ready));
        assert!(!LineStatus::Served.can_transition_to(LineStatus::Cancelled));
        assert!(!LineStatus::Cancelled.can_transition_to(LineStatus::Queued));
    }

    #[test]
    fn test_cart_input_camel_case() {
        let json = r#"{"itemId":"pho","qty":2,"modifiers":[{"groupId":"size","optionIds":["l"]}]}"#;
        let input: CartLineInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.item_id, "pho");
        assert_eq!(input.modifiers[0].option_ids, vec!["l".to_string()]);
        assert!(input.note.is_none());
    }
}
