//! Menu catalog
//!
//! Read-only collaborator of the order state machine: draft lines get
//! provisional prices from it, and submit freezes name / price / modifier
//! snapshots from it. Browsing and search are not served from here.

mod memory;

pub use memory::MemoryCatalog;

use serde::{Deserialize, Serialize};
use shared::order::{CartLineInput, LineModifier, LineStatus, OrderLine};

use crate::orders::traits::OrderError;
use crate::utils::validation::{MAX_LINE_QTY, MAX_NOTE_LEN, validate_optional_text};

/// Selectable modifier option
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModifierOption {
    pub option_id: String,
    pub name: String,
    #[serde(default)]
    pub price_adjustment_cents: i64,
}

/// Modifier group of an item (size, toppings, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModifierGroup {
    pub group_id: String,
    pub name: String,
    /// At least one option must be chosen
    #[serde(default)]
    pub required: bool,
    /// Upper bound on chosen options (None = unbounded)
    #[serde(default)]
    pub max_select: Option<u32>,
    #[serde(default)]
    pub options: Vec<ModifierOption>,
}

/// Menu item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub item_id: String,
    pub name: String,
    pub price_cents: i64,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub modifier_groups: Vec<ModifierGroup>,
}

fn default_available() -> bool {
    true
}

impl CatalogItem {
    fn group(&self, group_id: &str) -> Option<&ModifierGroup> {
        self.modifier_groups.iter().find(|g| g.group_id == group_id)
    }
}

/// Catalog lookup
pub trait CatalogProvider: Send + Sync {
    fn item(&self, item_id: &str) -> Option<CatalogItem>;
}

/// Price one cart line against the catalog.
///
/// Unknown or unavailable items / groups / options are rejected with
/// `ItemUnavailable`; quantity and note limits with `Validation`. The
/// returned line is `queued` with its total already computed.
pub fn price_line(
    catalog: &dyn CatalogProvider,
    input: &CartLineInput,
    line_id: String,
) -> Result<OrderLine, OrderError> {
    if input.qty == 0 || input.qty > MAX_LINE_QTY {
        return Err(OrderError::Validation(format!(
            "qty must be between 1 and {MAX_LINE_QTY} (item {})",
            input.item_id
        )));
    }
    validate_optional_text(&input.note, "note", MAX_NOTE_LEN)?;

    let item = catalog
        .item(&input.item_id)
        .ok_or_else(|| OrderError::ItemUnavailable(format!("Unknown item {}", input.item_id)))?;
    if !item.available {
        return Err(OrderError::ItemUnavailable(format!(
            "Item {} is not available",
            item.name
        )));
    }

    let mut modifiers = Vec::with_capacity(input.modifiers.len());
    for selection in &input.modifiers {
        let group = item.group(&selection.group_id).ok_or_else(|| {
            OrderError::ItemUnavailable(format!(
                "Unknown modifier group {} on item {}",
                selection.group_id, item.item_id
            ))
        })?;
        if let Some(max) = group.max_select
            && selection.option_ids.len() > max as usize
        {
            return Err(OrderError::Validation(format!(
                "At most {max} option(s) allowed for {}",
                group.name
            )));
        }

        let mut adjustment = 0;
        for option_id in &selection.option_ids {
            let option = group
                .options
                .iter()
                .find(|o| o.option_id == *option_id)
                .ok_or_else(|| {
                    OrderError::ItemUnavailable(format!(
                        "Unknown option {option_id} in group {}",
                        group.group_id
                    ))
                })?;
            adjustment += option.price_adjustment_cents;
        }
        modifiers.push(LineModifier {
            group_id: group.group_id.clone(),
            option_ids: selection.option_ids.clone(),
            price_adjustment_cents_snapshot: adjustment,
        });
    }

    for group in item.modifier_groups.iter().filter(|g| g.required) {
        let chosen = input
            .modifiers
            .iter()
            .any(|m| m.group_id == group.group_id && !m.option_ids.is_empty());
        if !chosen {
            return Err(OrderError::Validation(format!(
                "{} requires a selection for {}",
                item.name, group.name
            )));
        }
    }

    let mut line = OrderLine {
        line_id,
        item_id: item.item_id,
        name_snapshot: item.name,
        unit_price_cents_snapshot: item.price_cents,
        modifiers,
        qty: input.qty,
        note: input.note.clone(),
        line_total_cents: 0,
        status: LineStatus::Queued,
        started_at: None,
        ready_at: None,
        served_at: None,
        cancelled_at: None,
    };
    line.line_total_cents = line.compute_total();
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::CartModifier;

    fn catalog() -> MemoryCatalog {
        let catalog = MemoryCatalog::new();
        catalog.upsert(CatalogItem {
            item_id: "pho".into(),
            name: "Pho Bo".into(),
            price_cents: 6500,
            available: true,
            modifier_groups: vec![ModifierGroup {
                group_id: "size".into(),
                name: "Size".into(),
                required: true,
                max_select: Some(1),
                options: vec![
                    ModifierOption {
                        option_id: "s".into(),
                        name: "Small".into(),
                        price_adjustment_cents: 0,
                    },
                    ModifierOption {
                        option_id: "l".into(),
                        name: "Large".into(),
                        price_adjustment_cents: 1500,
                    },
                ],
            }],
        });
        catalog.upsert(CatalogItem {
            item_id: "tea".into(),
            name: "Iced Tea".into(),
            price_cents: 1000,
            available: false,
            modifier_groups: vec![],
        });
        catalog
    }

    fn input(item: &str, qty: u32, options: &[&str]) -> CartLineInput {
        CartLineInput {
            item_id: item.into(),
            qty,
            note: None,
            modifiers: if options.is_empty() {
                vec![]
            } else {
                vec![CartModifier {
                    group_id: "size".into(),
                    option_ids: options.iter().map(|s| s.to_string()).collect(),
                }]
            },
        }
    }

    #[test]
    fn test_price_line_with_modifier() {
        let line = price_line(&catalog(), &input("pho", 2, &["l"]), "l1".into()).unwrap();
        assert_eq!(line.name_snapshot, "Pho Bo");
        assert_eq!(line.unit_price_cents_snapshot, 6500);
        assert_eq!(line.modifiers[0].price_adjustment_cents_snapshot, 1500);
        assert_eq!(line.line_total_cents, (6500 + 1500) * 2);
        assert_eq!(line.status, LineStatus::Queued);
    }

    #[test]
    fn test_unknown_and_unavailable_items() {
        let catalog = catalog();
        assert!(matches!(
            price_line(&catalog, &input("nope", 1, &[]), "l".into()),
            Err(OrderError::ItemUnavailable(_))
        ));
        assert!(matches!(
            price_line(&catalog, &input("tea", 1, &[]), "l".into()),
            Err(OrderError::ItemUnavailable(_))
        ));
        assert!(matches!(
            price_line(&catalog, &input("pho", 1, &["xl"]), "l".into()),
            Err(OrderError::ItemUnavailable(_))
        ));
    }

    #[test]
    fn test_selection_rules() {
        let catalog = catalog();
        // required group missing
        assert!(matches!(
            price_line(&catalog, &input("pho", 1, &[]), "l".into()),
            Err(OrderError::Validation(_))
        ));
        // too many options
        assert!(matches!(
            price_line(&catalog, &input("pho", 1, &["s", "l"]), "l".into()),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn test_qty_bounds() {
        let catalog = catalog();
        assert!(price_line(&catalog, &input("pho", 0, &["s"]), "l".into()).is_err());
        assert!(price_line(&catalog, &input("pho", 100, &["s"]), "l".into()).is_err());
        assert!(price_line(&catalog, &input("pho", 99, &["s"]), "l".into()).is_ok());
    }
}
