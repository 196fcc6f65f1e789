//! Bill totals
//!
//! An unpaid bill's total is live: Σ line totals of served lines across the
//! session's orders, computed from one transaction snapshot. It is frozen
//! into `Bill::total_cents` when the bill becomes PAID.

use shared::bill::{Bill, ServedLine};
use shared::order::{Order, OrderPhase};

use super::storage::{StorageResult, StoreRead};

/// Served total of a session and the orders contributing to it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveTotal {
    pub total_cents: i64,
    pub order_ids: Vec<String>,
}

pub fn live_total(orders: &[Order]) -> LiveTotal {
    let mut result = LiveTotal::default();
    for order in orders.iter().filter(|o| o.phase != OrderPhase::Draft) {
        let served = order.served_total_cents();
        if order.served_lines().next().is_some() {
            result.total_cents += served;
            result.order_ids.push(order.order_id.clone());
        }
    }
    result
}

pub fn served_lines(orders: &[Order]) -> Vec<ServedLine> {
    orders
        .iter()
        .flat_map(|order| {
            order.served_lines().map(|line| ServedLine {
                order_id: order.order_id.clone(),
                line_id: line.line_id.clone(),
                name_snapshot: line.name_snapshot.clone(),
                qty: line.qty,
                line_total_cents: line.line_total_cents,
            })
        })
        .collect()
}

/// Session's live total read through `reader`
pub fn session_live_total(reader: &impl StoreRead, session_id: &str) -> StorageResult<LiveTotal> {
    Ok(live_total(&reader.session_orders(session_id)?))
}

/// Refresh an unpaid bill's total and order references in place; paid bills
/// keep their frozen total.
pub fn refresh_bill(reader: &impl StoreRead, bill: &mut Bill) -> StorageResult<()> {
    if bill.status.is_payable() {
        let live = session_live_total(reader, &bill.session_id)?;
        bill.total_cents = live.total_cents;
        bill.order_ids = live.order_ids;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{LineStatus, OrderLine};

    fn order(id: &str, phase: OrderPhase, lines: &[(i64, LineStatus)]) -> Order {
        let mut order = Order::new_draft(id.into(), "s1".into(), "t1".into(), "1".into(), 0);
        order.phase = phase;
        order.items = lines
            .iter()
            .enumerate()
            .map(|(i, (price, status))| OrderLine {
                line_id: format!("{id}-l{i}"),
                item_id: "x".into(),
                name_snapshot: "X".into(),
                unit_price_cents_snapshot: *price,
                modifiers: vec![],
                qty: 1,
                note: None,
                line_total_cents: 0,
                status: *status,
                started_at: None,
                ready_at: None,
                served_at: None,
                cancelled_at: None,
            })
            .collect();
        order.refresh();
        order
    }

    #[test]
    fn test_only_served_lines_count() {
        let orders = vec![
            order(
                "o1",
                OrderPhase::Served,
                &[(1000, LineStatus::Served), (500, LineStatus::Cancelled)],
            ),
            order(
                "o2",
                OrderPhase::Accepted,
                &[(700, LineStatus::Served), (300, LineStatus::Preparing)],
            ),
            order("o3", OrderPhase::Pending, &[(900, LineStatus::Queued)]),
        ];
        let live = live_total(&orders);
        assert_eq!(live.total_cents, 1700);
        assert_eq!(live.order_ids, vec!["o1".to_string(), "o2".to_string()]);
        assert_eq!(served_lines(&orders).len(), 2);
    }

    #[test]
    fn test_no_served_lines_is_zero() {
        let orders = vec![order("o1", OrderPhase::Pending, &[(900, LineStatus::Queued)])];
        assert_eq!(live_total(&orders), LiveTotal::default());
    }
}
