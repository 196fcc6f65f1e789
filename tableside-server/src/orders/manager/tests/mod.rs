use super::*;
use crate::catalog::{CatalogItem, MemoryCatalog, ModifierGroup, ModifierOption};
use crate::orders::traits::Actor;
use crate::payments::MockGateway;
use shared::bill::{PaymentMethod, PaymentOutcome, PaymentProvider, PaymentStatus};
use shared::dto::DraftOrderHandle;
use shared::message::RealtimeEvent;
use shared::order::{CartLineInput, CartModifier, LineStatus};
use shared::staff::StaffRole;

const TABLE_SECRET: &[u8] = b"manager-test-table-secret";

struct TestHarness {
    manager: DiningManager,
    catalog: Arc<MemoryCatalog>,
}

fn catalog_item(item_id: &str, name: &str, price_cents: i64) -> CatalogItem {
    CatalogItem {
        item_id: item_id.to_string(),
        name: name.to_string(),
        price_cents,
        available: true,
        modifier_groups: vec![],
    }
}

fn create_test_manager() -> TestHarness {
    let storage = DiningStorage::open_in_memory().unwrap();
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.upsert(catalog_item("bun", "Bun Cha", 5000));
    catalog.upsert(catalog_item("soup", "Canh Chua", 3000));
    let mut pho = catalog_item("pho", "Pho Bo", 6500);
    pho.modifier_groups = vec![ModifierGroup {
        group_id: "size".into(),
        name: "Size".into(),
        required: true,
        max_select: Some(1),
        options: vec![
            ModifierOption {
                option_id: "small".into(),
                name: "Small".into(),
                price_adjustment_cents: 0,
            },
            ModifierOption {
                option_id: "large".into(),
                name: "Large".into(),
                price_adjustment_cents: 1500,
            },
        ],
    }];
    catalog.upsert(pho);

    let gateways = PaymentGateways::new(
        shared::bill::PaymentProvider::Mock,
        MockGateway::new("http://localhost:3000"),
        None,
    );
    let manager = DiningManager::new(
        storage,
        MessageBus::new(),
        catalog.clone(),
        Arc::new(TableTokenService::new(TABLE_SECRET)),
        Arc::new(gateways),
    );

    let harness = TestHarness { manager, catalog };
    for (table_id, number) in [("t12", "12"), ("t7", "7")] {
        harness
            .manager
            .execute(DiningCommand::new(
                Actor::System,
                CommandPayload::RegisterTable {
                    table_id: table_id.into(),
                    table_number: number.into(),
                },
            ))
            .unwrap();
    }
    harness
}

fn line(item_id: &str, qty: u32) -> CartLineInput {
    CartLineInput {
        item_id: item_id.to_string(),
        qty,
        note: None,
        modifiers: vec![],
    }
}

fn pho(size: &str, qty: u32) -> CartLineInput {
    CartLineInput {
        modifiers: vec![CartModifier {
            group_id: "size".into(),
            option_ids: vec![size.to_string()],
        }],
        ..line("pho", qty)
    }
}

fn customer(table_id: &str) -> Actor {
    Actor::Customer {
        table_id: table_id.to_string(),
    }
}

fn waiter() -> Actor {
    Actor::Staff {
        id: "w-1".into(),
        role: StaffRole::Waiter,
    }
}

fn kitchen() -> Actor {
    Actor::Staff {
        id: "k-1".into(),
        role: StaffRole::Kitchen,
    }
}

fn is_transition_error(result: &ManagerResult<CommandReply>) -> bool {
    matches!(
        result,
        Err(ManagerError::Order(OrderError::InvalidTransition { .. }))
    )
}

impl TestHarness {
    fn token(&self, table_id: &str) -> String {
        self.manager.table_token(table_id).unwrap().1
    }

    fn run(&self, actor: Actor, payload: CommandPayload) -> ManagerResult<CommandReply> {
        self.manager.execute(DiningCommand::new(actor, payload))
    }

    fn open_session(&self, table_id: &str) -> Session {
        self.run(
            customer(table_id),
            CommandPayload::OpenSession {
                table_id: table_id.into(),
                token: self.token(table_id),
            },
        )
        .unwrap()
        .into_session()
        .unwrap()
    }

    fn open_draft(&self, table_id: &str) -> DraftOrderHandle {
        self.run(
            customer(table_id),
            CommandPayload::OpenDraftOrder {
                table_id: table_id.into(),
                token: self.token(table_id),
            },
        )
        .unwrap()
        .into_draft_order()
        .unwrap()
    }

    fn set_items(&self, table_id: &str, order_id: &str, items: Vec<CartLineInput>) -> Order {
        self.run(
            customer(table_id),
            CommandPayload::UpdateDraftItems {
                order_id: order_id.into(),
                items,
            },
        )
        .unwrap()
        .into_order()
        .unwrap()
    }

    fn submit(&self, table_id: &str, order_id: &str) -> ManagerResult<CommandReply> {
        self.run(
            customer(table_id),
            CommandPayload::SubmitOrder {
                order_id: order_id.into(),
                order_note: None,
            },
        )
    }

    /// Draft + items + submit
    fn submitted_order(&self, table_id: &str, items: Vec<CartLineInput>) -> Order {
        let draft = self.open_draft(table_id);
        self.set_items(table_id, &draft.order_id, items);
        self.submit(table_id, &draft.order_id)
            .unwrap()
            .into_order()
            .unwrap()
    }

    fn staff(&self, payload: CommandPayload) -> ManagerResult<CommandReply> {
        self.run(waiter(), payload)
    }

    fn accept(&self, order_id: &str) -> Order {
        self.staff(CommandPayload::AcceptOrder {
            order_id: order_id.into(),
        })
        .unwrap()
        .into_order()
        .unwrap()
    }

    fn line_step(&self, payload: CommandPayload) -> ManagerResult<Order> {
        self.run(kitchen(), payload)?.into_order()
    }

    /// Accept, cook every line, send to waiter and serve
    fn served_order(&self, table_id: &str, items: Vec<CartLineInput>) -> Order {
        let order = self.submitted_order(table_id, items);
        self.accept(&order.order_id);
        self.line_step(CommandPayload::StartOrder {
            order_id: order.order_id.clone(),
        })
        .unwrap();
        for l in &order.items {
            self.line_step(CommandPayload::ReadyLine {
                order_id: order.order_id.clone(),
                line_id: l.line_id.clone(),
            })
            .unwrap();
        }
        self.line_step(CommandPayload::SendToWaiter {
            order_id: order.order_id.clone(),
        })
        .unwrap();
        self.staff(CommandPayload::MarkServed {
            order_id: order.order_id.clone(),
        })
        .unwrap()
        .into_order()
        .unwrap()
    }

    fn request_bill(&self, table_id: &str, session_id: &str) -> Bill {
        self.run(
            customer(table_id),
            CommandPayload::RequestBill {
                session_id: session_id.into(),
                note: None,
            },
        )
        .unwrap()
        .into_bill()
        .unwrap()
    }

    fn session(&self, session_id: &str) -> Session {
        self.manager
            .storage()
            .begin_read()
            .unwrap()
            .get_session(session_id)
            .unwrap()
            .unwrap()
    }

    fn bill(&self, bill_id: &str) -> Bill {
        self.manager
            .storage()
            .begin_read()
            .unwrap()
            .get_bill(bill_id)
            .unwrap()
            .unwrap()
    }
}

mod test_orders;
mod test_sessions;
