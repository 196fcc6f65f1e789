//! Client against a live server on a loopback port

use std::time::Duration;

use shared::bill::{BillStatus, PaymentProvider};
use shared::message::RealtimeEvent;
use shared::order::OrderStatus;
use shared::staff::StaffRole;
use tableside_client::{
    ClientConfig, DraftCart, DraftLine, DraftRepository, HttpClient, LineAction,
    MemoryDraftRepository, OrderAction, PaymentPoller, PaymentReturn, RealtimeClient,
    RealtimeConfig, RealtimeUpdate, TableSync, new_idempotency_key, resolve_session_order,
};
use tableside_server::catalog::{CatalogItem, MemoryCatalog};
use tableside_server::{Config, DiningStorage, ServerState};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct LiveServer {
    base_url: String,
    state: ServerState,
    _dir: tempfile::TempDir,
}

fn item(item_id: &str, name: &str, price_cents: i64) -> CatalogItem {
    CatalogItem {
        item_id: item_id.into(),
        name: name.into(),
        price_cents,
        available: true,
        modifier_groups: vec![],
    }
}

async fn start_server() -> LiveServer {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::with_overrides(dir.path().to_string_lossy(), 0);
    config.environment = "test".into();
    config.table_token_secret = Some("client-test-table-secret".into());
    config.jwt_secret = Some("client-test-jwt-secret-0123456789abcdefgh".into());
    config.auto_cook = false;
    config.payment_provider = PaymentProvider::Mock;
    config.gateway = None;

    let catalog = MemoryCatalog::new();
    catalog.upsert(item("pho", "Pho Bo", 6000));
    catalog.upsert(item("tea", "Tra Da", 1000));

    let state =
        ServerState::build(config, DiningStorage::open_in_memory().unwrap(), catalog).unwrap();
    let tables = dir.path().join("tables.json");
    std::fs::write(&tables, r#"[{"tableId": "t3", "tableNumber": "3"}]"#).unwrap();
    state.seed_tables(&tables).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = tableside_server::api::build_app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    LiveServer {
        base_url: format!("http://{addr}"),
        state,
        _dir: dir,
    }
}

impl LiveServer {
    fn table_config(&self, table_id: &str) -> ClientConfig {
        let token = self.state.manager.table_token(table_id).unwrap().1;
        ClientConfig::for_table(&self.base_url, table_id, token).with_realtime(
            RealtimeConfig::new()
                .with_reconnect_delay(Duration::from_millis(20), Duration::from_millis(200))
                .with_jitter(0.0),
        )
    }

    fn staff_client(&self, role: StaffRole) -> HttpClient {
        let token = self
            .state
            .jwt_service
            .generate_token(&format!("{role}-1"), role.as_str(), role)
            .unwrap();
        ClientConfig::for_staff(&self.base_url, token)
            .build_http_client()
            .unwrap()
    }
}

async fn next_update(rx: &mut mpsc::Receiver<RealtimeUpdate>) -> RealtimeUpdate {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("realtime update in time")
        .expect("realtime channel open")
}

/// Feed updates into the sync until `done` holds
async fn pump_until<A, R>(
    sync: &mut TableSync<A, R>,
    rx: &mut mpsc::Receiver<RealtimeUpdate>,
    done: impl Fn(&TableSync<A, R>) -> bool,
) where
    A: tableside_client::TableApi,
    R: DraftRepository,
{
    while !done(sync) {
        let update = next_update(rx).await;
        sync.handle_update(update).await.unwrap();
    }
}

/// Fill the cart, open the draft and submit it
async fn order_from_table(table: &HttpClient, drafts: &MemoryDraftRepository) -> String {
    let mut cart = DraftCart::new("t3");
    cart.add_line(DraftLine::new("pho", "Pho Bo", 6000, vec![], None));
    cart.add_line(DraftLine::new("pho", "Pho Bo", 6000, vec![], None));
    cart.add_line(DraftLine::new("tea", "Tra Da", 1000, vec![], Some("no ice".into())));
    assert_eq!(cart.subtotal_cents(), 13000);
    drafts.save_cart(&cart).await.unwrap();

    let resolved = resolve_session_order(table, drafts, "t3").await.unwrap();
    assert!(!resolved.recycled);

    let order = table
        .update_draft_items(&resolved.order_id, cart.to_inputs())
        .await
        .unwrap();
    assert_eq!(order.total_cents, 13000);

    let key = new_idempotency_key();
    let submitted = table
        .submit_order(&resolved.order_id, None, &key)
        .await
        .unwrap();
    assert_eq!(submitted.status, OrderStatus::Pending);
    drafts.clear_cart("t3").await.unwrap();

    // retried submit replays
    let replay = table
        .submit_order(&resolved.order_id, None, &key)
        .await
        .unwrap();
    assert_eq!(replay.order_id, submitted.order_id);
    submitted.order_id
}

/// Accept, cook and serve every line
async fn serve_everything(server: &LiveServer, order_id: &str) {
    let waiter = server.staff_client(StaffRole::Waiter);
    let kitchen = server.staff_client(StaffRole::Kitchen);

    let order = waiter
        .order_action(order_id, OrderAction::Accept)
        .await
        .unwrap();
    for line in &order.items {
        kitchen
            .line_action(order_id, &line.line_id, LineAction::Start)
            .await
            .unwrap();
        kitchen
            .line_action(order_id, &line.line_id, LineAction::Ready)
            .await
            .unwrap();
    }
    kitchen
        .order_action(order_id, OrderAction::SendToWaiter)
        .await
        .unwrap();
    let served = waiter
        .order_action(order_id, OrderAction::Served)
        .await
        .unwrap();
    assert_eq!(served.status, OrderStatus::Served);
}

#[tokio::test]
async fn test_table_device_follows_the_kitchen() {
    let server = start_server().await;
    let config = server.table_config("t3");
    let table = config.build_http_client().unwrap();
    let drafts = MemoryDraftRepository::new();

    let shutdown = CancellationToken::new();
    let (mut rx, task) = RealtimeClient::new(&config)
        .unwrap()
        .spawn(shutdown.clone());
    match next_update(&mut rx).await {
        RealtimeUpdate::Connected { restarted, .. } => assert!(!restarted),
        other => panic!("expected hello, got {other:?}"),
    }

    let order_id = order_from_table(&table, &drafts).await;

    let mut sync = TableSync::new(
        config.build_http_client().unwrap(),
        MemoryDraftRepository::new(),
        "t3",
    );
    sync.refetch(tableside_client::Refetch::All).await.unwrap();
    assert_eq!(
        sync.state().order(&order_id).map(|o| o.status),
        Some(OrderStatus::Pending)
    );

    serve_everything(&server, &order_id).await;
    pump_until(&mut sync, &mut rx, |s| {
        s.state()
            .order(&order_id)
            .is_some_and(|o| o.status == OrderStatus::Served)
    })
    .await;
    assert_eq!(sync.state().order(&order_id).unwrap().total_cents, 13000);
    assert!(sync.state().last_sequence() > 0);

    // staff cannot be impersonated with a table credential
    let err = table
        .order_action(&order_id, OrderAction::Accept)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        tableside_client::ClientError::MissingCredentials(_)
    ));

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_online_payment_return_waits_for_webhook() {
    let server = start_server().await;
    let config = server
        .table_config("t3")
        .with_polling(Duration::from_millis(50), Duration::from_secs(5));
    let table = config.build_http_client().unwrap();
    let drafts = MemoryDraftRepository::new();

    let shutdown = CancellationToken::new();
    let (mut rx, task) = RealtimeClient::new(&config)
        .unwrap()
        .spawn(shutdown.clone());
    assert!(matches!(
        next_update(&mut rx).await,
        RealtimeUpdate::Connected { .. }
    ));

    let order_id = order_from_table(&table, &drafts).await;
    serve_everything(&server, &order_id).await;

    let session = table.active_session().await.unwrap().unwrap();
    let bill = table.request_bill(&session.session_id, None).await.unwrap();
    assert_eq!(bill.status, BillStatus::Requested);
    assert_eq!(bill.total_cents, 13000);

    let intent = table
        .create_payment(&bill.bill_id, None, Some(13000), &new_idempotency_key())
        .await
        .unwrap();
    assert!(intent.checkout_url.contains("/mock-pay/"));

    // the gateway notifies the server a little after the redirect
    let webhook = format!(
        "{}/api/webhooks/mock-payments/{}/success",
        server.base_url, intent.payment_id
    );
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        reqwest::Client::new().post(webhook).send().await.unwrap();
    });

    let poller = PaymentPoller::new(config.build_http_client().unwrap(), &config);
    let params = vec![
        ("paymentId".to_string(), intent.payment_id.clone()),
        ("outcome".to_string(), "success".to_string()),
    ];
    match poller.handle_return(&params, &shutdown).await.unwrap() {
        PaymentReturn::Paid(bill) => {
            assert_eq!(bill.status, BillStatus::Paid);
            assert_eq!(bill.total_cents, 13000);
        }
        other => panic!("expected paid, got {other:?}"),
    }

    // the table channel saw the bill go paid
    let mut saw_paid = false;
    while !saw_paid {
        if let RealtimeUpdate::Message(msg) = next_update(&mut rx).await {
            saw_paid = matches!(msg.event, RealtimeEvent::BillPaid { .. });
        }
    }

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_old_qr_subscription_ends_with_the_session() {
    let server = start_server().await;
    let config = server.table_config("t3");
    let table = config.build_http_client().unwrap();
    let drafts = MemoryDraftRepository::new();

    let shutdown = CancellationToken::new();
    let (mut rx, task) = RealtimeClient::new(&config)
        .unwrap()
        .spawn(shutdown.clone());
    assert!(matches!(
        next_update(&mut rx).await,
        RealtimeUpdate::Connected { .. }
    ));

    let order_id = order_from_table(&table, &drafts).await;
    serve_everything(&server, &order_id).await;
    let session = table.active_session().await.unwrap().unwrap();
    let bill = table.request_bill(&session.session_id, None).await.unwrap();

    let waiter = server.staff_client(StaffRole::Waiter);
    waiter.mark_cash_paid(&bill.bill_id).await.unwrap();
    waiter.accept_bill(&bill.bill_id).await.unwrap();

    // session.closed is the last event the old token sees
    loop {
        match next_update(&mut rx).await {
            RealtimeUpdate::Message(msg) => {
                if matches!(msg.event, RealtimeEvent::SessionClosed { .. }) {
                    break;
                }
            }
            other => panic!("expected events up to session.closed, got {other:?}"),
        }
    }
    assert!(matches!(
        next_update(&mut rx).await,
        RealtimeUpdate::Disconnected { .. }
    ));

    // the next guests open a session with the rotated QR
    let fresh = server.table_config("t3").build_http_client().unwrap();
    let next = fresh.open_session().await.unwrap();
    assert_ne!(next.session_id, session.session_id);

    // reconnecting with the old token is refused; nothing of the new session leaks
    match next_update(&mut rx).await {
        RealtimeUpdate::Rejected { status } => assert_eq!(status, 401),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(rx.recv().await.is_none());

    shutdown.cancel();
    task.await.unwrap();
}
