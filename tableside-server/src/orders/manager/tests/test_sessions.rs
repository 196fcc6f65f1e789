use super::*;

// ========================================================================
// Session open / reuse
// ========================================================================

#[test]
fn test_open_session_is_idempotent() {
    let h = create_test_manager();

    let first = h.open_session("t12");
    assert_eq!(first.status, SessionStatus::Open);
    assert_eq!(first.table_number_snapshot, "12");

    // Re-scan with the same token returns the same session
    let second = h.open_session("t12");
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.session_key, first.session_key);

    let txn = h.manager.storage().begin_read().unwrap();
    assert_eq!(txn.active_session_ids().unwrap().len(), 1);
}

#[test]
fn test_sessions_are_per_table() {
    let h = create_test_manager();
    let a = h.open_session("t12");
    let b = h.open_session("t7");
    assert_ne!(a.session_id, b.session_id);
    assert_eq!(h.manager.active_session("t7").unwrap().unwrap().session_id, b.session_id);
}

#[test]
fn test_invalid_token_is_rejected() {
    let h = create_test_manager();
    let result = h.run(
        customer("t12"),
        CommandPayload::OpenSession {
            table_id: "t12".into(),
            token: "deadbeef".into(),
        },
    );
    assert!(matches!(
        result,
        Err(ManagerError::Order(OrderError::InvalidTableToken(_)))
    ));
    assert!(h.manager.active_session("t12").unwrap().is_none());
}

#[test]
fn test_token_of_other_table_is_rejected() {
    let h = create_test_manager();
    let result = h.run(
        customer("t12"),
        CommandPayload::OpenSession {
            table_id: "t12".into(),
            token: h.token("t7"),
        },
    );
    assert!(matches!(
        result,
        Err(ManagerError::Order(OrderError::InvalidTableToken(_)))
    ));
}

#[test]
fn test_unknown_table() {
    let h = create_test_manager();
    let result = h.run(
        customer("t99"),
        CommandPayload::OpenSession {
            table_id: "t99".into(),
            token: "x".into(),
        },
    );
    assert!(matches!(
        result,
        Err(ManagerError::Order(OrderError::TableNotFound(_)))
    ));
}

#[test]
fn test_session_opened_event_published() {
    let h = create_test_manager();
    let mut rx = h.manager.bus().subscribe();
    let session = h.open_session("t12");

    let msg = rx.try_recv().unwrap();
    assert_eq!(msg.table_id, "t12");
    assert_eq!(msg.session_id, session.session_id);
    assert!(matches!(msg.event, RealtimeEvent::SessionOpened { .. }));

    // Re-open publishes nothing
    h.open_session("t12");
    assert!(rx.try_recv().is_err());
}

// ========================================================================
// Draft bootstrap
// ========================================================================

#[test]
fn test_draft_is_reused_until_submitted() {
    let h = create_test_manager();
    let first = h.open_draft("t12");
    assert_eq!(first.status, OrderStatus::Draft);
    let again = h.open_draft("t12");
    assert_eq!(again.order_id, first.order_id);
    assert_eq!(again.session_key, first.session_key);

    h.set_items("t12", &first.order_id, vec![line("bun", 1)]);
    h.submit("t12", &first.order_id).unwrap();

    let next = h.open_draft("t12");
    assert_ne!(next.order_id, first.order_id);
    assert_eq!(next.session_id, first.session_id);
}

#[test]
fn test_no_draft_after_bill_requested() {
    let h = create_test_manager();
    let session = h.open_session("t12");
    h.request_bill("t12", &session.session_id);

    let result = h.run(
        customer("t12"),
        CommandPayload::OpenDraftOrder {
            table_id: "t12".into(),
            token: h.token("t12"),
        },
    );
    assert!(matches!(
        result,
        Err(ManagerError::Order(OrderError::SessionNotOpen { .. }))
    ));
}

// ========================================================================
// Close + token rotation
// ========================================================================

#[test]
fn test_close_rotates_table_token() {
    let h = create_test_manager();
    let old_token = h.token("t12");
    let session = h.open_session("t12");
    h.served_order("t12", vec![line("bun", 1)]);
    let bill = h.request_bill("t12", &session.session_id);
    h.staff(CommandPayload::PayCash {
        bill_id: bill.bill_id.clone(),
    })
    .unwrap();

    let closed = h
        .staff(CommandPayload::AcceptBill {
            bill_id: bill.bill_id.clone(),
        })
        .unwrap()
        .into_session()
        .unwrap();
    assert_eq!(closed.status, SessionStatus::Closed);
    assert!(closed.closed_at.unwrap() >= closed.paid_at.unwrap());
    assert!(h.manager.active_session("t12").unwrap().is_none());

    // Old QR no longer works
    let stale = h.run(
        customer("t12"),
        CommandPayload::OpenSession {
            table_id: "t12".into(),
            token: old_token,
        },
    );
    assert!(matches!(
        stale,
        Err(ManagerError::Order(OrderError::InvalidTableToken(_)))
    ));

    // The newly issued one opens a fresh session
    let (table, _) = h.manager.table_token("t12").unwrap();
    assert_eq!(table.token_epoch, 2);
    let fresh = h.open_session("t12");
    assert_ne!(fresh.session_id, session.session_id);
    assert_eq!(fresh.status, SessionStatus::Open);
}

#[test]
fn test_accept_bill_requires_payment() {
    let h = create_test_manager();
    let session = h.open_session("t12");
    let bill = h.request_bill("t12", &session.session_id);

    let result = h.staff(CommandPayload::AcceptBill {
        bill_id: bill.bill_id,
    });
    assert!(is_transition_error(&result));
    assert_eq!(h.session(&session.session_id).status, SessionStatus::BillRequested);
}

#[test]
fn test_accept_bill_twice_is_noop() {
    let h = create_test_manager();
    let session = h.open_session("t12");
    let bill = h.request_bill("t12", &session.session_id);
    h.staff(CommandPayload::PayCash {
        bill_id: bill.bill_id.clone(),
    })
    .unwrap();
    let first = h
        .staff(CommandPayload::AcceptBill {
            bill_id: bill.bill_id.clone(),
        })
        .unwrap()
        .into_session()
        .unwrap();
    let second = h
        .staff(CommandPayload::AcceptBill {
            bill_id: bill.bill_id.clone(),
        })
        .unwrap()
        .into_session()
        .unwrap();
    assert_eq!(first, second);
    // epoch bumped once
    assert_eq!(h.manager.table_token("t12").unwrap().0.token_epoch, 2);
}

#[test]
fn test_session_stamps_are_monotonic() {
    let h = create_test_manager();
    let session = h.open_session("t12");

    // Customer clock far in the past
    let reply = h
        .manager
        .execute(DiningCommand {
            command_id: "bill-early".into(),
            keyed: true,
            actor: customer("t12"),
            timestamp: session.opened_at - 60_000,
            payload: CommandPayload::RequestBill {
                session_id: session.session_id.clone(),
                note: None,
            },
        })
        .unwrap()
        .into_bill()
        .unwrap();
    let stored = h.session(&session.session_id);
    assert!(stored.bill_requested_at.unwrap() >= stored.opened_at);
    assert!(reply.requested_at >= stored.opened_at);
}

// ========================================================================
// Tables
// ========================================================================

#[test]
fn test_register_table_keeps_epoch() {
    let h = create_test_manager();
    let session = h.open_session("t7");
    let bill = h.request_bill("t7", &session.session_id);
    h.staff(CommandPayload::PayCash {
        bill_id: bill.bill_id.clone(),
    })
    .unwrap();
    h.staff(CommandPayload::AcceptBill {
        bill_id: bill.bill_id,
    })
    .unwrap();

    let renamed = h
        .run(
            Actor::System,
            CommandPayload::RegisterTable {
                table_id: "t7".into(),
                table_number: "7A".into(),
            },
        )
        .unwrap()
        .into_table()
        .unwrap();
    assert_eq!(renamed.table_number, "7A");
    assert_eq!(renamed.token_epoch, 2);
    assert_eq!(h.manager.list_tables().unwrap().len(), 2);
}
