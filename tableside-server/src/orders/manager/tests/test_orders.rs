use super::*;

// ========================================================================
// Draft + submit
// ========================================================================

#[test]
fn test_submit_totals() {
    // Scenario B: 2 x 5000 + 1 x 3000
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 2), line("soup", 1)]);

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_cents, 13000);
    assert_eq!(order.subtotal_cents, 13000);
    assert!(order.submitted_at.unwrap() >= order.created_at);
    assert!(order.items.iter().all(|l| l.status == LineStatus::Queued));
    assert!(order.verify_derived());
}

#[test]
fn test_modifier_pricing() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![pho("large", 2)]);
    assert_eq!(order.items[0].line_total_cents, (6500 + 1500) * 2);
}

#[test]
fn test_submitted_snapshot_survives_catalog_change() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1)]);

    h.catalog.set_price("bun", 9900);
    h.catalog.set_available("bun", false);

    let stored = h.manager.get_order(&order.order_id).unwrap();
    assert_eq!(stored.items[0].unit_price_cents_snapshot, 5000);
    assert_eq!(stored.items[0].name_snapshot, "Bun Cha");
    assert_eq!(stored.total_cents, 5000);
}

#[test]
fn test_submit_reprices_draft() {
    let h = create_test_manager();
    let draft = h.open_draft("t12");
    let priced = h.set_items("t12", &draft.order_id, vec![line("bun", 1)]);
    assert_eq!(priced.total_cents, 5000);

    h.catalog.set_price("bun", 5500);
    let submitted = h
        .submit("t12", &draft.order_id)
        .unwrap()
        .into_order()
        .unwrap();
    assert_eq!(submitted.total_cents, 5500);
    assert_eq!(submitted.items[0].line_id, priced.items[0].line_id);
}

#[test]
fn test_submit_empty_order() {
    let h = create_test_manager();
    let draft = h.open_draft("t12");
    let result = h.submit("t12", &draft.order_id);
    assert!(matches!(
        result,
        Err(ManagerError::Order(OrderError::EmptyOrder(_)))
    ));
}

#[test]
fn test_unavailable_item_rejected() {
    let h = create_test_manager();
    h.catalog.set_available("soup", false);
    let draft = h.open_draft("t12");
    let result = h.run(
        customer("t12"),
        CommandPayload::UpdateDraftItems {
            order_id: draft.order_id.clone(),
            items: vec![line("soup", 1)],
        },
    );
    assert!(matches!(
        result,
        Err(ManagerError::Order(OrderError::ItemUnavailable(_)))
    ));
}

#[test]
fn test_item_goes_unavailable_before_submit() {
    let h = create_test_manager();
    let draft = h.open_draft("t12");
    h.set_items("t12", &draft.order_id, vec![line("soup", 1)]);
    h.catalog.set_available("soup", false);

    let result = h.submit("t12", &draft.order_id);
    assert!(matches!(
        result,
        Err(ManagerError::Order(OrderError::ItemUnavailable(_)))
    ));
    // Transaction aborted: still a draft
    let stored = h.manager.get_order(&draft.order_id).unwrap();
    assert_eq!(stored.status, OrderStatus::Draft);
}

#[test]
fn test_submit_twice_fails() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1)]);
    assert!(is_transition_error(&h.submit("t12", &order.order_id)));
}

#[test]
fn test_cannot_edit_submitted_order() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1)]);
    let result = h.run(
        customer("t12"),
        CommandPayload::UpdateDraftItems {
            order_id: order.order_id.clone(),
            items: vec![line("bun", 3)],
        },
    );
    assert!(is_transition_error(&result));
}

#[test]
fn test_customer_cannot_touch_other_table() {
    let h = create_test_manager();
    let draft = h.open_draft("t12");
    let result = h.run(
        customer("t7"),
        CommandPayload::UpdateDraftItems {
            order_id: draft.order_id.clone(),
            items: vec![line("bun", 1)],
        },
    );
    assert!(matches!(
        result,
        Err(ManagerError::Order(OrderError::SessionMismatch(_)))
    ));
    assert!(h.manager.get_order_for_table("t7", &draft.order_id).is_err());
}

#[test]
fn test_customer_listing_hides_drafts() {
    let h = create_test_manager();
    h.submitted_order("t12", vec![line("bun", 1)]);
    h.open_draft("t12");
    let orders = h.manager.list_session_orders("t12").unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Pending);
}

// ========================================================================
// Kitchen progression
// ========================================================================

#[test]
fn test_partial_ready_stays_preparing() {
    // Scenario C
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 2), line("soup", 1)]);
    let accepted = h.accept(&order.order_id);
    assert_eq!(accepted.status, OrderStatus::Accepted);

    let line_a = order.items[0].line_id.clone();
    let started = h
        .line_step(CommandPayload::StartLine {
            order_id: order.order_id.clone(),
            line_id: line_a.clone(),
        })
        .unwrap();
    assert_eq!(started.status, OrderStatus::Preparing);

    let readied = h
        .line_step(CommandPayload::ReadyLine {
            order_id: order.order_id.clone(),
            line_id: line_a.clone(),
        })
        .unwrap();
    assert_eq!(readied.status, OrderStatus::Preparing);
    assert_eq!(readied.items[1].status, LineStatus::Queued);
    assert!(readied.items[0].ready_at.unwrap() >= readied.items[0].started_at.unwrap());
}

#[test]
fn test_all_lines_ready_then_served() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1), line("soup", 1)]);
    h.accept(&order.order_id);

    // Serving before the kitchen is done
    let early = h.staff(CommandPayload::MarkServed {
        order_id: order.order_id.clone(),
    });
    assert!(is_transition_error(&early));

    let served = h.served_order("t7", vec![line("bun", 1)]);
    assert_eq!(served.status, OrderStatus::Served);
    assert!(served.items.iter().all(|l| l.served_at.is_some()));
}

#[test]
fn test_ready_requires_started_line() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1)]);
    h.accept(&order.order_id);
    let result = h.run(
        kitchen(),
        CommandPayload::ReadyLine {
            order_id: order.order_id.clone(),
            line_id: order.items[0].line_id.clone(),
        },
    );
    assert!(is_transition_error(&result));
}

#[test]
fn test_start_before_accept_fails() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1)]);
    let result = h.run(
        kitchen(),
        CommandPayload::StartLine {
            order_id: order.order_id.clone(),
            line_id: order.items[0].line_id.clone(),
        },
    );
    assert!(is_transition_error(&result));
}

#[test]
fn test_unknown_line() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1)]);
    h.accept(&order.order_id);
    let result = h.run(
        kitchen(),
        CommandPayload::StartLine {
            order_id: order.order_id.clone(),
            line_id: "nope".into(),
        },
    );
    assert!(matches!(
        result,
        Err(ManagerError::Order(OrderError::LineNotFound { .. }))
    ));
}

#[test]
fn test_send_to_waiter_twice_is_noop() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1)]);
    h.accept(&order.order_id);
    h.line_step(CommandPayload::StartOrder {
        order_id: order.order_id.clone(),
    })
    .unwrap();
    h.line_step(CommandPayload::ReadyLine {
        order_id: order.order_id.clone(),
        line_id: order.items[0].line_id.clone(),
    })
    .unwrap();

    let mut rx = h.manager.bus().subscribe();
    let sent = h
        .line_step(CommandPayload::SendToWaiter {
            order_id: order.order_id.clone(),
        })
        .unwrap();
    assert_eq!(sent.status, OrderStatus::ReadyToService);
    assert!(matches!(
        rx.try_recv().unwrap().event,
        RealtimeEvent::OrderReadyToServe { .. }
    ));
    assert!(matches!(
        rx.try_recv().unwrap().event,
        RealtimeEvent::OrderStatusChanged {
            status: OrderStatus::ReadyToService,
            ..
        }
    ));

    let again = h
        .line_step(CommandPayload::SendToWaiter {
            order_id: order.order_id.clone(),
        })
        .unwrap();
    assert_eq!(again.status, OrderStatus::ReadyToService);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_cancel_last_line_cancels_order() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1), line("soup", 1)]);
    h.accept(&order.order_id);

    let after_first = h
        .line_step(CommandPayload::CancelLine {
            order_id: order.order_id.clone(),
            line_id: order.items[0].line_id.clone(),
        })
        .unwrap();
    assert_eq!(after_first.status, OrderStatus::Accepted);
    assert_eq!(after_first.total_cents, 3000);

    let after_second = h
        .line_step(CommandPayload::CancelLine {
            order_id: order.order_id.clone(),
            line_id: order.items[1].line_id.clone(),
        })
        .unwrap();
    assert_eq!(after_second.status, OrderStatus::Cancelled);
    assert_eq!(after_second.total_cents, 0);

    // Cancelled line stays cancelled
    let again = h.run(
        kitchen(),
        CommandPayload::CancelLine {
            order_id: order.order_id.clone(),
            line_id: order.items[0].line_id.clone(),
        },
    );
    assert!(is_transition_error(&again));
}

#[test]
fn test_total_matches_live_lines_after_every_step() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1), line("soup", 2), pho("small", 1)]);
    h.accept(&order.order_id);

    let steps = vec![
        CommandPayload::StartLine {
            order_id: order.order_id.clone(),
            line_id: order.items[0].line_id.clone(),
        },
        CommandPayload::CancelLine {
            order_id: order.order_id.clone(),
            line_id: order.items[1].line_id.clone(),
        },
        CommandPayload::ReadyLine {
            order_id: order.order_id.clone(),
            line_id: order.items[0].line_id.clone(),
        },
    ];
    for payload in steps {
        let o = h.line_step(payload).unwrap();
        let expected: i64 = o
            .items
            .iter()
            .filter(|l| l.status != LineStatus::Cancelled)
            .map(|l| l.line_total_cents)
            .sum();
        assert_eq!(o.total_cents, expected);
        assert!(o.verify_derived());
    }
}

// ========================================================================
// Reject boundary
// ========================================================================

#[test]
fn test_reject_pending() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1)]);
    let rejected = h
        .staff(CommandPayload::RejectOrder {
            order_id: order.order_id.clone(),
        })
        .unwrap()
        .into_order()
        .unwrap();
    assert_eq!(rejected.status, OrderStatus::Cancelled);
    assert!(rejected.items.iter().all(|l| l.cancelled_at.is_some()));
}

#[test]
fn test_reject_accepted_untouched() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1)]);
    h.accept(&order.order_id);
    let rejected = h
        .staff(CommandPayload::RejectOrder {
            order_id: order.order_id.clone(),
        })
        .unwrap()
        .into_order()
        .unwrap();
    assert_eq!(rejected.status, OrderStatus::Cancelled);
}

#[test]
fn test_reject_after_kitchen_started_fails() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1), line("soup", 1)]);
    h.accept(&order.order_id);
    h.line_step(CommandPayload::StartLine {
        order_id: order.order_id.clone(),
        line_id: order.items[1].line_id.clone(),
    })
    .unwrap();

    let result = h.staff(CommandPayload::RejectOrder {
        order_id: order.order_id.clone(),
    });
    assert!(is_transition_error(&result));
    assert_eq!(
        h.manager.get_order(&order.order_id).unwrap().status,
        OrderStatus::Preparing
    );
}

// ========================================================================
// Concurrency / idempotency
// ========================================================================

#[test]
fn test_concurrent_accept_single_winner() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1)]);
    let manager = Arc::new(h.manager);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let manager = manager.clone();
            let order_id = order.order_id.clone();
            std::thread::spawn(move || {
                manager.execute(DiningCommand::new(
                    Actor::Staff {
                        id: format!("w-{i}"),
                        role: StaffRole::Waiter,
                    },
                    CommandPayload::AcceptOrder { order_id },
                ))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(results.iter().filter(|r| is_transition_error(r)).count(), 3);
}

#[test]
fn test_submit_replay_returns_recorded_reply() {
    let h = create_test_manager();
    let draft = h.open_draft("t12");
    h.set_items("t12", &draft.order_id, vec![line("bun", 1)]);

    let cmd = DiningCommand::new(
        customer("t12"),
        CommandPayload::SubmitOrder {
            order_id: draft.order_id.clone(),
            order_note: Some("no chili".into()),
        },
    )
    .with_command_id(Some("submit-1".into()));

    let first = h.manager.execute(cmd.clone()).unwrap();
    let sequence = h.manager.current_sequence().unwrap();

    let mut rx = h.manager.bus().subscribe();
    let second = h.manager.execute(cmd).unwrap();
    assert_eq!(first, second);
    assert_eq!(h.manager.current_sequence().unwrap(), sequence);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_reused_key_with_other_payload() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1)]);
    let other = h.submitted_order("t12", vec![line("soup", 1)]);

    let accept = |order_id: &str| {
        DiningCommand::new(
            waiter(),
            CommandPayload::AcceptOrder {
                order_id: order_id.to_string(),
            },
        )
        .with_command_id(Some("accept-key".into()))
    };
    h.manager.execute(accept(&order.order_id)).unwrap();
    let result = h.manager.execute(accept(&other.order_id));
    assert!(matches!(result, Err(ManagerError::CommandReused(_))));
}

#[test]
fn test_reused_key_from_other_actor_is_rejected() {
    let h = create_test_manager();
    let order = h.submitted_order("t12", vec![line("bun", 1)]);
    let accept = |actor: Actor| {
        DiningCommand::new(
            actor,
            CommandPayload::AcceptOrder {
                order_id: order.order_id.clone(),
            },
        )
        .with_command_id(Some("k-1".into()))
    };

    h.manager.execute(accept(waiter())).unwrap();
    // same key and payload, different principal: no replay of the staff reply
    let result = h.manager.execute(accept(customer("t7")));
    assert!(matches!(result, Err(ManagerError::CommandReused(_))));
    // the original actor still replays
    let replay = h.manager.execute(accept(waiter())).unwrap().into_order().unwrap();
    assert_eq!(replay.status, OrderStatus::Accepted);
}

#[test]
fn test_only_keyed_commands_are_recorded() {
    let h = create_test_manager();
    let processed = || h.manager.storage().get_stats().unwrap().processed_commands;
    let before = processed();

    let token = h.token("t12");
    for _ in 0..5 {
        h.run(
            customer("t12"),
            CommandPayload::OpenSession {
                table_id: "t12".into(),
                token: token.clone(),
            },
        )
        .unwrap();
    }
    assert_eq!(processed(), before);

    let order = h.submitted_order("t12", vec![line("bun", 1)]);
    h.manager
        .execute(
            DiningCommand::new(
                waiter(),
                CommandPayload::AcceptOrder {
                    order_id: order.order_id.clone(),
                },
            )
            .with_command_id(Some("accept-1".into())),
        )
        .unwrap();
    assert_eq!(processed(), before + 1);

    // retention elapsed: the record is pruned
    let removed = h
        .manager
        .prune_command_records(shared::util::now_millis() + 1)
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(processed(), 0);
}

#[test]
fn test_sequence_grows_with_events() {
    let h = create_test_manager();
    let mut rx = h.manager.bus().subscribe();
    let order = h.submitted_order("t12", vec![line("bun", 1)]);
    h.accept(&order.order_id);

    let mut last = 0;
    while let Ok(msg) = rx.try_recv() {
        assert!(msg.sequence > last);
        last = msg.sequence;
    }
    assert_eq!(last, h.manager.current_sequence().unwrap());
}

#[test]
fn test_staff_board_filters() {
    let h = create_test_manager();
    let a = h.submitted_order("t12", vec![line("bun", 1)]);
    let b = h.submitted_order("t7", vec![line("soup", 1)]);
    h.accept(&b.order_id);
    h.open_draft("t12");

    let all = h.manager.staff_orders(None).unwrap();
    assert_eq!(all.len(), 2);
    let pending = h.manager.staff_orders(Some(OrderStatus::Pending)).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].order_id, a.order_id);
}
