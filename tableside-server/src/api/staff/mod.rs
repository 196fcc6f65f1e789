//! Staff API (kitchen / waiter / admin)
//!
//! Bearer JWT via [`CurrentUser`](crate::auth::CurrentUser); each handler
//! checks its [`StaffAction`](crate::auth::StaffAction) before running a
//! command.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/staff", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        // Order board
        .route("/orders", get(handler::list_orders))
        .route("/orders/{id}", get(handler::get_order))
        .route("/orders/{id}/accept", post(handler::accept_order))
        .route("/orders/{id}/reject", post(handler::reject_order))
        .route("/orders/{id}/start", post(handler::start_order))
        .route("/orders/{id}/send-to-waiter", post(handler::send_to_waiter))
        .route("/orders/{id}/served", post(handler::mark_served))
        // Lines
        .route("/orders/{id}/lines/{line_id}/start", post(handler::start_line))
        .route("/orders/{id}/lines/{line_id}/ready", post(handler::ready_line))
        .route("/orders/{id}/lines/{line_id}/cancel", post(handler::cancel_line))
        // Bill board
        .route("/bills", get(handler::list_bills))
        .route("/bills/{id}/mark-cash-paid", post(handler::mark_cash_paid))
        .route("/bills/{id}/accept", post(handler::accept_bill))
        // Tables
        .route("/tables", get(handler::list_tables))
        .route("/tables/{id}/qr", get(handler::table_qr))
}
