//! Customer API
//!
//! Every route authenticates with `?table=&token=` ([`CustomerTable`]); the
//! token is checked against the table's current epoch, so a QR code from a
//! closed session is rejected with `InvalidTableToken`.
//!
//! [`CustomerTable`]: crate::auth::CustomerTable

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/public", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        // Session
        .route("/sessions/open", get(handler::open_session))
        .route("/sessions/active", get(handler::active_session))
        // Orders
        .route("/orders/open-session", get(handler::open_draft_order))
        .route("/orders", get(handler::list_orders))
        .route("/orders/{id}", get(handler::get_order))
        .route("/orders/{id}/items", post(handler::update_items))
        .route("/orders/{id}/submit", post(handler::submit_order))
        // Bills
        .route("/bills/request", post(handler::request_bill))
        .route("/bills/active", get(handler::active_bill))
        .route("/bills/{id}/pay-cash", post(handler::pay_cash))
        .route("/bills/{id}/payments", post(handler::create_payment))
        // Payments
        .route("/payments/return", get(handler::payment_return))
        .route("/payments/{id}", get(handler::get_payment))
}
