//! Webhook Handlers

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::Html,
};
use serde::Serialize;
use shared::bill::{Payment, PaymentOutcome, PaymentProvider};
use shared::error::{ApiResponse, ErrorCode};

use crate::api::execute;
use crate::core::ServerState;
use crate::orders::{Actor, CommandPayload};
use crate::security_log;
use crate::utils::{AppError, AppResult, ok};

/// Gateway redeliveries of the same outcome share a command id, so they
/// replay the recorded reply.
fn webhook_command_id(payment_id: &str, outcome: PaymentOutcome) -> String {
    let outcome = match outcome {
        PaymentOutcome::Success => "success",
        PaymentOutcome::Failure => "failure",
    };
    format!("webhook:{payment_id}:{outcome}")
}

fn confirm(
    state: &ServerState,
    payment_id: String,
    outcome: PaymentOutcome,
    reported_amount_cents: Option<i64>,
) -> AppResult<Payment> {
    let command_id = webhook_command_id(&payment_id, outcome);
    let payload = CommandPayload::ConfirmOnlinePayment {
        payment_id,
        outcome,
        reported_amount_cents,
    };
    Ok(execute(state, Actor::Gateway, payload, Some(command_id))?.into_payment()?)
}

/// Only payments created through the mock adapter may be confirmed here
fn ensure_mock(state: &ServerState, payment_id: &str) -> AppResult<()> {
    let payment = state.manager.get_payment(payment_id)?;
    if payment.provider != PaymentProvider::Mock {
        security_log!(
            "WARN",
            "mock_webhook_for_real_payment",
            payment_id = payment_id
        );
        return Err(AppError::with_message(
            ErrorCode::PaymentSignatureInvalid,
            "Payment was not created by the mock gateway",
        ));
    }
    Ok(())
}

// ========== Mock gateway ==========

pub async fn mock_success(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    ensure_mock(&state, &id)?;
    Ok(ok(confirm(&state, id, PaymentOutcome::Success, None)?))
}

pub async fn mock_fail(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    ensure_mock(&state, &id)?;
    Ok(ok(confirm(&state, id, PaymentOutcome::Failure, None)?))
}

/// 本地收银页：两个按钮分别回调 success / fail
pub async fn mock_checkout_page(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let payment = state.manager.get_payment(&id)?;
    let base = format!("/api/webhooks/mock-payments/{}", payment.payment_id);
    Ok(Html(format!(
        r#"<!doctype html>
<html><head><meta charset="utf-8"><title>Mock payment</title></head>
<body>
<h1>Mock payment</h1>
<p>Payment {id} &middot; amount {amount}</p>
<form method="post" action="{base}/success"><button>Pay</button></form>
<form method="post" action="{base}/fail"><button>Fail</button></form>
</body></html>"#,
        id = payment.payment_id,
        amount = payment.amount_cents,
    )))
}

// ========== Signed redirect IPN ==========

/// IPN acknowledgement in the gateway's own format
#[derive(Debug, Serialize, PartialEq)]
pub struct IpnResponse {
    #[serde(rename = "RspCode")]
    pub rsp_code: &'static str,
    #[serde(rename = "Message")]
    pub message: &'static str,
}

impl IpnResponse {
    const fn new(rsp_code: &'static str, message: &'static str) -> Self {
        Self { rsp_code, message }
    }
}

/// Map a confirmation error to the gateway's acknowledgement codes
fn ipn_error(err: &AppError) -> IpnResponse {
    match err.code {
        ErrorCode::PaymentNotFound | ErrorCode::BillNotFound => {
            IpnResponse::new("01", "Order not found")
        }
        ErrorCode::BillAlreadyPaid | ErrorCode::InvalidTransition => {
            IpnResponse::new("02", "Order already confirmed")
        }
        ErrorCode::AmountMismatch => IpnResponse::new("04", "Invalid amount"),
        _ => IpnResponse::new("99", "Unknown error"),
    }
}

/// GET /api/webhooks/signed-redirect/ipn
///
/// Always answers 200 with `{RspCode, Message}`; the gateway retries on
/// anything but `00` / `02`.
pub async fn signed_redirect_ipn(
    State(state): State<ServerState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Json<IpnResponse> {
    Json(handle_ipn(&state, &params))
}

fn handle_ipn(state: &ServerState, params: &BTreeMap<String, String>) -> IpnResponse {
    let gateway = match state.manager.gateways().get(PaymentProvider::SignedRedirect) {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::error!(error = %e, "IPN received but signed redirect gateway is not configured");
            return IpnResponse::new("99", "Unknown error");
        }
    };
    let callback = match gateway.verify_callback(params) {
        Ok(callback) => callback,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed IPN");
            return IpnResponse::new("99", "Invalid request");
        }
    };
    if !callback.verified {
        security_log!(
            "WARN",
            "ipn_signature_invalid",
            payment_id = callback.payment_id.clone().unwrap_or_default()
        );
        return IpnResponse::new("97", "Invalid signature");
    }
    let (Some(payment_id), Some(outcome)) = (callback.payment_id, callback.outcome) else {
        return IpnResponse::new("99", "Invalid request");
    };

    match state.manager.get_payment(&payment_id) {
        Ok(payment) if payment.status.is_final() => {
            return IpnResponse::new("02", "Order already confirmed");
        }
        Ok(_) => {}
        Err(e) => return ipn_error(&AppError::from(e)),
    }

    match confirm(state, payment_id.clone(), outcome, callback.amount_cents) {
        Ok(payment) => {
            tracing::info!(
                payment_id = %payment.payment_id,
                status = ?payment.status,
                response_code = callback.response_code.as_deref().unwrap_or(""),
                "IPN confirmed"
            );
            IpnResponse::new("00", "Confirm Success")
        }
        Err(e) => {
            tracing::warn!(payment_id = %payment_id, code = ?e.code, error = %e.message, "IPN rejected");
            ipn_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipn_codes() {
        let not_found = AppError::new(ErrorCode::PaymentNotFound);
        assert_eq!(ipn_error(&not_found).rsp_code, "01");
        let paid = AppError::new(ErrorCode::BillAlreadyPaid);
        assert_eq!(ipn_error(&paid).rsp_code, "02");
        let amount = AppError::new(ErrorCode::AmountMismatch);
        assert_eq!(ipn_error(&amount).rsp_code, "04");
        let db = AppError::database("down");
        assert_eq!(ipn_error(&db).rsp_code, "99");
    }

    #[test]
    fn test_webhook_command_id_is_stable() {
        assert_eq!(
            webhook_command_id("p1", PaymentOutcome::Success),
            webhook_command_id("p1", PaymentOutcome::Success)
        );
        assert_ne!(
            webhook_command_id("p1", PaymentOutcome::Success),
            webhook_command_id("p1", PaymentOutcome::Failure)
        );
    }

    #[test]
    fn test_ipn_body_shape() {
        let value = serde_json::to_value(IpnResponse::new("00", "Confirm Success")).unwrap();
        assert_eq!(value["RspCode"], "00");
        assert_eq!(value["Message"], "Confirm Success");
    }
}
