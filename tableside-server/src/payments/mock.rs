//! Mock gateway: the checkout page is served by this server and the
//! outcome arrives through `/api/webhooks/mock-payments/{id}/success|fail`

use shared::bill::{PaymentOutcome, PaymentProvider};
use std::collections::BTreeMap;

use super::{GatewayCallback, GatewayError, IntentRequest, PaymentGateway};

#[derive(Debug, Clone)]
pub struct MockGateway {
    public_base_url: String,
}

impl MockGateway {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl PaymentGateway for MockGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Mock
    }

    fn create_intent(&self, request: &IntentRequest<'_>) -> Result<String, GatewayError> {
        Ok(format!(
            "{}/mock-pay/{}?amount={}",
            self.public_base_url, request.payment_id, request.amount_cents
        ))
    }

    /// `paymentId` + `outcome=success|failure`; unsigned
    fn verify_callback(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<GatewayCallback, GatewayError> {
        let outcome = match params.get("outcome").map(String::as_str) {
            Some("success") => Some(PaymentOutcome::Success),
            Some("failure") | Some("fail") => Some(PaymentOutcome::Failure),
            Some(other) => {
                return Err(GatewayError::Malformed {
                    name: "outcome",
                    value: other.to_string(),
                });
            }
            None => None,
        };
        Ok(GatewayCallback {
            verified: true,
            payment_id: params.get("paymentId").cloned(),
            response_code: None,
            outcome,
            amount_cents: None,
        })
    }
}
