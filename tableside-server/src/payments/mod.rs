//! 在线支付网关适配
//!
//! The bill flow only ever talks to [`PaymentGateway`]: create a checkout
//! URL for an intent, and verify what the gateway sends back (browser return
//! redirect or server-to-server IPN). Confirmation itself always goes through
//! the order manager.

mod mock;
mod signed_redirect;

pub use mock::MockGateway;
pub use signed_redirect::{SignedRedirectConfig, SignedRedirectGateway};

use shared::bill::{PaymentOutcome, PaymentProvider};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Payment provider {0:?} is not configured")]
    NotConfigured(PaymentProvider),

    #[error("Malformed gateway parameter {name}: {value}")]
    Malformed { name: &'static str, value: String },

    #[error("Invalid gateway url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// What the adapter needs to create a checkout
#[derive(Debug, Clone)]
pub struct IntentRequest<'a> {
    pub payment_id: &'a str,
    pub bill_id: &'a str,
    pub amount_cents: i64,
    pub table_number: &'a str,
    pub created_at: i64,
}

/// Parsed gateway callback
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCallback {
    /// Signature checked out
    pub verified: bool,
    pub payment_id: Option<String>,
    pub response_code: Option<String>,
    pub outcome: Option<PaymentOutcome>,
    pub amount_cents: Option<i64>,
}

pub trait PaymentGateway: Send + Sync + std::fmt::Debug {
    fn provider(&self) -> PaymentProvider;

    /// Checkout URL the customer is redirected to
    fn create_intent(&self, request: &IntentRequest<'_>) -> Result<String, GatewayError>;

    /// Verify return / IPN query parameters. Never mutates state.
    fn verify_callback(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<GatewayCallback, GatewayError>;
}

/// Configured adapters
#[derive(Debug)]
pub struct PaymentGateways {
    default: PaymentProvider,
    mock: MockGateway,
    signed: Option<SignedRedirectGateway>,
}

impl PaymentGateways {
    pub fn new(
        default: PaymentProvider,
        mock: MockGateway,
        signed: Option<SignedRedirectGateway>,
    ) -> Self {
        Self {
            default,
            mock,
            signed,
        }
    }

    pub fn default_provider(&self) -> PaymentProvider {
        self.default
    }

    pub fn get(&self, provider: PaymentProvider) -> Result<&dyn PaymentGateway, GatewayError> {
        match provider {
            PaymentProvider::Mock => Ok(&self.mock),
            PaymentProvider::SignedRedirect => self
                .signed
                .as_ref()
                .map(|g| g as &dyn PaymentGateway)
                .ok_or(GatewayError::NotConfigured(provider)),
        }
    }
}
