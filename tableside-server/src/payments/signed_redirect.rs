//! VNPAY-style signed redirect gateway
//!
//! Request and callback parameters are signed with HMAC-SHA512 over the
//! form-urlencoded, key-sorted parameter list (excluding the hash fields).
//! `vnp_TxnRef` carries our payment id, `vnp_ResponseCode == "00"` is success.

use ring::hmac;
use shared::bill::{PaymentOutcome, PaymentProvider};
use std::collections::BTreeMap;
use url::Url;

use super::{GatewayCallback, GatewayError, IntentRequest, PaymentGateway};

const HASH_PARAM: &str = "vnp_SecureHash";
const HASH_TYPE_PARAM: &str = "vnp_SecureHashType";
const SUCCESS_CODE: &str = "00";

#[derive(Debug, Clone)]
pub struct SignedRedirectConfig {
    pub pay_url: String,
    pub merchant_code: String,
    pub hash_secret: String,
    pub return_url: String,
}

pub struct SignedRedirectGateway {
    config: SignedRedirectConfig,
    key: hmac::Key,
}

impl std::fmt::Debug for SignedRedirectGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedRedirectGateway")
            .field("pay_url", &self.config.pay_url)
            .field("merchant_code", &self.config.merchant_code)
            .field("return_url", &self.config.return_url)
            .finish_non_exhaustive()
    }
}

impl SignedRedirectGateway {
    pub fn new(config: SignedRedirectConfig) -> Self {
        let key = hmac::Key::new(hmac::HMAC_SHA512, config.hash_secret.as_bytes());
        Self { config, key }
    }

    /// Canonical query string: sorted keys, hash fields and empty values skipped
    fn canonical(params: &BTreeMap<String, String>) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in params {
            if name == HASH_PARAM || name == HASH_TYPE_PARAM || value.is_empty() {
                continue;
            }
            serializer.append_pair(name, value);
        }
        serializer.finish()
    }

    pub(crate) fn sign(&self, params: &BTreeMap<String, String>) -> String {
        let tag = hmac::sign(&self.key, Self::canonical(params).as_bytes());
        hex::encode(tag.as_ref())
    }

    fn signature_valid(&self, params: &BTreeMap<String, String>) -> bool {
        let Some(provided) = params.get(HASH_PARAM) else {
            return false;
        };
        let Ok(tag) = hex::decode(provided.to_ascii_lowercase()) else {
            return false;
        };
        hmac::verify(&self.key, Self::canonical(params).as_bytes(), &tag).is_ok()
    }
}

impl PaymentGateway for SignedRedirectGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::SignedRedirect
    }

    fn create_intent(&self, request: &IntentRequest<'_>) -> Result<String, GatewayError> {
        let create_date = chrono::DateTime::from_timestamp_millis(request.created_at)
            .unwrap_or_default()
            .format("%Y%m%d%H%M%S")
            .to_string();

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), "2.1.0".to_string());
        params.insert("vnp_Command".to_string(), "pay".to_string());
        params.insert("vnp_TmnCode".to_string(), self.config.merchant_code.clone());
        params.insert("vnp_Amount".to_string(), request.amount_cents.to_string());
        params.insert("vnp_CurrCode".to_string(), "VND".to_string());
        params.insert("vnp_TxnRef".to_string(), request.payment_id.to_string());
        params.insert(
            "vnp_OrderInfo".to_string(),
            format!("Table {} bill {}", request.table_number, request.bill_id),
        );
        params.insert("vnp_OrderType".to_string(), "other".to_string());
        params.insert("vnp_Locale".to_string(), "vn".to_string());
        params.insert("vnp_ReturnUrl".to_string(), self.config.return_url.clone());
        params.insert("vnp_CreateDate".to_string(), create_date);

        let signature = self.sign(&params);
        let mut url = Url::parse(&self.config.pay_url)?;
        url.set_query(Some(&format!(
            "{}&{HASH_PARAM}={signature}",
            Self::canonical(&params)
        )));
        Ok(url.into())
    }

    fn verify_callback(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<GatewayCallback, GatewayError> {
        let amount_cents = match params.get("vnp_Amount") {
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| GatewayError::Malformed {
                name: "vnp_Amount",
                value: raw.clone(),
            })?),
            None => None,
        };
        let response_code = params.get("vnp_ResponseCode").cloned();
        let outcome = response_code.as_deref().map(|code| {
            if code == SUCCESS_CODE {
                PaymentOutcome::Success
            } else {
                PaymentOutcome::Failure
            }
        });

        Ok(GatewayCallback {
            verified: self.signature_valid(params),
            payment_id: params.get("vnp_TxnRef").cloned(),
            response_code,
            outcome,
            amount_cents,
        })
    }
}
