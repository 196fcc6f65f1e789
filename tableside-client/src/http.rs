//! HTTP client for the Tableside REST API
//!
//! Every response is an [`ApiResponse`] envelope; non-zero codes become
//! [`ClientError::Api`] so callers can branch on the [`ErrorCode`].

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::bill::{ActiveBillView, Bill, Payment, PaymentIntent, PaymentProvider};
use shared::dto::{
    BillTab, CreatePaymentRequest, DraftOrderHandle, PaymentReturnResult, RequestBillRequest,
    SubmitOrderRequest, TableQr, UpdateDraftItemsRequest,
};
use shared::Lifecycle;
use shared::error::{ApiResponse, ErrorCode};
use shared::order::{CartLineInput, Order, OrderStatus};
use shared::session::{Session, TableInfo};

use crate::{ClientConfig, ClientError, ClientResult, Credentials};

/// Header the server reads for command replay
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Fresh key for a mutating call; reuse it when retrying the same call
pub fn new_idempotency_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// HTTP client for making requests to a Tableside server
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            credentials: config.credentials.clone(),
        })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Table id this client speaks for (customer clients only)
    pub fn table_id(&self) -> Option<&str> {
        match &self.credentials {
            Some(Credentials::Table { table_id, .. }) => Some(table_id),
            _ => None,
        }
    }

    fn request(&self, method: Method, path: &str, authorized: bool) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let request = self.client.request(method, url);
        if !authorized {
            return request;
        }
        match &self.credentials {
            Some(Credentials::Table { table_id, token }) => {
                request.query(&[("table", table_id.as_str()), ("token", token.as_str())])
            }
            Some(Credentials::Staff { token }) => request.bearer_auth(token),
            None => request,
        }
    }

    fn require_table(&self) -> ClientResult<()> {
        match self.credentials {
            Some(Credentials::Table { .. }) => Ok(()),
            _ => Err(ClientError::MissingCredentials("table QR token")),
        }
    }

    fn require_staff(&self) -> ClientResult<()> {
        match self.credentials {
            Some(Credentials::Staff { .. }) => Ok(()),
            _ => Err(ClientError::MissingCredentials("staff token")),
        }
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.request(Method::GET, path, true).send().await?;
        Self::handle_response(response).await
    }

    /// Make a GET request with extra query parameters
    pub async fn get_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> ClientResult<T> {
        let response = self
            .request(Method::GET, path, true)
            .query(query)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> ClientResult<T> {
        let mut request = self.request(Method::POST, path, true).json(body);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        let response = request.send().await?;
        Self::handle_response(response).await
    }

    /// Make a POST request without body
    pub async fn post_empty<T: DeserializeOwned>(
        &self,
        path: &str,
        idempotency_key: Option<&str>,
    ) -> ClientResult<T> {
        let mut request = self.request(Method::POST, path, true);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        let response = request.send().await?;
        Self::handle_response(response).await
    }

    /// Unwrap the envelope
    async fn handle_response<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let status = response.status();
        let bytes = response.bytes().await?;

        let envelope: ApiResponse<Value> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(ClientError::Api {
                    code: fallback_code(status),
                    message: String::from_utf8_lossy(&bytes).into_owned(),
                    status: status.as_u16(),
                });
            }
        };

        let code = envelope.code.unwrap_or(0);
        if !status.is_success() || code != 0 {
            let code = ErrorCode::try_from(code).unwrap_or_else(|_| fallback_code(status));
            tracing::debug!(status = status.as_u16(), code = %code, message = %envelope.message, "API error");
            return Err(ClientError::Api {
                code,
                message: envelope.message,
                status: status.as_u16(),
            });
        }

        // `data: null` is a valid payload for Option<T> responses
        serde_json::from_value(envelope.data.unwrap_or(Value::Null))
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    // ========== Customer: session & orders ==========

    pub async fn open_session(&self) -> ClientResult<Session> {
        self.require_table()?;
        self.get("api/public/sessions/open").await
    }

    pub async fn active_session(&self) -> ClientResult<Option<Session>> {
        self.require_table()?;
        self.get("api/public/sessions/active").await
    }

    /// Open (or reuse) the session and its draft order
    pub async fn open_draft_order(&self) -> ClientResult<DraftOrderHandle> {
        self.require_table()?;
        self.get("api/public/orders/open-session").await
    }

    pub async fn session_orders(&self) -> ClientResult<Vec<Order>> {
        self.require_table()?;
        self.get("api/public/orders").await
    }

    pub async fn order(&self, order_id: &str) -> ClientResult<Order> {
        match self.credentials {
            Some(Credentials::Staff { .. }) => self.get(&format!("api/staff/orders/{order_id}")).await,
            _ => self.get(&format!("api/public/orders/{order_id}")).await,
        }
    }

    /// Replace the draft's lines
    pub async fn update_draft_items(
        &self,
        order_id: &str,
        items: Vec<CartLineInput>,
    ) -> ClientResult<Order> {
        self.require_table()?;
        let body = UpdateDraftItemsRequest { items };
        self.post(&format!("api/public/orders/{order_id}/items"), &body, None)
            .await
    }

    pub async fn submit_order(
        &self,
        order_id: &str,
        order_note: Option<String>,
        idempotency_key: &str,
    ) -> ClientResult<Order> {
        self.require_table()?;
        let body = SubmitOrderRequest { order_note };
        self.post(
            &format!("api/public/orders/{order_id}/submit"),
            &body,
            Some(idempotency_key),
        )
        .await
    }

    // ========== Customer: bill & payments ==========

    pub async fn request_bill(&self, session_id: &str, note: Option<String>) -> ClientResult<Bill> {
        self.require_table()?;
        let body = RequestBillRequest {
            session_id: session_id.to_string(),
            note,
        };
        self.post("api/public/bills/request", &body, None).await
    }

    pub async fn active_bill(&self) -> ClientResult<ActiveBillView> {
        self.require_table()?;
        self.get("api/public/bills/active").await
    }

    pub async fn pay_cash(&self, bill_id: &str) -> ClientResult<Bill> {
        self.require_table()?;
        self.post_empty(&format!("api/public/bills/{bill_id}/pay-cash"), None)
            .await
    }

    pub async fn create_payment(
        &self,
        bill_id: &str,
        provider: Option<PaymentProvider>,
        amount_cents: Option<i64>,
        idempotency_key: &str,
    ) -> ClientResult<PaymentIntent> {
        self.require_table()?;
        let body = CreatePaymentRequest {
            provider,
            amount_cents,
        };
        self.post(
            &format!("api/public/bills/{bill_id}/payments"),
            &body,
            Some(idempotency_key),
        )
        .await
    }

    pub async fn payment(&self, payment_id: &str) -> ClientResult<Payment> {
        self.require_table()?;
        self.get(&format!("api/public/payments/{payment_id}")).await
    }

    /// Forward the gateway's return query string for signature verification
    pub async fn verify_payment_return(
        &self,
        params: &[(String, String)],
    ) -> ClientResult<PaymentReturnResult> {
        let response = self
            .request(Method::GET, "api/public/payments/return", false)
            .query(params)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    // ========== Staff ==========

    pub async fn staff_orders(&self, status: Option<OrderStatus>) -> ClientResult<Vec<Order>> {
        self.require_staff()?;
        match status {
            Some(status) => {
                self.get_query("api/staff/orders", &[("status", status.as_str())])
                    .await
            }
            None => self.get("api/staff/orders").await,
        }
    }

    pub async fn order_action(&self, order_id: &str, action: OrderAction) -> ClientResult<Order> {
        self.require_staff()?;
        self.post_empty(
            &format!("api/staff/orders/{order_id}/{}", action.path()),
            None,
        )
        .await
    }

    pub async fn line_action(
        &self,
        order_id: &str,
        line_id: &str,
        action: LineAction,
    ) -> ClientResult<Order> {
        self.require_staff()?;
        self.post_empty(
            &format!("api/staff/orders/{order_id}/lines/{line_id}/{}", action.path()),
            None,
        )
        .await
    }

    pub async fn staff_bills(&self, tab: BillTab) -> ClientResult<Vec<Bill>> {
        self.require_staff()?;
        let tab = match tab {
            BillTab::Requested => "REQUESTED",
            BillTab::Paid => "PAID",
            BillTab::Done => "DONE",
        };
        self.get_query("api/staff/bills", &[("tab", tab)]).await
    }

    pub async fn mark_cash_paid(&self, bill_id: &str) -> ClientResult<Bill> {
        self.require_staff()?;
        self.post_empty(&format!("api/staff/bills/{bill_id}/mark-cash-paid"), None)
            .await
    }

    /// Close the session behind a paid bill
    pub async fn accept_bill(&self, bill_id: &str) -> ClientResult<Session> {
        self.require_staff()?;
        self.post_empty(&format!("api/staff/bills/{bill_id}/accept"), None)
            .await
    }

    pub async fn tables(&self) -> ClientResult<Vec<TableInfo>> {
        self.require_staff()?;
        self.get("api/staff/tables").await
    }

    pub async fn table_qr(&self, table_id: &str) -> ClientResult<TableQr> {
        self.require_staff()?;
        self.get(&format!("api/staff/tables/{table_id}/qr")).await
    }
}

/// Order-level staff actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Accept,
    Reject,
    Start,
    SendToWaiter,
    Served,
}

impl OrderAction {
    fn path(&self) -> &'static str {
        match self {
            OrderAction::Accept => "accept",
            OrderAction::Reject => "reject",
            OrderAction::Start => "start",
            OrderAction::SendToWaiter => "send-to-waiter",
            OrderAction::Served => "served",
        }
    }
}

/// Per-line kitchen actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    Start,
    Ready,
    Cancel,
}

impl LineAction {
    fn path(&self) -> &'static str {
        match self {
            LineAction::Start => "start",
            LineAction::Ready => "ready",
            LineAction::Cancel => "cancel",
        }
    }
}

/// Best guess when the body is not an envelope (proxy error pages etc.)
fn fallback_code(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::NotAuthenticated,
        StatusCode::FORBIDDEN => ErrorCode::PermissionDenied,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorCode::TimeoutError,
        s if s.is_server_error() => ErrorCode::InternalError,
        _ => ErrorCode::InvalidRequest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_code() {
        assert_eq!(fallback_code(StatusCode::UNAUTHORIZED), ErrorCode::NotAuthenticated);
        assert_eq!(fallback_code(StatusCode::BAD_GATEWAY), ErrorCode::InternalError);
        assert_eq!(fallback_code(StatusCode::CONFLICT), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn test_credentials_are_checked_locally() {
        let http = ClientConfig::for_staff("http://127.0.0.1:9", "jwt")
            .build_http_client()
            .unwrap();
        let err = http.open_session().await.unwrap_err();
        assert!(matches!(err, ClientError::MissingCredentials(_)));
        assert_eq!(http.table_id(), None);
    }

    #[test]
    fn test_idempotency_keys_are_unique() {
        assert_ne!(new_idempotency_key(), new_idempotency_key());
    }
}
