//! Read side a table device needs to rebuild its state
//!
//! [`HttpClient`] is the real implementation; the reconciliation driver and
//! the payment poller only see this trait.

use async_trait::async_trait;
use shared::bill::ActiveBillView;
use shared::dto::{DraftOrderHandle, PaymentReturnResult};
use shared::order::Order;
use shared::session::Session;

use crate::{ClientResult, HttpClient};

#[async_trait]
pub trait TableApi: Send + Sync {
    async fn open_draft_order(&self) -> ClientResult<DraftOrderHandle>;
    async fn active_session(&self) -> ClientResult<Option<Session>>;
    async fn session_orders(&self) -> ClientResult<Vec<Order>>;
    async fn order(&self, order_id: &str) -> ClientResult<Order>;
    async fn active_bill(&self) -> ClientResult<ActiveBillView>;
    async fn verify_payment_return(
        &self,
        params: &[(String, String)],
    ) -> ClientResult<PaymentReturnResult>;
}

#[async_trait]
impl TableApi for HttpClient {
    async fn open_draft_order(&self) -> ClientResult<DraftOrderHandle> {
        HttpClient::open_draft_order(self).await
    }

    async fn active_session(&self) -> ClientResult<Option<Session>> {
        HttpClient::active_session(self).await
    }

    async fn session_orders(&self) -> ClientResult<Vec<Order>> {
        HttpClient::session_orders(self).await
    }

    async fn order(&self, order_id: &str) -> ClientResult<Order> {
        HttpClient::order(self, order_id).await
    }

    async fn active_bill(&self) -> ClientResult<ActiveBillView> {
        HttpClient::active_bill(self).await
    }

    async fn verify_payment_return(
        &self,
        params: &[(String, String)],
    ) -> ClientResult<PaymentReturnResult> {
        HttpClient::verify_payment_return(self, params).await
    }
}
