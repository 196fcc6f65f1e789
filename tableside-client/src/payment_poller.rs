//! Payment return handling
//!
//! The gateway redirects the customer back before (or after) its server-side
//! notification arrives; only the notification moves the bill to `PAID`. The
//! return page verifies the signature, then polls the active bill until it is
//! paid or the deadline passes. A timeout is not a failure: it surfaces as
//! [`ClientError::ConfirmationPending`] so the user can check again later.

use std::time::Duration;

use shared::bill::{Bill, BillStatus};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{ClientConfig, ClientError, ClientResult, TableApi};

/// Gateway response code for an approved transaction
const GATEWAY_SUCCESS_CODE: &str = "00";

/// Result of a payment return
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentReturn {
    Paid(Bill),
    /// Gateway reported a declined / cancelled payment
    Failed { response_code: String },
    /// Signature did not verify; nothing was polled
    Unverified,
}

#[derive(Debug, Clone)]
pub struct PaymentPoller<A> {
    api: A,
    interval: Duration,
    timeout: Duration,
}

impl<A: TableApi> PaymentPoller<A> {
    pub fn new(api: A, config: &ClientConfig) -> Self {
        Self {
            api,
            interval: config.poll_interval,
            timeout: config.poll_timeout,
        }
    }

    pub fn with_timing(api: A, interval: Duration, timeout: Duration) -> Self {
        Self {
            api,
            interval,
            timeout,
        }
    }

    /// Verify the return query, then wait for the confirmation
    pub async fn handle_return(
        &self,
        params: &[(String, String)],
        cancel: &CancellationToken,
    ) -> ClientResult<PaymentReturn> {
        let result = self.api.verify_payment_return(params).await?;
        if !result.verified {
            tracing::warn!(payment_id = ?result.payment_id, "Payment return signature not verified");
            return Ok(PaymentReturn::Unverified);
        }
        if let Some(code) = result.response_code
            && code != GATEWAY_SUCCESS_CODE
        {
            return Ok(PaymentReturn::Failed {
                response_code: code,
            });
        }
        self.wait_until_paid(cancel).await.map(PaymentReturn::Paid)
    }

    /// Poll the active bill until it is `PAID`
    pub async fn wait_until_paid(&self, cancel: &CancellationToken) -> ClientResult<Bill> {
        let deadline = Instant::now() + self.timeout;

        loop {
            match self.api.active_bill().await {
                Ok(view) if view.bill.status == BillStatus::Paid => return Ok(view.bill),
                Ok(view) => {
                    tracing::debug!(bill_id = %view.bill.bill_id, status = %view.bill.status, "Waiting for payment confirmation");
                }
                // 网络抖动: 继续轮询
                Err(e @ (ClientError::Http(_) | ClientError::Io(_))) => {
                    tracing::warn!(error = %e, "Bill poll failed");
                }
                Err(e) => return Err(e),
            }

            if Instant::now() + self.interval > deadline {
                return Err(ClientError::ConfirmationPending);
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
