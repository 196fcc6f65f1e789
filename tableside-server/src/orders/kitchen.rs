//! Auto-cook - 后台厨房模拟
//!
//! Listens on the message bus. Every accepted order gets its own task that
//! starts each queued line, waits the prep time and readies it, acting as
//! [`Actor::AutoCook`] through the normal command path.
//!
//! ```text
//! order.accepted ──▶ spawn job(order) ──▶ start_line → sleep(prep) → ready_line …
//! order.status_changed{cancelled|served|ready_to_service} ──▶ cancel job
//! session.closed ──▶ cancel every job of the session
//! ```
//!
//! Cancelling a job stops future transitions; applied ones stay. A
//! transition that lost a race against staff is logged and skipped.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use shared::message::{BusMessage, RealtimeEvent};
use shared::order::{LineStatus, OrderStatus};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::command::{CommandPayload, DiningCommand};
use super::manager::{DiningManager, ManagerError};
use super::traits::{Actor, OrderError};

/// Running job of one order
#[derive(Debug, Clone)]
struct CookJob {
    session_id: String,
    token: CancellationToken,
}

/// 自动出餐模拟器
#[derive(Debug, Clone)]
pub struct AutoCook {
    manager: Arc<DiningManager>,
    prep_time: Duration,
    jobs: Arc<DashMap<String, CookJob>>,
}

impl AutoCook {
    pub fn new(manager: Arc<DiningManager>, prep_time: Duration) -> Self {
        Self {
            manager,
            prep_time,
            jobs: Arc::new(DashMap::new()),
        }
    }

    /// Number of orders currently being cooked
    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_cooking(&self, order_id: &str) -> bool {
        self.jobs.contains_key(order_id)
    }

    /// 运行监听循环（阻塞直到 shutdown 或总线关闭）
    pub async fn run(self, mut rx: broadcast::Receiver<BusMessage>, shutdown: CancellationToken) {
        tracing::info!(prep_secs = self.prep_time.as_secs_f64(), "Auto-cook started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(msg) => self.handle(&msg, &shutdown),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auto-cook lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        for job in self.jobs.iter() {
            job.token.cancel();
        }
        self.jobs.clear();
        tracing::info!("Auto-cook stopped");
    }

    /// React to one bus message
    pub fn handle(&self, msg: &BusMessage, shutdown: &CancellationToken) {
        match &msg.event {
            RealtimeEvent::OrderAccepted { order_id } => {
                self.spawn_job(order_id, &msg.session_id, shutdown);
            }
            RealtimeEvent::OrderStatusChanged { order_id, status }
            | RealtimeEvent::OrderLineStatusChanged {
                order_id,
                order_status: Some(status),
                ..
            } if matches!(
                status,
                OrderStatus::Cancelled | OrderStatus::Served | OrderStatus::ReadyToService
            ) =>
            {
                self.cancel_order(order_id);
            }
            RealtimeEvent::SessionClosed { session_id, .. } => self.cancel_session(session_id),
            _ => {}
        }
    }

    fn spawn_job(&self, order_id: &str, session_id: &str, shutdown: &CancellationToken) {
        if self.jobs.contains_key(order_id) {
            return;
        }
        let token = shutdown.child_token();
        self.jobs.insert(
            order_id.to_string(),
            CookJob {
                session_id: session_id.to_string(),
                token: token.clone(),
            },
        );

        let manager = self.manager.clone();
        let jobs = self.jobs.clone();
        let prep_time = self.prep_time;
        let order_id = order_id.to_string();
        tokio::spawn(async move {
            cook_order(&manager, &order_id, prep_time, &token).await;
            jobs.remove(&order_id);
        });
    }

    pub fn cancel_order(&self, order_id: &str) {
        if let Some((_, job)) = self.jobs.remove(order_id) {
            job.token.cancel();
            tracing::debug!(order_id, "Auto-cook job cancelled");
        }
    }

    pub fn cancel_session(&self, session_id: &str) {
        self.jobs.retain(|order_id, job| {
            if job.session_id == session_id {
                job.token.cancel();
                tracing::debug!(order_id = %order_id, session_id, "Auto-cook job cancelled (session closed)");
                false
            } else {
                true
            }
        });
    }
}

/// Cook every queued line of one order, one after another
async fn cook_order(
    manager: &DiningManager,
    order_id: &str,
    prep_time: Duration,
    token: &CancellationToken,
) {
    let queued: Vec<String> = match manager.get_order(order_id) {
        Ok(order) => order
            .items
            .iter()
            .filter(|l| l.status == LineStatus::Queued)
            .map(|l| l.line_id.clone())
            .collect(),
        Err(e) => {
            tracing::warn!(order_id, error = %e, "Auto-cook cannot load order");
            return;
        }
    };

    for line_id in queued {
        if token.is_cancelled() {
            return;
        }
        let started = step(
            manager,
            CommandPayload::StartLine {
                order_id: order_id.to_string(),
                line_id: line_id.clone(),
            },
        );
        if !started {
            continue;
        }

        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(prep_time) => {}
        }

        step(
            manager,
            CommandPayload::ReadyLine {
                order_id: order_id.to_string(),
                line_id,
            },
        );
    }
    tracing::debug!(order_id, "Auto-cook finished order");
}

/// Run one transition; `false` when it was refused
fn step(manager: &DiningManager, payload: CommandPayload) -> bool {
    let name = payload.name();
    match manager.execute(DiningCommand::new(Actor::AutoCook, payload)) {
        Ok(_) => true,
        Err(ManagerError::Order(
            e @ (OrderError::InvalidTransition { .. } | OrderError::LineNotFound { .. }),
        )) => {
            // staff got there first
            tracing::debug!(command = name, error = %e, "Auto-cook transition skipped");
            false
        }
        Err(e) => {
            tracing::warn!(command = name, error = %e, "Auto-cook transition failed");
            false
        }
    }
}
