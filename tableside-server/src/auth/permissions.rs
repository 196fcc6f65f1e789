//! Staff permissions
//!
//! Fixed role → action table:
//! - kitchen: start / ready / start-order / send-to-waiter / cancel-line
//! - waiter: accept / reject / served / cash-paid / accept-bill / cancel-line / issue-token
//! - admin: everything

use shared::error::{AppError, ErrorCode};
use shared::staff::StaffRole;

use super::CurrentUser;

/// 员工操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffAction {
    ViewOrders,
    AcceptOrder,
    RejectOrder,
    StartLine,
    ReadyLine,
    StartOrder,
    SendToWaiter,
    MarkServed,
    CancelLine,
    ViewBills,
    MarkCashPaid,
    AcceptBill,
    IssueTableToken,
}

impl StaffAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffAction::ViewOrders => "orders:view",
            StaffAction::AcceptOrder => "orders:accept",
            StaffAction::RejectOrder => "orders:reject",
            StaffAction::StartLine => "lines:start",
            StaffAction::ReadyLine => "lines:ready",
            StaffAction::StartOrder => "orders:start",
            StaffAction::SendToWaiter => "orders:send_to_waiter",
            StaffAction::MarkServed => "orders:served",
            StaffAction::CancelLine => "lines:cancel",
            StaffAction::ViewBills => "bills:view",
            StaffAction::MarkCashPaid => "bills:cash_paid",
            StaffAction::AcceptBill => "bills:accept",
            StaffAction::IssueTableToken => "tables:issue_token",
        }
    }
}

/// Does `role` allow `action`?
pub fn can(role: StaffRole, action: StaffAction) -> bool {
    use StaffAction::*;
    match role {
        StaffRole::Admin => true,
        StaffRole::Kitchen => matches!(
            action,
            ViewOrders | StartLine | ReadyLine | StartOrder | SendToWaiter | CancelLine
        ),
        StaffRole::Waiter => matches!(
            action,
            ViewOrders
                | AcceptOrder
                | RejectOrder
                | MarkServed
                | CancelLine
                | ViewBills
                | MarkCashPaid
                | AcceptBill
                | IssueTableToken
        ),
    }
}

impl CurrentUser {
    /// 权限检查，失败返回 PermissionDenied
    pub fn require(&self, action: StaffAction) -> Result<(), AppError> {
        if can(self.role, action) {
            return Ok(());
        }
        crate::security_log!(
            "WARN",
            "permission_denied",
            user_id = self.id.as_str(),
            role = self.role.as_str(),
            action = action.as_str()
        );
        Err(AppError::with_message(
            ErrorCode::PermissionDenied,
            format!("Role {} may not perform {}", self.role, action.as_str()),
        )
        .with_detail("action", action.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: StaffRole) -> CurrentUser {
        CurrentUser {
            id: "u1".into(),
            username: "u".into(),
            role,
        }
    }

    #[test]
    fn test_kitchen_permissions() {
        assert!(can(StaffRole::Kitchen, StaffAction::StartLine));
        assert!(can(StaffRole::Kitchen, StaffAction::SendToWaiter));
        assert!(!can(StaffRole::Kitchen, StaffAction::AcceptOrder));
        assert!(!can(StaffRole::Kitchen, StaffAction::MarkCashPaid));
    }

    #[test]
    fn test_waiter_permissions() {
        assert!(can(StaffRole::Waiter, StaffAction::AcceptOrder));
        assert!(can(StaffRole::Waiter, StaffAction::AcceptBill));
        assert!(can(StaffRole::Waiter, StaffAction::CancelLine));
        assert!(!can(StaffRole::Waiter, StaffAction::ReadyLine));
    }

    #[test]
    fn test_require() {
        assert!(user(StaffRole::Admin).require(StaffAction::ReadyLine).is_ok());
        let err = user(StaffRole::Kitchen)
            .require(StaffAction::AcceptBill)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }
}
