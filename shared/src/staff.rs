//! Staff roles

use serde::{Deserialize, Serialize};

/// 员工角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    /// KDS: cooks lines
    Kitchen,
    /// Floor: accepts orders, serves, settles bills
    Waiter,
    Admin,
}

impl StaffRole {
    pub const ALL: [StaffRole; 3] = [StaffRole::Kitchen, StaffRole::Waiter, StaffRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Kitchen => "kitchen",
            StaffRole::Waiter => "waiter",
            StaffRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kitchen" => Ok(StaffRole::Kitchen),
            "waiter" => Ok(StaffRole::Waiter),
            "admin" => Ok(StaffRole::Admin),
            other => Err(format!("unknown staff role: {other}")),
        }
    }
}
