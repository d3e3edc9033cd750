use std::fmt;
use std::str::FromStr;

use super::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Manager,
    WarehouseKeeper,
    Staff,
}

impl Role {
    pub fn can_decide(self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::WarehouseKeeper)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::WarehouseKeeper => "warehouse_keeper",
            Role::Staff => "staff",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" | "quản lý" => Ok(Role::Manager),
            "warehouse_keeper" | "keeper" | "thủ kho" => Ok(Role::WarehouseKeeper),
            "staff" | "nhân viên" => Ok(Role::Staff),
            other => Err(DomainError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub username: String,
    pub role: Role,
}

impl Actor {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn ensure_can_decide(&self) -> Result<(), DomainError> {
        if self.role.can_decide() {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "{} ({}) may not approve or reject vouchers",
                self.username, self.role
            )))
        }
    }
}
