use thiserror::Error;

use super::voucher::VoucherStatus;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Voucher {0} not found")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Voucher {code} is {status} and can no longer be changed")]
    InvalidState { code: String, status: VoucherStatus },
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Remote table service failed: {0}")]
    Remote(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification rejected by chat service: {0}")]
    Rejected(String),
}
