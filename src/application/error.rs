use thiserror::Error;

use crate::domain::{Cents, ReservationKey, UserId};

/// Every outcome of a core operation other than success.
#[derive(Error, Debug)]
pub enum AppError {
    // Validation: rejected before touching storage
    #[error("amount must be positive")]
    InvalidAmount,

    #[error("impossible to transfer to yourself")]
    InvalidTransfer,

    #[error("cost must be non-negative")]
    InvalidCost,

    #[error("unknown sort field: {0}")]
    InvalidOrderField(String),

    #[error("invalid pagination: limit {limit}, offset {offset}")]
    InvalidPagination { limit: i64, offset: i64 },

    #[error("invalid report month: {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },

    // Domain conflicts
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("insufficient funds for user {user_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        user_id: UserId,
        balance: Cents,
        required: Cents,
    },

    #[error("service has already been reserved: {0}")]
    AlreadyReserved(ReservationKey),

    #[error("record not found: {0}")]
    RecordNotFound(ReservationKey),

    /// The cause is logged where the failure is converted.
    #[error("internal server error")]
    Internal,
}

/// Coarse classification for transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something malformed
    Validation,
    /// Well-formed request that violates a business rule
    Conflict,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidAmount
            | AppError::InvalidTransfer
            | AppError::InvalidCost
            | AppError::InvalidOrderField(_)
            | AppError::InvalidPagination { .. }
            | AppError::InvalidMonth { .. } => ErrorKind::Validation,
            AppError::UserNotFound(_)
            | AppError::InsufficientFunds { .. }
            | AppError::AlreadyReserved(_)
            | AppError::RecordNotFound(_) => ErrorKind::Conflict,
            AppError::Internal => ErrorKind::Internal,
        }
    }
}

/// Backend failures cross into the taxonomy here. The full context chain is
/// logged and the caller only ever sees `Internal`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("internal failure: {:#}", err);
        AppError::Internal
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(AppError::InvalidTransfer.kind(), ErrorKind::Validation);
        assert_eq!(
            AppError::InvalidMonth {
                year: 2024,
                month: 13
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(AppError::UserNotFound(1).kind(), ErrorKind::Conflict);
        assert_eq!(
            AppError::AlreadyReserved(ReservationKey::new(7, 42, 3)).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(AppError::Internal.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_backend_detail_does_not_leak() {
        let err: AppError = anyhow!("disk I/O error at /var/lib/billing.db")
            .context("Failed to commit transfer")
            .into();
        assert!(matches!(err, AppError::Internal));
        assert_eq!(err.to_string(), "internal server error");
    }

    #[test]
    fn test_conflict_messages() {
        let key = ReservationKey::new(7, 42, 3);
        assert_eq!(
            AppError::RecordNotFound(key).to_string(),
            "record not found: (order 7, user 42, service 3)"
        );
        assert_eq!(
            AppError::InsufficientFunds {
                user_id: 42,
                balance: 0,
                required: 600
            }
            .to_string(),
            "insufficient funds for user 42: balance 0, required 600"
        );
    }
}
