//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

/// Loan and inventory errors
///
/// These errors represent business rule violations and domain invariant failures.
/// They are independent of the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Book not found")]
    BookNotFound(i64),

    #[error("Loan not found")]
    LoanNotFound(i64),

    #[error("User not found")]
    UserNotFound(String),

    /// The inventory ledger has no copy left to hand out
    #[error("No available copies to borrow")]
    NoCopiesAvailable { book_id: i64 },

    /// Loan is already closed
    #[error("Book already returned")]
    AlreadyReturned { loan_id: i64 },

    /// Caller is neither the owner of the resource nor an admin
    #[error("{0}")]
    Forbidden(String),

    #[error("Number of available volumes cannot be negative (got {0})")]
    InvalidVolumes(i32),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DomainError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Check if this error comes from the loan state machine or the inventory ledger
    pub fn is_lifecycle_violation(&self) -> bool {
        matches!(
            self,
            Self::NoCopiesAvailable { .. } | Self::AlreadyReturned { .. }
        )
    }
}
