//! Domain module
//!
//! Core domain types and business rules: catalog records, the inventory
//! ledger, the loan state machine, fines and authorization.

pub mod book;
pub mod context;
pub mod error;
pub mod fine;
pub mod identity;
pub mod inventory;
pub mod loan;

pub use book::{Book, BookChanges, NewBook};
pub use context::OperationContext;
pub use error::DomainError;
pub use fine::{days_late, fine_per_day, format_fine, late_fine};
pub use identity::{Identity, User};
pub use inventory::Volumes;
pub use loan::{
    resolve_due_date, resolve_return_date, Loan, LoanClosure, LoanDetails, LoanStatus, NewLoan,
    DEFAULT_LOAN_PERIOD_DAYS,
};
