//! Command and query handlers
//!
//! Handlers orchestrate domain rules over the storage ports. Loan mutations
//! each run inside a single store transaction.

mod borrow_handler;
mod catalog;
mod commands;
mod loan_queries;
mod return_handler;

#[cfg(test)]
mod tests;

pub use borrow_handler::{BorrowHandler, BORROW_FOR_OTHER};
pub use catalog::CatalogHandler;
pub use commands::*;
pub use loan_queries::{LoanQueryHandler, DEFAULT_DUE_SOON_DAYS, MAX_DUE_SOON_DAYS};
pub use return_handler::{ReturnHandler, RETURN_FOR_OTHER};
