//! Command definitions
//!
//! Commands represent intentions to change loan state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Borrow one copy of a book on behalf of `user_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowCommand {
    pub user_id: i64,
    pub book_id: i64,
    /// Defaults to today + 14 days
    #[serde(default)]
    pub loan_due_date: Option<NaiveDate>,
}

impl BorrowCommand {
    pub fn new(user_id: i64, book_id: i64) -> Self {
        Self {
            user_id,
            book_id,
            loan_due_date: None,
        }
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.loan_due_date = Some(due_date);
        self
    }
}

/// Close an open loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnCommand {
    pub loan_id: i64,
    /// Defaults to today
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
}

impl ReturnCommand {
    pub fn new(loan_id: i64) -> Self {
        Self {
            loan_id,
            return_date: None,
        }
    }

    pub fn with_return_date(mut self, return_date: NaiveDate) -> Self {
        self.return_date = Some(return_date);
        self
    }
}
