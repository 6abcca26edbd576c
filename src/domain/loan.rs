//! Loan state machine
//!
//! A loan is **Open** while `return_date` is null and becomes **Closed** exactly
//! once, when it is returned. Closed is terminal: nothing re-opens a loan or
//! sets its return date a second time.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::book::Book;
use super::error::DomainError;
use super::fine::late_fine;
use super::identity::User;

/// Default loan period when the borrower does not ask for a due date
pub const DEFAULT_LOAN_PERIOD_DAYS: u64 = 14;

/// Loan lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Open,
    Closed,
}

/// One copy of one book lent to one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Loan {
    pub loan_id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub loan_due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub loan_fine: Option<Decimal>,
}

/// A loan about to be inserted (always Open)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoan {
    pub user_id: i64,
    pub book_id: i64,
    pub loan_due_date: NaiveDate,
}

impl NewLoan {
    pub fn into_loan(self, loan_id: i64) -> Loan {
        Loan {
            loan_id,
            user_id: self.user_id,
            book_id: self.book_id,
            loan_due_date: self.loan_due_date,
            return_date: None,
            loan_fine: None,
        }
    }
}

/// Outcome of closing a loan, ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanClosure {
    pub return_date: NaiveDate,
    pub loan_fine: Option<Decimal>,
}

/// Due date for a new loan: the requested one, else `today + 14 days`.
pub fn resolve_due_date(requested: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    requested.unwrap_or_else(|| {
        today
            .checked_add_days(Days::new(DEFAULT_LOAN_PERIOD_DAYS))
            .unwrap_or(NaiveDate::MAX)
    })
}

/// Return date for a return request: the requested one, else today.
pub fn resolve_return_date(requested: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    requested.unwrap_or(today)
}

impl Loan {
    pub fn status(&self) -> LoanStatus {
        if self.return_date.is_some() {
            LoanStatus::Closed
        } else {
            LoanStatus::Open
        }
    }

    pub fn is_open(&self) -> bool {
        self.status() == LoanStatus::Open
    }

    /// Open and past its due date
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_open() && self.loan_due_date < today
    }

    /// Open, not yet overdue, and due within `days` of today
    pub fn is_due_within(&self, today: NaiveDate, days: u64) -> bool {
        let horizon = today.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
        self.is_open() && self.loan_due_date >= today && self.loan_due_date <= horizon
    }

    /// Open -> Closed transition.
    ///
    /// Rejects a second return with `AlreadyReturned`. A fine is charged only
    /// when `return_date` falls after the due date.
    pub fn close(&self, return_date: NaiveDate) -> Result<LoanClosure, DomainError> {
        if !self.is_open() {
            return Err(DomainError::AlreadyReturned {
                loan_id: self.loan_id,
            });
        }

        Ok(LoanClosure {
            return_date,
            loan_fine: late_fine(self.loan_due_date, return_date),
        })
    }

    /// Apply a closure produced by [`Loan::close`]
    pub fn apply(mut self, closure: LoanClosure) -> Self {
        self.return_date = Some(closure.return_date);
        self.loan_fine = closure.loan_fine;
        self
    }
}

/// Loan with its borrower and book resolved, as listed and exported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub user: User,
    pub book: Book,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn open_loan(due: NaiveDate) -> Loan {
        NewLoan {
            user_id: 1,
            book_id: 2,
            loan_due_date: due,
        }
        .into_loan(3)
    }

    #[test]
    fn test_default_due_date_is_fourteen_days_out() {
        assert_eq!(resolve_due_date(None, date(2024, 1, 1)), date(2024, 1, 15));
        assert_eq!(resolve_due_date(None, date(2024, 12, 25)), date(2025, 1, 8));
    }

    #[test]
    fn test_requested_due_date_wins() {
        let requested = date(2024, 2, 1);
        assert_eq!(resolve_due_date(Some(requested), date(2024, 1, 1)), requested);
        assert_eq!(resolve_return_date(None, date(2024, 3, 3)), date(2024, 3, 3));
    }

    #[test]
    fn test_new_loan_is_open() {
        let loan = open_loan(date(2024, 1, 1));
        assert_eq!(loan.status(), LoanStatus::Open);
        assert!(loan.loan_fine.is_none());
    }

    #[test]
    fn test_late_close_charges_fine() {
        let loan = open_loan(date(2024, 1, 1));
        let closure = loan.close(date(2024, 1, 4)).unwrap();
        assert_eq!(closure.loan_fine, Some(dec!(4.50)));

        let closed = loan.apply(closure);
        assert_eq!(closed.status(), LoanStatus::Closed);
        assert_eq!(closed.return_date, Some(date(2024, 1, 4)));
    }

    #[test]
    fn test_on_time_close_has_no_fine() {
        let loan = open_loan(date(2024, 1, 1));
        let closure = loan.close(date(2024, 1, 1)).unwrap();
        assert_eq!(closure.loan_fine, None);
    }

    #[test]
    fn test_closed_loan_cannot_close_again() {
        let loan = open_loan(date(2024, 1, 1));
        let closed = loan.clone().apply(loan.close(date(2024, 1, 2)).unwrap());

        assert_eq!(
            closed.close(date(2024, 1, 3)),
            Err(DomainError::AlreadyReturned { loan_id: 3 })
        );
    }

    #[test]
    fn test_overdue_and_due_soon_windows() {
        let today = date(2024, 5, 10);
        assert!(open_loan(date(2024, 5, 9)).is_overdue(today));
        assert!(!open_loan(date(2024, 5, 10)).is_overdue(today));

        assert!(open_loan(date(2024, 5, 10)).is_due_within(today, 3));
        assert!(open_loan(date(2024, 5, 13)).is_due_within(today, 3));
        assert!(!open_loan(date(2024, 5, 14)).is_due_within(today, 3));
        assert!(!open_loan(date(2024, 5, 9)).is_due_within(today, 3));

        let loan = open_loan(date(2024, 5, 1));
        let closed = loan.clone().apply(loan.close(date(2024, 5, 2)).unwrap());
        assert!(!closed.is_overdue(today));
    }

    #[test]
    fn test_loan_fine_serializes_as_string() {
        let loan = open_loan(date(2024, 1, 1));
        let closed = loan.clone().apply(loan.close(date(2024, 1, 4)).unwrap());
        let json = serde_json::to_value(&closed).unwrap();
        assert_eq!(json["loan_fine"], "4.50");
        assert_eq!(json["loan_due_date"], "2024-01-01");
    }
}
