//! Inventory Ledger
//!
//! `Book::number_available_volumes` is adjusted only through [`Book::take_copy`]
//! (loan creation) and [`Book::restore_copy`] (loan return). Callers persist the
//! new count in the same store transaction as the loan row that caused it.
//!
//! # Invariants
//! - The counter never goes below zero.
//! - For every book, `initial volumes - open loans == available volumes`.
//! - There is no upper bound: the catalog does not record a total copy count.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::book::Book;
use super::error::DomainError;

/// Number of copies currently on the shelf (zero or positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Volumes(i32);

impl Volumes {
    /// # Errors
    /// - `DomainError::InvalidVolumes` if `count < 0`
    pub fn new(count: i32) -> Result<Self, DomainError> {
        if count < 0 {
            return Err(DomainError::InvalidVolumes(count));
        }
        Ok(Self(count))
    }

    pub fn count(self) -> i32 {
        self.0
    }

    pub fn is_depleted(self) -> bool {
        self.0 == 0
    }

    /// Hand out one copy. `None` when the shelf is empty.
    pub fn decrement(self) -> Option<Self> {
        if self.is_depleted() {
            None
        } else {
            Some(Self(self.0 - 1))
        }
    }

    pub fn increment(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl TryFrom<i32> for Volumes {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Volumes::new(value)
    }
}

impl From<Volumes> for i32 {
    fn from(volumes: Volumes) -> Self {
        volumes.0
    }
}

impl fmt::Display for Volumes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Book {
    /// Ledger `decrement`: take one copy off the shelf for a new loan.
    ///
    /// Leaves the book untouched and fails with `NoCopiesAvailable` when the
    /// counter is already at (or, for corrupt rows, below) zero.
    pub fn take_copy(&mut self) -> Result<Volumes, DomainError> {
        let depleted = DomainError::NoCopiesAvailable {
            book_id: self.book_id,
        };
        let current = Volumes::new(self.number_available_volumes).map_err(|_| depleted.clone())?;
        let next = current.decrement().ok_or(depleted)?;
        self.number_available_volumes = next.count();
        Ok(next)
    }

    /// Ledger `increment`: put one copy back on the shelf after a return.
    pub fn restore_copy(&mut self) -> Volumes {
        let next = Volumes(self.number_available_volumes.max(0)).increment();
        self.number_available_volumes = next.count();
        next
    }
}
