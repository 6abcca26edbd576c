//! Loan queries
//!
//! Read-only listings and admin statistics. No state transitions happen here.

use std::sync::Arc;

use chrono::Days;

use crate::clock::Clock;
use crate::domain::{Identity, LoanDetails};
use crate::error::{AppError, AppResult};
use crate::store::{LibraryStats, LoanHistoryFilter, Store};

/// Default look-ahead window for due-soon notifications
pub const DEFAULT_DUE_SOON_DAYS: i64 = 3;
pub const MAX_DUE_SOON_DAYS: i64 = 365;

#[derive(Clone)]
pub struct LoanQueryHandler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl LoanQueryHandler {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Caller's own loans, due date descending
    pub async fn my_loans(&self, identity: &Identity) -> AppResult<Vec<LoanDetails>> {
        Ok(self.store.loans_for_user(identity.user_id).await?)
    }

    /// Open loans past their due date (admin)
    pub async fn overdue(&self, identity: &Identity) -> AppResult<Vec<LoanDetails>> {
        identity.require_admin()?;
        Ok(self.store.overdue_loans(self.clock.today()).await?)
    }

    /// Open loans due between today and today + `days` inclusive (admin)
    pub async fn due_soon(
        &self,
        identity: &Identity,
        days: Option<i64>,
    ) -> AppResult<Vec<LoanDetails>> {
        identity.require_admin()?;

        let days = days.unwrap_or(DEFAULT_DUE_SOON_DAYS);
        if !(0..=MAX_DUE_SOON_DAYS).contains(&days) {
            return Err(AppError::InvalidRequest(format!(
                "days must be between 0 and {}",
                MAX_DUE_SOON_DAYS
            )));
        }

        let today = self.clock.today();
        let until = today
            .checked_add_days(Days::new(days as u64))
            .ok_or_else(|| AppError::InvalidRequest("days out of range".to_string()))?;
        Ok(self.store.loans_due_between(today, until).await?)
    }

    /// Filtered loan history (admin)
    pub async fn history(
        &self,
        identity: &Identity,
        filter: LoanHistoryFilter,
    ) -> AppResult<Vec<LoanDetails>> {
        identity.require_admin()?;
        Ok(self.store.loan_history(filter).await?)
    }

    /// Aggregate counts (admin)
    pub async fn stats(&self, identity: &Identity) -> AppResult<LibraryStats> {
        identity.require_admin()?;
        Ok(self.store.stats(self.clock.today()).await?)
    }
}
