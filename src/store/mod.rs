//! Storage ports
//!
//! [`Store`] is the persistence boundary of the service. Loan mutations go
//! through a [`StoreTransaction`] obtained from [`Store::begin`]: the loan row
//! and the book's available-volume counter are written in the same transaction
//! and become visible together on [`StoreTransaction::commit`]. Dropping a
//! transaction without committing rolls everything back.
//!
//! Rows read with `*_for_update` stay locked until the transaction ends, so two
//! borrows of the same book (or two returns of the same loan) are serialized.
//!
//! Adapters:
//! - [`postgres::PgStore`]: production, sqlx + Postgres row locks
//! - [`memory::MemoryStore`]: tests and local runs, one store-wide lock per transaction

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Book, BookChanges, Loan, LoanDetails, NewBook, NewLoan, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unique constraint violated on the named field
    #[error("Duplicate value for {0}")]
    Duplicate(String),

    /// Foreign key points at a row that does not exist
    #[error("Referenced row does not exist: {0}")]
    MissingReference(String),

    /// Row is still referenced and cannot be removed
    #[error("{0}")]
    InUse(String),
}

/// Registration data for a new user (password already hashed)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub user_email: String,
    pub hashed_password: String,
    pub is_admin: bool,
}

/// User together with the stored password hash
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub hashed_password: String,
}

/// Filters for the admin loan history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LoanHistoryFilter {
    #[serde(default)]
    pub user_id: Option<i64>,
    /// `Some(true)` closed loans only, `Some(false)` open loans only
    #[serde(default)]
    pub returned: Option<bool>,
}

impl LoanHistoryFilter {
    pub fn matches(&self, loan: &Loan) -> bool {
        self.user_id.map_or(true, |id| loan.user_id == id)
            && self
                .returned
                .map_or(true, |returned| loan.return_date.is_some() == returned)
    }
}

/// Aggregate counts for the admin dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub total_users: i64,
    pub total_books: i64,
    pub active_loans: i64,
    pub overdue_loans: i64,
}

/// Transaction-scoped handle for loan and inventory mutations
#[async_trait]
pub trait StoreTransaction: Send {
    /// Load a book and lock its row until the transaction ends
    async fn book_for_update(&mut self, book_id: i64) -> Result<Option<Book>, StoreError>;

    /// Load a loan and lock its row until the transaction ends
    async fn loan_for_update(&mut self, loan_id: i64) -> Result<Option<Loan>, StoreError>;

    async fn user_exists(&mut self, user_id: i64) -> Result<bool, StoreError>;

    /// Persist the inventory ledger counter of a locked book
    async fn save_available_volumes(&mut self, book_id: i64, volumes: i32) -> Result<(), StoreError>;

    async fn insert_loan(&mut self, loan: NewLoan) -> Result<Loan, StoreError>;

    /// Persist the closed state of a locked loan
    async fn save_closed_loan(&mut self, loan: &Loan) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Persistence boundary of the service
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    // Users

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_credentials(&self, username: &str) -> Result<Option<UserCredentials>, StoreError>;

    // Access tokens

    async fn save_token(
        &self,
        token_hash: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Owner of a token that has not expired at `now`
    async fn find_token_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    // Catalog

    async fn create_book(&self, book: NewBook) -> Result<Book, StoreError>;

    /// All books, by id
    async fn list_books(&self) -> Result<Vec<Book>, StoreError>;

    /// Case-insensitive substring match on the book name
    async fn search_books(&self, name: &str) -> Result<Vec<Book>, StoreError>;

    async fn update_book(&self, book_id: i64, changes: BookChanges) -> Result<Option<Book>, StoreError>;

    /// `Ok(false)` when absent; `StoreError::InUse` when loans reference it
    async fn delete_book(&self, book_id: i64) -> Result<bool, StoreError>;

    // Loan queries

    /// Loans of one user, due date descending
    async fn loans_for_user(&self, user_id: i64) -> Result<Vec<LoanDetails>, StoreError>;

    /// Open loans due before `today`, due date ascending
    async fn overdue_loans(&self, today: NaiveDate) -> Result<Vec<LoanDetails>, StoreError>;

    /// Open loans due in `[from, until]`, due date ascending
    async fn loans_due_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<LoanDetails>, StoreError>;

    /// Filtered history, due date descending then loan id descending
    async fn loan_history(&self, filter: LoanHistoryFilter) -> Result<Vec<LoanDetails>, StoreError>;

    async fn stats(&self, today: NaiveDate) -> Result<LibraryStats, StoreError>;
}

