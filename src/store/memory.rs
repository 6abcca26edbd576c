//! In-memory store
//!
//! Keeps every table in one mutex-guarded state. A transaction holds the
//! mutex for its whole lifetime and works on a staged copy that replaces the
//! shared state on commit; dropping it discards the copy. Transactions are
//! therefore fully serialized, which is stricter than the per-row locking of
//! the Postgres adapter.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{Book, BookChanges, Loan, LoanDetails, NewBook, NewLoan, User};

use super::{
    LibraryStats, LoanHistoryFilter, NewUser, Store, StoreError, StoreTransaction, UserCredentials,
};

#[derive(Debug, Clone)]
struct StoredToken {
    user_id: i64,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<i64, UserCredentials>,
    books: BTreeMap<i64, Book>,
    loans: BTreeMap<i64, Loan>,
    tokens: HashMap<String, StoredToken>,
    last_user_id: i64,
    last_book_id: i64,
    last_loan_id: i64,
}

fn next_id(last: &mut i64) -> i64 {
    *last += 1;
    *last
}

impl MemoryState {
    /// Inner join of a loan with its user and book
    fn details(&self, loan: &Loan) -> Option<LoanDetails> {
        let user = self.users.get(&loan.user_id)?.user.clone();
        let book = self.books.get(&loan.book_id)?.clone();
        Some(LoanDetails {
            loan: loan.clone(),
            user,
            book,
        })
    }

    fn select<F>(&self, predicate: F) -> Vec<LoanDetails>
    where
        F: Fn(&Loan) -> bool,
    {
        self.loans
            .values()
            .filter(|loan| predicate(loan))
            .filter_map(|loan| self.details(loan))
            .collect()
    }
}

fn due_ascending(loans: &mut [LoanDetails]) {
    loans.sort_by(|a, b| {
        a.loan
            .loan_due_date
            .cmp(&b.loan.loan_due_date)
            .then(a.loan.loan_id.cmp(&b.loan.loan_id))
    });
}

fn due_descending(loans: &mut [LoanDetails]) {
    loans.sort_by(|a, b| {
        b.loan
            .loan_due_date
            .cmp(&a.loan.loan_due_date)
            .then(b.loan.loan_id.cmp(&a.loan.loan_id))
    });
}

/// Store backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a book without the referential check that `delete_book` applies.
    #[cfg(test)]
    pub(crate) async fn remove_book_unchecked(&self, book_id: i64) {
        self.state.lock().await.books.remove(&book_id);
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn book_for_update(&mut self, book_id: i64) -> Result<Option<Book>, StoreError> {
        Ok(self.staged.books.get(&book_id).cloned())
    }

    async fn loan_for_update(&mut self, loan_id: i64) -> Result<Option<Loan>, StoreError> {
        Ok(self.staged.loans.get(&loan_id).cloned())
    }

    async fn user_exists(&mut self, user_id: i64) -> Result<bool, StoreError> {
        Ok(self.staged.users.contains_key(&user_id))
    }

    async fn save_available_volumes(&mut self, book_id: i64, volumes: i32) -> Result<(), StoreError> {
        if let Some(book) = self.staged.books.get_mut(&book_id) {
            book.number_available_volumes = volumes;
        }
        Ok(())
    }

    async fn insert_loan(&mut self, loan: NewLoan) -> Result<Loan, StoreError> {
        if !self.staged.users.contains_key(&loan.user_id) {
            return Err(StoreError::MissingReference(format!("user {}", loan.user_id)));
        }
        if !self.staged.books.contains_key(&loan.book_id) {
            return Err(StoreError::MissingReference(format!("book {}", loan.book_id)));
        }

        let loan_id = next_id(&mut self.staged.last_loan_id);
        let loan = loan.into_loan(loan_id);
        self.staged.loans.insert(loan_id, loan.clone());
        Ok(loan)
    }

    async fn save_closed_loan(&mut self, loan: &Loan) -> Result<(), StoreError> {
        if let Some(stored) = self.staged.loans.get_mut(&loan.loan_id) {
            stored.return_date = loan.return_date;
            stored.loan_fine = loan.loan_fine;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.user.username == user.username) {
            return Err(StoreError::Duplicate("username".to_string()));
        }
        if state.users.values().any(|u| u.user.user_email == user.user_email) {
            return Err(StoreError::Duplicate("user_email".to_string()));
        }

        let user_id = next_id(&mut state.last_user_id);
        let created = User {
            user_id,
            username: user.username,
            user_email: user.user_email,
            is_admin: user.is_admin,
        };
        state.users.insert(
            user_id,
            UserCredentials {
                user: created.clone(),
                hashed_password: user.hashed_password,
            },
        );
        Ok(created)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .find_credentials(username)
            .await?
            .map(|credentials| credentials.user))
    }

    async fn find_credentials(&self, username: &str) -> Result<Option<UserCredentials>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.user.username == username)
            .cloned())
    }

    async fn save_token(
        &self,
        token_hash: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::MissingReference(format!("user {}", user_id)));
        }
        state.tokens.insert(
            token_hash.to_string(),
            StoredToken {
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn find_token_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .tokens
            .get(token_hash)
            .filter(|token| token.expires_at > now)
            .and_then(|token| state.users.get(&token.user_id))
            .map(|credentials| credentials.user.clone()))
    }

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.tokens.len();
        state.tokens.retain(|_, token| token.expires_at > now);
        Ok((before - state.tokens.len()) as u64)
    }

    async fn create_book(&self, book: NewBook) -> Result<Book, StoreError> {
        let mut state = self.state.lock().await;
        let book_id = next_id(&mut state.last_book_id);
        let book = book.into_book(book_id);
        state.books.insert(book_id, book.clone());
        Ok(book)
    }

    async fn list_books(&self) -> Result<Vec<Book>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.books.values().cloned().collect())
    }

    async fn search_books(&self, name: &str) -> Result<Vec<Book>, StoreError> {
        let needle = name.to_lowercase();
        let state = self.state.lock().await;
        Ok(state
            .books
            .values()
            .filter(|book| book.book_name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn update_book(&self, book_id: i64, changes: BookChanges) -> Result<Option<Book>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.books.get_mut(&book_id).map(|book| {
            changes.apply_to(book);
            book.clone()
        }))
    }

    async fn delete_book(&self, book_id: i64) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if !state.books.contains_key(&book_id) {
            return Ok(false);
        }
        if state.loans.values().any(|loan| loan.book_id == book_id) {
            return Err(StoreError::InUse("Book has loan records".to_string()));
        }
        state.books.remove(&book_id);
        Ok(true)
    }

    async fn loans_for_user(&self, user_id: i64) -> Result<Vec<LoanDetails>, StoreError> {
        let state = self.state.lock().await;
        let mut loans = state.select(|loan| loan.user_id == user_id);
        due_descending(&mut loans);
        Ok(loans)
    }

    async fn overdue_loans(&self, today: NaiveDate) -> Result<Vec<LoanDetails>, StoreError> {
        let state = self.state.lock().await;
        let mut loans = state.select(|loan| loan.is_overdue(today));
        due_ascending(&mut loans);
        Ok(loans)
    }

    async fn loans_due_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<LoanDetails>, StoreError> {
        let state = self.state.lock().await;
        let mut loans = state.select(|loan| {
            loan.is_open() && loan.loan_due_date >= from && loan.loan_due_date <= until
        });
        due_ascending(&mut loans);
        Ok(loans)
    }

    async fn loan_history(&self, filter: LoanHistoryFilter) -> Result<Vec<LoanDetails>, StoreError> {
        let state = self.state.lock().await;
        let mut loans = state.select(|loan| filter.matches(loan));
        due_descending(&mut loans);
        Ok(loans)
    }

    async fn stats(&self, today: NaiveDate) -> Result<LibraryStats, StoreError> {
        let state = self.state.lock().await;
        Ok(LibraryStats {
            total_users: state.users.len() as i64,
            total_books: state.books.len() as i64,
            active_loans: state.loans.values().filter(|loan| loan.is_open()).count() as i64,
            overdue_loans: state
                .loans
                .values()
                .filter(|loan| loan.is_overdue(today))
                .count() as i64,
        })
    }
}
