//! Borrow Handler
//!
//! Creates a loan and takes one copy out of the inventory ledger in the
//! same store transaction.

use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::{resolve_due_date, DomainError, Identity, Loan, NewLoan, OperationContext};
use crate::error::AppResult;
use crate::store::Store;

use super::BorrowCommand;

pub const BORROW_FOR_OTHER: &str = "You can't borrow a book for another user.";

/// Handler for new loans
#[derive(Clone)]
pub struct BorrowHandler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl BorrowHandler {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Execute the borrow command
    pub async fn execute(
        &self,
        command: BorrowCommand,
        identity: &Identity,
        context: &OperationContext,
    ) -> AppResult<Loan> {
        identity.authorize_for(command.user_id, BORROW_FOR_OTHER)?;

        let mut tx = self.store.begin().await?;

        // Locks the row: concurrent borrows of this book wait here
        let mut book = tx
            .book_for_update(command.book_id)
            .await?
            .ok_or(DomainError::BookNotFound(command.book_id))?;

        if !tx.user_exists(command.user_id).await? {
            return Err(DomainError::UserNotFound(command.user_id.to_string()).into());
        }

        let remaining = book.take_copy()?;
        let loan_due_date = resolve_due_date(command.loan_due_date, self.clock.today());

        let loan = tx
            .insert_loan(NewLoan {
                user_id: command.user_id,
                book_id: command.book_id,
                loan_due_date,
            })
            .await?;
        tx.save_available_volumes(book.book_id, remaining.count())
            .await?;
        tx.commit().await?;

        tracing::info!(
            loan_id = loan.loan_id,
            book_id = loan.book_id,
            user_id = loan.user_id,
            due_date = %loan.loan_due_date,
            remaining = remaining.count(),
            correlation_id = ?context.correlation_id,
            "Loan created"
        );

        Ok(loan)
    }
}
