//! Return Handler
//!
//! Closes a loan, computes the late fine and credits the copy back to the
//! inventory ledger in the same store transaction.

use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::{resolve_return_date, DomainError, Identity, Loan, OperationContext};
use crate::error::AppResult;
use crate::store::Store;

use super::ReturnCommand;

pub const RETURN_FOR_OTHER: &str = "You can't return another user's loan.";

/// Handler for loan returns
#[derive(Clone)]
pub struct ReturnHandler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl ReturnHandler {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Execute the return command
    pub async fn execute(
        &self,
        command: ReturnCommand,
        identity: &Identity,
        context: &OperationContext,
    ) -> AppResult<Loan> {
        let mut tx = self.store.begin().await?;

        // Locks the row: a concurrent return of this loan waits here
        let loan = tx
            .loan_for_update(command.loan_id)
            .await?
            .ok_or(DomainError::LoanNotFound(command.loan_id))?;

        identity.authorize_for(loan.user_id, RETURN_FOR_OTHER)?;

        let return_date = resolve_return_date(command.return_date, self.clock.today());
        let closure = loan.close(return_date)?;
        let loan = loan.apply(closure);

        match tx.book_for_update(loan.book_id).await? {
            Some(mut book) => {
                let restored = book.restore_copy();
                tx.save_available_volumes(book.book_id, restored.count())
                    .await?;
            }
            None => {
                tracing::warn!(
                    loan_id = loan.loan_id,
                    book_id = loan.book_id,
                    "Book of returned loan no longer exists, inventory not credited"
                );
            }
        }

        tx.save_closed_loan(&loan).await?;
        tx.commit().await?;

        tracing::info!(
            loan_id = loan.loan_id,
            book_id = loan.book_id,
            user_id = loan.user_id,
            return_date = %return_date,
            fine = ?loan.loan_fine,
            correlation_id = ?context.correlation_id,
            "Loan returned"
        );

        Ok(loan)
    }
}
