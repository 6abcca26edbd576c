//! Catalog management
//!
//! Book and user lookups plus admin-only book maintenance. The available
//! volume count set here is the starting point of the inventory ledger.

use std::sync::Arc;

use crate::domain::{Book, BookChanges, DomainError, Identity, NewBook, User};
use crate::error::{AppError, AppResult};
use crate::store::Store;

#[derive(Clone)]
pub struct CatalogHandler {
    store: Arc<dyn Store>,
}

impl CatalogHandler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_book(&self, identity: &Identity, book: NewBook) -> AppResult<Book> {
        identity.require_admin()?;
        book.validate()?;

        let book = self.store.create_book(book).await?;
        tracing::info!(book_id = book.book_id, volumes = book.number_available_volumes, "Book created");
        Ok(book)
    }

    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        Ok(self.store.list_books().await?)
    }

    /// Case-insensitive name search; an empty result is a 404
    pub async fn search_books(&self, name: &str) -> AppResult<Vec<Book>> {
        let books = self.store.search_books(name).await?;
        if books.is_empty() {
            return Err(AppError::NotFound("No books found".to_string()));
        }
        Ok(books)
    }

    pub async fn update_book(
        &self,
        identity: &Identity,
        book_id: i64,
        changes: BookChanges,
    ) -> AppResult<Book> {
        identity.require_admin()?;
        changes.validate()?;

        let book = self
            .store
            .update_book(book_id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found.".to_string()))?;
        tracing::info!(book_id, volumes = book.number_available_volumes, "Book updated");
        Ok(book)
    }

    /// Refused with 409 while loan records still reference the book
    pub async fn delete_book(&self, identity: &Identity, book_id: i64) -> AppResult<()> {
        identity.require_admin()?;

        if !self.store.delete_book(book_id).await? {
            return Err(DomainError::BookNotFound(book_id).into());
        }
        tracing::info!(book_id, "Book deleted");
        Ok(())
    }

    pub async fn find_user(&self, username: &str) -> AppResult<User> {
        self.store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
    }
}
