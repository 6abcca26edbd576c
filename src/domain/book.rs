//! Book catalog records

use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::inventory::Volumes;

/// A catalog entry together with its available-copy counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub book_id: i64,
    pub book_name: String,
    pub book_genre: String,
    pub book_year: i32,
    pub book_author: String,
    pub book_language: String,
    pub book_description: Option<String>,
    /// Owned by the inventory ledger once the book is in circulation
    pub number_available_volumes: i32,
}

/// Fields required to add a book to the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBook {
    pub book_name: String,
    pub book_genre: String,
    pub book_year: i32,
    pub book_author: String,
    pub book_language: String,
    #[serde(default)]
    pub book_description: Option<String>,
    pub number_available_volumes: i32,
}

impl NewBook {
    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("book_name", &self.book_name)?;
        require_text("book_genre", &self.book_genre)?;
        require_text("book_author", &self.book_author)?;
        require_text("book_language", &self.book_language)?;
        Volumes::new(self.number_available_volumes)?;
        Ok(())
    }

    /// Materialize the record once storage has assigned an id
    pub fn into_book(self, book_id: i64) -> Book {
        Book {
            book_id,
            book_name: self.book_name,
            book_genre: self.book_genre,
            book_year: self.book_year,
            book_author: self.book_author,
            book_language: self.book_language,
            book_description: self.book_description,
            number_available_volumes: self.number_available_volumes,
        }
    }
}

/// Partial update of a catalog entry; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookChanges {
    #[serde(default)]
    pub book_name: Option<String>,
    #[serde(default)]
    pub book_genre: Option<String>,
    #[serde(default)]
    pub book_year: Option<i32>,
    #[serde(default)]
    pub book_author: Option<String>,
    #[serde(default)]
    pub book_language: Option<String>,
    #[serde(default)]
    pub book_description: Option<String>,
    #[serde(default)]
    pub number_available_volumes: Option<i32>,
}

impl BookChanges {
    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [
            ("book_name", &self.book_name),
            ("book_genre", &self.book_genre),
            ("book_author", &self.book_author),
            ("book_language", &self.book_language),
        ] {
            if let Some(value) = value {
                require_text(field, value)?;
            }
        }
        if let Some(volumes) = self.number_available_volumes {
            Volumes::new(volumes)?;
        }
        Ok(())
    }

    pub fn apply_to(self, book: &mut Book) {
        if let Some(name) = self.book_name {
            book.book_name = name;
        }
        if let Some(genre) = self.book_genre {
            book.book_genre = genre;
        }
        if let Some(year) = self.book_year {
            book.book_year = year;
        }
        if let Some(author) = self.book_author {
            book.book_author = author;
        }
        if let Some(language) = self.book_language {
            book.book_language = language;
        }
        if let Some(description) = self.book_description {
            book.book_description = Some(description);
        }
        if let Some(volumes) = self.number_available_volumes {
            book.number_available_volumes = volumes;
        }
    }
}

fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}
