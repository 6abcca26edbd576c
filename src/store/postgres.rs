//! Postgres store
//!
//! Loan mutations run inside a `sqlx::Transaction`. Book and loan rows are
//! read with `SELECT ... FOR UPDATE`, which serializes concurrent borrows of
//! the same book and concurrent returns of the same loan at row granularity.
//! The schema's `CHECK (number_available_volumes >= 0)` backs up the ledger.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{Book, BookChanges, Loan, LoanDetails, NewBook, NewLoan, User};

use super::{
    LibraryStats, LoanHistoryFilter, NewUser, Store, StoreError, StoreTransaction, UserCredentials,
};

const BOOK_COLUMNS: &str = "book_id, book_name, book_genre, book_year, book_author, \
     book_language, book_description, number_available_volumes";

const LOAN_COLUMNS: &str = "loan_id, user_id, book_id, loan_due_date, return_date, loan_fine";

const LOAN_DETAILS_SELECT: &str = r#"
    SELECT
        l.loan_id, l.user_id, l.book_id, l.loan_due_date, l.return_date, l.loan_fine,
        u.username, u.user_email, u.is_admin,
        b.book_name, b.book_genre, b.book_year, b.book_author, b.book_language,
        b.book_description, b.number_available_volumes
    FROM loans l
    JOIN users u ON u.user_id = l.user_id
    JOIN books b ON b.book_id = l.book_id
"#;

/// Flat row produced by `LOAN_DETAILS_SELECT`
#[derive(Debug, sqlx::FromRow)]
struct LoanDetailsRow {
    loan_id: i64,
    user_id: i64,
    book_id: i64,
    loan_due_date: NaiveDate,
    return_date: Option<NaiveDate>,
    loan_fine: Option<Decimal>,
    username: String,
    user_email: String,
    is_admin: bool,
    book_name: String,
    book_genre: String,
    book_year: i32,
    book_author: String,
    book_language: String,
    book_description: Option<String>,
    number_available_volumes: i32,
}

impl From<LoanDetailsRow> for LoanDetails {
    fn from(row: LoanDetailsRow) -> Self {
        LoanDetails {
            loan: Loan {
                loan_id: row.loan_id,
                user_id: row.user_id,
                book_id: row.book_id,
                loan_due_date: row.loan_due_date,
                return_date: row.return_date,
                loan_fine: row.loan_fine,
            },
            user: User {
                user_id: row.user_id,
                username: row.username,
                user_email: row.user_email,
                is_admin: row.is_admin,
            },
            book: Book {
                book_id: row.book_id,
                book_name: row.book_name,
                book_genre: row.book_genre,
                book_year: row.book_year,
                book_author: row.book_author,
                book_language: row.book_language,
                book_description: row.book_description,
                number_available_volumes: row.number_available_volumes,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialsRow {
    user_id: i64,
    username: String,
    user_email: String,
    is_admin: bool,
    hashed_password: String,
}

/// Postgres error codes we translate
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

fn error_code(err: &sqlx::Error) -> Option<(String, Option<String>)> {
    let db_err = err.as_database_error()?;
    let code = db_err.code()?.into_owned();
    Some((code, db_err.constraint().map(str::to_string)))
}

/// Translate constraint violations into store errors
fn map_db_error(err: sqlx::Error) -> StoreError {
    match error_code(&err) {
        Some((code, constraint)) if code == UNIQUE_VIOLATION => {
            let constraint = constraint.unwrap_or_default();
            let field = if constraint.contains("email") {
                "user_email"
            } else if constraint.contains("username") {
                "username"
            } else {
                "unique key"
            };
            StoreError::Duplicate(field.to_string())
        }
        Some((code, constraint)) if code == FOREIGN_KEY_VIOLATION => {
            StoreError::MissingReference(constraint.unwrap_or_else(|| "foreign key".to_string()))
        }
        _ => StoreError::Database(err),
    }
}

/// Store backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `ILIKE` pattern matching `name` literally anywhere in the column
fn contains_pattern(name: &str) -> String {
    let mut pattern = String::with_capacity(name.len() + 2);
    pattern.push('%');
    for c in name.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn into_details(rows: Vec<LoanDetailsRow>) -> Vec<LoanDetails> {
    rows.into_iter().map(LoanDetails::from).collect()
}

struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn book_for_update(&mut self, book_id: i64) -> Result<Option<Book>, StoreError> {
        let sql = format!("SELECT {} FROM books WHERE book_id = $1 FOR UPDATE", BOOK_COLUMNS);
        let book = sqlx::query_as::<_, Book>(&sql)
            .bind(book_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(book)
    }

    async fn loan_for_update(&mut self, loan_id: i64) -> Result<Option<Loan>, StoreError> {
        let sql = format!("SELECT {} FROM loans WHERE loan_id = $1 FOR UPDATE", LOAN_COLUMNS);
        let loan = sqlx::query_as::<_, Loan>(&sql)
            .bind(loan_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(loan)
    }

    async fn user_exists(&mut self, user_id: i64) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn save_available_volumes(&mut self, book_id: i64, volumes: i32) -> Result<(), StoreError> {
        sqlx::query("UPDATE books SET number_available_volumes = $2 WHERE book_id = $1")
            .bind(book_id)
            .bind(volumes)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_loan(&mut self, loan: NewLoan) -> Result<Loan, StoreError> {
        let sql = format!(
            "INSERT INTO loans (user_id, book_id, loan_due_date) VALUES ($1, $2, $3) RETURNING {}",
            LOAN_COLUMNS
        );
        sqlx::query_as::<_, Loan>(&sql)
            .bind(loan.user_id)
            .bind(loan.book_id)
            .bind(loan.loan_due_date)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)
    }

    async fn save_closed_loan(&mut self, loan: &Loan) -> Result<(), StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE loans
            SET return_date = $2, loan_fine = $3
            WHERE loan_id = $1 AND return_date IS NULL
            "#,
        )
        .bind(loan.loan_id)
        .bind(loan.return_date)
        .bind(loan.loan_fine)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, user_email, hashed_password, is_admin)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, username, user_email, is_admin
            "#,
        )
        .bind(&user.username)
        .bind(&user.user_email)
        .bind(&user.hashed_password)
        .bind(user.is_admin)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, username, user_email, is_admin FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_credentials(&self, username: &str) -> Result<Option<UserCredentials>, StoreError> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            r#"
            SELECT user_id, username, user_email, is_admin, hashed_password
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| UserCredentials {
            user: User {
                user_id: row.user_id,
                username: row.username,
                user_email: row.user_email,
                is_admin: row.is_admin,
            },
            hashed_password: row.hashed_password,
        }))
    }

    async fn save_token(
        &self,
        token_hash: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO access_tokens (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn find_token_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.user_id, u.username, u.user_email, u.is_admin
            FROM access_tokens t
            JOIN users u ON u.user_id = t.user_id
            WHERE t.token_hash = $1 AND t.expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn create_book(&self, book: NewBook) -> Result<Book, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO books (book_name, book_genre, book_year, book_author,
                               book_language, book_description, number_available_volumes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        );
        let book = sqlx::query_as::<_, Book>(&sql)
            .bind(&book.book_name)
            .bind(&book.book_genre)
            .bind(book.book_year)
            .bind(&book.book_author)
            .bind(&book.book_language)
            .bind(&book.book_description)
            .bind(book.number_available_volumes)
            .fetch_one(&self.pool)
            .await?;
        Ok(book)
    }

    async fn list_books(&self) -> Result<Vec<Book>, StoreError> {
        let sql = format!("SELECT {} FROM books ORDER BY book_id", BOOK_COLUMNS);
        let books = sqlx::query_as::<_, Book>(&sql).fetch_all(&self.pool).await?;
        Ok(books)
    }

    async fn search_books(&self, name: &str) -> Result<Vec<Book>, StoreError> {
        let sql = format!(
            r"SELECT {} FROM books WHERE book_name ILIKE $1 ESCAPE '\' ORDER BY book_id",
            BOOK_COLUMNS
        );
        let books = sqlx::query_as::<_, Book>(&sql)
            .bind(contains_pattern(name))
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn update_book(&self, book_id: i64, changes: BookChanges) -> Result<Option<Book>, StoreError> {
        let sql = format!(
            r#"
            UPDATE books SET
                book_name = COALESCE($2, book_name),
                book_genre = COALESCE($3, book_genre),
                book_year = COALESCE($4, book_year),
                book_author = COALESCE($5, book_author),
                book_language = COALESCE($6, book_language),
                book_description = COALESCE($7, book_description),
                number_available_volumes = COALESCE($8, number_available_volumes)
            WHERE book_id = $1
            RETURNING {}
            "#,
            BOOK_COLUMNS
        );
        let book = sqlx::query_as::<_, Book>(&sql)
            .bind(book_id)
            .bind(changes.book_name)
            .bind(changes.book_genre)
            .bind(changes.book_year)
            .bind(changes.book_author)
            .bind(changes.book_language)
            .bind(changes.book_description)
            .bind(changes.number_available_volumes)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn delete_book(&self, book_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM books WHERE book_id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(err) => match map_db_error(err) {
                StoreError::MissingReference(_) => {
                    Err(StoreError::InUse("Book has loan records".to_string()))
                }
                other => Err(other),
            },
        }
    }

    async fn loans_for_user(&self, user_id: i64) -> Result<Vec<LoanDetails>, StoreError> {
        let sql = format!(
            "{} WHERE l.user_id = $1 ORDER BY l.loan_due_date DESC, l.loan_id DESC",
            LOAN_DETAILS_SELECT
        );
        let rows = sqlx::query_as::<_, LoanDetailsRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(into_details(rows))
    }

    async fn overdue_loans(&self, today: NaiveDate) -> Result<Vec<LoanDetails>, StoreError> {
        let sql = format!(
            "{} WHERE l.return_date IS NULL AND l.loan_due_date < $1 \
             ORDER BY l.loan_due_date ASC, l.loan_id ASC",
            LOAN_DETAILS_SELECT
        );
        let rows = sqlx::query_as::<_, LoanDetailsRow>(&sql)
            .bind(today)
            .fetch_all(&self.pool)
            .await?;
        Ok(into_details(rows))
    }

    async fn loans_due_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<LoanDetails>, StoreError> {
        let sql = format!(
            "{} WHERE l.return_date IS NULL AND l.loan_due_date BETWEEN $1 AND $2 \
             ORDER BY l.loan_due_date ASC, l.loan_id ASC",
            LOAN_DETAILS_SELECT
        );
        let rows = sqlx::query_as::<_, LoanDetailsRow>(&sql)
            .bind(from)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;
        Ok(into_details(rows))
    }

    async fn loan_history(&self, filter: LoanHistoryFilter) -> Result<Vec<LoanDetails>, StoreError> {
        let sql = format!(
            "{} WHERE ($1::BIGINT IS NULL OR l.user_id = $1) \
               AND ($2::BOOLEAN IS NULL OR (l.return_date IS NOT NULL) = $2) \
             ORDER BY l.loan_due_date DESC, l.loan_id DESC",
            LOAN_DETAILS_SELECT
        );
        let rows = sqlx::query_as::<_, LoanDetailsRow>(&sql)
            .bind(filter.user_id)
            .bind(filter.returned)
            .fetch_all(&self.pool)
            .await?;
        Ok(into_details(rows))
    }

    async fn stats(&self, today: NaiveDate) -> Result<LibraryStats, StoreError> {
        let (total_users, total_books, active_loans, overdue_loans): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM books),
                    (SELECT COUNT(*) FROM loans WHERE return_date IS NULL),
                    (SELECT COUNT(*) FROM loans WHERE return_date IS NULL AND loan_due_date < $1)
                "#,
            )
            .bind(today)
            .fetch_one(&self.pool)
            .await?;

        Ok(LibraryStats {
            total_users,
            total_books,
            active_loans,
            overdue_loans,
        })
    }
}
