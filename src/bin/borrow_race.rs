//! Concurrent borrow check
//!
//! Creates one book with `--copies` volumes and fires `--borrowers`
//! simultaneous borrows against Postgres, then verifies that exactly
//! `min(copies, borrowers)` succeeded and the ledger still balances.
//!
//! Run with: cargo run --bin borrow_race --release -- --copies 3 --borrowers 50

use std::sync::Arc;
use std::time::Instant;

use sqlx::postgres::PgPoolOptions;

use library_loans::clock::{Clock, SystemClock};
use library_loans::domain::{Identity, NewBook, OperationContext};
use library_loans::handlers::{BorrowCommand, BorrowHandler};
use library_loans::store::{NewUser, PgStore, Store};

fn arg(args: &[String], name: &str, default: u32) -> u32 {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let copies = arg(&args, "--copies", 1);
    let borrowers = arg(&args, "--borrowers", 20);

    let database_url = std::env::var("DATABASE_URL")?;

    println!("Borrow race - {} borrowers, {} copies", borrowers, copies);
    println!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(borrowers.clamp(2, 50))
        .connect(&database_url)
        .await?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let run_id = uuid::Uuid::new_v4().simple().to_string();

    let book = store
        .create_book(NewBook {
            book_name: format!("Race {}", run_id),
            book_genre: "Benchmark".to_string(),
            book_year: 2024,
            book_author: "borrow_race".to_string(),
            book_language: "English".to_string(),
            book_description: None,
            number_available_volumes: copies as i32,
        })
        .await?;

    let mut identities = Vec::with_capacity(borrowers as usize);
    for i in 0..borrowers {
        let user = store
            .create_user(NewUser {
                username: format!("race_{}_{}", run_id, i),
                user_email: format!("race_{}_{}@example.com", run_id, i),
                hashed_password: "unused$unused".to_string(),
                is_admin: false,
            })
            .await?;
        identities.push(Identity::from(user));
    }

    let handler = BorrowHandler::new(store.clone(), clock);
    let start = Instant::now();

    let tasks: Vec<_> = identities
        .into_iter()
        .map(|identity| {
            let handler = handler.clone();
            let book_id = book.book_id;
            tokio::spawn(async move {
                handler
                    .execute(
                        BorrowCommand::new(identity.user_id, book_id),
                        &identity,
                        &OperationContext::new(),
                    )
                    .await
            })
        })
        .collect();

    let mut succeeded = 0u32;
    let mut depleted = 0u32;
    let mut failed = 0u32;
    for task in tasks {
        match task.await? {
            Ok(_) => succeeded += 1,
            Err(library_loans::AppError::Domain(e)) if e.is_lifecycle_violation() => depleted += 1,
            Err(e) => {
                eprintln!("Unexpected error: {}", e);
                failed += 1;
            }
        }
    }

    let elapsed = start.elapsed();
    let remaining = store
        .search_books(&book.book_name)
        .await?
        .into_iter()
        .find(|b| b.book_id == book.book_id)
        .map(|b| b.number_available_volumes);

    println!("\n=== Borrow Race Results ===");
    println!("Succeeded: {}", succeeded);
    println!("Depleted: {}", depleted);
    println!("Other failures: {}", failed);
    println!("Remaining volumes: {:?}", remaining);
    println!("Time: {:.2}s", elapsed.as_secs_f64());

    let expected = copies.min(borrowers);
    let balanced = remaining == Some(copies as i32 - succeeded as i32);
    if succeeded != expected || !balanced {
        anyhow::bail!(
            "ledger mismatch: expected {} loans, got {} (remaining {:?})",
            expected,
            succeeded,
            remaining
        );
    }

    println!("Ledger balanced");
    Ok(())
}
