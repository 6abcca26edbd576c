//! Engine tests
//!
//! Borrow/return flows and loan queries against the in-memory store.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use crate::clock::FixedClock;
use crate::domain::{DomainError, Identity, NewBook, OperationContext};
use crate::error::AppError;
use crate::handlers::{
    BorrowCommand, BorrowHandler, CatalogHandler, LoanQueryHandler, ReturnCommand, ReturnHandler,
    BORROW_FOR_OTHER, RETURN_FOR_OTHER,
};
use crate::store::{LoanHistoryFilter, MemoryStore, NewUser, Store};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2024, 1, 1)
}

struct Fixture {
    store: Arc<MemoryStore>,
    borrow: BorrowHandler,
    ret: ReturnHandler,
    queries: LoanQueryHandler,
    ctx: OperationContext,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::on(today()));
        Self {
            borrow: BorrowHandler::new(store.clone(), clock.clone()),
            ret: ReturnHandler::new(store.clone(), clock.clone()),
            queries: LoanQueryHandler::new(store.clone(), clock),
            store,
            ctx: OperationContext::new(),
        }
    }

    async fn user(&self, name: &str, is_admin: bool) -> Identity {
        let user = self
            .store
            .create_user(NewUser {
                username: name.to_string(),
                user_email: format!("{}@example.com", name),
                hashed_password: "salt$hash".to_string(),
                is_admin,
            })
            .await
            .unwrap();
        Identity::from(user)
    }

    async fn book(&self, volumes: i32) -> i64 {
        self.store
            .create_book(NewBook {
                book_name: "Test Book".to_string(),
                book_genre: "Fiction".to_string(),
                book_year: 2000,
                book_author: "Author".to_string(),
                book_language: "English".to_string(),
                book_description: None,
                number_available_volumes: volumes,
            })
            .await
            .unwrap()
            .book_id
    }

    async fn volumes(&self, book_id: i64) -> i32 {
        self.store
            .list_books()
            .await
            .unwrap()
            .into_iter()
            .find(|b| b.book_id == book_id)
            .map(|b| b.number_available_volumes)
            .unwrap()
    }
}

// =========================================================================
// Borrow
// =========================================================================

#[tokio::test]
async fn test_borrow_takes_one_copy_and_defaults_due_date() {
    let f = Fixture::new();
    let alice = f.user("alice", false).await;
    let book_id = f.book(2).await;

    let loan = f
        .borrow
        .execute(BorrowCommand::new(alice.user_id, book_id), &alice, &f.ctx)
        .await
        .unwrap();

    assert_eq!(loan.loan_due_date, date(2024, 1, 15));
    assert!(loan.return_date.is_none());
    assert!(loan.loan_fine.is_none());
    assert_eq!(f.volumes(book_id).await, 1);
}

#[tokio::test]
async fn test_borrow_keeps_requested_due_date() {
    let f = Fixture::new();
    let alice = f.user("alice", false).await;
    let book_id = f.book(1).await;

    let cmd = BorrowCommand::new(alice.user_id, book_id).with_due_date(date(2024, 2, 1));
    let loan = f.borrow.execute(cmd, &alice, &f.ctx).await.unwrap();
    assert_eq!(loan.loan_due_date, date(2024, 2, 1));
}

#[tokio::test]
async fn test_borrow_depleted_book_fails_without_side_effects() {
    let f = Fixture::new();
    let alice = f.user("alice", false).await;
    let book_id = f.book(1).await;

    f.borrow
        .execute(BorrowCommand::new(alice.user_id, book_id), &alice, &f.ctx)
        .await
        .unwrap();
    let err = f
        .borrow
        .execute(BorrowCommand::new(alice.user_id, book_id), &alice, &f.ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Domain(DomainError::NoCopiesAvailable { .. })));
    assert_eq!(err.to_string(), "No available copies to borrow");
    assert_eq!(f.volumes(book_id).await, 0);
    assert_eq!(f.queries.my_loans(&alice).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_borrow_unknown_book() {
    let f = Fixture::new();
    let alice = f.user("alice", false).await;

    let err = f
        .borrow
        .execute(BorrowCommand::new(alice.user_id, 99), &alice, &f.ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::BookNotFound(99))));
}

#[tokio::test]
async fn test_borrow_for_unknown_user_by_admin() {
    let f = Fixture::new();
    let admin = f.user("admin", true).await;
    let book_id = f.book(1).await;

    let err = f
        .borrow
        .execute(BorrowCommand::new(42, book_id), &admin, &f.ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::UserNotFound(_))));
    assert_eq!(f.volumes(book_id).await, 1);
}

#[tokio::test]
async fn test_borrow_for_another_user() {
    let f = Fixture::new();
    let alice = f.user("alice", false).await;
    let bob = f.user("bob", false).await;
    let admin = f.user("admin", true).await;
    let book_id = f.book(2).await;

    let err = f
        .borrow
        .execute(BorrowCommand::new(bob.user_id, book_id), &alice, &f.ctx)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), BORROW_FOR_OTHER);
    assert_eq!(f.volumes(book_id).await, 2);

    let loan = f
        .borrow
        .execute(BorrowCommand::new(bob.user_id, book_id), &admin, &f.ctx)
        .await
        .unwrap();
    assert_eq!(loan.user_id, bob.user_id);
}

#[tokio::test]
async fn test_concurrent_borrows_of_last_copy() {
    let f = Fixture::new();
    let alice = f.user("alice", false).await;
    let bob = f.user("bob", false).await;
    let book_id = f.book(1).await;

    let spawn_borrow = |identity: Identity| {
        let handler = f.borrow.clone();
        tokio::spawn(async move {
            handler
                .execute(
                    BorrowCommand::new(identity.user_id, book_id),
                    &identity,
                    &OperationContext::new(),
                )
                .await
        })
    };

    let (a, b) = tokio::join!(spawn_borrow(alice), spawn_borrow(bob));
    let results = [a.unwrap(), b.unwrap()];

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(AppError::Domain(DomainError::NoCopiesAvailable { .. }))
    )));
    assert_eq!(f.volumes(book_id).await, 0);
}

// =========================================================================
// Return
// =========================================================================

#[tokio::test]
async fn test_late_return_charges_fine() {
    let f = Fixture::new();
    let alice = f.user("alice", false).await;
    let book_id = f.book(1).await;

    let cmd = BorrowCommand::new(alice.user_id, book_id).with_due_date(date(2024, 1, 15));
    let loan = f.borrow.execute(cmd, &alice, &f.ctx).await.unwrap();

    let returned = f
        .ret
        .execute(
            ReturnCommand::new(loan.loan_id).with_return_date(date(2024, 1, 18)),
            &alice,
            &f.ctx,
        )
        .await
        .unwrap();

    assert_eq!(returned.return_date, Some(date(2024, 1, 18)));
    assert_eq!(returned.loan_fine, Some(dec!(4.50)));
    assert_eq!(f.volumes(book_id).await, 1);
}

#[tokio::test]
async fn test_on_time_return_has_no_fine() {
    let f = Fixture::new();
    let alice = f.user("alice", false).await;
    let book_id = f.book(1).await;

    let loan = f
        .borrow
        .execute(BorrowCommand::new(alice.user_id, book_id), &alice, &f.ctx)
        .await
        .unwrap();
    let returned = f
        .ret
        .execute(ReturnCommand::new(loan.loan_id), &alice, &f.ctx)
        .await
        .unwrap();

    assert_eq!(returned.return_date, Some(today()));
    assert!(returned.loan_fine.is_none());
}

#[tokio::test]
async fn test_double_return_is_rejected() {
    let f = Fixture::new();
    let alice = f.user("alice", false).await;
    let book_id = f.book(1).await;

    let loan = f
        .borrow
        .execute(BorrowCommand::new(alice.user_id, book_id), &alice, &f.ctx)
        .await
        .unwrap();
    f.ret
        .execute(ReturnCommand::new(loan.loan_id), &alice, &f.ctx)
        .await
        .unwrap();
    let err = f
        .ret
        .execute(ReturnCommand::new(loan.loan_id), &alice, &f.ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Domain(DomainError::AlreadyReturned { .. })));
    assert_eq!(err.to_string(), "Book already returned");
    assert_eq!(f.volumes(book_id).await, 1);
}

#[tokio::test]
async fn test_return_unknown_loan() {
    let f = Fixture::new();
    let alice = f.user("alice", false).await;

    let err = f
        .ret
        .execute(ReturnCommand::new(7), &alice, &f.ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Domain(DomainError::LoanNotFound(7))));
}

#[tokio::test]
async fn test_return_of_another_users_loan() {
    let f = Fixture::new();
    let alice = f.user("alice", false).await;
    let bob = f.user("bob", false).await;
    let admin = f.user("admin", true).await;
    let book_id = f.book(1).await;

    let loan = f
        .borrow
        .execute(BorrowCommand::new(alice.user_id, book_id), &alice, &f.ctx)
        .await
        .unwrap();

    let err = f
        .ret
        .execute(ReturnCommand::new(loan.loan_id), &bob, &f.ctx)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), RETURN_FOR_OTHER);
    assert_eq!(f.volumes(book_id).await, 0);

    let returned = f
        .ret
        .execute(ReturnCommand::new(loan.loan_id), &admin, &f.ctx)
        .await
        .unwrap();
    assert!(returned.return_date.is_some());
}

#[tokio::test]
async fn test_return_when_book_is_gone_still_closes_loan() {
    let f = Fixture::new();
    let alice = f.user("alice", false).await;
    let book_id = f.book(1).await;

    let loan = f
        .borrow
        .execute(BorrowCommand::new(alice.user_id, book_id), &alice, &f.ctx)
        .await
        .unwrap();
    f.store.remove_book_unchecked(book_id).await;

    let returned = f
        .ret
        .execute(
            ReturnCommand::new(loan.loan_id).with_return_date(date(2024, 1, 20)),
            &alice,
            &f.ctx,
        )
        .await
        .unwrap();
    assert_eq!(returned.loan_fine, Some(dec!(7.50)));
}

// =========================================================================
// Queries
// =========================================================================

#[tokio::test]
async fn test_admin_queries_require_admin() {
    let f = Fixture::new();
    let alice = f.user("alice", false).await;

    assert_eq!(
        f.queries.overdue(&alice).await.unwrap_err().to_string(),
        "Administrator users only."
    );
    assert!(f.queries.due_soon(&alice, None).await.is_err());
    assert!(f
        .queries
        .history(&alice, LoanHistoryFilter::default())
        .await
        .is_err());
    assert!(f.queries.stats(&alice).await.is_err());
}

#[tokio::test]
async fn test_overdue_due_soon_and_stats() {
    let f = Fixture::new();
    let admin = f.user("admin", true).await;
    let alice = f.user("alice", false).await;
    let book_id = f.book(5).await;

    for due in [date(2023, 12, 20), date(2023, 12, 30), date(2024, 1, 3), date(2024, 1, 10)] {
        let cmd = BorrowCommand::new(alice.user_id, book_id).with_due_date(due);
        f.borrow.execute(cmd, &alice, &f.ctx).await.unwrap();
    }

    let overdue = f.queries.overdue(&admin).await.unwrap();
    let dues: Vec<_> = overdue.iter().map(|l| l.loan.loan_due_date).collect();
    assert_eq!(dues, vec![date(2023, 12, 20), date(2023, 12, 30)]);

    let soon = f.queries.due_soon(&admin, None).await.unwrap();
    assert_eq!(soon.len(), 1);
    assert_eq!(soon[0].loan.loan_due_date, date(2024, 1, 3));
    assert_eq!(soon[0].user.username, "alice");

    let wide = f.queries.due_soon(&admin, Some(10)).await.unwrap();
    assert_eq!(wide.len(), 2);

    assert!(matches!(
        f.queries.due_soon(&admin, Some(-1)).await.unwrap_err(),
        AppError::InvalidRequest(_)
    ));

    let stats = f.queries.stats(&admin).await.unwrap();
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.total_books, 1);
    assert_eq!(stats.active_loans, 4);
    assert_eq!(stats.overdue_loans, 2);
}

#[tokio::test]
async fn test_history_filters_and_order() {
    let f = Fixture::new();
    let admin = f.user("admin", true).await;
    let alice = f.user("alice", false).await;
    let bob = f.user("bob", false).await;
    let book_id = f.book(5).await;

    let first = f
        .borrow
        .execute(
            BorrowCommand::new(alice.user_id, book_id).with_due_date(date(2024, 1, 5)),
            &alice,
            &f.ctx,
        )
        .await
        .unwrap();
    f.borrow
        .execute(
            BorrowCommand::new(alice.user_id, book_id).with_due_date(date(2024, 1, 9)),
            &alice,
            &f.ctx,
        )
        .await
        .unwrap();
    f.borrow
        .execute(BorrowCommand::new(bob.user_id, book_id), &bob, &f.ctx)
        .await
        .unwrap();
    f.ret
        .execute(ReturnCommand::new(first.loan_id), &alice, &f.ctx)
        .await
        .unwrap();

    let all = f
        .queries
        .history(&admin, LoanHistoryFilter::default())
        .await
        .unwrap();
    let dues: Vec<_> = all.iter().map(|l| l.loan.loan_due_date).collect();
    assert_eq!(dues, vec![date(2024, 1, 15), date(2024, 1, 9), date(2024, 1, 5)]);

    let alice_open = f
        .queries
        .history(
            &admin,
            LoanHistoryFilter {
                user_id: Some(alice.user_id),
                returned: Some(false),
            },
        )
        .await
        .unwrap();
    assert_eq!(alice_open.len(), 1);
    assert_eq!(alice_open[0].loan.loan_due_date, date(2024, 1, 9));

    let returned = f
        .queries
        .history(
            &admin,
            LoanHistoryFilter {
                user_id: None,
                returned: Some(true),
            },
        )
        .await
        .unwrap();
    assert_eq!(returned.len(), 1);
    assert_eq!(returned[0].loan.loan_id, first.loan_id);
}

// =========================================================================
// Catalog
// =========================================================================

#[tokio::test]
async fn test_catalog_admin_checks_and_delete_refusal() {
    let f = Fixture::new();
    let catalog = CatalogHandler::new(f.store.clone());
    let admin = f.user("admin", true).await;
    let alice = f.user("alice", false).await;

    let new_book = NewBook {
        book_name: "Dune".to_string(),
        book_genre: "Sci-Fi".to_string(),
        book_year: 1965,
        book_author: "Frank Herbert".to_string(),
        book_language: "English".to_string(),
        book_description: None,
        number_available_volumes: 1,
    };

    assert!(catalog.create_book(&alice, new_book.clone()).await.is_err());
    let book = catalog.create_book(&admin, new_book).await.unwrap();

    assert_eq!(catalog.search_books("dun").await.unwrap().len(), 1);
    assert!(matches!(
        catalog.search_books("nothing").await.unwrap_err(),
        AppError::NotFound(_)
    ));

    f.borrow
        .execute(BorrowCommand::new(alice.user_id, book.book_id), &alice, &f.ctx)
        .await
        .unwrap();
    assert!(matches!(
        catalog.delete_book(&admin, book.book_id).await.unwrap_err(),
        AppError::Conflict(_)
    ));
    assert!(matches!(
        catalog.delete_book(&admin, 999).await.unwrap_err(),
        AppError::Domain(DomainError::BookNotFound(999))
    ));
}
