//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::{AccessToken, Registration};
use crate::domain::{Book, BookChanges, Identity, Loan, LoanDetails, NewBook, OperationContext, User};
use crate::error::{AppError, AppResult};
use crate::handlers::{BorrowCommand, ReturnCommand};
use crate::reports::{self, CSV_CONTENT_TYPE, CSV_FILENAME, PDF_CONTENT_TYPE, PDF_FILENAME};
use crate::store::{LibraryStats, LoanHistoryFilter};

use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub user_email: String,
    pub password: String,
}

/// OAuth2 password-flow form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnRequest {
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct DueSoonQuery {
    #[serde(default)]
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        // Users and tokens
        .route("/register", post(register))
        .route("/token", post(login))
        .route("/users/:username", get(get_user))
        // Catalog
        .route("/books", post(create_book).get(list_books))
        .route("/books/", post(create_book).get(list_books))
        .route(
            "/books/:book",
            get(search_books).patch(update_book).delete(delete_book),
        )
        // Loans
        .route("/loans", post(create_loan))
        .route("/loans/", post(create_loan))
        .route("/loans/:loan_id/return", post(return_loan))
        .route("/loans/me", get(my_loans))
        .route("/loans/me/export", get(export_csv))
        .route("/loans/me/export/pdf", get(export_pdf))
        .route("/loans/overdue", get(overdue_loans))
        .route("/loans/history", get(loan_history))
        .route("/notifications/due-soon", get(due_soon))
        // Admin
        .route("/admin/stats", get(stats))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

// =========================================================================
// Users and tokens
// =========================================================================

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<Json<User>> {
    let user = state
        .access
        .register(Registration {
            username: request.username,
            user_email: request.user_email,
            password: request.password,
        })
        .await?;
    Ok(Json(user))
}

async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Json<AccessToken>> {
    let token = state.access.login(&form.username, &form.password).await?;
    Ok(Json(token))
}

async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<User>> {
    Ok(Json(state.catalog.find_user(&username).await?))
}

// =========================================================================
// Catalog
// =========================================================================

async fn create_book(
    State(state): State<AppState>,
    identity: Identity,
    Json(book): Json<NewBook>,
) -> AppResult<Json<Book>> {
    Ok(Json(state.catalog.create_book(&identity, book).await?))
}

async fn list_books(State(state): State<AppState>) -> AppResult<Json<Vec<Book>>> {
    Ok(Json(state.catalog.list_books().await?))
}

async fn search_books(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<Vec<Book>>> {
    Ok(Json(state.catalog.search_books(&name).await?))
}

fn parse_book_id(raw: &str) -> AppResult<i64> {
    raw.parse()
        .map_err(|_| AppError::InvalidRequest(format!("Invalid book id: {}", raw)))
}

async fn update_book(
    State(state): State<AppState>,
    identity: Identity,
    Path(book): Path<String>,
    Json(changes): Json<BookChanges>,
) -> AppResult<Json<Book>> {
    let book_id = parse_book_id(&book)?;
    Ok(Json(
        state.catalog.update_book(&identity, book_id, changes).await?,
    ))
}

async fn delete_book(
    State(state): State<AppState>,
    identity: Identity,
    Path(book): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let book_id = parse_book_id(&book)?;
    state.catalog.delete_book(&identity, book_id).await?;
    Ok(Json(MessageResponse {
        message: "Book deleted successfully",
    }))
}

// =========================================================================
// Loans
// =========================================================================

async fn create_loan(
    State(state): State<AppState>,
    identity: Identity,
    context: OperationContext,
    Json(command): Json<BorrowCommand>,
) -> AppResult<Json<Loan>> {
    Ok(Json(state.borrow.execute(command, &identity, &context).await?))
}

/// Parse the optional return body.
///
/// An empty body means "return today". Anything else must be valid JSON for
/// [`ReturnRequest`]; a malformed date is rejected rather than defaulted.
fn parse_return_request(body: &[u8]) -> AppResult<ReturnRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ReturnRequest::default());
    }
    Json::<ReturnRequest>::from_bytes(body)
        .map(|Json(request)| request)
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}

async fn return_loan(
    State(state): State<AppState>,
    identity: Identity,
    context: OperationContext,
    Path(loan_id): Path<i64>,
    body: Bytes,
) -> AppResult<Json<Loan>> {
    let request = parse_return_request(&body)?;
    let command = ReturnCommand {
        loan_id,
        return_date: request.return_date,
    };
    Ok(Json(state.returns.execute(command, &identity, &context).await?))
}

async fn my_loans(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<Vec<LoanDetails>>> {
    Ok(Json(state.loans.my_loans(&identity).await?))
}

async fn overdue_loans(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<Vec<LoanDetails>>> {
    Ok(Json(state.loans.overdue(&identity).await?))
}

async fn due_soon(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<DueSoonQuery>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    Ok(Json(state.loans.due_soon(&identity, query.days).await?))
}

async fn loan_history(
    State(state): State<AppState>,
    identity: Identity,
    Query(filter): Query<LoanHistoryFilter>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    Ok(Json(state.loans.history(&identity, filter).await?))
}

// =========================================================================
// Exports and stats
// =========================================================================

fn attachment_response(content_type: &'static str, filename: &str, body: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, reports::attachment(filename)),
        ],
        body,
    )
        .into_response()
}

async fn export_csv(State(state): State<AppState>, identity: Identity) -> AppResult<Response> {
    let loans = state.loans.my_loans(&identity).await?;
    let body = reports::export_csv(&loans)?;
    Ok(attachment_response(CSV_CONTENT_TYPE, CSV_FILENAME, body))
}

async fn export_pdf(State(state): State<AppState>, identity: Identity) -> AppResult<Response> {
    let loans = state.loans.my_loans(&identity).await?;
    let body = reports::export_pdf(&identity.username, &loans)?;
    Ok(attachment_response(PDF_CONTENT_TYPE, PDF_FILENAME, body))
}

async fn stats(State(state): State<AppState>, identity: Identity) -> AppResult<Json<LibraryStats>> {
    Ok(Json(state.loans.stats(&identity).await?))
}
