//! Library loans backend
//!
//! Books, users and loans: copy availability, due dates and late fines,
//! exposed over an HTTP API with bearer-token authentication.

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod handlers;
pub mod jobs;
pub mod reports;
pub mod store;

pub use config::Config;
pub use domain::{DomainError, Identity, OperationContext};
pub use error::{AppError, AppResult, ErrorResponse};
