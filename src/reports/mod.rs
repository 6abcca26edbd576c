//! Loan history exports
//!
//! Both renderers take the same [`LoanReportRow`] projection of a loan list,
//! so the CSV and PDF documents always agree on columns and formatting.

pub mod csv;
pub mod pdf;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{format_fine, LoanDetails};

pub use self::csv::export_csv;
pub use self::pdf::export_pdf;

pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const CSV_FILENAME: &str = "loan_history.csv";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const PDF_FILENAME: &str = "loan_history.pdf";

/// Report rendering errors
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One exported line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanReportRow {
    #[serde(rename = "Loan ID")]
    pub loan_id: i64,
    #[serde(rename = "Book Title")]
    pub book_title: String,
    #[serde(rename = "Due Date")]
    pub due_date: NaiveDate,
    /// Empty while the loan is open
    #[serde(rename = "Return Date")]
    pub return_date: String,
    #[serde(rename = "Fine")]
    pub fine: String,
}

impl From<&LoanDetails> for LoanReportRow {
    fn from(details: &LoanDetails) -> Self {
        Self {
            loan_id: details.loan.loan_id,
            book_title: details.book.book_name.clone(),
            due_date: details.loan.loan_due_date,
            return_date: details
                .loan
                .return_date
                .map(|date| date.to_string())
                .unwrap_or_default(),
            fine: format_fine(details.loan.loan_fine),
        }
    }
}

pub fn report_rows(loans: &[LoanDetails]) -> Vec<LoanReportRow> {
    loans.iter().map(LoanReportRow::from).collect()
}

/// `Content-Disposition` value for a download
pub fn attachment(filename: &str) -> String {
    format!("attachment; filename={}", filename)
}
