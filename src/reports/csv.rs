//! CSV export

use ::csv::Writer;

use super::{report_rows, ReportError};
use crate::domain::LoanDetails;

/// Render loans as CSV with a header row
///
/// ```csv
/// Loan ID,Book Title,Due Date,Return Date,Fine
/// 3,Dune,2024-01-15,2024-01-18,4.50
/// 4,Emma,2024-02-01,,0.00
/// ```
pub fn export_csv(loans: &[LoanDetails]) -> Result<Vec<u8>, ReportError> {
    let mut wtr = Writer::from_writer(Vec::new());

    // serialize() only writes headers once a row exists
    if loans.is_empty() {
        wtr.write_record(["Loan ID", "Book Title", "Due Date", "Return Date", "Fine"])?;
    }
    for row in report_rows(loans) {
        wtr.serialize(&row)?;
    }

    wtr.flush()?;
    wtr.into_inner().map_err(|e| ReportError::Io(e.into_error()))
}
