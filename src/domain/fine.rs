//! Late-return fines
//!
//! Fines are computed once, when a loan is closed, with fixed-point decimal
//! arithmetic. Granularity is whole calendar days; time of day plays no part.

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Fine charged per day late, in cents
const FINE_PER_DAY_CENTS: i64 = 150;

/// Fine scale (2 decimal places)
const FINE_SCALE: u32 = 2;

/// Fixed per-day rate (1.50)
pub fn fine_per_day() -> Decimal {
    Decimal::new(FINE_PER_DAY_CENTS, FINE_SCALE)
}

/// Whole days between the due date and the return date; zero when on time or early.
pub fn days_late(due_date: NaiveDate, return_date: NaiveDate) -> i64 {
    (return_date - due_date).num_days().max(0)
}

/// Fine owed for a return on `return_date` of a loan due on `due_date`.
///
/// `None` when the book came back on or before the due date.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
/// use library_loans::domain::late_fine;
///
/// let due = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let returned = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
/// assert_eq!(late_fine(due, returned), Some(Decimal::new(450, 2)));
/// assert_eq!(late_fine(due, due), None);
/// ```
pub fn late_fine(due_date: NaiveDate, return_date: NaiveDate) -> Option<Decimal> {
    if return_date <= due_date {
        return None;
    }
    Some(Decimal::from(days_late(due_date, return_date)) * fine_per_day())
}

/// Render a fine for reports: two decimals, `0.00` when none was charged.
pub fn format_fine(fine: Option<Decimal>) -> String {
    match fine {
        Some(amount) => format!("{:.2}", amount),
        None => "0.00".to_string(),
    }
}
