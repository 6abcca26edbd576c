//! PDF export
//!
//! Plain A4 pages set in Courier, one fixed-width line per loan. Long
//! histories continue on further pages with the column header repeated.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use super::{report_rows, LoanReportRow, ReportError};
use crate::domain::LoanDetails;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN_LEFT: i64 = 50;
const TOP: i64 = 790;
const BOTTOM: i64 = 50;
const LINE_HEIGHT: i64 = 14;
const TITLE_SIZE: i64 = 14;
const BODY_SIZE: i64 = 9;
const TITLE_WIDTH: usize = 32;

fn column_header() -> String {
    format!(
        "{:<8} {:<w$} {:<10} {:<11} {:>8}",
        "Loan ID",
        "Book Title",
        "Due Date",
        "Return Date",
        "Fine",
        w = TITLE_WIDTH
    )
}

fn format_row(row: &LoanReportRow) -> String {
    let title: String = row.book_title.chars().take(TITLE_WIDTH).collect();
    format!(
        "{:<8} {:<w$} {:<10} {:<11} {:>8}",
        row.loan_id,
        title,
        row.due_date.to_string(),
        row.return_date,
        row.fine,
        w = TITLE_WIDTH
    )
}

fn text_line(ops: &mut Vec<Operation>, size: i64, y: i64, text: &str) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec!["F1".into(), size.into()]));
    ops.push(Operation::new("Td", vec![MARGIN_LEFT.into(), y.into()]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(text)]));
    ops.push(Operation::new("ET", vec![]));
}

/// Lay the lines out into pages; the first page also carries the title
fn paginate(title: &str, rows: &[LoanReportRow]) -> Vec<Vec<Operation>> {
    let mut pages = Vec::new();
    let mut ops = Vec::new();

    text_line(&mut ops, TITLE_SIZE, TOP, title);
    let mut y = TOP - 2 * LINE_HEIGHT;
    text_line(&mut ops, BODY_SIZE, y, &column_header());
    y -= LINE_HEIGHT;

    for row in rows {
        if y < BOTTOM {
            pages.push(std::mem::take(&mut ops));
            y = TOP;
            text_line(&mut ops, BODY_SIZE, y, &column_header());
            y -= LINE_HEIGHT;
        }
        text_line(&mut ops, BODY_SIZE, y, &format_row(row));
        y -= LINE_HEIGHT;
    }

    pages.push(ops);
    pages
}

/// Render a user's loans as a PDF document titled "Loan History for <username>"
pub fn export_pdf(username: &str, loans: &[LoanDetails]) -> Result<Vec<u8>, ReportError> {
    let title = format!("Loan History for {}", username);
    let pages = paginate(&title, &report_rows(loans));

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}
