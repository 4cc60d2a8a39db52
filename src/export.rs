//! Tab-separated export of the overdue report.
//!
//! The report is streamed a chunk at a time, so exporting a large view never
//! holds more than one chunk of rows in memory.

use crate::error::{ErrorKind, Result, listing};
use exn::ResultExt;
use shelf_store::models::ExpiredLoan;
use shelf_view::View;
use std::io::Write;

const HEADER: [&str; 9] = [
    "BookName",
    "Author",
    "Genre",
    "PublicationYear",
    "ClientName",
    "ClientRegDate",
    "LoanStartDate",
    "LoanEndDate",
    "ExpiredByDays",
];

/// Wrap free text in double quotes, doubling the quotes it contains.
fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn fields(expired: &ExpiredLoan) -> [String; 9] {
    let record = &expired.record;
    [
        quote(&record.book.name),
        quote(&record.book.author),
        quote(&record.book.genre),
        record.book.publication_year.to_string(),
        quote(&record.client.name),
        record.client.registered_on.to_string(),
        record.loan.start_date.to_string(),
        record.loan.end_date.to_string(),
        expired.overdue_days.to_string(),
    ]
}

/// Write the header and every row of `view` to `out`, fetching `chunk_size`
/// rows per round trip. Returns the number of rows written.
pub async fn write_expired<V>(view: &V, chunk_size: u64, out: &mut impl Write) -> Result<u64>
where
    V: View<Item = ExpiredLoan>,
{
    writeln!(out, "{}", HEADER.join("\t")).or_raise(|| ErrorKind::Output)?;
    let len = view.len().await.map_err(listing)?;
    let mut written = 0;
    while written < len {
        let chunk = view.slice(written, chunk_size, 1).await.map_err(listing)?;
        if chunk.is_empty() {
            // The report shrank underneath us.
            break;
        }
        for expired in &chunk {
            writeln!(out, "{}", fields(expired).join("\t")).or_raise(|| ErrorKind::Output)?;
        }
        written += chunk.len() as u64;
        tracing::debug!(written, len, "exported chunk of overdue loans");
    }
    out.flush().or_raise(|| ErrorKind::Output)?;
    Ok(written)
}
