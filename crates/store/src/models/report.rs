//! Row shapes produced by the joined and aggregated report queries.

use crate::models::{Book, Client, Loan};
use time::Date;

/// A loan together with the book and client it links.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LoanRecord {
    #[sqlx(flatten)]
    pub loan: Loan,
    #[sqlx(flatten)]
    pub book: Book,
    #[sqlx(flatten)]
    pub client: Client,
}

/// A loan that was not back by its expected return date.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ExpiredLoan {
    #[sqlx(flatten)]
    pub record: LoanRecord,
    /// Whole days between the expected return date and the actual return
    /// (or the reporting date, whichever came first).
    pub overdue_days: i64,
}

/// Number of loans ever made for books of one genre.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct GenreScore {
    pub genre: String,
    pub loans: i64,
}

/// The last day a client was seen at the desk.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LastVisit {
    #[sqlx(flatten)]
    pub client: Client,
    /// Latest loan start or return date; the registration date for clients
    /// who never borrowed anything.
    #[sqlx(rename = "last_visit")]
    pub date: Date,
}

/// A per-client loan count.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ClientTally {
    #[sqlx(flatten)]
    pub client: Client,
    pub loans: i64,
}
