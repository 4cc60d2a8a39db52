use crate::models::Id;
use time::Date;

/// A book lent to a client.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Loan {
    #[sqlx(rename = "loan_id")]
    pub id: Option<Id>,
    pub book_id: Id,
    pub client_id: Id,
    pub start_date: Date,
    /// Expected return date.
    pub end_date: Date,
    /// Actual return date, once the book is back.
    pub return_date: Option<Date>,
}
impl Loan {
    pub fn new(book_id: Id, client_id: Id, start_date: Date, end_date: Date) -> Self {
        Self { id: None, book_id, client_id, start_date, end_date, return_date: None }
    }

    pub fn with_id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }

    pub fn returned_on(mut self, date: Date) -> Self {
        self.return_date = Some(date);
        self
    }

    pub fn is_returned(&self) -> bool {
        self.return_date.is_some()
    }
}
