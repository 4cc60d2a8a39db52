use crate::models::Id;
use time::Date;

/// A book in the collection.
///
/// Column names are the aliases used by every query selecting books, which
/// lets the same row shape be flattened into the joined report rows.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Book {
    #[sqlx(rename = "book_id")]
    pub id: Option<Id>,
    #[sqlx(rename = "book_name")]
    pub name: String,
    pub publication_year: i32,
    pub author: String,
    pub genre: String,
    /// The day the book entered the collection; it cannot be lent out before.
    pub added_on: Date,
}
impl Book {
    pub fn new(
        name: impl Into<String>,
        publication_year: i32,
        author: impl Into<String>,
        genre: impl Into<String>,
        added_on: Date,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            publication_year,
            author: author.into(),
            genre: genre.into(),
            added_on,
        }
    }

    /// Request a specific identifier instead of a store-generated one.
    pub fn with_id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }
}
