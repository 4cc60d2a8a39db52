use crate::Database;
use crate::error::{ErrorKind, Result, database};
use crate::models::{Book, GenreScore, Id};
use crate::predicate::{BookSearch, Clause, Param, translate};
use crate::query::Query;
use crate::repo::{Listing, Store};
use exn::{OptionExt, ResultExt};
use shelf_view::{Notifier, View};
use sqlx::SqliteConnection;
use time::Date;
use tracing::instrument;

const BOOK_ORDER: &str = "book_name, book_id";
const GENRE_ORDER: &str = "loans DESC, genre";
/// Added by the given day and not out with anyone on that day.
const UNLOANED_AT: &str = "b.added_on <= ? AND NOT EXISTS (\
    SELECT 1 FROM loans AS l WHERE l.book_id = b.id AND l.start_date <= ? \
    AND (l.return_date IS NULL OR l.return_date > ?))";

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: Id) -> Result<Option<Book>> {
    sqlx::query_as(include_str!("../../queries/get_book.sql"))
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(database)
}

fn validate(book: &Book) -> Result<()> {
    if book.name.trim().is_empty() {
        exn::bail!(ErrorKind::InvalidArgument("book name must not be empty"));
    }
    if book.author.trim().is_empty() {
        exn::bail!(ErrorKind::InvalidArgument("book author must not be empty"));
    }
    if book.genre.trim().is_empty() {
        exn::bail!(ErrorKind::InvalidArgument("book genre must not be empty"));
    }
    Ok(())
}

/// The collection: listings and availability reports over books, and the
/// writes that change them.
#[derive(Debug, Clone)]
pub struct BookRepository {
    store: Store,
}
impl From<&Database> for BookRepository {
    fn from(db: &Database) -> Self {
        Self::new(Store::new(db.pool().clone()))
    }
}
impl BookRepository {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// Fired after every committed book write.
    pub fn notifier(&self) -> &Notifier {
        self.store.notifier()
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// All books matching `search`, ordered by name.
    pub fn get_books(&self, search: Option<&BookSearch>) -> Listing<Book> {
        let query = Query::new(include_str!("../../queries/select_books.sql"), BOOK_ORDER).filter(translate(search));
        self.store.view(query)
    }

    /// Books that are in the collection and on the shelf on `at`.
    pub fn get_unloaned_books_at(&self, at: Date, search: Option<&BookSearch>) -> Listing<Book> {
        let query = Query::new(include_str!("../../queries/select_books.sql"), BOOK_ORDER)
            .condition(Clause::new(UNLOANED_AT, vec![Param::from(at); 3]))
            .filter(translate(search));
        self.store.view(query)
    }

    pub async fn count_unloaned_books_at(&self, at: Date) -> Result<u64> {
        self.get_unloaned_books_at(at, None).len().await.or_raise(|| ErrorKind::Database)
    }

    /// Loans per genre, most borrowed first. Genres nobody borrowed from are
    /// listed with zero loans.
    pub fn get_genre_scores(&self) -> Listing<GenreScore> {
        let query = Query::new(include_str!("../../queries/select_genre_scores.sql"), GENRE_ORDER).group_by("b.genre");
        self.store.view(query)
    }

    pub async fn get_book(&self, id: Id) -> Result<Option<Book>> {
        let mut conn = self.store.acquire().await?;
        fetch(&mut conn, id).await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert `book`, storing the assigned identifier back into it.
    ///
    /// A caller-supplied identifier that is already taken is a
    /// [`ErrorKind::Conflict`]; nothing is overwritten.
    #[instrument(skip_all, fields(id = ?book.id, name = %book.name))]
    pub async fn add_book(&self, book: &mut Book) -> Result<Id> {
        validate(book)?;
        let mut tx = self.store.begin().await?;
        let outcome = Self::insert(&mut tx, book).await;
        let id = self.store.finish(tx, outcome).await?;
        book.id = Some(id);
        tracing::info!(id, "book added");
        Ok(id)
    }

    async fn insert(conn: &mut SqliteConnection, book: &Book) -> Result<Id> {
        if let Some(id) = book.id
            && fetch(conn, id).await?.is_some()
        {
            exn::bail!(ErrorKind::Conflict("book identifier is already in use"));
        }
        sqlx::query_scalar(include_str!("../../queries/insert_book.sql"))
            .bind(book.id)
            .bind(&book.name)
            .bind(book.publication_year)
            .bind(&book.author)
            .bind(&book.genre)
            .bind(book.added_on)
            .fetch_one(conn)
            .await
            .map_err(database)
    }

    #[instrument(skip_all, fields(id = ?book.id))]
    pub async fn update_book(&self, book: &Book) -> Result<()> {
        let id = book.id.ok_or_raise(|| ErrorKind::InvalidArgument("book has no identifier"))?;
        validate(book)?;
        let mut tx = self.store.begin().await?;
        let outcome = Self::update(&mut tx, id, book).await;
        self.store.finish(tx, outcome).await?;
        tracing::info!(id, "book updated");
        Ok(())
    }

    async fn update(conn: &mut SqliteConnection, id: Id, book: &Book) -> Result<()> {
        if fetch(conn, id).await?.is_none() {
            exn::bail!(ErrorKind::NotFound { entity: "book", id });
        }
        let first_loan: Option<Date> = sqlx::query_scalar(include_str!("../../queries/first_loan_of_book.sql"))
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .map_err(database)?;
        if first_loan.is_some_and(|first| book.added_on > first) {
            exn::bail!(ErrorKind::Conflict("book would be added after its first loan"));
        }
        sqlx::query(include_str!("../../queries/update_book.sql"))
            .bind(&book.name)
            .bind(book.publication_year)
            .bind(&book.author)
            .bind(&book.genre)
            .bind(book.added_on)
            .bind(id)
            .execute(conn)
            .await
            .map_err(database)?;
        Ok(())
    }

    /// Remove a book that has never been lent out.
    #[instrument(skip_all, fields(id = ?book.id))]
    pub async fn delete_book(&self, book: &Book) -> Result<()> {
        let id = book.id.ok_or_raise(|| ErrorKind::InvalidArgument("book has no identifier"))?;
        let mut tx = self.store.begin().await?;
        let outcome = Self::delete(&mut tx, id).await;
        self.store.finish(tx, outcome).await?;
        tracing::info!(id, "book deleted");
        Ok(())
    }

    async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()> {
        if fetch(conn, id).await?.is_none() {
            exn::bail!(ErrorKind::NotFound { entity: "book", id });
        }
        let loans: i64 = sqlx::query_scalar(include_str!("../../queries/count_loans_of_book.sql"))
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .map_err(database)?;
        if loans > 0 {
            exn::bail!(ErrorKind::Conflict("book still has loans on record"));
        }
        sqlx::query(include_str!("../../queries/delete_book.sql")).bind(id).execute(conn).await.map_err(database)?;
        Ok(())
    }
}
