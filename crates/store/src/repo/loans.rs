use crate::Database;
use crate::error::{ErrorKind, Result, database};
use crate::models::{ExpiredLoan, Id, Loan, LoanRecord};
use crate::predicate::{Clause, LoanSearch, Param, translate};
use crate::query::Query;
use crate::repo::{Listing, Store, books, clients};
use exn::OptionExt;
use shelf_view::Notifier;
use sqlx::SqliteConnection;
use time::Date;
use tracing::instrument;

const LOAN_ORDER: &str = "start_date, loan_id";
const EXPIRED_ORDER: &str = "end_date, loan_id";
const UNRETURNED: &str = "l.return_date IS NULL";
/// Due before the given day, and either still out or brought back late.
const EXPIRED_AT: &str = "l.end_date < ? AND (l.return_date IS NULL OR l.return_date > l.end_date)";

async fn fetch(conn: &mut SqliteConnection, id: Id) -> Result<Option<Loan>> {
    sqlx::query_as(include_str!("../../queries/get_loan.sql"))
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(database)
}

fn validate(loan: &Loan) -> Result<()> {
    if loan.end_date < loan.start_date {
        exn::bail!(ErrorKind::InvalidArgument("loan is due before it starts"));
    }
    if loan.return_date.is_some_and(|returned| returned < loan.start_date) {
        exn::bail!(ErrorKind::InvalidArgument("loan is returned before it starts"));
    }
    Ok(())
}

/// Check `loan` against the book, the client and the other loans of the book.
async fn check_consistency(conn: &mut SqliteConnection, loan: &Loan) -> Result<()> {
    let book = books::fetch(conn, loan.book_id)
        .await?
        .ok_or_raise(|| ErrorKind::NotFound { entity: "book", id: loan.book_id })?;
    let client = clients::fetch(conn, loan.client_id)
        .await?
        .ok_or_raise(|| ErrorKind::NotFound { entity: "client", id: loan.client_id })?;
    if loan.start_date < book.added_on {
        exn::bail!(ErrorKind::Conflict("loan starts before the book was added"));
    }
    if loan.start_date < client.registered_on {
        exn::bail!(ErrorKind::Conflict("loan starts before the client registered"));
    }
    let overlapping: Option<Id> = sqlx::query_scalar(include_str!("../../queries/overlapping_loan.sql"))
        .bind(loan.book_id)
        .bind(loan.id)
        .bind(loan.return_date)
        .bind(loan.return_date)
        .bind(loan.start_date)
        .fetch_optional(conn)
        .await
        .map_err(database)?;
    if let Some(other) = overlapping {
        tracing::debug!(other, "loan overlaps an existing loan of the same book");
        exn::bail!(ErrorKind::Conflict("book is already on loan during that period"));
    }
    Ok(())
}

/// Loans: who has which book, since when, and what is overdue.
#[derive(Debug, Clone)]
pub struct LoanRepository {
    store: Store,
}
impl From<&Database> for LoanRepository {
    fn from(db: &Database) -> Self {
        Self::new(Store::new(db.pool().clone()))
    }
}
impl LoanRepository {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn notifier(&self) -> &Notifier {
        self.store.notifier()
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// Every loan on record, oldest first.
    pub fn get_loans(&self, search: Option<&LoanSearch>) -> Listing<LoanRecord> {
        let query = Query::new(include_str!("../../queries/select_loans.sql"), LOAN_ORDER).filter(translate(search));
        self.store.view(query)
    }

    /// Loans whose book has not come back yet.
    pub fn get_unreturned_loans(&self, search: Option<&LoanSearch>) -> Listing<LoanRecord> {
        let query = Query::new(include_str!("../../queries/select_loans.sql"), LOAN_ORDER)
            .condition(Clause::new(UNRETURNED, Vec::new()))
            .filter(translate(search));
        self.store.view(query)
    }

    /// Loans overdue as of `at`, ordered by due date.
    ///
    /// A loan is expired when it was due before `at` and it is either still
    /// out or was returned after its due date. The overdue span runs from
    /// the due date to the return date, capped at `at`.
    pub fn get_expired_loans_at(&self, at: Date, search: Option<&LoanSearch>) -> Listing<ExpiredLoan> {
        let select = include_str!("../../queries/select_expired_loans.sql");
        let query = Query::with_params(select, vec![Param::from(at); 2], EXPIRED_ORDER)
            .condition(Clause::new(EXPIRED_AT, vec![Param::from(at)]))
            .filter(translate(search));
        self.store.view(query)
    }

    pub async fn get_loan(&self, id: Id) -> Result<Option<Loan>> {
        let mut conn = self.store.acquire().await?;
        fetch(&mut conn, id).await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Record a new loan, storing the assigned identifier back into it.
    ///
    /// The book must be on the shelf for the whole period the loan occupies
    /// it: from the start date up to (excluding) the return date, or
    /// indefinitely while unreturned. A book returned on a given day can be
    /// lent again that same day.
    #[instrument(skip_all, fields(id = ?loan.id, book = loan.book_id, client = loan.client_id))]
    pub async fn add_loan(&self, loan: &mut Loan) -> Result<Id> {
        validate(loan)?;
        let mut tx = self.store.begin().await?;
        let outcome = Self::insert(&mut tx, loan).await;
        let id = self.store.finish(tx, outcome).await?;
        loan.id = Some(id);
        tracing::info!(id, "loan added");
        Ok(id)
    }

    async fn insert(conn: &mut SqliteConnection, loan: &Loan) -> Result<Id> {
        if let Some(id) = loan.id
            && fetch(conn, id).await?.is_some()
        {
            exn::bail!(ErrorKind::Conflict("loan identifier is already in use"));
        }
        check_consistency(conn, loan).await?;
        sqlx::query_scalar(include_str!("../../queries/insert_loan.sql"))
            .bind(loan.id)
            .bind(loan.book_id)
            .bind(loan.client_id)
            .bind(loan.start_date)
            .bind(loan.end_date)
            .bind(loan.return_date)
            .fetch_one(conn)
            .await
            .map_err(database)
    }

    #[instrument(skip_all, fields(id = ?loan.id))]
    pub async fn update_loan(&self, loan: &Loan) -> Result<()> {
        let id = loan.id.ok_or_raise(|| ErrorKind::InvalidArgument("loan has no identifier"))?;
        validate(loan)?;
        let mut tx = self.store.begin().await?;
        let outcome = Self::update(&mut tx, id, loan).await;
        self.store.finish(tx, outcome).await?;
        tracing::info!(id, "loan updated");
        Ok(())
    }

    async fn update(conn: &mut SqliteConnection, id: Id, loan: &Loan) -> Result<()> {
        if fetch(conn, id).await?.is_none() {
            exn::bail!(ErrorKind::NotFound { entity: "loan", id });
        }
        check_consistency(conn, loan).await?;
        sqlx::query(include_str!("../../queries/update_loan.sql"))
            .bind(loan.book_id)
            .bind(loan.client_id)
            .bind(loan.start_date)
            .bind(loan.end_date)
            .bind(loan.return_date)
            .bind(id)
            .execute(conn)
            .await
            .map_err(database)?;
        Ok(())
    }

    /// Record that the book of loan `id` came back on `date`.
    #[instrument(skip(self))]
    pub async fn return_loan(&self, id: Id, date: Date) -> Result<Loan> {
        let mut tx = self.store.begin().await?;
        let outcome = Self::mark_returned(&mut tx, id, date).await;
        let loan = self.store.finish(tx, outcome).await?;
        tracing::info!(id, "loan returned");
        Ok(loan)
    }

    async fn mark_returned(conn: &mut SqliteConnection, id: Id, date: Date) -> Result<Loan> {
        let loan = fetch(conn, id).await?.ok_or_raise(|| ErrorKind::NotFound { entity: "loan", id })?;
        if loan.is_returned() {
            exn::bail!(ErrorKind::Conflict("loan was already returned"));
        }
        let loan = loan.returned_on(date);
        validate(&loan)?;
        // Closing an open interval only ever shrinks it, so no other loan
        // can start overlapping.
        sqlx::query(include_str!("../../queries/return_loan.sql"))
            .bind(date)
            .bind(id)
            .execute(conn)
            .await
            .map_err(database)?;
        Ok(loan)
    }

    #[instrument(skip_all, fields(id = ?loan.id))]
    pub async fn delete_loan(&self, loan: &Loan) -> Result<()> {
        let id = loan.id.ok_or_raise(|| ErrorKind::InvalidArgument("loan has no identifier"))?;
        let mut tx = self.store.begin().await?;
        let outcome = Self::delete(&mut tx, id).await;
        self.store.finish(tx, outcome).await?;
        tracing::info!(id, "loan deleted");
        Ok(())
    }

    async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()> {
        if fetch(conn, id).await?.is_none() {
            exn::bail!(ErrorKind::NotFound { entity: "loan", id });
        }
        sqlx::query(include_str!("../../queries/delete_loan.sql")).bind(id).execute(conn).await.map_err(database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Library;
    use crate::models::{Book, Client};
    use crate::repo::fixtures::{TODAY, book, client, library, loan};
    use rstest::rstest;
    use shelf_view::View;
    use time::Duration;
    use time::macros::date;

    async fn stocked() -> (Library, Book, Client) {
        let library = library().await;
        let mut novel = book("Novel", 2000);
        library.books.add_book(&mut novel).await.unwrap();
        let mut reader = client("Reader");
        library.clients.add_client(&mut reader).await.unwrap();
        (library, novel, reader)
    }

    #[tokio::test]
    async fn test_expired_loans_at() {
        let (library, novel, reader) = stocked().await;
        let mut atlas = book("Atlas", 2000);
        let mut diary = book("Diary", 2000);
        let mut essays = book("Essays", 2000);
        let mut fables = book("Fables", 2000);
        for b in [&mut atlas, &mut diary, &mut essays, &mut fables] {
            library.books.add_book(b).await.unwrap();
        }
        let start = TODAY - Duration::days(30);
        // Due five days ago, still out.
        let mut overdue = loan(&novel, &reader, start, TODAY - Duration::days(5));
        // Due today: not expired yet.
        let mut due_today = loan(&atlas, &reader, start, TODAY);
        // Returned on its due date.
        let mut on_time = loan(&diary, &reader, start, TODAY - Duration::days(10)).returned_on(TODAY - Duration::days(10));
        // Returned three days late.
        let mut late = loan(&essays, &reader, start, TODAY - Duration::days(10)).returned_on(TODAY - Duration::days(7));
        // Returned early.
        let mut early = loan(&fables, &reader, start, TODAY - Duration::days(10)).returned_on(TODAY - Duration::days(20));
        for l in [&mut overdue, &mut due_today, &mut on_time, &mut late, &mut early] {
            library.loans.add_loan(l).await.unwrap();
        }

        let expired = library.loans.get_expired_loans_at(TODAY, None).range(.., 1).await.unwrap();
        let expired: Vec<_> = expired.into_iter().map(|e| (e.record.book.name, e.overdue_days)).collect();
        assert_eq!(expired, vec![("Essays".to_string(), 3), ("Novel".to_string(), 5)]);
    }

    #[tokio::test]
    async fn test_expired_record_carries_book_and_client() {
        let (library, novel, reader) = stocked().await;
        let mut lent = loan(&novel, &reader, date!(2024 - 05 - 01), date!(2024 - 05 - 10));
        library.loans.add_loan(&mut lent).await.unwrap();
        let expired = library.loans.get_expired_loans_at(TODAY, None).get(0).await.unwrap();
        assert_eq!(expired.record.loan, lent);
        assert_eq!(expired.record.book, novel);
        assert_eq!(expired.record.client, reader);
        assert_eq!(expired.overdue_days, 10);
        // As of an earlier day, the span is counted up to that day only.
        let earlier = library.loans.get_expired_loans_at(date!(2024 - 05 - 12), None).get(0).await.unwrap();
        assert_eq!(earlier.overdue_days, 2);
    }

    #[tokio::test]
    async fn test_publication_year_range_is_inclusive() {
        let (library, _, reader) = stocked().await;
        for (name, year) in [("1999", 1999), ("2000", 2000), ("2005", 2005), ("2010", 2010), ("2011", 2011)] {
            let mut b = book(name, year);
            library.books.add_book(&mut b).await.unwrap();
            library.loans.add_loan(&mut loan(&b, &reader, TODAY, TODAY)).await.unwrap();
        }
        let search = LoanSearch { publication_year_min: Some(2000), publication_year_max: Some(2010), ..LoanSearch::default() };
        let found = library.loans.get_loans(Some(&search)).range(.., 1).await.unwrap();
        let mut years: Vec<_> = found.iter().map(|r| r.book.publication_year).collect();
        years.sort();
        assert_eq!(years, vec![2000, 2005, 2010]);
    }

    #[tokio::test]
    async fn test_loan_search_across_joins() {
        let (library, novel, reader) = stocked().await;
        let mut other = client("Someone Else");
        library.clients.add_client(&mut other).await.unwrap();
        let mut atlas = Book::new("Atlas", 1990, "Cartographer", "Reference", date!(2020 - 01 - 01));
        library.books.add_book(&mut atlas).await.unwrap();
        library.loans.add_loan(&mut loan(&novel, &reader, date!(2024 - 01 - 05), date!(2024 - 01 - 10))).await.unwrap();
        library.loans.add_loan(&mut loan(&atlas, &other, date!(2024 - 03 - 05), date!(2024 - 03 - 10))).await.unwrap();

        let by_client = LoanSearch { client_name_contains: Some("else".into()), ..LoanSearch::default() };
        let found = library.loans.get_loans(Some(&by_client)).range(.., 1).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].book.name, "Atlas");

        let by_date = LoanSearch {
            start_date_min: Some(date!(2024 - 01 - 05)),
            start_date_max: Some(date!(2024 - 01 - 05)),
            ..LoanSearch::default()
        };
        let found = library.loans.get_loans(Some(&by_date)).range(.., 1).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].client.name, "Reader");

        let everything = library.loans.get_loans(Some(&LoanSearch::default()));
        assert_eq!(everything.len().await.unwrap(), 2);
    }

    #[rstest]
    // Existing loan occupies [03-10, 03-20).
    #[case(date!(2024 - 03 - 01), Some(date!(2024 - 03 - 10)), true)]
    #[case(date!(2024 - 03 - 20), None, true)]
    #[case(date!(2024 - 03 - 01), Some(date!(2024 - 03 - 11)), false)]
    #[case(date!(2024 - 03 - 19), None, false)]
    #[case(date!(2024 - 03 - 12), Some(date!(2024 - 03 - 15)), false)]
    #[case(date!(2024 - 03 - 01), None, false)]
    #[tokio::test]
    async fn test_overlap_is_half_open(#[case] start: Date, #[case] returned: Option<Date>, #[case] allowed: bool) {
        let (library, novel, reader) = stocked().await;
        let existing = loan(&novel, &reader, date!(2024 - 03 - 10), date!(2024 - 03 - 20)).returned_on(date!(2024 - 03 - 20));
        library.loans.add_loan(&mut existing.clone()).await.unwrap();
        let mut candidate = loan(&novel, &reader, start, start + Duration::days(30));
        candidate.return_date = returned;
        let outcome = library.loans.add_loan(&mut candidate).await;
        match allowed {
            true => assert!(outcome.is_ok()),
            false => assert!(matches!(&*outcome.unwrap_err(), ErrorKind::Conflict(_))),
        }
    }

    #[tokio::test]
    async fn test_open_loan_blocks_the_book() {
        let (library, novel, reader) = stocked().await;
        let mut open = loan(&novel, &reader, date!(2024 - 03 - 10), date!(2024 - 03 - 20));
        library.loans.add_loan(&mut open).await.unwrap();
        let err = library.loans.add_loan(&mut loan(&novel, &reader, TODAY, TODAY)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
        library.loans.return_loan(open.id.unwrap(), date!(2024 - 03 - 18)).await.unwrap();
        library.loans.add_loan(&mut loan(&novel, &reader, date!(2024 - 03 - 18), TODAY)).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_dates() {
        let (library, novel, reader) = stocked().await;
        let err = library.loans.add_loan(&mut loan(&novel, &reader, TODAY, TODAY - Duration::days(1))).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));
        let backwards = loan(&novel, &reader, TODAY, TODAY).returned_on(TODAY - Duration::days(1));
        let err = library.loans.add_loan(&mut backwards.clone()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));

        let before_added = loan(&novel, &reader, date!(2019 - 12 - 31), date!(2020 - 01 - 10));
        let err = library.loans.add_loan(&mut before_added.clone()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
        let mut newcomer = Client::new("Newcomer", "Elsewhere", date!(2024 - 05 - 01));
        library.clients.add_client(&mut newcomer).await.unwrap();
        let err = library.loans.add_loan(&mut loan(&novel, &newcomer, date!(2024 - 04 - 30), TODAY)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unknown_references() {
        let (library, novel, reader) = stocked().await;
        let err = library.loans.add_loan(&mut Loan::new(404, reader.id.unwrap(), TODAY, TODAY)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound { entity: "book", id: 404 }));
        let err = library.loans.add_loan(&mut Loan::new(novel.id.unwrap(), 404, TODAY, TODAY)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound { entity: "client", id: 404 }));
    }

    #[tokio::test]
    async fn test_return_loan() {
        let (library, novel, reader) = stocked().await;
        let mut lent = loan(&novel, &reader, date!(2024 - 05 - 01), date!(2024 - 05 - 15));
        let id = library.loans.add_loan(&mut lent).await.unwrap();
        let unreturned = library.loans.get_unreturned_loans(None);
        assert_eq!(unreturned.len().await.unwrap(), 1);

        let err = library.loans.return_loan(id, date!(2024 - 04 - 30)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));
        let returned = library.loans.return_loan(id, TODAY).await.unwrap();
        assert_eq!(returned.return_date, Some(TODAY));
        assert_eq!(unreturned.len().await.unwrap(), 0);
        assert_eq!(library.loans.get_loan(id).await.unwrap(), Some(returned));

        let err = library.loans.return_loan(id, TODAY).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
        let err = library.loans.return_loan(999, TODAY).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound { entity: "loan", id: 999 }));
    }

    #[tokio::test]
    async fn test_update_loan_ignores_itself_when_checking_overlap() {
        let (library, novel, reader) = stocked().await;
        let mut lent = loan(&novel, &reader, date!(2024 - 05 - 01), date!(2024 - 05 - 15));
        library.loans.add_loan(&mut lent).await.unwrap();
        let extended = Loan { end_date: date!(2024 - 05 - 30), ..lent.clone() };
        library.loans.update_loan(&extended).await.unwrap();
        assert_eq!(library.loans.get_loan(lent.id.unwrap()).await.unwrap(), Some(extended));

        let err = library.loans.update_loan(&loan(&novel, &reader, TODAY, TODAY)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));
        let err = library.loans.update_loan(&loan(&novel, &reader, TODAY, TODAY).with_id(77)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound { entity: "loan", id: 77 }));
    }

    #[tokio::test]
    async fn test_delete_loan_frees_book_and_client() {
        let (library, novel, reader) = stocked().await;
        let mut lent = loan(&novel, &reader, TODAY, TODAY);
        library.loans.add_loan(&mut lent).await.unwrap();
        let loans = library.loans.get_loans(None);
        assert_eq!(loans.len().await.unwrap(), 1);
        library.loans.delete_loan(&lent).await.unwrap();
        assert_eq!(loans.len().await.unwrap(), 0);
        library.books.delete_book(&novel).await.unwrap();
        library.clients.delete_client(&reader).await.unwrap();
    }

    #[tokio::test]
    async fn test_book_write_invalidates_loan_views() {
        let (library, novel, reader) = stocked().await;
        library.loans.add_loan(&mut loan(&novel, &reader, TODAY, TODAY)).await.unwrap();
        let search = LoanSearch { book_name_contains: Some("Renamed".into()), ..LoanSearch::default() };
        let renamed_loans = library.loans.get_loans(Some(&search));
        assert_eq!(renamed_loans.len().await.unwrap(), 0);
        library.books.update_book(&Book { name: "Renamed".to_string(), ..novel }).await.unwrap();
        assert_eq!(renamed_loans.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_strided_listing() {
        let (library, _, reader) = stocked().await;
        for day in 1..=9u8 {
            let mut b = book(&format!("Book {day}"), 2000);
            library.books.add_book(&mut b).await.unwrap();
            let start = date!(2024 - 01 - 01) + Duration::days(i64::from(day));
            library.loans.add_loan(&mut loan(&b, &reader, start, start)).await.unwrap();
        }
        let loans = library.loans.get_loans(None);
        let picked = loans.range(1..9, 3).await.unwrap();
        let names: Vec<_> = picked.into_iter().map(|r| r.book.name).collect();
        assert_eq!(names, vec!["Book 2", "Book 5", "Book 8"]);
    }
}
