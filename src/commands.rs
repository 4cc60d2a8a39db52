use crate::cli::{Command, PageArg};
use crate::error::{ErrorKind, Result, listing, store};
use crate::export;
use exn::{OptionExt, ResultExt};
use shelf_config::Config;
use shelf_store::Library;
use shelf_store::models::{Book, Client, ClientTally, ExpiredLoan, GenreScore, Id, LastVisit, Loan, LoanRecord};
use shelf_store::predicate::{BookSearch, ClientSearch, LoanSearch};
use shelf_view::{View, page_count};
use std::fs::File;
use std::io::{BufWriter, Write};
use time::{Date, Duration};

/// Everything a command needs besides its own arguments.
#[derive(Debug)]
pub struct Context {
    pub library: Library,
    pub config: Config,
    /// Default for every date argument left out.
    pub today: Date,
}

/// One line of a listing.
trait Line {
    fn line(&self) -> String;
}

fn label(id: Option<Id>) -> String {
    id.map_or_else(|| "#?".to_string(), |id| format!("#{id}"))
}

impl Line for Book {
    fn line(&self) -> String {
        format!(
            "{}\t{} ({}) by {} [{}], added {}",
            label(self.id),
            self.name,
            self.publication_year,
            self.author,
            self.genre,
            self.added_on
        )
    }
}
impl Line for Client {
    fn line(&self) -> String {
        format!("{}\t{}, {} (since {})", label(self.id), self.name, self.address, self.registered_on)
    }
}
impl Line for LoanRecord {
    fn line(&self) -> String {
        let returned = match self.loan.return_date {
            Some(date) => format!(", returned {date}"),
            None => String::new(),
        };
        format!(
            "{}\t{} -> {}\t{} to {}{}",
            label(self.loan.id),
            self.book.name,
            self.client.name,
            self.loan.start_date,
            self.loan.end_date,
            returned
        )
    }
}
impl Line for ExpiredLoan {
    fn line(&self) -> String {
        format!("{}\toverdue {} days", self.record.line(), self.overdue_days)
    }
}
impl Line for GenreScore {
    fn line(&self) -> String {
        format!("{}\t{}", self.genre, self.loans)
    }
}
impl Line for LastVisit {
    fn line(&self) -> String {
        format!("{}\t{}\t{}", label(self.client.id), self.client.name, self.date)
    }
}
impl Line for ClientTally {
    fn line(&self) -> String {
        format!("{}\t{}\t{}", label(self.client.id), self.client.name, self.loans)
    }
}

/// Print the requested page of `view` followed by a `Page x/y` footer.
async fn print_page<V>(view: &V, page: PageArg, size: u64, out: &mut impl Write) -> Result<()>
where
    V: View,
    V::Item: Line,
{
    let len = view.len().await.map_err(listing)?;
    let rows = view.page(page.page - 1, size).await.map_err(listing)?;
    tracing::debug!(len, page = page.page, shown = rows.len(), "printing page");
    if rows.is_empty() {
        writeln!(out, "(nothing to show)").or_raise(|| ErrorKind::Output)?;
    }
    for row in &rows {
        writeln!(out, "{}", row.line()).or_raise(|| ErrorKind::Output)?;
    }
    writeln!(out, "Page {}/{}", page.page, page_count(len, size).max(1)).or_raise(|| ErrorKind::Output)
}

/// Run one command against the library, writing its output to `out`.
pub async fn run(command: Command, ctx: &Context, out: &mut impl Write) -> Result<()> {
    let library = &ctx.library;
    let size = ctx.config.page_size;
    match command {
        Command::Books { filter, page } => {
            let search = BookSearch::from(filter);
            print_page(&library.books.get_books(Some(&search)), page, size, out).await
        },
        Command::Clients { filter, page } => {
            let search = ClientSearch::from(filter);
            print_page(&library.clients.get_clients(Some(&search)), page, size, out).await
        },
        Command::Loans { all, filter, page } => {
            let search = LoanSearch::from(filter);
            let loans = match all {
                true => library.loans.get_loans(Some(&search)),
                false => library.loans.get_unreturned_loans(Some(&search)),
            };
            print_page(&loans, page, size, out).await
        },
        Command::Available { at, filter, page } => {
            let search = BookSearch::from(filter);
            let at = at.unwrap_or(ctx.today);
            print_page(&library.books.get_unloaned_books_at(at, Some(&search)), page, size, out).await
        },
        Command::Overdue { at, export, filter, page } => {
            let search = LoanSearch::from(filter);
            let expired = library.loans.get_expired_loans_at(at.unwrap_or(ctx.today), Some(&search));
            match export {
                Some(path) => {
                    let file = File::create(&path).or_raise(|| ErrorKind::Output)?;
                    let mut writer = BufWriter::new(file);
                    let written = export::write_expired(&expired, ctx.config.export_chunk_size, &mut writer).await?;
                    tracing::info!(written, path = %path.display(), "overdue report exported");
                    writeln!(out, "Exported {written} overdue loans to {}", path.display()).or_raise(|| ErrorKind::Output)
                },
                None => print_page(&expired, page, size, out).await,
            }
        },
        Command::Genres { page } => print_page(&library.books.get_genre_scores(), page, size, out).await,
        Command::Visits { filter, page } => {
            let search = ClientSearch::from(filter);
            print_page(&library.clients.get_last_visit_dates(Some(&search)), page, size, out).await
        },
        Command::Totals { filter, page } => {
            let search = ClientSearch::from(filter);
            print_page(&library.clients.get_total_loans_per_client(Some(&search)), page, size, out).await
        },
        Command::Outstanding { filter, page } => {
            let search = ClientSearch::from(filter);
            print_page(&library.clients.get_total_unreturned_loans_per_client(Some(&search)), page, size, out).await
        },
        Command::AddBook { name, author, genre, year, added } => {
            let mut book = Book::new(name, year, author, genre, added.unwrap_or(ctx.today));
            let id = library.books.add_book(&mut book).await.map_err(store)?;
            writeln!(out, "Added book #{id}").or_raise(|| ErrorKind::Output)
        },
        Command::AddClient { name, address, registered } => {
            let mut client = Client::new(name, address, registered.unwrap_or(ctx.today));
            let id = library.clients.add_client(&mut client).await.map_err(store)?;
            writeln!(out, "Added client #{id}").or_raise(|| ErrorKind::Output)
        },
        Command::Lend { book, client, start, end } => {
            let start = start.unwrap_or(ctx.today);
            let end = match end {
                Some(end) => end,
                None => start
                    .checked_add(Duration::days(i64::from(ctx.config.loan_period_days)))
                    .ok_or_raise(|| ErrorKind::InvalidArgument("loan period runs past the end of the calendar"))?,
            };
            let mut loan = Loan::new(book, client, start, end);
            let id = library.loans.add_loan(&mut loan).await.map_err(store)?;
            writeln!(out, "Lent book #{book} to client #{client} as loan #{id}, due {end}").or_raise(|| ErrorKind::Output)
        },
        Command::Return { loan, on } => {
            let returned = library.loans.return_loan(loan, on.unwrap_or(ctx.today)).await.map_err(store)?;
            let late = returned.return_date.is_some_and(|date| date > returned.end_date);
            let note = if late { " (late)" } else { "" };
            writeln!(out, "Returned loan #{loan}{note}").or_raise(|| ErrorKind::Output)
        },
        Command::DeleteBook { id } => {
            let book = library
                .books
                .get_book(id)
                .await
                .map_err(store)?
                .ok_or_raise(|| ErrorKind::NotFound { entity: "book", id })?;
            library.books.delete_book(&book).await.map_err(store)?;
            writeln!(out, "Deleted book #{id}").or_raise(|| ErrorKind::Output)
        },
        Command::DeleteClient { id } => {
            let client = library
                .clients
                .get_client(id)
                .await
                .map_err(store)?
                .ok_or_raise(|| ErrorKind::NotFound { entity: "client", id })?;
            library.clients.delete_client(&client).await.map_err(store)?;
            writeln!(out, "Deleted client #{id}").or_raise(|| ErrorKind::Output)
        },
        Command::DeleteLoan { id } => {
            let loan = library
                .loans
                .get_loan(id)
                .await
                .map_err(store)?
                .ok_or_raise(|| ErrorKind::NotFound { entity: "loan", id })?;
            library.loans.delete_loan(&loan).await.map_err(store)?;
            writeln!(out, "Deleted loan #{id}").or_raise(|| ErrorKind::Output)
        },
    }
}
