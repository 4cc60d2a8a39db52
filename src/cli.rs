use clap::{Args, Parser, Subcommand};
use shelf_store::models::Id;
use shelf_store::predicate::{BookSearch, ClientSearch, LoanSearch};
use std::path::PathBuf;
use time::Date;
use time::macros::format_description;

/// Parse an ISO-8601 calendar date (`2024-05-20`).
pub fn parse_date(value: &str) -> Result<Date, String> {
    Date::parse(value, format_description!("[year]-[month]-[day]")).map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

#[derive(Parser, Debug)]
#[command(name = "shelf", version)]
#[command(about = "Library circulation manager: books, clients, loans and their reports", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Circulation database, overriding the configured one
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List books
    Books {
        #[command(flatten)]
        filter: BookFilter,
        #[command(flatten)]
        page: PageArg,
    },
    /// List clients
    Clients {
        #[command(flatten)]
        filter: ClientFilter,
        #[command(flatten)]
        page: PageArg,
    },
    /// List loans that have not been returned
    Loans {
        /// Include returned loans
        #[arg(long)]
        all: bool,
        #[command(flatten)]
        filter: LoanFilter,
        #[command(flatten)]
        page: PageArg,
    },
    /// List books that are on the shelf on a given day
    Available {
        /// Day to check (defaults to today)
        #[arg(long, value_parser = parse_date)]
        at: Option<Date>,
        #[command(flatten)]
        filter: BookFilter,
        #[command(flatten)]
        page: PageArg,
    },
    /// List loans that are overdue on a given day
    Overdue {
        /// Reporting day (defaults to today)
        #[arg(long, value_parser = parse_date)]
        at: Option<Date>,
        /// Write the whole report to a tab-separated file instead
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,
        #[command(flatten)]
        filter: LoanFilter,
        #[command(flatten)]
        page: PageArg,
    },
    /// Number of loans per genre, most popular first
    Genres {
        #[command(flatten)]
        page: PageArg,
    },
    /// Last visit of every client
    Visits {
        #[command(flatten)]
        filter: ClientFilter,
        #[command(flatten)]
        page: PageArg,
    },
    /// Number of loans ever made per client
    Totals {
        #[command(flatten)]
        filter: ClientFilter,
        #[command(flatten)]
        page: PageArg,
    },
    /// Number of unreturned loans per client
    Outstanding {
        #[command(flatten)]
        filter: ClientFilter,
        #[command(flatten)]
        page: PageArg,
    },
    /// Add a book to the catalogue
    AddBook {
        name: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        genre: String,
        #[arg(long)]
        year: i32,
        /// Day the book joined the library (defaults to today)
        #[arg(long, value_parser = parse_date)]
        added: Option<Date>,
    },
    /// Register a client
    AddClient {
        name: String,
        #[arg(long)]
        address: String,
        /// Registration day (defaults to today)
        #[arg(long, value_parser = parse_date)]
        registered: Option<Date>,
    },
    /// Lend a book to a client
    Lend {
        book: Id,
        client: Id,
        /// First day of the loan (defaults to today)
        #[arg(long, value_parser = parse_date)]
        start: Option<Date>,
        /// Expected return day (defaults to the configured loan period)
        #[arg(long, value_parser = parse_date)]
        end: Option<Date>,
    },
    /// Record that a lent book came back
    Return {
        loan: Id,
        /// Day of the return (defaults to today)
        #[arg(long, value_parser = parse_date)]
        on: Option<Date>,
    },
    /// Remove a book that has never been lent
    DeleteBook { id: Id },
    /// Remove a client without loans
    DeleteClient { id: Id },
    /// Remove a loan record
    DeleteLoan { id: Id },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct PageArg {
    /// Page to show, starting at 1
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub page: u64,
}

#[derive(Args, Debug, Clone, Default)]
pub struct BookFilter {
    /// Book name contains
    #[arg(long)]
    pub name: Option<String>,
    /// Author contains
    #[arg(long)]
    pub author: Option<String>,
    /// Genre contains
    #[arg(long)]
    pub genre: Option<String>,
    /// Published in or after this year
    #[arg(long)]
    pub year_min: Option<i32>,
    /// Published in or before this year
    #[arg(long)]
    pub year_max: Option<i32>,
}
impl From<BookFilter> for BookSearch {
    fn from(filter: BookFilter) -> Self {
        Self {
            name_contains: filter.name,
            author_contains: filter.author,
            genre_contains: filter.genre,
            publication_year_min: filter.year_min,
            publication_year_max: filter.year_max,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ClientFilter {
    /// Client name contains
    #[arg(long)]
    pub name: Option<String>,
}
impl From<ClientFilter> for ClientSearch {
    fn from(filter: ClientFilter) -> Self {
        Self { name_contains: filter.name }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct LoanFilter {
    /// Book name contains
    #[arg(long)]
    pub book: Option<String>,
    /// Author contains
    #[arg(long)]
    pub author: Option<String>,
    /// Genre contains
    #[arg(long)]
    pub genre: Option<String>,
    /// Book published in or after this year
    #[arg(long)]
    pub year_min: Option<i32>,
    /// Book published in or before this year
    #[arg(long)]
    pub year_max: Option<i32>,
    /// Client name contains
    #[arg(long)]
    pub client: Option<String>,
    /// Loan started on or after this day
    #[arg(long, value_parser = parse_date)]
    pub from: Option<Date>,
    /// Loan started on or before this day
    #[arg(long, value_parser = parse_date)]
    pub until: Option<Date>,
}
impl From<LoanFilter> for LoanSearch {
    fn from(filter: LoanFilter) -> Self {
        Self {
            book_name_contains: filter.book,
            author_contains: filter.author,
            genre_contains: filter.genre,
            publication_year_min: filter.year_min,
            publication_year_max: filter.year_max,
            client_name_contains: filter.client,
            start_date_min: filter.from,
            start_date_max: filter.until,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;
    use time::macros::date;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case("2024-05-20", Some(date!(2024 - 05 - 20)))]
    #[case("2024-02-30", None)]
    #[case("20/05/2024", None)]
    fn test_parse_date(#[case] value: &str, #[case] expected: Option<Date>) {
        assert_eq!(parse_date(value).ok(), expected);
    }

    #[test]
    fn test_loan_filter_flags() {
        let cli = Cli::try_parse_from(["shelf", "overdue", "--year-min", "2000", "--client", "ann", "--from", "2024-01-01"])
            .unwrap();
        let Command::Overdue { filter, page, export, at } = cli.command else {
            panic!("expected the overdue command");
        };
        assert_eq!(page.page, 1);
        assert!(export.is_none() && at.is_none());
        let search = LoanSearch::from(filter);
        assert_eq!(search.publication_year_min, Some(2000));
        assert_eq!(search.client_name_contains.as_deref(), Some("ann"));
        assert_eq!(search.start_date_min, Some(date!(2024 - 01 - 01)));
    }

    #[test]
    fn test_page_starts_at_one() {
        assert!(Cli::try_parse_from(["shelf", "books", "--page", "0"]).is_err());
        let cli = Cli::try_parse_from(["shelf", "--database", "x.db", "books", "--page", "3"]).unwrap();
        assert_eq!(cli.database, Some(PathBuf::from("x.db")));
        assert!(matches!(cli.command, Command::Books { page: PageArg { page: 3 }, .. }));
    }
}
