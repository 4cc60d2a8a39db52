//! SQLite-backed circulation store.
//!
//! Books, clients and the loans linking them, kept in one SQLite database.
//! Every listing and report is handed out as a lazy [`Listing`]: nothing is
//! fetched until a length or a page is asked for, and the cached length is
//! dropped whenever a write commits through any repository of the same
//! [`Library`].
//!
//! ```no_run
//! use shelf_store::{Database, Library};
//! use shelf_store::predicate::BookSearch;
//! use shelf_view::View;
//!
//! # async fn run() -> shelf_store::error::Result<()> {
//! let db = Database::connect("library.db").await?;
//! let library = Library::from(&db);
//! let search = BookSearch { author_contains: Some("Tolkien".into()), ..BookSearch::default() };
//! let books = library.books.get_books(Some(&search));
//! let first_page = books.page(0, 10).await.ok();
//! # Ok(())
//! # }
//! ```

mod db;
pub mod error;
mod library;
pub mod models;
pub mod predicate;
mod query;
mod repo;

pub use crate::db::Database;
pub use crate::library::Library;
pub use crate::query::Rows;
pub use crate::repo::{BookRepository, ClientRepository, Listing, LoanRepository};
