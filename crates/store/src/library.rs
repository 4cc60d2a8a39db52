use crate::Database;
use crate::repo::{BookRepository, ClientRepository, LoanRepository, Store};

/// The three repositories of one database, wired so that views stay
/// coherent across them.
///
/// Loan listings embed book and client columns, and book and client reports
/// are computed from loans: a write through any repository invalidates its
/// own views and the views of every repository that reads its rows.
#[derive(Debug, Clone)]
pub struct Library {
    pub books: BookRepository,
    pub clients: ClientRepository,
    pub loans: LoanRepository,
}

impl From<&Database> for Library {
    fn from(db: &Database) -> Self {
        let mut books = Store::new(db.pool().clone());
        let mut clients = Store::new(db.pool().clone());
        let mut loans = Store::new(db.pool().clone());
        loans.invalidates(&books);
        loans.invalidates(&clients);
        books.invalidates(&loans);
        clients.invalidates(&loans);
        tracing::trace!("library repositories linked");
        Self {
            books: BookRepository::new(books),
            clients: ClientRepository::new(clients),
            loans: LoanRepository::new(loans),
        }
    }
}
