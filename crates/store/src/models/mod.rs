mod book;
mod client;
mod loan;
mod report;

pub use self::book::Book;
pub use self::client::Client;
pub use self::loan::Loan;
pub use self::report::{ClientTally, ExpiredLoan, GenreScore, LastVisit, LoanRecord};

/// Store-assigned row identifier.
pub type Id = i64;
