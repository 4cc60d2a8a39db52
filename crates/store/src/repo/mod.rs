//! Book, client and loan repositories.
//!
//! Read operations never touch the database: they describe a query and hand
//! back a fresh [`CachingView`] subscribed to the repository's notifier.
//! Write operations run in a single transaction, and fire the notifier once
//! the transaction has committed (never before, never on failure).

mod books;
mod clients;
mod loans;

pub use self::books::BookRepository;
pub use self::clients::ClientRepository;
pub use self::loans::LoanRepository;

use crate::error::{Result, database};
use crate::query::{Query, Rows};
use shelf_view::{CachingView, Notifier};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::sync::{Arc, Weak};

/// A lazily evaluated listing or report.
pub type Listing<T> = CachingView<Rows<T>>;

/// State shared by the three repositories: the pool, the repository's own
/// notifier, and non-owning links to the notifiers of repositories whose
/// views embed this repository's data.
#[derive(Debug, Clone)]
pub(crate) struct Store {
    pool: SqlitePool,
    notifier: Arc<Notifier>,
    dependents: Vec<Weak<Notifier>>,
}
impl Store {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool, notifier: Arc::default(), dependents: Vec::new() }
    }

    /// Also invalidate `other`'s views whenever this store commits.
    pub(crate) fn invalidates(&mut self, other: &Store) {
        self.dependents.push(Arc::downgrade(&other.notifier));
    }

    pub(crate) fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub(crate) fn view<T>(&self, query: Query) -> Listing<T> {
        CachingView::subscribed(Rows::new(self.pool.clone(), query), &self.notifier)
    }

    pub(crate) async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool.acquire().await.map_err(database)
    }

    pub(crate) async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool.begin().await.map_err(database)
    }

    /// Commit and notify on success; roll back and hand the error back on
    /// failure.
    pub(crate) async fn finish<T>(&self, tx: Transaction<'static, Sqlite>, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                tx.commit().await.map_err(database)?;
                self.notify();
                Ok(value)
            },
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "failed to roll back transaction");
                }
                Err(err)
            },
        }
    }

    fn notify(&self) {
        let mut delivered = self.notifier.fire();
        for dependent in self.dependents.iter().filter_map(Weak::upgrade) {
            delivered += dependent.fire();
        }
        tracing::debug!(delivered, "views invalidated after commit");
    }
}
