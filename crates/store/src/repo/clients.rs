use crate::Database;
use crate::error::{ErrorKind, Result, database};
use crate::models::{Client, ClientTally, Id, LastVisit};
use crate::predicate::{ClientSearch, translate};
use crate::query::Query;
use crate::repo::{Listing, Store};
use exn::OptionExt;
use shelf_view::Notifier;
use sqlx::SqliteConnection;
use time::Date;
use tracing::instrument;

const CLIENT_ORDER: &str = "client_name, client_id";
const TALLY_ORDER: &str = "loans DESC, client_name, client_id";

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: Id) -> Result<Option<Client>> {
    sqlx::query_as(include_str!("../../queries/get_client.sql"))
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(database)
}

fn validate(client: &Client) -> Result<()> {
    if client.name.trim().is_empty() {
        exn::bail!(ErrorKind::InvalidArgument("client name must not be empty"));
    }
    Ok(())
}

/// Registered readers and the reports about their borrowing.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    store: Store,
}
impl From<&Database> for ClientRepository {
    fn from(db: &Database) -> Self {
        Self::new(Store::new(db.pool().clone()))
    }
}
impl ClientRepository {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn notifier(&self) -> &Notifier {
        self.store.notifier()
    }

    // =========================================================================
    // Listings
    // =========================================================================

    pub fn get_clients(&self, search: Option<&ClientSearch>) -> Listing<Client> {
        let query = Query::new(include_str!("../../queries/select_clients.sql"), CLIENT_ORDER).filter(translate(search));
        self.store.view(query)
    }

    /// When each client was last seen: the latest loan start or return, or
    /// the registration date for clients who never borrowed.
    pub fn get_last_visit_dates(&self, search: Option<&ClientSearch>) -> Listing<LastVisit> {
        let query = Query::new(include_str!("../../queries/select_last_visits.sql"), CLIENT_ORDER)
            .filter(translate(search))
            .group_by("c.id");
        self.store.view(query)
    }

    /// Number of loans ever made per client, busiest first.
    pub fn get_total_loans_per_client(&self, search: Option<&ClientSearch>) -> Listing<ClientTally> {
        let query = Query::new(include_str!("../../queries/select_loans_per_client.sql"), TALLY_ORDER)
            .filter(translate(search))
            .group_by("c.id");
        self.store.view(query)
    }

    /// Number of books each client currently holds. Every client is listed,
    /// with zero when nothing is outstanding.
    pub fn get_total_unreturned_loans_per_client(&self, search: Option<&ClientSearch>) -> Listing<ClientTally> {
        let query = Query::new(include_str!("../../queries/select_unreturned_per_client.sql"), TALLY_ORDER)
            .filter(translate(search))
            .group_by("c.id");
        self.store.view(query)
    }

    pub async fn get_client(&self, id: Id) -> Result<Option<Client>> {
        let mut conn = self.store.acquire().await?;
        fetch(&mut conn, id).await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Register `client`, storing the assigned identifier back into it.
    #[instrument(skip_all, fields(id = ?client.id, name = %client.name))]
    pub async fn add_client(&self, client: &mut Client) -> Result<Id> {
        validate(client)?;
        let mut tx = self.store.begin().await?;
        let outcome = Self::insert(&mut tx, client).await;
        let id = self.store.finish(tx, outcome).await?;
        client.id = Some(id);
        tracing::info!(id, "client added");
        Ok(id)
    }

    async fn insert(conn: &mut SqliteConnection, client: &Client) -> Result<Id> {
        if let Some(id) = client.id
            && fetch(conn, id).await?.is_some()
        {
            exn::bail!(ErrorKind::Conflict("client identifier is already in use"));
        }
        sqlx::query_scalar(include_str!("../../queries/insert_client.sql"))
            .bind(client.id)
            .bind(&client.name)
            .bind(&client.address)
            .bind(client.registered_on)
            .fetch_one(conn)
            .await
            .map_err(database)
    }

    #[instrument(skip_all, fields(id = ?client.id))]
    pub async fn update_client(&self, client: &Client) -> Result<()> {
        let id = client.id.ok_or_raise(|| ErrorKind::InvalidArgument("client has no identifier"))?;
        validate(client)?;
        let mut tx = self.store.begin().await?;
        let outcome = Self::update(&mut tx, id, client).await;
        self.store.finish(tx, outcome).await?;
        tracing::info!(id, "client updated");
        Ok(())
    }

    async fn update(conn: &mut SqliteConnection, id: Id, client: &Client) -> Result<()> {
        if fetch(conn, id).await?.is_none() {
            exn::bail!(ErrorKind::NotFound { entity: "client", id });
        }
        let first_loan: Option<Date> = sqlx::query_scalar(include_str!("../../queries/first_loan_of_client.sql"))
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .map_err(database)?;
        if first_loan.is_some_and(|first| client.registered_on > first) {
            exn::bail!(ErrorKind::Conflict("client would register after their first loan"));
        }
        sqlx::query(include_str!("../../queries/update_client.sql"))
            .bind(&client.name)
            .bind(&client.address)
            .bind(client.registered_on)
            .bind(id)
            .execute(conn)
            .await
            .map_err(database)?;
        Ok(())
    }

    /// Remove a client with no loan history.
    #[instrument(skip_all, fields(id = ?client.id))]
    pub async fn delete_client(&self, client: &Client) -> Result<()> {
        let id = client.id.ok_or_raise(|| ErrorKind::InvalidArgument("client has no identifier"))?;
        let mut tx = self.store.begin().await?;
        let outcome = Self::delete(&mut tx, id).await;
        self.store.finish(tx, outcome).await?;
        tracing::info!(id, "client deleted");
        Ok(())
    }

    async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()> {
        if fetch(conn, id).await?.is_none() {
            exn::bail!(ErrorKind::NotFound { entity: "client", id });
        }
        let loans: i64 = sqlx::query_scalar(include_str!("../../queries/count_loans_of_client.sql"))
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .map_err(database)?;
        if loans > 0 {
            exn::bail!(ErrorKind::Conflict("client still has loans on record"));
        }
        sqlx::query(include_str!("../../queries/delete_client.sql")).bind(id).execute(conn).await.map_err(database)?;
        Ok(())
    }
}
