//! SQL-backed leaf views.
//!
//! A [`Query`] is the body of a listing or report: a select with its joins,
//! the conditions narrowing it, an optional grouping and the total order its
//! rows are presented in. [`Rows`] implements the two [`View`] primitives over
//! that body, so the length and every page are computed from the very same
//! filtered set:
//!
//! ```text
//! length:           SELECT COUNT(*) FROM (body)
//! page, stride 1:   SELECT * FROM (body) ORDER BY order LIMIT count OFFSET start
//! page, stride n:   number the ordered rows, keep every n-th from start
//! ```

use crate::predicate::{Clause, Filter, Param};
use exn::ResultExt;
use shelf_view::View;
use shelf_view::error::{ErrorKind, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::marker::PhantomData;

fn saturate(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl Param {
    fn bind_to(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Self::Text(value) => {
                builder.push_bind(value.clone());
            },
            Self::Int(value) => {
                builder.push_bind(*value);
            },
            Self::Date(value) => {
                builder.push_bind(*value);
            },
        }
    }
}

impl Clause {
    /// Append the fragment, binding each placeholder to its value in turn.
    fn push_to(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        let mut params = self.params().iter();
        let mut pieces = self.sql().split('?');
        if let Some(head) = pieces.next() {
            builder.push(head);
        }
        for piece in pieces {
            if let Some(param) = params.next() {
                param.bind_to(builder);
            }
            builder.push(piece);
        }
    }
}

/// The body of a listing or report query.
#[derive(Debug, Clone)]
pub(crate) struct Query {
    select: Clause,
    conditions: Vec<Clause>,
    group_by: Option<&'static str>,
    /// Must name output columns of `select` and end in a unique key.
    order_by: &'static str,
}
impl Query {
    pub(crate) fn new(select: &'static str, order_by: &'static str) -> Self {
        Self::with_params(select, Vec::new(), order_by)
    }

    pub(crate) fn with_params(select: &'static str, params: Vec<Param>, order_by: &'static str) -> Self {
        Self { select: Clause::new(select, params), conditions: Vec::new(), group_by: None, order_by }
    }

    pub(crate) fn condition(mut self, clause: Clause) -> Self {
        self.conditions.push(clause);
        self
    }

    /// Narrow the query by a translated predicate; `None` leaves it untouched.
    pub(crate) fn filter(mut self, filter: Option<Filter>) -> Self {
        if let Some(filter) = filter {
            self.conditions.extend(filter.into_clauses());
        }
        self
    }

    pub(crate) fn group_by(mut self, columns: &'static str) -> Self {
        self.group_by = Some(columns);
        self
    }

    fn push_body(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        self.select.push_to(builder);
        for (i, condition) in self.conditions.iter().enumerate() {
            builder.push(if i == 0 { " WHERE (" } else { " AND (" });
            condition.push_to(builder);
            builder.push(")");
        }
        if let Some(group_by) = self.group_by {
            builder.push(" GROUP BY ");
            builder.push(group_by);
        }
    }

    fn count(&self) -> QueryBuilder<'static, Sqlite> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM (");
        self.push_body(&mut builder);
        builder.push(") AS q");
        builder
    }

    fn slice(&self, start: u64, count: u64, stride: u64) -> QueryBuilder<'static, Sqlite> {
        let mut builder = QueryBuilder::new("SELECT * FROM (");
        if stride == 1 {
            self.push_body(&mut builder);
            builder.push(") AS q ORDER BY ");
            builder.push(self.order_by);
            builder.push(" LIMIT ");
            builder.push_bind(saturate(count));
            builder.push(" OFFSET ");
            builder.push_bind(saturate(start));
            return builder;
        }
        // The stride is applied over the numbered, fully ordered result.
        builder.push("SELECT q.*, ROW_NUMBER() OVER (ORDER BY ");
        builder.push(self.order_by);
        builder.push(") - 1 AS row_position FROM (");
        self.push_body(&mut builder);
        builder.push(") AS q) WHERE row_position >= ");
        builder.push_bind(saturate(start));
        builder.push(" AND (row_position - ");
        builder.push_bind(saturate(start));
        builder.push(") % ");
        builder.push_bind(saturate(stride));
        builder.push(" = 0 ORDER BY row_position LIMIT ");
        builder.push_bind(saturate(count));
        builder
    }
}

/// Rows of a [`Query`], fetched on demand.
///
/// Holds no connection and no rows: every call goes back to the pool.
pub struct Rows<T> {
    pool: SqlitePool,
    query: Query,
    _row: PhantomData<fn() -> T>,
}
impl<T> Rows<T> {
    pub(crate) fn new(pool: SqlitePool, query: Query) -> Self {
        Self { pool, query, _row: PhantomData }
    }
}
impl<T> std::fmt::Debug for Rows<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows").field("query", &self.query).finish_non_exhaustive()
    }
}

impl<T> View for Rows<T>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin + 'static,
{
    type Item = T;

    async fn get_slice(&self, start: u64, count: u64, stride: u64) -> Result<Vec<T>> {
        let mut builder = self.query.slice(start, count, stride);
        let rows = builder.build_query_as::<T>().fetch_all(&self.pool).await.or_raise(|| ErrorKind::Store)?;
        tracing::trace!(start, count, stride, fetched = rows.len(), "fetched page");
        Ok(rows)
    }

    async fn get_len(&self) -> Result<u64> {
        let mut builder = self.query.count();
        let len = builder.build_query_scalar::<i64>().fetch_one(&self.pool).await.or_raise(|| ErrorKind::Store)?;
        u64::try_from(len).or_raise(|| ErrorKind::Store)
    }
}
