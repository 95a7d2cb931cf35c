//! services/juris/src/backend/query.rs
//!
//! Typed query builders over the `TableService` port. Only the chains the
//! application uses exist:
//!
//! - `select().eq(..).single()`
//! - `select().eq(..).order(..)`
//! - `select().eq(..)` awaited directly
//! - `select().order(..)`
//! - `insert(..).select().single()`
//! - `update(..).eq(..)`
//! - `delete().eq(..)`
//!
//! Chains ending in `single` or `order` resolve to a value; they cannot be
//! extended further.

use std::future::IntoFuture;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use juris_core::domain::Record;
use juris_core::ports::{
    from_row, to_row, Filter, Ordering, PortError, PortResult, Row, SelectSpec, TableService,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

fn decode<T: Record>(rows: Vec<Row>) -> PortResult<Vec<T>> {
    rows.into_iter().map(from_row).collect()
}

fn first<T: Record>(rows: Vec<Row>, what: impl FnOnce() -> String) -> PortResult<T> {
    match rows.into_iter().next() {
        Some(row) => from_row(row),
        None => Err(PortError::NotFound(what())),
    }
}

/// Entry point returned by `Backend::from`.
pub struct TableQuery<T> {
    tables: Arc<dyn TableService>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> TableQuery<T> {
    pub(crate) fn new(tables: Arc<dyn TableService>) -> Self {
        Self {
            tables,
            _record: PhantomData,
        }
    }

    pub fn select(self) -> SelectQuery<T> {
        SelectQuery {
            tables: self.tables,
            _record: PhantomData,
        }
    }

    pub fn insert<I>(self, rows: I) -> InsertQuery<T>
    where
        I: IntoIterator<Item = T::Insert>,
    {
        let rows = rows.into_iter().map(|row| to_row(&row)).collect();
        InsertQuery {
            tables: self.tables,
            rows,
            _record: PhantomData,
        }
    }

    pub fn insert_one(self, row: T::Insert) -> InsertQuery<T> {
        self.insert([row])
    }

    pub fn update<P: Serialize>(self, patch: &P) -> UpdateQuery<T> {
        UpdateQuery {
            tables: self.tables,
            patch: to_row(patch),
            _record: PhantomData,
        }
    }

    pub fn delete(self) -> DeleteQuery<T> {
        DeleteQuery {
            tables: self.tables,
            _record: PhantomData,
        }
    }
}

//=========================================================================================
// select
//=========================================================================================

pub struct SelectQuery<T> {
    tables: Arc<dyn TableService>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> SelectQuery<T> {
    pub fn eq(self, column: &str, value: impl Into<Value>) -> FilteredSelect<T> {
        FilteredSelect {
            tables: self.tables,
            filter: Filter::eq(column, value),
            _record: PhantomData,
        }
    }

    /// Lists the whole table, sorted.
    pub async fn order(self, column: &str, ascending: bool) -> PortResult<Vec<T>> {
        let spec = SelectSpec {
            filter: None,
            order: Some(Ordering {
                column: column.to_string(),
                ascending,
            }),
            single: false,
        };
        decode(self.tables.select(T::TABLE, spec).await?)
    }
}

pub struct FilteredSelect<T> {
    tables: Arc<dyn TableService>,
    filter: Filter,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> FilteredSelect<T> {
    /// Fetches exactly one row. No match is `PortError::NotFound`, whose
    /// code is the BaaS "no rows" sentinel.
    pub async fn single(self) -> PortResult<T> {
        let Self { tables, filter, .. } = self;
        let spec = SelectSpec {
            filter: Some(filter.clone()),
            order: None,
            single: true,
        };
        let rows = tables.select(T::TABLE, spec).await?;
        first(rows, || {
            debug!(table = %T::TABLE, column = %filter.column, "No row matched single().");
            format!("no {} row where {} = {}", T::TABLE, filter.column, filter.value)
        })
    }

    pub async fn order(self, column: &str, ascending: bool) -> PortResult<Vec<T>> {
        let spec = SelectSpec {
            filter: Some(self.filter),
            order: Some(Ordering {
                column: column.to_string(),
                ascending,
            }),
            single: false,
        };
        decode(self.tables.select(T::TABLE, spec).await?)
    }
}

impl<T: Record> IntoFuture for FilteredSelect<T> {
    type Output = PortResult<Vec<T>>;
    type IntoFuture = BoxFuture<'static, PortResult<Vec<T>>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let spec = SelectSpec {
                filter: Some(self.filter),
                order: None,
                single: false,
            };
            decode(self.tables.select(T::TABLE, spec).await?)
        })
    }
}

//=========================================================================================
// insert
//=========================================================================================

pub struct InsertQuery<T> {
    tables: Arc<dyn TableService>,
    rows: PortResult<Vec<Row>>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> InsertQuery<T> {
    /// Asks for the inserted rows back.
    pub fn select(self) -> InsertSelect<T> {
        InsertSelect { insert: self }
    }

    async fn run(self) -> PortResult<Vec<Row>> {
        let rows = self.rows?;
        self.tables.insert(T::TABLE, rows).await
    }
}

impl<T: Record> IntoFuture for InsertQuery<T> {
    type Output = PortResult<()>;
    type IntoFuture = BoxFuture<'static, PortResult<()>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            self.run().await?;
            Ok(())
        })
    }
}

pub struct InsertSelect<T> {
    insert: InsertQuery<T>,
}

impl<T: Record> InsertSelect<T> {
    /// The first inserted row.
    pub async fn single(self) -> PortResult<T> {
        let rows = self.insert.run().await?;
        first(rows, || format!("insert into {} returned no rows", T::TABLE))
    }
}

impl<T: Record> IntoFuture for InsertSelect<T> {
    type Output = PortResult<Vec<T>>;
    type IntoFuture = BoxFuture<'static, PortResult<Vec<T>>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { decode(self.insert.run().await?) })
    }
}

//=========================================================================================
// update and delete
//=========================================================================================

pub struct UpdateQuery<T> {
    tables: Arc<dyn TableService>,
    patch: PortResult<Row>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> UpdateQuery<T> {
    /// Applies the patch to every row where `column == value` and returns
    /// the updated rows.
    pub async fn eq(self, column: &str, value: impl Into<Value>) -> PortResult<Vec<T>> {
        let patch = self.patch?;
        if patch.is_empty() {
            return Err(PortError::Validation(format!(
                "empty update for {}",
                T::TABLE
            )));
        }
        let rows = self
            .tables
            .update(T::TABLE, Filter::eq(column, value), patch)
            .await?;
        decode(rows)
    }
}

pub struct DeleteQuery<T> {
    tables: Arc<dyn TableService>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> DeleteQuery<T> {
    /// Removes every row where `column == value` and returns them.
    pub async fn eq(self, column: &str, value: impl Into<Value>) -> PortResult<Vec<T>> {
        let rows = self.tables.delete(T::TABLE, Filter::eq(column, value)).await?;
        decode(rows)
    }
}
