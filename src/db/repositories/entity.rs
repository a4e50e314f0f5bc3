//! Entity repository
//!
//! Database operations shared by every entity type.
//!
//! This module provides:
//! - `Repository<E>` trait defining the interface for entity data access
//! - `SqlxRepository<E>` implementing the trait for SQLite and MySQL
//!
//! Reads go through the query builder, so listing and lookups honour the
//! soft-delete visibility rule whenever a requester is given.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySql, Sqlite};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::pool::{self, DynDatabasePool};
use crate::models::{Column, Entity, Page};
use crate::query::{bind_values, FilterSpec, Order, QueryBuilder, RelationshipRegistry, SqlValue};

/// Repository over one entity type
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Insert a row and return it as stored
    async fn insert(&self, values: Vec<(E::Column, SqlValue)>) -> Result<E>;

    /// Get a row by id, regardless of its soft-delete flag
    async fn get_by_id(&self, id: i64) -> Result<Option<E>>;

    /// First row matching `spec`, as visible to `requester`
    async fn find_one(&self, requester: Option<i64>, spec: &FilterSpec<E>) -> Result<Option<E>>;

    /// Rows matching `spec`, as visible to `requester`
    async fn find(
        &self,
        requester: Option<i64>,
        spec: &FilterSpec<E>,
        page: Page,
        order: &[(E::Column, Order)],
    ) -> Result<Vec<E>>;

    /// Number of rows matching `spec`, as visible to `requester`
    async fn count(&self, requester: Option<i64>, spec: &FilterSpec<E>) -> Result<i64>;

    /// Apply column changes and return the updated row, `None` if absent
    async fn update(&self, id: i64, changes: Vec<(E::Column, SqlValue)>) -> Result<Option<E>>;

    /// Flip the soft-delete flag; false if the row does not exist
    async fn set_deleted(&self, id: i64, deleted: bool) -> Result<bool>;

    /// Remove the row; false if it did not exist
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxRepository<E> {
    pool: DynDatabasePool,
    registry: Arc<RelationshipRegistry>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> SqlxRepository<E> {
    pub fn new(pool: DynDatabasePool, registry: Arc<RelationshipRegistry>) -> Self {
        Self {
            pool,
            registry,
            _entity: PhantomData,
        }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool, registry: Arc<RelationshipRegistry>) -> Arc<dyn Repository<E>> {
        Arc::new(Self::new(pool, registry))
    }

    fn builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.registry)
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for SqlxRepository<E> {
    async fn insert(&self, mut values: Vec<(E::Column, SqlValue)>) -> Result<E> {
        let now = Utc::now();
        for stamp in [E::CREATED_AT, E::UPDATED_AT].into_iter().flatten() {
            if !values.iter().any(|(column, _)| *column == stamp) {
                values.push((stamp, now.into()));
            }
        }
        if values.is_empty() {
            bail!("Cannot insert an empty {} row", E::table());
        }

        let columns: Vec<&str> = values.iter().map(|(column, _)| column.name()).collect();
        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            E::table(),
            columns.join(", "),
            placeholders
        );
        let params: Vec<SqlValue> = values.into_iter().map(|(_, value)| value).collect();

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => bind_values!(sqlx::query::<Sqlite>(&sql), &params)
                .execute(pool::sqlite(&self.pool)?)
                .await
                .with_context(|| format!("Failed to insert into {}", E::table()))?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => {
                let id = bind_values!(sqlx::query::<MySql>(&sql), &params)
                    .execute(pool::mysql(&self.pool)?)
                    .await
                    .with_context(|| format!("Failed to insert into {}", E::table()))?
                    .last_insert_id();
                i64::try_from(id).context("Inserted id out of range")?
            }
        };

        self.get_by_id(id)
            .await?
            .with_context(|| format!("Inserted {} row {} not found", E::table(), id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<E>> {
        self.builder()
            .build(None, &FilterSpec::new().eq(E::ID, id))
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_one(&self, requester: Option<i64>, spec: &FilterSpec<E>) -> Result<Option<E>> {
        self.builder()
            .build(requester, spec)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find(
        &self,
        requester: Option<i64>,
        spec: &FilterSpec<E>,
        page: Page,
        order: &[(E::Column, Order)],
    ) -> Result<Vec<E>> {
        let query = order
            .iter()
            .fold(self.builder().build(requester, spec), |query, (column, order)| {
                query.order_by(*column, *order)
            })
            .paginate(page);

        query.fetch_all(&self.pool).await
    }

    async fn count(&self, requester: Option<i64>, spec: &FilterSpec<E>) -> Result<i64> {
        self.builder().build(requester, spec).count(&self.pool).await
    }

    async fn update(&self, id: i64, mut changes: Vec<(E::Column, SqlValue)>) -> Result<Option<E>> {
        if let Some(stamp) = E::UPDATED_AT {
            changes.retain(|(column, _)| *column != stamp);
            changes.push((stamp, Utc::now().into()));
        }
        if changes.is_empty() {
            return self.get_by_id(id).await;
        }

        let assignments: Vec<String> = changes
            .iter()
            .map(|(column, _)| format!("{} = ?", column.name()))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            E::table(),
            assignments.join(", "),
            E::ID.name()
        );
        let mut params: Vec<SqlValue> = changes.into_iter().map(|(_, value)| value).collect();
        params.push(id.into());

        execute(&self.pool, &sql, &params)
            .await
            .with_context(|| format!("Failed to update {} {}", E::table(), id))?;

        // MySQL reports unchanged rows as unaffected, so re-read instead
        self.get_by_id(id).await
    }

    async fn set_deleted(&self, id: i64, deleted: bool) -> Result<bool> {
        let Some(flag) = E::DELETED_FLAG else {
            bail!("{} rows cannot be soft-deleted", E::table());
        };

        Ok(self.update(id, vec![(flag, deleted.into())]).await?.is_some())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE {} = ?", E::table(), E::ID.name());
        let affected = execute(&self.pool, &sql, &[id.into()])
            .await
            .with_context(|| format!("Failed to delete {} {}", E::table(), id))?;

        Ok(affected > 0)
    }
}

/// Execute a statement, returning the number of affected rows
async fn execute(pool: &DynDatabasePool, sql: &str, params: &[SqlValue]) -> Result<u64> {
    let affected = match pool.driver() {
        DatabaseDriver::Sqlite => bind_values!(sqlx::query::<Sqlite>(sql), params)
            .execute(pool::sqlite(pool)?)
            .await?
            .rows_affected(),
        DatabaseDriver::Mysql => bind_values!(sqlx::query::<MySql>(sql), params)
            .execute(pool::mysql(pool)?)
            .await?
            .rows_affected(),
    };

    Ok(affected)
}
