//! Relationship registry
//!
//! Every foreign key of the schema is declared once in [`FOREIGN_KEYS`]. The
//! registry indexes them by entity pair so that a join between two entity
//! types can be resolved in either direction:
//!
//! - the joined entity references the base (`posts.id_usuario = users.id` when
//!   joining posts onto users);
//! - the base references the joined entity (`posts.id_categoria =
//!   categories.id` when joining categories onto posts).
//!
//! Pairs connected by more than one key (a delivery references organizations
//! through both `id_organizacao` and `id_ong`) yield several conditions, which
//! the query builder OR-combines.

use anyhow::{Context, Result};
use sqlx::Row;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

use super::error::{QueryError, RegistryError};
use crate::config::DatabaseDriver;
use crate::db::pool::{self, DynDatabasePool};
use crate::models::EntityKind;

/// `owner.column` references `references.id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    pub owner: EntityKind,
    pub column: &'static str,
    pub references: EntityKind,
}

impl ForeignKey {
    pub const fn new(owner: EntityKind, column: &'static str, references: EntityKind) -> Self {
        Self {
            owner,
            column,
            references,
        }
    }
}

/// Renders the join condition, e.g. `posts.id_usuario = users.id`
impl fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} = {}.id",
            self.owner.table(),
            self.column,
            self.references.table()
        )
    }
}

/// Every foreign key of the marketplace schema
pub const FOREIGN_KEYS: &[ForeignKey] = &[
    ForeignKey::new(EntityKind::User, "id_organizacao", EntityKind::Organization),
    ForeignKey::new(EntityKind::Post, "id_organizacao", EntityKind::Organization),
    ForeignKey::new(EntityKind::Post, "id_usuario", EntityKind::User),
    ForeignKey::new(EntityKind::Post, "id_categoria", EntityKind::Category),
    ForeignKey::new(EntityKind::Favorite, "id_postagem", EntityKind::Post),
    ForeignKey::new(EntityKind::Favorite, "id_usuario", EntityKind::User),
    ForeignKey::new(EntityKind::Delivery, "id_postagem", EntityKind::Post),
    ForeignKey::new(EntityKind::Delivery, "id_usuario", EntityKind::User),
    ForeignKey::new(EntityKind::Delivery, "id_organizacao", EntityKind::Organization),
    ForeignKey::new(EntityKind::Delivery, "id_ong", EntityKind::Organization),
    ForeignKey::new(EntityKind::Event, "id_organizacao", EntityKind::Organization),
    ForeignKey::new(EntityKind::Event, "id_usuario", EntityKind::User),
    ForeignKey::new(EntityKind::MessageThread, "usuario_um", EntityKind::User),
    ForeignKey::new(EntityKind::MessageThread, "usuario_dois", EntityKind::User),
    ForeignKey::new(EntityKind::Message, "id_conversa", EntityKind::MessageThread),
    ForeignKey::new(EntityKind::Message, "id_remetente", EntityKind::User),
    ForeignKey::new(EntityKind::Message, "id_postagem", EntityKind::Post),
    ForeignKey::new(EntityKind::Watchlist, "id_organizacao", EntityKind::Organization),
    ForeignKey::new(EntityKind::Watchlist, "id_usuario", EntityKind::User),
    ForeignKey::new(EntityKind::Calendar, "id_organizacao", EntityKind::Organization),
];

/// Join conditions between entity types, validated at construction
#[derive(Debug, Clone)]
pub struct RelationshipRegistry {
    keys: Vec<ForeignKey>,
    by_pair: BTreeMap<(EntityKind, EntityKind), Vec<ForeignKey>>,
}

impl RelationshipRegistry {
    /// Registry over the full marketplace schema
    pub fn standard() -> Result<Self, RegistryError> {
        Self::from_foreign_keys(FOREIGN_KEYS)
    }

    /// Build a registry, rejecting keys on undeclared columns or keys that
    /// point back at their own entity
    pub fn from_foreign_keys(keys: &[ForeignKey]) -> Result<Self, RegistryError> {
        let mut by_pair: BTreeMap<(EntityKind, EntityKind), Vec<ForeignKey>> = BTreeMap::new();
        let mut unique = Vec::with_capacity(keys.len());

        for key in keys {
            if !key.owner.has_column(key.column) {
                return Err(RegistryError::UnknownColumn {
                    entity: key.owner,
                    column: key.column,
                });
            }
            if key.owner == key.references {
                return Err(RegistryError::SelfReference {
                    entity: key.owner,
                    column: key.column,
                });
            }
            if unique.contains(key) {
                continue;
            }
            unique.push(*key);

            by_pair
                .entry((key.owner, key.references))
                .or_default()
                .push(*key);
            by_pair
                .entry((key.references, key.owner))
                .or_default()
                .push(*key);
        }

        Ok(Self {
            keys: unique,
            by_pair,
        })
    }

    /// Every condition joining `joined` onto `base`, in declaration order.
    /// Empty when the two entity types are not related.
    pub fn relation(&self, base: EntityKind, joined: EntityKind) -> &[ForeignKey] {
        self.by_pair
            .get(&(base, joined))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Like [`relation`](Self::relation), but an unrelated pair is an error
    pub fn require(&self, base: EntityKind, joined: EntityKind) -> Result<&[ForeignKey], QueryError> {
        let keys = self.relation(base, joined);
        if keys.is_empty() {
            return Err(QueryError::UnmappedRelation { base, joined });
        }
        Ok(keys)
    }

    pub fn is_related(&self, base: EntityKind, joined: EntityKind) -> bool {
        !self.relation(base, joined).is_empty()
    }

    /// Entity types holding a foreign key to `kind`
    pub fn referencing(&self, kind: EntityKind) -> Vec<EntityKind> {
        let owners: BTreeSet<EntityKind> = self
            .keys
            .iter()
            .filter(|key| key.references == kind)
            .map(|key| key.owner)
            .collect();
        owners.into_iter().collect()
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.keys
    }

    /// Check every registered key column against the live database schema
    pub async fn verify_schema(&self, pool: &DynDatabasePool) -> Result<()> {
        let tables: BTreeSet<&'static str> = self.keys.iter().map(|key| key.owner.table()).collect();

        for table in tables {
            let columns = table_columns(pool, table).await?;
            debug!("Schema of {}: {} columns", table, columns.len());

            for key in self.keys.iter().filter(|key| key.owner.table() == table) {
                if !columns.contains(key.column) {
                    return Err(RegistryError::MissingColumn {
                        table,
                        column: key.column,
                    }
                    .into());
                }
            }
        }

        Ok(())
    }
}

async fn table_columns(pool: &DynDatabasePool, table: &'static str) -> Result<BTreeSet<String>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => {
            let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
                .fetch_all(pool::sqlite(pool)?)
                .await
                .with_context(|| format!("Failed to read columns of {}", table))?;
            rows.iter()
                .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
                .collect()
        }
        DatabaseDriver::Mysql => {
            let rows = sqlx::query(
                "SELECT CAST(column_name AS CHAR) AS name FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ?",
            )
            .bind(table)
            .fetch_all(pool::mysql(pool)?)
            .await
            .with_context(|| format!("Failed to read columns of {}", table))?;
            rows.iter()
                .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
                .collect()
        }
    }
}
