//! Query layer errors

use crate::models::EntityKind;

/// Errors raised while turning caller input into a query
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("{entity} has no column '{column}'")]
    UnknownColumn { entity: EntityKind, column: String },
    #[error("value for '{column}' cannot be used as a filter")]
    UnsupportedValue { column: String },
    #[error("no relationship is registered between {base} and {joined}")]
    UnmappedRelation { base: EntityKind, joined: EntityKind },
}

/// Errors raised while building or verifying the relationship registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("foreign key {entity}.{column} names a column the entity does not declare")]
    UnknownColumn {
        entity: EntityKind,
        column: &'static str,
    },
    #[error("foreign key {entity}.{column} references its own entity")]
    SelfReference {
        entity: EntityKind,
        column: &'static str,
    },
    #[error("column {table}.{column} is missing from the database schema")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
}
