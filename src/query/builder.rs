//! Filter specifications and the query builder
//!
//! A [`FilterSpec`] describes a read over one entity type: which related
//! entity types to join, AND-combined equality filters and OR-combined
//! case-insensitive substring filters. [`QueryBuilder`] turns it into a
//! [`SelectQuery`] without touching the database.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use super::error::QueryError;
use super::relations::RelationshipRegistry;
use super::select::{Condition, JoinClause, SelectQuery};
use super::SqlValue;
use crate::models::{Column, Entity, EntityKind};

/// How related entity types are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    /// Only rows with a match on both sides
    #[default]
    Inner,
    /// Keep base rows without a match; the joined id reads as null
    Outer,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Outer => write!(f, "LEFT JOIN"),
        }
    }
}

/// Typed filter specification over entity `E`
#[derive(Debug, Clone)]
pub struct FilterSpec<E: Entity> {
    joins: Vec<EntityKind>,
    join_type: JoinType,
    filter_plus: Vec<(E::Column, SqlValue)>,
    like_filters: Vec<(E::Column, String)>,
}

impl<E: Entity> Default for FilterSpec<E> {
    fn default() -> Self {
        Self {
            joins: Vec::new(),
            join_type: JoinType::Inner,
            filter_plus: Vec::new(),
            like_filters: Vec::new(),
        }
    }
}

impl<E: Entity> FilterSpec<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a related entity type. Repeated joins of one type are ignored.
    pub fn join(mut self, kind: EntityKind) -> Self {
        if !self.joins.contains(&kind) {
            self.joins.push(kind);
        }
        self
    }

    pub fn join_all(self, kinds: &[EntityKind]) -> Self {
        kinds.iter().fold(self, |spec, kind| spec.join(*kind))
    }

    /// Use `LEFT JOIN` for every join
    pub fn outer(mut self) -> Self {
        self.join_type = JoinType::Outer;
        self
    }

    pub fn join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    /// Require `column = value`; a null value requires `column IS NULL`.
    /// A later filter on the same column replaces the earlier one.
    pub fn eq(mut self, column: E::Column, value: impl Into<SqlValue>) -> Self {
        self.filter_plus.retain(|(c, _)| *c != column);
        self.filter_plus.push((column, value.into()));
        self
    }

    /// Match rows whose `column` contains `term`, ignoring case. All like
    /// filters of a spec are OR-combined.
    pub fn like(mut self, column: E::Column, term: impl Into<String>) -> Self {
        self.like_filters.retain(|(c, _)| *c != column);
        self.like_filters.push((column, term.into()));
        self
    }

    pub fn joins(&self) -> &[EntityKind] {
        &self.joins
    }

    pub fn filter_plus(&self) -> &[(E::Column, SqlValue)] {
        &self.filter_plus
    }

    pub fn like_filters(&self) -> &[(E::Column, String)] {
        &self.like_filters
    }
}

/// Filter specification keyed by column name, as it arrives from callers
/// that only know field names.
///
/// ```json
/// {"joins": ["Category"], "filter_plus": {"status": 1}, "like_filters": {"titulo": "arroz"}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFilterSpec {
    #[serde(default)]
    pub joins: Vec<EntityKind>,
    #[serde(default)]
    pub join_type: JoinType,
    #[serde(default)]
    pub filter_plus: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub like_filters: BTreeMap<String, serde_json::Value>,
}

impl RawFilterSpec {
    /// Permissive conversion: unknown columns and unusable values are skipped
    pub fn into_spec<E: Entity>(self) -> FilterSpec<E> {
        let mut spec = FilterSpec::new()
            .join_all(&self.joins)
            .join_type(self.join_type);

        for (field, value) in &self.filter_plus {
            match resolve_eq::<E>(field, value) {
                Ok((column, value)) => spec = spec.eq(column, value),
                Err(e) => debug!("Skipping filter: {}", e),
            }
        }
        for (field, value) in &self.like_filters {
            match resolve_like::<E>(field, value) {
                Ok((column, term)) => spec = spec.like(column, term),
                Err(e) => debug!("Skipping like filter: {}", e),
            }
        }

        spec
    }

    /// Strict conversion: the first unknown column or unusable value fails
    pub fn try_into_spec<E: Entity>(self) -> Result<FilterSpec<E>, QueryError> {
        let mut spec = FilterSpec::new()
            .join_all(&self.joins)
            .join_type(self.join_type);

        for (field, value) in &self.filter_plus {
            let (column, value) = resolve_eq::<E>(field, value)?;
            spec = spec.eq(column, value);
        }
        for (field, value) in &self.like_filters {
            let (column, term) = resolve_like::<E>(field, value)?;
            spec = spec.like(column, term);
        }

        Ok(spec)
    }
}

fn resolve_column<E: Entity>(field: &str) -> Result<E::Column, QueryError> {
    E::Column::from_name(field).ok_or_else(|| QueryError::UnknownColumn {
        entity: E::KIND,
        column: field.to_string(),
    })
}

fn resolve_eq<E: Entity>(
    field: &str,
    value: &serde_json::Value,
) -> Result<(E::Column, SqlValue), QueryError> {
    let column = resolve_column::<E>(field)?;
    let value = SqlValue::from_json(value).ok_or_else(|| QueryError::UnsupportedValue {
        column: field.to_string(),
    })?;
    Ok((column, value))
}

fn resolve_like<E: Entity>(
    field: &str,
    value: &serde_json::Value,
) -> Result<(E::Column, String), QueryError> {
    let column = resolve_column::<E>(field)?;
    let term = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => {
            return Err(QueryError::UnsupportedValue {
                column: field.to_string(),
            })
        }
    };
    Ok((column, term))
}

/// Builds unexecuted select queries from filter specifications
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    registry: &'a RelationshipRegistry,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(registry: &'a RelationshipRegistry) -> Self {
        Self { registry }
    }

    /// Build a query over `E`.
    ///
    /// When `E` is soft-deletable and `requester_id` is known, flagged rows
    /// are hidden unless they belong to the requester. Joins the registry
    /// cannot resolve are skipped.
    pub fn build<E: Entity>(&self, requester_id: Option<i64>, spec: &FilterSpec<E>) -> SelectQuery<E> {
        let joins = spec
            .joins
            .iter()
            .filter_map(|&kind| {
                let keys = self.registry.relation(E::KIND, kind);
                if keys.is_empty() {
                    debug!("No relationship between {} and {}, join skipped", E::KIND, kind);
                    return None;
                }
                Some(JoinClause {
                    kind,
                    join_type: spec.join_type,
                    keys: keys.to_vec(),
                })
            })
            .collect();

        Self::assemble(requester_id, spec, joins)
    }

    /// Like [`build`](Self::build), but a join the registry cannot resolve is
    /// an error
    pub fn try_build<E: Entity>(
        &self,
        requester_id: Option<i64>,
        spec: &FilterSpec<E>,
    ) -> Result<SelectQuery<E>, QueryError> {
        let joins = spec
            .joins
            .iter()
            .map(|&kind| {
                let keys = self.registry.require(E::KIND, kind)?;
                Ok(JoinClause {
                    kind,
                    join_type: spec.join_type,
                    keys: keys.to_vec(),
                })
            })
            .collect::<Result<Vec<_>, QueryError>>()?;

        Ok(Self::assemble(requester_id, spec, joins))
    }

    fn assemble<E: Entity>(
        requester_id: Option<i64>,
        spec: &FilterSpec<E>,
        joins: Vec<JoinClause>,
    ) -> SelectQuery<E> {
        let mut conditions = Vec::new();

        if let (Some(flag), Some(requester)) = (E::DELETED_FLAG, requester_id) {
            conditions.push(Condition::VisibleTo {
                flag: flag.name(),
                id: E::ID.name(),
                requester,
            });
        }

        for (column, value) in &spec.filter_plus {
            conditions.push(if value.is_null() {
                Condition::IsNull {
                    column: column.name(),
                }
            } else {
                Condition::Eq {
                    column: column.name(),
                    value: value.clone(),
                }
            });
        }

        if !spec.like_filters.is_empty() {
            conditions.push(Condition::AnyContains(
                spec.like_filters
                    .iter()
                    .map(|(column, term)| (column.name(), term.clone()))
                    .collect(),
            ));
        }

        SelectQuery::new(joins, conditions)
    }
}
