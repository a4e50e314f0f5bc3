//! Relationship existence checks
//!
//! Decides whether rows of other entity types still reference an entity,
//! which is what separates a safe hard delete from a soft one.

use anyhow::Result;
use tracing::{debug, warn};

use super::builder::{FilterSpec, QueryBuilder};
use super::relations::RelationshipRegistry;
use crate::db::DynDatabasePool;
use crate::models::{Entity, EntityKind};

/// True when any row of `dependents` references the `E` row with `entity_id`.
///
/// A dependent type the registry cannot relate to `E` counts as a
/// dependency: the caller must not hard-delete on an unanswerable check.
/// When `E` is soft-deletable, an entity hidden from `requester_id` reads as
/// absent and therefore has no dependents.
pub async fn has_dependents<E: Entity>(
    pool: &DynDatabasePool,
    registry: &RelationshipRegistry,
    entity_id: i64,
    requester_id: Option<i64>,
    dependents: &[EntityKind],
) -> Result<bool> {
    if dependents.is_empty() {
        return Ok(false);
    }

    if let Some(unmapped) = dependents
        .iter()
        .find(|&&kind| !registry.is_related(E::KIND, kind))
    {
        warn!(
            "No relationship between {} and {}, treating {} {} as referenced",
            E::KIND,
            unmapped,
            E::KIND,
            entity_id
        );
        return Ok(true);
    }

    let spec = FilterSpec::<E>::new()
        .join_all(dependents)
        .outer()
        .eq(E::ID, entity_id);

    let row = QueryBuilder::new(registry)
        .build(requester_id, &spec)
        .fetch_first_joined(pool)
        .await?;

    let Some(row) = row else {
        debug!("{} {} not found while checking dependents", E::KIND, entity_id);
        return Ok(false);
    };

    let referenced_by: Vec<EntityKind> = row
        .related
        .iter()
        .filter(|(_, id)| id.is_some())
        .map(|(kind, _)| *kind)
        .collect();

    if !referenced_by.is_empty() {
        debug!(
            "{} {} is referenced by {:?}",
            E::KIND,
            entity_id,
            referenced_by
        );
    }

    Ok(!referenced_by.is_empty())
}
