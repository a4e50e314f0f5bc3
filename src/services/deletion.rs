//! Delete policy
//!
//! An entity nothing depends on is removed. One that is still referenced is
//! deactivated through its soft-delete flag, or kept when it has none.

use tracing::{info, warn};

use crate::db::repositories::{is_foreign_key_violation, Repository};
use crate::db::DynDatabasePool;
use crate::models::{Entity, EntityKind};
use crate::query::{has_dependents, FilterSpec, RelationshipRegistry};

/// Rows that keep a user from being removed outright
pub const USER_DEPENDENTS: &[EntityKind] = &[
    EntityKind::Favorite,
    EntityKind::Post,
    EntityKind::Delivery,
    EntityKind::Event,
    EntityKind::Watchlist,
    EntityKind::Message,
];

/// What a successful delete did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Row removed from the table
    Removed,
    /// Row kept and flagged as deleted
    Deactivated,
}

#[derive(Debug, thiserror::Error)]
pub enum DeletionError {
    #[error("{0} {1} not found")]
    NotFound(EntityKind, i64),

    #[error("{0} {1} is already deleted")]
    AlreadyDeleted(EntityKind, i64),

    /// Still referenced and cannot be soft-deleted
    #[error("{0} {1} is still referenced by other records")]
    HasDependents(EntityKind, i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Remove the `E` row with `id`, or deactivate it while `dependents` still
/// reference it.
pub async fn delete_or_deactivate<E: Entity>(
    repo: &dyn Repository<E>,
    registry: &RelationshipRegistry,
    pool: &DynDatabasePool,
    id: i64,
    requester: Option<i64>,
    dependents: &[EntityKind],
) -> Result<DeleteOutcome, DeletionError> {
    let entity = repo
        .find_one(requester, &FilterSpec::new().eq(E::ID, id))
        .await?
        .ok_or(DeletionError::NotFound(E::KIND, id))?;

    if entity.is_deleted() {
        return Err(DeletionError::AlreadyDeleted(E::KIND, id));
    }

    if has_dependents::<E>(pool, registry, id, requester, dependents).await? {
        return deactivate(repo, id).await;
    }

    match repo.delete(id).await {
        Ok(true) => {
            info!("Removed {} {}", E::KIND, id);
            Ok(DeleteOutcome::Removed)
        }
        Ok(false) => Err(DeletionError::NotFound(E::KIND, id)),
        // A dependent row was written after the check
        Err(e) if is_foreign_key_violation(&e) => {
            warn!("{} {} gained a dependent before removal", E::KIND, id);
            deactivate(repo, id).await
        }
        Err(e) => Err(e.into()),
    }
}

async fn deactivate<E: Entity>(
    repo: &dyn Repository<E>,
    id: i64,
) -> Result<DeleteOutcome, DeletionError> {
    if E::DELETED_FLAG.is_none() {
        return Err(DeletionError::HasDependents(E::KIND, id));
    }

    if !repo.set_deleted(id, true).await? {
        return Err(DeletionError::NotFound(E::KIND, id));
    }

    info!("Deactivated {} {}", E::KIND, id);
    Ok(DeleteOutcome::Deactivated)
}
