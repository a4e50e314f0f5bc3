//! Organization service

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use super::deletion::{delete_or_deactivate, DeletionError};
use crate::config::PaginationConfig;
use crate::db::repositories::{conflict_field, Repository, SqlxRepository};
use crate::db::DynDatabasePool;
use crate::models::{
    CreateOrganizationInput, EntityKind, Insertable, Organization, OrganizationColumn, Page,
    PagedResult,
};
use crate::query::{FilterSpec, Order, RelationshipRegistry};

/// Rows that keep an organization from being deleted
pub const ORGANIZATION_DEPENDENTS: &[EntityKind] = &[
    EntityKind::User,
    EntityKind::Post,
    EntityKind::Delivery,
    EntityKind::Event,
    EntityKind::Watchlist,
    EntityKind::Calendar,
];

#[derive(Debug, thiserror::Error)]
pub enum OrganizationServiceError {
    #[error("Organization not found: {0}")]
    NotFound(String),

    #[error("Conflict on field: {field}")]
    Conflict { field: String },

    /// Members, posts or other rows still point at the organization
    #[error("Organization {0} is still referenced by other records")]
    HasDependents(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<DeletionError> for OrganizationServiceError {
    fn from(err: DeletionError) -> Self {
        match err {
            DeletionError::NotFound(_, id) | DeletionError::AlreadyDeleted(_, id) => {
                OrganizationServiceError::NotFound(id.to_string())
            }
            DeletionError::HasDependents(_, id) => OrganizationServiceError::HasDependents(id),
            DeletionError::InternalError(e) => OrganizationServiceError::InternalError(e),
        }
    }
}

pub struct OrganizationService {
    repo: Arc<dyn Repository<Organization>>,
    registry: Arc<RelationshipRegistry>,
    pool: DynDatabasePool,
    pagination: PaginationConfig,
}

impl OrganizationService {
    pub fn new(pool: DynDatabasePool, registry: Arc<RelationshipRegistry>) -> Self {
        Self {
            repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
            registry,
            pool,
            pagination: PaginationConfig::default(),
        }
    }

    /// Use custom page size limits
    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// Register an organization
    ///
    /// # Errors
    /// - `Conflict` if the federal id, name, phone or email is taken
    pub async fn create(
        &self,
        input: CreateOrganizationInput,
    ) -> Result<Organization, OrganizationServiceError> {
        let organization = self
            .repo
            .insert(input.values())
            .await
            .map_err(|e| match conflict_field(&e) {
                Some(field) => OrganizationServiceError::Conflict { field },
                None => OrganizationServiceError::InternalError(e),
            })?;

        info!("Created organization {} ({})", organization.id, organization.nome);
        Ok(organization)
    }

    pub async fn get(&self, id: i64) -> Result<Organization, OrganizationServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| OrganizationServiceError::NotFound(id.to_string()))
    }

    pub async fn get_by_id_federal(
        &self,
        id_federal: &str,
    ) -> Result<Organization, OrganizationServiceError> {
        let spec = FilterSpec::new().eq(OrganizationColumn::IdFederal, id_federal);
        self.repo
            .find_one(None, &spec)
            .await?
            .ok_or_else(|| OrganizationServiceError::NotFound(id_federal.to_string()))
    }

    /// Organizations whose name contains `term`, case-insensitively
    pub async fn search_by_name(
        &self,
        term: &str,
        page: Page,
    ) -> Result<PagedResult<Organization>, OrganizationServiceError> {
        let page = page.clamped(&self.pagination);
        let spec = FilterSpec::new().like(OrganizationColumn::Nome, term);
        let order = [(OrganizationColumn::Nome, Order::Asc)];

        let organizations = self
            .repo
            .find(None, &spec, page, &order)
            .await
            .context("Failed to search organizations")?;
        let total = self.repo.count(None, &spec).await?;

        Ok(PagedResult::new(organizations, total, page))
    }

    /// Delete an organization nothing references any more
    ///
    /// Organizations have no soft-delete flag, so any dependent row blocks
    /// the delete.
    pub async fn delete(&self, id: i64) -> Result<(), OrganizationServiceError> {
        delete_or_deactivate::<Organization>(
            self.repo.as_ref(),
            &self.registry,
            &self.pool,
            id,
            None,
            ORGANIZATION_DEPENDENTS,
        )
        .await?;

        Ok(())
    }
}
