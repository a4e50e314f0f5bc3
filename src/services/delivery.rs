//! Delivery service
//!
//! Scheduling the hand-over of a post's goods from the donor organization to
//! the receiving NGO, and closing it out. A delivery is open until it is
//! either completed or cancelled with a reason.

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PaginationConfig;
use crate::db::repositories::{conflict_field, Repository, SqlxRepository};
use crate::db::DynDatabasePool;
use crate::models::{
    Changes, Changeset, CreateDeliveryInput, Delivery, DeliveryColumn, Insertable, Organization,
    Page, PagedResult, Post, User, DELIVERY_COMPLETE,
};
use crate::query::{FilterSpec, Order, RelationshipRegistry};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryServiceError {
    #[error("Delivery not found: {0}")]
    NotFound(i64),

    #[error("Conflict on field: {field}")]
    Conflict { field: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Already completed or cancelled
    #[error("Delivery {0} is already closed")]
    AlreadyClosed(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct DeliveryService {
    delivery_repo: Arc<dyn Repository<Delivery>>,
    post_repo: Arc<dyn Repository<Post>>,
    user_repo: Arc<dyn Repository<User>>,
    organization_repo: Arc<dyn Repository<Organization>>,
    pagination: PaginationConfig,
}

impl DeliveryService {
    pub fn new(pool: DynDatabasePool, registry: Arc<RelationshipRegistry>) -> Self {
        Self {
            delivery_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
            post_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
            user_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
            organization_repo: SqlxRepository::boxed(pool, registry),
            pagination: PaginationConfig::default(),
        }
    }

    /// Use custom page size limits
    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// Schedule a delivery
    ///
    /// # Errors
    /// - `ValidationError` if the post, the user or either organization does
    ///   not exist
    /// - `Conflict` if the post already has a delivery
    pub async fn schedule(&self, input: CreateDeliveryInput) -> Result<Delivery, DeliveryServiceError> {
        if self.post_repo.get_by_id(input.id_postagem).await?.is_none() {
            return Err(DeliveryServiceError::ValidationError(format!(
                "Post {} not found",
                input.id_postagem
            )));
        }
        if self.user_repo.get_by_id(input.id_usuario).await?.is_none() {
            return Err(DeliveryServiceError::ValidationError(format!(
                "User {} not found",
                input.id_usuario
            )));
        }
        for id in [input.id_organizacao, input.id_ong] {
            if self.organization_repo.get_by_id(id).await?.is_none() {
                return Err(DeliveryServiceError::ValidationError(format!(
                    "Organization {} not found",
                    id
                )));
            }
        }

        let delivery = self
            .delivery_repo
            .insert(input.values())
            .await
            .map_err(|e| match conflict_field(&e) {
                Some(field) => DeliveryServiceError::Conflict { field },
                None => DeliveryServiceError::InternalError(e),
            })?;

        info!(
            "Scheduled delivery {} of post {} for {}",
            delivery.id, delivery.id_postagem, delivery.data
        );
        Ok(delivery)
    }

    pub async fn get(&self, id: i64) -> Result<Delivery, DeliveryServiceError> {
        self.delivery_repo
            .get_by_id(id)
            .await?
            .ok_or(DeliveryServiceError::NotFound(id))
    }

    /// Deliveries sent by a donor organization
    pub async fn by_organization(
        &self,
        id_organizacao: i64,
        page: Page,
    ) -> Result<PagedResult<Delivery>, DeliveryServiceError> {
        let spec = FilterSpec::new().eq(DeliveryColumn::IdOrganizacao, id_organizacao);
        self.page(spec, page).await
    }

    /// Deliveries received by an NGO
    pub async fn by_ngo(
        &self,
        id_ong: i64,
        page: Page,
    ) -> Result<PagedResult<Delivery>, DeliveryServiceError> {
        let spec = FilterSpec::new().eq(DeliveryColumn::IdOng, id_ong);
        self.page(spec, page).await
    }

    pub async fn by_user(
        &self,
        id_usuario: i64,
        page: Page,
    ) -> Result<PagedResult<Delivery>, DeliveryServiceError> {
        let spec = FilterSpec::new().eq(DeliveryColumn::IdUsuario, id_usuario);
        self.page(spec, page).await
    }

    /// Mark an open delivery as handed over
    ///
    /// # Errors
    /// - `NotFound` if the delivery does not exist
    /// - `AlreadyClosed` if it was completed or cancelled before
    pub async fn complete(&self, id: i64) -> Result<Delivery, DeliveryServiceError> {
        let delivery = self.get(id).await?;
        if delivery.is_closed() {
            return Err(DeliveryServiceError::AlreadyClosed(id));
        }

        let changes = Changes::<Delivery>::new().set(DeliveryColumn::Completo, DELIVERY_COMPLETE);
        let delivery = self
            .delivery_repo
            .update(id, changes.changes())
            .await?
            .ok_or(DeliveryServiceError::NotFound(id))?;

        info!("Completed delivery {}", id);
        Ok(delivery)
    }

    /// Cancel an open delivery
    ///
    /// # Errors
    /// - `ValidationError` if `reason` is blank
    /// - `NotFound` if the delivery does not exist
    /// - `AlreadyClosed` if it was completed or cancelled before
    pub async fn cancel(&self, id: i64, reason: &str) -> Result<Delivery, DeliveryServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DeliveryServiceError::ValidationError(
                "Cancellation reason is required".to_string(),
            ));
        }

        let delivery = self.get(id).await?;
        if delivery.is_closed() {
            return Err(DeliveryServiceError::AlreadyClosed(id));
        }

        let changes =
            Changes::<Delivery>::new().set(DeliveryColumn::MotivoCancelamento, reason.to_string());
        let delivery = self
            .delivery_repo
            .update(id, changes.changes())
            .await?
            .ok_or(DeliveryServiceError::NotFound(id))?;

        warn!("Cancelled delivery {}: {}", id, reason);
        Ok(delivery)
    }

    async fn page(
        &self,
        spec: FilterSpec<Delivery>,
        page: Page,
    ) -> Result<PagedResult<Delivery>, DeliveryServiceError> {
        let page = page.clamped(&self.pagination);
        let order = [
            (DeliveryColumn::Data, Order::Asc),
            (DeliveryColumn::Id, Order::Asc),
        ];
        let deliveries = self
            .delivery_repo
            .find(None, &spec, page, &order)
            .await
            .context("Failed to list deliveries")?;
        let total = self.delivery_repo.count(None, &spec).await?;

        Ok(PagedResult::new(deliveries, total, page))
    }
}
