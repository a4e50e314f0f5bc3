//! Post service
//!
//! Donation posts: creation, name search, ordered listing, status toggling
//! and deletion.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use super::deletion::{delete_or_deactivate, DeletionError};
use crate::config::PaginationConfig;
use crate::db::repositories::{conflict_field, Repository, SqlxRepository};
use crate::db::DynDatabasePool;
use crate::models::{
    Category, Changes, Changeset, Column, CreatePostInput, EntityKind, Insertable, Organization,
    Page, PagedResult, Post, PostColumn, User, POST_STATUS_ACTIVE,
};
use crate::query::{FilterSpec, Order, RelationshipRegistry};

/// Columns a listing may be ordered by
pub const SORTABLE_COLUMNS: &[PostColumn] = &[
    PostColumn::Titulo,
    PostColumn::Descricao,
    PostColumn::Status,
    PostColumn::DataValidade,
    PostColumn::CriadoEm,
    PostColumn::AtualizadoEm,
];

/// Rows that keep a post from being deleted
pub const POST_DEPENDENTS: &[EntityKind] = &[
    EntityKind::Favorite,
    EntityKind::Delivery,
    EntityKind::Message,
];

const POST_STATUS_INACTIVE: i64 = 0;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found: {0}")]
    NotFound(i64),

    /// Post exists but belongs to someone else
    #[error("Not allowed to modify post {0}")]
    Forbidden(i64),

    #[error("Conflict on field: {field}")]
    Conflict { field: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Favorites, deliveries or messages still point at the post
    #[error("Post {0} is still referenced by other records")]
    HasDependents(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<DeletionError> for PostServiceError {
    fn from(err: DeletionError) -> Self {
        match err {
            DeletionError::NotFound(_, id) | DeletionError::AlreadyDeleted(_, id) => {
                PostServiceError::NotFound(id)
            }
            DeletionError::HasDependents(_, id) => PostServiceError::HasDependents(id),
            DeletionError::InternalError(e) => PostServiceError::InternalError(e),
        }
    }
}

/// Post service
pub struct PostService {
    post_repo: Arc<dyn Repository<Post>>,
    category_repo: Arc<dyn Repository<Category>>,
    organization_repo: Arc<dyn Repository<Organization>>,
    user_repo: Arc<dyn Repository<User>>,
    registry: Arc<RelationshipRegistry>,
    pool: DynDatabasePool,
    pagination: PaginationConfig,
}

impl PostService {
    pub fn new(pool: DynDatabasePool, registry: Arc<RelationshipRegistry>) -> Self {
        Self {
            post_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
            category_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
            organization_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
            user_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
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

    /// Create a post
    ///
    /// # Errors
    /// - `ValidationError` if the category, organization or author does not exist
    pub async fn create_post(&self, input: CreatePostInput) -> Result<Post, PostServiceError> {
        if self.category_repo.get_by_id(input.id_categoria).await?.is_none() {
            return Err(PostServiceError::ValidationError(format!(
                "Category {} not found",
                input.id_categoria
            )));
        }
        if self.organization_repo.get_by_id(input.id_organizacao).await?.is_none() {
            return Err(PostServiceError::ValidationError(format!(
                "Organization {} not found",
                input.id_organizacao
            )));
        }
        if self.user_repo.get_by_id(input.id_usuario).await?.is_none() {
            return Err(PostServiceError::ValidationError(format!(
                "User {} not found",
                input.id_usuario
            )));
        }

        let post = self
            .post_repo
            .insert(input.values())
            .await
            .map_err(|e| match conflict_field(&e) {
                Some(field) => PostServiceError::Conflict { field },
                None => PostServiceError::InternalError(e),
            })?;

        info!("Created post {} ({})", post.id, post.titulo);
        Ok(post)
    }

    pub async fn get_post(&self, id: i64) -> Result<Post, PostServiceError> {
        self.post_repo
            .get_by_id(id)
            .await?
            .ok_or(PostServiceError::NotFound(id))
    }

    /// Active posts whose title or description contains `term`
    pub async fn search_by_name(
        &self,
        term: &str,
        page: Page,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let spec = FilterSpec::new()
            .eq(PostColumn::Status, POST_STATUS_ACTIVE)
            .like(PostColumn::Titulo, term)
            .like(PostColumn::Descricao, term);

        self.page(spec, page, PostColumn::Id).await
    }

    /// List posts, optionally restricted to one status, ordered by `order_by`
    ///
    /// # Errors
    /// - `ValidationError` if `order_by` is not one of [`SORTABLE_COLUMNS`]
    pub async fn list(
        &self,
        status: Option<i64>,
        order_by: &str,
        page: Page,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let column = PostColumn::from_name(order_by)
            .filter(|column| SORTABLE_COLUMNS.contains(column))
            .ok_or_else(|| {
                PostServiceError::ValidationError(format!("Invalid ordering field: {order_by}"))
            })?;

        let spec = match status {
            Some(status) => FilterSpec::new().eq(PostColumn::Status, status),
            None => FilterSpec::new(),
        };

        self.page(spec, page, column).await
    }

    async fn page(
        &self,
        spec: FilterSpec<Post>,
        page: Page,
        order_by: PostColumn,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let page = page.clamped(&self.pagination);
        let order = [(order_by, Order::Asc), (PostColumn::Id, Order::Asc)];
        let posts = self
            .post_repo
            .find(None, &spec, page, &order)
            .await
            .context("Failed to list posts")?;
        let total = self.post_repo.count(None, &spec).await?;

        Ok(PagedResult::new(posts, total, page))
    }

    /// Open or close one of the requester's posts
    ///
    /// # Errors
    /// - `NotFound` if the post does not exist
    /// - `Forbidden` if the post belongs to another user
    /// - `Conflict` if the post already has that status
    pub async fn set_status(
        &self,
        requester: i64,
        id: i64,
        active: bool,
    ) -> Result<Post, PostServiceError> {
        let post = self.get_post(id).await?;
        if post.id_usuario != requester {
            return Err(PostServiceError::Forbidden(id));
        }

        let status = if active {
            POST_STATUS_ACTIVE
        } else {
            POST_STATUS_INACTIVE
        };
        if post.status == status {
            return Err(PostServiceError::Conflict {
                field: PostColumn::Status.name().to_string(),
            });
        }

        let changes = Changes::<Post>::new().set(PostColumn::Status, status);
        self.post_repo
            .update(id, changes.changes())
            .await?
            .ok_or(PostServiceError::NotFound(id))
    }

    /// Delete a post nothing references any more
    ///
    /// # Errors
    /// - `NotFound` if the post does not exist
    /// - `HasDependents` if favorites, deliveries or messages still point at it
    pub async fn delete_post(&self, id: i64) -> Result<(), PostServiceError> {
        delete_or_deactivate::<Post>(
            self.post_repo.as_ref(),
            &self.registry,
            &self.pool,
            id,
            None,
            POST_DEPENDENTS,
        )
        .await?;

        Ok(())
    }
}
