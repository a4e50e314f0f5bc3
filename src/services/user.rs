//! User service
//!
//! Implements business logic for user management:
//! - Registration against an existing organization
//! - Profile lookups honouring soft-delete visibility
//! - Self-service updates, activation and deletion
//!
//! Deleting a user that other rows still reference only deactivates it; see
//! [`delete_or_deactivate`].

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use super::deletion::{delete_or_deactivate, DeleteOutcome, DeletionError, USER_DEPENDENTS};
use crate::config::PaginationConfig;
use crate::db::repositories::{conflict_field, Repository, SqlxRepository};
use crate::db::DynDatabasePool;
use crate::models::{
    Changeset, CreateUserInput, Insertable, Organization, Page, PagedResult, Post, PostColumn,
    UpdateUserInput, User, UserColumn,
};
use crate::query::{FilterSpec, Order, RelationshipRegistry};

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// User not found, or hidden from the requester
    #[error("User not found: {0}")]
    NotFound(String),

    /// Requester may not act on this user
    #[error("Not allowed to modify user {0}")]
    Forbidden(i64),

    /// A unique column already holds this value
    #[error("Conflict on field: {field}")]
    Conflict { field: String },

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User is already active")]
    AlreadyActive,

    #[error("User is already inactive")]
    AlreadyInactive,

    #[error("User is already deleted")]
    AlreadyDeleted,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<DeletionError> for UserServiceError {
    fn from(err: DeletionError) -> Self {
        match err {
            DeletionError::NotFound(_, id) => UserServiceError::NotFound(id.to_string()),
            DeletionError::AlreadyDeleted(..) => UserServiceError::AlreadyDeleted,
            DeletionError::HasDependents(kind, id) => {
                UserServiceError::InternalError(anyhow::anyhow!("{kind} {id} cannot be deactivated"))
            }
            DeletionError::InternalError(e) => UserServiceError::InternalError(e),
        }
    }
}

/// Map a failed write, surfacing unique violations as conflicts
fn write_error(err: anyhow::Error) -> UserServiceError {
    match conflict_field(&err) {
        Some(field) => UserServiceError::Conflict { field },
        None => UserServiceError::InternalError(err),
    }
}

/// User service for registration and profile management
pub struct UserService {
    user_repo: Arc<dyn Repository<User>>,
    organization_repo: Arc<dyn Repository<Organization>>,
    post_repo: Arc<dyn Repository<Post>>,
    registry: Arc<RelationshipRegistry>,
    pool: DynDatabasePool,
    pagination: PaginationConfig,
}

impl UserService {
    /// Create a new user service over the given pool
    pub fn new(pool: DynDatabasePool, registry: Arc<RelationshipRegistry>) -> Self {
        Self {
            user_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
            organization_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
            post_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
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

    /// Register a new user
    ///
    /// # Errors
    /// - `ValidationError` if the organization does not exist
    /// - `Conflict` if email, username or another unique field is taken
    pub async fn create_user(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        self.require_organization(input.id_organizacao).await?;

        let user = self.user_repo.insert(input.values()).await.map_err(write_error)?;

        info!("Created user {} ({})", user.id, user.username);
        Ok(user)
    }

    /// Get a user as seen by `requester`
    pub async fn get_user(&self, requester: i64, id: i64) -> Result<User, UserServiceError> {
        let spec = FilterSpec::new().eq(UserColumn::Id, id);
        self.user_repo
            .find_one(Some(requester), &spec)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(id.to_string()))
    }

    /// Get a user by email as seen by `requester`
    pub async fn find_by_email(&self, requester: i64, email: &str) -> Result<User, UserServiceError> {
        let spec = FilterSpec::new().eq(UserColumn::Email, email);
        self.user_repo
            .find_one(Some(requester), &spec)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(email.to_string()))
    }

    /// List the users visible to `requester`
    pub async fn list_users(
        &self,
        requester: i64,
        page: Page,
    ) -> Result<PagedResult<User>, UserServiceError> {
        self.list(requester, FilterSpec::new(), page).await
    }

    /// List the members of one organization visible to `requester`
    pub async fn list_by_organization(
        &self,
        requester: i64,
        id_organizacao: i64,
        page: Page,
    ) -> Result<PagedResult<User>, UserServiceError> {
        let spec = FilterSpec::new().eq(UserColumn::IdOrganizacao, id_organizacao);
        self.list(requester, spec, page).await
    }

    async fn list(
        &self,
        requester: i64,
        spec: FilterSpec<User>,
        page: Page,
    ) -> Result<PagedResult<User>, UserServiceError> {
        let page = page.clamped(&self.pagination);
        let users = self
            .user_repo
            .find(Some(requester), &spec, page, &[(UserColumn::Id, Order::Asc)])
            .await
            .context("Failed to list users")?;
        let total = self.user_repo.count(Some(requester), &spec).await?;

        Ok(PagedResult::new(users, total, page))
    }

    /// Posts authored by a user, newest first
    ///
    /// # Errors
    /// - `NotFound` if the user does not exist or is hidden from `requester`
    pub async fn posts_by_user(
        &self,
        requester: i64,
        user_id: i64,
        page: Page,
    ) -> Result<PagedResult<Post>, UserServiceError> {
        self.get_user(requester, user_id).await?;

        let page = page.clamped(&self.pagination);
        let spec = FilterSpec::new().eq(PostColumn::IdUsuario, user_id);
        let posts = self
            .post_repo
            .find(None, &spec, page, &[(PostColumn::CriadoEm, Order::Desc)])
            .await
            .context("Failed to list posts by user")?;
        let total = self.post_repo.count(None, &spec).await?;

        Ok(PagedResult::new(posts, total, page))
    }

    /// Update a user's own profile
    ///
    /// # Errors
    /// - `Forbidden` if `requester` is not the user
    /// - `ValidationError` if a new organization does not exist
    /// - `Conflict` if a unique field is taken
    pub async fn update_user(
        &self,
        requester: i64,
        id: i64,
        input: UpdateUserInput,
    ) -> Result<User, UserServiceError> {
        if requester != id {
            return Err(UserServiceError::Forbidden(id));
        }

        if let Some(id_organizacao) = input.id_organizacao {
            self.require_organization(id_organizacao).await?;
        }

        self.user_repo
            .update(id, input.changes())
            .await
            .map_err(write_error)?
            .ok_or_else(|| UserServiceError::NotFound(id.to_string()))
    }

    /// Activate or deactivate a user's own account
    ///
    /// # Errors
    /// - `Forbidden` if `requester` is not the user
    /// - `AlreadyActive` / `AlreadyInactive` if nothing would change
    pub async fn set_status(
        &self,
        requester: i64,
        id: i64,
        active: bool,
    ) -> Result<User, UserServiceError> {
        if requester != id {
            return Err(UserServiceError::Forbidden(id));
        }

        let user = self.get_user(requester, id).await?;
        match (active, user.eh_deletado) {
            (true, false) => return Err(UserServiceError::AlreadyActive),
            (false, true) => return Err(UserServiceError::AlreadyInactive),
            _ => {}
        }

        if !self.user_repo.set_deleted(id, !active).await? {
            return Err(UserServiceError::NotFound(id.to_string()));
        }

        self.get_user(requester, id).await
    }

    /// Delete a user's own account
    ///
    /// Removes the row when nothing references it, deactivates it otherwise.
    ///
    /// # Errors
    /// - `Forbidden` if `requester` is not the user
    /// - `AlreadyDeleted` if the account is already deactivated
    pub async fn delete_user(&self, requester: i64, id: i64) -> Result<DeleteOutcome, UserServiceError> {
        if requester != id {
            return Err(UserServiceError::Forbidden(id));
        }

        let outcome = delete_or_deactivate::<User>(
            self.user_repo.as_ref(),
            &self.registry,
            &self.pool,
            id,
            Some(requester),
            USER_DEPENDENTS,
        )
        .await?;

        Ok(outcome)
    }

    async fn require_organization(&self, id: i64) -> Result<(), UserServiceError> {
        let found = self
            .organization_repo
            .get_by_id(id)
            .await
            .context("Failed to look up organization")?;

        match found {
            Some(_) => Ok(()),
            None => Err(UserServiceError::ValidationError(format!(
                "Organization {id} not found"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::Fixture;

    fn service(fx: &Fixture) -> UserService {
        UserService::new(fx.pool.clone(), fx.registry.clone())
    }

    // ========================================================================
    // Registration
    // ========================================================================

    #[tokio::test]
    async fn test_create_user() {
        let fx = Fixture::new().await;
        let org = fx.organization("ONG").await;

        let user = service(&fx)
            .create_user(fx.user_input(org.id, "ana"))
            .await
            .unwrap();

        assert_eq!(user.username, "ana");
        assert_eq!(user.id_organizacao, org.id);
        assert!(!user.eh_deletado);
    }

    #[tokio::test]
    async fn test_create_user_unknown_organization() {
        let fx = Fixture::new().await;

        let err = service(&fx)
            .create_user(fx.user_input(404, "ana"))
            .await
            .unwrap_err();

        assert!(matches!(err, UserServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_user_duplicate_username() {
        let fx = Fixture::new().await;
        let org = fx.organization("ONG").await;
        let svc = service(&fx);
        svc.create_user(fx.user_input(org.id, "ana")).await.unwrap();

        let mut input = fx.user_input(org.id, "ana");
        input.email = "outra@example.com".to_string();
        let err = svc.create_user(input).await.unwrap_err();

        assert!(matches!(err, UserServiceError::Conflict { ref field } if field == "username"));
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    #[tokio::test]
    async fn test_get_user_hides_deleted_from_others() {
        let fx = Fixture::new().await;
        let org = fx.organization("ONG").await;
        let ana = fx.user(org.id, "ana").await;
        let bia = fx.user(org.id, "bia").await;
        fx.soft_delete_user(bia.id).await;
        let svc = service(&fx);

        assert!(matches!(
            svc.get_user(ana.id, bia.id).await,
            Err(UserServiceError::NotFound(_))
        ));
        assert_eq!(svc.get_user(bia.id, bia.id).await.unwrap().id, bia.id);
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let fx = Fixture::new().await;
        let org = fx.organization("ONG").await;
        let ana = fx.user(org.id, "ana").await;
        let svc = service(&fx);

        assert_eq!(svc.find_by_email(ana.id, "ana@example.com").await.unwrap().id, ana.id);
        assert!(matches!(
            svc.find_by_email(ana.id, "ninguem@example.com").await,
            Err(UserServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_users_paginates_visible_rows() {
        let fx = Fixture::new().await;
        let org = fx.organization("ONG").await;
        let ana = fx.user(org.id, "ana").await;
        let bia = fx.user(org.id, "bia").await;
        fx.user(org.id, "caio").await;
        fx.soft_delete_user(bia.id).await;

        let page = service(&fx).list_users(ana.id, Page::new(0, 1)).await.unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, ana.id);
        assert!(page.has_next());
    }

    #[tokio::test]
    async fn test_list_by_organization() {
        let fx = Fixture::new().await;
        let first = fx.organization("Primeira").await;
        let second = fx.organization("Segunda").await;
        let ana = fx.user(first.id, "ana").await;
        fx.user(second.id, "bia").await;

        let page = service(&fx)
            .list_by_organization(ana.id, second.id, Page::default())
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].username, "bia");
    }

    #[tokio::test]
    async fn test_posts_by_user() {
        let fx = Fixture::new().await;
        let (org, ana, cat) = fx.owner_chain("ONG").await;
        let bia = fx.user(org.id, "bia").await;
        fx.post(org.id, ana.id, cat.id, "Arroz", "5kg").await;
        fx.post(org.id, bia.id, cat.id, "Feijão", "1kg").await;
        let svc = service(&fx);

        let posts = svc.posts_by_user(bia.id, ana.id, Page::default()).await.unwrap();
        assert_eq!(posts.total, 1);
        assert_eq!(posts.items[0].titulo, "Arroz");

        assert!(matches!(
            svc.posts_by_user(bia.id, 999, Page::default()).await,
            Err(UserServiceError::NotFound(_))
        ));
    }

    // ========================================================================
    // Updates
    // ========================================================================

    #[tokio::test]
    async fn test_update_user_forbidden_for_others() {
        let fx = Fixture::new().await;
        let org = fx.organization("ONG").await;
        let ana = fx.user(org.id, "ana").await;
        let bia = fx.user(org.id, "bia").await;

        let err = service(&fx)
            .update_user(ana.id, bia.id, UpdateUserInput::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UserServiceError::Forbidden(id) if id == bia.id));
    }

    #[tokio::test]
    async fn test_update_user_changes_fields() {
        let fx = Fixture::new().await;
        let first = fx.organization("Primeira").await;
        let second = fx.organization("Segunda").await;
        let ana = fx.user(first.id, "ana").await;

        let input = UpdateUserInput {
            sobrenome: Some("Souza".to_string()),
            id_organizacao: Some(second.id),
            ..Default::default()
        };
        let updated = service(&fx).update_user(ana.id, ana.id, input).await.unwrap();

        assert_eq!(updated.sobrenome, "Souza");
        assert_eq!(updated.id_organizacao, second.id);
        assert_eq!(updated.primeiro_nome, "ana");
    }

    #[tokio::test]
    async fn test_update_user_unknown_organization() {
        let fx = Fixture::new().await;
        let org = fx.organization("ONG").await;
        let ana = fx.user(org.id, "ana").await;

        let input = UpdateUserInput {
            id_organizacao: Some(404),
            ..Default::default()
        };
        let err = service(&fx).update_user(ana.id, ana.id, input).await.unwrap_err();

        assert!(matches!(err, UserServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_update_user_email_conflict() {
        let fx = Fixture::new().await;
        let org = fx.organization("ONG").await;
        let ana = fx.user(org.id, "ana").await;
        fx.user(org.id, "bia").await;

        let input = UpdateUserInput {
            email: Some("bia@example.com".to_string()),
            ..Default::default()
        };
        let err = service(&fx).update_user(ana.id, ana.id, input).await.unwrap_err();

        assert!(matches!(err, UserServiceError::Conflict { ref field } if field == "email"));
    }

    #[tokio::test]
    async fn test_set_status_round_trip() {
        let fx = Fixture::new().await;
        let org = fx.organization("ONG").await;
        let ana = fx.user(org.id, "ana").await;
        let svc = service(&fx);

        assert!(matches!(
            svc.set_status(ana.id, ana.id, true).await,
            Err(UserServiceError::AlreadyActive)
        ));

        let inactive = svc.set_status(ana.id, ana.id, false).await.unwrap();
        assert!(inactive.eh_deletado);

        assert!(matches!(
            svc.set_status(ana.id, ana.id, false).await,
            Err(UserServiceError::AlreadyInactive)
        ));

        let active = svc.set_status(ana.id, ana.id, true).await.unwrap();
        assert!(!active.eh_deletado);
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    #[tokio::test]
    async fn test_delete_user_without_references() {
        let fx = Fixture::new().await;
        let org = fx.organization("ONG").await;
        let ana = fx.user(org.id, "ana").await;

        let outcome = service(&fx).delete_user(ana.id, ana.id).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Removed);
    }

    #[tokio::test]
    async fn test_delete_user_with_post_deactivates() {
        let fx = Fixture::new().await;
        let (org, ana, cat) = fx.owner_chain("ONG").await;
        let bia = fx.user(org.id, "bia").await;
        fx.post(org.id, ana.id, cat.id, "Arroz", "5kg").await;
        let svc = service(&fx);

        assert_eq!(svc.delete_user(ana.id, ana.id).await.unwrap(), DeleteOutcome::Deactivated);
        assert!(matches!(
            svc.get_user(bia.id, ana.id).await,
            Err(UserServiceError::NotFound(_))
        ));
        assert!(matches!(
            svc.delete_user(ana.id, ana.id).await,
            Err(UserServiceError::AlreadyDeleted)
        ));
    }

    #[tokio::test]
    async fn test_delete_user_forbidden_for_others() {
        let fx = Fixture::new().await;
        let org = fx.organization("ONG").await;
        let ana = fx.user(org.id, "ana").await;
        let bia = fx.user(org.id, "bia").await;

        assert!(matches!(
            service(&fx).delete_user(ana.id, bia.id).await,
            Err(UserServiceError::Forbidden(_))
        ));
    }
}
