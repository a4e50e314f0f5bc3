//! Favorite service
//!
//! Users bookmarking posts. A user favorites a post at most once.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::config::PaginationConfig;
use crate::db::repositories::{conflict_field, Repository, SqlxRepository};
use crate::db::DynDatabasePool;
use crate::models::{
    Column, CreateFavoriteInput, Favorite, FavoriteColumn, Insertable, Page, PagedResult, Post,
    User,
};
use crate::query::{FilterSpec, Order, RelationshipRegistry};

#[derive(Debug, thiserror::Error)]
pub enum FavoriteServiceError {
    /// Favorite, user or post not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The favorite belongs to another user
    #[error("Not allowed to remove favorite {0}")]
    Forbidden(i64),

    #[error("Conflict on field: {field}")]
    Conflict { field: String },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct FavoriteService {
    favorite_repo: Arc<dyn Repository<Favorite>>,
    user_repo: Arc<dyn Repository<User>>,
    post_repo: Arc<dyn Repository<Post>>,
    pagination: PaginationConfig,
}

impl FavoriteService {
    pub fn new(pool: DynDatabasePool, registry: Arc<RelationshipRegistry>) -> Self {
        Self {
            favorite_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
            user_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
            post_repo: SqlxRepository::boxed(pool, registry),
            pagination: PaginationConfig::default(),
        }
    }

    /// Use custom page size limits
    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// Bookmark a post for a user
    ///
    /// # Errors
    /// - `NotFound` if the user or the post does not exist
    /// - `Conflict` if the user already favorited the post
    pub async fn add(
        &self,
        id_usuario: i64,
        id_postagem: i64,
    ) -> Result<Favorite, FavoriteServiceError> {
        self.require_user(id_usuario).await?;
        self.require_post(id_postagem).await?;

        let existing = FilterSpec::new()
            .eq(FavoriteColumn::IdUsuario, id_usuario)
            .eq(FavoriteColumn::IdPostagem, id_postagem);
        if self.favorite_repo.find_one(None, &existing).await?.is_some() {
            return Err(FavoriteServiceError::Conflict {
                field: FavoriteColumn::IdPostagem.name().to_string(),
            });
        }

        let input = CreateFavoriteInput {
            id_postagem,
            id_usuario,
        };
        let favorite = self
            .favorite_repo
            .insert(input.values())
            .await
            .map_err(|e| match conflict_field(&e) {
                Some(field) => FavoriteServiceError::Conflict { field },
                None => FavoriteServiceError::InternalError(e),
            })?;

        info!("User {} favorited post {}", id_usuario, id_postagem);
        Ok(favorite)
    }

    pub async fn get(&self, id: i64) -> Result<Favorite, FavoriteServiceError> {
        self.favorite_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| FavoriteServiceError::NotFound(format!("favorite {id}")))
    }

    /// A user's favorites, oldest first
    pub async fn by_user(
        &self,
        id_usuario: i64,
        page: Page,
    ) -> Result<PagedResult<Favorite>, FavoriteServiceError> {
        self.require_user(id_usuario).await?;
        let spec = FilterSpec::new().eq(FavoriteColumn::IdUsuario, id_usuario);
        self.page(spec, page).await
    }

    /// Favorites of one post, oldest first
    pub async fn by_post(
        &self,
        id_postagem: i64,
        page: Page,
    ) -> Result<PagedResult<Favorite>, FavoriteServiceError> {
        self.require_post(id_postagem).await?;
        let spec = FilterSpec::new().eq(FavoriteColumn::IdPostagem, id_postagem);
        self.page(spec, page).await
    }

    /// Remove one of the requester's favorites
    pub async fn remove(&self, requester: i64, id: i64) -> Result<(), FavoriteServiceError> {
        let favorite = self.get(id).await?;
        if favorite.id_usuario != requester {
            return Err(FavoriteServiceError::Forbidden(id));
        }

        if !self.favorite_repo.delete(id).await? {
            return Err(FavoriteServiceError::NotFound(format!("favorite {id}")));
        }

        info!("User {} removed favorite {}", requester, id);
        Ok(())
    }

    async fn page(
        &self,
        spec: FilterSpec<Favorite>,
        page: Page,
    ) -> Result<PagedResult<Favorite>, FavoriteServiceError> {
        let page = page.clamped(&self.pagination);
        let order = [(FavoriteColumn::Id, Order::Asc)];
        let favorites = self
            .favorite_repo
            .find(None, &spec, page, &order)
            .await
            .context("Failed to list favorites")?;
        let total = self.favorite_repo.count(None, &spec).await?;

        Ok(PagedResult::new(favorites, total, page))
    }

    async fn require_user(&self, id: i64) -> Result<(), FavoriteServiceError> {
        match self.user_repo.get_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(FavoriteServiceError::NotFound(format!("user {id}"))),
        }
    }

    async fn require_post(&self, id: i64) -> Result<(), FavoriteServiceError> {
        match self.post_repo.get_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(FavoriteServiceError::NotFound(format!("post {id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::Fixture;

    fn service(fx: &Fixture) -> FavoriteService {
        FavoriteService::new(fx.pool.clone(), fx.registry.clone())
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let fx = Fixture::new().await;
        let (org, author, cat) = fx.owner_chain("ONG").await;
        let fan = fx.user(org.id, "fan").await;
        let arroz = fx.post(org.id, author.id, cat.id, "Arroz", "5kg").await;
        let feijao = fx.post(org.id, author.id, cat.id, "Feijão", "1kg").await;
        let svc = service(&fx);

        svc.add(fan.id, arroz.id).await.unwrap();
        svc.add(fan.id, feijao.id).await.unwrap();
        svc.add(author.id, arroz.id).await.unwrap();

        let mine = svc.by_user(fan.id, Page::default()).await.unwrap();
        let posts: Vec<i64> = mine.items.iter().map(|f| f.id_postagem).collect();
        assert_eq!(posts, vec![arroz.id, feijao.id]);

        let fans = svc.by_post(arroz.id, Page::default()).await.unwrap();
        let users: Vec<i64> = fans.items.iter().map(|f| f.id_usuario).collect();
        assert_eq!(users, vec![fan.id, author.id]);
        assert_eq!(fans.total, 2);
    }

    #[tokio::test]
    async fn test_add_twice_conflicts() {
        let fx = Fixture::new().await;
        let (org, user, cat) = fx.owner_chain("ONG").await;
        let post = fx.post(org.id, user.id, cat.id, "Arroz", "5kg").await;
        let svc = service(&fx);

        svc.add(user.id, post.id).await.unwrap();
        let err = svc.add(user.id, post.id).await.unwrap_err();

        assert!(matches!(err, FavoriteServiceError::Conflict { ref field } if field == "id_postagem"));
    }

    #[tokio::test]
    async fn test_missing_user_or_post() {
        let fx = Fixture::new().await;
        let (org, user, cat) = fx.owner_chain("ONG").await;
        let post = fx.post(org.id, user.id, cat.id, "Arroz", "5kg").await;
        let svc = service(&fx);

        assert!(matches!(svc.add(999, post.id).await, Err(FavoriteServiceError::NotFound(_))));
        assert!(matches!(svc.add(user.id, 999).await, Err(FavoriteServiceError::NotFound(_))));
        assert!(matches!(
            svc.by_user(999, Page::default()).await,
            Err(FavoriteServiceError::NotFound(_))
        ));
        assert!(matches!(
            svc.by_post(999, Page::default()).await,
            Err(FavoriteServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_own_favorite_only() {
        let fx = Fixture::new().await;
        let (org, user, cat) = fx.owner_chain("ONG").await;
        let other = fx.user(org.id, "bia").await;
        let post = fx.post(org.id, user.id, cat.id, "Arroz", "5kg").await;
        let svc = service(&fx);
        let favorite = svc.add(user.id, post.id).await.unwrap();

        assert!(matches!(
            svc.remove(other.id, favorite.id).await,
            Err(FavoriteServiceError::Forbidden(_))
        ));

        svc.remove(user.id, favorite.id).await.unwrap();
        assert!(matches!(svc.get(favorite.id).await, Err(FavoriteServiceError::NotFound(_))));
        assert!(svc.by_post(post.id, Page::default()).await.unwrap().items.is_empty());
    }
}
