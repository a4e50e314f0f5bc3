//! Favorite model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{entity_columns, Entity, EntityKind, Insertable};
use crate::query::SqlValue;

/// A user bookmarking a post
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Favorite {
    pub id: i64,
    pub id_postagem: i64,
    pub id_usuario: i64,
    pub criado_em: DateTime<Utc>,
}

entity_columns! {
    pub enum FavoriteColumn {
        Id => "id",
        IdPostagem => "id_postagem",
        IdUsuario => "id_usuario",
        CriadoEm => "criado_em",
    }
}

impl Entity for Favorite {
    type Column = FavoriteColumn;

    const KIND: EntityKind = EntityKind::Favorite;
    const ID: FavoriteColumn = FavoriteColumn::Id;
    const CREATED_AT: Option<FavoriteColumn> = Some(FavoriteColumn::CriadoEm);

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFavoriteInput {
    pub id_postagem: i64,
    pub id_usuario: i64,
}

impl Insertable<Favorite> for CreateFavoriteInput {
    fn values(&self) -> Vec<(FavoriteColumn, SqlValue)> {
        vec![
            (FavoriteColumn::IdPostagem, self.id_postagem.into()),
            (FavoriteColumn::IdUsuario, self.id_usuario.into()),
        ]
    }
}
