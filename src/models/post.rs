//! Post model
//!
//! A post announces a donation (or a request for one). It is uploaded by a
//! user on behalf of an organization and filed under one category.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{entity_columns, Changeset, Entity, EntityKind, Insertable};
use crate::query::SqlValue;

/// Status of a post that is open for donations
pub const POST_STATUS_ACTIVE: i64 = 1;

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    /// True when the post offers an item, false when it asks for one
    pub item: bool,
    pub id_organizacao: i64,
    pub id_usuario: i64,
    pub titulo: String,
    pub descricao: String,
    pub quantidade: String,
    pub id_categoria: i64,
    pub url_imagem_post: Option<String>,
    pub data_validade: Option<NaiveDate>,
    pub status: i64,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

entity_columns! {
    pub enum PostColumn {
        Id => "id",
        Item => "item",
        IdOrganizacao => "id_organizacao",
        IdUsuario => "id_usuario",
        Titulo => "titulo",
        Descricao => "descricao",
        Quantidade => "quantidade",
        IdCategoria => "id_categoria",
        UrlImagemPost => "url_imagem_post",
        DataValidade => "data_validade",
        Status => "status",
        CriadoEm => "criado_em",
        AtualizadoEm => "atualizado_em",
    }
}

impl Entity for Post {
    type Column = PostColumn;

    const KIND: EntityKind = EntityKind::Post;
    const ID: PostColumn = PostColumn::Id;
    const CREATED_AT: Option<PostColumn> = Some(PostColumn::CriadoEm);
    const UPDATED_AT: Option<PostColumn> = Some(PostColumn::AtualizadoEm);

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostInput {
    pub item: bool,
    pub id_organizacao: i64,
    pub id_usuario: i64,
    pub titulo: String,
    pub descricao: String,
    pub quantidade: String,
    pub id_categoria: i64,
    #[serde(default)]
    pub url_imagem_post: Option<String>,
    #[serde(default)]
    pub data_validade: Option<NaiveDate>,
    #[serde(default = "default_status")]
    pub status: i64,
}

fn default_status() -> i64 {
    POST_STATUS_ACTIVE
}

impl Insertable<Post> for CreatePostInput {
    fn values(&self) -> Vec<(PostColumn, SqlValue)> {
        use PostColumn::*;

        vec![
            (Item, self.item.into()),
            (IdOrganizacao, self.id_organizacao.into()),
            (IdUsuario, self.id_usuario.into()),
            (Titulo, self.titulo.clone().into()),
            (Descricao, self.descricao.clone().into()),
            (Quantidade, self.quantidade.clone().into()),
            (IdCategoria, self.id_categoria.into()),
            (UrlImagemPost, self.url_imagem_post.clone().into()),
            (DataValidade, self.data_validade.into()),
            (Status, self.status.into()),
        ]
    }
}

/// Partial update of a post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostInput {
    pub titulo: Option<String>,
    pub descricao: Option<String>,
    pub quantidade: Option<String>,
    pub id_categoria: Option<i64>,
    pub url_imagem_post: Option<String>,
    pub data_validade: Option<NaiveDate>,
    pub status: Option<i64>,
}

impl Changeset<Post> for UpdatePostInput {
    fn changes(&self) -> Vec<(PostColumn, SqlValue)> {
        use PostColumn::*;

        [
            (Titulo, self.titulo.clone().map(SqlValue::from)),
            (Descricao, self.descricao.clone().map(SqlValue::from)),
            (Quantidade, self.quantidade.clone().map(SqlValue::from)),
            (IdCategoria, self.id_categoria.map(SqlValue::from)),
            (UrlImagemPost, self.url_imagem_post.clone().map(SqlValue::from)),
            (DataValidade, self.data_validade.map(SqlValue::from)),
            (Status, self.status.map(SqlValue::from)),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.map(|value| (column, value)))
        .collect()
    }
}
