//! Event model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{entity_columns, Entity, EntityKind, Insertable};
use crate::query::SqlValue;

/// An organization event managed by one user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub id_organizacao: i64,
    /// Managing user
    pub id_usuario: i64,
    pub fechado: DateTime<Utc>,
    pub titulo: String,
    pub descricao: String,
    pub data: DateTime<Utc>,
    pub url_imagem: Option<String>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

entity_columns! {
    pub enum EventColumn {
        Id => "id",
        IdOrganizacao => "id_organizacao",
        IdUsuario => "id_usuario",
        Fechado => "fechado",
        Titulo => "titulo",
        Descricao => "descricao",
        Data => "data",
        UrlImagem => "url_imagem",
        CriadoEm => "criado_em",
        AtualizadoEm => "atualizado_em",
    }
}

impl Entity for Event {
    type Column = EventColumn;

    const KIND: EntityKind = EntityKind::Event;
    const ID: EventColumn = EventColumn::Id;
    const CREATED_AT: Option<EventColumn> = Some(EventColumn::CriadoEm);
    const UPDATED_AT: Option<EventColumn> = Some(EventColumn::AtualizadoEm);

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventInput {
    pub id_organizacao: i64,
    pub id_usuario: i64,
    pub fechado: DateTime<Utc>,
    pub titulo: String,
    pub descricao: String,
    pub data: DateTime<Utc>,
    #[serde(default)]
    pub url_imagem: Option<String>,
}

impl Insertable<Event> for CreateEventInput {
    fn values(&self) -> Vec<(EventColumn, SqlValue)> {
        use EventColumn::*;

        vec![
            (IdOrganizacao, self.id_organizacao.into()),
            (IdUsuario, self.id_usuario.into()),
            (Fechado, self.fechado.into()),
            (Titulo, self.titulo.clone().into()),
            (Descricao, self.descricao.clone().into()),
            (Data, self.data.into()),
            (UrlImagem, self.url_imagem.clone().into()),
        ]
    }
}
