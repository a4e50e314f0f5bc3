//! Messaging models
//!
//! Two users share a [`MessageThread`]; each [`Message`] belongs to a thread,
//! has a sender and may point at the post being discussed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{entity_columns, Entity, EntityKind, Insertable};
use crate::query::SqlValue;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageThread {
    pub id: i64,
    pub usuario_um: i64,
    pub usuario_dois: i64,
    pub criado_em: DateTime<Utc>,
}

entity_columns! {
    pub enum MessageThreadColumn {
        Id => "id",
        UsuarioUm => "usuario_um",
        UsuarioDois => "usuario_dois",
        CriadoEm => "criado_em",
    }
}

impl MessageThread {
    pub fn has_participant(&self, id_usuario: i64) -> bool {
        self.usuario_um == id_usuario || self.usuario_dois == id_usuario
    }
}

impl Entity for MessageThread {
    type Column = MessageThreadColumn;

    const KIND: EntityKind = EntityKind::MessageThread;
    const ID: MessageThreadColumn = MessageThreadColumn::Id;
    const CREATED_AT: Option<MessageThreadColumn> = Some(MessageThreadColumn::CriadoEm);

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMessageThreadInput {
    pub usuario_um: i64,
    pub usuario_dois: i64,
}

impl Insertable<MessageThread> for CreateMessageThreadInput {
    fn values(&self) -> Vec<(MessageThreadColumn, SqlValue)> {
        vec![
            (MessageThreadColumn::UsuarioUm, self.usuario_um.into()),
            (MessageThreadColumn::UsuarioDois, self.usuario_dois.into()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub id_conversa: i64,
    pub id_remetente: i64,
    pub id_postagem: Option<i64>,
    pub conteudo: String,
    pub url_imagem: Option<String>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

entity_columns! {
    pub enum MessageColumn {
        Id => "id",
        IdConversa => "id_conversa",
        IdRemetente => "id_remetente",
        IdPostagem => "id_postagem",
        Conteudo => "conteudo",
        UrlImagem => "url_imagem",
        CriadoEm => "criado_em",
        AtualizadoEm => "atualizado_em",
    }
}

impl Entity for Message {
    type Column = MessageColumn;

    const KIND: EntityKind = EntityKind::Message;
    const ID: MessageColumn = MessageColumn::Id;
    const CREATED_AT: Option<MessageColumn> = Some(MessageColumn::CriadoEm);
    const UPDATED_AT: Option<MessageColumn> = Some(MessageColumn::AtualizadoEm);

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMessageInput {
    pub id_conversa: i64,
    pub id_remetente: i64,
    #[serde(default)]
    pub id_postagem: Option<i64>,
    pub conteudo: String,
    #[serde(default)]
    pub url_imagem: Option<String>,
}

impl Insertable<Message> for CreateMessageInput {
    fn values(&self) -> Vec<(MessageColumn, SqlValue)> {
        use MessageColumn::*;

        vec![
            (IdConversa, self.id_conversa.into()),
            (IdRemetente, self.id_remetente.into()),
            (IdPostagem, self.id_postagem.into()),
            (Conteudo, self.conteudo.clone().into()),
            (UrlImagem, self.url_imagem.clone().into()),
        ]
    }
}
