//! Message service
//!
//! Private conversations between two users. Only the two participants of a
//! thread may post to it or read it.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::config::PaginationConfig;
use crate::db::repositories::{Repository, SqlxRepository};
use crate::db::DynDatabasePool;
use crate::models::{
    CreateMessageInput, CreateMessageThreadInput, Insertable, Message, MessageColumn,
    MessageThread, MessageThreadColumn, Page, PagedResult, Post, User,
};
use crate::query::{FilterSpec, Order, RelationshipRegistry};

#[derive(Debug, thiserror::Error)]
pub enum MessageServiceError {
    #[error("Conversation not found: {0}")]
    NotFound(i64),

    /// Requester is not a participant of the thread
    #[error("Not a participant of conversation {0}")]
    Forbidden(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Body of a new message
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub conteudo: String,
    pub id_postagem: Option<i64>,
    pub url_imagem: Option<String>,
}

pub struct MessageService {
    thread_repo: Arc<dyn Repository<MessageThread>>,
    message_repo: Arc<dyn Repository<Message>>,
    user_repo: Arc<dyn Repository<User>>,
    post_repo: Arc<dyn Repository<Post>>,
    pagination: PaginationConfig,
}

impl MessageService {
    pub fn new(pool: DynDatabasePool, registry: Arc<RelationshipRegistry>) -> Self {
        Self {
            thread_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
            message_repo: SqlxRepository::boxed(pool.clone(), registry.clone()),
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

    /// The thread between two users, created on first contact
    ///
    /// # Errors
    /// - `ValidationError` if the users are the same or either does not exist
    pub async fn open_thread(
        &self,
        requester: i64,
        other: i64,
    ) -> Result<MessageThread, MessageServiceError> {
        if requester == other {
            return Err(MessageServiceError::ValidationError(
                "Cannot start a conversation with yourself".to_string(),
            ));
        }
        for id in [requester, other] {
            if self.user_repo.get_by_id(id).await?.is_none() {
                return Err(MessageServiceError::ValidationError(format!(
                    "User {id} not found"
                )));
            }
        }

        // Either user may have started it
        for (um, dois) in [(requester, other), (other, requester)] {
            let spec = FilterSpec::new()
                .eq(MessageThreadColumn::UsuarioUm, um)
                .eq(MessageThreadColumn::UsuarioDois, dois);
            if let Some(thread) = self.thread_repo.find_one(None, &spec).await? {
                return Ok(thread);
            }
        }

        let input = CreateMessageThreadInput {
            usuario_um: requester,
            usuario_dois: other,
        };
        let thread = self.thread_repo.insert(input.values()).await?;

        info!("Opened conversation {} between {} and {}", thread.id, requester, other);
        Ok(thread)
    }

    /// Post a message to a thread the requester takes part in
    ///
    /// # Errors
    /// - `NotFound` if the thread does not exist
    /// - `Forbidden` if the requester is not a participant
    /// - `ValidationError` if the message is blank or names an unknown post
    pub async fn send(
        &self,
        requester: i64,
        id_conversa: i64,
        message: NewMessage,
    ) -> Result<Message, MessageServiceError> {
        self.participant_thread(requester, id_conversa).await?;

        let conteudo = message.conteudo.trim();
        if conteudo.is_empty() {
            return Err(MessageServiceError::ValidationError(
                "Message is empty".to_string(),
            ));
        }
        if let Some(id_postagem) = message.id_postagem {
            if self.post_repo.get_by_id(id_postagem).await?.is_none() {
                return Err(MessageServiceError::ValidationError(format!(
                    "Post {id_postagem} not found"
                )));
            }
        }

        let input = CreateMessageInput {
            id_conversa,
            id_remetente: requester,
            id_postagem: message.id_postagem,
            conteudo: conteudo.to_string(),
            url_imagem: message.url_imagem,
        };
        Ok(self.message_repo.insert(input.values()).await?)
    }

    /// Messages of a thread, oldest first
    pub async fn conversation(
        &self,
        requester: i64,
        id_conversa: i64,
        page: Page,
    ) -> Result<PagedResult<Message>, MessageServiceError> {
        self.participant_thread(requester, id_conversa).await?;

        let page = page.clamped(&self.pagination);
        let spec = FilterSpec::new().eq(MessageColumn::IdConversa, id_conversa);
        let order = [
            (MessageColumn::CriadoEm, Order::Asc),
            (MessageColumn::Id, Order::Asc),
        ];
        let messages = self
            .message_repo
            .find(None, &spec, page, &order)
            .await
            .context("Failed to read conversation")?;
        let total = self.message_repo.count(None, &spec).await?;

        Ok(PagedResult::new(messages, total, page))
    }

    async fn participant_thread(
        &self,
        requester: i64,
        id_conversa: i64,
    ) -> Result<MessageThread, MessageServiceError> {
        let thread = self
            .thread_repo
            .get_by_id(id_conversa)
            .await?
            .ok_or(MessageServiceError::NotFound(id_conversa))?;

        if !thread.has_participant(requester) {
            return Err(MessageServiceError::Forbidden(id_conversa));
        }
        Ok(thread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::Fixture;

    fn service(fx: &Fixture) -> MessageService {
        MessageService::new(fx.pool.clone(), fx.registry.clone())
    }

    fn text(conteudo: &str) -> NewMessage {
        NewMessage {
            conteudo: conteudo.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_open_thread_reuses_existing() {
        let fx = Fixture::new().await;
        let (org, ana, _) = fx.owner_chain("ONG").await;
        let bia = fx.user(org.id, "bia").await;
        let svc = service(&fx);

        let first = svc.open_thread(ana.id, bia.id).await.unwrap();
        let again = svc.open_thread(bia.id, ana.id).await.unwrap();

        assert_eq!(first.id, again.id);
    }

    #[tokio::test]
    async fn test_open_thread_validation() {
        let fx = Fixture::new().await;
        let (_, ana, _) = fx.owner_chain("ONG").await;
        let svc = service(&fx);

        assert!(matches!(
            svc.open_thread(ana.id, ana.id).await,
            Err(MessageServiceError::ValidationError(_))
        ));
        assert!(matches!(
            svc.open_thread(ana.id, 999).await,
            Err(MessageServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_conversation_in_order() {
        let fx = Fixture::new().await;
        let (org, ana, cat) = fx.owner_chain("ONG").await;
        let bia = fx.user(org.id, "bia").await;
        let post = fx.post(org.id, ana.id, cat.id, "Arroz", "5kg").await;
        let svc = service(&fx);
        let thread = svc.open_thread(bia.id, ana.id).await.unwrap();

        let question = NewMessage {
            conteudo: "Ainda disponível?".to_string(),
            id_postagem: Some(post.id),
            ..Default::default()
        };
        svc.send(bia.id, thread.id, question).await.unwrap();
        svc.send(ana.id, thread.id, text("  Sim, pode buscar amanhã ")).await.unwrap();

        let read = svc.conversation(ana.id, thread.id, Page::default()).await.unwrap();
        let lines: Vec<(i64, &str)> = read
            .items
            .iter()
            .map(|m| (m.id_remetente, m.conteudo.as_str()))
            .collect();

        assert_eq!(
            lines,
            vec![(bia.id, "Ainda disponível?"), (ana.id, "Sim, pode buscar amanhã")]
        );
        assert_eq!(read.items[0].id_postagem, Some(post.id));
        assert_eq!(read.total, 2);
    }

    #[tokio::test]
    async fn test_outsiders_cannot_read_or_send() {
        let fx = Fixture::new().await;
        let (org, ana, _) = fx.owner_chain("ONG").await;
        let bia = fx.user(org.id, "bia").await;
        let caio = fx.user(org.id, "caio").await;
        let svc = service(&fx);
        let thread = svc.open_thread(ana.id, bia.id).await.unwrap();

        assert!(matches!(
            svc.send(caio.id, thread.id, text("oi")).await,
            Err(MessageServiceError::Forbidden(_))
        ));
        assert!(matches!(
            svc.conversation(caio.id, thread.id, Page::default()).await,
            Err(MessageServiceError::Forbidden(_))
        ));
        assert!(matches!(
            svc.conversation(ana.id, 999, Page::default()).await,
            Err(MessageServiceError::NotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_send_rejects_blank_and_unknown_post() {
        let fx = Fixture::new().await;
        let (org, ana, _) = fx.owner_chain("ONG").await;
        let bia = fx.user(org.id, "bia").await;
        let svc = service(&fx);
        let thread = svc.open_thread(ana.id, bia.id).await.unwrap();

        assert!(matches!(
            svc.send(ana.id, thread.id, text("   ")).await,
            Err(MessageServiceError::ValidationError(_))
        ));
        let dangling = NewMessage {
            conteudo: "sobre isto".to_string(),
            id_postagem: Some(999),
            ..Default::default()
        };
        assert!(matches!(
            svc.send(ana.id, thread.id, dangling).await,
            Err(MessageServiceError::ValidationError(_))
        ));
    }
}
