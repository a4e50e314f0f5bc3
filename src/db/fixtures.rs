//! Seeded in-memory database for tests

use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::migrations::run_migrations;
use super::repositories::{Repository, SqlxRepository};
use super::{create_test_pool, DynDatabasePool};
use crate::models::{
    Calendar, Category, CreateCalendarInput, CreateCategoryInput, CreateDeliveryInput,
    CreateEventInput, CreateFavoriteInput, CreateMessageInput, CreateMessageThreadInput,
    CreateOrganizationInput, CreatePostInput, CreateUserInput, CreateWatchlistInput, Delivery,
    Entity, Event, Favorite, Insertable, Message, MessageThread, Organization, Post, User,
    Watchlist, POST_STATUS_ACTIVE,
};
use crate::query::{QueryBuilder, RelationshipRegistry};

pub(crate) struct Fixture {
    pub pool: DynDatabasePool,
    pub registry: Arc<RelationshipRegistry>,
    seq: AtomicI64,
}

impl Fixture {
    pub async fn new() -> Self {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let registry = RelationshipRegistry::standard().expect("Invalid registry");

        Self {
            pool,
            registry: Arc::new(registry),
            seq: AtomicI64::new(1),
        }
    }

    pub fn builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.registry)
    }

    pub fn repo<E: Entity>(&self) -> SqlxRepository<E> {
        SqlxRepository::new(self.pool.clone(), self.registry.clone())
    }

    fn next(&self) -> i64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    async fn insert<E: Entity>(&self, input: &impl Insertable<E>) -> E {
        self.repo::<E>()
            .insert(input.values())
            .await
            .unwrap_or_else(|e| panic!("Failed to insert {}: {e:#}", E::table()))
    }

    pub fn organization_input(&self, nome: &str) -> CreateOrganizationInput {
        let n = self.next();
        CreateOrganizationInput {
            id_federal: format!("{n:014}"),
            nao_governamental: true,
            url_logo: None,
            url_imagem: None,
            abertura: "08:00".to_string(),
            fechamento: "18:00".to_string(),
            intervalo: "12:00-13:00".to_string(),
            nome: nome.to_string(),
            descricao: format!("{nome} recebe doações"),
            rua: "Rua das Flores, 10".to_string(),
            cep: "01000-000".to_string(),
            cidade: "São Paulo".to_string(),
            estado: "SP".to_string(),
            telefone: format!("11 4000-{n:04}"),
            email: format!("contato{n}@example.org"),
        }
    }

    pub async fn organization(&self, nome: &str) -> Organization {
        let input = self.organization_input(nome);
        self.insert(&input).await
    }

    pub async fn category(&self) -> Category {
        let input = CreateCategoryInput {
            categoria: format!("Categoria {}", self.next()),
        };
        self.insert(&input).await
    }

    pub fn user_input(&self, id_organizacao: i64, username: &str) -> CreateUserInput {
        CreateUserInput {
            primeiro_nome: username.to_string(),
            sobrenome: "Silva".to_string(),
            email: format!("{username}@example.com"),
            username: username.to_string(),
            senha_hash: "hash".to_string(),
            telefone: format!("11 9{:04}-0000", self.next()),
            id_organizacao,
            eh_voluntario: false,
            eh_gerente: false,
            deficiencia_auditiva: None,
            usa_cadeira_rodas: None,
            deficiencia_cognitiva: None,
            lgbtq: None,
            url_imagem_perfil: None,
        }
    }

    pub async fn user(&self, id_organizacao: i64, username: &str) -> User {
        let input = self.user_input(id_organizacao, username);
        self.insert(&input).await
    }

    /// An organization with one user and a fresh category
    pub async fn owner_chain(&self, nome: &str) -> (Organization, User, Category) {
        let org = self.organization(nome).await;
        let user = self.user(org.id, &format!("user{}", self.next())).await;
        let category = self.category().await;
        (org, user, category)
    }

    pub fn post_input(
        &self,
        id_organizacao: i64,
        id_usuario: i64,
        id_categoria: i64,
        titulo: &str,
        descricao: &str,
    ) -> CreatePostInput {
        CreatePostInput {
            item: true,
            id_organizacao,
            id_usuario,
            titulo: titulo.to_string(),
            descricao: descricao.to_string(),
            quantidade: "1".to_string(),
            id_categoria,
            url_imagem_post: None,
            data_validade: None,
            status: POST_STATUS_ACTIVE,
        }
    }

    pub async fn post(
        &self,
        id_organizacao: i64,
        id_usuario: i64,
        id_categoria: i64,
        titulo: &str,
        descricao: &str,
    ) -> Post {
        let input = self.post_input(id_organizacao, id_usuario, id_categoria, titulo, descricao);
        self.insert(&input).await
    }

    pub async fn favorite(&self, id_postagem: i64, id_usuario: i64) -> Favorite {
        self.insert(&CreateFavoriteInput {
            id_postagem,
            id_usuario,
        })
        .await
    }

    pub async fn delivery(
        &self,
        id_postagem: i64,
        id_usuario: i64,
        id_organizacao: i64,
        id_ong: i64,
    ) -> Delivery {
        self.insert(&CreateDeliveryInput {
            entrega_direta: true,
            id_postagem,
            id_usuario,
            id_organizacao,
            id_ong,
            data: NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date"),
            hora: "10:00".to_string(),
        })
        .await
    }

    pub async fn event(&self, id_organizacao: i64, id_usuario: i64) -> Event {
        let when = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        self.insert(&CreateEventInput {
            id_organizacao,
            id_usuario,
            fechado: when,
            titulo: "Mutirão".to_string(),
            descricao: "Arrecadação de agasalhos".to_string(),
            data: when,
            url_imagem: None,
        })
        .await
    }

    pub async fn calendar(&self, id_organizacao: i64) -> Calendar {
        let day = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        self.insert(&CreateCalendarInput {
            id_organizacao,
            abertura: day,
            fechamento: day,
        })
        .await
    }

    /// A message from `sender` to `recipient` in a new thread
    pub async fn message(&self, sender: i64, recipient: i64, id_postagem: Option<i64>) -> Message {
        let thread: MessageThread = self
            .insert(&CreateMessageThreadInput {
                usuario_um: sender,
                usuario_dois: recipient,
            })
            .await;
        self.insert(&CreateMessageInput {
            id_conversa: thread.id,
            id_remetente: sender,
            id_postagem,
            conteudo: "Ainda disponível?".to_string(),
            url_imagem: None,
        })
        .await
    }

    /// A first warning on the watchlist for `id_usuario`
    pub async fn watchlist(&self, id_usuario: i64) -> Watchlist {
        self.insert(&CreateWatchlistInput {
            id_usuario: Some(id_usuario),
            quantidade: 1,
            ..Default::default()
        })
        .await
    }

    pub async fn soft_delete_user(&self, id: i64) {
        let found = self
            .repo::<User>()
            .set_deleted(id, true)
            .await
            .expect("Failed to soft-delete user");
        assert!(found, "user {id} not found");
    }
}
