//! User model
//!
//! Users belong to one organization and are the only soft-deletable entity:
//! a user that still owns posts, favorites, deliveries, events, watchlist
//! entries or messages is deactivated (`eh_deletado`) instead of removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{entity_columns, Changeset, Entity, EntityKind, Insertable};
use crate::query::SqlValue;

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub primeiro_nome: String,
    pub sobrenome: String,
    /// Email address (unique)
    pub email: String,
    /// Username (unique)
    pub username: String,
    /// Password hash, produced by the authentication collaborator
    #[serde(skip_serializing)]
    pub senha_hash: String,
    pub telefone: String,
    pub id_organizacao: i64,
    /// Soft-delete flag
    pub eh_deletado: bool,
    pub eh_voluntario: bool,
    pub eh_gerente: bool,
    pub deficiencia_auditiva: Option<bool>,
    pub usa_cadeira_rodas: Option<bool>,
    pub deficiencia_cognitiva: Option<bool>,
    pub lgbtq: Option<bool>,
    pub url_imagem_perfil: Option<String>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl User {
    /// Full display name
    pub fn nome_completo(&self) -> String {
        format!("{} {}", self.primeiro_nome, self.sobrenome)
    }
}

entity_columns! {
    pub enum UserColumn {
        Id => "id",
        PrimeiroNome => "primeiro_nome",
        Sobrenome => "sobrenome",
        Email => "email",
        Username => "username",
        SenhaHash => "senha_hash",
        Telefone => "telefone",
        IdOrganizacao => "id_organizacao",
        EhDeletado => "eh_deletado",
        EhVoluntario => "eh_voluntario",
        EhGerente => "eh_gerente",
        DeficienciaAuditiva => "deficiencia_auditiva",
        UsaCadeiraRodas => "usa_cadeira_rodas",
        DeficienciaCognitiva => "deficiencia_cognitiva",
        Lgbtq => "lgbtq",
        UrlImagemPerfil => "url_imagem_perfil",
        CriadoEm => "criado_em",
        AtualizadoEm => "atualizado_em",
    }
}

impl Entity for User {
    type Column = UserColumn;

    const KIND: EntityKind = EntityKind::User;
    const ID: UserColumn = UserColumn::Id;
    const DELETED_FLAG: Option<UserColumn> = Some(UserColumn::EhDeletado);
    const CREATED_AT: Option<UserColumn> = Some(UserColumn::CriadoEm);
    const UPDATED_AT: Option<UserColumn> = Some(UserColumn::AtualizadoEm);

    fn id(&self) -> i64 {
        self.id
    }

    fn is_deleted(&self) -> bool {
        self.eh_deletado
    }
}

/// Input for creating a user.
///
/// `senha_hash` must already be hashed by the authentication collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub primeiro_nome: String,
    pub sobrenome: String,
    pub email: String,
    pub username: String,
    pub senha_hash: String,
    pub telefone: String,
    pub id_organizacao: i64,
    #[serde(default)]
    pub eh_voluntario: bool,
    #[serde(default)]
    pub eh_gerente: bool,
    #[serde(default)]
    pub deficiencia_auditiva: Option<bool>,
    #[serde(default)]
    pub usa_cadeira_rodas: Option<bool>,
    #[serde(default)]
    pub deficiencia_cognitiva: Option<bool>,
    #[serde(default)]
    pub lgbtq: Option<bool>,
    #[serde(default)]
    pub url_imagem_perfil: Option<String>,
}

impl Insertable<User> for CreateUserInput {
    fn values(&self) -> Vec<(UserColumn, SqlValue)> {
        use UserColumn::*;

        vec![
            (PrimeiroNome, self.primeiro_nome.clone().into()),
            (Sobrenome, self.sobrenome.clone().into()),
            (Email, self.email.clone().into()),
            (Username, self.username.clone().into()),
            (SenhaHash, self.senha_hash.clone().into()),
            (Telefone, self.telefone.clone().into()),
            (IdOrganizacao, self.id_organizacao.into()),
            (EhDeletado, false.into()),
            (EhVoluntario, self.eh_voluntario.into()),
            (EhGerente, self.eh_gerente.into()),
            (DeficienciaAuditiva, self.deficiencia_auditiva.into()),
            (UsaCadeiraRodas, self.usa_cadeira_rodas.into()),
            (DeficienciaCognitiva, self.deficiencia_cognitiva.into()),
            (Lgbtq, self.lgbtq.into()),
            (UrlImagemPerfil, self.url_imagem_perfil.clone().into()),
        ]
    }
}

/// Partial update of a user profile; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub primeiro_nome: Option<String>,
    pub sobrenome: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub senha_hash: Option<String>,
    pub telefone: Option<String>,
    pub id_organizacao: Option<i64>,
    pub eh_voluntario: Option<bool>,
    pub eh_gerente: Option<bool>,
    pub deficiencia_auditiva: Option<bool>,
    pub usa_cadeira_rodas: Option<bool>,
    pub deficiencia_cognitiva: Option<bool>,
    pub lgbtq: Option<bool>,
    pub url_imagem_perfil: Option<String>,
}

impl Changeset<User> for UpdateUserInput {
    fn changes(&self) -> Vec<(UserColumn, SqlValue)> {
        use UserColumn::*;

        let mut changes = Vec::new();
        let mut push = |column, value: Option<SqlValue>| {
            if let Some(value) = value {
                changes.push((column, value));
            }
        };

        push(PrimeiroNome, self.primeiro_nome.clone().map(Into::into));
        push(Sobrenome, self.sobrenome.clone().map(Into::into));
        push(Email, self.email.clone().map(Into::into));
        push(Username, self.username.clone().map(Into::into));
        // An empty hash means "keep the current password"
        push(
            SenhaHash,
            self.senha_hash
                .clone()
                .filter(|hash| !hash.is_empty())
                .map(Into::into),
        );
        push(Telefone, self.telefone.clone().map(Into::into));
        push(IdOrganizacao, self.id_organizacao.map(Into::into));
        push(EhVoluntario, self.eh_voluntario.map(Into::into));
        push(EhGerente, self.eh_gerente.map(Into::into));
        push(DeficienciaAuditiva, self.deficiencia_auditiva.map(Into::into));
        push(UsaCadeiraRodas, self.usa_cadeira_rodas.map(Into::into));
        push(DeficienciaCognitiva, self.deficiencia_cognitiva.map(Into::into));
        push(Lgbtq, self.lgbtq.map(Into::into));
        push(UrlImagemPerfil, self.url_imagem_perfil.clone().map(Into::into));

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_input_only_emits_present_fields() {
        let input = UpdateUserInput {
            telefone: Some("11 99999-0000".to_string()),
            eh_voluntario: Some(true),
            ..Default::default()
        };

        let changes = input.changes();
        assert_eq!(changes.len(), 2);
        assert!(changes.contains(&(UserColumn::EhVoluntario, SqlValue::Bool(true))));
    }

    #[test]
    fn test_update_input_skips_empty_password() {
        let input = UpdateUserInput {
            senha_hash: Some(String::new()),
            ..Default::default()
        };

        assert!(input.changes().is_empty());
    }

    #[test]
    fn test_create_input_starts_active() {
        let input = CreateUserInput {
            primeiro_nome: "Ana".to_string(),
            sobrenome: "Souza".to_string(),
            email: "ana@example.com".to_string(),
            username: "ana".to_string(),
            senha_hash: "hash".to_string(),
            telefone: "11 4002-8922".to_string(),
            id_organizacao: 1,
            eh_voluntario: false,
            eh_gerente: false,
            deficiencia_auditiva: None,
            usa_cadeira_rodas: None,
            deficiencia_cognitiva: None,
            lgbtq: None,
            url_imagem_perfil: None,
        };

        assert!(input
            .values()
            .contains(&(UserColumn::EhDeletado, SqlValue::Bool(false))));
    }
}
