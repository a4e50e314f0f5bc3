//! Organization model
//!
//! Organizations employ users, publish posts, receive deliveries (as the
//! donor organization or as the receiving NGO) and run events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{entity_columns, Entity, EntityKind, Insertable};
use crate::query::SqlValue;

/// Organization entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    pub id: i64,
    /// Federal registration number (unique)
    pub id_federal: String,
    /// Non-governmental organizations receive donations
    pub nao_governamental: bool,
    pub url_logo: Option<String>,
    pub url_imagem: Option<String>,
    pub abertura: String,
    pub fechamento: String,
    pub intervalo: String,
    pub nome: String,
    pub descricao: String,
    pub rua: String,
    pub cep: String,
    pub cidade: String,
    pub estado: String,
    pub telefone: String,
    pub email: String,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

entity_columns! {
    pub enum OrganizationColumn {
        Id => "id",
        IdFederal => "id_federal",
        NaoGovernamental => "nao_governamental",
        UrlLogo => "url_logo",
        UrlImagem => "url_imagem",
        Abertura => "abertura",
        Fechamento => "fechamento",
        Intervalo => "intervalo",
        Nome => "nome",
        Descricao => "descricao",
        Rua => "rua",
        Cep => "cep",
        Cidade => "cidade",
        Estado => "estado",
        Telefone => "telefone",
        Email => "email",
        CriadoEm => "criado_em",
        AtualizadoEm => "atualizado_em",
    }
}

impl Entity for Organization {
    type Column = OrganizationColumn;

    const KIND: EntityKind = EntityKind::Organization;
    const ID: OrganizationColumn = OrganizationColumn::Id;
    const CREATED_AT: Option<OrganizationColumn> = Some(OrganizationColumn::CriadoEm);
    const UPDATED_AT: Option<OrganizationColumn> = Some(OrganizationColumn::AtualizadoEm);

    fn id(&self) -> i64 {
        self.id
    }
}

/// Input for registering an organization
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrganizationInput {
    pub id_federal: String,
    pub nao_governamental: bool,
    #[serde(default)]
    pub url_logo: Option<String>,
    #[serde(default)]
    pub url_imagem: Option<String>,
    pub abertura: String,
    pub fechamento: String,
    pub intervalo: String,
    pub nome: String,
    pub descricao: String,
    pub rua: String,
    pub cep: String,
    pub cidade: String,
    pub estado: String,
    pub telefone: String,
    pub email: String,
}

impl Insertable<Organization> for CreateOrganizationInput {
    fn values(&self) -> Vec<(OrganizationColumn, SqlValue)> {
        use OrganizationColumn::*;

        vec![
            (IdFederal, self.id_federal.clone().into()),
            (NaoGovernamental, self.nao_governamental.into()),
            (UrlLogo, self.url_logo.clone().into()),
            (UrlImagem, self.url_imagem.clone().into()),
            (Abertura, self.abertura.clone().into()),
            (Fechamento, self.fechamento.clone().into()),
            (Intervalo, self.intervalo.clone().into()),
            (Nome, self.nome.clone().into()),
            (Descricao, self.descricao.clone().into()),
            (Rua, self.rua.clone().into()),
            (Cep, self.cep.clone().into()),
            (Cidade, self.cidade.clone().into()),
            (Estado, self.estado.clone().into()),
            (Telefone, self.telefone.clone().into()),
            (Email, self.email.clone().into()),
        ]
    }
}
