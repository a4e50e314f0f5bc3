//! Delivery model
//!
//! A delivery hands the goods of one post from the donor organization
//! (`id_organizacao`) to the receiving NGO (`id_ong`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{entity_columns, Entity, EntityKind, Insertable};
use crate::query::SqlValue;

/// Value of `completo` once the goods were handed over
pub const DELIVERY_COMPLETE: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Delivery {
    pub id: i64,
    pub entrega_direta: bool,
    /// One delivery per post
    pub id_postagem: i64,
    pub id_usuario: i64,
    pub id_organizacao: i64,
    pub id_ong: i64,
    pub data: NaiveDate,
    pub hora: String,
    pub completo: i64,
    pub motivo_cancelamento: Option<String>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

entity_columns! {
    pub enum DeliveryColumn {
        Id => "id",
        EntregaDireta => "entrega_direta",
        IdPostagem => "id_postagem",
        IdUsuario => "id_usuario",
        IdOrganizacao => "id_organizacao",
        IdOng => "id_ong",
        Data => "data",
        Hora => "hora",
        Completo => "completo",
        MotivoCancelamento => "motivo_cancelamento",
        CriadoEm => "criado_em",
        AtualizadoEm => "atualizado_em",
    }
}

impl Delivery {
    /// Completed or cancelled
    pub fn is_closed(&self) -> bool {
        self.completo == DELIVERY_COMPLETE || self.motivo_cancelamento.is_some()
    }
}

impl Entity for Delivery {
    type Column = DeliveryColumn;

    const KIND: EntityKind = EntityKind::Delivery;
    const ID: DeliveryColumn = DeliveryColumn::Id;
    const CREATED_AT: Option<DeliveryColumn> = Some(DeliveryColumn::CriadoEm);
    const UPDATED_AT: Option<DeliveryColumn> = Some(DeliveryColumn::AtualizadoEm);

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeliveryInput {
    pub entrega_direta: bool,
    pub id_postagem: i64,
    pub id_usuario: i64,
    pub id_organizacao: i64,
    pub id_ong: i64,
    pub data: NaiveDate,
    pub hora: String,
}

impl Insertable<Delivery> for CreateDeliveryInput {
    fn values(&self) -> Vec<(DeliveryColumn, SqlValue)> {
        use DeliveryColumn::*;

        vec![
            (EntregaDireta, self.entrega_direta.into()),
            (IdPostagem, self.id_postagem.into()),
            (IdUsuario, self.id_usuario.into()),
            (IdOrganizacao, self.id_organizacao.into()),
            (IdOng, self.id_ong.into()),
            (Data, self.data.into()),
            (Hora, self.hora.clone().into()),
            (Completo, 0i64.into()),
        ]
    }
}
