//! Calendar model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{entity_columns, Entity, EntityKind, Insertable};
use crate::query::SqlValue;

/// Opening hours of an organization; at most one per organization
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Calendar {
    pub id: i64,
    pub id_organizacao: i64,
    pub abertura: DateTime<Utc>,
    pub fechamento: DateTime<Utc>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

entity_columns! {
    pub enum CalendarColumn {
        Id => "id",
        IdOrganizacao => "id_organizacao",
        Abertura => "abertura",
        Fechamento => "fechamento",
        CriadoEm => "criado_em",
        AtualizadoEm => "atualizado_em",
    }
}

impl Entity for Calendar {
    type Column = CalendarColumn;

    const KIND: EntityKind = EntityKind::Calendar;
    const ID: CalendarColumn = CalendarColumn::Id;
    const CREATED_AT: Option<CalendarColumn> = Some(CalendarColumn::CriadoEm);
    const UPDATED_AT: Option<CalendarColumn> = Some(CalendarColumn::AtualizadoEm);

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCalendarInput {
    pub id_organizacao: i64,
    pub abertura: DateTime<Utc>,
    pub fechamento: DateTime<Utc>,
}

impl Insertable<Calendar> for CreateCalendarInput {
    fn values(&self) -> Vec<(CalendarColumn, SqlValue)> {
        vec![
            (CalendarColumn::IdOrganizacao, self.id_organizacao.into()),
            (CalendarColumn::Abertura, self.abertura.into()),
            (CalendarColumn::Fechamento, self.fechamento.into()),
        ]
    }
}
