//! Watchlist model
//!
//! Moderation strikes. Signed-in offenders are tracked by user, anonymous
//! ones by IP address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{entity_columns, Entity, EntityKind, Insertable};
use crate::query::SqlValue;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Watchlist {
    pub id: i64,
    pub id_organizacao: Option<i64>,
    pub id_usuario: Option<i64>,
    pub endereco_ip: Option<String>,
    /// Number of strikes
    pub quantidade: i64,
    pub criado_em: DateTime<Utc>,
}

entity_columns! {
    pub enum WatchlistColumn {
        Id => "id",
        IdOrganizacao => "id_organizacao",
        IdUsuario => "id_usuario",
        EnderecoIp => "endereco_ip",
        Quantidade => "quantidade",
        CriadoEm => "criado_em",
    }
}

impl Entity for Watchlist {
    type Column = WatchlistColumn;

    const KIND: EntityKind = EntityKind::Watchlist;
    const ID: WatchlistColumn = WatchlistColumn::Id;
    const CREATED_AT: Option<WatchlistColumn> = Some(WatchlistColumn::CriadoEm);

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateWatchlistInput {
    pub id_organizacao: Option<i64>,
    pub id_usuario: Option<i64>,
    pub endereco_ip: Option<String>,
    pub quantidade: i64,
}

impl Insertable<Watchlist> for CreateWatchlistInput {
    fn values(&self) -> Vec<(WatchlistColumn, SqlValue)> {
        use WatchlistColumn::*;

        vec![
            (IdOrganizacao, self.id_organizacao.into()),
            (IdUsuario, self.id_usuario.into()),
            (EnderecoIp, self.endereco_ip.clone().into()),
            (Quantidade, self.quantidade.into()),
        ]
    }
}
