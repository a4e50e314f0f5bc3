//! Watchlist service
//!
//! Community-rule strikes. A signed-in offender is tracked by user id, an
//! anonymous one by IP address. The strike count lives in `quantidade`.

use std::sync::Arc;
use tracing::{info, warn};

use crate::db::repositories::{Repository, SqlxRepository};
use crate::db::DynDatabasePool;
use crate::models::{
    Changes, Changeset, CreateWatchlistInput, Insertable, Watchlist, WatchlistColumn,
};
use crate::query::{FilterSpec, RelationshipRegistry};

/// First warning
pub const STRIKE_WARNING: i64 = 1;
/// No warnings left
pub const STRIKE_FINAL: i64 = 2;
/// Banned
pub const STRIKE_BANNED: i64 = 3;

#[derive(Debug, thiserror::Error)]
pub enum WatchlistServiceError {
    /// The user has no watchlist entry
    #[error("User {0} is not on the watchlist")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct WatchlistService {
    repo: Arc<dyn Repository<Watchlist>>,
}

impl WatchlistService {
    pub fn new(pool: DynDatabasePool, registry: Arc<RelationshipRegistry>) -> Self {
        Self {
            repo: SqlxRepository::boxed(pool, registry),
        }
    }

    /// Record a first warning for the requester, or for `ip` when anonymous
    pub async fn record_warning(
        &self,
        requester: Option<i64>,
        ip: &str,
    ) -> Result<Watchlist, WatchlistServiceError> {
        let input = match requester {
            Some(id_usuario) => CreateWatchlistInput {
                id_usuario: Some(id_usuario),
                quantidade: STRIKE_WARNING,
                ..Default::default()
            },
            None => CreateWatchlistInput {
                endereco_ip: Some(validated_ip(ip)?),
                quantidade: STRIKE_WARNING,
                ..Default::default()
            },
        };

        let entry = self.repo.insert(input.values()).await?;
        info!("Recorded warning {} for {}", entry.id, offender(&entry));
        Ok(entry)
    }

    /// Second strike: the user has no warnings left
    pub async fn repeat_offense(&self, id_usuario: i64) -> Result<Watchlist, WatchlistServiceError> {
        self.set_strikes(id_usuario, STRIKE_FINAL).await
    }

    /// Back to a single warning after an apology
    pub async fn apologize(&self, id_usuario: i64) -> Result<Watchlist, WatchlistServiceError> {
        self.set_strikes(id_usuario, STRIKE_WARNING).await
    }

    pub async fn ban_user(&self, id_usuario: i64) -> Result<Watchlist, WatchlistServiceError> {
        let entry = self.set_strikes(id_usuario, STRIKE_BANNED).await?;
        warn!("Banned user {}", id_usuario);
        Ok(entry)
    }

    pub async fn ban_ip(&self, ip: &str) -> Result<Watchlist, WatchlistServiceError> {
        let input = CreateWatchlistInput {
            endereco_ip: Some(validated_ip(ip)?),
            quantidade: STRIKE_BANNED,
            ..Default::default()
        };

        let entry = self.repo.insert(input.values()).await?;
        warn!("Banned address {}", ip);
        Ok(entry)
    }

    async fn set_strikes(
        &self,
        id_usuario: i64,
        quantidade: i64,
    ) -> Result<Watchlist, WatchlistServiceError> {
        let spec = FilterSpec::new().eq(WatchlistColumn::IdUsuario, id_usuario);
        let entry = self
            .repo
            .find_one(None, &spec)
            .await?
            .ok_or(WatchlistServiceError::NotFound(id_usuario))?;

        let changes = Changes::<Watchlist>::new().set(WatchlistColumn::Quantidade, quantidade);
        self.repo
            .update(entry.id, changes.changes())
            .await?
            .ok_or(WatchlistServiceError::NotFound(id_usuario))
    }
}

fn validated_ip(ip: &str) -> Result<String, WatchlistServiceError> {
    let ip = ip.trim();
    if ip.is_empty() {
        return Err(WatchlistServiceError::ValidationError(
            "An anonymous warning needs an IP address".to_string(),
        ));
    }
    Ok(ip.to_string())
}

fn offender(entry: &Watchlist) -> String {
    match (entry.id_usuario, entry.endereco_ip.as_deref()) {
        (Some(id), _) => format!("user {id}"),
        (None, Some(ip)) => format!("address {ip}"),
        (None, None) => "unknown offender".to_string(),
    }
}
