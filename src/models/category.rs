//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{entity_columns, Entity, EntityKind, Insertable};
use crate::query::SqlValue;

/// Donation category (food, clothing, ...)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    /// Category name (unique)
    pub categoria: String,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

entity_columns! {
    pub enum CategoryColumn {
        Id => "id",
        Categoria => "categoria",
        CriadoEm => "criado_em",
        AtualizadoEm => "atualizado_em",
    }
}

impl Entity for Category {
    type Column = CategoryColumn;

    const KIND: EntityKind = EntityKind::Category;
    const ID: CategoryColumn = CategoryColumn::Id;
    const CREATED_AT: Option<CategoryColumn> = Some(CategoryColumn::CriadoEm);
    const UPDATED_AT: Option<CategoryColumn> = Some(CategoryColumn::AtualizadoEm);

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub categoria: String,
}

impl Insertable<Category> for CreateCategoryInput {
    fn values(&self) -> Vec<(CategoryColumn, SqlValue)> {
        vec![(CategoryColumn::Categoria, self.categoria.clone().into())]
    }
}
