//! Unexecuted select queries
//!
//! A [`SelectQuery`] is produced by the query builder. It can still be
//! ordered and paginated, rendered to SQL with its bound parameters, and
//! executed against either database driver.

use anyhow::{Context, Result};
use sqlx::{mysql::MySqlRow, sqlite::SqliteRow, FromRow, MySql, Row, Sqlite};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use super::builder::JoinType;
use super::relations::ForeignKey;
use super::value::bind_values;
use super::SqlValue;
use crate::config::DatabaseDriver;
use crate::db::pool::{self, DynDatabasePool};
use crate::models::{Column, Entity, EntityKind, Page};

/// Escape character used in LIKE patterns
const LIKE_ESCAPE: char = '!';

/// A resolved join onto the base table
#[derive(Debug, Clone)]
pub(crate) struct JoinClause {
    pub kind: EntityKind,
    pub join_type: JoinType,
    /// OR-combined candidate conditions
    pub keys: Vec<ForeignKey>,
}

/// A WHERE condition on the base table
#[derive(Debug, Clone)]
pub(crate) enum Condition {
    Eq {
        column: &'static str,
        value: SqlValue,
    },
    IsNull {
        column: &'static str,
    },
    /// Row not flagged as deleted, or owned by the requester
    VisibleTo {
        flag: &'static str,
        id: &'static str,
        requester: i64,
    },
    /// Case-insensitive containment on any of the columns. Column and term
    /// are both folded by the database's `LOWER`.
    AnyContains(Vec<(&'static str, String)>),
}

impl Condition {
    fn render(&self, table: &str, sql: &mut String, params: &mut Vec<SqlValue>) {
        match self {
            Condition::Eq { column, value } => {
                sql.push_str(&format!("{}.{} = ?", table, column));
                params.push(value.clone());
            }
            Condition::IsNull { column } => {
                sql.push_str(&format!("{}.{} IS NULL", table, column));
            }
            Condition::VisibleTo {
                flag,
                id,
                requester,
            } => {
                sql.push_str(&format!("({table}.{flag} = ? OR {table}.{id} = ?)"));
                params.push(SqlValue::Bool(false));
                params.push(SqlValue::Int(*requester));
            }
            Condition::AnyContains(terms) => {
                let parts: Vec<String> = terms
                    .iter()
                    .map(|(column, term)| {
                        params.push(SqlValue::Text(contains_pattern(term)));
                        format!(
                            "LOWER({}.{}) LIKE LOWER(?) ESCAPE '{}'",
                            table, column, LIKE_ESCAPE
                        )
                    })
                    .collect();
                sql.push('(');
                sql.push_str(&parts.join(" OR "));
                sql.push(')');
            }
        }
    }
}

/// `%term%` with LIKE wildcards in `term` matched literally
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Asc => write!(f, "ASC"),
            Order::Desc => write!(f, "DESC"),
        }
    }
}

/// A base-entity row together with the ids of the joined rows
#[derive(Debug, Clone)]
pub struct JoinedRow<E> {
    pub entity: E,
    /// Joined id per entity type; `None` when an outer join found no row
    pub related: BTreeMap<EntityKind, Option<i64>>,
}

impl<E> JoinedRow<E> {
    pub fn related_id(&self, kind: EntityKind) -> Option<i64> {
        self.related.get(&kind).copied().flatten()
    }

    /// True when any joined entity type matched
    pub fn has_any_related(&self) -> bool {
        self.related.values().any(Option::is_some)
    }
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Rows,
    First,
    Count,
}

/// A built, not yet executed, select over entity `E`
pub struct SelectQuery<E: Entity> {
    joins: Vec<JoinClause>,
    conditions: Vec<Condition>,
    order: Vec<(E::Column, Order)>,
    limit: Option<i64>,
    offset: Option<i64>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for SelectQuery<E> {
    fn clone(&self) -> Self {
        Self {
            joins: self.joins.clone(),
            conditions: self.conditions.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for SelectQuery<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectQuery")
            .field("sql", &self.render(Shape::Rows).0)
            .finish()
    }
}

impl<E: Entity> SelectQuery<E> {
    pub(crate) fn new(joins: Vec<JoinClause>, conditions: Vec<Condition>) -> Self {
        Self {
            joins,
            conditions,
            order: Vec::new(),
            limit: None,
            offset: None,
            _entity: PhantomData,
        }
    }

    pub fn order_by(mut self, column: E::Column, order: Order) -> Self {
        self.order.push((column, order));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn paginate(self, page: Page) -> Self {
        self.offset(page.offset()).limit(page.limit())
    }

    /// Entity types actually joined (unresolvable joins are absent)
    pub fn joined(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.joins.iter().map(|join| join.kind)
    }

    /// SQL text with `?` placeholders and the values to bind, in order
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        self.render(Shape::Rows)
    }

    fn render(&self, shape: Shape) -> (String, Vec<SqlValue>) {
        let table = E::table();
        let mut params = Vec::new();

        let mut columns: Vec<String> = E::Column::ALL
            .iter()
            .map(|column| format!("{}.{}", table, column.name()))
            .collect();
        for join in &self.joins {
            columns.push(format!(
                "{}.id AS {}",
                join.kind.table(),
                join.kind.id_alias()
            ));
        }

        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), table);

        for join in &self.joins {
            let on: Vec<String> = join.keys.iter().map(ToString::to_string).collect();
            sql.push_str(&format!(
                " {} {} ON ({})",
                join.join_type,
                join.kind.table(),
                on.join(" OR ")
            ));
        }

        for (i, condition) in self.conditions.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            condition.render(table, &mut sql, &mut params);
        }

        if let Shape::Count = shape {
            return (
                format!("SELECT COUNT(*) FROM ({}) AS counted", sql),
                params,
            );
        }

        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|(column, order)| format!("{}.{} {}", table, column.name(), order))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        let limit = match shape {
            Shape::First => Some(1),
            _ => self.limit,
        };
        match (limit, self.offset) {
            (None, None) => {}
            (limit, offset) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                params.push(SqlValue::Int(limit.unwrap_or(i64::MAX)));
                params.push(SqlValue::Int(offset.unwrap_or(0)));
            }
        }

        (sql, params)
    }

    /// All matching rows. Joins to several rows repeat the base row.
    pub async fn fetch_all(&self, pool: &DynDatabasePool) -> Result<Vec<E>> {
        let (sql, params) = self.render(Shape::Rows);

        match pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = bind_values!(sqlx::query::<Sqlite>(&sql), &params)
                    .fetch_all(pool::sqlite(pool)?)
                    .await
                    .with_context(|| format!("Failed to query {}", E::table()))?;
                rows.iter().map(decode_sqlite::<E>).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = bind_values!(sqlx::query::<MySql>(&sql), &params)
                    .fetch_all(pool::mysql(pool)?)
                    .await
                    .with_context(|| format!("Failed to query {}", E::table()))?;
                rows.iter().map(decode_mysql::<E>).collect()
            }
        }
    }

    /// The first matching row, if any
    pub async fn fetch_optional(&self, pool: &DynDatabasePool) -> Result<Option<E>> {
        let (sql, params) = self.render(Shape::First);

        match pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = bind_values!(sqlx::query::<Sqlite>(&sql), &params)
                    .fetch_optional(pool::sqlite(pool)?)
                    .await
                    .with_context(|| format!("Failed to query {}", E::table()))?;
                row.as_ref().map(decode_sqlite::<E>).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = bind_values!(sqlx::query::<MySql>(&sql), &params)
                    .fetch_optional(pool::mysql(pool)?)
                    .await
                    .with_context(|| format!("Failed to query {}", E::table()))?;
                row.as_ref().map(decode_mysql::<E>).transpose()
            }
        }
    }

    /// All matching rows with the ids of their joined rows
    pub async fn fetch_joined(&self, pool: &DynDatabasePool) -> Result<Vec<JoinedRow<E>>> {
        self.fetch_joined_shaped(pool, Shape::Rows).await
    }

    /// The first matching row with the ids of its joined rows
    pub async fn fetch_first_joined(&self, pool: &DynDatabasePool) -> Result<Option<JoinedRow<E>>> {
        Ok(self
            .fetch_joined_shaped(pool, Shape::First)
            .await?
            .into_iter()
            .next())
    }

    async fn fetch_joined_shaped(
        &self,
        pool: &DynDatabasePool,
        shape: Shape,
    ) -> Result<Vec<JoinedRow<E>>> {
        let (sql, params) = self.render(shape);

        match pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = bind_values!(sqlx::query::<Sqlite>(&sql), &params)
                    .fetch_all(pool::sqlite(pool)?)
                    .await
                    .with_context(|| format!("Failed to query {} with joins", E::table()))?;
                rows.iter()
                    .map(|row| joined_sqlite::<E>(row, &self.joins))
                    .collect()
            }
            DatabaseDriver::Mysql => {
                let rows = bind_values!(sqlx::query::<MySql>(&sql), &params)
                    .fetch_all(pool::mysql(pool)?)
                    .await
                    .with_context(|| format!("Failed to query {} with joins", E::table()))?;
                rows.iter()
                    .map(|row| joined_mysql::<E>(row, &self.joins))
                    .collect()
            }
        }
    }

    /// Number of matching rows, ignoring ordering and pagination
    pub async fn count(&self, pool: &DynDatabasePool) -> Result<i64> {
        let (sql, params) = self.render(Shape::Count);

        match pool.driver() {
            DatabaseDriver::Sqlite => {
                let count: i64 = bind_values!(sqlx::query_scalar::<Sqlite, i64>(&sql), &params)
                    .fetch_one(pool::sqlite(pool)?)
                    .await
                    .with_context(|| format!("Failed to count {}", E::table()))?;
                Ok(count)
            }
            DatabaseDriver::Mysql => {
                let count: i64 = bind_values!(sqlx::query_scalar::<MySql, i64>(&sql), &params)
                    .fetch_one(pool::mysql(pool)?)
                    .await
                    .with_context(|| format!("Failed to count {}", E::table()))?;
                Ok(count)
            }
        }
    }
}

fn decode_sqlite<E: Entity>(row: &SqliteRow) -> Result<E> {
    <E as FromRow<'_, SqliteRow>>::from_row(row)
        .with_context(|| format!("Failed to decode {} row", E::table()))
}

fn decode_mysql<E: Entity>(row: &MySqlRow) -> Result<E> {
    <E as FromRow<'_, MySqlRow>>::from_row(row)
        .with_context(|| format!("Failed to decode {} row", E::table()))
}

fn joined_sqlite<E: Entity>(row: &SqliteRow, joins: &[JoinClause]) -> Result<JoinedRow<E>> {
    let mut related = BTreeMap::new();
    for join in joins {
        let id: Option<i64> = row.try_get(join.kind.id_alias().as_str())?;
        related.insert(join.kind, id);
    }
    Ok(JoinedRow {
        entity: decode_sqlite(row)?,
        related,
    })
}

fn joined_mysql<E: Entity>(row: &MySqlRow, joins: &[JoinClause]) -> Result<JoinedRow<E>> {
    let mut related = BTreeMap::new();
    for join in joins {
        let id: Option<i64> = row.try_get(join.kind.id_alias().as_str())?;
        related.insert(join.kind, id);
    }
    Ok(JoinedRow {
        entity: decode_mysql(row)?,
        related,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::Fixture;
    use crate::models::{Post, PostColumn, User};
    use crate::query::{FilterSpec, QueryBuilder};
    use proptest::prelude::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("Arroz"), "%Arroz%");
        assert_eq!(contains_pattern("50%_off!"), "%50!%!_off!!%");
    }

    #[test]
    fn test_pagination_sql() {
        let registry = crate::query::RelationshipRegistry::standard().unwrap();
        let (sql, params) = QueryBuilder::new(&registry)
            .build::<Post>(None, &FilterSpec::new())
            .order_by(PostColumn::CriadoEm, Order::Desc)
            .paginate(Page::new(20, 10))
            .to_sql();

        assert!(sql.ends_with("ORDER BY posts.criado_em DESC LIMIT ? OFFSET ?"));
        assert_eq!(params, vec![SqlValue::Int(10), SqlValue::Int(20)]);
    }

    #[test]
    fn test_offset_without_limit() {
        let registry = crate::query::RelationshipRegistry::standard().unwrap();
        let (_, params) = QueryBuilder::new(&registry)
            .build::<Post>(None, &FilterSpec::new())
            .offset(5)
            .to_sql();

        assert_eq!(params, vec![SqlValue::Int(i64::MAX), SqlValue::Int(5)]);
    }

    #[tokio::test]
    async fn test_like_filters_are_or_combined() {
        let fx = Fixture::new().await;
        let (org, user, cat) = fx.owner_chain("Banco de Alimentos").await;
        let arroz = fx.post(org.id, user.id, cat.id, "Arroz integral", "Pacotes de 5kg").await;
        let feijao = fx.post(org.id, user.id, cat.id, "Feijão", "Combina com ARROZ").await;
        fx.post(org.id, user.id, cat.id, "Cobertores", "Inverno").await;

        let spec = FilterSpec::<Post>::new()
            .like(PostColumn::Titulo, "arroz")
            .like(PostColumn::Descricao, "arroz");
        let mut ids: Vec<i64> = fx
            .builder()
            .build(None, &spec)
            .fetch_all(&fx.pool)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();

        assert_eq!(ids, vec![arroz.id, feijao.id]);
    }

    #[tokio::test]
    async fn test_like_non_ascii_terms() {
        let fx = Fixture::new().await;
        let (org, user, cat) = fx.owner_chain("Padaria Solidária").await;
        let queijo = fx.post(org.id, user.id, cat.id, "PÃO DE QUEIJO", "congelado").await;
        let frances = fx.post(org.id, user.id, cat.id, "Pão francês", "fornada da manhã").await;
        let bolo = fx.post(org.id, user.id, cat.id, "Bolo", "feito com pão amanhecido").await;
        fx.post(org.id, user.id, cat.id, "Arroz", "5kg").await;

        let search = |term: &'static str| {
            let builder = fx.builder();
            let pool = fx.pool.clone();
            async move {
                let spec = FilterSpec::<Post>::new()
                    .like(PostColumn::Titulo, term)
                    .like(PostColumn::Descricao, term);
                let mut ids: Vec<i64> = builder
                    .build(None, &spec)
                    .fetch_all(&pool)
                    .await
                    .unwrap()
                    .iter()
                    .map(|p| p.id)
                    .collect();
                ids.sort_unstable();
                ids
            }
        };

        assert_eq!(search("pão").await, vec![frances.id, bolo.id]);
        assert_eq!(search("Pão").await, vec![frances.id, bolo.id]);
        assert_eq!(search("PÃO").await, vec![queijo.id]);
        assert_eq!(search("PÃO DE QUEIJO").await, vec![queijo.id]);
        assert_eq!(search("pÃo de queijo").await, vec![queijo.id]);
        assert_eq!(search("FRANCês").await, vec![frances.id]);
    }

    #[tokio::test]
    async fn test_like_wildcards_match_literally() {
        let fx = Fixture::new().await;
        let (org, user, cat) = fx.owner_chain("ONG").await;
        fx.post(org.id, user.id, cat.id, "100% algodão", "camisetas").await;
        fx.post(org.id, user.id, cat.id, "1000 algodões", "lençóis").await;

        let spec = FilterSpec::<Post>::new().like(PostColumn::Titulo, "100%");
        let found = fx.builder().build(None, &spec).fetch_all(&fx.pool).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].titulo, "100% algodão");
    }

    #[tokio::test]
    async fn test_soft_deleted_hidden_from_others() {
        let fx = Fixture::new().await;
        let (_, alice, _) = fx.owner_chain("ONG").await;
        let bob = fx.user(alice.id_organizacao, "bob").await;
        let carol = fx.user(alice.id_organizacao, "carol").await;
        fx.soft_delete_user(bob.id).await;
        fx.soft_delete_user(carol.id).await;

        let everyone = |requester| {
            let builder = fx.builder();
            let pool = fx.pool.clone();
            async move {
                let mut ids: Vec<i64> = builder
                    .build::<User>(requester, &FilterSpec::new())
                    .fetch_all(&pool)
                    .await
                    .unwrap()
                    .iter()
                    .map(|u| u.id)
                    .collect();
                ids.sort_unstable();
                ids
            }
        };

        assert_eq!(everyone(Some(alice.id)).await, vec![alice.id]);
        assert_eq!(everyone(Some(bob.id)).await, vec![alice.id, bob.id]);
        assert_eq!(everyone(Some(carol.id)).await, vec![alice.id, carol.id]);
        assert_eq!(everyone(None).await, vec![alice.id, bob.id, carol.id]);
    }

    #[tokio::test]
    async fn test_count_ignores_pagination() {
        let fx = Fixture::new().await;
        let (org, user, cat) = fx.owner_chain("ONG").await;
        for i in 0..5 {
            fx.post(org.id, user.id, cat.id, &format!("Doação {i}"), "itens").await;
        }

        let query = fx
            .builder()
            .build::<Post>(None, &FilterSpec::new())
            .paginate(Page::new(0, 2));

        assert_eq!(query.fetch_all(&fx.pool).await.unwrap().len(), 2);
        assert_eq!(query.count(&fx.pool).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_fetch_first_joined_reads_ids_by_kind() {
        let fx = Fixture::new().await;
        let (org, user, cat) = fx.owner_chain("ONG").await;
        let post = fx.post(org.id, user.id, cat.id, "Leite", "caixas").await;

        let spec = FilterSpec::<User>::new()
            .join(EntityKind::Favorite)
            .join(EntityKind::Post)
            .outer()
            .eq(crate::models::UserColumn::Id, user.id);
        let row = fx
            .builder()
            .build(None, &spec)
            .fetch_first_joined(&fx.pool)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(row.entity.id, user.id);
        assert_eq!(row.related_id(EntityKind::Post), Some(post.id));
        assert_eq!(row.related_id(EntityKind::Favorite), None);
        assert!(row.has_any_related());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn prop_like_matches_case_insensitive_containment(
            titles in prop::collection::vec("[a-zA-ZãÃçÇ%_! ]{1,12}", 1..6),
            term in "[a-zA-ZãÃçÇ%_!]{1,3}",
        ) {
            tokio_test::block_on(async {
                let fx = Fixture::new().await;
                let (org, user, cat) = fx.owner_chain("ONG").await;
                let mut expected = Vec::new();
                for title in &titles {
                    let post = fx.post(org.id, user.id, cat.id, title, "").await;
                    // SQLite's LOWER folds ASCII letters only
                    if title.to_ascii_lowercase().contains(&term.to_ascii_lowercase()) {
                        expected.push(post.id);
                    }
                }

                let spec = FilterSpec::<Post>::new().like(PostColumn::Titulo, term.clone());
                let mut found: Vec<i64> = fx
                    .builder()
                    .build(None, &spec)
                    .fetch_all(&fx.pool)
                    .await
                    .unwrap()
                    .iter()
                    .map(|p| p.id)
                    .collect();
                found.sort_unstable();

                assert_eq!(found, expected);
            });
        }
    }
}
