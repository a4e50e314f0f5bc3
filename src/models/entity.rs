//! Entity metadata
//!
//! Each table gets a typed column enum (generated by [`entity_columns!`]) and an
//! [`Entity`] implementation that ties the row type to its table, id column and
//! optional soft-delete flag. [`EntityKind`] names entity types at runtime for
//! joins and relationship lookups.

use serde::{Deserialize, Serialize};
use sqlx::{mysql::MySqlRow, sqlite::SqliteRow, FromRow};
use std::fmt;
use std::hash::Hash;

use crate::query::SqlValue;

/// A typed column of one entity's table
pub trait Column: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Every column, in table order
    const ALL: &'static [Self];
    /// Every column name, in table order
    const NAMES: &'static [&'static str];

    /// Column name as it appears in the schema
    fn name(self) -> &'static str;

    /// Resolve a column from its schema name
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|column| column.name() == name)
    }
}

/// Declare a column enum together with its [`Column`] implementation.
macro_rules! entity_columns {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident => $column:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::models::Column for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];
            const NAMES: &'static [&'static str] = &[$($column),+];

            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $column),+
                }
            }
        }
    };
}

pub(crate) use entity_columns;

/// A row type backed by one table.
///
/// Row decoding goes through `sqlx::FromRow` for both supported drivers.
pub trait Entity:
    for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, MySqlRow> + Send + Sync + Unpin + 'static
{
    type Column: Column;

    const KIND: EntityKind;
    const ID: Self::Column;
    /// Boolean column marking the row as logically deleted. Entities that set
    /// it are hidden from other requesters once flagged, and are deactivated
    /// instead of removed while other rows depend on them.
    const DELETED_FLAG: Option<Self::Column> = None;
    const CREATED_AT: Option<Self::Column> = None;
    const UPDATED_AT: Option<Self::Column> = None;

    fn id(&self) -> i64;

    fn is_deleted(&self) -> bool {
        false
    }

    fn table() -> &'static str {
        Self::KIND.table()
    }
}

/// Values for a new row, produced by validated create inputs
pub trait Insertable<E: Entity> {
    fn values(&self) -> Vec<(E::Column, SqlValue)>;
}

/// A partial update: only the columns present are written
pub trait Changeset<E: Entity> {
    fn changes(&self) -> Vec<(E::Column, SqlValue)>;
}

/// Ad hoc set of column assignments
#[derive(Debug, Clone)]
pub struct Changes<E: Entity> {
    entries: Vec<(E::Column, SqlValue)>,
}

impl<E: Entity> Default for Changes<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: Entity> Changes<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a column; a later assignment to the same column wins
    pub fn set(mut self, column: E::Column, value: impl Into<SqlValue>) -> Self {
        self.entries.retain(|(c, _)| *c != column);
        self.entries.push((column, value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: Entity> Changeset<E> for Changes<E> {
    fn changes(&self) -> Vec<(E::Column, SqlValue)> {
        self.entries.clone()
    }
}

/// Runtime name of an entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Organization,
    User,
    Category,
    Post,
    Favorite,
    Delivery,
    Event,
    MessageThread,
    Message,
    Watchlist,
    Calendar,
}

impl EntityKind {
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::Organization,
        EntityKind::User,
        EntityKind::Category,
        EntityKind::Post,
        EntityKind::Favorite,
        EntityKind::Delivery,
        EntityKind::Event,
        EntityKind::MessageThread,
        EntityKind::Message,
        EntityKind::Watchlist,
        EntityKind::Calendar,
    ];

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Organization => "organizations",
            EntityKind::User => "users",
            EntityKind::Category => "categories",
            EntityKind::Post => "posts",
            EntityKind::Favorite => "favorites",
            EntityKind::Delivery => "deliveries",
            EntityKind::Event => "events",
            EntityKind::MessageThread => "message_threads",
            EntityKind::Message => "messages",
            EntityKind::Watchlist => "watchlists",
            EntityKind::Calendar => "calendars",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        use super::*;

        match self {
            EntityKind::Organization => OrganizationColumn::NAMES,
            EntityKind::User => UserColumn::NAMES,
            EntityKind::Category => CategoryColumn::NAMES,
            EntityKind::Post => PostColumn::NAMES,
            EntityKind::Favorite => FavoriteColumn::NAMES,
            EntityKind::Delivery => DeliveryColumn::NAMES,
            EntityKind::Event => EventColumn::NAMES,
            EntityKind::MessageThread => MessageThreadColumn::NAMES,
            EntityKind::Message => MessageColumn::NAMES,
            EntityKind::Watchlist => WatchlistColumn::NAMES,
            EntityKind::Calendar => CalendarColumn::NAMES,
        }
    }

    pub fn has_column(self, name: &str) -> bool {
        self.columns().contains(&name)
    }

    /// Alias under which a joined entity's id is selected
    pub fn id_alias(self) -> String {
        format!("{}_id", self.table())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Post, PostColumn, User, UserColumn};

    #[test]
    fn test_every_entity_has_an_id_column() {
        for kind in EntityKind::ALL {
            assert!(kind.has_column("id"), "{kind} has no id column");
        }
    }

    #[test]
    fn test_table_names_are_unique() {
        let mut tables: Vec<_> = EntityKind::ALL.iter().map(|k| k.table()).collect();
        tables.sort_unstable();
        tables.dedup();
        assert_eq!(tables.len(), EntityKind::ALL.len());
    }

    #[test]
    fn test_column_from_name() {
        assert_eq!(PostColumn::from_name("titulo"), Some(PostColumn::Titulo));
        assert_eq!(PostColumn::from_name("nonexistent"), None);
        assert_eq!(UserColumn::from_name("eh_deletado"), Some(UserColumn::EhDeletado));
    }

    #[test]
    fn test_entity_metadata() {
        assert_eq!(User::table(), "users");
        assert_eq!(User::DELETED_FLAG, Some(UserColumn::EhDeletado));
        assert_eq!(Post::DELETED_FLAG, None);
        assert_eq!(EntityKind::Favorite.id_alias(), "favorites_id");
    }

    #[test]
    fn test_changes_last_assignment_wins() {
        let changes = Changes::<User>::new()
            .set(UserColumn::Telefone, "1")
            .set(UserColumn::Telefone, "2");

        assert_eq!(
            changes.changes(),
            vec![(UserColumn::Telefone, SqlValue::Text("2".to_string()))]
        );
    }
}
