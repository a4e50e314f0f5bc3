//! Query layer
//!
//! Builds filtered reads over one entity type from a declarative filter
//! specification, resolves joins through the relationship registry and
//! checks whether an entity is still referenced by others.
//!
//! # Usage
//!
//! ```ignore
//! use rafa::models::{Post, PostColumn};
//! use rafa::query::{FilterSpec, QueryBuilder, RelationshipRegistry};
//!
//! let registry = RelationshipRegistry::standard()?;
//! let spec = FilterSpec::<Post>::new()
//!     .eq(PostColumn::Status, 1)
//!     .like(PostColumn::Titulo, "arroz")
//!     .like(PostColumn::Descricao, "arroz");
//! let posts = QueryBuilder::new(&registry)
//!     .build(None, &spec)
//!     .fetch_all(&pool)
//!     .await?;
//! ```

mod builder;
mod dependents;
mod error;
pub mod relations;
mod select;
mod value;

pub(crate) use value::bind_values;

pub use builder::{FilterSpec, JoinType, QueryBuilder, RawFilterSpec};
pub use dependents::has_dependents;
pub use error::{QueryError, RegistryError};
pub use relations::{ForeignKey, RelationshipRegistry, FOREIGN_KEYS};
pub use select::{JoinedRow, Order, SelectQuery};
pub use value::SqlValue;
