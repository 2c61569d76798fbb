//! Entity metadata, SQL statement generation and row mapping.
//!
//! This crate is the database-free half of sqlentity:
//!
//! - [`Entity`] - the trait a mapped type implements: a declarative
//!   [`TableSchema`], a blank constructor and property accessors.
//! - [`registry`] - validates schemas into cached [`EntityMetadata`].
//! - [`query`] - builds `CREATE`/`INSERT`/`UPDATE`/`DELETE`/`SELECT`
//!   statements with named parameters.
//! - [`mapper`] - maps result [`Row`]s back onto entities, as lists or keyed
//!   collections.
//! - [`Relation`] - typed one-to-many and many-to-many declarations, and the
//!   follow-up queries that hydrate them.
//!
//! Executing statements is the job of an execution layer such as
//! `sqlentity-sqlite`.
//!
//! # Example
//!
//! ```
//! use sqlentity_core::*;
//!
//! #[derive(Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//!     email: Option<String>,
//! }
//!
//! impl Entity for User {
//!     fn schema() -> TableSchema {
//!         TableSchema::new("users")
//!             .column(Column::id("id"))
//!             .column(Column::text("name"))
//!             .column(Column::text("email").nullable().unique())
//!     }
//!     fn blank() -> Option<Self> {
//!         Some(Self::default())
//!     }
//!     fn get(&self, property: &str) -> Option<Value> {
//!         match property {
//!             "id" => Some(self.id.into()),
//!             "name" => Some(self.name.as_str().into()),
//!             "email" => Some(self.email.clone().into()),
//!             _ => None,
//!         }
//!     }
//!     fn set(&mut self, property: &str, value: Value) -> Result<()> {
//!         match property {
//!             "id" => self.id = value.decode()?,
//!             "name" => self.name = value.decode()?,
//!             "email" => self.email = value.decode()?,
//!             _ => {}
//!         }
//!         Ok(())
//!     }
//! }
//!
//! assert_eq!(
//!     query::create_table::<User>().unwrap(),
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, email TEXT UNIQUE)"
//! );
//!
//! let row = Row::new().with("id", 1_i64).with("name", "ada").with("email", Value::Null);
//! let user: User = mapper::row_to_entity(&row).unwrap();
//! assert_eq!(user.name, "ada");
//! ```

mod entity;
mod error;
pub mod mapper;
mod metadata;
pub mod query;
pub mod registry;
mod relation;
mod value;

#[cfg(test)]
mod test_support;

pub use entity::{Entity, KeyType};
pub use error::{ModelError, Result};
pub use metadata::{
    Column, ColumnMetadata, ColumnType, ConflictPolicy, EntityMetadata, EntityRef,
    ForeignKeyConstraint, ReferentialAction, RelationshipDescriptor, RelationshipKind, SortOrder,
    TableSchema, UniqueGroup,
};
pub use query::Statement;
pub use registry::describe;
pub use relation::Relation;
pub use value::{
    FromValue, Params, Row, TIMESTAMP_FORMAT, Value, format_timestamp, parse_timestamp,
};
