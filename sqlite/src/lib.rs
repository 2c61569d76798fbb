//! SQLite execution layer for sqlentity.
//!
//! `sqlentity-core` describes entities and builds statements; this crate
//! runs them through [`rusqlite`] and hands rows back to the core mapper.
//!
//! # Architecture
//!
//! - **`executor`** - the [`Executor`] trait, implemented for
//!   [`rusqlite::Connection`] and [`rusqlite::Transaction`]
//! - **`store`** - [`EntityStore`], typed insert/update/delete/select over
//!   any executor
//! - **`relation`** - one-hop hydration of declared relationships
//! - **`source`** - [`DataSource`] and its [`Catalog`], a file-backed
//!   database created on first use
//! - **`config`** - [`DataSourceConfig`], loaded from YAML or JSON
//!
//! # Quick start
//!
//! ```no_run
//! # use sqlentity_core::{Column, Entity, Result, TableSchema, Value};
//! # #[derive(Default)]
//! # struct Tag { id: i64, label: String }
//! # impl Entity for Tag {
//! #     fn schema() -> TableSchema {
//! #         TableSchema::new("tags").column(Column::id("id")).column(Column::text("label"))
//! #     }
//! #     fn blank() -> Option<Self> { Some(Self::default()) }
//! #     fn get(&self, p: &str) -> Option<Value> {
//! #         match p { "id" => Some(self.id.into()), "label" => Some(self.label.as_str().into()), _ => None }
//! #     }
//! #     fn set(&mut self, p: &str, v: Value) -> Result<()> {
//! #         match p { "id" => self.id = v.decode()?, "label" => self.label = v.decode()?, _ => {} }
//! #         Ok(())
//! #     }
//! # }
//! use rusqlite::Connection;
//! use sqlentity_sqlite::EntityStore;
//!
//! let mut conn = Connection::open("library.db").unwrap();
//! let mut store = EntityStore::new(&mut conn);
//! store.create::<Tag>().unwrap();
//! store.insert(&Tag { id: 0, label: "rust".into() }).unwrap();
//!
//! for tag in store.select_all::<Tag>().unwrap() {
//!     println!("{} {}", tag.id, tag.label);
//! }
//! ```
//!
//! # Logging
//!
//! Statements, relation resolution and database bootstrap are reported
//! through [`tracing`]. No subscriber is installed here.

mod config;
mod error;
mod executor;
mod relation;
mod source;
mod store;

pub use config::{DataSourceConfig, SyncMode};
pub use error::{Result, SqliteError};
pub use executor::Executor;
pub use relation::{resolve_relation, resolve_relations};
pub use source::{Catalog, DataSource};
pub use store::EntityStore;
