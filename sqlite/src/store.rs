//! Typed entity operations over an [`Executor`].
//!
//! [`EntityStore`] borrows an executor (usually a [`rusqlite::Connection`])
//! and exposes create/insert/update/delete/select for any [`Entity`]. Each
//! method builds its statement with `sqlentity_core::query`, executes it, and
//! maps rows back with `sqlentity_core::mapper`.
//!
//! # Example
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
//! let mut conn = Connection::open_in_memory().unwrap();
//! let mut store = EntityStore::new(&mut conn);
//! store.create::<Tag>().unwrap();
//!
//! let mut tag = Tag { id: 0, label: "rust".into() };
//! let id = store.identity_insert(&mut tag).unwrap();
//! assert_eq!(tag.id, id);
//!
//! let loaded: Option<Tag> = store.select_by_identity(id).unwrap();
//! assert_eq!(loaded.unwrap().label, "rust");
//! ```

use std::collections::HashMap;

use sqlentity_core::registry::{describe, key_column};
use sqlentity_core::{Entity, KeyType, ModelError, Params, Value, mapper, query};
use tracing::debug;

use crate::error::{Result, SqliteError};
use crate::executor::Executor;
use crate::relation::resolve_relations;

/// Entity operations bound to one executor.
///
/// Multi-statement operations (identity inserts, relation hydration) are
/// separate round trips with no transaction around them. Borrow a
/// [`rusqlite::Transaction`] as the executor when atomicity is needed.
pub struct EntityStore<'a, X: Executor + ?Sized> {
    executor: &'a mut X,
}

impl<'a, X: Executor + ?Sized> EntityStore<'a, X> {
    /// Creates a store over `executor`.
    pub fn new(executor: &'a mut X) -> Self {
        Self { executor }
    }

    /// The underlying executor, for statements the store does not build.
    pub fn executor(&mut self) -> &mut X {
        &mut *self.executor
    }

    /// Creates `T`'s table.
    ///
    /// # Errors
    ///
    /// Returns a schema error for invalid metadata, or the database error if
    /// the table already exists.
    pub fn create<T: Entity>(&mut self) -> Result<()> {
        let sql = query::create_table::<T>()?;
        self.executor.execute(&sql, &Params::new())?;
        Ok(())
    }

    /// Inserts `entity`; a zero identity is left for the database to assign.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyColumnSet`] before executing anything if no
    /// column qualifies, or the database error.
    pub fn insert<T: Entity>(&mut self, entity: &T) -> Result<usize> {
        let statement = query::insert(entity)?;
        self.executor.execute(&statement.sql, &statement.params)
    }

    /// Inserts `entity` and returns the identity the database assigned.
    ///
    /// # Errors
    ///
    /// An error from the insert itself means nothing was written.
    /// [`SqliteError::IdentityNotBackfilled`] means the row exists but its
    /// identity could not be read.
    pub fn insert_and_get_identity<T: Entity>(&mut self, entity: &T) -> Result<i64> {
        let table = describe::<T>()?.table.clone();
        self.insert(entity)?;
        self.last_identity(&table)
    }

    /// Inserts `entity` and writes the assigned identity back into it.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Schema`] before executing anything if `T` has no
    /// identity column; otherwise as
    /// [`insert_and_get_identity`](Self::insert_and_get_identity).
    pub fn identity_insert<T: Entity>(&mut self, entity: &mut T) -> Result<i64> {
        let (table, property) = identity_target::<T>()?;
        self.insert(entity)?;
        let id = self.last_identity(&table)?;
        backfill(entity, &table, &property, id)?;
        Ok(id)
    }

    /// `INSERT OR REPLACE` of `entity`.
    ///
    /// # Errors
    ///
    /// As [`insert`](Self::insert).
    pub fn insert_or_replace<T: Entity>(&mut self, entity: &T) -> Result<usize> {
        let statement = query::insert_or_replace(entity)?;
        self.executor.execute(&statement.sql, &statement.params)
    }

    /// `INSERT OR REPLACE` of `entity`, writing the resulting identity back.
    ///
    /// # Errors
    ///
    /// As [`identity_insert`](Self::identity_insert).
    pub fn identity_insert_or_replace<T: Entity>(&mut self, entity: &mut T) -> Result<i64> {
        let (table, property) = identity_target::<T>()?;
        self.insert_or_replace(entity)?;
        let id = self.last_identity(&table)?;
        backfill(entity, &table, &property, id)?;
        Ok(id)
    }

    /// Updates the row matching `entity`'s primary key.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingPredicate`] before executing anything if
    /// `T` has no primary key.
    pub fn update<T: Entity>(&mut self, entity: &T) -> Result<usize> {
        self.update_where(entity, None, &Params::new())
    }

    /// Updates with a caller predicate, `AND`-joined with the primary key.
    ///
    /// `params` are bound alongside the generated ones; their names must not
    /// start with `@_`.
    ///
    /// # Errors
    ///
    /// As [`update`](Self::update).
    pub fn update_where<T: Entity>(
        &mut self,
        entity: &T,
        where_clause: Option<&str>,
        params: &Params,
    ) -> Result<usize> {
        let mut statement = query::update(entity, where_clause)?;
        extend(&mut statement.params, params);
        self.executor.execute(&statement.sql, &statement.params)
    }

    /// Deletes the row matching `entity`'s primary key.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingPredicate`] before executing anything if
    /// `T` has no primary key.
    pub fn delete<T: Entity>(&mut self, entity: &T) -> Result<usize> {
        self.delete_where(entity, None, &Params::new())
    }

    /// Deletes with a caller predicate, `AND`-joined with the primary key.
    ///
    /// # Errors
    ///
    /// As [`delete`](Self::delete).
    pub fn delete_where<T: Entity>(
        &mut self,
        entity: &T,
        where_clause: Option<&str>,
        params: &Params,
    ) -> Result<usize> {
        let mut statement = query::delete(entity, where_clause)?;
        extend(&mut statement.params, params);
        self.executor.execute(&statement.sql, &statement.params)
    }

    /// Every row of `T`, with declared relations hydrated.
    ///
    /// # Errors
    ///
    /// Returns the first execution, mapping or relation failure.
    pub fn select_all<T: Entity>(&mut self) -> Result<Vec<T>> {
        let sql = query::select::<T>(None)?;
        let mut items: Vec<T> = self.fetch(&sql, &Params::new())?;
        resolve_relations(&mut *self.executor, items.iter_mut())?;
        Ok(items)
    }

    /// Rows of `T` matching a filter or join fragment. Relations are not
    /// hydrated.
    ///
    /// # Errors
    ///
    /// Returns the first execution or mapping failure.
    pub fn select_where<T: Entity>(&mut self, filter: &str, params: &Params) -> Result<Vec<T>> {
        let sql = query::select::<T>(Some(filter))?;
        self.fetch(&sql, params)
    }

    /// First row of `T` matching `filter`, if any.
    ///
    /// # Errors
    ///
    /// As [`select_where`](Self::select_where).
    pub fn select_one<T: Entity>(&mut self, filter: &str, params: &Params) -> Result<Option<T>> {
        let sql = query::select::<T>(Some(filter))?;
        let rows = self.executor.query(&sql, params)?;
        Ok(rows.first().map(mapper::row_to_entity).transpose()?)
    }

    /// The row of `T` with the given identity, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Schema`] if `T` has no identity column.
    pub fn select_by_identity<T: Entity>(&mut self, identity: impl Into<Value>) -> Result<Option<T>> {
        let statement = query::select_by_identity::<T>(identity)?;
        let rows = self.executor.query(&statement.sql, &statement.params)?;
        Ok(rows.first().map(mapper::row_to_entity).transpose()?)
    }

    /// Every row of `T`, keyed by the `key` column or, when `None`, by `T`'s
    /// single primary key. Relations are hydrated.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Schema`] if no key column is given and `T` does
    /// not have exactly one primary key of a type readable as `K`;
    /// [`ModelError::Mapping`] on duplicate keys.
    pub fn select_keyed<K: KeyType, T: Entity>(&mut self, key: Option<&str>) -> Result<HashMap<K, T>> {
        self.select_keyed_where("", &Params::new(), key)
    }

    /// Keyed select restricted by a filter or join fragment.
    ///
    /// # Errors
    ///
    /// As [`select_keyed`](Self::select_keyed).
    pub fn select_keyed_where<K: KeyType, T: Entity>(
        &mut self,
        filter: &str,
        params: &Params,
        key: Option<&str>,
    ) -> Result<HashMap<K, T>> {
        let column = match key.filter(|k| !k.is_empty()) {
            Some(column) => column.to_string(),
            None => key_column::<K, T>()?,
        };
        let sql = query::select::<T>(Some(filter))?;
        let rows = self.executor.query(&sql, params)?;
        let mut keyed: HashMap<K, T> = mapper::rows_to_keyed(&rows, &column)?;
        resolve_relations(&mut *self.executor, keyed.values_mut())?;
        Ok(keyed)
    }

    /// Hydrates `T`'s relations on entities loaded some other way.
    ///
    /// # Errors
    ///
    /// Returns the first relation failure.
    pub fn resolve<'e, T: Entity + 'e>(
        &mut self,
        entities: impl IntoIterator<Item = &'e mut T>,
    ) -> Result<()> {
        resolve_relations(&mut *self.executor, entities)
    }

    fn fetch<T: Entity>(&mut self, sql: &str, params: &Params) -> Result<Vec<T>> {
        let rows = self.executor.query(sql, params)?;
        Ok(mapper::rows_to_entities(&rows)?)
    }

    fn last_identity(&mut self, table: &str) -> Result<i64> {
        let not_backfilled = |source: SqliteError| SqliteError::IdentityNotBackfilled {
            table: table.to_string(),
            source: Box::new(source),
        };
        let value = self
            .executor
            .execute_scalar(query::LAST_INSERT_ID)
            .map_err(not_backfilled)?;
        let id = value.as_i64().ok_or_else(|| {
            not_backfilled(SqliteError::ModelError(ModelError::TypeMismatch {
                expected: "i64",
                found: value.type_name(),
            }))
        })?;
        debug!(table, id, "inserted row");
        Ok(id)
    }
}

fn identity_target<T: Entity>() -> Result<(String, String)> {
    let meta = describe::<T>()?;
    let identity = meta.identity().ok_or_else(|| {
        ModelError::Schema(format!("{} declares no identity column", meta.type_name))
    })?;
    Ok((meta.table.clone(), identity.property.clone()))
}

fn backfill<T: Entity>(entity: &mut T, table: &str, property: &str, id: i64) -> Result<()> {
    entity
        .set(property, Value::Integer(id))
        .map_err(|err| SqliteError::IdentityNotBackfilled {
            table: table.to_string(),
            source: Box::new(err.into()),
        })
}

fn extend(target: &mut Params, extra: &Params) {
    for (name, value) in extra.iter() {
        target.push(name, value.clone());
    }
}
