//! File-backed data source with first-use bootstrap.
//!
//! A [`DataSource`] owns a [`DataSourceConfig`] and a [`Catalog`] of entity
//! types. Every operation opens its own connection and drops it before
//! returning. The first connection to a missing file creates it, creates a
//! table for every catalog entry in registration order, and runs the
//! catalog's seed hook.
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
//! use sqlentity_sqlite::{Catalog, DataSource, DataSourceConfig, EntityStore};
//!
//! let catalog = Catalog::new()
//!     .register::<Tag>()
//!     .with_seed(|conn| {
//!         let mut store = EntityStore::new(conn);
//!         store.insert(&Tag { id: 0, label: "default".into() })?;
//!         Ok(())
//!     });
//! let source = DataSource::new(DataSourceConfig::new("library.db"), catalog).unwrap();
//!
//! let tags: Vec<Tag> = source.select_table_into_list().unwrap();
//! assert_eq!(tags.len(), 1);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use rusqlite::Connection;
use sqlentity_core::query::{ENABLE_FOREIGN_KEYS, create_table_sql};
use sqlentity_core::{Entity, EntityRef, ModelError, Params, describe};
use tracing::{debug, info, warn};

use crate::config::DataSourceConfig;
use crate::error::{Result, SqliteError};
use crate::executor::Executor;
use crate::store::EntityStore;

type SeedFn = Box<dyn Fn(&mut Connection) -> Result<()> + Send + Sync>;

/// Ordered set of entity types stored in one database.
///
/// Order matters: a type must be registered after every type its foreign
/// keys reference.
#[derive(Default)]
pub struct Catalog {
    entities: Vec<EntityRef>,
    seed: Option<SeedFn>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `T`. Registering a type twice has no effect.
    pub fn register<T: Entity>(mut self) -> Self {
        let entity = EntityRef::of::<T>();
        if !self.entities.contains(&entity) {
            self.entities.push(entity);
        }
        self
    }

    /// Sets the hook that inserts default data into a freshly created
    /// database.
    pub fn with_seed(
        mut self,
        seed: impl Fn(&mut Connection) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.seed = Some(Box::new(seed));
        self
    }

    /// Registered types, in creation order.
    pub fn entities(&self) -> &[EntityRef] {
        &self.entities
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no type is registered.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// `CREATE TABLE` statements for every registered type, in order.
    ///
    /// # Errors
    ///
    /// Returns the first type's [`ModelError::Schema`].
    pub fn create_statements(&self) -> Result<Vec<String>> {
        self.entities
            .iter()
            .map(|entity| Ok(create_table_sql(entity.metadata()?.as_ref())))
            .collect()
    }

    /// Creates every registered table through `executor`.
    ///
    /// # Errors
    ///
    /// Returns the first schema or database failure.
    pub fn create_all<X: Executor + ?Sized>(&self, executor: &mut X) -> Result<()> {
        for sql in self.create_statements()? {
            executor.execute(&sql, &Params::new())?;
        }
        Ok(())
    }

    /// Runs the seed hook, if any.
    ///
    /// # Errors
    ///
    /// Propagates the hook's error.
    pub fn seed(&self, conn: &mut Connection) -> Result<()> {
        match &self.seed {
            Some(seed) => seed(conn),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("entities", &self.entities)
            .field("seed", &self.seed.is_some())
            .finish()
    }
}

/// A SQLite database file plus the entity types it holds.
#[derive(Debug)]
pub struct DataSource {
    config: DataSourceConfig,
    catalog: Catalog,
}

impl DataSource {
    /// Creates a data source. Nothing is opened until the first operation.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::ConfigError`] for invalid settings.
    pub fn new(config: DataSourceConfig, catalog: Catalog) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, catalog })
    }

    /// Creates a data source from a configuration file.
    ///
    /// # Errors
    ///
    /// See [`DataSourceConfig::load`].
    pub fn from_config_file(path: impl AsRef<Path>, catalog: Catalog) -> Result<Self> {
        Self::new(DataSourceConfig::load(path)?, catalog)
    }

    /// Active configuration.
    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    /// Registered entity types.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Opens a connection, bootstrapping the database if the file is new.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::ConfigError`] if the file is missing and
    /// `create_if_missing` is off; otherwise the first I/O, schema or
    /// database failure. A failed bootstrap removes the new file again.
    pub fn connection(&self) -> Result<Connection> {
        let path = self.config.path.as_path();
        let fresh = !path.exists();
        if fresh && !self.config.create_if_missing {
            return Err(SqliteError::ConfigError(format!(
                "database file {} does not exist",
                path.display()
            )));
        }
        if fresh {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(path)?;
        conn.execute_batch(self.config.synchronous.pragma())?;

        if fresh {
            info!(path = %path.display(), tables = self.catalog.len(), "creating database");
            if let Err(err) = self.bootstrap(&mut conn) {
                drop(conn);
                if let Err(io) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %io, "failed to remove partial database");
                }
                return Err(err);
            }
        }

        if self.config.foreign_keys {
            conn.execute_batch(ENABLE_FOREIGN_KEYS)?;
        }
        debug!(path = %path.display(), "connection opened");
        Ok(conn)
    }

    fn bootstrap(&self, conn: &mut Connection) -> Result<()> {
        let mut tx = conn.transaction()?;
        self.catalog.create_all(&mut tx)?;
        tx.commit()?;
        self.catalog.seed(conn)
    }

    /// Runs `op` against a store over a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns connection failures or `op`'s error.
    pub fn with_store<R>(
        &self,
        op: impl FnOnce(&mut EntityStore<'_, Connection>) -> Result<R>,
    ) -> Result<R> {
        let mut conn = self.connection()?;
        let mut store = EntityStore::new(&mut conn);
        op(&mut store)
    }

    /// The row of `T` with the given identity, if any.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::select_by_identity`].
    pub fn select_item<T: Entity>(&self, identity: i64) -> Result<Option<T>> {
        self.with_store(|store| store.select_by_identity(identity))
    }

    /// Inserts `item` and writes its new identity back.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::identity_insert`].
    pub fn insert_item_and_update_identity<T: Entity>(&self, item: &mut T) -> Result<i64> {
        self.with_store(|store| store.identity_insert(item))
    }

    /// Updates `item` by primary key.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::update`].
    pub fn update_item<T: Entity>(&self, item: &T) -> Result<usize> {
        self.with_store(|store| store.update(item))
    }

    /// Every row of `T`, relations hydrated.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::select_all`].
    pub fn select_table_into_list<T: Entity>(&self) -> Result<Vec<T>> {
        self.with_store(|store| store.select_all())
    }

    /// Every row of `T` keyed by its identity, relations hydrated.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Schema`] if `T` has no identity column; see
    /// also [`EntityStore::select_keyed`].
    pub fn select_table_into_keyed<T: Entity>(&self) -> Result<HashMap<i64, T>> {
        let meta = describe::<T>()?;
        let identity = meta.identity().ok_or_else(|| {
            ModelError::Schema(format!("{} declares no identity column", meta.type_name))
        })?;
        self.with_store(|store| store.select_keyed(Some(identity.name())))
    }

    /// Inserts `item` without reading back its identity.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::insert`].
    pub fn insert<T: Entity>(&self, item: &T) -> Result<usize> {
        self.with_store(|store| store.insert(item))
    }
}
