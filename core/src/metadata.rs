//! Entity metadata model and the declarative builders that feed it.
//!
//! An entity describes itself with a [`TableSchema`] made of [`Column`]
//! declarations. The [registry](crate::registry) validates that declaration
//! once and turns it into an immutable [`EntityMetadata`], which is what the
//! statement builder, row mapper and relationship resolver consume.
//!
//! # Example
//!
//! ```
//! use sqlentity_core::{Column, ConflictPolicy, TableSchema};
//!
//! let schema = TableSchema::new("users")
//!     .column(Column::id("id"))
//!     .column(Column::text("name"))
//!     .column(Column::text("email").nullable().unique())
//!     .unique(&["name", "email"], ConflictPolicy::Ignore);
//!
//! assert_eq!(schema.table(), "users");
//! assert_eq!(schema.columns().len(), 3);
//! ```

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{ModelError, Result};
use crate::registry;

/// Semantic type of a column, which fixes its SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// 32/64-bit integers.
    Integer,
    /// Strings.
    Text,
    /// Floating point.
    Real,
    /// Booleans.
    Boolean,
    /// Enumerations stored by discriminant.
    Enum,
    /// Timestamps stored as text.
    Timestamp,
    /// Anything else.
    Blob,
}

impl ColumnType {
    /// SQL type emitted in `CREATE TABLE`.
    pub const fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Integer | ColumnType::Enum => "INTEGER",
            ColumnType::Text | ColumnType::Timestamp => "TEXT",
            ColumnType::Real => "REAL",
            ColumnType::Boolean => "BOOL",
            ColumnType::Blob => "BLOB",
        }
    }
}

/// Sort direction attached to a primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// `ASC`
    Asc,
    /// `DESC`
    Desc,
    /// No modifier (the default).
    #[default]
    Unspecified,
}

/// Action taken by a foreign key when the referenced row changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    /// No clause is emitted (the default).
    #[default]
    NoAction,
    /// `RESTRICT`
    Restrict,
    /// `SET NULL`
    SetNull,
    /// `SET DEFAULT`
    SetDefault,
    /// `CASCADE`
    Cascade,
}

impl ReferentialAction {
    /// SQL spelling of the action.
    pub const fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::Cascade => "CASCADE",
        }
    }
}

/// Conflict resolution attached to a unique group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictPolicy {
    /// `ROLLBACK`
    Rollback,
    /// `ABORT`
    Abort,
    /// `FAIL`
    Fail,
    /// `IGNORE`
    Ignore,
    /// `REPLACE`
    Replace,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConflictPolicy::Rollback => "ROLLBACK",
            ConflictPolicy::Abort => "ABORT",
            ConflictPolicy::Fail => "FAIL",
            ConflictPolicy::Ignore => "IGNORE",
            ConflictPolicy::Replace => "REPLACE",
        };
        f.write_str(text)
    }
}

/// A handle on another entity type, used by foreign keys and relationships.
#[derive(Clone, Copy)]
pub struct EntityRef {
    type_id: TypeId,
    type_name: &'static str,
    schema: fn() -> TableSchema,
    describe: fn() -> Result<Arc<EntityMetadata>>,
}

impl EntityRef {
    /// Handle for `T`.
    pub fn of<T: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            schema: T::schema,
            describe: registry::describe::<T>,
        }
    }

    /// Type identity of the referenced entity.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the referenced entity.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether this handle points at `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// The referenced entity's declared schema.
    pub fn schema(&self) -> TableSchema {
        (self.schema)()
    }

    /// Validated metadata of the referenced entity, through the registry.
    ///
    /// # Errors
    ///
    /// Propagates the registry's [`ModelError::Schema`].
    pub fn metadata(&self) -> Result<Arc<EntityMetadata>> {
        (self.describe)()
    }

    /// Table name of the referenced entity.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Schema`] if the referenced type has no table
    /// designation.
    pub fn table_name(&self) -> Result<String> {
        let schema = self.schema();
        if schema.table.trim().is_empty() {
            return Err(ModelError::Schema(format!(
                "{} has no table designation",
                self.type_name
            )));
        }
        Ok(schema.table)
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EntityRef {}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRef").field(&self.type_name).finish()
    }
}

/// Declared foreign key, before the referenced table is resolved.
#[derive(Debug, Clone)]
pub(crate) struct ForeignKeyDecl {
    pub(crate) referenced: EntityRef,
    pub(crate) column: String,
}

/// Declaration of a single column.
///
/// Columns are `NOT NULL` unless [`nullable`](Self::nullable) is called.
#[derive(Debug, Clone)]
pub struct Column {
    pub(crate) property: String,
    pub(crate) db_name: Option<String>,
    pub(crate) column_type: ColumnType,
    pub(crate) identity: bool,
    pub(crate) primary_key: bool,
    pub(crate) unique: bool,
    pub(crate) nullable: bool,
    pub(crate) autoincrement: bool,
    pub(crate) sort: SortOrder,
    pub(crate) foreign_key: Option<ForeignKeyDecl>,
    pub(crate) on_update: ReferentialAction,
    pub(crate) on_delete: ReferentialAction,
}

impl Column {
    /// Declares a column mapped to `property`.
    pub fn new(property: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            property: property.into(),
            db_name: None,
            column_type,
            identity: false,
            primary_key: false,
            unique: false,
            nullable: false,
            autoincrement: false,
            sort: SortOrder::Unspecified,
            foreign_key: None,
            on_update: ReferentialAction::NoAction,
            on_delete: ReferentialAction::NoAction,
        }
    }

    /// Identity column: integer primary key, autoincrement.
    pub fn id(property: impl Into<String>) -> Self {
        Self::integer(property)
            .identity()
            .primary_key()
            .autoincrement()
    }

    /// Integer column.
    pub fn integer(property: impl Into<String>) -> Self {
        Self::new(property, ColumnType::Integer)
    }

    /// Text column.
    pub fn text(property: impl Into<String>) -> Self {
        Self::new(property, ColumnType::Text)
    }

    /// Floating point column.
    pub fn real(property: impl Into<String>) -> Self {
        Self::new(property, ColumnType::Real)
    }

    /// Boolean column.
    pub fn boolean(property: impl Into<String>) -> Self {
        Self::new(property, ColumnType::Boolean)
    }

    /// Enumeration column, stored by discriminant.
    pub fn enumeration(property: impl Into<String>) -> Self {
        Self::new(property, ColumnType::Enum)
    }

    /// Timestamp column, stored as text.
    pub fn timestamp(property: impl Into<String>) -> Self {
        Self::new(property, ColumnType::Timestamp)
    }

    /// Binary column.
    pub fn blob(property: impl Into<String>) -> Self {
        Self::new(property, ColumnType::Blob)
    }

    /// Overrides the database column name.
    pub fn named(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = Some(db_name.into());
        self
    }

    /// Marks the column as the auto-assigned identity.
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Marks the column as (part of) the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Primary key sorted ascending.
    pub fn ascending(mut self) -> Self {
        self.sort = SortOrder::Asc;
        self
    }

    /// Primary key sorted descending.
    pub fn descending(mut self) -> Self {
        self.sort = SortOrder::Desc;
        self
    }

    /// Adds a `UNIQUE` constraint.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Allows `NULL` values.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Adds `AUTOINCREMENT`; only valid on an integer primary key.
    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    /// Declares a foreign key onto `column` of entity `T`.
    pub fn references<T: Entity>(self, column: impl Into<String>) -> Self {
        self.references_entity(EntityRef::of::<T>(), column)
    }

    /// Declares a foreign key through an [`EntityRef`].
    pub fn references_entity(mut self, referenced: EntityRef, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKeyDecl {
            referenced,
            column: column.into(),
        });
        self
    }

    /// Foreign key `ON UPDATE` action.
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }

    /// Foreign key `ON DELETE` action.
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Property this column maps to.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Database name: the override if given, else the property name.
    pub fn name(&self) -> &str {
        self.db_name.as_deref().unwrap_or(&self.property)
    }
}

/// Declarative description of an entity's table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub(crate) table: String,
    pub(crate) columns: Vec<Column>,
    pub(crate) unique_groups: Vec<UniqueGroup>,
}

impl TableSchema {
    /// Starts a schema for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            unique_groups: Vec::new(),
        }
    }

    /// Appends a column; declaration order is table order.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a multi-column `UNIQUE (...) ON CONFLICT` constraint.
    pub fn unique(mut self, columns: &[&str], policy: ConflictPolicy) -> Self {
        self.unique_groups.push(UniqueGroup {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            policy,
        });
        self
    }

    /// Declared table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Declared columns.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

/// Validated description of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    /// Property the column maps to.
    pub property: String,
    /// Override database name, if declared.
    pub db_name: Option<String>,
    /// Semantic type.
    pub column_type: ColumnType,
    /// Auto-assigned surrogate key.
    pub identity: bool,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Single-column `UNIQUE`.
    pub unique: bool,
    /// `NULL` allowed.
    pub nullable: bool,
    /// `AUTOINCREMENT`.
    pub autoincrement: bool,
    /// Primary key sort order.
    pub sort: SortOrder,
}

impl ColumnMetadata {
    /// Database column name, verbatim.
    pub fn name(&self) -> &str {
        self.db_name.as_deref().unwrap_or(&self.property)
    }
}

/// Validated foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyConstraint {
    /// Source column (database name).
    pub column: String,
    /// Referenced entity type.
    pub referenced: EntityRef,
    /// Table of the referenced entity.
    pub referenced_table: String,
    /// Referenced column.
    pub referenced_column: String,
    /// `ON UPDATE` action.
    pub on_update: ReferentialAction,
    /// `ON DELETE` action.
    pub on_delete: ReferentialAction,
}

impl ForeignKeyConstraint {
    /// Trailing `ON UPDATE` / `ON DELETE` text; empty when both are
    /// [`ReferentialAction::NoAction`].
    pub fn end_clause(&self) -> String {
        let mut clause = String::new();
        if self.on_update != ReferentialAction::NoAction {
            clause.push_str(" ON UPDATE ");
            clause.push_str(self.on_update.as_sql());
        }
        if self.on_delete != ReferentialAction::NoAction {
            clause.push_str(" ON DELETE ");
            clause.push_str(self.on_delete.as_sql());
        }
        clause
    }
}

/// Multi-column uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueGroup {
    /// Column names, in order.
    pub columns: Vec<String>,
    /// Conflict resolution.
    pub policy: ConflictPolicy,
}

/// Shape of a relationship property, decided at declaration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipKind {
    /// Children through a direct foreign key, collected into a `Vec`.
    OneToManyList,
    /// Children through a direct foreign key, keyed by their primary key.
    OneToManyKeyed,
    /// Targets through a join entity, collected into a `Vec`.
    ManyToMany,
    /// Targets through a join entity, keyed by their primary key.
    ManyToManyKeyed,
}

impl RelationshipKind {
    /// Whether the relationship goes through a join entity.
    pub const fn is_many_to_many(self) -> bool {
        matches!(
            self,
            RelationshipKind::ManyToMany | RelationshipKind::ManyToManyKeyed
        )
    }
}

/// Type-erased description of a relationship property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    /// Property the related collection is assigned to.
    pub property: String,
    /// Collection shape.
    pub kind: RelationshipKind,
    /// Related entity type.
    pub target: EntityRef,
    /// Join entity type, for many-to-many.
    pub join: Option<EntityRef>,
    /// Explicit foreign key column on the target (single-reference form).
    pub foreign_key: Option<String>,
    /// Column on the owner whose value feeds `foreign_key`.
    pub column: Option<String>,
}

/// Validated, immutable description of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    /// Rust type name, for messages.
    pub type_name: &'static str,
    /// Table name.
    pub table: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnMetadata>,
    /// Foreign keys in declaration order.
    pub foreign_keys: Vec<ForeignKeyConstraint>,
    /// Multi-column unique constraints.
    pub unique_groups: Vec<UniqueGroup>,
    /// Relationship properties.
    pub relationships: Vec<RelationshipDescriptor>,
}

impl EntityMetadata {
    /// Column with the given database name.
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Column mapped to the given property.
    pub fn column_for_property(&self, property: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.property == property)
    }

    /// The identity column, if declared.
    pub fn identity(&self) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.identity)
    }

    /// Primary key columns in declaration order.
    pub fn primary_keys(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    /// The single primary key column.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Schema`] if the entity has no primary key or a
    /// composite one.
    pub fn single_primary_key(&self) -> Result<&ColumnMetadata> {
        let keys: Vec<_> = self.primary_keys().collect();
        match keys.as_slice() {
            [key] => Ok(key),
            _ => Err(ModelError::Schema(format!(
                "{} did not have exactly one primary key, it had {}",
                self.type_name,
                keys.len()
            ))),
        }
    }

    /// Foreign keys referencing the given entity type, in declaration order.
    pub fn foreign_keys_to(&self, type_id: TypeId) -> impl Iterator<Item = &ForeignKeyConstraint> {
        self.foreign_keys
            .iter()
            .filter(move |fk| fk.referenced.type_id() == type_id)
    }

    /// Relationship declared on `property`.
    pub fn relationship(&self, property: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.property == property)
    }
}
