//! The [`Entity`] trait implemented by every mapped type.
//!
//! Implementations are plain, explicit code: the schema is returned from a
//! function, property access is a `match` on the property name, and
//! relationships are a list of typed [`Relation`] declarations.

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{ModelError, Result};
use crate::metadata::{ColumnMetadata, ColumnType, EntityMetadata, TableSchema};
use crate::relation::Relation;
use crate::value::{FromValue, Value};

/// A type mapped onto a database table.
///
/// # Examples
///
/// ```
/// use sqlentity_core::{Column, Entity, Result, TableSchema, Value};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Tag {
///     id: i64,
///     label: String,
/// }
///
/// impl Entity for Tag {
///     fn schema() -> TableSchema {
///         TableSchema::new("tags")
///             .column(Column::id("id"))
///             .column(Column::text("label").unique())
///     }
///
///     fn blank() -> Option<Self> {
///         Some(Self::default())
///     }
///
///     fn get(&self, property: &str) -> Option<Value> {
///         match property {
///             "id" => Some(self.id.into()),
///             "label" => Some(self.label.as_str().into()),
///             _ => None,
///         }
///     }
///
///     fn set(&mut self, property: &str, value: Value) -> Result<()> {
///         match property {
///             "id" => self.id = value.decode()?,
///             "label" => self.label = value.decode()?,
///             _ => {}
///         }
///         Ok(())
///     }
/// }
///
/// let mut tag = Tag::default();
/// tag.set("label", Value::Text("rust".into())).unwrap();
/// assert_eq!(tag.get("label"), Some(Value::Text("rust".into())));
/// ```
pub trait Entity: Sized + 'static {
    /// Declarative schema of the entity's table.
    fn schema() -> TableSchema;

    /// A blank instance that rows are mapped onto, or `None` when the type
    /// has no meaningful empty state.
    fn blank() -> Option<Self>;

    /// Current value of a column property; `None` for unknown properties.
    fn get(&self, property: &str) -> Option<Value>;

    /// Assigns a column property. Unknown properties are ignored.
    ///
    /// # Errors
    ///
    /// Returns the conversion error when `value` does not fit the field.
    fn set(&mut self, property: &str, value: Value) -> Result<()>;

    /// Relationship properties hydrated after a select.
    fn relations() -> Vec<Relation<Self>> {
        Vec::new()
    }
}

/// A Rust type usable as the key of a keyed collection.
pub trait KeyType: FromValue + Eq + Hash + Debug + 'static {
    /// Column types a key of this type may be read from.
    const COLUMN_TYPES: &'static [ColumnType];
}

impl KeyType for i64 {
    const COLUMN_TYPES: &'static [ColumnType] = &[ColumnType::Integer, ColumnType::Enum];
}

impl KeyType for i32 {
    const COLUMN_TYPES: &'static [ColumnType] = &[ColumnType::Integer, ColumnType::Enum];
}

impl KeyType for u32 {
    const COLUMN_TYPES: &'static [ColumnType] = &[ColumnType::Integer, ColumnType::Enum];
}

impl KeyType for String {
    const COLUMN_TYPES: &'static [ColumnType] = &[ColumnType::Text];
}

/// Reads a declared column from `entity`.
///
/// A declared column the entity does not expose through [`Entity::get`] is
/// a schema error, not a silent `NULL`.
pub(crate) fn column_value<T: Entity>(
    entity: &T,
    meta: &EntityMetadata,
    column: &ColumnMetadata,
) -> Result<Value> {
    entity.get(&column.property).ok_or_else(|| {
        ModelError::Schema(format!(
            "{}.{} is declared but not exposed",
            meta.type_name, column.property
        ))
    })
}
