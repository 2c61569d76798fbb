//! Row to entity mapping.
//!
//! Rows coming back from the execution layer are mapped onto a blank
//! instance of the entity, column by column. Timestamp columns stored as
//! text are parsed here, and integer booleans are widened, so that entity
//! setters only ever see the value kind they declared.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::entity::{Entity, KeyType};
use crate::error::{ModelError, Result};
use crate::metadata::{ColumnMetadata, ColumnType};
use crate::registry::describe;
use crate::value::{Row, Value, parse_timestamp};

/// Maps one row onto a fresh instance of `T`.
///
/// Each row column is matched to a declared column by database name; a
/// column with no declaration is offered to the entity under its own name.
///
/// # Errors
///
/// - [`ModelError::Construction`] if `T` has no blank instance.
/// - [`ModelError::Mapping`] if a value cannot be assigned, including a
///   non-nullable timestamp column holding unparsable text.
pub fn row_to_entity<T: Entity>(row: &Row) -> Result<T> {
    let meta = describe::<T>()?;
    let mut entity = T::blank().ok_or(ModelError::Construction(meta.type_name))?;

    for (name, value) in row.iter() {
        let (property, value) = match meta.column(name) {
            Some(column) => match coerce(column, value.clone())? {
                Some(value) => (column.property.as_str(), value),
                None => continue,
            },
            None => (name, value.clone()),
        };
        entity
            .set(property, value)
            .map_err(|err| err.in_column(name))?;
    }

    Ok(entity)
}

/// Maps every row onto `T`, stopping at the first failure.
///
/// # Errors
///
/// See [`row_to_entity`].
pub fn rows_to_entities<T: Entity>(rows: &[Row]) -> Result<Vec<T>> {
    rows.iter().map(row_to_entity).collect()
}

/// Maps a row onto `T` and pulls the raw value of `key_column` out as `K`.
///
/// # Errors
///
/// [`ModelError::Mapping`] if the key column is missing from the row or
/// cannot be read as `K`, plus everything [`row_to_entity`] raises.
pub fn row_to_keyed_pair<K: KeyType, T: Entity>(row: &Row, key_column: &str) -> Result<(K, T)> {
    let raw = row.get(key_column).ok_or_else(|| ModelError::Mapping {
        column: key_column.to_string(),
        reason: "key column missing from row".to_string(),
    })?;
    let key = K::from_value(raw.clone()).map_err(|err| err.in_column(key_column))?;
    Ok((key, row_to_entity(row)?))
}

/// Builds a keyed collection from `rows`.
///
/// # Errors
///
/// [`ModelError::Mapping`] when two rows carry the same key, plus
/// everything [`row_to_keyed_pair`] raises.
pub fn rows_to_keyed<K: KeyType, T: Entity>(rows: &[Row], key_column: &str) -> Result<HashMap<K, T>> {
    let mut keyed = HashMap::with_capacity(rows.len());
    for row in rows {
        let (key, entity) = row_to_keyed_pair::<K, T>(row, key_column)?;
        match keyed.entry(key) {
            Entry::Occupied(entry) => {
                return Err(ModelError::Mapping {
                    column: key_column.to_string(),
                    reason: format!("duplicate key {:?}", entry.key()),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(entity);
            }
        }
    }
    Ok(keyed)
}

/// Converts a stored value into the shape its column declares.
///
/// `None` means "leave the field unset".
fn coerce(column: &ColumnMetadata, value: Value) -> Result<Option<Value>> {
    match (column.column_type, value) {
        (ColumnType::Timestamp, Value::Text(text)) => match parse_timestamp(&text) {
            Some(ts) => Ok(Some(Value::Timestamp(ts))),
            None if column.nullable => Ok(None),
            None => Err(ModelError::Mapping {
                column: column.name().to_string(),
                reason: format!("'{text}' is not a timestamp"),
            }),
        },
        (ColumnType::Boolean, Value::Integer(v)) => Ok(Some(Value::Bool(v != 0))),
        (_, value) => Ok(Some(value)),
    }
}
