//! Metadata registry: validates declared schemas and caches the result.
//!
//! [`describe`] is the single entry point used by the rest of the crate. It
//! derives [`EntityMetadata`] on first use per type and serves the cached
//! copy afterwards. Derivation is deterministic, so the cache never needs
//! invalidation.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::entity::{Entity, KeyType};
use crate::error::{ModelError, Result};
use crate::metadata::{
    ColumnMetadata, ColumnType, EntityMetadata, EntityRef, ForeignKeyConstraint,
    RelationshipDescriptor, TableSchema,
};

type Cache = RwLock<HashMap<TypeId, Arc<EntityMetadata>>>;

fn cache() -> &'static Cache {
    static CACHE: OnceLock<Cache> = OnceLock::new();
    CACHE.get_or_init(Cache::default)
}

/// Returns the validated metadata for `T`, deriving it on first use.
///
/// # Errors
///
/// Returns [`ModelError::Schema`] if the declaration is invalid; see
/// [`build_metadata`].
pub fn describe<T: Entity>() -> Result<Arc<EntityMetadata>> {
    let key = TypeId::of::<T>();
    if let Some(meta) = cache()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return Ok(Arc::clone(meta));
    }

    let relationships = T::relations()
        .iter()
        .map(|relation| relation.descriptor().clone())
        .collect();
    let meta = Arc::new(build_metadata(
        std::any::type_name::<T>(),
        T::schema(),
        relationships,
    )?);

    let mut guard = cache().write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(guard.entry(key).or_insert(meta)))
}

/// Database name of `T`'s single primary key, checked against the key type.
///
/// # Errors
///
/// Returns [`ModelError::Schema`] if `T` does not have exactly one primary
/// key, or if its column type cannot be read as `K`.
pub fn key_column<K: KeyType, T: Entity>() -> Result<String> {
    let meta = describe::<T>()?;
    let key = meta.single_primary_key()?;
    if !K::COLUMN_TYPES.contains(&key.column_type) {
        return Err(ModelError::Schema(format!(
            "primary key type mismatch on {}: {:?} != {}",
            meta.type_name,
            key.column_type,
            std::any::type_name::<K>()
        )));
    }
    Ok(key.name().to_string())
}

/// Validates a declared schema and produces its metadata, without caching.
///
/// # Errors
///
/// Returns [`ModelError::Schema`] when:
/// - the table name is empty,
/// - two columns share a database name,
/// - more than one identity column is declared, or the identity is not an
///   integer,
/// - `AUTOINCREMENT` is declared on anything but an integer primary key,
/// - `AUTOINCREMENT` is declared inside a composite primary key,
/// - a unique group is empty or names an unknown column,
/// - a foreign key, relationship target or join type cannot itself be
///   described, or a foreign key names a column the referenced type does
///   not declare.
pub fn build_metadata(
    type_name: &'static str,
    schema: TableSchema,
    relationships: Vec<RelationshipDescriptor>,
) -> Result<EntityMetadata> {
    build(type_name, schema, relationships, true)
}

fn build(
    type_name: &'static str,
    schema: TableSchema,
    relationships: Vec<RelationshipDescriptor>,
    check_references: bool,
) -> Result<EntityMetadata> {
    let TableSchema {
        table,
        columns: declared,
        unique_groups,
    } = schema;

    if table.trim().is_empty() {
        return Err(ModelError::Schema(format!(
            "{type_name} has no table designation"
        )));
    }

    let composite_key = declared.iter().filter(|c| c.primary_key).count() > 1;
    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(declared.len());
    let mut foreign_keys = Vec::new();

    for column in declared {
        let name = column.name().to_string();
        if !seen.insert(name.clone()) {
            return Err(ModelError::Schema(format!(
                "{type_name} declares column '{name}' more than once"
            )));
        }
        if column.autoincrement
            && !(column.primary_key && column.column_type == ColumnType::Integer)
        {
            return Err(ModelError::Schema(format!(
                "{type_name}.{name}: AUTOINCREMENT requires an integer primary key"
            )));
        }
        if column.autoincrement && composite_key {
            return Err(ModelError::Schema(format!(
                "{type_name}.{name}: AUTOINCREMENT is not allowed in a composite primary key"
            )));
        }

        if let Some(fk) = &column.foreign_key {
            if check_references {
                check_describable(&fk.referenced)?;
            }
            let referenced_schema = fk.referenced.schema();
            let referenced_table = fk.referenced.table_name()?;
            if !referenced_schema
                .columns()
                .iter()
                .any(|c| c.name() == fk.column)
            {
                return Err(ModelError::Schema(format!(
                    "{type_name}.{name} references {}.{} which is not declared",
                    referenced_table, fk.column
                )));
            }
            foreign_keys.push(ForeignKeyConstraint {
                column: name.clone(),
                referenced: fk.referenced,
                referenced_table,
                referenced_column: fk.column.clone(),
                on_update: column.on_update,
                on_delete: column.on_delete,
            });
        }

        columns.push(ColumnMetadata {
            property: column.property,
            db_name: column.db_name,
            column_type: column.column_type,
            identity: column.identity,
            primary_key: column.primary_key,
            unique: column.unique,
            nullable: column.nullable,
            autoincrement: column.autoincrement,
            sort: column.sort,
        });
    }

    let identities: Vec<&ColumnMetadata> = columns.iter().filter(|c| c.identity).collect();
    if identities.len() > 1 {
        return Err(ModelError::Schema(format!(
            "{type_name} declares {} identity columns, at most one is allowed",
            identities.len()
        )));
    }
    if let Some(identity) = identities.first() {
        if identity.column_type != ColumnType::Integer {
            return Err(ModelError::Schema(format!(
                "{type_name}.{}: identity column must be an integer",
                identity.name()
            )));
        }
    }

    for group in &unique_groups {
        if group.columns.is_empty() {
            return Err(ModelError::Schema(format!(
                "{type_name} declares an empty unique group"
            )));
        }
        if let Some(unknown) = group.columns.iter().find(|c| !seen.contains(c.as_str())) {
            return Err(ModelError::Schema(format!(
                "{type_name} unique group names unknown column '{unknown}'"
            )));
        }
    }

    if check_references {
        for relationship in &relationships {
            check_describable(&relationship.target)?;
            if let Some(join) = &relationship.join {
                check_describable(join)?;
            }
        }
    }

    Ok(EntityMetadata {
        type_name,
        table,
        columns,
        foreign_keys,
        unique_groups,
        relationships,
    })
}

/// Validates a referenced type's own schema, one level deep so that cyclic
/// references terminate.
fn check_describable(entity: &EntityRef) -> Result<()> {
    build(entity.type_name(), entity.schema(), Vec::new(), false)
        .map(|_| ())
        .map_err(|err| match err {
            ModelError::Schema(reason) => ModelError::Schema(format!(
                "referenced type {} cannot be described: {reason}",
                entity.type_name()
            )),
            other => other,
        })
}
