//! SQL statement generation from entity metadata.
//!
//! Every builder is a pure function: it reads [`EntityMetadata`] from the
//! registry and the entity's current values, and returns a [`Statement`]
//! (SQL text plus named parameters). Nothing here touches a database.
//!
//! Placeholders are spelled `@_<column><ordinal>`. The ordinal increases
//! with every parameter generated for a statement, so two columns can never
//! collide even when their sanitized names do.
//!
//! # Example
//!
//! ```
//! use sqlentity_core::{Column, Entity, Result, TableSchema, Value, query};
//!
//! #[derive(Default)]
//! struct Note {
//!     id: i64,
//!     body: String,
//! }
//!
//! impl Entity for Note {
//!     fn schema() -> TableSchema {
//!         TableSchema::new("notes")
//!             .column(Column::id("id"))
//!             .column(Column::text("body"))
//!     }
//!     fn blank() -> Option<Self> {
//!         Some(Self::default())
//!     }
//!     fn get(&self, property: &str) -> Option<Value> {
//!         match property {
//!             "id" => Some(self.id.into()),
//!             "body" => Some(self.body.as_str().into()),
//!             _ => None,
//!         }
//!     }
//!     fn set(&mut self, property: &str, value: Value) -> Result<()> {
//!         match property {
//!             "id" => self.id = value.decode()?,
//!             "body" => self.body = value.decode()?,
//!             _ => {}
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let note = Note { id: 0, body: "hello".into() };
//! let insert = query::insert(&note).unwrap();
//! assert_eq!(insert.sql, "INSERT INTO notes (body) VALUES (@_body0)");
//! ```

use crate::entity::{Entity, column_value};
use crate::error::{ModelError, Result};
use crate::metadata::{EntityMetadata, SortOrder};
use crate::registry::describe;
use crate::value::{Params, Value};

/// Scalar query returning the rowid of the last insert on a connection.
pub const LAST_INSERT_ID: &str = "SELECT last_insert_rowid()";

/// Pragma enabling foreign key enforcement on a connection.
pub const ENABLE_FOREIGN_KEYS: &str = "PRAGMA foreign_keys = ON";

/// Placeholder used by identity lookups and relationship queries.
pub const IDENTITY_PARAM: &str = "@identity";

/// SQL text with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Named parameters referenced by `sql`.
    pub params: Params,
}

impl Statement {
    /// A statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Params::new(),
        }
    }
}

/// Generates unique placeholders within one statement.
#[derive(Debug, Default)]
struct Placeholders {
    next: usize,
}

impl Placeholders {
    fn next(&mut self, column: &str) -> String {
        let sanitized: String = column
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        let placeholder = format!("@_{sanitized}{}", self.next);
        self.next += 1;
        placeholder
    }
}

/// `CREATE TABLE` statement for `T`.
///
/// # Errors
///
/// Returns [`ModelError::Schema`] if `T`'s metadata is invalid.
pub fn create_table<T: Entity>() -> Result<String> {
    let meta = describe::<T>()?;
    Ok(create_table_sql(&meta))
}

/// `CREATE TABLE` statement for already-described metadata.
///
/// Per column, the primary key text comes first, followed by its sort order
/// and `AUTOINCREMENT`; `NOT NULL` is left off autoincrement columns; a
/// single-column `UNIQUE` closes the definition. Composite primary keys are
/// emitted as one table constraint. Foreign keys and unique groups follow
/// the columns, in declaration order.
pub fn create_table_sql(meta: &EntityMetadata) -> String {
    let composite_key = meta.primary_keys().count() > 1;
    let mut definitions = Vec::with_capacity(meta.columns.len());

    for column in &meta.columns {
        let mut parts = vec![column.name(), column.column_type.sql_type()];
        if column.primary_key && !composite_key {
            parts.push("PRIMARY KEY");
            match column.sort {
                SortOrder::Asc => parts.push("ASC"),
                SortOrder::Desc => parts.push("DESC"),
                SortOrder::Unspecified => {}
            }
            if column.autoincrement {
                parts.push("AUTOINCREMENT");
            }
        }
        if !column.nullable && !column.autoincrement {
            parts.push("NOT NULL");
        }
        if column.unique {
            parts.push("UNIQUE");
        }
        definitions.push(parts.join(" "));
    }

    if composite_key {
        let keys: Vec<&str> = meta.primary_keys().map(|c| c.name()).collect();
        definitions.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    for fk in &meta.foreign_keys {
        definitions.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({}){}",
            fk.column,
            fk.referenced_table,
            fk.referenced_column,
            fk.end_clause()
        ));
    }

    for group in &meta.unique_groups {
        definitions.push(format!(
            "UNIQUE ({}) ON CONFLICT {}",
            group.columns.join(", "),
            group.policy
        ));
    }

    format!("CREATE TABLE {} ({})", meta.table, definitions.join(", "))
}

/// `INSERT INTO` statement for `entity`.
///
/// The identity column is left out while it holds `0` or `NULL`, so the
/// database assigns it. A non-zero identity is written as-is.
///
/// # Errors
///
/// Returns [`ModelError::EmptyColumnSet`] if no column qualifies.
pub fn insert<T: Entity>(entity: &T) -> Result<Statement> {
    build_insert("INSERT", entity)
}

/// `INSERT OR REPLACE INTO` statement for `entity`, with the same column
/// selection as [`insert`].
///
/// # Errors
///
/// Returns [`ModelError::EmptyColumnSet`] if no column qualifies.
pub fn insert_or_replace<T: Entity>(entity: &T) -> Result<Statement> {
    build_insert("INSERT OR REPLACE", entity)
}

fn build_insert<T: Entity>(verb: &str, entity: &T) -> Result<Statement> {
    let meta = describe::<T>()?;
    let mut placeholders = Placeholders::default();
    let mut params = Params::new();
    let mut columns = Vec::new();
    let mut values = Vec::new();

    for column in &meta.columns {
        let value = column_value(entity, &meta, column)?;
        if column.identity && value.is_unassigned_identity() {
            continue;
        }
        let placeholder = placeholders.next(column.name());
        columns.push(column.name());
        values.push(placeholder.clone());
        params.push(placeholder, value);
    }

    if columns.is_empty() {
        return Err(ModelError::EmptyColumnSet {
            table: meta.table.clone(),
        });
    }

    Ok(Statement {
        sql: format!(
            "{verb} INTO {} ({}) VALUES ({})",
            meta.table,
            columns.join(", "),
            values.join(", ")
        ),
        params,
    })
}

/// `UPDATE` statement for `entity`.
///
/// Primary key columns become `AND`-joined predicates appended to the
/// optional caller fragment; every other column lands in the `SET` list.
///
/// # Errors
///
/// Returns [`ModelError::MissingPredicate`] if the combined predicate is
/// empty, or [`ModelError::EmptyColumnSet`] if nothing is left to set.
pub fn update<T: Entity>(entity: &T, where_clause: Option<&str>) -> Result<Statement> {
    let meta = describe::<T>()?;
    let mut placeholders = Placeholders::default();
    let mut params = Params::new();
    let mut predicates = Predicates::new(where_clause);
    let mut assignments = Vec::new();

    for column in &meta.columns {
        let value = column_value(entity, &meta, column)?;
        let placeholder = placeholders.next(column.name());
        if column.primary_key {
            predicates.push(format!("{}={}", column.name(), placeholder));
        } else {
            assignments.push(format!("{}={}", column.name(), placeholder));
        }
        params.push(placeholder, value);
    }

    let predicate = predicates.finish(&meta, "UPDATE")?;
    if assignments.is_empty() {
        return Err(ModelError::EmptyColumnSet {
            table: meta.table.clone(),
        });
    }

    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {}",
            meta.table,
            assignments.join(", "),
            predicate
        ),
        params,
    })
}

/// `DELETE` statement for `entity`; only primary key columns are bound.
///
/// # Errors
///
/// Returns [`ModelError::MissingPredicate`] if the combined predicate is
/// empty.
pub fn delete<T: Entity>(entity: &T, where_clause: Option<&str>) -> Result<Statement> {
    let meta = describe::<T>()?;
    let mut placeholders = Placeholders::default();
    let mut params = Params::new();
    let mut predicates = Predicates::new(where_clause);

    for column in meta.primary_keys() {
        let value = column_value(entity, &meta, column)?;
        let placeholder = placeholders.next(column.name());
        predicates.push(format!("{}={}", column.name(), placeholder));
        params.push(placeholder, value);
    }

    let predicate = predicates.finish(&meta, "DELETE")?;
    Ok(Statement {
        sql: format!("DELETE FROM {} WHERE {}", meta.table, predicate),
        params,
    })
}

/// `SELECT * FROM <table>`, followed by an optional filter or join fragment.
///
/// # Errors
///
/// Returns [`ModelError::Schema`] if `T`'s metadata is invalid.
pub fn select<T: Entity>(filter: Option<&str>) -> Result<String> {
    let meta = describe::<T>()?;
    Ok(select_sql(&meta, filter))
}

/// Metadata-level form of [`select`].
pub fn select_sql(meta: &EntityMetadata, filter: Option<&str>) -> String {
    match filter.map(str::trim).filter(|f| !f.is_empty()) {
        Some(filter) => format!("SELECT * FROM {} {}", meta.table, filter),
        None => format!("SELECT * FROM {}", meta.table),
    }
}

/// Select of a single row by identity, bound to [`IDENTITY_PARAM`].
///
/// # Errors
///
/// Returns [`ModelError::Schema`] if `T` declares no identity column.
pub fn select_by_identity<T: Entity>(identity: impl Into<Value>) -> Result<Statement> {
    let meta = describe::<T>()?;
    let column = meta.identity().ok_or_else(|| {
        ModelError::Schema(format!("{} declares no identity column", meta.type_name))
    })?;
    Ok(Statement {
        sql: select_sql(
            &meta,
            Some(&format!("WHERE {} = {IDENTITY_PARAM}", column.name())),
        ),
        params: Params::single(IDENTITY_PARAM, identity),
    })
}

/// Children of one parent through a direct foreign key.
pub fn select_children(target: &EntityMetadata, foreign_key: &str, value: Value) -> Statement {
    Statement {
        sql: select_sql(
            target,
            Some(&format!("WHERE {foreign_key} = {IDENTITY_PARAM}")),
        ),
        params: Params::single(IDENTITY_PARAM, value),
    }
}

/// Targets of one parent through a join table.
///
/// Only the target's columns are selected so join columns cannot shadow
/// target columns of the same name.
pub fn select_joined(
    target: &EntityMetadata,
    target_identity: &str,
    join: &EntityMetadata,
    join_to_target: &str,
    join_to_parent: &str,
    value: Value,
) -> Statement {
    let t = &target.table;
    let j = &join.table;
    Statement {
        sql: format!(
            "SELECT {t}.* FROM {t} INNER JOIN {j} ON {j}.{join_to_target} = {t}.{target_identity} \
             WHERE {j}.{join_to_parent} = {IDENTITY_PARAM}"
        ),
        params: Params::single(IDENTITY_PARAM, value),
    }
}

/// Accumulates an `AND`-joined predicate behind an optional caller fragment.
struct Predicates {
    text: String,
    caller: bool,
}

impl Predicates {
    fn new(where_clause: Option<&str>) -> Self {
        let text = where_clause
            .map(strip_where_keyword)
            .unwrap_or_default()
            .to_string();
        Self {
            caller: !text.is_empty(),
            text,
        }
    }

    fn push(&mut self, predicate: String) {
        if self.text.is_empty() {
            self.text = predicate;
            return;
        }
        if self.caller {
            self.text = format!("({})", self.text);
            self.caller = false;
        }
        self.text.push_str(" AND ");
        self.text.push_str(&predicate);
    }

    fn finish(self, meta: &EntityMetadata, statement: &'static str) -> Result<String> {
        if self.text.trim().is_empty() {
            return Err(ModelError::MissingPredicate {
                table: meta.table.clone(),
                statement,
            });
        }
        Ok(self.text)
    }
}

fn strip_where_keyword(fragment: &str) -> &str {
    let trimmed = fragment.trim();
    match trimmed.get(..5) {
        Some(head) if head.eq_ignore_ascii_case("where") => {
            let rest = &trimmed[5..];
            if rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == '(') {
                rest.trim_start()
            } else {
                trimmed
            }
        }
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Column, ConflictPolicy, ReferentialAction, TableSchema};
    use crate::registry::build_metadata;
    use crate::test_support::{Author, Book, BookTag, Counter, Keyless};

    fn squash(sql: &str) -> String {
        sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_create_table_column_constraint_order() {
        let schema = TableSchema::new("users")
            .column(Column::id("id"))
            .column(Column::text("name"))
            .column(Column::text("email").nullable().unique());
        let meta = build_metadata("User", schema, Vec::new()).unwrap();
        assert_eq!(
            squash(&create_table_sql(&meta)),
            "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, email TEXT UNIQUE)"
        );
    }

    #[test]
    fn test_create_table_sort_order_precedes_autoincrement() {
        let schema = TableSchema::new("t").column(Column::id("id").descending());
        let meta = build_metadata("T", schema, Vec::new()).unwrap();
        assert_eq!(
            create_table_sql(&meta),
            "CREATE TABLE t (id INTEGER PRIMARY KEY DESC AUTOINCREMENT)"
        );
    }

    #[test]
    fn test_create_table_unique_group_once() {
        let schema = TableSchema::new("t")
            .column(Column::text("a"))
            .column(Column::text("b"))
            .column(Column::text("c"))
            .unique(&["a", "b"], ConflictPolicy::Ignore);
        let meta = build_metadata("T", schema, Vec::new()).unwrap();
        let sql = create_table_sql(&meta);
        assert_eq!(sql.matches("UNIQUE (a, b) ON CONFLICT IGNORE").count(), 1);
        assert!(sql.ends_with("UNIQUE (a, b) ON CONFLICT IGNORE)"));
    }

    #[test]
    fn test_create_table_foreign_keys_before_unique_groups() {
        let sql = create_table::<Book>().unwrap();
        let fk = sql
            .find("FOREIGN KEY (author_id) REFERENCES authors (id) ON DELETE CASCADE")
            .unwrap();
        let unique = sql.find("UNIQUE (author_id, title) ON CONFLICT ABORT").unwrap();
        assert!(fk < unique);
        assert!(sql.contains("published TEXT,") || sql.contains("published TEXT ,"));
    }

    #[test]
    fn test_create_table_both_referential_actions() {
        let schema = TableSchema::new("t").column(
            Column::integer("author")
                .references::<Author>("id")
                .on_update(ReferentialAction::Cascade)
                .on_delete(ReferentialAction::SetNull)
                .nullable(),
        );
        let meta = build_metadata("T", schema, Vec::new()).unwrap();
        assert!(create_table_sql(&meta).contains(
            "FOREIGN KEY (author) REFERENCES authors (id) ON UPDATE CASCADE ON DELETE SET NULL"
        ));
    }

    #[test]
    fn test_create_table_composite_key_is_table_constraint() {
        let sql = create_table::<BookTag>().unwrap();
        assert!(sql.contains("book_id INTEGER NOT NULL"));
        assert!(sql.contains("PRIMARY KEY (book_id, tag_id)"));
        assert!(!sql.contains("book_id INTEGER PRIMARY KEY"));
    }

    #[test]
    fn test_create_table_blob_fallback_and_bool() {
        let schema = TableSchema::new("t")
            .column(Column::blob("payload"))
            .column(Column::boolean("flag"))
            .column(Column::enumeration("kind"))
            .column(Column::real("score"));
        let meta = build_metadata("T", schema, Vec::new()).unwrap();
        assert_eq!(
            create_table_sql(&meta),
            "CREATE TABLE t (payload BLOB NOT NULL, flag BOOL NOT NULL, kind INTEGER NOT NULL, score REAL NOT NULL)"
        );
    }

    #[test]
    fn test_insert_skips_zero_identity() {
        let author = Author::new(0, "Ursula");
        let stmt = insert(&author).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO authors (name, email) VALUES (@_name0, @_email1)"
        );
        assert_eq!(stmt.params.len(), 2);
        assert!(stmt.params.get("@_id0").is_none());
        assert_eq!(stmt.params.get("@_name0"), Some(&Value::Text("Ursula".into())));
        assert_eq!(stmt.params.get("@_email1"), Some(&Value::Null));
    }

    #[test]
    fn test_insert_keeps_nonzero_identity() {
        let author = Author::new(42, "Ursula");
        let stmt = insert(&author).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO authors (id, name, email) VALUES (@_id0, @_name1, @_email2)"
        );
        assert_eq!(stmt.params.get("@_id0"), Some(&Value::Integer(42)));
    }

    #[test]
    fn test_insert_or_replace_uses_same_columns() {
        let author = Author::new(0, "Ursula");
        let stmt = insert_or_replace(&author).unwrap();
        assert!(stmt.sql.starts_with("INSERT OR REPLACE INTO authors (name, email)"));
    }

    #[test]
    fn test_insert_with_only_unassigned_identity_is_empty() {
        let err = insert(&Counter::default()).unwrap_err();
        assert_eq!(
            err,
            ModelError::EmptyColumnSet {
                table: "counters".into()
            }
        );
    }

    #[test]
    fn test_placeholders_unique_and_sanitized() {
        let mut placeholders = Placeholders::default();
        assert_eq!(placeholders.next("First-Name"), "@_First_Name0");
        assert_eq!(placeholders.next("First_Name"), "@_First_Name1");
    }

    #[test]
    fn test_update_routes_keys_to_where() {
        let author = Author::new(3, "Ursula");
        let stmt = update(&author, None).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE authors SET name=@_name1, email=@_email2 WHERE id=@_id0"
        );
        assert_eq!(stmt.params.len(), 3);
    }

    #[test]
    fn test_update_combines_caller_fragment() {
        let author = Author::new(3, "Ursula");
        let stmt = update(&author, Some("WHERE name = 'a' OR name = 'b'")).unwrap();
        assert!(
            stmt.sql
                .ends_with("WHERE (name = 'a' OR name = 'b') AND id=@_id0")
        );
    }

    #[test]
    fn test_update_without_predicate_rejected() {
        let err = update(&Keyless::new("x"), None).unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingPredicate {
                table: "keyless".into(),
                statement: "UPDATE"
            }
        );
        let err = update(&Keyless::new("x"), Some("   ")).unwrap_err();
        assert!(matches!(err, ModelError::MissingPredicate { .. }));
    }

    #[test]
    fn test_update_keyless_with_fragment() {
        let stmt = update(&Keyless::new("x"), Some("label = 'old'")).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE keyless SET id=@_id0, label=@_label1 WHERE label = 'old'"
        );
    }

    #[test]
    fn test_delete_binds_only_keys() {
        let tag = BookTag::new(1, 2);
        let stmt = delete(&tag, None).unwrap();
        assert_eq!(
            stmt.sql,
            "DELETE FROM book_tags WHERE book_id=@_book_id0 AND tag_id=@_tag_id1"
        );
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_delete_without_predicate_rejected() {
        let err = delete(&Keyless::new("x"), None).unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingPredicate {
                table: "keyless".into(),
                statement: "DELETE"
            }
        );
    }

    #[test]
    fn test_select_with_and_without_filter() {
        assert_eq!(select::<Author>(None).unwrap(), "SELECT * FROM authors");
        assert_eq!(
            select::<Author>(Some(" WHERE name = @n ")).unwrap(),
            "SELECT * FROM authors WHERE name = @n"
        );
        assert_eq!(select::<Author>(Some("")).unwrap(), "SELECT * FROM authors");
    }

    #[test]
    fn test_select_by_identity() {
        let stmt = select_by_identity::<Author>(9_i64).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM authors WHERE id = @identity");
        assert_eq!(stmt.params.get(IDENTITY_PARAM), Some(&Value::Integer(9)));
        assert!(select_by_identity::<BookTag>(1_i64).is_err());
    }

    #[test]
    fn test_strip_where_keyword() {
        assert_eq!(strip_where_keyword("  WHERE a = 1"), "a = 1");
        assert_eq!(strip_where_keyword("where a = 1"), "a = 1");
        assert_eq!(strip_where_keyword("whereabouts = 1"), "whereabouts = 1");
        assert_eq!(strip_where_keyword("a = 1"), "a = 1");
        assert_eq!(strip_where_keyword("WHERE\ta = 1"), "a = 1");
        assert_eq!(strip_where_keyword("Where\n  a = 1"), "a = 1");
        assert_eq!(strip_where_keyword("WHERE(a = 1)"), "(a = 1)");
        assert_eq!(strip_where_keyword("WHERE"), "");
    }

    #[test]
    fn test_update_fragment_with_parenthesised_where() {
        let author = Author::new(3, "Ann");
        let statement = update(&author, Some("WHERE(name = 'x')")).unwrap();
        assert!(statement.sql.ends_with("WHERE ((name = 'x')) AND id=@_id0"));
        assert_eq!(statement.sql.matches("WHERE").count(), 1);
    }
}
