//! Statement execution over rusqlite.
//!
//! [`Executor`] is the seam between generated statements and a database.
//! It is implemented for [`Connection`] and [`Transaction`]; tests and
//! callers may provide their own implementation (a recording fake, another
//! driver) without touching the rest of the crate.

use rusqlite::types::{ToSqlOutput, Value as SqlValueOwned, ValueRef};
use rusqlite::{Connection, ToSql, Transaction};
use sqlentity_core::{Params, Row, Value, format_timestamp};
use tracing::debug;

use crate::error::{Result, SqliteError};

/// Parameterized statement execution and row iteration.
///
/// Methods take `&mut self`: one operation is in flight per executor.
pub trait Executor {
    /// Runs a statement and returns the number of rows it changed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::DatabaseError`] on any driver failure.
    fn execute(&mut self, sql: &str, params: &Params) -> Result<usize>;

    /// Runs a query and returns the first column of its first row.
    ///
    /// Used to read back a just-inserted identity.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::DatabaseError`] if the query fails or returns
    /// no row.
    fn execute_scalar(&mut self, sql: &str) -> Result<Value>;

    /// Runs a query and returns every row, columns in select order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::DatabaseError`] on any driver failure, or
    /// [`SqliteError::UnsupportedValue`] for text that is not UTF-8.
    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>>;
}

impl Executor for Connection {
    fn execute(&mut self, sql: &str, params: &Params) -> Result<usize> {
        execute_on(self, sql, params)
    }

    fn execute_scalar(&mut self, sql: &str) -> Result<Value> {
        scalar_on(self, sql)
    }

    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        query_on(self, sql, params)
    }
}

impl Executor for Transaction<'_> {
    fn execute(&mut self, sql: &str, params: &Params) -> Result<usize> {
        execute_on(self, sql, params)
    }

    fn execute_scalar(&mut self, sql: &str) -> Result<Value> {
        scalar_on(self, sql)
    }

    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        query_on(self, sql, params)
    }
}

/// Borrowing [`ToSql`] adapter for [`Value`].
struct SqlValue<'a>(&'a Value);

impl ToSql for SqlValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(SqlValueOwned::Null),
            Value::Integer(v) => ToSqlOutput::Owned(SqlValueOwned::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Owned(SqlValueOwned::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Bool(v) => ToSqlOutput::Owned(SqlValueOwned::Integer(i64::from(*v))),
            Value::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            Value::Timestamp(ts) => ToSqlOutput::Owned(SqlValueOwned::Text(format_timestamp(ts))),
        })
    }
}

fn execute_on(conn: &Connection, sql: &str, params: &Params) -> Result<usize> {
    debug!(sql, params = params.len(), "executing statement");
    let values = sql_values(params);
    let named = named_params(&values);
    let mut stmt = conn.prepare(sql)?;
    Ok(stmt.execute(named.as_slice())?)
}

fn scalar_on(conn: &Connection, sql: &str) -> Result<Value> {
    debug!(sql, "executing scalar query");
    conn.query_row(sql, [], |row| Ok(read_value(row.get_ref(0)?, "0")))?
}

fn query_on(conn: &Connection, sql: &str, params: &Params) -> Result<Vec<Row>> {
    debug!(sql, params = params.len(), "executing query");
    let values = sql_values(params);
    let named = named_params(&values);
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(named.as_slice())?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut mapped = Row::new();
        for (idx, column) in columns.iter().enumerate() {
            mapped.push(column.clone(), read_value(row.get_ref(idx)?, column)?);
        }
        result.push(mapped);
    }
    debug!(sql, rows = result.len(), "query returned");
    Ok(result)
}

fn sql_values(params: &Params) -> Vec<(&str, SqlValue<'_>)> {
    params
        .iter()
        .map(|(name, value)| (name, SqlValue(value)))
        .collect()
}

fn named_params<'a>(values: &'a [(&'a str, SqlValue<'a>)]) -> Vec<(&'a str, &'a dyn ToSql)> {
    values
        .iter()
        .map(|(name, value)| (*name, value as &dyn ToSql))
        .collect()
}

/// Converts a stored value; timestamps stay text until the mapper sees
/// their declared column type.
fn read_value(value: ValueRef<'_>, column: &str) -> Result<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Value::Text(text.to_string()),
            Err(_) => return Err(SqliteError::UnsupportedValue(column.to_string())),
        },
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, at TEXT, flag BOOL, data BLOB)")
            .unwrap();
        conn
    }

    #[test]
    fn test_execute_binds_named_params() {
        let mut conn = conn();
        let mut params = Params::new();
        params.push("@_name0", "ada");
        params.push("@_flag1", true);
        let changed = Executor::execute(&mut conn, "INSERT INTO t (name, flag) VALUES (@_name0, @_flag1)", &params)
            .unwrap();
        assert_eq!(changed, 1);

        let rows = conn.query("SELECT name, flag FROM t", &Params::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::Text("ada".into())));
        assert_eq!(rows[0].get("flag"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_scalar_reads_last_insert_id() {
        let mut conn = conn();
        Executor::execute(&mut conn, "INSERT INTO t (name) VALUES ('a')", &Params::new())
            .unwrap();
        Executor::execute(&mut conn, "INSERT INTO t (name) VALUES ('b')", &Params::new())
            .unwrap();
        assert_eq!(
            conn.execute_scalar("SELECT last_insert_rowid()").unwrap(),
            Value::Integer(2)
        );
    }

    #[test]
    fn test_timestamp_and_blob_round_trip_as_stored() {
        let mut conn = conn();
        let ts = NaiveDate::from_ymd_opt(2023, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        let mut params = Params::new();
        params.push("@at", ts);
        params.push("@data", vec![1_u8, 2, 3]);
        Executor::execute(&mut conn, "INSERT INTO t (at, data) VALUES (@at, @data)", &params)
            .unwrap();

        let rows = conn.query("SELECT at, data FROM t", &Params::new()).unwrap();
        assert_eq!(rows[0].get("at"), Some(&Value::Text("2023-05-06 07:08:09".into())));
        assert_eq!(rows[0].get("data"), Some(&Value::Blob(vec![1, 2, 3])));
    }

    #[test]
    fn test_query_keeps_select_order_and_nulls() {
        let mut conn = conn();
        Executor::execute(&mut conn, "INSERT INTO t (name) VALUES ('x')", &Params::new())
            .unwrap();
        let rows = conn
            .query("SELECT name, at, id FROM t", &Params::new())
            .unwrap();
        let columns: Vec<_> = rows[0].iter().map(|(name, _)| name).collect();
        assert_eq!(columns, ["name", "at", "id"]);
        assert_eq!(rows[0].get("at"), Some(&Value::Null));
    }

    #[test]
    fn test_scalar_without_row_is_database_error() {
        let mut conn = conn();
        let err = conn.execute_scalar("SELECT id FROM t").unwrap_err();
        assert!(matches!(err, SqliteError::DatabaseError(_)));
    }

    #[test]
    fn test_transaction_executor() {
        let mut conn = conn();
        let mut tx = conn.transaction().unwrap();
        Executor::execute(&mut tx, "INSERT INTO t (name) VALUES ('in tx')", &Params::new())
            .unwrap();
        tx.commit().unwrap();
        let rows = conn.query("SELECT name FROM t", &Params::new()).unwrap();
        assert_eq!(rows.len(), 1);
    }
}
