//! Statement execution on a single SQLite connection.

use std::time::Instant;

use rusqlite::types::{FromSql, Value, ValueRef};
use rusqlite::{Connection, ErrorCode, params_from_iter};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::bulk::BulkStatement;
use super::native::NativeQuery;
use super::param::Param;
use super::predicate::eq;
use super::render::RenderedSql;
use super::select::{Hints, Order, Select};
use crate::entity::{Entity, Relation};
use crate::error::{QueryError, Result, StoreError};

/// One row of a scalar projection
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn get<T: FromSql>(&self, idx: usize) -> std::result::Result<T, QueryError> {
        let value = self.values.get(idx).ok_or_else(|| QueryError::Projection {
            column: idx.to_string(),
            message: format!("row has only {} columns", self.values.len()),
        })?;
        T::column_result(ValueRef::from(value)).map_err(|e| QueryError::Projection {
            column: idx.to_string(),
            message: e.to_string(),
        })
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Installs the statement hints on the connection and removes them on drop
struct HintGuard<'c> {
    conn: &'c Connection,
    hints: Hints,
}

impl<'c> HintGuard<'c> {
    fn install(conn: &'c Connection, hints: Hints) -> Result<Self> {
        let mut guard = HintGuard {
            conn,
            hints: Hints::default(),
        };
        if let Some(timeout) = hints.timeout {
            let deadline = Instant::now() + timeout;
            conn.progress_handler(1000, Some(move || Instant::now() >= deadline));
            guard.hints.timeout = Some(timeout);
        }
        if hints.read_only {
            conn.pragma_update(None, "query_only", true)?;
            guard.hints.read_only = true;
        }
        Ok(guard)
    }

    fn map_err(&self, err: rusqlite::Error) -> StoreError {
        match (&err, self.hints.timeout) {
            (rusqlite::Error::SqliteFailure(e, _), Some(timeout))
                if e.code == ErrorCode::OperationInterrupted =>
            {
                QueryError::Timeout(timeout.as_millis()).into()
            }
            _ => StoreError::Sqlite(err),
        }
    }
}

impl Drop for HintGuard<'_> {
    fn drop(&mut self) {
        if self.hints.timeout.is_some() {
            self.conn.progress_handler(0, None::<fn() -> bool>);
        }
        if self.hints.read_only {
            if let Err(e) = self.conn.pragma_update(None, "query_only", false) {
                debug!("Failed to reset query_only: {}", e);
            }
        }
    }
}

fn log_statement(rendered: &RenderedSql) {
    debug!("Executing: {} with {} parameters", rendered.sql, rendered.values.len());
}

pub(crate) fn list<E: Entity>(conn: &Connection, query: &Select) -> Result<Vec<E>> {
    let rendered = query.render()?;
    match rendered.entity {
        None => return Err(QueryError::ScalarProjection.into()),
        Some(meta) if !meta.same_as(E::meta()) => {
            return Err(QueryError::WrongEntity {
                projected: meta.name,
                requested: E::meta().name,
            }
            .into());
        }
        Some(_) => {}
    }
    log_statement(&rendered.sql);

    let guard = HintGuard::install(conn, query.hints())?;
    let run = || -> rusqlite::Result<Vec<E>> {
        let mut stmt = conn.prepare(&rendered.sql.sql)?;
        let rows = stmt.query_map(params_from_iter(rendered.sql.values.iter()), |row| {
            E::from_row(row, 0)
        })?;
        rows.collect()
    };
    run().map_err(|e| guard.map_err(e))
}

pub(crate) fn rows(conn: &Connection, query: &Select) -> Result<Vec<Row>> {
    let rendered = query.render()?;
    log_statement(&rendered.sql);

    let guard = HintGuard::install(conn, query.hints())?;
    let run = || -> rusqlite::Result<Vec<Row>> {
        let mut stmt = conn.prepare(&rendered.sql.sql)?;
        let width = stmt.column_count();
        let rows = stmt.query_map(params_from_iter(rendered.sql.values.iter()), |row| {
            let values = (0..width)
                .map(|idx| row.get::<_, Value>(idx))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(Row { values })
        })?;
        rows.collect()
    };
    run().map_err(|e| guard.map_err(e))
}

/// First column of the first row, `None` for an empty result or NULL
pub(crate) fn scalar<T: FromSql>(conn: &Connection, query: &Select) -> Result<Option<T>> {
    let rows = rows(conn, query)?;
    match rows.first() {
        None => Ok(None),
        Some(row) => Ok(row.get::<Option<T>>(0)?),
    }
}

pub(crate) fn bulk(conn: &Connection, statement: &impl BulkStatement) -> Result<usize> {
    let rendered = statement.render()?;
    log_statement(&rendered);
    let affected = conn.execute(&rendered.sql, params_from_iter(rendered.values.iter()))?;
    debug!("{} rows of {} affected", affected, statement.entity().name);
    Ok(affected)
}

pub(crate) fn native<T: DeserializeOwned>(conn: &Connection, query: &NativeQuery) -> Result<Vec<T>> {
    debug!("Executing native: {}", query.sql());
    let guard = HintGuard::install(conn, query.hints())?;

    let mut stmt = conn.prepare(query.sql()).map_err(|e| guard.map_err(e))?;
    for (name, value) in query.bindings() {
        let idx = stmt
            .parameter_index(&format!(":{name}"))?
            .ok_or_else(|| QueryError::UnusedBinding(format!(":{name}")))?;
        stmt.raw_bind_parameter(idx, value)?;
    }
    for idx in 1..=stmt.parameter_count() {
        match stmt.parameter_name(idx) {
            Some(name) if query.bindings().iter().any(|(n, _)| &name[1..] == n.as_str()) => {}
            Some(name) => return Err(QueryError::Unbound(name.to_string()).into()),
            None => return Err(QueryError::Unbound(format!("?{idx}")).into()),
        }
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut results = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next().map_err(|e| guard.map_err(e))? {
        let json = query.row_to_json(&columns, row)?;
        results.push(serde_json::from_value(json)?);
    }
    Ok(results)
}

pub(crate) fn find<E: Entity>(conn: &Connection, id: i64) -> Result<Option<E>> {
    let meta = E::meta();
    let query = Select::from_meta(meta, "e").filter(eq(meta.id, Param::value(id)));
    Ok(list::<E>(conn, &query)?.into_iter().next())
}

/// Related entities of one owner, in identity order
pub(crate) fn load_collection<T: Entity>(
    conn: &Connection,
    relation: &'static Relation,
    owner_id: i64,
) -> Result<Vec<T>> {
    if !relation.target.same_as(T::meta()) {
        return Err(QueryError::WrongEntity {
            projected: relation.target.name,
            requested: T::meta().name,
        }
        .into());
    }
    let query = Select::from_meta(relation.target, "c")
        .filter(eq(relation.foreign_key, Param::value(owner_id)))
        .order_by(relation.target.id, Order::Asc);
    list::<T>(conn, &query)
}

pub(crate) fn insert<E: Entity>(conn: &Connection, entity: &E) -> Result<i64> {
    let meta = E::meta();
    let placeholders = vec!["?"; meta.fields.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        meta.table,
        meta.fields.join(", "),
        placeholders
    );
    debug!("Executing: {}", sql);
    conn.execute(&sql, params_from_iter(entity.field_values().iter()))?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn update_entity<E: Entity>(conn: &Connection, id: i64, entity: &E) -> Result<bool> {
    let meta = E::meta();
    let assignments: Vec<String> = meta.fields.iter().map(|f| format!("{f} = ?")).collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        meta.table,
        assignments.join(", "),
        meta.id
    );
    debug!("Executing: {}", sql);
    let mut values = entity.field_values();
    values.push(Value::Integer(id));
    Ok(conn.execute(&sql, params_from_iter(values.iter()))? == 1)
}

pub(crate) fn remove<E: Entity>(conn: &Connection, id: i64) -> Result<bool> {
    let meta = E::meta();
    let sql = format!("DELETE FROM {} WHERE {} = ?", meta.table, meta.id);
    debug!("Executing: {}", sql);
    Ok(conn.execute(&sql, [id])? == 1)
}
