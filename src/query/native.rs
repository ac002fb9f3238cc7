//! Native SQL projections mapped onto ad-hoc result shapes.
//!
//! The statement text is a `&'static str`, so it is fixed at compile time and
//! caller input can only arrive through `:name` parameters. Each result row
//! becomes a JSON object keyed by column alias and is deserialized into the
//! requested type.

use std::time::Duration;

use rusqlite::Row;
use rusqlite::types::{FromSql, ValueRef};
use serde_json::{Map, Number, Value as Json};

use super::param::IntoValue;
use super::select::Hints;
use crate::error::QueryError;

/// Declared type of a projected column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Text,
    Integer,
    Real,
    Boolean,
}

#[derive(Debug, Clone)]
pub struct NativeQuery {
    sql: &'static str,
    scalars: Vec<(&'static str, ScalarType)>,
    bindings: Vec<(String, rusqlite::types::Value)>,
    hints: Hints,
}

impl NativeQuery {
    pub fn new(sql: &'static str) -> Self {
        NativeQuery {
            sql,
            scalars: Vec::new(),
            bindings: Vec::new(),
            hints: Hints::default(),
        }
    }

    /// Declare a projected column. When any scalar is declared only the
    /// declared columns are mapped, converted to the declared type.
    pub fn scalar(mut self, alias: &'static str, scalar_type: ScalarType) -> Self {
        self.scalars.push((alias, scalar_type));
        self
    }

    /// Bind `:name` in the statement
    pub fn bind(mut self, name: &str, value: impl IntoValue) -> Self {
        let name = name.trim_start_matches(':').to_string();
        self.bindings.retain(|(existing, _)| *existing != name);
        self.bindings.push((name, value.into_value()));
        self
    }

    /// Interrupt the statement once it has run for `timeout`
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.hints.timeout = Some(timeout);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.hints.read_only = read_only;
        self
    }

    pub fn sql(&self) -> &'static str {
        self.sql
    }

    pub fn hints(&self) -> Hints {
        self.hints
    }

    pub(crate) fn bindings(&self) -> &[(String, rusqlite::types::Value)] {
        &self.bindings
    }

    /// Convert one result row into a JSON object
    pub(crate) fn row_to_json(&self, columns: &[String], row: &Row<'_>) -> Result<Json, QueryError> {
        let mut object = Map::new();
        if self.scalars.is_empty() {
            for (idx, name) in columns.iter().enumerate() {
                let value = row.get_ref(idx).map_err(|e| projection_error(name, e))?;
                object.insert(name.clone(), natural_json(name, value)?);
            }
        } else {
            for (alias, scalar_type) in &self.scalars {
                let idx = columns
                    .iter()
                    .position(|c| c == alias)
                    .ok_or_else(|| QueryError::Projection {
                        column: alias.to_string(),
                        message: "not present in the result".to_string(),
                    })?;
                let value = row.get_ref(idx).map_err(|e| projection_error(alias, e))?;
                object.insert(alias.to_string(), typed_json(alias, value, *scalar_type)?);
            }
        }
        Ok(Json::Object(object))
    }
}

fn projection_error(column: &str, err: impl std::fmt::Display) -> QueryError {
    QueryError::Projection {
        column: column.to_string(),
        message: err.to_string(),
    }
}

fn natural_json(column: &str, value: ValueRef<'_>) -> Result<Json, QueryError> {
    match value {
        ValueRef::Null => Ok(Json::Null),
        ValueRef::Integer(i) => Ok(Json::from(i)),
        ValueRef::Real(f) => Ok(Number::from_f64(f).map_or(Json::Null, Json::Number)),
        ValueRef::Text(bytes) => Ok(Json::String(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Blob(_) => Err(projection_error(column, "blob columns cannot be projected")),
    }
}

fn typed_json(column: &str, value: ValueRef<'_>, scalar_type: ScalarType) -> Result<Json, QueryError> {
    if let ValueRef::Null = value {
        return Ok(Json::Null);
    }
    let converted = match scalar_type {
        ScalarType::Text => String::column_result(value).map(Json::String),
        ScalarType::Integer => i64::column_result(value).map(Json::from),
        ScalarType::Real => {
            f64::column_result(value).map(|f| Number::from_f64(f).map_or(Json::Null, Json::Number))
        }
        ScalarType::Boolean => bool::column_result(value).map(Json::Bool),
    };
    converted.map_err(|e| projection_error(column, e))
}
