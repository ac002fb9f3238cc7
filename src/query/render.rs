//! SQL text generation shared by the query builders.
//!
//! Caller aliases are mapped to generated table aliases (`t0`, `t1`, ...) and
//! fields are mapped through [`EntityMeta`], so the SQL text only ever holds
//! identifiers from static metadata. Every value becomes a `?` placeholder.

use std::collections::BTreeSet;

use rusqlite::types::Value;

use super::param::{Binding, Bindings, Param, ParamKey};
use super::predicate::{Field, Predicate};
use crate::entity::EntityMeta;
use crate::error::QueryError;

/// SQL statement text and its values, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSql {
    pub sql: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone)]
pub(crate) struct ScopeEntry {
    pub alias: String,
    pub sql_alias: String,
    pub meta: &'static EntityMeta,
}

/// Aliases visible to a statement; the first entry is the root entity
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    entries: Vec<ScopeEntry>,
    qualify: bool,
}

impl Scope {
    /// Scope for SELECT statements: columns are qualified with table aliases
    pub fn qualified(alias: &str, meta: &'static EntityMeta) -> Self {
        Scope {
            entries: vec![ScopeEntry {
                alias: alias.to_string(),
                sql_alias: "t0".to_string(),
                meta,
            }],
            qualify: true,
        }
    }

    /// Scope for single-table UPDATE and DELETE statements
    pub fn single(alias: &str, meta: &'static EntityMeta) -> Self {
        Scope {
            qualify: false,
            ..Scope::qualified(alias, meta)
        }
    }

    pub fn add(&mut self, alias: &str, meta: &'static EntityMeta) -> Result<&ScopeEntry, QueryError> {
        if self.entries.iter().any(|e| e.alias == alias) {
            return Err(QueryError::DuplicateAlias(alias.to_string()));
        }
        let sql_alias = format!("t{}", self.entries.len());
        self.entries.push(ScopeEntry {
            alias: alias.to_string(),
            sql_alias,
            meta,
        });
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn root(&self) -> &ScopeEntry {
        &self.entries[0]
    }

    /// Entry for an alias; `None` means the root entity
    pub fn entry(&self, alias: Option<&str>) -> Result<&ScopeEntry, QueryError> {
        match alias {
            None => Ok(self.root()),
            Some(alias) => self
                .entries
                .iter()
                .find(|e| e.alias == alias)
                .ok_or_else(|| QueryError::UnknownAlias(alias.to_string())),
        }
    }

    /// SQL column reference for a field
    pub fn column(&self, field: &Field) -> Result<String, QueryError> {
        let entry = self.entry(field.alias.as_deref())?;
        let column = entry
            .meta
            .column(&field.name)
            .ok_or_else(|| QueryError::UnknownField {
                entity: entry.meta.name,
                field: field.name.clone(),
            })?;
        Ok(self.qualify_column(entry, column))
    }

    pub fn qualify_column(&self, entry: &ScopeEntry, column: &str) -> String {
        if self.qualify {
            format!("{}.{}", entry.sql_alias, column)
        } else {
            column.to_string()
        }
    }
}

/// Accumulates SQL text and placeholder values while tracking which bound
/// parameters the statement references
pub(crate) struct SqlWriter<'b> {
    sql: String,
    values: Vec<Value>,
    bindings: &'b Bindings,
    used: BTreeSet<ParamKey>,
}

impl<'b> SqlWriter<'b> {
    pub fn new(bindings: &'b Bindings) -> Self {
        SqlWriter {
            sql: String::with_capacity(128),
            values: Vec::new(),
            bindings,
            used: BTreeSet::new(),
        }
    }

    pub fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    /// Placeholder for a literal value that is not a caller parameter
    pub fn value(&mut self, value: Value) {
        self.sql.push('?');
        self.values.push(value);
    }

    fn lookup(&mut self, key: ParamKey) -> Result<&'b Binding, QueryError> {
        let bindings: &'b Bindings = self.bindings;
        let binding = bindings
            .get(&key)
            .ok_or_else(|| QueryError::Unbound(key.to_string()))?;
        self.used.insert(key);
        Ok(binding)
    }

    /// Placeholder for a single-valued parameter
    pub fn param(&mut self, param: &Param) -> Result<(), QueryError> {
        let value = match param {
            Param::Value(value) => value.clone(),
            Param::List(_) => return Err(QueryError::ListNotAllowed("literal".to_string())),
            Param::Named(name) => {
                let key = ParamKey::Named(name.clone());
                let display = key.to_string();
                match self.lookup(key)? {
                    Binding::Single(value) => value.clone(),
                    Binding::List(_) => return Err(QueryError::ListNotAllowed(display)),
                }
            }
            Param::Positional(index) => {
                let key = ParamKey::Positional(*index);
                let display = key.to_string();
                match self.lookup(key)? {
                    Binding::Single(value) => value.clone(),
                    Binding::List(_) => return Err(QueryError::ListNotAllowed(display)),
                }
            }
        };
        self.value(value);
        Ok(())
    }

    /// `(?, ?, ...)` for a list-valued parameter
    fn param_list(&mut self, param: &Param, field: &Field) -> Result<(), QueryError> {
        let values: Vec<Value> = match param {
            Param::List(values) => values.clone(),
            Param::Value(value) => vec![value.clone()],
            Param::Named(name) => match self.lookup(ParamKey::Named(name.clone()))? {
                Binding::List(values) => values.clone(),
                Binding::Single(value) => vec![value.clone()],
            },
            Param::Positional(index) => match self.lookup(ParamKey::Positional(*index))? {
                Binding::List(values) => values.clone(),
                Binding::Single(value) => vec![value.clone()],
            },
        };
        if values.is_empty() {
            return Err(QueryError::EmptyList(field.to_string()));
        }
        self.sql.push('(');
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.value(value);
        }
        self.sql.push(')');
        Ok(())
    }

    pub fn predicate(&mut self, scope: &Scope, predicate: &Predicate) -> Result<(), QueryError> {
        match predicate {
            Predicate::Compare { field, op, rhs } => {
                let column = scope.column(field)?;
                self.push(&column);
                self.push(" ");
                self.push(op.as_sql());
                self.push(" ");
                self.param(rhs)
            }
            Predicate::Like { field, pattern } => {
                let column = scope.column(field)?;
                self.push(&column);
                self.push(" LIKE ");
                self.param(pattern)
            }
            Predicate::In { field, values } => {
                let column = scope.column(field)?;
                self.push(&column);
                self.push(" IN ");
                self.param_list(values, field)
            }
            Predicate::IsNull(field) => {
                let column = scope.column(field)?;
                self.push(&column);
                self.push(" IS NULL");
                Ok(())
            }
            Predicate::And(parts) => self.junction(scope, parts, " AND ", "1"),
            Predicate::Or(parts) => self.junction(scope, parts, " OR ", "0"),
            Predicate::Not(inner) => {
                self.push("NOT (");
                self.predicate(scope, inner)?;
                self.push(")");
                Ok(())
            }
        }
    }

    fn junction(
        &mut self,
        scope: &Scope,
        parts: &[Predicate],
        separator: &str,
        empty: &str,
    ) -> Result<(), QueryError> {
        if parts.is_empty() {
            self.push(empty);
            return Ok(());
        }
        self.push("(");
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.push(separator);
            }
            self.predicate(scope, part)?;
        }
        self.push(")");
        Ok(())
    }

    /// Check that every binding was referenced and positional parameters
    /// are numbered from 0 without gaps
    pub fn finish(self) -> Result<RenderedSql, QueryError> {
        if let Some(unused) = self.bindings.keys().find(|k| !self.used.contains(*k)) {
            return Err(QueryError::UnusedBinding(unused.to_string()));
        }
        let positions: Vec<usize> = self
            .used
            .iter()
            .filter_map(|k| match k {
                ParamKey::Positional(index) => Some(*index),
                ParamKey::Named(_) => None,
            })
            .collect();
        for (expected, actual) in positions.iter().enumerate() {
            if expected != *actual {
                return Err(QueryError::PositionalGap(expected));
            }
        }
        Ok(RenderedSql {
            sql: self.sql,
            values: self.values,
        })
    }
}
