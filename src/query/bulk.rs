//! Bulk UPDATE and DELETE statements. Both only execute on a transaction,
//! which is committed by the caller once the statement succeeded.

use super::param::{Bindings, IntoValue, Param};
use super::predicate::{Field, Predicate};
use super::render::{RenderedSql, Scope, SqlWriter};
use crate::entity::{Entity, EntityMeta};
use crate::error::QueryError;

/// Statement returning an affected-row count
pub trait BulkStatement {
    fn render(&self) -> Result<RenderedSql, QueryError>;

    fn entity(&self) -> &'static EntityMeta;
}

/// `update E e set e.field = ... where ...`
#[derive(Debug, Clone)]
pub struct Update {
    meta: &'static EntityMeta,
    alias: String,
    assignments: Vec<(Field, Param)>,
    filter: Option<Predicate>,
    bindings: Bindings,
}

impl Update {
    pub fn of<E: Entity>(alias: &str) -> Self {
        Update {
            meta: E::meta(),
            alias: alias.to_string(),
            assignments: Vec::new(),
            filter: None,
            bindings: Bindings::default(),
        }
    }

    pub fn set(mut self, field: &str, value: Param) -> Self {
        self.assignments.push((Field::parse(field), value));
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn bind(mut self, name: &str, value: impl IntoValue) -> Self {
        self.bindings.bind(name, value);
        self
    }

    pub fn bind_positional(mut self, index: usize, value: impl IntoValue) -> Self {
        self.bindings.bind_positional(index, value);
        self
    }

    pub fn bind_list<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        self.bindings.bind_list(name, values);
        self
    }
}

impl BulkStatement for Update {
    fn render(&self) -> Result<RenderedSql, QueryError> {
        if self.assignments.is_empty() {
            return Err(QueryError::EmptyUpdate);
        }
        let scope = Scope::single(&self.alias, self.meta);
        let mut writer = SqlWriter::new(&self.bindings);
        writer.push("UPDATE ");
        writer.push(self.meta.table);
        writer.push(" SET ");
        for (i, (field, value)) in self.assignments.iter().enumerate() {
            // The identity is generated and never reassigned
            if field.name == self.meta.id {
                return Err(QueryError::UnknownField {
                    entity: self.meta.name,
                    field: field.name.clone(),
                });
            }
            if i > 0 {
                writer.push(", ");
            }
            writer.push(&scope.column(field)?);
            writer.push(" = ");
            writer.param(value)?;
        }
        if let Some(filter) = &self.filter {
            writer.push(" WHERE ");
            writer.predicate(&scope, filter)?;
        }
        writer.finish()
    }

    fn entity(&self) -> &'static EntityMeta {
        self.meta
    }
}

/// `delete from E e where ...`
#[derive(Debug, Clone)]
pub struct Delete {
    meta: &'static EntityMeta,
    alias: String,
    filter: Option<Predicate>,
    bindings: Bindings,
}

impl Delete {
    pub fn from<E: Entity>(alias: &str) -> Self {
        Delete {
            meta: E::meta(),
            alias: alias.to_string(),
            filter: None,
            bindings: Bindings::default(),
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn bind(mut self, name: &str, value: impl IntoValue) -> Self {
        self.bindings.bind(name, value);
        self
    }

    pub fn bind_list<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        self.bindings.bind_list(name, values);
        self
    }
}

impl BulkStatement for Delete {
    fn render(&self) -> Result<RenderedSql, QueryError> {
        let scope = Scope::single(&self.alias, self.meta);
        let mut writer = SqlWriter::new(&self.bindings);
        writer.push("DELETE FROM ");
        writer.push(self.meta.table);
        if let Some(filter) = &self.filter {
            writer.push(" WHERE ");
            writer.predicate(&scope, filter)?;
        }
        writer.finish()
    }

    fn entity(&self) -> &'static EntityMeta {
        self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Employee;
    use crate::query::predicate::eq;
    use rusqlite::types::Value;

    #[test]
    fn test_update_render() {
        let rendered = Update::of::<Employee>("e")
            .set("e.age", Param::named("age"))
            .filter(eq("name", Param::named("name")))
            .bind("age", 21)
            .bind("name", "Yulij")
            .render()
            .unwrap();
        assert_eq!(rendered.sql, "UPDATE employee SET age = ? WHERE name = ?");
        assert_eq!(
            rendered.values,
            vec![Value::Integer(21), Value::Text("Yulij".to_string())]
        );
    }

    #[test]
    fn test_update_rejects_identity_and_empty() {
        let err = Update::of::<Employee>("e")
            .set("e.id", Param::value(7))
            .render()
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownField { .. }));

        let err = Update::of::<Employee>("e").render().unwrap_err();
        assert_eq!(err, QueryError::EmptyUpdate);
    }

    #[test]
    fn test_delete_render() {
        let rendered = Delete::from::<Employee>("e")
            .filter(eq("e.id", Param::named("id")))
            .bind("id", 6i64)
            .render()
            .unwrap();
        assert_eq!(rendered.sql, "DELETE FROM employee WHERE id = ?");
    }
}
