//! Entity records and their static table mapping.
//!
//! Every entity is described by an [`EntityMeta`]: table name, identity
//! column and the mapped fields, in the column order used for inserts and for
//! reading rows back. Query builders resolve field names against this
//! metadata, so only identifiers declared here ever reach SQL text.

pub mod author;
pub mod book;
pub mod employee;

use rusqlite::Row;
use rusqlite::types::Value;

use crate::error::{QueryError, Result};
use crate::session::Transaction;

pub use author::Author;
pub use book::Book;
pub use employee::Employee;

/// Table mapping of an entity
#[derive(Debug)]
pub struct EntityMeta {
    /// Entity name used in messages
    pub name: &'static str,
    pub table: &'static str,
    /// Generated identity column
    pub id: &'static str,
    /// Mapped fields other than the identity; field name == column name
    pub fields: &'static [&'static str],
    pub relations: &'static [&'static Relation],
}

impl EntityMeta {
    /// Column for a field name, including the identity
    pub fn column(&self, field: &str) -> Option<&'static str> {
        if field == self.id {
            return Some(self.id);
        }
        self.fields.iter().copied().find(|f| *f == field)
    }

    pub fn relation(&self, name: &str) -> Option<&'static Relation> {
        self.relations.iter().copied().find(|r| r.name == name)
    }

    /// `id, field1, field2, ...`
    pub fn all_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.id).chain(self.fields.iter().copied())
    }

    pub fn same_as(&self, other: &EntityMeta) -> bool {
        std::ptr::eq(self, other)
    }
}

/// What persisting or removing the owner does to the related entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cascade {
    /// Related entities are saved separately
    None,
    /// Persisting the owner persists every related entity
    Persist,
}

/// One-to-many relationship from `owner` to `target`, stored as a foreign
/// key column on the target table
#[derive(Debug)]
pub struct Relation {
    pub name: &'static str,
    pub owner: &'static EntityMeta,
    pub target: &'static EntityMeta,
    /// Column on `target` referencing the owner's identity
    pub foreign_key: &'static str,
    pub cascade: Cascade,
}

/// A record mapped to a table row
pub trait Entity: Sized {
    fn meta() -> &'static EntityMeta;

    /// `None` until the entity has been persisted
    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// Values of [`EntityMeta::fields`], in order
    fn field_values(&self) -> Vec<Value>;

    /// Build from a row holding the identity at `offset` followed by the
    /// mapped fields
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self>;

    /// Reject values that cannot be stored
    fn check(&self) -> std::result::Result<(), QueryError> {
        Ok(())
    }

    /// Persist related entities whose relation cascades; called right after
    /// the entity itself received its identity
    fn cascade_persist(&mut self, _tx: &Transaction<'_>) -> Result<()> {
        Ok(())
    }
}
