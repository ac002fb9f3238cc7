use std::fmt;

use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use super::{Entity, EntityMeta};
use crate::error::QueryError;

pub static BOOK: EntityMeta = EntityMeta {
    name: "Book",
    table: "book",
    id: "id",
    fields: &["title", "year", "author_id"],
    relations: &[],
};

/// A book always belongs to one author. The link is stored as the author's
/// identity, so it is set once the author has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: Option<i64>,
    pub title: String,
    pub year: i32,
    pub author_id: Option<i64>,
}

impl Book {
    /// Book whose author is not persisted yet
    pub fn new(title: impl Into<String>, year: i32) -> Self {
        Book {
            id: None,
            title: title.into(),
            year,
            author_id: None,
        }
    }

    pub fn by(title: impl Into<String>, year: i32, author_id: i64) -> Self {
        Book {
            author_id: Some(author_id),
            ..Book::new(title, year)
        }
    }
}

impl Entity for Book {
    fn meta() -> &'static EntityMeta {
        &BOOK
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.title.clone()),
            Value::Integer(self.year.into()),
            self.author_id.map(Value::Integer).unwrap_or(Value::Null),
        ]
    }

    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Book {
            id: Some(row.get(offset)?),
            title: row.get(offset + 1)?,
            year: row.get(offset + 2)?,
            author_id: row.get(offset + 3)?,
        })
    }

    fn check(&self) -> Result<(), QueryError> {
        if self.author_id.is_none() {
            return Err(QueryError::InvalidEntity(format!(
                "book '{}' has no author",
                self.title
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Book{{id={}, title='{}', year={}, author={}}}",
            self.id.map_or("null".to_string(), |id| id.to_string()),
            self.title,
            self.year,
            self.author_id.map_or("null".to_string(), |id| id.to_string()),
        )
    }
}
