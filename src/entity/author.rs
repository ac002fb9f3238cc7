use std::fmt;

use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::book::BOOK;
use super::{Book, Cascade, Entity, EntityMeta, Relation};
use crate::error::{QueryError, Result};
use crate::session::{Executor, Transaction};

pub static AUTHOR: EntityMeta = EntityMeta {
    name: "Author",
    table: "author",
    id: "id",
    fields: &["name"],
    relations: &[&AUTHOR_BOOKS],
};

/// `Author.books`: saving an author saves its books
pub static AUTHOR_BOOKS: Relation = Relation {
    name: "books",
    owner: &AUTHOR,
    target: &BOOK,
    foreign_key: "author_id",
    cascade: Cascade::Persist,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: Option<i64>,
    pub name: String,
    /// Loaded explicitly with `load_books`; empty after a plain fetch
    pub books: Vec<Book>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Author {
            id: None,
            name: name.into(),
            books: Vec::new(),
        }
    }

    /// Add a book to the collection; it is saved together with the author
    pub fn add_book(&mut self, title: impl Into<String>, year: i32) -> &mut Self {
        let mut book = Book::new(title, year);
        book.author_id = self.id;
        self.books.push(book);
        self
    }

    /// Replace `books` with the stored collection, in identity order
    pub fn load_books(&mut self, executor: &impl Executor) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            QueryError::InvalidEntity(format!("author '{}' has not been persisted", self.name))
        })?;
        self.books = executor.load_collection(&AUTHOR_BOOKS, id)?;
        Ok(())
    }
}

impl Entity for Author {
    fn meta() -> &'static EntityMeta {
        &AUTHOR
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn field_values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Author {
            id: Some(row.get(offset)?),
            name: row.get(offset + 1)?,
            books: Vec::new(),
        })
    }

    fn check(&self) -> std::result::Result<(), QueryError> {
        if self.name.is_empty() {
            return Err(QueryError::InvalidEntity(
                "author name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn cascade_persist(&mut self, tx: &Transaction<'_>) -> Result<()> {
        if AUTHOR_BOOKS.cascade != Cascade::Persist {
            return Ok(());
        }
        for book in &mut self.books {
            book.author_id = self.id;
            if book.id.is_none() {
                tx.persist(book)?;
            }
        }
        debug!("Cascaded persist of {} books for author {:?}", self.books.len(), self.id);
        Ok(())
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Author{{id={}, name='{}'}}",
            self.id.map_or("null".to_string(), |id| id.to_string()),
            self.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_books_relation_links_metas() {
        let relation = AUTHOR.relation("books").unwrap();
        assert!(relation.owner.same_as(&AUTHOR));
        assert!(relation.target.same_as(&BOOK));
        assert_eq!(relation.foreign_key, "author_id");
        assert_eq!(relation.cascade, Cascade::Persist);
        assert!(AUTHOR.relation("essays").is_none());
    }

    #[test]
    fn test_new_author_has_empty_books() {
        let mut author = Author::new("Pikul");
        assert!(author.books.is_empty());
        author.add_book("Barbarossa", 2012).add_book("Favorit", 1978);
        assert_eq!(author.books.len(), 2);
        assert!(author.books.iter().all(|b| b.author_id.is_none()));
    }
}
