//! Author and book queries over the one-to-many `Author.books` relation.

use crate::entity::{Author, Book};
use crate::error::Result;
use crate::query::{JoinKind, Order, Param, Select, eq};
use crate::session::Executor;

/// `select a.books from Author a [where a.name = :name]`
pub fn books_of_authors(db: &impl Executor, author_name: Option<&str>) -> Result<Vec<Book>> {
    let mut query = Select::from::<Author>("a")
        .join(JoinKind::Inner, "a.books", "b")
        .select_entity("b")
        .order_by("b.id", Order::Asc);
    if let Some(name) = author_name {
        query = query
            .filter(eq("a.name", Param::named("name")))
            .bind("name", name);
    }
    db.list(&query)
}

/// `select distinct a from Author a left join a.books b where b.title = :title`
pub fn authors_with_title(db: &impl Executor, title: &str) -> Result<Vec<Author>> {
    let query = Select::from::<Author>("a")
        .join(JoinKind::Left, "a.books", "b")
        .filter(eq("b.title", Param::named("title")))
        .distinct()
        .order_by("a.id", Order::Asc)
        .bind("title", title);
    db.list(&query)
}

/// Same result with the title condition in the join: `inner join a.books b
/// on b.title = :title`
pub fn authors_with_title_on(db: &impl Executor, title: &str) -> Result<Vec<Author>> {
    let query = Select::from::<Author>("a")
        .join_on(
            JoinKind::Inner,
            "a.books",
            "b",
            eq("b.title", Param::named("title")),
        )
        .distinct()
        .order_by("a.id", Order::Asc)
        .bind("title", title);
    db.list(&query)
}

/// Every author with its books loaded
pub fn authors_with_books(db: &impl Executor) -> Result<Vec<Author>> {
    let mut authors: Vec<Author> = db.list(&Select::from::<Author>("a").order_by("a.id", Order::Asc))?;
    for author in &mut authors {
        author.load_books(db)?;
    }
    Ok(authors)
}
