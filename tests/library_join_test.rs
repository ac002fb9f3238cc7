mod common;

use common::{TestResult, empty_factory, seeded_factory};
use emstore::catalog;
use emstore::entity::{Author, Book};
use emstore::session::Executor;
use emstore::{QueryError, StoreError};
use pretty_assertions::assert_eq;

#[test]
fn test_left_join_returns_pikul_once() -> TestResult {
    let factory = seeded_factory("join-left")?;
    let session = factory.open_session()?;

    let authors = catalog::authors_with_title(&session, "By pen & sword")?;
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].name, "Pikul");
    // Collections are not fetched by the join
    assert!(authors[0].books.is_empty());
    Ok(())
}

#[test]
fn test_join_is_deduplicated_for_repeated_titles() -> TestResult {
    let factory = empty_factory("join-dedup")?;
    let mut session = factory.open_session()?;
    session.transactional(|tx| {
        let mut pikul = Author::new("Pikul");
        pikul
            .add_book("By pen & sword", 1992)
            .add_book("By pen & sword", 1993)
            .add_book("Favorit", 1978);
        tx.persist(&mut pikul)
    })?;

    let left = catalog::authors_with_title(&session, "By pen & sword")?;
    let inner = catalog::authors_with_title_on(&session, "By pen & sword")?;
    assert_eq!(left.len(), 1);
    assert_eq!(inner, left);
    assert!(catalog::authors_with_title(&session, "Anna Karenina")?.is_empty());
    Ok(())
}

#[test]
fn test_books_of_authors() -> TestResult {
    let factory = seeded_factory("join-books")?;
    let session = factory.open_session()?;

    assert_eq!(catalog::books_of_authors(&session, None)?.len(), 6);

    let titles: Vec<String> = catalog::books_of_authors(&session, Some("Pikul"))?
        .into_iter()
        .map(|b| b.title)
        .collect();
    assert_eq!(titles, vec!["Barbarossa", "Favorit", "By pen & sword"]);
    assert!(catalog::books_of_authors(&session, Some("Gogol"))?.is_empty());
    Ok(())
}

#[test]
fn test_cascade_persist_and_load() -> TestResult {
    let factory = empty_factory("join-cascade")?;
    let mut session = factory.open_session()?;

    let mut tolstoy = Author::new("Tolstoy");
    tolstoy.add_book("Philipok", 1865);
    let id = session.transactional(|tx| tx.persist(&mut tolstoy))?;
    assert!(tolstoy.books.iter().all(|b| b.id.is_some() && b.author_id == Some(id)));

    let mut stored: Author = session.find(id)?.ok_or("author not stored")?;
    assert!(stored.books.is_empty());
    stored.load_books(&session)?;
    assert_eq!(stored, tolstoy);
    Ok(())
}

#[test]
fn test_orphan_book_is_rejected() -> TestResult {
    let factory = empty_factory("join-orphan")?;
    let mut session = factory.open_session()?;

    let result = session.transactional(|tx| tx.persist(&mut Book::new("Nobody's", 2000)));
    assert!(matches!(
        result,
        Err(StoreError::Query(QueryError::InvalidEntity(_)))
    ));
    assert!(catalog::books_of_authors(&session, None)?.is_empty());
    Ok(())
}
