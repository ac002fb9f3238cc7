mod common;

use std::sync::Arc;

use common::TestResult;
use emstore::config::PersistenceUnit;
use emstore::entity::Employee;
use emstore::query::Select;
use emstore::session::{self, Executor, SharedFactory};
use emstore::StoreError;

fn shared(name: &str) -> SharedFactory {
    SharedFactory::with_unit(PersistenceUnit::in_memory(name))
}

#[test]
fn test_repeated_sessions_share_one_factory() -> TestResult {
    let shared = shared("lifecycle-once");
    assert!(!shared.is_initialized());

    let first = shared.session()?;
    let second = shared.session()?;
    let third = shared.session()?;
    assert_eq!(shared.constructions(), 1);
    assert!(shared.is_initialized());
    assert_ne!(first.id(), second.id());
    assert_ne!(second.id(), third.id());
    Ok(())
}

#[test]
fn test_concurrent_first_access_builds_once() -> TestResult {
    let shared = Arc::new(shared("lifecycle-concurrent"));
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = Arc::clone(&shared);
                scope.spawn(move || shared.session().map(|s| s.id()))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
    });
    assert_eq!(shared.constructions(), 1);
    Ok(())
}

#[test]
fn test_stale_session_fails_after_close() -> TestResult {
    let shared = shared("lifecycle-stale");
    let mut stale = shared.session()?;
    let factory = shared.factory()?;
    shared.close()?;

    assert!(!stale.is_open());
    let result = stale.list::<Employee>(&Select::from::<Employee>("e"));
    assert!(matches!(result, Err(StoreError::FactoryClosed)));
    assert!(matches!(stale.begin(), Err(StoreError::FactoryClosed)));

    drop(stale);
    // Connections returned to a closed pool are discarded
    assert_eq!(factory.stats().idle, 0);
    assert!(factory.stats().closed);
    Ok(())
}

#[test]
fn test_session_after_close_reinitializes() -> TestResult {
    let shared = shared("lifecycle-reinit");
    let mut session = shared.session()?;
    session.transactional(|tx| tx.persist(&mut Employee::new("Alex", 28, 5500)))?;
    drop(session);
    shared.close()?;
    assert!(!shared.is_initialized());

    let session = shared.session()?;
    assert_eq!(shared.constructions(), 2);
    // A fresh in-memory database starts empty
    assert!(session.list::<Employee>(&Select::from::<Employee>("e"))?.is_empty());
    Ok(())
}

#[test]
fn test_close_without_factory_fails() -> TestResult {
    let shared = shared("lifecycle-close");
    assert!(matches!(shared.close(), Err(StoreError::AlreadyClosed)));

    shared.session()?;
    shared.close()?;
    assert!(matches!(shared.close(), Err(StoreError::AlreadyClosed)));
    Ok(())
}

#[test]
fn test_failed_construction_is_not_published() -> TestResult {
    let mut unit = PersistenceUnit::in_memory("lifecycle-invalid");
    unit.journal_mode = "SOMETIMES".to_string();
    let shared = SharedFactory::with_unit(unit);

    let err = shared.session().err().ok_or("invalid unit accepted")?;
    assert_eq!(err.code(), "CONFIGURATION");
    assert!(!shared.is_initialized());
    assert_eq!(shared.constructions(), 0);
    assert!(matches!(shared.close(), Err(StoreError::AlreadyClosed)));
    Ok(())
}

#[test]
fn test_unreachable_database_is_a_connection_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("missing").join("store.db");
    let shared = SharedFactory::with_unit(PersistenceUnit::file("lifecycle-missing", path.to_string_lossy()));

    match shared.session() {
        Err(StoreError::Connection { database, .. }) => assert!(database.ends_with("store.db")),
        Err(other) => panic!("expected a connection error, got {other}"),
        Ok(_) => panic!("opened a database in a missing directory"),
    }
    assert!(!shared.is_initialized());
    Ok(())
}

#[test]
fn test_unknown_named_unit() -> TestResult {
    let shared = SharedFactory::named("no-such-unit");
    assert!(matches!(shared.session(), Err(StoreError::Configuration(_))));
    Ok(())
}

#[test]
fn test_global_close_before_use() -> TestResult {
    assert!(!session::global().is_initialized());
    assert!(matches!(session::close_factory(), Err(StoreError::AlreadyClosed)));
    Ok(())
}
