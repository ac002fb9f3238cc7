mod common;

use common::{TestResult, seeded_factory};
use emstore::catalog;
use emstore::entity::{Book, Employee};
use emstore::query::{NativeQuery, Param, Select, eq, in_list, not};
use emstore::session::Executor;
use emstore::{QueryError, StoreError};
use pretty_assertions::assert_eq;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Name {
    name: String,
}

fn query_error(result: emstore::Result<Vec<Employee>>) -> QueryError {
    match result {
        Err(StoreError::Query(err)) => err,
        Err(other) => panic!("expected a query error, got {other}"),
        Ok(rows) => panic!("expected a query error, got {} rows", rows.len()),
    }
}

#[test]
fn test_unbound_and_unused_parameters() -> TestResult {
    let factory = seeded_factory("params-binding")?;
    let session = factory.open_session()?;

    let unbound = Select::from::<Employee>("e").filter(eq("e.name", Param::named("name")));
    assert_eq!(
        query_error(session.list(&unbound)),
        QueryError::Unbound(":name".to_string())
    );

    let unused = unbound.clone().bind("name", "Alex").bind("age", 28);
    assert_eq!(
        query_error(session.list(&unused)),
        QueryError::UnusedBinding(":age".to_string())
    );

    let gap = Select::from::<Employee>("e")
        .filter(eq("e.name", Param::positional(1)))
        .bind_positional(1, "Alex");
    assert_eq!(query_error(session.list(&gap)), QueryError::PositionalGap(0));
    Ok(())
}

#[test]
fn test_shape_errors() -> TestResult {
    let factory = seeded_factory("params-shape")?;
    let session = factory.open_session()?;

    let unknown_field = Select::from::<Employee>("e").filter(eq("e.wage", Param::value(1)));
    assert!(matches!(
        query_error(session.list(&unknown_field)),
        QueryError::UnknownField { entity: "Employee", .. }
    ));

    let unknown_alias = Select::from::<Employee>("e").filter(eq("x.name", Param::value("Alex")));
    assert_eq!(
        query_error(session.list(&unknown_alias)),
        QueryError::UnknownAlias("x".to_string())
    );

    let empty_in = Select::from::<Employee>("e")
        .filter(in_list("e.id", Param::named("ids")))
        .bind_list("ids", Vec::<i64>::new());
    assert!(matches!(
        query_error(session.list(&empty_in)),
        QueryError::EmptyList(_)
    ));

    let scalar = Select::from::<Employee>("e").select(["e.name"]);
    assert_eq!(query_error(session.list(&scalar)), QueryError::ScalarProjection);

    let wrong = session.list::<Book>(&Select::from::<Employee>("e"));
    assert!(matches!(
        wrong,
        Err(StoreError::Query(QueryError::WrongEntity {
            projected: "Employee",
            requested: "Book"
        }))
    ));
    Ok(())
}

#[test]
fn test_values_are_never_spliced_into_sql() -> TestResult {
    let factory = seeded_factory("params-injection")?;
    let session = factory.open_session()?;

    assert!(catalog::employees_named(&session, "x' OR '1'='1")?.is_empty());
    assert!(catalog::employees_matching(&session, "%' OR 1=1 --")?.is_empty());
    assert_eq!(catalog::employee_names(&session)?.len(), 5);
    Ok(())
}

#[test]
fn test_native_parameter_checks() -> TestResult {
    let factory = seeded_factory("params-native")?;
    let session = factory.open_session()?;

    let query = NativeQuery::new("SELECT e.name AS name FROM employee e WHERE e.salary > :min");
    let unbound = session.native::<Name>(&query);
    assert!(matches!(
        unbound,
        Err(StoreError::Query(QueryError::Unbound(ref name))) if name == ":min"
    ));

    let unused = session.native::<Name>(&query.clone().bind("min", 9000).bind("max", 1));
    assert!(matches!(
        unused,
        Err(StoreError::Query(QueryError::UnusedBinding(_)))
    ));

    let names = session.native::<Name>(&query.bind(":min", 9000))?;
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].name, "Yulij");
    Ok(())
}

#[test]
fn test_native_shape_mismatch() -> TestResult {
    let factory = seeded_factory("params-native-shape")?;
    let session = factory.open_session()?;

    let query = NativeQuery::new("SELECT e.salary AS name FROM employee e");
    let result = session.native::<Name>(&query);
    match result {
        Err(err @ StoreError::Serialization(_)) => assert_eq!(err.code(), "SERIALIZATION"),
        Err(other) => panic!("expected a serialization error, got {other}"),
        Ok(rows) => panic!("salary deserialized as a name for {} rows", rows.len()),
    }
    Ok(())
}

#[test]
fn test_combined_predicates() -> TestResult {
    let factory = seeded_factory("params-combined")?;
    let session = factory.open_session()?;

    let others = Select::from::<Employee>("e").filter(not(eq("e.name", Param::value("Yulij"))));
    assert_eq!(session.list::<Employee>(&others)?.len(), 3);

    let either = Select::from::<Employee>("e").filter(
        eq("e.name", Param::named("first")).or(eq("e.name", Param::named("second"))),
    )
    .bind("first", "Alex")
    .bind("second", "Maria");
    assert_eq!(session.list::<Employee>(&either)?.len(), 2);
    Ok(())
}
