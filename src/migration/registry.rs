use super::{Migration, MigrationAction};
use anyhow::Result;
use lazy_static::lazy_static;
use rusqlite::Connection;
use std::collections::BTreeMap;

lazy_static! {
    pub static ref MIGRATIONS: BTreeMap<u32, Migration> = {
        let mut registry = BTreeMap::new();

        register_v1_employee(&mut registry);
        register_v2_library(&mut registry);
        register_v3_lookup_indexes(&mut registry);

        registry
    };
}

/// Version 1: staff table
fn register_v1_employee(registry: &mut BTreeMap<u32, Migration>) {
    registry.insert(1, Migration {
        version: 1,
        name: "employee",
        description: "Create the employee table",
        up: MigrationAction::Sql(r#"
            CREATE TABLE IF NOT EXISTS employee (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                age INTEGER NOT NULL,
                salary INTEGER NOT NULL
            );
        "#),
        down: Some(MigrationAction::Sql("DROP TABLE IF EXISTS employee;")),
        dependencies: vec![],
    });
}

/// Version 2: authors and their books
fn register_v2_library(registry: &mut BTreeMap<u32, Migration>) {
    registry.insert(2, Migration {
        version: 2,
        name: "library",
        description: "Create author and book tables",
        up: MigrationAction::SqlBatch(&[
            r#"
            CREATE TABLE IF NOT EXISTS author (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS book (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                year INTEGER NOT NULL,
                author_id INTEGER NOT NULL REFERENCES author(id)
            );
            "#,
        ]),
        down: Some(MigrationAction::SqlBatch(&[
            "DROP TABLE IF EXISTS book;",
            "DROP TABLE IF EXISTS author;",
        ])),
        dependencies: vec![],
    });
}

/// Version 3: indexes behind the name filters and the author join
fn register_v3_lookup_indexes(registry: &mut BTreeMap<u32, Migration>) {
    registry.insert(3, Migration {
        version: 3,
        name: "lookup_indexes",
        description: "Index employee names and book authors",
        up: MigrationAction::Function(create_lookup_indexes),
        down: Some(MigrationAction::SqlBatch(&[
            "DROP INDEX IF EXISTS idx_employee_name;",
            "DROP INDEX IF EXISTS idx_book_author;",
        ])),
        dependencies: vec![1, 2],
    });
}

fn create_lookup_indexes(conn: &Connection) -> Result<()> {
    for (index, table, column) in [
        ("idx_employee_name", "employee", "name"),
        ("idx_book_author", "book", "author_id"),
    ] {
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS {index} ON {table}({column});"
        ))?;
    }
    Ok(())
}
