pub mod registry;
pub mod runner;

use anyhow::{Context, Result};
use rusqlite::Connection;
use sha2::{Digest, Sha256};

/// One versioned schema change of the entity tables
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub description: &'static str,
    pub up: MigrationAction,
    pub down: Option<MigrationAction>,
    pub dependencies: Vec<u32>,
}

/// How a migration step changes the schema
#[derive(Debug, Clone)]
pub enum MigrationAction {
    Sql(&'static str),
    /// Statements run one after another in the migration's transaction
    SqlBatch(&'static [&'static str]),
    Function(fn(&Connection) -> Result<()>),
}

impl MigrationAction {
    pub fn run(&self, conn: &Connection) -> Result<()> {
        match self {
            MigrationAction::Sql(sql) => conn.execute_batch(sql).context("migration SQL failed"),
            MigrationAction::SqlBatch(batch) => batch.iter().enumerate().try_for_each(|(i, sql)| {
                conn.execute_batch(sql)
                    .with_context(|| format!("statement {} of migration batch failed", i + 1))
            }),
            MigrationAction::Function(f) => f(conn),
        }
    }

    fn digest_into(&self, hasher: &mut Sha256) {
        match self {
            MigrationAction::Sql(sql) => hasher.update(sql),
            MigrationAction::SqlBatch(batch) => batch.iter().for_each(|sql| hasher.update(sql)),
            MigrationAction::Function(_) => hasher.update("function"),
        }
    }
}

impl Migration {
    /// SHA-256 over version, name, description and the `up` action. Stored
    /// when applied and compared by `check_schema_version`.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_be_bytes());
        hasher.update(self.name);
        hasher.update(self.description);
        self.up.digest_into(&mut hasher);
        format!("{:x}", hasher.finalize())
    }
}

pub use registry::MIGRATIONS;
pub use runner::MigrationRunner;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksums_are_stable_and_distinct() {
        let first = MIGRATIONS.get(&1).unwrap();
        assert_eq!(first.checksum(), first.checksum());
        let checksums: std::collections::HashSet<_> =
            MIGRATIONS.values().map(|m| m.checksum()).collect();
        assert_eq!(checksums.len(), MIGRATIONS.len());
    }

    #[test]
    fn test_registry_versions_are_contiguous() {
        let versions: Vec<u32> = MIGRATIONS.keys().copied().collect();
        let expected: Vec<u32> = (1..=versions.len() as u32).collect();
        assert_eq!(versions, expected);
        for migration in MIGRATIONS.values() {
            assert!(migration.down.is_some(), "migration {} has no down", migration.version);
        }
    }
}
