use super::{MIGRATIONS, Migration};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Applies the registered migrations to one connection. Progress is kept in
/// `__emstore_migrations`; `__emstore_migration_locks` keeps two processes
/// from migrating the same database at once.
pub struct MigrationRunner<'c> {
    conn: &'c Connection,
    process_id: String,
}

impl<'c> MigrationRunner<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            process_id: format!("{}:{}", std::process::id(), Uuid::new_v4()),
        }
    }

    pub fn target_version() -> u32 {
        *MIGRATIONS.keys().max().unwrap_or(&0)
    }

    /// Fail unless every migration is applied with an unchanged checksum
    pub fn check_schema_version(&self) -> Result<()> {
        self.ensure_metadata_tables()?;

        let current_version = self.current_version()?;
        let target_version = Self::target_version();

        if current_version < target_version {
            return Err(anyhow!(
                "Database schema is outdated. Current version: {}, Required version: {}. \
                 Run `emstore migrate` or use a unit with schema = \"update\".",
                current_version,
                target_version
            ));
        }

        for (version, migration) in MIGRATIONS.iter() {
            if let Some(existing) = self.migration_checksum(*version)? {
                if existing != migration.checksum() {
                    return Err(anyhow!(
                        "Migration {} has been modified since it was applied",
                        version
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn run_pending_migrations(&mut self) -> Result<Vec<u32>> {
        self.ensure_metadata_tables()?;

        self.acquire_lock()?;

        let result = self.run_migrations_internal();

        // Always release lock
        if let Err(e) = self.release_lock() {
            error!("Failed to release migration lock: {}", e);
        }

        result
    }

    /// Undo every applied migration, newest first, and forget the history
    pub fn drop_schema(&mut self) -> Result<Vec<u32>> {
        self.ensure_metadata_tables()?;
        self.acquire_lock()?;

        let result = (|| -> Result<Vec<u32>> {
            let mut dropped = Vec::new();
            for (version, migration) in MIGRATIONS.iter().rev() {
                if !self.is_migration_applied(*version)? {
                    continue;
                }
                if let Some(down) = &migration.down {
                    down.run(self.conn)?;
                }
                self.conn.execute(
                    "DELETE FROM __emstore_migrations WHERE version = ?1",
                    params![version],
                )?;
                dropped.push(*version);
            }
            self.conn.execute(
                "DELETE FROM __emstore_metadata WHERE key = 'schema_version'",
                [],
            )?;
            info!("Dropped schema versions {:?}", dropped);
            Ok(dropped)
        })();

        if let Err(e) = self.release_lock() {
            error!("Failed to release migration lock: {}", e);
        }

        result
    }

    fn ensure_metadata_tables(&self) -> Result<()> {
        self.conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS __emstore_metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at REAL DEFAULT (strftime('%s', 'now'))
            );

            CREATE TABLE IF NOT EXISTS __emstore_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                applied_at REAL NOT NULL,
                execution_time_ms INTEGER,
                checksum TEXT NOT NULL,
                status TEXT CHECK(status IN ('running', 'completed', 'failed')),
                error_message TEXT
            );

            CREATE TABLE IF NOT EXISTS __emstore_migration_locks (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                locked_by TEXT NOT NULL,
                locked_at REAL NOT NULL,
                expires_at REAL NOT NULL
            );
        "#)?;
        Ok(())
    }

    fn run_migrations_internal(&mut self) -> Result<Vec<u32>> {
        let current_version = self.current_version()?;
        let target_version = Self::target_version();

        if current_version >= target_version {
            info!("Schema is up to date (version {})", current_version);
            return Ok(vec![]);
        }

        let mut applied = Vec::new();

        for version in (current_version + 1)..=target_version {
            if let Some(migration) = MIGRATIONS.get(&version) {
                for dep in &migration.dependencies {
                    if !self.is_migration_applied(*dep)? {
                        return Err(anyhow!(
                            "Migration {} depends on {}, which hasn't been applied",
                            version,
                            dep
                        ));
                    }
                }

                // A failed earlier attempt must have run the same migration
                if let Some(existing_checksum) = self.migration_checksum(version)? {
                    let current_checksum = migration.checksum();
                    if existing_checksum != current_checksum {
                        return Err(anyhow!(
                            "Migration {} has been modified! Expected checksum: {}, got: {}",
                            version,
                            existing_checksum,
                            current_checksum
                        ));
                    }
                }

                self.apply_migration(migration)?;
                applied.push(version);
            }
        }

        Ok(applied)
    }

    fn apply_migration(&mut self, migration: &Migration) -> Result<()> {
        info!("Applying migration {}: {}", migration.version, migration.description);
        let start = Instant::now();

        self.conn.execute_batch("BEGIN EXCLUSIVE TRANSACTION")?;

        self.conn.execute(
            "INSERT OR REPLACE INTO __emstore_migrations
             (version, name, description, applied_at, checksum, status)
             VALUES (?1, ?2, ?3, ?4, ?5, 'running')",
            params![
                migration.version,
                migration.name,
                migration.description,
                chrono::Utc::now().timestamp() as f64,
                migration.checksum()
            ],
        )?;

        match migration.up.run(self.conn) {
            Ok(()) => {
                let elapsed = start.elapsed().as_millis() as i64;
                self.conn.execute(
                    "UPDATE __emstore_migrations
                     SET status = 'completed', execution_time_ms = ?1
                     WHERE version = ?2",
                    params![elapsed, migration.version],
                )?;

                self.conn.execute(
                    "INSERT OR REPLACE INTO __emstore_metadata (key, value, updated_at)
                     VALUES ('schema_version', ?1, ?2)",
                    params![migration.version, chrono::Utc::now().timestamp() as f64],
                )?;

                self.conn.execute_batch("COMMIT")?;

                info!("Migration {} completed in {}ms", migration.version, elapsed);
                Ok(())
            }
            Err(e) => {
                self.conn.execute_batch("ROLLBACK")?;

                // Recorded after the rollback so the failure survives it
                self.conn.execute(
                    "INSERT OR REPLACE INTO __emstore_migrations
                     (version, name, description, applied_at, checksum, status, error_message)
                     VALUES (?1, ?2, ?3, ?4, ?5, 'failed', ?6)",
                    params![
                        migration.version,
                        migration.name,
                        migration.description,
                        chrono::Utc::now().timestamp() as f64,
                        migration.checksum(),
                        e.to_string()
                    ],
                )?;

                error!("Migration {} failed: {}", migration.version, e);
                Err(e)
            }
        }
    }

    fn acquire_lock(&mut self) -> Result<()> {
        let now = chrono::Utc::now().timestamp() as f64;
        let expires = now + 300.0; // 5 minute timeout

        match self.conn.execute(
            "INSERT INTO __emstore_migration_locks (id, locked_by, locked_at, expires_at)
             VALUES (1, ?1, ?2, ?3)",
            params![self.process_id, now, expires],
        ) {
            Ok(_) => Ok(()),
            Err(_) => {
                let (locked_by, expires_at): (String, f64) = self.conn.query_row(
                    "SELECT locked_by, expires_at FROM __emstore_migration_locks WHERE id = 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;

                if expires_at < now {
                    self.conn.execute(
                        "UPDATE __emstore_migration_locks
                         SET locked_by = ?1, locked_at = ?2, expires_at = ?3
                         WHERE id = 1",
                        params![self.process_id, now, expires],
                    )?;
                    Ok(())
                } else {
                    Err(anyhow!(
                        "Migration lock held by process: {}. Expires at: {}",
                        locked_by,
                        chrono::DateTime::<chrono::Utc>::from_timestamp(expires_at as i64, 0)
                            .unwrap_or_default()
                    ))
                }
            }
        }
    }

    fn release_lock(&mut self) -> Result<()> {
        self.conn.execute(
            "DELETE FROM __emstore_migration_locks WHERE id = 1 AND locked_by = ?1",
            params![self.process_id],
        )?;
        Ok(())
    }

    pub fn current_version(&self) -> Result<u32> {
        let version = self
            .conn
            .query_row(
                "SELECT value FROM __emstore_metadata WHERE key = 'schema_version'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match version {
            Some(version) => Ok(version.parse::<u32>()?),
            None => Ok(0),
        }
    }

    fn is_migration_applied(&self, version: u32) -> Result<bool> {
        Ok(self
            .conn
            .query_row(
                "SELECT 1 FROM __emstore_migrations WHERE version = ?1 AND status = 'completed'",
                params![version],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    fn migration_checksum(&self, version: u32) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT checksum FROM __emstore_migrations WHERE version = ?1",
                params![version],
                |row| row.get::<_, String>(0),
            )
            .optional()?)
    }
}
