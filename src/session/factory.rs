use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use super::handle::Session;
use super::pool::{ConnectionPool, PoolStats};
use crate::config::{PersistenceUnit, SchemaAction};
use crate::error::{Result, StoreError};
use crate::migration::MigrationRunner;

/// Expensive, long-lived owner of a connection pool bound to one
/// persistence unit. Sessions are cheap and come from [`open_session`].
///
/// [`open_session`]: SessionFactory::open_session
pub struct SessionFactory {
    id: Uuid,
    unit: PersistenceUnit,
    pool: Arc<ConnectionPool>,
    next_session: AtomicU64,
}

impl SessionFactory {
    /// Open the pool and apply the unit's schema action. Nothing is returned
    /// unless both succeeded.
    pub fn build(unit: &PersistenceUnit) -> Result<Self> {
        unit.validate()?;
        let pool = Arc::new(ConnectionPool::open(unit)?);

        {
            let conn = pool.acquire()?;
            apply_schema(&conn, unit.schema)?;
        }

        let factory = SessionFactory {
            id: Uuid::new_v4(),
            unit: unit.clone(),
            pool,
            next_session: AtomicU64::new(1),
        };
        info!("Built session factory {} for unit '{}'", factory.id, unit.name);
        Ok(factory)
    }

    pub fn open_session(&self) -> Result<Session> {
        let conn = self.pool.acquire()?;
        let id = self.next_session.fetch_add(1, Ordering::SeqCst);
        debug!("Opened session {} on factory {}", id, self.id);
        Ok(Session::new(id, conn))
    }

    /// Release the pool. With `create-drop` the entity tables are dropped
    /// first. Closing twice fails with [`StoreError::AlreadyClosed`].
    pub fn close(&self) -> Result<()> {
        if self.pool.is_closed() {
            return Err(StoreError::AlreadyClosed);
        }
        if self.unit.schema == SchemaAction::CreateDrop {
            let conn = self.pool.acquire()?;
            MigrationRunner::new(&conn)
                .drop_schema()
                .map_err(|e| StoreError::Migration(format!("{e:#}")))?;
        }
        self.pool.close();
        info!("Closed session factory {}", self.id);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn unit(&self) -> &PersistenceUnit {
        &self.unit
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

fn apply_schema(conn: &Connection, action: SchemaAction) -> Result<()> {
    let migration_error = |e: anyhow::Error| StoreError::Migration(format!("{e:#}"));
    let mut runner = MigrationRunner::new(conn);
    match action {
        SchemaAction::None => Ok(()),
        SchemaAction::Validate => runner.check_schema_version().map_err(migration_error),
        SchemaAction::Update => runner.run_pending_migrations().map(drop).map_err(migration_error),
        SchemaAction::Create | SchemaAction::CreateDrop => {
            runner.drop_schema().map_err(migration_error)?;
            runner.run_pending_migrations().map(drop).map_err(migration_error)
        }
    }
}
