use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::PersistenceUnit;
use crate::error::{Result, StoreError};

/// Connections of one factory. Idle connections are reused; when more are
/// checked out than `pool_size`, extra ones are opened on demand and closed
/// when returned.
pub struct ConnectionPool {
    /// Path or URI passed to SQLite
    target: String,
    unit: PersistenceUnit,
    idle: Mutex<Vec<Connection>>,
    closed: AtomicBool,
    opened: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    /// Connections opened over the pool's lifetime
    pub opened: usize,
    pub closed: bool,
}

impl ConnectionPool {
    /// Open the pool and its first connection, which also keeps an
    /// in-memory database alive for the pool's lifetime
    pub fn open(unit: &PersistenceUnit) -> Result<Self> {
        let target = if unit.is_in_memory() {
            // memdb keeps database-level locking, so readers see the last
            // commit while another session writes
            format!("file:/emstore-{}?vfs=memdb", Uuid::new_v4())
        } else {
            unit.database.clone()
        };

        let pool = ConnectionPool {
            target,
            unit: unit.clone(),
            idle: Mutex::new(Vec::with_capacity(unit.pool_size)),
            closed: AtomicBool::new(false),
            opened: AtomicUsize::new(0),
        };

        let first = pool.connect()?;
        pool.idle.lock().push(first);
        info!("Opened connection pool for unit '{}' at {}", unit.name, pool.target);
        Ok(pool)
    }

    fn connect(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;

        debug!("Opening connection with path: {}", self.target);
        let conn = Connection::open_with_flags(&self.target, flags)
            .map_err(|e| StoreError::connection(&self.unit.database, e))?;

        // Values were checked against fixed lists by PersistenceUnit::validate
        let pragma_sql = format!(
            "PRAGMA journal_mode = {};
             PRAGMA synchronous = {};
             PRAGMA foreign_keys = {};
             PRAGMA temp_store = MEMORY;",
            self.unit.journal_mode,
            self.unit.synchronous,
            if self.unit.foreign_keys { "ON" } else { "OFF" },
        );
        conn.execute_batch(&pragma_sql)
            .map_err(|e| StoreError::connection(&self.unit.database, e))?;
        conn.busy_timeout(Duration::from_millis(self.unit.busy_timeout_ms))?;

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(conn)
    }

    pub fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        if self.is_closed() {
            return Err(StoreError::FactoryClosed);
        }
        let conn = self.idle.lock().pop();
        let conn = match conn {
            Some(conn) => conn,
            None => self.connect()?,
        };
        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
        })
    }

    fn release(&self, conn: Connection) {
        if self.is_closed() {
            debug!("Pool closed, dropping returned connection");
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.unit.pool_size {
            idle.push(conn);
        }
    }

    /// Mark the pool closed and drop idle connections. Returns how many were
    /// dropped; connections still checked out are dropped when released.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        let drained: Vec<Connection> = self.idle.lock().drain(..).collect();
        let count = drained.len();
        drop(drained);
        info!("Closed connection pool for unit '{}' ({} idle connections)", self.unit.name, count);
        count
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle.lock().len(),
            opened: self.opened.load(Ordering::SeqCst),
            closed: self.is_closed(),
        }
    }
}

/// Connection checked out of a pool; goes back on drop
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<ConnectionPool>,
}

impl PooledConnection {
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection is only taken on drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection is only taken on drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
