use rusqlite::Connection;
use tracing::{error, warn};

use super::executor::Executor;
use super::pool::PooledConnection;
use super::transaction::Transaction;
use crate::error::{Result, StoreError};

/// Short-lived handle on one pooled connection. Reads run in autocommit
/// mode; writes go through [`Session::begin`] or [`Session::transactional`].
pub struct Session {
    id: u64,
    conn: PooledConnection,
}

impl Session {
    pub(crate) fn new(id: u64, conn: PooledConnection) -> Self {
        Session { id, conn }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// False once the factory that issued this session was closed
    pub fn is_open(&self) -> bool {
        !self.conn.pool().is_closed()
    }

    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        if !self.is_open() {
            return Err(StoreError::FactoryClosed);
        }
        let pool = self.conn.pool().clone();
        let tx = self
            .conn
            .transaction()
            .map_err(|e| StoreError::Transaction(format!("cannot begin: {e}")))?;
        Ok(Transaction::new(tx, pool))
    }

    /// Run `f` in a transaction, committing when it returns `Ok` and rolling
    /// back when it returns `Err`
    pub fn transactional<R>(&mut self, f: impl FnOnce(&Transaction<'_>) -> Result<R>) -> Result<R> {
        let id = self.id;
        let tx = self.begin()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                warn!("Rolling back session {} transaction: {}", id, e);
                if let Err(rollback) = tx.rollback() {
                    error!("Rollback failed: {}", rollback);
                    return Err(StoreError::Transaction(format!(
                        "rollback failed after error '{e}': {rollback}"
                    )));
                }
                Err(e)
            }
        }
    }
}

impl Executor for Session {
    fn connection(&self) -> Result<&Connection> {
        if !self.is_open() {
            return Err(StoreError::FactoryClosed);
        }
        Ok(&self.conn)
    }
}
