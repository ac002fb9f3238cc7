use std::sync::Arc;

use rusqlite::Connection;
use tracing::{debug, error, warn};

use super::executor::Executor;
use super::pool::ConnectionPool;
use crate::entity::Entity;
use crate::error::{QueryError, Result, StoreError};
use crate::query::BulkStatement;
use crate::query::exec;

/// Unit of work on one session. Writes only happen here. Dropping a
/// transaction without `commit` rolls it back.
pub struct Transaction<'s> {
    tx: Option<rusqlite::Transaction<'s>>,
    pool: Arc<ConnectionPool>,
}

impl<'s> Transaction<'s> {
    pub(crate) fn new(tx: rusqlite::Transaction<'s>, pool: Arc<ConnectionPool>) -> Self {
        Transaction { tx: Some(tx), pool }
    }

    /// Insert a transient entity and assign its identity. Related entities
    /// follow when their relation cascades on persist.
    pub fn persist<E: Entity>(&self, entity: &mut E) -> Result<i64> {
        if let Some(id) = entity.id() {
            return Err(QueryError::InvalidEntity(format!(
                "{} {} is already persistent",
                E::meta().name,
                id
            ))
            .into());
        }
        entity.check()?;
        let id = exec::insert(self.connection()?, entity)?;
        entity.set_id(id);
        debug!("Persisted {} {}", E::meta().name, id);
        entity.cascade_persist(self)?;
        Ok(id)
    }

    /// Write all fields of a persistent entity; false if its row is gone
    pub fn merge<E: Entity>(&self, entity: &E) -> Result<bool> {
        let id = entity.id().ok_or_else(|| {
            QueryError::InvalidEntity(format!("{} has not been persisted", E::meta().name))
        })?;
        entity.check()?;
        exec::update_entity(self.connection()?, id, entity)
    }

    /// Delete by identity; false if there was no such row
    pub fn remove<E: Entity>(&self, id: i64) -> Result<bool> {
        exec::remove::<E>(self.connection()?, id)
    }

    /// Run a bulk update or delete, returning the affected row count
    pub fn execute(&self, statement: &impl BulkStatement) -> Result<usize> {
        exec::bulk(self.connection()?, statement)
    }

    pub fn commit(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.commit()
            .map_err(|e| StoreError::Transaction(format!("commit failed, changes rolled back: {e}")))
    }

    pub fn rollback(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.rollback()
            .map_err(|e| StoreError::Transaction(format!("rollback failed: {e}")))
    }

    fn take(&mut self) -> Result<rusqlite::Transaction<'s>> {
        if self.pool.is_closed() {
            return Err(StoreError::FactoryClosed);
        }
        self.tx
            .take()
            .ok_or_else(|| StoreError::Transaction("transaction already finished".to_string()))
    }
}

impl Executor for Transaction<'_> {
    fn connection(&self) -> Result<&Connection> {
        if self.pool.is_closed() {
            return Err(StoreError::FactoryClosed);
        }
        self.tx
            .as_ref()
            .map(|tx| &**tx)
            .ok_or_else(|| StoreError::Transaction("transaction already finished".to_string()))
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            warn!("Transaction dropped without commit, rolling back");
            if let Err(e) = tx.rollback() {
                error!("Rollback failed: {}", e);
            }
        }
    }
}
