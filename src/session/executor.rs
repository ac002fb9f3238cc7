use rusqlite::Connection;
use rusqlite::types::FromSql;
use serde::de::DeserializeOwned;

use crate::entity::{Entity, Relation};
use crate::error::Result;
use crate::query::exec;
use crate::query::{NativeQuery, Row, Select};

/// Read operations shared by sessions and transactions
pub trait Executor {
    /// Connection to run on; fails once the owning factory is closed
    fn connection(&self) -> Result<&Connection>;

    /// Entities projected by `query`
    fn list<E: Entity>(&self, query: &Select) -> Result<Vec<E>> {
        exec::list(self.connection()?, query)
    }

    /// Raw rows of a scalar or entity projection
    fn rows(&self, query: &Select) -> Result<Vec<Row>> {
        exec::rows(self.connection()?, query)
    }

    /// First column of the first row
    fn scalar<T: FromSql>(&self, query: &Select) -> Result<Option<T>> {
        exec::scalar(self.connection()?, query)
    }

    /// Native SQL mapped onto `T` by column alias
    fn native<T: DeserializeOwned>(&self, query: &NativeQuery) -> Result<Vec<T>> {
        exec::native(self.connection()?, query)
    }

    fn find<E: Entity>(&self, id: i64) -> Result<Option<E>> {
        exec::find(self.connection()?, id)
    }

    /// Targets of a one-to-many relation for one owner
    fn load_collection<T: Entity>(&self, relation: &'static Relation, owner_id: i64) -> Result<Vec<T>> {
        exec::load_collection(self.connection()?, relation, owner_id)
    }
}
