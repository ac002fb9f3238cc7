pub mod catalog;
pub mod config;
pub mod entity;
pub mod error;
pub mod migration;
pub mod query;
pub mod session;

pub use config::{DEFAULT_UNIT, PersistenceUnit, SchemaAction};
pub use entity::{Author, Book, Employee, Entity};
pub use error::{QueryError, Result, StoreError};
pub use session::{Executor, Session, SessionFactory, SharedFactory, Transaction};
