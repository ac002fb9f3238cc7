// Module for session management
pub mod executor;
pub mod factory;
pub mod handle;
pub mod pool;
pub mod shared;
pub mod transaction;

pub use executor::Executor;
pub use factory::SessionFactory;
pub use handle::Session;
pub use pool::{ConnectionPool, PoolStats, PooledConnection};
pub use shared::{SharedFactory, close_factory, get_session, global};
pub use transaction::Transaction;
