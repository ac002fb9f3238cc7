// Typed, parameterized queries over the mapped entities
pub mod bulk;
pub mod exec;
pub mod native;
pub mod param;
pub mod predicate;
pub mod render;
pub mod select;

pub use bulk::{BulkStatement, Delete, Update};
pub use exec::Row;
pub use native::{NativeQuery, ScalarType};
pub use param::{Bindings, IntoValue, Param};
pub use predicate::{Field, Predicate, eq, ge, gt, in_list, is_null, le, like, lt, ne, not};
pub use render::RenderedSql;
pub use select::{Expr, Hints, JoinKind, Order, RenderedSelect, Select};
