//! Native SQL projections mapped onto ad-hoc shapes by column alias.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::{NativeQuery, ScalarType};
use crate::session::Executor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emp {
    #[serde(rename = "firstName")]
    pub first_name: String,
    pub money: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCount {
    #[serde(rename = "empName")]
    pub emp_name: String,
    pub cnt: i64,
}

/// `select e.name as firstName, e.salary as money from employee e`
pub fn employee_salaries(db: &impl Executor) -> Result<Vec<Emp>> {
    let query = NativeQuery::new(
        "SELECT e.name AS firstName, e.salary AS money FROM employee e ORDER BY e.id",
    )
    .scalar("firstName", ScalarType::Text)
    .scalar("money", ScalarType::Integer)
    .read_only(true);
    db.native(&query)
}

pub fn name_counts(db: &impl Executor) -> Result<Vec<NameCount>> {
    let query = NativeQuery::new(
        "SELECT COUNT(e.name) AS cnt, e.name AS empName FROM employee e GROUP BY e.name ORDER BY e.name",
    )
    .scalar("cnt", ScalarType::Integer)
    .scalar("empName", ScalarType::Text);
    db.native(&query)
}

/// Salaries of employees earning at least `min`
pub fn salaries_from(db: &impl Executor, min: i32) -> Result<Vec<Emp>> {
    let query = NativeQuery::new(
        "SELECT e.name AS firstName, e.salary AS money FROM employee e \
         WHERE e.salary >= :min ORDER BY e.salary DESC",
    )
    .bind("min", min);
    db.native(&query)
}
