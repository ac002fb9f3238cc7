//! Staff queries: filters, grouping, aggregates, paging and bulk writes.

use std::time::Duration;

use serde::Serialize;

use crate::entity::Employee;
use crate::error::Result;
use crate::query::{Delete, Expr, Order, Param, Select, Update, eq, gt, in_list, like};
use crate::session::{Executor, Session};

/// Per-name row count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub name: String,
    pub count: i64,
}

/// Every employee, read-only and bounded to one second
pub fn all_employees(db: &impl Executor) -> Result<Vec<Employee>> {
    let query = Select::from::<Employee>("e")
        .order_by("e.id", Order::Asc)
        .timeout(Duration::from_millis(1000))
        .read_only(true);
    db.list(&query)
}

/// Names only, alphabetically
pub fn employee_names(db: &impl Executor) -> Result<Vec<String>> {
    let query = Select::from::<Employee>("e")
        .select(["e.name"])
        .order_by("e.name", Order::Asc);
    db.rows(&query)?
        .iter()
        .map(|row| -> Result<String> { Ok(row.get(0)?) })
        .collect()
}

pub fn employees_by_salary_desc(db: &impl Executor) -> Result<Vec<Employee>> {
    db.list(&Select::from::<Employee>("e").order_by("e.salary", Order::Desc))
}

/// `select count(e.name), e.name from Employee e group by e.name`, or with
/// `count(distinct e.name)` when `distinct` is set
pub fn count_by_name(db: &impl Executor, distinct: bool) -> Result<Vec<GroupCount>> {
    let count = if distinct {
        Expr::count_distinct("e.name")
    } else {
        Expr::count("e.name")
    };
    let query = Select::from::<Employee>("e")
        .select([count, Expr::field("e.name")])
        .group_by("e.name")
        .order_by("e.name", Order::Asc);
    db.rows(&query)?
        .iter()
        .map(|row| -> Result<GroupCount> {
            Ok(GroupCount {
                count: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .collect()
}

/// Exact match on a named parameter
pub fn employees_named(db: &impl Executor, name: &str) -> Result<Vec<Employee>> {
    let query = Select::from::<Employee>("e")
        .filter(eq("e.name", Param::named("name")))
        .order_by("e.id", Order::Asc)
        .bind("name", name);
    db.list(&query)
}

/// Positional name parameter combined with a named salary bound
pub fn employees_named_earning_over(db: &impl Executor, name: &str, salary: i32) -> Result<Vec<Employee>> {
    let query = Select::from::<Employee>("e")
        .filter(eq("e.name", Param::positional(0)))
        .filter(gt("e.salary", Param::named("salary")))
        .order_by("e.id", Order::Asc)
        .bind_positional(0, name)
        .bind("salary", salary);
    db.list(&query)
}

pub fn employees_with_ids(db: &impl Executor, ids: &[i64]) -> Result<Vec<Employee>> {
    let query = Select::from::<Employee>("e")
        .filter(in_list("e.id", Param::named("ids")))
        .order_by("e.id", Order::Asc)
        .bind_list("ids", ids.iter().copied());
    db.list(&query)
}

/// `LIKE` filter ordered by name; the pattern carries its own wildcards
pub fn employees_matching(db: &impl Executor, pattern: &str) -> Result<Vec<Employee>> {
    let query = Select::from::<Employee>("e")
        .filter(like("e.name", Param::named("pattern")))
        .order_by("e.name", Order::Asc)
        .order_by("e.id", Order::Asc)
        .bind("pattern", pattern);
    db.list(&query)
}

pub fn max_salary(db: &impl Executor) -> Result<Option<i64>> {
    db.scalar(&Select::from::<Employee>("e").select([Expr::max("e.salary")]))
}

/// Zero-based page of employees in identity order. Pages whose offset does
/// not fit in a `u64` lie past every row and are empty.
pub fn employee_page(db: &impl Executor, page: u64, page_size: u64) -> Result<Vec<Employee>> {
    let Some(offset) = page.checked_mul(page_size) else {
        return Ok(Vec::new());
    };
    let query = Select::from::<Employee>("e")
        .order_by("e.id", Order::Asc)
        .first_result(offset)
        .max_results(page_size);
    db.list(&query)
}

/// `update Employee e set e.age = :age where e.name = :name`
pub fn set_age_for_name(session: &mut Session, name: &str, age: i32) -> Result<usize> {
    let update = Update::of::<Employee>("e")
        .set("e.age", Param::named("age"))
        .filter(eq("e.name", Param::named("name")))
        .bind("age", age)
        .bind("name", name);
    session.transactional(|tx| tx.execute(&update))
}

pub fn delete_by_id(id: i64) -> Delete {
    Delete::from::<Employee>("e")
        .filter(eq("e.id", Param::named("id")))
        .bind("id", id)
}

/// `delete from Employee e where e.id = :id`
pub fn delete_employee(session: &mut Session, id: i64) -> Result<usize> {
    let delete = delete_by_id(id);
    session.transactional(|tx| tx.execute(&delete))
}
