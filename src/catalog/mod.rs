//! Catalog of representative queries against the sample library and staff.
//!
//! Every entry goes through a [`Session`] and the typed query API; nothing
//! here builds SQL from caller input.

pub mod employees;
pub mod library;
pub mod projections;

use clap::ValueEnum;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::entity::{Author, Employee};
use crate::error::Result;
use crate::query::{Expr, Select};
use crate::session::{Executor, Session};

pub use employees::{
    GroupCount, all_employees, count_by_name, delete_by_id, delete_employee, employee_names,
    employee_page, employees_by_salary_desc, employees_matching, employees_named,
    employees_named_earning_over, employees_with_ids, max_salary, set_age_for_name,
};
pub use library::{authors_with_books, authors_with_title, authors_with_title_on, books_of_authors};
pub use projections::{Emp, NameCount, employee_salaries, name_counts, salaries_from};

/// Staff rows of the sample fixture: name, age, salary
pub const STAFF: [(&str, i32, i32); 5] = [
    ("Yulij", 30, 8500),
    ("Alex", 28, 5500),
    ("Sergey", 40, 7500),
    ("Yulij", 40, 9500),
    ("Maria", 28, 3500),
];

/// Authors of the sample fixture with their books
pub const LIBRARY: [(&str, &[(&str, i32)]); 2] = [
    (
        "Tolstoy",
        &[("Alice", 1872), ("War & Piece", 1869), ("Philipok", 1865)],
    ),
    (
        "Pikul",
        &[("Barbarossa", 2012), ("Favorit", 1978), ("By pen & sword", 1992)],
    ),
];

pub const PAGE_SIZE: u64 = 2;

/// Identities assigned while seeding
#[derive(Debug, Clone, Default, Serialize)]
pub struct Seeded {
    pub authors: Vec<i64>,
    pub books: usize,
    pub employees: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Example {
    AllEmployees,
    EmployeeNames,
    Books,
    PikulBooks,
    CountByName,
    CountDistinctByName,
    NamedYulij,
    #[value(name = "named-yulij-over-5000")]
    NamedYulijOver5000,
    EmployeesWithIds,
    NameLike,
    BySalaryDesc,
    UpdateAge,
    DeleteEmployee,
    MaxSalary,
    LeftJoin,
    InnerJoinOn,
    Pages,
    Salaries,
    NameCounts,
}

impl Example {
    pub const ALL: [Example; 19] = [
        Example::AllEmployees,
        Example::EmployeeNames,
        Example::Books,
        Example::PikulBooks,
        Example::CountByName,
        Example::CountDistinctByName,
        Example::NamedYulij,
        Example::NamedYulijOver5000,
        Example::EmployeesWithIds,
        Example::NameLike,
        Example::BySalaryDesc,
        Example::UpdateAge,
        Example::DeleteEmployee,
        Example::MaxSalary,
        Example::LeftJoin,
        Example::InnerJoinOn,
        Example::Pages,
        Example::Salaries,
        Example::NameCounts,
    ];

    /// Name as accepted on the command line
    pub fn name(self) -> String {
        self.to_possible_value()
            .map(|value| value.get_name().to_string())
            .unwrap_or_default()
    }

    pub fn describe(self) -> &'static str {
        match self {
            Example::AllEmployees => "select e from Employee e",
            Example::EmployeeNames => "select e.name from Employee e order by e.name",
            Example::Books => "select a.books from Author a",
            Example::PikulBooks => "select a.books from Author a where a.name = 'Pikul'",
            Example::CountByName => "select count(e.name), e.name from Employee e group by e.name",
            Example::CountDistinctByName => {
                "select count(distinct e.name), e.name from Employee e group by e.name"
            }
            Example::NamedYulij => "select e from Employee e where e.name = :name",
            Example::NamedYulijOver5000 => {
                "select e from Employee e where e.name = ?0 and e.salary > :salary"
            }
            Example::EmployeesWithIds => "select e from Employee e where e.id in (:ids)",
            Example::NameLike => "select e from Employee e where e.name like :pattern order by e.name",
            Example::BySalaryDesc => "select e from Employee e order by e.salary desc",
            Example::UpdateAge => "update Employee e set e.age = :age where e.name = :name",
            Example::DeleteEmployee => "delete from Employee e where e.id = :id",
            Example::MaxSalary => "select max(e.salary) from Employee e",
            Example::LeftJoin => {
                "select distinct a from Author a left join a.books b where b.title = :title"
            }
            Example::InnerJoinOn => {
                "select distinct a from Author a inner join a.books b on b.title = :title"
            }
            Example::Pages => "select e from Employee e, paged by first/max results",
            Example::Salaries => "native: select e.name as firstName, e.salary as money",
            Example::NameCounts => "native: select count(e.name) as cnt, e.name as empName",
        }
    }
}

/// Insert the sample library and staff in one transaction
pub fn seed(session: &mut Session) -> Result<Seeded> {
    let seeded = session.transactional(|tx| {
        let mut seeded = Seeded::default();
        for (name, books) in LIBRARY {
            let mut author = Author::new(name);
            for (title, year) in books {
                author.add_book(*title, *year);
            }
            seeded.authors.push(tx.persist(&mut author)?);
            seeded.books += author.books.len();
        }
        for (name, age, salary) in STAFF {
            let mut employee = Employee::new(name, age, salary);
            seeded.employees.push(tx.persist(&mut employee)?);
        }
        Ok(seeded)
    })?;
    info!(
        "Seeded {} authors, {} books, {} employees",
        seeded.authors.len(),
        seeded.books,
        seeded.employees.len()
    );
    Ok(seeded)
}

/// Run one catalog entry and render its result as JSON
pub fn run(example: Example, session: &mut Session) -> Result<Value> {
    debug!("Running example {}: {}", example.name(), example.describe());
    let value = match example {
        Example::AllEmployees => serde_json::to_value(all_employees(session)?)?,
        Example::EmployeeNames => serde_json::to_value(employee_names(session)?)?,
        Example::Books => serde_json::to_value(books_of_authors(session, None)?)?,
        Example::PikulBooks => serde_json::to_value(books_of_authors(session, Some("Pikul"))?)?,
        Example::CountByName => serde_json::to_value(count_by_name(session, false)?)?,
        Example::CountDistinctByName => serde_json::to_value(count_by_name(session, true)?)?,
        Example::NamedYulij => serde_json::to_value(employees_named(session, "Yulij")?)?,
        Example::NamedYulijOver5000 => {
            serde_json::to_value(employees_named_earning_over(session, "Yulij", 5000)?)?
        }
        Example::EmployeesWithIds => serde_json::to_value(employees_with_ids(session, &[1, 2, 4])?)?,
        Example::NameLike => serde_json::to_value(employees_matching(session, "%er%")?)?,
        Example::BySalaryDesc => serde_json::to_value(employees_by_salary_desc(session)?)?,
        Example::UpdateAge => json!({ "updated": set_age_for_name(session, "Yulij", 35)? }),
        Example::DeleteEmployee => {
            let mut tuk = Employee::new("Tuk", 33, 4000);
            let id = session.transactional(|tx| tx.persist(&mut tuk))?;
            json!({ "id": id, "deleted": delete_employee(session, id)? })
        }
        Example::MaxSalary => json!({ "max": max_salary(session)? }),
        Example::LeftJoin => serde_json::to_value(authors_with_title(session, "By pen & sword")?)?,
        Example::InnerJoinOn => {
            serde_json::to_value(authors_with_title_on(session, "By pen & sword")?)?
        }
        Example::Pages => {
            let mut pages = Vec::new();
            for page in 0.. {
                let rows = employee_page(session, page, PAGE_SIZE)?;
                if rows.is_empty() {
                    break;
                }
                pages.push(rows);
            }
            serde_json::to_value(pages)?
        }
        Example::Salaries => serde_json::to_value(employee_salaries(session)?)?,
        Example::NameCounts => serde_json::to_value(name_counts(session)?)?,
    };
    Ok(value)
}

/// Every catalog entry with its query shape
pub fn listing() -> Value {
    Value::Array(
        Example::ALL
            .iter()
            .map(|example| json!({ "name": example.name(), "query": example.describe() }))
            .collect(),
    )
}

/// Number of stored employees, used by the CLI to decide whether to seed
pub fn employee_count(db: &impl Executor) -> Result<i64> {
    let query = Select::from::<Employee>("e").select([Expr::CountAll]);
    Ok(db.scalar(&query)?.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistenceUnit;
    use crate::session::SessionFactory;
    use pretty_assertions::assert_eq;

    fn seeded_session(name: &str) -> (SessionFactory, Session) {
        let factory = SessionFactory::build(&PersistenceUnit::in_memory(name)).unwrap();
        let mut session = factory.open_session().unwrap();
        seed(&mut session).unwrap();
        (factory, session)
    }

    #[test]
    fn test_seed_fixture() {
        let (_factory, mut session) = seeded_session("catalog-seed");
        let authors = authors_with_books(&session).unwrap();
        assert_eq!(authors.len(), 2);
        assert_eq!(authors[1].name, "Pikul");
        assert_eq!(authors[1].books.len(), 3);
        assert_eq!(employee_count(&session).unwrap(), 5);

        let value = run(Example::MaxSalary, &mut session).unwrap();
        assert_eq!(value, json!({ "max": 9500 }));
    }

    #[test]
    fn test_every_example_runs() {
        let (_factory, mut session) = seeded_session("catalog-all");
        for example in Example::ALL {
            let value = run(example, &mut session).unwrap();
            assert!(!value.is_null(), "{} returned null", example.name());
        }
    }

    #[test]
    fn test_example_names() {
        assert_eq!(Example::NamedYulijOver5000.name(), "named-yulij-over-5000");
        assert_eq!(Example::AllEmployees.name(), "all-employees");
        assert_eq!(listing().as_array().map(Vec::len), Some(Example::ALL.len()));
    }

    #[test]
    fn test_pages_cover_staff() {
        let (_factory, mut session) = seeded_session("catalog-pages");
        let value = run(Example::Pages, &mut session).unwrap();
        let pages = value.as_array().unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2].as_array().map(Vec::len), Some(1));
    }
}
