use std::fmt;

use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use super::{Entity, EntityMeta};
use crate::error::QueryError;

pub static EMPLOYEE: EntityMeta = EntityMeta {
    name: "Employee",
    table: "employee",
    id: "id",
    fields: &["name", "age", "salary"],
    relations: &[],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: Option<i64>,
    pub name: String,
    pub age: i32,
    pub salary: i32,
}

impl Employee {
    pub fn new(name: impl Into<String>, age: i32, salary: i32) -> Self {
        Employee {
            id: None,
            name: name.into(),
            age,
            salary,
        }
    }
}

impl Entity for Employee {
    fn meta() -> &'static EntityMeta {
        &EMPLOYEE
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn field_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            Value::Integer(self.age.into()),
            Value::Integer(self.salary.into()),
        ]
    }

    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Employee {
            id: Some(row.get(offset)?),
            name: row.get(offset + 1)?,
            age: row.get(offset + 2)?,
            salary: row.get(offset + 3)?,
        })
    }

    fn check(&self) -> Result<(), QueryError> {
        if self.name.is_empty() {
            return Err(QueryError::InvalidEntity(
                "employee name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Employee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Employee{{id=")?;
        match self.id {
            Some(id) => write!(f, "{id}")?,
            None => write!(f, "null")?,
        }
        write!(
            f,
            ", name='{}', age={}, salary={}}}",
            self.name, self.age, self.salary
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_record_shape() {
        let mut employee = Employee::new("Yulij", 30, 8500);
        assert_eq!(
            employee.to_string(),
            "Employee{id=null, name='Yulij', age=30, salary=8500}"
        );
        employee.set_id(1);
        assert_eq!(
            employee.to_string(),
            "Employee{id=1, name='Yulij', age=30, salary=8500}"
        );
    }

    #[test]
    fn test_meta_columns() {
        assert_eq!(EMPLOYEE.column("salary"), Some("salary"));
        assert_eq!(EMPLOYEE.column("id"), Some("id"));
        assert_eq!(EMPLOYEE.column("wage"), None);
        let columns: Vec<_> = EMPLOYEE.all_columns().collect();
        assert_eq!(columns, vec!["id", "name", "age", "salary"]);
    }
}
