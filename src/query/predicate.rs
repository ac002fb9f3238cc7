use std::fmt;

use super::param::Param;

/// Reference to an entity field, written `alias.field` or just `field` for
/// the root entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
}

impl Field {
    pub fn parse(path: &str) -> Self {
        match path.split_once('.') {
            Some((alias, name)) => Field {
                alias: Some(alias.to_string()),
                name: name.to_string(),
            },
            None => Field {
                alias: None,
                name: path.to_string(),
            },
        }
    }
}

impl From<&str> for Field {
    fn from(path: &str) -> Self {
        Field::parse(path)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{}.{}", alias, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

/// Filter condition. Built only from fields and parameters, never from SQL
/// fragments.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        field: Field,
        op: CompareOp,
        rhs: Param,
    },
    Like {
        field: Field,
        pattern: Param,
    },
    In {
        field: Field,
        values: Param,
    },
    IsNull(Field),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

fn compare(field: impl Into<Field>, op: CompareOp, rhs: Param) -> Predicate {
    Predicate::Compare {
        field: field.into(),
        op,
        rhs,
    }
}

pub fn eq(field: impl Into<Field>, rhs: Param) -> Predicate {
    compare(field, CompareOp::Eq, rhs)
}

pub fn ne(field: impl Into<Field>, rhs: Param) -> Predicate {
    compare(field, CompareOp::Ne, rhs)
}

pub fn gt(field: impl Into<Field>, rhs: Param) -> Predicate {
    compare(field, CompareOp::Gt, rhs)
}

pub fn ge(field: impl Into<Field>, rhs: Param) -> Predicate {
    compare(field, CompareOp::Ge, rhs)
}

pub fn lt(field: impl Into<Field>, rhs: Param) -> Predicate {
    compare(field, CompareOp::Lt, rhs)
}

pub fn le(field: impl Into<Field>, rhs: Param) -> Predicate {
    compare(field, CompareOp::Le, rhs)
}

/// SQL `LIKE` with `%` and `_` wildcards in the bound pattern
pub fn like(field: impl Into<Field>, pattern: Param) -> Predicate {
    Predicate::Like {
        field: field.into(),
        pattern,
    }
}

/// Membership in a list; `values` must be a `Param::List` or a parameter
/// bound with `bind_list`
pub fn in_list(field: impl Into<Field>, values: Param) -> Predicate {
    Predicate::In {
        field: field.into(),
        values,
    }
}

pub fn is_null(field: impl Into<Field>) -> Predicate {
    Predicate::IsNull(field.into())
}

pub fn not(predicate: Predicate) -> Predicate {
    predicate.negate()
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_parse() {
        assert_eq!(
            Field::parse("e.name"),
            Field {
                alias: Some("e".to_string()),
                name: "name".to_string()
            }
        );
        assert_eq!(Field::parse("salary").alias, None);
        assert_eq!(Field::parse("b.title").to_string(), "b.title");
    }

    #[test]
    fn test_and_flattens() {
        let p = eq("e.name", Param::named("name"))
            .and(gt("e.salary", Param::value(5000)))
            .and(lt("e.age", Param::value(50)));
        match p {
            Predicate::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_not_wraps_predicate() {
        let missing = is_null("b.author_id");
        assert_eq!(not(missing.clone()), Predicate::Not(Box::new(missing)));
    }
}
