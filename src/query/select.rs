use std::fmt;
use std::time::Duration;

use rusqlite::types::Value;

use super::param::{Bindings, IntoValue};
use super::predicate::{Field, Predicate};
use super::render::{RenderedSql, Scope, SqlWriter};
use crate::entity::{Entity, EntityMeta};
use crate::error::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Selected expression of a scalar projection
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(Field),
    Count { field: Field, distinct: bool },
    CountAll,
    Max(Field),
    Min(Field),
    Sum(Field),
    Avg(Field),
}

impl Expr {
    pub fn field(path: &str) -> Self {
        Expr::Field(Field::parse(path))
    }

    pub fn count(path: &str) -> Self {
        Expr::Count {
            field: Field::parse(path),
            distinct: false,
        }
    }

    pub fn count_distinct(path: &str) -> Self {
        Expr::Count {
            field: Field::parse(path),
            distinct: true,
        }
    }

    pub fn max(path: &str) -> Self {
        Expr::Max(Field::parse(path))
    }

    pub fn min(path: &str) -> Self {
        Expr::Min(Field::parse(path))
    }

    pub fn sum(path: &str) -> Self {
        Expr::Sum(Field::parse(path))
    }

    pub fn avg(path: &str) -> Self {
        Expr::Avg(Field::parse(path))
    }

    fn render(&self, scope: &Scope) -> Result<String, QueryError> {
        let aggregate = |name: &str, field: &Field| -> Result<String, QueryError> {
            Ok(format!("{}({})", name, scope.column(field)?))
        };
        match self {
            Expr::Field(field) => scope.column(field),
            Expr::Count { field, distinct: false } => aggregate("COUNT", field),
            Expr::Count { field, distinct: true } => {
                Ok(format!("COUNT(DISTINCT {})", scope.column(field)?))
            }
            Expr::CountAll => Ok("COUNT(*)".to_string()),
            Expr::Max(field) => aggregate("MAX", field),
            Expr::Min(field) => aggregate("MIN", field),
            Expr::Sum(field) => aggregate("SUM", field),
            Expr::Avg(field) => aggregate("AVG", field),
        }
    }
}

impl From<&str> for Expr {
    fn from(path: &str) -> Self {
        Expr::field(path)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Field(field) => write!(f, "{field}"),
            Expr::Count { field, distinct: false } => write!(f, "count({field})"),
            Expr::Count { field, distinct: true } => write!(f, "count(distinct {field})"),
            Expr::CountAll => write!(f, "count(*)"),
            Expr::Max(field) => write!(f, "max({field})"),
            Expr::Min(field) => write!(f, "min({field})"),
            Expr::Sum(field) => write!(f, "sum({field})"),
            Expr::Avg(field) => write!(f, "avg({field})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Projection {
    /// Whole entity of the alias, root when `None`
    Entity(Option<String>),
    Exprs(Vec<Expr>),
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    /// `alias.relation`
    path: Field,
    alias: String,
    on: Option<Predicate>,
}

/// Execution hints applied around a single statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hints {
    /// Interrupt the statement once it runs longer than this
    pub timeout: Option<Duration>,
    /// Run with `PRAGMA query_only` so the statement cannot write
    pub read_only: bool,
}

/// SELECT query over an entity and its relations
#[derive(Debug, Clone)]
pub struct Select {
    root: &'static EntityMeta,
    root_alias: String,
    joins: Vec<Join>,
    projection: Projection,
    distinct: bool,
    filter: Option<Predicate>,
    group_by: Vec<Field>,
    order_by: Vec<(Expr, Order)>,
    first_result: Option<u64>,
    max_results: Option<u64>,
    bindings: Bindings,
    hints: Hints,
}

/// Rendered SELECT plus the entity whose rows it projects, if any
#[derive(Debug, Clone)]
pub struct RenderedSelect {
    pub sql: RenderedSql,
    pub entity: Option<&'static EntityMeta>,
}

impl Select {
    /// `from E as alias`
    pub fn from<E: Entity>(alias: &str) -> Self {
        Self::from_meta(E::meta(), alias)
    }

    pub fn from_meta(meta: &'static EntityMeta, alias: &str) -> Self {
        Select {
            root: meta,
            root_alias: alias.to_string(),
            joins: Vec::new(),
            projection: Projection::Entity(None),
            distinct: false,
            filter: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            first_result: None,
            max_results: None,
            bindings: Bindings::default(),
            hints: Hints::default(),
        }
    }

    /// Join a relation, given as `alias.relation`, under a new alias
    pub fn join(mut self, kind: JoinKind, relation: &str, alias: &str) -> Self {
        self.joins.push(Join {
            kind,
            path: Field::parse(relation),
            alias: alias.to_string(),
            on: None,
        });
        self
    }

    /// Join with an additional condition in the `ON` clause
    pub fn join_on(mut self, kind: JoinKind, relation: &str, alias: &str, on: Predicate) -> Self {
        self.joins.push(Join {
            kind,
            path: Field::parse(relation),
            alias: alias.to_string(),
            on: Some(on),
        });
        self
    }

    /// Project the whole entity behind `alias` instead of the root
    pub fn select_entity(mut self, alias: &str) -> Self {
        self.projection = Projection::Entity(Some(alias.to_string()));
        self
    }

    pub fn select<I, X>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = X>,
        X: Into<Expr>,
    {
        self.projection = Projection::Exprs(exprs.into_iter().map(Into::into).collect());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a condition; repeated calls are combined with AND
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn group_by(mut self, field: &str) -> Self {
        self.group_by.push(Field::parse(field));
        self
    }

    pub fn order_by(mut self, expr: impl Into<Expr>, order: Order) -> Self {
        self.order_by.push((expr.into(), order));
        self
    }

    /// Number of rows to skip
    pub fn first_result(mut self, offset: u64) -> Self {
        self.first_result = Some(offset);
        self
    }

    /// Maximum number of rows to return
    pub fn max_results(mut self, limit: u64) -> Self {
        self.max_results = Some(limit);
        self
    }

    pub fn bind(mut self, name: &str, value: impl IntoValue) -> Self {
        self.bindings.bind(name, value);
        self
    }

    pub fn bind_positional(mut self, index: usize, value: impl IntoValue) -> Self {
        self.bindings.bind_positional(index, value);
        self
    }

    pub fn bind_list<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        self.bindings.bind_list(name, values);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.hints.timeout = Some(timeout);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.hints.read_only = read_only;
        self
    }

    pub fn hints(&self) -> Hints {
        self.hints
    }

    pub fn render(&self) -> Result<RenderedSelect, QueryError> {
        let mut scope = Scope::qualified(&self.root_alias, self.root);

        // Resolve every alias before writing, projections may name joined ones
        let mut join_clauses = Vec::with_capacity(self.joins.len());
        for join in &self.joins {
            let from = scope.entry(join.path.alias.as_deref())?.clone();
            let relation = from
                .meta
                .relation(&join.path.name)
                .ok_or_else(|| QueryError::UnknownRelation {
                    entity: from.meta.name,
                    relation: join.path.name.clone(),
                })?;
            let to = scope.add(&join.alias, relation.target)?.clone();
            let clause = format!(
                " {} {} {} ON {} = {}",
                match join.kind {
                    JoinKind::Inner => "INNER JOIN",
                    JoinKind::Left => "LEFT JOIN",
                },
                relation.target.table,
                to.sql_alias,
                scope.qualify_column(&to, relation.foreign_key),
                scope.qualify_column(&from, from.meta.id),
            );
            join_clauses.push((clause, join.on.as_ref()));
        }

        let (columns, entity) = match &self.projection {
            Projection::Entity(alias) => {
                if !self.group_by.is_empty() {
                    return Err(QueryError::GroupByEntity);
                }
                let entry = scope.entry(alias.as_deref())?;
                let columns: Vec<String> = entry
                    .meta
                    .all_columns()
                    .map(|c| scope.qualify_column(entry, c))
                    .collect();
                (columns, Some(entry.meta))
            }
            Projection::Exprs(exprs) => {
                let columns = exprs
                    .iter()
                    .map(|e| e.render(&scope))
                    .collect::<Result<Vec<_>, _>>()?;
                (columns, None)
            }
        };

        let mut writer = SqlWriter::new(&self.bindings);
        writer.push("SELECT ");
        if self.distinct {
            writer.push("DISTINCT ");
        }
        writer.push(&columns.join(", "));
        writer.push(" FROM ");
        writer.push(self.root.table);
        writer.push(" ");
        writer.push(&scope.root().sql_alias);

        for (clause, on) in join_clauses {
            writer.push(&clause);
            if let Some(on) = on {
                writer.push(" AND ");
                writer.predicate(&scope, on)?;
            }
        }

        if let Some(filter) = &self.filter {
            writer.push(" WHERE ");
            writer.predicate(&scope, filter)?;
        }

        if !self.group_by.is_empty() {
            let columns = self
                .group_by
                .iter()
                .map(|f| scope.column(f))
                .collect::<Result<Vec<_>, _>>()?;
            writer.push(" GROUP BY ");
            writer.push(&columns.join(", "));
        }

        if !self.order_by.is_empty() {
            let terms = self
                .order_by
                .iter()
                .map(|(expr, order)| {
                    let direction = match order {
                        Order::Asc => "ASC",
                        Order::Desc => "DESC",
                    };
                    expr.render(&scope).map(|sql| format!("{sql} {direction}"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            writer.push(" ORDER BY ");
            writer.push(&terms.join(", "));
        }

        match (self.max_results, self.first_result) {
            (None, None) => {}
            (limit, offset) => {
                writer.push(" LIMIT ");
                match limit {
                    Some(limit) => writer.value(row_count(limit)),
                    None => writer.push("-1"),
                }
                if let Some(offset) = offset {
                    writer.push(" OFFSET ");
                    writer.value(row_count(offset));
                }
            }
        }

        Ok(RenderedSelect {
            sql: writer.finish()?,
            entity,
        })
    }
}

fn row_count(n: u64) -> Value {
    Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Author, Employee};
    use crate::query::param::Param;
    use crate::query::predicate::{eq, gt};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entity_projection() {
        let rendered = Select::from::<Employee>("e")
            .order_by("e.salary", Order::Desc)
            .render()
            .unwrap();
        assert_eq!(
            rendered.sql.sql,
            "SELECT t0.id, t0.name, t0.age, t0.salary FROM employee t0 ORDER BY t0.salary DESC"
        );
        assert!(rendered.entity.unwrap().same_as(Employee::meta()));
    }

    #[test]
    fn test_group_by_with_count() {
        let rendered = Select::from::<Employee>("e")
            .select([Expr::count_distinct("e.name"), Expr::field("e.name")])
            .group_by("e.name")
            .render()
            .unwrap();
        assert_eq!(
            rendered.sql.sql,
            "SELECT COUNT(DISTINCT t0.name), t0.name FROM employee t0 GROUP BY t0.name"
        );
        assert!(rendered.entity.is_none());
    }

    #[test]
    fn test_left_join_distinct() {
        let rendered = Select::from::<Author>("a")
            .join(JoinKind::Left, "a.books", "b")
            .filter(eq("b.title", Param::named("title")))
            .distinct()
            .bind("title", "War & Piece")
            .render()
            .unwrap();
        assert_eq!(
            rendered.sql.sql,
            "SELECT DISTINCT t0.id, t0.name FROM author t0 \
             LEFT JOIN book t1 ON t1.author_id = t0.id WHERE t1.title = ?"
        );
        assert_eq!(
            rendered.sql.values,
            vec![Value::Text("War & Piece".to_string())]
        );
    }

    #[test]
    fn test_join_on_condition() {
        let rendered = Select::from::<Author>("a")
            .join_on(
                JoinKind::Inner,
                "a.books",
                "b",
                eq("b.title", Param::value("War & Piece")),
            )
            .distinct()
            .render()
            .unwrap();
        assert_eq!(
            rendered.sql.sql,
            "SELECT DISTINCT t0.id, t0.name FROM author t0 \
             INNER JOIN book t1 ON t1.author_id = t0.id AND t1.title = ?"
        );
    }

    #[test]
    fn test_nested_collection_projection() {
        let rendered = Select::from::<Author>("a")
            .join(JoinKind::Inner, "a.books", "b")
            .select_entity("b")
            .render()
            .unwrap();
        assert!(rendered.sql.sql.starts_with("SELECT t1.id, t1.title, t1.year, t1.author_id FROM author t0"));
        assert_eq!(rendered.entity.unwrap().name, "Book");
    }

    #[test]
    fn test_paging_values_follow_filter_values() {
        let rendered = Select::from::<Employee>("e")
            .filter(gt("e.salary", Param::value(1000)))
            .first_result(4)
            .max_results(2)
            .render()
            .unwrap();
        assert!(rendered.sql.sql.ends_with("WHERE t0.salary > ? LIMIT ? OFFSET ?"));
        assert_eq!(
            rendered.sql.values,
            vec![Value::Integer(1000), Value::Integer(2), Value::Integer(4)]
        );

        let offset_only = Select::from::<Employee>("e").first_result(3).render().unwrap();
        assert!(offset_only.sql.sql.ends_with("LIMIT -1 OFFSET ?"));
    }

    #[test]
    fn test_render_errors() {
        let err = Select::from::<Author>("a")
            .join(JoinKind::Left, "a.essays", "b")
            .render()
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::UnknownRelation {
                entity: "Author",
                relation: "essays".to_string()
            }
        );

        let err = Select::from::<Author>("a")
            .join(JoinKind::Left, "a.books", "a")
            .render()
            .unwrap_err();
        assert_eq!(err, QueryError::DuplicateAlias("a".to_string()));

        let err = Select::from::<Employee>("e")
            .group_by("e.name")
            .render()
            .unwrap_err();
        assert_eq!(err, QueryError::GroupByEntity);
    }
}
