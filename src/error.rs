use thiserror::Error;

/// Errors surfaced by the store. Nothing is swallowed: every failure in a
/// session, transaction or factory operation ends up here.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot connect to database '{database}': {source}")]
    Connection {
        database: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Session factory is already closed")]
    AlreadyClosed,

    #[error("Session factory was closed while the session was open")]
    FactoryClosed,

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Problems with the shape of a query or its parameters, detected before or
/// while the statement runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("unknown alias '{0}'")]
    UnknownAlias(String),

    #[error("alias '{0}' is already in use")]
    DuplicateAlias(String),

    #[error("entity {entity} has no field '{field}'")]
    UnknownField { entity: &'static str, field: String },

    #[error("entity {entity} has no relation '{relation}'")]
    UnknownRelation { entity: &'static str, relation: String },

    #[error("query projects {projected}, not {requested}")]
    WrongEntity {
        projected: &'static str,
        requested: &'static str,
    },

    #[error("parameter {0} is not bound")]
    Unbound(String),

    #[error("parameter {0} is bound but never used")]
    UnusedBinding(String),

    #[error("positional parameters must be numbered from 0 without gaps, missing ?{0}")]
    PositionalGap(usize),

    #[error("parameter {0} expects a single value, got a list")]
    ListNotAllowed(String),

    #[error("empty value list for 'in' on {0}")]
    EmptyList(String),

    #[error("query selects scalar columns, fetch rows instead of entities")]
    ScalarProjection,

    #[error("group by requires a scalar projection")]
    GroupByEntity,

    #[error("update sets no fields")]
    EmptyUpdate,

    #[error("query exceeded its timeout of {0} ms")]
    Timeout(u128),

    #[error("column '{column}': {message}")]
    Projection { column: String, message: String },

    #[error("invalid entity: {0}")]
    InvalidEntity(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Stable code for each error kind, used in CLI output and logs
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Configuration(_) => "CONFIGURATION",
            StoreError::Connection { .. } => "CONNECTION",
            StoreError::Transaction(_) => "TRANSACTION",
            StoreError::Query(_) => "QUERY",
            StoreError::AlreadyClosed => "ALREADY_CLOSED",
            StoreError::FactoryClosed => "FACTORY_CLOSED",
            StoreError::Migration(_) => "MIGRATION",
            StoreError::Sqlite(_) => "STORAGE",
            StoreError::Serialization(_) => "SERIALIZATION",
        }
    }

    pub(crate) fn connection(database: &str, source: rusqlite::Error) -> Self {
        StoreError::Connection {
            database: database.to_string(),
            source,
        }
    }
}

impl From<config::ConfigError> for StoreError {
    fn from(err: config::ConfigError) -> Self {
        StoreError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(StoreError::AlreadyClosed.code(), "ALREADY_CLOSED");
        assert_eq!(
            StoreError::from(QueryError::Unbound(":name".to_string())).code(),
            "QUERY"
        );
        assert_eq!(
            StoreError::Configuration("missing unit".to_string()).to_string(),
            "Configuration error: missing unit"
        );
    }

    #[test]
    fn test_query_error_messages() {
        let err = QueryError::UnknownField {
            entity: "Employee",
            field: "wage".to_string(),
        };
        assert_eq!(err.to_string(), "entity Employee has no field 'wage'");
        assert_eq!(
            QueryError::PositionalGap(1).to_string(),
            "positional parameters must be numbered from 0 without gaps, missing ?1"
        );
    }
}
