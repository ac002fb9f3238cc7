use std::env;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::catalog::Example;
use crate::error::{Result, StoreError};

/// Unit the process-wide factory binds to when none is given
pub const DEFAULT_UNIT: &str = "library";

/// Units file read when `EMSTORE_UNITS_FILE` is not set
pub const DEFAULT_UNITS_FILE: &str = "persistence.toml";

/// Prefix of environment variables overriding fields of the selected unit
pub const UNIT_ENV_PREFIX: &str = "EMSTORE_UNIT";

#[derive(Parser, Debug, Clone)]
#[command(name = "emstore")]
#[command(about = "emstore - entity store examples on top of SQLite", long_about = None)]
pub struct Config {
    #[arg(short, long, default_value = DEFAULT_UNIT, env = "EMSTORE_UNIT_NAME", help = "Persistence unit to connect with")]
    pub unit: String,

    #[arg(short, long, env = "EMSTORE_DATABASE", help = "Override the database path of the unit")]
    pub database: Option<String>,

    #[arg(long, env = "EMSTORE_UNITS_FILE", help = "TOML file with [units.<name>] tables")]
    pub units_file: Option<PathBuf>,

    #[arg(long, default_value = "info", env = "EMSTORE_LOG_LEVEL")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Apply pending schema migrations
    Migrate,
    /// Insert the sample authors, books and employees
    Seed,
    /// Run one example query and print its result as JSON
    Run {
        #[arg(value_enum)]
        example: Example,
    },
    /// Run every example query in order
    Catalog,
}

impl Config {
    pub fn load() -> Self {
        Config::parse()
    }

    /// Resolve the persistence unit selected on the command line, applying the
    /// `--database` override last
    pub fn persistence_unit(&self) -> Result<PersistenceUnit> {
        let resolver = match &self.units_file {
            Some(path) => UnitResolver::default().with_file(path.clone()),
            None => UnitResolver::default(),
        };
        let mut unit = resolver.resolve(&self.unit)?;
        if let Some(database) = &self.database {
            unit.database = database.clone();
            unit.validate()?;
        }
        Ok(unit)
    }
}

/// What the factory does with the schema when it is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaAction {
    /// Leave the schema alone
    None,
    /// Fail unless all migrations have been applied
    Validate,
    /// Apply pending migrations
    Update,
    /// Drop the entity tables and recreate them
    Create,
    /// Like `Create`, and drop the tables again when the factory closes
    CreateDrop,
}

/// Named set of connection parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceUnit {
    pub name: String,
    /// File path, `:memory:` or a `file:` URI
    pub database: String,
    pub pool_size: usize,
    pub busy_timeout_ms: u64,
    pub schema: SchemaAction,
    pub journal_mode: String,
    pub synchronous: String,
    pub foreign_keys: bool,
}

/// Partial unit as found in a units file or the environment
#[derive(Debug, Default, Deserialize)]
struct UnitOverrides {
    database: Option<String>,
    pool_size: Option<usize>,
    busy_timeout_ms: Option<u64>,
    schema: Option<SchemaAction>,
    journal_mode: Option<String>,
    synchronous: Option<String>,
    foreign_keys: Option<bool>,
}

const JOURNAL_MODES: &[&str] = &["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];
const SYNCHRONOUS_MODES: &[&str] = &["OFF", "NORMAL", "FULL", "EXTRA"];

impl PersistenceUnit {
    /// Resolve a unit by name from the built-ins, the default units file and
    /// the environment
    pub fn resolve(name: &str) -> Result<Self> {
        UnitResolver::default().resolve(name)
    }

    /// Unit backed by a private in-memory database
    pub fn in_memory(name: &str) -> Self {
        PersistenceUnit {
            name: name.to_string(),
            database: ":memory:".to_string(),
            pool_size: 2,
            busy_timeout_ms: 5000,
            schema: SchemaAction::Update,
            journal_mode: "MEMORY".to_string(),
            synchronous: "OFF".to_string(),
            foreign_keys: true,
        }
    }

    /// Unit backed by a database file
    pub fn file(name: &str, path: impl Into<String>) -> Self {
        PersistenceUnit {
            name: name.to_string(),
            database: path.into(),
            pool_size: 4,
            busy_timeout_ms: 5000,
            schema: SchemaAction::Update,
            journal_mode: "WAL".to_string(),
            synchronous: "NORMAL".to_string(),
            foreign_keys: true,
        }
    }

    fn builtin(name: &str) -> Option<Self> {
        match name {
            DEFAULT_UNIT => Some(Self::file(name, "emstore.db")),
            "memory" => Some(Self::in_memory(name)),
            _ => None,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == ":memory:"
    }

    fn apply(&mut self, overrides: UnitOverrides) {
        if let Some(database) = overrides.database {
            self.database = database;
        }
        if let Some(pool_size) = overrides.pool_size {
            self.pool_size = pool_size;
        }
        if let Some(busy_timeout_ms) = overrides.busy_timeout_ms {
            self.busy_timeout_ms = busy_timeout_ms;
        }
        if let Some(schema) = overrides.schema {
            self.schema = schema;
        }
        if let Some(journal_mode) = overrides.journal_mode {
            self.journal_mode = journal_mode.to_uppercase();
        }
        if let Some(synchronous) = overrides.synchronous {
            self.synchronous = synchronous.to_uppercase();
        }
        if let Some(foreign_keys) = overrides.foreign_keys {
            self.foreign_keys = foreign_keys;
        }
    }

    /// Check values that end up in PRAGMA statements against fixed lists
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(StoreError::Configuration(format!(
                "unit '{}' has an empty database path",
                self.name
            )));
        }
        if self.pool_size == 0 {
            return Err(StoreError::Configuration(format!(
                "unit '{}' needs a pool_size of at least 1",
                self.name
            )));
        }
        if !JOURNAL_MODES.contains(&self.journal_mode.as_str()) {
            return Err(StoreError::Configuration(format!(
                "unit '{}' has unknown journal_mode '{}'",
                self.name, self.journal_mode
            )));
        }
        if !SYNCHRONOUS_MODES.contains(&self.synchronous.as_str()) {
            return Err(StoreError::Configuration(format!(
                "unit '{}' has unknown synchronous mode '{}'",
                self.name, self.synchronous
            )));
        }
        Ok(())
    }
}

/// Looks up persistence units. Later sources override earlier ones:
/// built-in units, then `[units.<name>]` in the units file, then
/// `<prefix>_<FIELD>` environment variables.
#[derive(Debug, Clone)]
pub struct UnitResolver {
    file: PathBuf,
    env_prefix: String,
}

impl Default for UnitResolver {
    fn default() -> Self {
        let file = env::var_os("EMSTORE_UNITS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UNITS_FILE));
        UnitResolver {
            file,
            env_prefix: UNIT_ENV_PREFIX.to_string(),
        }
    }
}

impl UnitResolver {
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = file.into();
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn resolve(&self, name: &str) -> Result<PersistenceUnit> {
        let file_settings = config::Config::builder()
            .add_source(config::File::from(self.file.as_path()).required(false))
            .build()?;

        let from_file = match file_settings.get::<UnitOverrides>(&format!("units.{name}")) {
            Ok(overrides) => Some(overrides),
            Err(config::ConfigError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let mut unit = match (PersistenceUnit::builtin(name), &from_file) {
            (Some(unit), _) => unit,
            (None, Some(_)) => PersistenceUnit::file(name, format!("{name}.db")),
            (None, None) => {
                return Err(StoreError::Configuration(format!(
                    "persistence unit '{}' is not defined (looked in built-ins and {})",
                    name,
                    self.file.display()
                )));
            }
        };

        if let Some(overrides) = from_file {
            unit.apply(overrides);
        }

        let env_settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()?;
        let from_env: UnitOverrides = env_settings.try_deserialize()?;
        unit.apply(from_env);

        unit.validate()?;
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn missing_file() -> PathBuf {
        PathBuf::from("/nonexistent/emstore-units.toml")
    }

    #[test]
    fn test_builtin_units() {
        let resolver = UnitResolver::default()
            .with_file(missing_file())
            .with_env_prefix("EMSTORE_TEST_BUILTIN");

        let library = resolver.resolve(DEFAULT_UNIT).unwrap();
        assert_eq!(library.database, "emstore.db");
        assert_eq!(library.schema, SchemaAction::Update);

        let memory = resolver.resolve("memory").unwrap();
        assert!(memory.is_in_memory());
    }

    #[test]
    fn test_unknown_unit_is_configuration_error() {
        let resolver = UnitResolver::default()
            .with_file(missing_file())
            .with_env_prefix("EMSTORE_TEST_UNKNOWN");
        let err = resolver.resolve("by.it").unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }

    #[test]
    fn test_units_file_defines_and_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[units.reporting]
database = "/var/lib/reporting.db"
pool_size = 8
schema = "validate"

[units.library]
journal_mode = "delete"
"#
        )
        .unwrap();

        let resolver = UnitResolver::default()
            .with_file(file.path())
            .with_env_prefix("EMSTORE_TEST_FILE");

        let reporting = resolver.resolve("reporting").unwrap();
        assert_eq!(reporting.database, "/var/lib/reporting.db");
        assert_eq!(reporting.pool_size, 8);
        assert_eq!(reporting.schema, SchemaAction::Validate);

        let library = resolver.resolve("library").unwrap();
        assert_eq!(library.journal_mode, "DELETE");
        assert_eq!(library.database, "emstore.db");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[units.broken]
journal_mode = "sideways"
"#
        )
        .unwrap();
        let resolver = UnitResolver::default()
            .with_file(file.path())
            .with_env_prefix("EMSTORE_TEST_INVALID");
        let err = resolver.resolve("broken").unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));

        let mut unit = PersistenceUnit::in_memory("zero");
        unit.pool_size = 0;
        assert!(unit.validate().is_err());
    }

    #[test]
    fn test_environment_overrides_selected_unit() {
        // SAFETY: the prefix is unique to this test
        unsafe {
            env::set_var("EMSTORE_TEST_ENV_POOL_SIZE", "7");
        }
        let resolver = UnitResolver::default()
            .with_file(missing_file())
            .with_env_prefix("EMSTORE_TEST_ENV");
        let unit = resolver.resolve("memory").unwrap();
        assert_eq!(unit.pool_size, 7);
        unsafe {
            env::remove_var("EMSTORE_TEST_ENV_POOL_SIZE");
        }
    }
}
