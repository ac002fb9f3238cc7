use anyhow::{Context, Result};
use tracing::{debug, error, info};

use emstore::catalog::{self, Example};
use emstore::config::{Command, Config, SchemaAction};
use emstore::migration::MigrationRunner;
use emstore::session::{Executor, SharedFactory};

fn main() -> Result<()> {
    let config = Config::load();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.clone())
        .with_writer(std::io::stderr)
        .init();

    info!("emstore v{}", env!("CARGO_PKG_VERSION"));

    let mut unit = config
        .persistence_unit()
        .with_context(|| format!("cannot resolve persistence unit '{}'", config.unit))?;
    if matches!(config.command, Command::Migrate) {
        // Migrations are applied below so the applied versions can be reported
        unit.schema = SchemaAction::None;
    }
    info!("Using persistence unit '{}' ({})", unit.name, unit.database);

    let shared = SharedFactory::with_unit(unit);
    let outcome = execute(&config.command, &shared);
    match shared.close_if_open() {
        Ok(true) => {}
        Ok(false) => debug!("No session factory was built, nothing to close"),
        Err(e) => error!("Closing the session factory failed: {}", e),
    }
    outcome
}

fn execute(command: &Command, shared: &SharedFactory) -> Result<()> {
    let mut session = shared.session()?;
    match command {
        Command::Migrate => {
            let mut runner = MigrationRunner::new(session.connection()?);
            let applied = runner.run_pending_migrations()?;
            if applied.is_empty() {
                info!("No pending migrations. Database is up to date.");
            } else {
                info!("Successfully applied {} migrations: {:?}", applied.len(), applied);
            }
            print_json(&serde_json::json!({ "applied": applied }))
        }
        Command::Seed => {
            let seeded = catalog::seed(&mut session)?;
            print_json(&serde_json::to_value(seeded)?)
        }
        Command::Run { example } => {
            let value = catalog::run(*example, &mut session)
                .with_context(|| format!("example '{}' failed", example.name()))?;
            print_json(&value)
        }
        Command::Catalog => {
            if catalog::employee_count(&session)? == 0 {
                info!("Database is empty, seeding sample data");
                catalog::seed(&mut session)?;
            }
            let mut results = serde_json::Map::new();
            for example in Example::ALL {
                let value = catalog::run(example, &mut session)
                    .with_context(|| format!("example '{}' failed", example.name()))?;
                results.insert(example.name(), value);
            }
            print_json(&serde_json::Value::Object(results))
        }
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
