use emstore::catalog;
use emstore::config::PersistenceUnit;
use emstore::session::SessionFactory;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// In-memory factory holding the sample library and staff
#[allow(dead_code)]
pub fn seeded_factory(name: &str) -> Result<SessionFactory, Box<dyn std::error::Error>> {
    let factory = SessionFactory::build(&PersistenceUnit::in_memory(name))?;
    let mut session = factory.open_session()?;
    catalog::seed(&mut session)?;
    Ok(factory)
}

/// In-memory factory with migrated but empty tables
#[allow(dead_code)]
pub fn empty_factory(name: &str) -> Result<SessionFactory, Box<dyn std::error::Error>> {
    Ok(SessionFactory::build(&PersistenceUnit::in_memory(name))?)
}
