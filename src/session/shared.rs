//! Process-wide, lazily built session factory.
//!
//! The first `session()` call builds the factory under a mutex, so
//! concurrent first calls still build exactly one. `close()` releases it;
//! the next `session()` builds a fresh one. Sessions handed out before the
//! close fail with [`StoreError::FactoryClosed`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::info;

use super::factory::SessionFactory;
use super::handle::Session;
use crate::config::{DEFAULT_UNIT, PersistenceUnit};
use crate::error::{Result, StoreError};

#[derive(Debug, Clone)]
enum UnitSource {
    /// Resolved through `PersistenceUnit::resolve` at build time
    Named(String),
    Fixed(PersistenceUnit),
}

pub struct SharedFactory {
    source: UnitSource,
    slot: Mutex<Option<Arc<SessionFactory>>>,
    constructions: AtomicUsize,
}

impl SharedFactory {
    /// Factory bound to a persistence unit name
    pub fn named(unit: impl Into<String>) -> Self {
        Self::from_source(UnitSource::Named(unit.into()))
    }

    /// Factory bound to an already resolved unit
    pub fn with_unit(unit: PersistenceUnit) -> Self {
        Self::from_source(UnitSource::Fixed(unit))
    }

    fn from_source(source: UnitSource) -> Self {
        SharedFactory {
            source,
            slot: Mutex::new(None),
            constructions: AtomicUsize::new(0),
        }
    }

    /// New session from the shared factory, building it on first use
    pub fn session(&self) -> Result<Session> {
        self.factory()?.open_session()
    }

    /// The live factory, building one if there is none
    pub fn factory(&self) -> Result<Arc<SessionFactory>> {
        let mut slot = self.slot.lock();
        if let Some(factory) = slot.as_ref() {
            if !factory.is_closed() {
                return Ok(Arc::clone(factory));
            }
        }

        let unit = match &self.source {
            UnitSource::Named(name) => PersistenceUnit::resolve(name)?,
            UnitSource::Fixed(unit) => unit.clone(),
        };
        // Only a fully built factory is ever stored
        let factory = Arc::new(SessionFactory::build(&unit)?);
        let count = self.constructions.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Shared factory for unit '{}' built (construction #{})", unit.name, count);
        *slot = Some(Arc::clone(&factory));
        Ok(factory)
    }

    /// Release the live factory. Fails with [`StoreError::AlreadyClosed`]
    /// when there is none.
    pub fn close(&self) -> Result<()> {
        let factory = self.slot.lock().take().ok_or(StoreError::AlreadyClosed)?;
        factory.close()
    }

    /// Release the live factory if there is one. Returns whether a factory
    /// was closed.
    pub fn close_if_open(&self) -> Result<bool> {
        match self.slot.lock().take() {
            Some(factory) if !factory.is_closed() => factory.close().map(|()| true),
            _ => Ok(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|factory| !factory.is_closed())
    }

    /// Number of factories built so far
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

static GLOBAL: Lazy<SharedFactory> = Lazy::new(|| SharedFactory::named(DEFAULT_UNIT));

/// Shared factory bound to the default persistence unit
pub fn global() -> &'static SharedFactory {
    &GLOBAL
}

/// Session from the global factory
pub fn get_session() -> Result<Session> {
    global().session()
}

/// Close the global factory
pub fn close_factory() -> Result<()> {
    global().close()
}
