//! Registries of the handlers, indexed by callback name.
//!
//! The daemon only gives back an opaque pointer when it invokes a callback. That pointer holds
//! the callback name, and the handler is found here by name. The registry is the only thing that
//! keeps the handlers alive: entries are never removed.

use std::sync::{Arc, PoisonError, RwLock};

use rustc_hash::FxHashMap;

use crate::error::HandlerKind;
use crate::handler::{ReadHandler, ShutdownHandler, WriteHandler};

/// Handlers of one kind, safe to use from several threads.
pub struct Registry<H: ?Sized> {
    kind: HandlerKind,
    entries: RwLock<FxHashMap<String, Arc<H>>>,
}

impl<H: ?Sized> Registry<H> {
    pub fn new(kind: HandlerKind) -> Self {
        Self {
            kind,
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// Finds a handler by its name.
    ///
    /// The returned handler is a new reference: the registry is not locked while it runs.
    pub fn get(&self, name: &str) -> Option<Arc<H>> {
        // a panic can only happen in our own bookkeeping, never in a handler: the map is consistent
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.keys().cloned().collect()
    }

    /// Returns every (name, handler) pair, in no particular order.
    pub fn snapshot(&self) -> Vec<(String, Arc<H>)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
    }

    /// Registers a handler if `register` succeeds.
    ///
    /// The registry stays locked while `register` runs, and receives true if the registry is
    /// empty. Concurrent lookups therefore see the registry either before or after the whole
    /// registration. If `register` fails, the registry is left unchanged. An existing handler with
    /// the same name is replaced.
    pub fn insert_with<E>(
        &self,
        name: &str,
        handler: Arc<H>,
        register: impl FnOnce(bool) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        register(entries.is_empty())?;
        if entries.insert(name.to_owned(), handler).is_some() {
            log::warn!("{} callback {name:?} was already registered, replacing it", self.kind);
        }
        Ok(())
    }
}

/// The three registries of a bridge.
pub struct Registries {
    pub read: Registry<dyn ReadHandler>,
    pub write: Registry<dyn WriteHandler>,
    pub shutdown: Registry<dyn ShutdownHandler>,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            read: Registry::new(HandlerKind::Read),
            write: Registry::new(HandlerKind::Write),
            shutdown: Registry::new(HandlerKind::Shutdown),
        }
    }
}
