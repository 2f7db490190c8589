//! The interception registry.
//!
//! Readers load an immutable [`RegistrySnapshot`] without locking; writers
//! build a new snapshot and swap it in atomically, so an exchange holding a
//! snapshot keeps seeing the same set of plugins for its whole lifetime.

use crate::{Initializer, InterceptPoint, PluginHandler, PluginRegistration, RegistryError};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use vellum_core::Exchange;

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    registration: PluginRegistration,
}

/// An immutable view of the registered plugins.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    generation: u64,
    next_seq: u64,
    names: HashSet<String>,
    by_point: HashMap<InterceptPoint, Vec<Entry>>,
}

impl RegistrySnapshot {
    fn with(&self, registration: PluginRegistration) -> Result<Self, RegistryError> {
        validate(&registration)?;
        if self.names.contains(registration.name()) {
            return Err(RegistryError::DuplicateName(registration.name().to_string()));
        }

        let mut next = Self {
            generation: self.generation + 1,
            next_seq: self.next_seq + 1,
            names: self.names.clone(),
            by_point: self.by_point.clone(),
        };
        next.names.insert(registration.name().to_string());
        let entries = next.by_point.entry(registration.point()).or_default();
        entries.push(Entry {
            seq: self.next_seq,
            registration,
        });
        entries.sort_by_key(|e| (e.registration.priority(), e.seq));
        Ok(next)
    }

    fn build(generation: u64, registrations: Vec<PluginRegistration>) -> Result<Self, RegistryError> {
        let mut snapshot = Self::default();
        for registration in registrations {
            snapshot = snapshot.with(registration)?;
        }
        snapshot.generation = generation;
        Ok(snapshot)
    }

    /// Registrations at `point` whose predicate holds for the exchange,
    /// ordered by priority then registration order.
    pub fn resolve(&self, point: InterceptPoint, exchange: &Exchange) -> Vec<&PluginRegistration> {
        self.at(point)
            .filter(|r| r.applies_to(exchange))
            .collect()
    }

    /// Every registration at `point`, in execution order.
    pub fn at(&self, point: InterceptPoint) -> impl Iterator<Item = &PluginRegistration> {
        self.by_point
            .get(&point)
            .into_iter()
            .flatten()
            .map(|e| &e.registration)
    }

    /// Initializers at a process point, in execution order.
    pub fn initializers(
        &self,
        point: InterceptPoint,
    ) -> impl Iterator<Item = (&str, &Arc<dyn Initializer>)> {
        self.at(point).filter_map(|r| match r.handler() {
            PluginHandler::Initializer(init) => Some((r.name(), init)),
            PluginHandler::Interceptor(_) => None,
        })
    }

    /// Whether a plugin with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Incremented on every change; lets callers tell snapshots apart.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn validate(registration: &PluginRegistration) -> Result<(), RegistryError> {
    let point = registration.point();
    if registration.handler().fits(point) {
        Ok(())
    } else {
        Err(RegistryError::PointMismatch {
            name: registration.name().to_string(),
            point,
            reason: if point.is_request_point() {
                "request points need an interceptor"
            } else {
                "process points need an initializer"
            },
        })
    }
}

/// The shared, read-mostly plugin registry.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    current: ArcSwap<RegistrySnapshot>,
    writer: Mutex<()>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `registrations`, in order.
    pub fn with_registrations(registrations: Vec<PluginRegistration>) -> Result<Self, RegistryError> {
        Ok(Self {
            current: ArcSwap::from_pointee(RegistrySnapshot::build(0, registrations)?),
            writer: Mutex::new(()),
        })
    }

    /// Appends one registration.
    pub fn register(&self, registration: PluginRegistration) -> Result<(), RegistryError> {
        let _guard = self.writer.lock();
        let name = registration.name().to_string();
        let point = registration.point();
        let next = self.current.load().with(registration)?;
        self.current.store(Arc::new(next));
        tracing::info!(plugin = %name, point = %point, "plugin registered");
        Ok(())
    }

    /// Atomically replaces every registration.
    ///
    /// On error the registry is left unchanged.
    pub fn reload(&self, registrations: Vec<PluginRegistration>) -> Result<(), RegistryError> {
        let _guard = self.writer.lock();
        let generation = self.current.load().generation + 1;
        let next = RegistrySnapshot::build(generation, registrations)?;
        let count = next.len();
        self.current.store(Arc::new(next));
        tracing::info!(plugins = count, generation, "plugin registry reloaded");
        Ok(())
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    /// Resolves against the current snapshot.
    pub fn resolve(&self, point: InterceptPoint, exchange: &Exchange) -> Vec<PluginRegistration> {
        self.current
            .load()
            .resolve(point, exchange)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Initializers at `point` in the current snapshot.
    pub fn initializers(&self, point: InterceptPoint) -> Vec<(String, Arc<dyn Initializer>)> {
        self.current
            .load()
            .initializers(point)
            .map(|(name, init)| (name.to_string(), Arc::clone(init)))
            .collect()
    }
}
