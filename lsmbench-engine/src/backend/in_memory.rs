//! In-memory engine for tests.
//!
//! This provides an [`Engine`] backed by a `BTreeMap` that records every call it receives, so
//! tests can assert on the exact sequence of sets, applies and compactions a workload produced.
//! The engine is [`Clone`]: tests keep a handle for inspection while the workload owns another.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::{Durability, Engine, EngineError, EngineResult, MetricsSnapshot, WriteBatch};

/// An engine operation, used to inject failures into the [`InMemoryEngine`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operation {
    /// [`Engine::set`]
    Set,
    /// [`Engine::apply`]
    Apply,
    /// [`Engine::compact`]
    Compact,
}

#[derive(Debug, Default)]
struct Recorded {
    store: BTreeMap<Vec<u8>, Vec<u8>>,
    sets: Vec<Durability>,
    applies: Vec<(Vec<Vec<u8>>, Durability)>,
    compactions: Vec<Option<String>>,
    closed: usize,
}

#[derive(Debug, Default)]
struct Inner {
    recorded: Mutex<Recorded>,
    fail_on: Option<Operation>,
    latency: Duration,
}

/// A recording [`Engine`] that keeps all data in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryEngine(Arc<Inner>);

impl InMemoryEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine that fails every call of the given operation.
    pub fn failing(operation: Operation) -> Self {
        Self(Arc::new(Inner {
            fail_on: Some(operation),
            ..Default::default()
        }))
    }

    /// Creates an engine that sleeps for `latency` in every write, apply and compaction.
    pub fn with_latency(latency: Duration) -> Self {
        Self(Arc::new(Inner {
            latency,
            ..Default::default()
        }))
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.recorded().store.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.recorded().store.is_empty()
    }

    /// Returns the stored value for `key`.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.recorded().store.get(key).cloned()
    }

    /// Number of [`Engine::set`] calls received.
    pub fn set_calls(&self) -> usize {
        self.recorded().sets.len()
    }

    /// Durability of every [`Engine::set`] call, in call order.
    pub fn set_durabilities(&self) -> Vec<Durability> {
        self.recorded().sets.clone()
    }

    /// Keys of every applied batch, in apply order.
    pub fn applied_batches(&self) -> Vec<Vec<Vec<u8>>> {
        self.recorded()
            .applies
            .iter()
            .map(|(keys, _)| keys.clone())
            .collect()
    }

    /// Durability of every [`Engine::apply`] call, in call order.
    pub fn apply_durabilities(&self) -> Vec<Durability> {
        self.recorded()
            .applies
            .iter()
            .map(|(_, durability)| *durability)
            .collect()
    }

    /// Number of [`Engine::compact`] calls received.
    pub fn compact_calls(&self) -> usize {
        self.recorded().compactions.len()
    }

    /// Name of the calling thread for every [`Engine::compact`] call.
    pub fn compacting_threads(&self) -> Vec<Option<String>> {
        self.recorded().compactions.clone()
    }

    /// Number of [`Engine::close`] calls received.
    pub fn close_calls(&self) -> usize {
        self.recorded().closed
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        // A panicking test thread must not hide the recorded calls from the assertions.
        self.0
            .recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, operation: Operation) -> EngineResult<()> {
        if !self.0.latency.is_zero() {
            thread::sleep(self.0.latency);
        }
        match self.0.fail_on {
            Some(failing) if failing == operation => Err(EngineError::Injected(operation)),
            _ => Ok(()),
        }
    }
}

impl Engine for InMemoryEngine {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn set(&self, key: &[u8], value: &[u8], durability: Durability) -> EngineResult<()> {
        self.enter(Operation::Set)?;
        let mut recorded = self.recorded();
        recorded.store.insert(key.to_vec(), value.to_vec());
        recorded.sets.push(durability);
        Ok(())
    }

    fn apply(&self, batch: WriteBatch, durability: Durability) -> EngineResult<()> {
        self.enter(Operation::Apply)?;
        let keys = batch.keys().map(<[u8]>::to_vec).collect();
        let mut recorded = self.recorded();
        recorded.store.extend(batch);
        recorded.applies.push((keys, durability));
        Ok(())
    }

    fn compact(&self, _start: &[u8], _end: &[u8], _parallel: bool) -> EngineResult<()> {
        self.enter(Operation::Compact)?;
        let thread_name = thread::current().name().map(str::to_owned);
        self.recorded().compactions.push(thread_name);
        Ok(())
    }

    fn metrics(&self) -> MetricsSnapshot {
        let recorded = self.recorded();
        MetricsSnapshot::new(self.name())
            .field("keys", recorded.store.len())
            .field("applies", recorded.applies.len())
            .field("compactions", recorded.compactions.len())
    }

    fn close(&self) -> EngineResult<()> {
        self.recorded().closed += 1;
        Ok(())
    }
}
