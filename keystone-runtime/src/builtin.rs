//! Built-in components so a runtime config can be exercised end to end.
//!
//! - `memory-cache`: bounded string cache, declares only [`Release`].
//! - `heartbeat`: background ticker, declares [`Lifecycle`] and [`ContextAware`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use keystone_core::{
    attributes, BoxError, ComponentRepository, ContextAware, Descriptor, HostContext, Lifecycle,
    Managed, Release,
};

use crate::config::ComponentSpec;
use crate::error::RuntimeError;
use crate::factory::ComponentFactory;

// ---------------------------------------------------------------------------
// Memory cache
// ---------------------------------------------------------------------------

/// Insertion-ordered cache that drops its oldest entry when full.
pub struct MemoryCache {
    capacity: usize,
    entries: RwLock<IndexMap<String, String>>,
    released: AtomicBool,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(IndexMap::new()),
            released: AtomicBool::new(false),
        }
    }

    /// Stores a value. Returns `false` once the cache has been released.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> bool {
        if self.is_released() {
            return false;
        }
        let mut entries = self.entries.write();
        let key = key.into();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(key, value.into());
        true
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Release for MemoryCache {
    fn release(&self) -> Result<(), BoxError> {
        self.released.store(true, Ordering::Release);
        let dropped = {
            let mut entries = self.entries.write();
            let dropped = entries.len();
            entries.clear();
            dropped
        };
        tracing::debug!(dropped, "memory cache released");
        Ok(())
    }
}

pub struct MemoryCacheFactory;

impl MemoryCacheFactory {
    pub const NAME: &'static str = "memory-cache";
}

impl ComponentFactory for MemoryCacheFactory {
    fn init(&self, repo: &ComponentRepository, spec: &ComponentSpec) -> Result<(), BoxError> {
        let capacity = spec.parse_or::<usize>("capacity", 1024)?;
        let cache = Arc::new(MemoryCache::new(capacity));
        let descriptor = Descriptor::new::<MemoryCache>(spec.classifier.clone())
            .with_attribute(attributes::LEVEL, 1)
            .with_attribute("capacity", cache.capacity());
        repo.register_component(descriptor, Managed::new(cache).with_release())?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

#[derive(Default)]
struct HeartbeatState {
    ticks: AtomicU64,
    host: RwLock<Option<String>>,
}

struct Worker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Ticks on a dedicated thread between `start` and `stop`.
pub struct Heartbeat {
    name: String,
    interval: Duration,
    state: Arc<HeartbeatState>,
    worker: Mutex<Option<Worker>>,
}

impl Heartbeat {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            state: Arc::new(HeartbeatState::default()),
            worker: Mutex::new(None),
        }
    }

    pub fn ticks(&self) -> u64 {
        self.state.ticks.load(Ordering::Acquire)
    }

    pub fn host(&self) -> Option<String> {
        self.state.host.read().clone()
    }

    pub fn is_beating(&self) -> bool {
        self.worker.lock().is_some()
    }
}

impl Lifecycle for Heartbeat {
    fn start(&self) -> Result<(), BoxError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(format!("heartbeat '{}' already started", self.name).into());
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let state = Arc::clone(&self.state);
        let interval = self.interval;
        let name = self.name.clone();
        let handle = thread::Builder::new()
            .name(format!("heartbeat-{}", self.name))
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let tick = state.ticks.fetch_add(1, Ordering::AcqRel) + 1;
                        let host = state.host.read().clone().unwrap_or_default();
                        tracing::debug!(heartbeat = %name, host = %host, tick, "tick");
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        *worker = Some(Worker { stop_tx, handle });
        tracing::info!(heartbeat = %self.name, ?interval, "heartbeat started");
        Ok(())
    }

    fn stop(&self) -> Result<(), BoxError> {
        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };
        // A send error means the thread already exited; joining still reaps it.
        let _ = worker.stop_tx.send(());
        worker
            .handle
            .join()
            .map_err(|_| format!("heartbeat '{}' thread panicked", self.name))?;
        tracing::info!(heartbeat = %self.name, ticks = self.ticks(), "heartbeat stopped");
        Ok(())
    }

    fn label(&self) -> String {
        format!("heartbeat:{}", self.name)
    }
}

impl ContextAware for Heartbeat {
    fn bind_context(&self, context: &HostContext) {
        *self.state.host.write() = Some(context.name().to_owned());
    }
}

pub struct HeartbeatFactory;

impl HeartbeatFactory {
    pub const NAME: &'static str = "heartbeat";
}

impl ComponentFactory for HeartbeatFactory {
    fn init(&self, repo: &ComponentRepository, spec: &ComponentSpec) -> Result<(), BoxError> {
        let interval_ms = spec.parse_or::<u64>("interval_ms", 1000)?;
        if interval_ms == 0 {
            return Err(RuntimeError::InvalidProperty {
                key: "interval_ms".to_owned(),
                value: interval_ms.to_string(),
                reason: "heartbeat interval must be at least 1ms".to_owned(),
            }
            .into());
        }
        let heartbeat = Arc::new(Heartbeat::new(
            spec.classifier.clone(),
            Duration::from_millis(interval_ms),
        ));
        let descriptor = Descriptor::new::<Heartbeat>(spec.classifier.clone())
            .with_attribute(attributes::LEVEL, 2)
            .with_attribute("intervalMs", interval_ms);
        repo.register_component(
            descriptor,
            Managed::new(heartbeat).with_lifecycle().with_context(),
        )?;
        Ok(())
    }
}
