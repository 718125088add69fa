//! Configuration modules: independent sources contributing a flat map.
//!
//! # Data Flow
//! ```text
//! backing source (file / environment / memory)
//!     → load() decodes and flattens into the module's own FlatMap
//!     → flat_view() hands the current snapshot to the merge engine
//!
//! On source change:
//!     watch.rs detects change
//!     → DirtyNotifier fires ModuleEvent::Changed
//!     → the merge engine calls load() on this module only
//! ```
//!
//! # Design Decisions
//! - Modules never reload themselves; the engine owns reload so the merge
//!   stays atomic across modules
//! - Each module's map is written only by its own load()
//! - Optional modules recover locally with an empty map

pub mod decode;
pub mod env;
pub mod file;
pub mod memory;
pub mod watch;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::flatten::FlatMap;

pub use env::{EnvModule, EnvOptions};
pub use file::{FileModule, FileOptions};
pub use memory::MemoryModule;

/// Options shared by every module variant.
#[derive(Debug, Clone, Default)]
pub struct ModuleOptions {
    /// Missing or unreadable sources contribute an empty map instead of failing.
    pub optional: bool,

    /// Watch the backing source and raise dirty events on change.
    pub reload_on_change: bool,

    /// Auxiliary trigger whose change also raises dirty events.
    pub sentinel: Option<SentinelOptions>,
}

impl ModuleOptions {
    pub fn watches(&self) -> bool {
        self.reload_on_change || self.sentinel.is_some()
    }
}

/// A file whose mutation forces its module to reload.
#[derive(Debug, Clone)]
pub struct SentinelOptions {
    pub path: PathBuf,
}

impl SentinelOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Event raised by a module towards its subscribers.
#[derive(Debug, Clone)]
pub enum ModuleEvent {
    /// The backing source changed; the subscriber should reload the module.
    Changed,
    /// The module's watcher died and will raise no further events.
    Failed(Arc<ConfigError>),
}

/// Subscriber callback registered through [`Module::notify_dirty`].
pub type DirtyCallback = Arc<dyn Fn(ModuleEvent) + Send + Sync>;

/// Lifecycle of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Constructed,
    Loaded,
    Watching,
    Deconstructed,
}

/// A configuration source with a position in the precedence order.
pub trait Module: Send + Sync {
    /// Identifier used in logs, metrics and events.
    fn name(&self) -> String;

    /// Fetch and flatten the backing data, replacing the module's map.
    ///
    /// Optional modules swallow source errors and contribute an empty map.
    /// A failed required load keeps the previous map.
    fn load(&self) -> Result<()>;

    /// The last successfully loaded map. Never performs I/O.
    fn flat_view(&self) -> Arc<FlatMap>;

    /// Register a subscriber for change events.
    fn notify_dirty(&self, subscriber: DirtyCallback);

    /// Stop background work, waiting at most `timeout` for it to exit.
    ///
    /// Calls after the first are no-ops.
    fn deconstruct(&self, timeout: Duration) -> Result<()>;

    fn state(&self) -> ModuleState;

    fn options(&self) -> &ModuleOptions;
}

/// Fan-out of module events to registered subscribers.
#[derive(Default)]
pub struct DirtyNotifier {
    subscribers: RwLock<Vec<DirtyCallback>>,
}

impl DirtyNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subscriber: DirtyCallback) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    /// Deliver `event` to every subscriber on the calling thread.
    pub fn notify(&self, event: ModuleEvent) {
        // Clone out so subscribers can register from inside a callback.
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for subscriber in subscribers {
            subscriber(event.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Lifecycle cell shared by the module variants.
pub(crate) struct StateCell(Mutex<ModuleState>);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(Mutex::new(ModuleState::Constructed))
    }

    pub(crate) fn get(&self) -> ModuleState {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, state: ModuleState) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Record a completed load without demoting a watching module.
    pub(crate) fn loaded(&self) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == ModuleState::Constructed {
            *state = ModuleState::Loaded;
        }
    }
}

/// Apply the optional-module policy to a load outcome.
///
/// Returns the map to install, or the error to surface.
pub(crate) fn recover_optional(
    name: &str,
    optional: bool,
    outcome: Result<FlatMap>,
) -> Result<FlatMap> {
    match outcome {
        Ok(map) => Ok(map),
        Err(e) if optional => {
            tracing::debug!(module = %name, error = %e, "Optional module unavailable, contributing nothing");
            Ok(FlatMap::new())
        }
        Err(e) => Err(e),
    }
}
