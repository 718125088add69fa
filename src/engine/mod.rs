//! The merge engine.
//!
//! # Data Flow
//! ```text
//! Builder::build
//!     → load() every module in order (fail fast)
//!     → fold flat views into a MergedView (later module wins)
//!     → publish via ArcSwap, subscribe to every module
//!
//! On ModuleEvent::Changed from module m:
//!     → writer lock, state = Reloading
//!     → load() module m only
//!     → fold all current flat views into a new MergedView
//!     → atomic swap, state = Ready
//!     → ConfigEvent::Reloaded to subscribers
//! ```
//!
//! # Design Decisions
//! - Precedence is insertion order, never reload recency
//! - Readers only touch the published snapshot; they never take the lock
//! - A failed reload publishes nothing and reports ModuleFailed
//! - Subscribers run after the writer lock is released
//! - Modules shared by several configurations stop with the last one closed

pub mod events;
pub mod options;
mod ownership;
pub mod view;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

use crate::error::{ConfigError, Result};
use crate::flatten::normalize_key;
use crate::modules::{Module, ModuleEvent};
use crate::observability::metrics;
use crate::value::FlatValue;

pub use events::{ChangeCallback, ConfigEvent};
pub use options::ConfigOptions;
pub use view::MergedView;

/// Lifecycle of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConfigState {
    Building = 0,
    Ready = 1,
    Reloading = 2,
    Closed = 3,
}

impl ConfigState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConfigState::Building,
            1 => ConfigState::Ready,
            2 => ConfigState::Reloading,
            _ => ConfigState::Closed,
        }
    }
}

struct Inner {
    modules: Vec<Arc<dyn Module>>,
    /// First index of every distinct module.
    distinct: Vec<usize>,
    view: ArcSwap<MergedView>,
    state: AtomicU8,
    /// Serializes reloads and close.
    writer: Mutex<()>,
    subscribers: events::Subscribers,
    options: ConfigOptions,
}

/// A merged, live-reloading view over an ordered list of modules.
///
/// Cloning yields another handle to the same configuration.
#[derive(Clone)]
pub struct Configuration {
    inner: Arc<Inner>,
}

impl Configuration {
    pub(crate) fn build(modules: Vec<Arc<dyn Module>>, options: ConfigOptions) -> Result<Self> {
        let distinct = ownership::distinct_indices(&modules);
        let inner = Arc::new(Inner {
            modules,
            distinct,
            view: ArcSwap::from_pointee(MergedView::empty()),
            state: AtomicU8::new(ConfigState::Building as u8),
            writer: Mutex::new(()),
            subscribers: events::Subscribers::new(options.event_capacity),
            options,
        });

        for module in &inner.modules {
            if let Err(e) = module.load() {
                tracing::error!(module = %module.name(), error = %e, "Module failed to load");
                return Err(e);
            }
        }

        let view = inner.fold();
        metrics::record_merged_keys(view.len());
        tracing::info!(modules = inner.modules.len(), keys = view.len(), "Configuration built");
        inner.view.store(Arc::new(view));

        // A module added twice reloads once per change.
        let weak = Arc::downgrade(&inner);
        for &index in &inner.distinct {
            let module = &inner.modules[index];
            ownership::acquire(module);
            module.notify_dirty(dirty_callback(weak.clone(), index));
        }

        inner.set_state(ConfigState::Ready);
        Ok(Self { inner })
    }

    /// Look up a key in the current snapshot. Case-insensitive; `:` is
    /// accepted as a path separator. Returns `None` once closed.
    pub fn get(&self, key: &str) -> Option<FlatValue> {
        self.inner.view.load().get(&normalize_key(key)).cloned()
    }

    /// Like [`get`](Self::get), but reports a closed configuration.
    pub fn try_get(&self, key: &str) -> Result<Option<FlatValue>> {
        if self.state() == ConfigState::Closed {
            return Err(ConfigError::ClosedConfiguration);
        }
        Ok(self.get(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.view.load().contains(&normalize_key(key))
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)?.as_string()
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.as_i64()
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key)?.as_u64()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_f64()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    /// A duration given in (possibly fractional) seconds.
    pub fn get_duration_secs(&self, key: &str) -> Option<Duration> {
        let secs = self.get_f64(key)?;
        Duration::try_from_secs_f64(secs).ok()
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// The currently published merged view.
    pub fn snapshot(&self) -> Arc<MergedView> {
        self.inner.view.load_full()
    }

    /// Sorted keys of the current view.
    pub fn keys(&self) -> Vec<String> {
        self.inner.view.load().keys()
    }

    pub fn len(&self) -> usize {
        self.inner.view.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> ConfigState {
        self.inner.state()
    }

    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.inner.modules
    }

    pub fn options(&self) -> &ConfigOptions {
        &self.inner.options
    }

    /// Register a callback for change events. It runs on the thread that
    /// delivered the module event and must not block for long.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&ConfigEvent) + Send + Sync + 'static,
    {
        self.inner.subscribers.register(Arc::new(callback));
    }

    /// A broadcast receiver of change events for async consumers.
    pub fn events(&self) -> broadcast::Receiver<ConfigEvent> {
        self.inner.subscribers.receiver()
    }

    /// Reload module `index` and republish the merged view, exactly as a
    /// dirty event from that module would.
    pub fn reload(&self, index: usize) -> Result<()> {
        self.inner.reload(index)
    }

    /// Stop every module in reverse add order and close the configuration.
    ///
    /// Each module gets `shutdown_timeout` to stop its watcher; stragglers
    /// are detached and reported. Modules still held by another open
    /// configuration keep running. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        self.inner.close()
    }
}

fn dirty_callback(inner: Weak<Inner>, index: usize) -> Arc<dyn Fn(ModuleEvent) + Send + Sync> {
    Arc::new(move |event: ModuleEvent| {
        if let Some(inner) = inner.upgrade() {
            inner.on_module_event(index, event);
        }
    })
}

impl Inner {
    fn state(&self) -> ConfigState {
        ConfigState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ConfigState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn fold(&self) -> MergedView {
        MergedView::fold(self.modules.iter().map(|m| m.flat_view()))
    }

    fn on_module_event(&self, index: usize, event: ModuleEvent) {
        if self.state() == ConfigState::Closed {
            return;
        }
        match event {
            ModuleEvent::Changed => {
                // Failures are already logged and published to subscribers.
                let _ = self.reload(index);
            }
            ModuleEvent::Failed(error) => {
                let module = self.modules[index].name();
                tracing::error!(module = %module, error = %error, "Module watcher failed, no further reloads from it");
                metrics::record_reload(&module, "watch_failed");
                self.subscribers.emit(ConfigEvent::ModuleFailed { module, error });
            }
        }
    }

    fn reload(&self, index: usize) -> Result<()> {
        let module = self.modules.get(index).ok_or(ConfigError::UnknownModule(index))?;
        let name = module.name();

        let outcome = {
            let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            if self.state() == ConfigState::Closed {
                return Err(ConfigError::ClosedConfiguration);
            }
            self.set_state(ConfigState::Reloading);
            let outcome = module.load().map(|()| {
                let view = self.fold();
                let keys = view.len();
                self.view.store(Arc::new(view));
                keys
            });
            self.set_state(ConfigState::Ready);
            outcome
        };

        match outcome {
            Ok(keys) => {
                tracing::info!(module = %name, keys, "Configuration reloaded");
                metrics::record_reload(&name, "ok");
                metrics::record_merged_keys(keys);
                self.subscribers.emit(ConfigEvent::Reloaded { module: name });
                Ok(())
            }
            Err(e) => {
                tracing::error!(module = %name, error = %e, "Reload failed, keeping last known good configuration");
                metrics::record_reload(&name, "error");
                let error = Arc::new(e);
                self.subscribers.emit(ConfigEvent::ModuleFailed {
                    module: name.clone(),
                    error: error.clone(),
                });
                Err(ConfigError::ReloadFailed {
                    module: name,
                    source: error,
                })
            }
        }
    }

    fn close(&self) -> Result<()> {
        {
            let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            if self.state() == ConfigState::Closed {
                return Ok(());
            }
            self.set_state(ConfigState::Closed);
            self.view.store(Arc::new(MergedView::empty()));
        }

        let timeout = self.options.shutdown_timeout();
        let mut stragglers = Vec::new();
        for &index in self.distinct.iter().rev() {
            let module = &self.modules[index];
            if !ownership::release(module) {
                tracing::debug!(module = %module.name(), "Module still held by another configuration");
                continue;
            }
            match module.deconstruct(timeout) {
                Ok(()) => {}
                Err(ConfigError::ShutdownTimedOut { modules, .. }) => stragglers.extend(modules),
                Err(e) => tracing::warn!(module = %module.name(), error = %e, "Module deconstruct failed"),
            }
        }

        tracing::info!(modules = self.modules.len(), stragglers = stragglers.len(), "Configuration closed");
        self.subscribers.emit(ConfigEvent::Closed);

        if stragglers.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ShutdownTimedOut {
                modules: stragglers,
                timeout,
            })
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Leases are taken once Ready and given back by close.
        if matches!(self.state(), ConfigState::Ready | ConfigState::Reloading) {
            for &index in &self.distinct {
                ownership::release(&self.modules[index]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::modules::MemoryModule;
    use serde_json::json;

    fn memory(name: &str, doc: serde_json::Value) -> Arc<MemoryModule> {
        Arc::new(MemoryModule::new(name, doc))
    }

    #[test]
    fn test_precedence_follows_add_order() {
        let a = memory("a", json!({"k": "a", "only_a": 1}));
        let b = memory("b", json!({"k": "b"}));
        let config = Builder::new().add(a).add(b).build(ConfigOptions::default()).unwrap();

        assert_eq!(config.get("k"), Some(FlatValue::from("b")));
        assert_eq!(config.get("ONLY_A"), Some(FlatValue::Integer(1)));
        assert_eq!(config.state(), ConfigState::Ready);
    }

    #[test]
    fn test_precedence_ignores_reload_recency() {
        let a = memory("a", json!({"k": "a1"}));
        let b = memory("b", json!({"k": "b"}));
        let config = Builder::new().add(a.clone()).add(b).build(ConfigOptions::default()).unwrap();

        a.update(json!({"k": "a2"}));
        assert_eq!(config.get("k"), Some(FlatValue::from("b")));
    }

    #[test]
    fn test_typed_accessors() {
        let doc = json!({"port": "8080", "debug": "on", "ratio": 0.5, "timeout": 1.5, "name": 7});
        let config = Builder::new().add(memory("a", doc)).build(ConfigOptions::default()).unwrap();

        assert_eq!(config.get_u64("port"), Some(8080));
        assert_eq!(config.get_bool("debug"), Some(true));
        assert_eq!(config.get_f64("ratio"), Some(0.5));
        assert_eq!(config.get_duration_secs("timeout"), Some(Duration::from_millis(1500)));
        assert_eq!(config.get_string("name").as_deref(), Some("7"));
        assert_eq!(config.get_i64_or("missing", 3), 3);
        assert_eq!(config.get_string_or("missing", "x"), "x");
        assert!(!config.get_bool_or("missing", false));
    }

    #[test]
    fn test_reload_unknown_module() {
        let config = Builder::new().add(memory("a", json!({}))).build(ConfigOptions::default()).unwrap();
        assert!(matches!(config.reload(5), Err(ConfigError::UnknownModule(5))));
    }

    #[test]
    fn test_close_is_idempotent_and_hides_values() {
        let config = Builder::new()
            .add(memory("a", json!({"x": 1})))
            .build(ConfigOptions::default())
            .unwrap();

        config.close().unwrap();
        assert_eq!(config.state(), ConfigState::Closed);
        assert_eq!(config.get("x"), None);
        assert!(matches!(config.try_get("x"), Err(ConfigError::ClosedConfiguration)));
        assert!(matches!(config.reload(0), Err(ConfigError::ClosedConfiguration)));
        config.close().unwrap();
    }

    mod recording {
        use super::*;
        use crate::flatten::FlatMap;
        use crate::modules::{DirtyCallback, ModuleOptions, ModuleState};

        /// Logs its name on every deconstruct.
        pub struct Recording {
            pub name: &'static str,
            pub log: Arc<Mutex<Vec<&'static str>>>,
            pub options: ModuleOptions,
        }

        impl Recording {
            pub fn new(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
                Arc::new(Self {
                    name,
                    log: log.clone(),
                    options: ModuleOptions::default(),
                })
            }
        }

        impl Module for Recording {
            fn name(&self) -> String {
                self.name.to_string()
            }
            fn load(&self) -> Result<()> {
                Ok(())
            }
            fn flat_view(&self) -> Arc<FlatMap> {
                Arc::new(FlatMap::new())
            }
            fn notify_dirty(&self, _subscriber: DirtyCallback) {}
            fn deconstruct(&self, _timeout: Duration) -> Result<()> {
                self.log.lock().unwrap().push(self.name);
                Ok(())
            }
            fn state(&self) -> ModuleState {
                ModuleState::Loaded
            }
            fn options(&self) -> &ModuleOptions {
                &self.options
            }
        }
    }

    use recording::Recording;

    #[test]
    fn test_close_deconstructs_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = Builder::new();
        for name in ["first", "second", "third"] {
            builder.add(Recording::new(name, &log));
        }
        let config = builder.build(ConfigOptions::default()).unwrap();
        config.close().unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
    }

    #[test]
    fn test_shared_modules_stop_with_last_configuration() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = Builder::new();
        builder.add(Recording::new("shared", &log));

        let first = builder.build(ConfigOptions::default()).unwrap();
        let second = builder.build(ConfigOptions::default()).unwrap();

        first.close().unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(second.state(), ConfigState::Ready);

        second.close().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["shared"]);
    }

    #[test]
    fn test_dropped_configuration_gives_up_its_lease() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = Builder::new();
        builder.add(Recording::new("shared", &log));

        drop(builder.build(ConfigOptions::default()).unwrap());
        let kept = builder.build(ConfigOptions::default()).unwrap();
        kept.close().unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["shared"]);
    }

    #[test]
    fn test_module_added_twice_reloads_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = memory("a", json!({"x": 1}));
        let recorder = Recording::new("other", &log);
        let config = Builder::new()
            .add(a.clone())
            .add(recorder)
            .add(a.clone())
            .build(ConfigOptions::default())
            .unwrap();
        assert_eq!(a.load_count(), 2);

        let reloads = Arc::new(Mutex::new(0));
        let counter = reloads.clone();
        config.subscribe(move |event| {
            if let ConfigEvent::Reloaded { .. } = event {
                *counter.lock().unwrap() += 1;
            }
        });

        a.update(json!({"x": 2}));
        assert_eq!(a.load_count(), 3);
        assert_eq!(*reloads.lock().unwrap(), 1);
        assert_eq!(config.get_i64("x"), Some(2));

        config.close().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["other"]);
    }

    #[test]
    fn test_subscriber_sees_reload() {
        let a = memory("a", json!({"x": 1}));
        let config = Builder::new().add(a.clone()).build(ConfigOptions::default()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reader = config.clone();
        config.subscribe(move |event| {
            if let ConfigEvent::Reloaded { module } = event {
                sink.lock().unwrap().push((module.clone(), reader.get_i64("x")));
            }
        });

        a.update(json!({"x": 2}));
        assert_eq!(*seen.lock().unwrap(), vec![("memory:a".to_string(), Some(2))]);
    }
}
