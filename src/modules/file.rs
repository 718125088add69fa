//! File-backed module (JSON, YAML, TOML).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::error::{ConfigError, Result};
use crate::flatten::{flatten, FlatMap};
use crate::modules::decode::{decode, Format};
use crate::modules::watch::{SourceWatcher, WatchSpec};
use crate::modules::{
    recover_optional, DirtyCallback, DirtyNotifier, Module, ModuleEvent, ModuleOptions, ModuleState,
    StateCell,
};

/// File read when no path is given.
pub const DEFAULT_FILE: &str = "settings.json";

#[derive(Debug, Clone)]
pub struct FileOptions {
    pub path: PathBuf,
    pub module: ModuleOptions,
}

impl FileOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            module: ModuleOptions::default(),
        }
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.module.optional = optional;
        self
    }

    pub fn reload_on_change(mut self, reload: bool) -> Self {
        self.module.reload_on_change = reload;
        self
    }

    pub fn sentinel(mut self, path: impl Into<PathBuf>) -> Self {
        self.module.sentinel = Some(crate::modules::SentinelOptions::new(path));
        self
    }
}

impl Default for FileOptions {
    fn default() -> Self {
        Self::new(DEFAULT_FILE)
    }
}

/// A module backed by a single configuration file.
pub struct FileModule {
    options: FileOptions,
    name: String,
    flat: ArcSwap<FlatMap>,
    notifier: Arc<DirtyNotifier>,
    watcher: Option<SourceWatcher>,
    state: StateCell,
}

impl FileModule {
    /// Create the module, starting its watcher when reload or a sentinel is
    /// configured.
    ///
    /// Watch setup failures are returned for required modules; an optional
    /// module that cannot be watched simply does not watch.
    pub fn new(options: FileOptions) -> Result<Self> {
        let name = format!("file:{}", options.path.display());
        let notifier = Arc::new(DirtyNotifier::new());
        let state = StateCell::new();

        let watcher = if options.module.watches() {
            let mut targets = Vec::new();
            if options.module.reload_on_change {
                targets.push(options.path.clone());
            }
            if let Some(sentinel) = &options.module.sentinel {
                targets.push(sentinel.path.clone());
            }
            let spec = WatchSpec {
                name: name.clone(),
                targets,
                optional: options.module.optional,
            };
            match SourceWatcher::start(spec, notifier.clone()) {
                Ok(watcher) => {
                    state.set(ModuleState::Watching);
                    Some(watcher)
                }
                Err(e) if options.module.optional => {
                    tracing::debug!(module = %name, error = %e, "Optional module not watched");
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        Ok(Self {
            options,
            name,
            flat: ArcSwap::from_pointee(FlatMap::new()),
            notifier,
            watcher,
            state,
        })
    }

    pub fn path(&self) -> &Path {
        &self.options.path
    }

    /// Raise a change event by hand, as the watcher would.
    pub fn mark_dirty(&self) {
        self.notifier.notify(ModuleEvent::Changed);
    }

    fn read(&self) -> Result<FlatMap> {
        let path = &self.options.path;
        if !path.is_file() {
            return Err(ConfigError::SourceNotFound(path.clone()));
        }
        let format = Format::from_path(path).ok_or_else(|| ConfigError::SourceExtensionUnsupported(path.clone()))?;
        let content = String::from_utf8(fs::read(path)?).map_err(|e| ConfigError::SourceUnparseable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let doc = decode(format, &content, path)?;
        Ok(flatten(&doc))
    }
}

impl Module for FileModule {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn load(&self) -> Result<()> {
        let map = recover_optional(&self.name, self.options.module.optional, self.read())?;
        tracing::debug!(module = %self.name, keys = map.len(), "Module loaded");
        self.flat.store(Arc::new(map));
        self.state.loaded();
        Ok(())
    }

    fn flat_view(&self) -> Arc<FlatMap> {
        self.flat.load_full()
    }

    fn notify_dirty(&self, subscriber: DirtyCallback) {
        self.notifier.register(subscriber);
    }

    fn deconstruct(&self, timeout: Duration) -> Result<()> {
        let outcome = match &self.watcher {
            Some(watcher) => watcher.stop(timeout),
            None => Ok(()),
        };
        self.state.set(ModuleState::Deconstructed);
        outcome
    }

    /// A watcher that exited on a watch error leaves the module `Loaded`.
    fn state(&self) -> ModuleState {
        match self.state.get() {
            ModuleState::Watching if !self.watcher.as_ref().is_some_and(SourceWatcher::is_running) => {
                ModuleState::Loaded
            }
            state => state,
        }
    }

    fn options(&self) -> &ModuleOptions {
        &self.options.module
    }
}
