//! In-memory module holding a nested document, used for defaults layers and
//! programmatic overrides.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::error::Result;
use crate::flatten::{flatten, FlatMap};
use crate::modules::{DirtyCallback, DirtyNotifier, Module, ModuleEvent, ModuleOptions, ModuleState, StateCell};

pub struct MemoryModule {
    name: String,
    options: ModuleOptions,
    staged: Mutex<Value>,
    flat: ArcSwap<FlatMap>,
    notifier: DirtyNotifier,
    state: StateCell,
    loads: AtomicUsize,
}

impl MemoryModule {
    pub fn new(name: impl Into<String>, doc: Value) -> Self {
        Self {
            name: format!("memory:{}", name.into()),
            options: ModuleOptions::default(),
            staged: Mutex::new(doc),
            flat: ArcSwap::from_pointee(FlatMap::new()),
            notifier: DirtyNotifier::new(),
            state: StateCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Stage a new document. It becomes visible on the next load.
    pub fn replace(&self, doc: Value) {
        *self.staged.lock().unwrap_or_else(PoisonError::into_inner) = doc;
    }

    /// Stage a new document and raise a change event.
    pub fn update(&self, doc: Value) {
        self.replace(doc);
        self.mark_dirty();
    }

    pub fn mark_dirty(&self) {
        self.notifier.notify(ModuleEvent::Changed);
    }

    /// Number of completed loads.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Module for MemoryModule {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn load(&self) -> Result<()> {
        let map = {
            let doc = self.staged.lock().unwrap_or_else(PoisonError::into_inner);
            flatten(&doc)
        };
        self.flat.store(Arc::new(map));
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.state.loaded();
        Ok(())
    }

    fn flat_view(&self) -> Arc<FlatMap> {
        self.flat.load_full()
    }

    fn notify_dirty(&self, subscriber: DirtyCallback) {
        self.notifier.register(subscriber);
    }

    fn deconstruct(&self, _timeout: Duration) -> Result<()> {
        self.state.set(ModuleState::Deconstructed);
        Ok(())
    }

    fn state(&self) -> ModuleState {
        self.state.get()
    }

    fn options(&self) -> &ModuleOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FlatValue;
    use serde_json::json;

    #[test]
    fn test_staged_document_visible_after_load() {
        let module = MemoryModule::new("defaults", json!({"x": 1}));
        module.load().unwrap();
        assert_eq!(module.flat_view()["X"], FlatValue::Integer(1));

        module.replace(json!({"x": 2}));
        assert_eq!(module.flat_view()["X"], FlatValue::Integer(1));

        module.load().unwrap();
        assert_eq!(module.flat_view()["X"], FlatValue::Integer(2));
        assert_eq!(module.load_count(), 2);
    }
}
