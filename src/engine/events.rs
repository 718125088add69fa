//! Change events published by a configuration.
//!
//! Two delivery paths share one event stream:
//! - callbacks registered with `subscribe`, run on the thread that
//!   delivered the module event
//! - a broadcast channel for async consumers

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::error::ConfigError;

/// Something changed in a configuration. Consumers re-read the keys they
/// care about.
#[derive(Debug, Clone)]
pub enum ConfigEvent {
    /// A module reloaded and a new merged view was published.
    Reloaded { module: String },
    /// A module failed to reload or its watcher died. The previous merged
    /// view stays in place.
    ModuleFailed { module: String, error: Arc<ConfigError> },
    /// The configuration was closed.
    Closed,
}

pub type ChangeCallback = Arc<dyn Fn(&ConfigEvent) + Send + Sync>;

pub(crate) struct Subscribers {
    callbacks: RwLock<Vec<ChangeCallback>>,
    tx: broadcast::Sender<ConfigEvent>,
}

impl Subscribers {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            callbacks: RwLock::new(Vec::new()),
            tx,
        }
    }

    pub(crate) fn register(&self, callback: ChangeCallback) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }

    pub(crate) fn receiver(&self) -> broadcast::Receiver<ConfigEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: ConfigEvent) {
        let callbacks = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for callback in callbacks {
            callback(&event);
        }
        // No receivers is fine.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_callbacks_and_channel_both_receive() {
        let subscribers = Subscribers::new(4);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        subscribers.register(Arc::new(move |event: &ConfigEvent| {
            sink.lock().unwrap().push(format!("{:?}", event));
        }));
        let mut rx = subscribers.receiver();

        subscribers.emit(ConfigEvent::Reloaded { module: "file:a.json".into() });

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(matches!(rx.try_recv(), Ok(ConfigEvent::Reloaded { module }) if module == "file:a.json"));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let subscribers = Subscribers::new(0);
        let mut rx = subscribers.receiver();
        subscribers.emit(ConfigEvent::Closed);
        assert!(matches!(rx.try_recv(), Ok(ConfigEvent::Closed)));
    }
}
