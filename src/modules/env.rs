//! Environment-variable module.
//!
//! `APP_DATABASE__HOST=db` with prefix `APP_` and separator `__` becomes
//! `DATABASE.HOST = "db"`.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::error::Result;
use crate::flatten::{FlatMap, DELIMITER};
use crate::modules::{DirtyCallback, DirtyNotifier, Module, ModuleEvent, ModuleOptions, ModuleState, StateCell};
use crate::value::FlatValue;

pub const DEFAULT_SEPARATOR: &str = "__";

#[derive(Debug, Clone)]
pub struct EnvOptions {
    /// Only variables starting with this prefix (case-insensitive) are kept,
    /// with the prefix stripped.
    pub prefix: Option<String>,
    /// Nesting separator inside variable names.
    pub separator: String,
    pub module: ModuleOptions,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            separator: DEFAULT_SEPARATOR.to_string(),
            module: ModuleOptions::default(),
        }
    }
}

impl EnvOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }
}

enum EnvSource {
    Process,
    Fixed(Vec<(String, String)>),
}

pub struct EnvModule {
    options: EnvOptions,
    source: EnvSource,
    flat: ArcSwap<FlatMap>,
    notifier: DirtyNotifier,
    state: StateCell,
}

impl EnvModule {
    /// Read from the process environment on every load.
    pub fn new(options: EnvOptions) -> Self {
        Self::with_source(options, EnvSource::Process)
    }

    /// Read from a fixed set of variables instead of the process environment.
    pub fn from_pairs<K, V>(options: EnvOptions, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self::with_source(options, EnvSource::Fixed(pairs))
    }

    fn with_source(options: EnvOptions, source: EnvSource) -> Self {
        if options.module.watches() {
            tracing::debug!(prefix = ?options.prefix, "Environment module cannot be watched, ignoring reload options");
        }
        Self {
            options,
            source,
            flat: ArcSwap::from_pointee(FlatMap::new()),
            notifier: DirtyNotifier::new(),
            state: StateCell::new(),
        }
    }

    /// Request a re-read of the environment.
    pub fn mark_dirty(&self) {
        self.notifier.notify(ModuleEvent::Changed);
    }

    fn flat_key(&self, name: &str) -> Option<String> {
        let rest = match &self.options.prefix {
            Some(prefix) => {
                let head = name.get(..prefix.len())?;
                if !head.eq_ignore_ascii_case(prefix) {
                    return None;
                }
                &name[prefix.len()..]
            }
            None => name,
        };
        if rest.is_empty() {
            return None;
        }
        let key = if self.options.separator.is_empty() {
            rest.to_string()
        } else {
            rest.replace(self.options.separator.as_str(), &DELIMITER.to_string())
        };
        Some(key.to_uppercase())
    }

    fn collect(&self, vars: impl Iterator<Item = (String, String)>) -> FlatMap {
        vars.filter_map(|(name, value)| Some((self.flat_key(&name)?, FlatValue::String(value))))
            .collect()
    }
}

impl Module for EnvModule {
    fn name(&self) -> String {
        match &self.options.prefix {
            Some(prefix) => format!("env:{}", prefix),
            None => "env".to_string(),
        }
    }

    fn load(&self) -> Result<()> {
        let map = match &self.source {
            EnvSource::Process => self.collect(std::env::vars_os().filter_map(|(k, v)| {
                Some((k.into_string().ok()?, v.into_string().ok()?))
            })),
            EnvSource::Fixed(pairs) => self.collect(pairs.iter().cloned()),
        };
        tracing::debug!(module = %self.name(), keys = map.len(), "Module loaded");
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

    fn deconstruct(&self, _timeout: Duration) -> Result<()> {
        self.state.set(ModuleState::Deconstructed);
        Ok(())
    }

    fn state(&self) -> ModuleState {
        self.state.get()
    }

    fn options(&self) -> &ModuleOptions {
        &self.options.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_and_separator() {
        let module = EnvModule::from_pairs(
            EnvOptions::with_prefix("APP_"),
            [("APP_DATABASE__HOST", "db"), ("app_port", "80"), ("OTHER", "x"), ("APP_", "empty")],
        );
        module.load().unwrap();

        let view = module.flat_view();
        assert_eq!(view.len(), 2);
        assert_eq!(view["DATABASE.HOST"], FlatValue::from("db"));
        assert_eq!(view["PORT"], FlatValue::from("80"));
        assert_eq!(module.name(), "env:APP_");
    }

    #[test]
    fn test_no_prefix_keeps_everything() {
        let module = EnvModule::from_pairs(EnvOptions::default(), [("a__b", "1"), ("c", "2")]);
        module.load().unwrap();
        assert_eq!(module.flat_view().len(), 2);
        assert!(module.flat_view().contains_key("A.B"));
    }

    #[test]
    fn test_process_environment() {
        std::env::set_var("LAYERED_CONFIG_TEST_ENV__KEY", "value");
        let module = EnvModule::new(EnvOptions::with_prefix("LAYERED_CONFIG_TEST_ENV__"));
        module.load().unwrap();
        assert_eq!(module.flat_view()["KEY"], FlatValue::from("value"));
        std::env::remove_var("LAYERED_CONFIG_TEST_ENV__KEY");
    }

    #[test]
    fn test_multibyte_name_shorter_than_prefix() {
        let module = EnvModule::from_pairs(EnvOptions::with_prefix("APP_"), [("é", "x")]);
        module.load().unwrap();
        assert!(module.flat_view().is_empty());
    }
}
