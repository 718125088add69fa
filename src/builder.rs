//! Ordered accumulation of modules.

use std::sync::Arc;

use crate::engine::{ConfigOptions, Configuration};
use crate::error::Result;
use crate::modules::Module;

/// Collects modules in precedence order: each added module overrides the
/// ones added before it.
#[derive(Clone, Default)]
pub struct Builder {
    modules: Vec<Arc<dyn Module>>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, module: Arc<dyn Module>) -> &mut Self {
        self.modules.push(module);
        self
    }

    /// Add the module if present; `None` is ignored.
    pub fn add_optional(&mut self, module: Option<Arc<dyn Module>>) -> &mut Self {
        if let Some(module) = module {
            self.modules.push(module);
        }
        self
    }

    pub fn clear(&mut self) {
        self.modules.clear();
    }

    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Load every module and publish the first merged view.
    ///
    /// The builder keeps its list; modules added afterwards do not affect
    /// the returned configuration.
    pub fn build(&self, options: ConfigOptions) -> Result<Configuration> {
        Configuration::build(self.modules.clone(), options)
    }
}
