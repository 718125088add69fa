//! Layered configuration with live reload.
//!
//! Modules (files, environment, in-memory documents) are flattened into a
//! single upper-cased, dot-delimited key space and merged in the order they
//! were added: later modules override earlier ones. Watched modules raise
//! dirty events; the configuration reloads just that module and atomically
//! republishes the merged view.

pub mod builder;
pub mod engine;
pub mod error;
pub mod flatten;
pub mod manifest;
pub mod modules;
pub mod observability;
pub mod value;

pub use builder::Builder;
pub use engine::{ConfigEvent, ConfigOptions, ConfigState, Configuration, MergedView};
pub use error::{ConfigError, Result};
pub use flatten::{flatten, FlatMap};
pub use modules::{EnvModule, EnvOptions, FileModule, FileOptions, MemoryModule, Module, ModuleEvent, ModuleOptions};
pub use value::FlatValue;
