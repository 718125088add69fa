//! Layer manifest schema.
//!
//! A manifest lists the layers of a configuration in precedence order. All
//! types derive Serde traits for deserialization from TOML.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::builder::Builder;
use crate::engine::ConfigOptions;
use crate::error::Result;
use crate::modules::decode::from_toml;
use crate::modules::{EnvModule, EnvOptions, FileModule, FileOptions, MemoryModule, ModuleOptions, SentinelOptions};

/// Root of a layer manifest.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Manifest {
    /// Options for the built configuration.
    pub options: ConfigOptions,

    /// Layers, lowest precedence first.
    pub layers: Vec<LayerConfig>,
}

/// One layer of the manifest.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayerConfig {
    File(FileLayer),
    Env(EnvLayer),
    Inline(InlineLayer),
}

/// A JSON, YAML or TOML file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileLayer {
    /// Path, relative to the manifest's directory unless absolute.
    pub path: PathBuf,

    #[serde(default)]
    pub optional: bool,

    #[serde(default)]
    pub reload_on_change: bool,

    /// File whose change also reloads this layer.
    #[serde(default)]
    pub sentinel: Option<PathBuf>,
}

/// Process environment variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvLayer {
    #[serde(default)]
    pub prefix: Option<String>,

    #[serde(default = "default_separator")]
    pub separator: String,
}

/// Values written directly in the manifest.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InlineLayer {
    #[serde(default = "default_inline_name")]
    pub name: String,

    #[serde(default)]
    pub values: toml::Table,
}

fn default_separator() -> String {
    crate::modules::env::DEFAULT_SEPARATOR.to_string()
}

fn default_inline_name() -> String {
    "inline".to_string()
}

impl Manifest {
    /// Construct the modules for every layer, in order. Relative file paths
    /// resolve against `base_dir`.
    pub fn to_builder(&self, base_dir: &Path) -> Result<Builder> {
        let mut builder = Builder::new();
        for layer in &self.layers {
            match layer {
                LayerConfig::File(file) => {
                    let options = FileOptions {
                        path: base_dir.join(&file.path),
                        module: ModuleOptions {
                            optional: file.optional,
                            reload_on_change: file.reload_on_change,
                            sentinel: file.sentinel.as_ref().map(|s| SentinelOptions::new(base_dir.join(s))),
                        },
                    };
                    builder.add(Arc::new(FileModule::new(options)?));
                }
                LayerConfig::Env(env) => {
                    let options = EnvOptions {
                        prefix: env.prefix.clone(),
                        separator: env.separator.clone(),
                        module: ModuleOptions::default(),
                    };
                    builder.add(Arc::new(EnvModule::new(options)));
                }
                LayerConfig::Inline(inline) => {
                    let doc = from_toml(toml::Value::Table(inline.values.clone()));
                    builder.add(Arc::new(MemoryModule::new(inline.name.clone(), doc)));
                }
            }
        }
        Ok(builder)
    }
}
