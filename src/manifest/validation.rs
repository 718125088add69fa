//! Manifest validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject file layers that can never load
//! - Check option ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: &Manifest → Result<(), Vec<ValidationError>>

use std::path::PathBuf;

use thiserror::Error;

use crate::manifest::schema::{LayerConfig, Manifest};
use crate::modules::decode::Format;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("manifest has no layers")]
    NoLayers,

    #[error("layer {layer}: file path is empty")]
    EmptyPath { layer: usize },

    #[error("layer {layer}: '{}' has no supported extension and is not optional", .path.display())]
    UnsupportedExtension { layer: usize, path: PathBuf },

    #[error("layer {layer}: sentinel path is empty")]
    EmptySentinel { layer: usize },

    #[error("layer {layer}: env separator is empty")]
    EmptySeparator { layer: usize },

    #[error("options.event_capacity must be at least 1")]
    ZeroEventCapacity,
}

pub fn validate_manifest(manifest: &Manifest) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if manifest.layers.is_empty() {
        errors.push(ValidationError::NoLayers);
    }
    if manifest.options.event_capacity == 0 {
        errors.push(ValidationError::ZeroEventCapacity);
    }

    for (layer, config) in manifest.layers.iter().enumerate() {
        match config {
            LayerConfig::File(file) => {
                if file.path.as_os_str().is_empty() {
                    errors.push(ValidationError::EmptyPath { layer });
                } else if !file.optional && Format::from_path(&file.path).is_none() {
                    errors.push(ValidationError::UnsupportedExtension {
                        layer,
                        path: file.path.clone(),
                    });
                }
                if file.sentinel.as_ref().is_some_and(|s| s.as_os_str().is_empty()) {
                    errors.push(ValidationError::EmptySentinel { layer });
                }
            }
            LayerConfig::Env(env) => {
                if env.separator.is_empty() {
                    errors.push(ValidationError::EmptySeparator { layer });
                }
            }
            LayerConfig::Inline(_) => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
