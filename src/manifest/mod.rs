//! Layer manifest: a TOML description of a configuration stack.
//!
//! # Data Flow
//! ```text
//! manifest file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Manifest::to_builder (one module per layer, in order)
//!     → Builder::build
//! ```
//!
//! # Design Decisions
//! - All option fields have defaults to allow minimal manifests
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_manifest, parse_manifest};
pub use schema::{EnvLayer, FileLayer, InlineLayer, LayerConfig, Manifest};
pub use validation::ValidationError;
