//! Manifest loading from disk.

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Result};
use crate::manifest::schema::Manifest;
use crate::manifest::validation::validate_manifest;

/// Load and validate a layer manifest from a TOML file.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = fs::read_to_string(path)?;
    parse_manifest(&content)
}

/// Parse and validate manifest text.
pub fn parse_manifest(content: &str) -> Result<Manifest> {
    let manifest: Manifest = toml::from_str(content)?;

    validate_manifest(&manifest).map_err(ConfigError::Validation)?;

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layers.toml");
        fs::write(&path, "[[layers]]\nkind = \"env\"\nprefix = \"APP_\"\n").unwrap();

        let manifest = load_manifest(&path).unwrap();
        assert_eq!(manifest.layers.len(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_manifest(Path::new("/no/such/layers.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(parse_manifest("[[layers]"), Err(ConfigError::Manifest(_))));
    }

    #[test]
    fn test_semantic_error() {
        assert!(matches!(parse_manifest(""), Err(ConfigError::Validation(_))));
    }
}
