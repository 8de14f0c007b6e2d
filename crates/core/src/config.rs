use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::AddressRange;

/// Default range scanned when generating a fresh symbol map.
pub const DEFAULT_GENERATE_RANGE: AddressRange = AddressRange::new(0x8000_0000, 0x8180_0000);

/// Default range scanned when no map file exists for the loaded image.
pub const DEFAULT_FALLBACK_RANGE: AddressRange = AddressRange::new(0x8130_0000, 0x8180_0000);

/// Serializable engine configuration.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Instruction set name (see [`crate::backends::instruction_set_by_name`]).
    pub isa: String,
    /// Range scanned by "generate symbol map".
    pub generate_range: AddressRange,
    /// Range scanned when a map load falls back to scanning.
    pub fallback_range: AddressRange,
    /// Signature library applied after generate/fallback scans, if it exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_db: Option<PathBuf>,
    /// Report progress every this many functions.
    pub progress_interval: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            isa: "ppc".to_string(),
            generate_range: DEFAULT_GENERATE_RANGE,
            fallback_range: DEFAULT_FALLBACK_RANGE,
            signature_db: None,
            progress_interval: 256,
        }
    }
}

impl EngineConfig {
    /// Builder-style helper to set the default signature library.
    pub fn with_signature_db(mut self, path: Option<PathBuf>) -> Self {
        self.signature_db = path;
        self
    }
}

/// Load an engine config JSON file.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let json = fs::read_to_string(path).map_err(|e| Error::from_io(path, e))?;
    serde_json::from_str(&json).map_err(|source| Error::Config { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.fallback_range.start, 0x8130_0000);
    }

    #[test]
    fn partial_config_overrides_single_fields() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"fallback_range": {"start": 256, "end": 512}}"#).unwrap();
        assert_eq!(config.fallback_range, AddressRange::new(0x100, 0x200));
        assert_eq!(config.generate_range, DEFAULT_GENERATE_RANGE);
    }
}
