pub mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use symscan_core::backends::FlatImage;
use symscan_core::config::{load_config, EngineConfig};
use symscan_core::session::Session;

pub use commands::*;

/// Default load address for raw memory dumps.
pub const DEFAULT_BASE: u32 = 0x8000_0000;

/// Inputs shared by every subcommand: the image, its load address, an
/// optional engine config and an optional map to start from.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub image: PathBuf,
    pub base: u32,
    pub config: Option<PathBuf>,
    pub map: Option<PathBuf>,
}

impl SessionOptions {
    pub fn new(image: impl Into<PathBuf>) -> Self {
        Self { image: image.into(), base: DEFAULT_BASE, config: None, map: None }
    }

    pub fn with_base(mut self, base: u32) -> Self {
        self.base = base;
        self
    }

    pub fn with_config(mut self, config: Option<PathBuf>) -> Self {
        self.config = config;
        self
    }

    pub fn with_map(mut self, map: Option<PathBuf>) -> Self {
        self.map = map;
        self
    }
}

/// Read the engine config, falling back to defaults when none is given.
pub fn engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load engine config at {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Build a session over the image, loading `options.map` when one is given.
pub fn open_session(options: &SessionOptions) -> Result<Session> {
    let config = engine_config(options.config.as_deref())?;
    let image = FlatImage::from_file(&options.image, options.base)
        .with_context(|| format!("Failed to read image {}", options.image.display()))?;
    tracing::debug!(
        image = %options.image.display(),
        base = %format!("{:#010x}", options.base),
        bytes = image.len(),
        "image mapped"
    );

    let mut session = Session::new(image, config).context("Failed to create session")?;
    if let Some(map) = &options.map {
        let report = session
            .map_load(map)
            .with_context(|| format!("Failed to load symbol map {}", map.display()))?;
        if report.malformed > 0 {
            tracing::warn!(
                map = %map.display(),
                malformed = report.malformed,
                "skipped malformed map lines"
            );
        }
        tracing::debug!(map = %map.display(), loaded = report.loaded, "symbol map loaded");
    }
    Ok(session)
}
