//! Ghost lap persistence
//!
//! Ghosts are stored one per file as zstd-compressed JSON
//! (`<name>.ghost.zst`). Loading re-validates the lap, so a corrupted or
//! hand-edited file is rejected rather than served.

use anyhow::{bail, Context, Result};
use ghost_core::GhostLap;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const EXTENSION: &str = ".ghost.zst";
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct GhostInfo {
    pub name: String,
    pub source_lap: usize,
    pub lap_time: f64,
    pub points: usize,
    pub length_m: f64,
}

impl GhostInfo {
    pub fn new(name: &str, ghost: &GhostLap) -> Self {
        Self {
            name: name.to_string(),
            source_lap: ghost.source_lap(),
            lap_time: ghost.lap_time().0,
            points: ghost.points().len(),
            length_m: ghost.last_distance().0 - ghost.first_distance().0,
        }
    }
}

pub struct GhostStore {
    dir: PathBuf,
}

impl GhostStore {
    /// Open (and create if needed) a ghost directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create ghost dir: {}", dir.display()))?;
        info!("Ghost store at {}", dir.display());
        Ok(Self { dir })
    }

    /// `<data dir>/ghost-coach/ghosts`, or the system temp dir if the
    /// platform has no data dir
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("ghost-coach")
            .join("ghosts")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names are used as file stems: ASCII letters, digits, `-` and `_`
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= 64
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if !Self::is_valid_name(name) {
            bail!("invalid ghost name: {:?}", name);
        }
        Ok(self.dir.join(format!("{}{}", name, EXTENSION)))
    }

    pub fn save(&self, name: &str, ghost: &GhostLap) -> Result<GhostInfo> {
        let path = self.path_for(name)?;
        let json = ghost.to_json()?;
        let compressed = zstd::encode_all(json.as_bytes(), COMPRESSION_LEVEL)
            .context("Failed to compress ghost")?;
        fs::write(&path, &compressed)
            .with_context(|| format!("Failed to write ghost: {}", path.display()))?;
        info!(
            "Saved ghost {} ({} points, {} bytes)",
            name,
            ghost.points().len(),
            compressed.len()
        );
        Ok(GhostInfo::new(name, ghost))
    }

    /// `Ok(None)` if no ghost of that name exists
    pub fn load(&self, name: &str) -> Result<Option<GhostLap>> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let compressed =
            fs::read(&path).with_context(|| format!("Failed to read ghost: {}", path.display()))?;
        let json = zstd::decode_all(compressed.as_slice()).context("Failed to decompress ghost")?;
        let json = String::from_utf8(json).context("Ghost file is not UTF-8")?;
        let ghost = GhostLap::from_json(&json)
            .with_context(|| format!("Invalid ghost file: {}", path.display()))?;
        Ok(Some(ghost))
    }

    /// All readable ghosts, sorted by name; unreadable files are skipped
    pub fn list(&self) -> Result<Vec<GhostInfo>> {
        let mut ghosts = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let file_name = entry?.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|n| n.strip_suffix(EXTENSION))
            else {
                continue;
            };
            match self.load(name) {
                Ok(Some(ghost)) => ghosts.push(GhostInfo::new(name, &ghost)),
                Ok(None) => {}
                Err(e) => warn!("Skipping ghost {}: {:#}", name, e),
            }
        }
        ghosts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ghosts)
    }
}
