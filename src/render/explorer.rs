//! Hand-off to the visual explorer.
//!
//! The explorer itself is an external program. The console only prepares
//! its input; [`JsonFileExplorer`] writes that input to a file the explorer
//! loads.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::error::{LookoutError, Result};

use super::ExplorerPayload;

/// A session of the visual explorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerHandle {
    /// Where the payload was delivered.
    pub location: PathBuf,
    pub field_count: usize,
    pub record_count: usize,
}

/// Capability that opens the explorer on a payload.
pub trait VisualExplorer: Send + Sync {
    fn open(&self, payload: &ExplorerPayload) -> Result<ExplorerHandle>;
}

/// Writes each payload as pretty-printed JSON into a directory.
#[derive(Debug)]
pub struct JsonFileExplorer {
    output_dir: PathBuf,
    sequence: AtomicU64,
}

impl JsonFileExplorer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn next_path(&self) -> PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.output_dir
            .join(format!("explorer-{}-{}.json", stamp, seq))
    }
}

impl VisualExplorer for JsonFileExplorer {
    fn open(&self, payload: &ExplorerPayload) -> Result<ExplorerHandle> {
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            LookoutError::internal(format!(
                "Failed to create explorer directory {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;

        let path = self.next_path();
        let json = serde_json::to_string_pretty(payload)
            .map_err(|e| LookoutError::internal(format!("Failed to encode explorer payload: {}", e)))?;
        fs::write(&path, json).map_err(|e| {
            LookoutError::internal(format!("Failed to write {}: {}", path.display(), e))
        })?;

        info!("Explorer payload written to {}", path.display());
        Ok(ExplorerHandle {
            location: path,
            field_count: payload.fields.len(),
            record_count: payload.records.len(),
        })
    }
}
