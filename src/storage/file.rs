//! Raw floor definitions read from disk.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::ConfigHandle;
use crate::model::FloorId;
use crate::Result;
use super::MapSource;

enum Files {
    Fixed(BTreeMap<FloorId, PathBuf>),
    /// Re-read `rcs_map.source_file` on every load so path edits apply on reload.
    Configured(ConfigHandle),
}

/// One UTF-8 JSON document per floor.
///
/// Missing or unreadable files are logged and skipped; the remaining
/// floors still load.
pub struct FileSource {
    files: Files,
}

impl FileSource {
    pub fn new(files: BTreeMap<FloorId, PathBuf>) -> Self {
        Self { files: Files::Fixed(files) }
    }

    pub fn from_config(config: ConfigHandle) -> Self {
        Self { files: Files::Configured(config) }
    }

    fn paths(&self) -> BTreeMap<FloorId, PathBuf> {
        match &self.files {
            Files::Fixed(files) => files.clone(),
            Files::Configured(config) => config.load().rcs_map.source_file.clone(),
        }
    }
}

#[async_trait]
impl MapSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn load_raw(&self) -> Result<BTreeMap<FloorId, String>> {
        let mut result = BTreeMap::new();
        for (floor, path) in self.paths() {
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    result.insert(floor, text);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(%floor, path = %path.display(), "map file does not exist");
                }
                Err(e) => {
                    tracing::error!(%floor, path = %path.display(), error = %e, "failed to read map file");
                }
            }
        }
        Ok(result)
    }
}
