//! # Map Sources and Graph Storage
//!
//! [`MapSource`] is the contract between the snapshot builder and wherever
//! raw floor definitions live. The builder never reads files itself.
//!
//! ## Implementations
//!
//! | Source | Module | Description |
//! |--------|--------|-------------|
//! | `FileSource` | `file` | One JSON document per floor on disk |
//! | `MemorySource` | `memory` | In-process documents for embedding and tests |
//!
//! The [`graph`] module holds the immutable digraph every snapshot owns.

pub mod file;
pub mod graph;
pub mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConfigHandle;
use crate::model::FloorId;
use crate::{Error, Result};

pub use file::FileSource;
pub use graph::{Digraph, Edge};
pub use memory::MemorySource;

/// Supplies raw floor definitions.
///
/// A floor that cannot be read should be logged and left out of the map;
/// an `Err` means the source as a whole is unusable.
#[async_trait]
pub trait MapSource: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// floor → raw document text.
    async fn load_raw(&self) -> Result<BTreeMap<FloorId, String>>;
}

#[async_trait]
impl<S: MapSource + ?Sized> MapSource for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn load_raw(&self) -> Result<BTreeMap<FloorId, String>> {
        (**self).load_raw().await
    }
}

/// Pick a source from `rcs_map.source_type`.
pub fn source_from_config(config: &ConfigHandle) -> Result<Arc<dyn MapSource>> {
    let kind = config.load().rcs_map.source_type.trim().to_ascii_lowercase();
    match kind.as_str() {
        "" | "file" => Ok(Arc::new(FileSource::from_config(config.clone()))),
        other => Err(Error::Config(format!("unsupported map source type `{other}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, MapConfig};

    #[test]
    fn test_source_from_config() {
        let handle = config::handle(MapConfig::default());
        assert_eq!(source_from_config(&handle).unwrap().name(), "file");

        let mut cfg = MapConfig::default();
        cfg.rcs_map.source_type = "http".into();
        let handle = config::handle(cfg);
        assert!(matches!(source_from_config(&handle), Err(Error::Config(_))));
    }
}
