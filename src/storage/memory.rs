//! In-memory raw floor definitions.
//!
//! Documents can be replaced at any time; the next build picks them up.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::FloorId;
use crate::Result;
use super::MapSource;

#[derive(Default)]
pub struct MemorySource {
    floors: RwLock<BTreeMap<FloorId, String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_floor(self, floor: u32, document: impl Into<String>) -> Self {
        self.set_floor(FloorId(floor), document);
        self
    }

    /// Insert or replace one floor's document.
    pub fn set_floor(&self, floor: FloorId, document: impl Into<String>) {
        self.floors.write().insert(floor, document.into());
    }

    pub fn remove_floor(&self, floor: FloorId) -> Option<String> {
        self.floors.write().remove(&floor)
    }

    pub fn clear(&self) {
        self.floors.write().clear();
    }
}

#[async_trait]
impl MapSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load_raw(&self) -> Result<BTreeMap<FloorId, String>> {
        Ok(self.floors.read().clone())
    }
}
