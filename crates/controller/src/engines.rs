use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use engine::Engine;
use shared::domain::EngineId;

/// Owning-side lookup table from engine id to live engine.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: Arc<RwLock<HashMap<EngineId, Arc<dyn Engine>>>>,
}

impl EngineRegistry {
    pub fn insert(&self, engine_id: EngineId, engine: Arc<dyn Engine>) {
        self.engines
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(engine_id, engine);
    }

    pub fn get(&self, engine_id: EngineId) -> Option<Arc<dyn Engine>> {
        self.engines
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&engine_id)
            .cloned()
    }

    pub fn remove(&self, engine_id: EngineId) -> Option<Arc<dyn Engine>> {
        self.engines
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&engine_id)
    }

    pub fn len(&self) -> usize {
        self.engines
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
