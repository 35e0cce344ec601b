// src/state.rs
use std::sync::Arc;

use crate::inventory::MovementEngine;
use crate::store::InventoryStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: MovementEngine,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn InventoryStore>, jwt_secret: impl Into<Arc<str>>) -> Self {
        Self {
            engine: MovementEngine::new(store),
            jwt_secret: jwt_secret.into(),
        }
    }
}
