//! Test fixtures

use std::path::Path;
use std::sync::Arc;

use crate::agent::{EngineSettings, TurnEngine};
use crate::oracle::Oracles;
use crate::storage::{FoodStore, Macros, MemoryBackend, NewFood};

/// Reference rows, per 100 g. Ids are assigned from 1 in this order.
pub fn reference_foods() -> Vec<NewFood> {
    [
        ("Chicken breast, roasted", 165.0, 31.0, 0.0, 3.6),
        ("Chicken thigh, fried", 240.0, 24.0, 8.0, 13.0),
        ("Banana, raw", 89.0, 1.1, 22.8, 0.3),
        ("White rice, cooked", 130.0, 2.7, 28.0, 0.3),
        ("Egg, boiled", 155.0, 13.0, 1.1, 11.0),
        ("Apple, raw", 52.0, 0.3, 13.8, 0.2),
        ("Bread, whole wheat", 247.0, 13.0, 41.0, 3.4),
    ]
    .into_iter()
    .map(|(name, calories, protein, carbs, fat)| NewFood {
        name: name.to_string(),
        per_100: Macros::new(calories, protein, carbs, fat),
    })
    .collect()
}

pub fn seeded_store() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::with_foods(reference_foods()))
}

/// Engine with default settings and a short oracle timeout, checkpointing under `dir`
pub fn test_engine(
    dir: impl AsRef<Path>,
    store: Arc<dyn FoodStore>,
    oracles: Oracles,
) -> TurnEngine {
    let settings = EngineSettings {
        oracle_timeout: std::time::Duration::from_secs(2),
        ..EngineSettings::default()
    };
    TurnEngine::new(
        store,
        oracles,
        dir.as_ref().join("checkpoints"),
        settings,
    )
}
