//! Testing utilities and fixtures
//!
//! Scripted oracles, a store wrapper that fails on demand, a confirmation
//! handler with canned answers, and a seeded reference table. Used by the
//! unit tests and by the integration tests under `tests/`.

pub mod fixtures;
pub mod mocks;

pub use fixtures::{reference_foods, seeded_store, test_engine};
pub use mocks::{FailingStore, ScriptedConfirmation, ScriptedDisambiguator, ScriptedEstimator};
