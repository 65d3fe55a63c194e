//! Mock implementations of the external collaborators

pub mod confirmation;
pub mod oracle;
pub mod store;

pub use confirmation::ScriptedConfirmation;
pub use oracle::{ScriptedDisambiguator, ScriptedEstimator};
pub use store::FailingStore;
