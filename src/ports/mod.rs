//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the engine and what it is handed (trained models, artifact files).

mod artifacts;
mod model;

pub use artifacts::ArtifactStore;
pub use model::ProbabilisticModel;
