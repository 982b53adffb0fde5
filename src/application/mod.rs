//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the prediction pipeline.

pub mod attribution;
pub mod encoder;
pub mod inference;
pub mod registry;
pub mod risk;

mod assessment;

pub use assessment::{assemble, failure, AssessmentService};
pub use registry::{global, init_global, ProfileRegistry, ProfileStatus};
