//! Adapters layer: Concrete implementations of ports.
//!
//! - `artifacts`: filesystem and in-memory artifact stores, manifest
//!   verification and profile assembly
//! - `sanitize`: PII and clinical-value filtering for logs

pub mod artifacts;
pub mod sanitize;

pub use artifacts::{load_profile, DirectoryStore, IntegrityPolicy, MemoryStore, ProfileManifest};
