//! Model registry: versioned artifacts on disk, versions and stages in SQLite.

mod registry;

pub use registry::{ModelRegistry, ModelVersion, NewVersion, Stage};
