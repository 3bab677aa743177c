//! Timeshift sprite manifest
//!
//! The manifest endpoint returns a JSON array; each element describes a run
//! of sprite sheets covering one time window of the recorded stream.

mod entry;
mod store;

pub use entry::{parse_manifest, ManifestEntry};
pub use store::ManifestStore;
