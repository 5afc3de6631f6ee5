//! Store-backed operations: the lifecycle engine and the live synchronizer.

pub mod engine;
pub mod synchronizer;

pub use engine::{Accepted, LifecycleEngine};
pub use synchronizer::{LiveListing, SnapshotUpdate, Synchronizer};
