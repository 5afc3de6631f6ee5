//! Trait abstractions for dependency injection and testability.
//!
//! The store and identity provider are external systems. They are injected
//! into the engine, synchronizer and sessions instead of being reached
//! through process-wide handles.

pub mod identity;
pub mod random;
pub mod store;
pub mod time;

// Re-export all traits for crate-internal use.
// The public API surface is controlled by lib.rs re-exports.
pub use identity::IdentityProvider;
pub use random::RandomSource;
pub use store::{ListingStore, StoreEvent, StoreSubscription};
pub use time::TimeProvider;

// Re-export default implementations
pub use random::ThreadRng;
pub use time::SystemTimeProvider;
