//! Mock implementations for testing.
//!
//! In-memory stand-ins for the store, identity, clock and randomness
//! seams, so the lifecycle and sync layers can be exercised without a
//! real backend.

pub mod identity;
pub mod random;
pub mod store;
pub mod time;

pub use identity::MockIdentity;
pub use random::MockRandom;
pub use store::{seed_listing, test_details, MockListingStore, MockStoreFailure, SharedStoreHandle};
pub use time::MockTime;
