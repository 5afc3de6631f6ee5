pub mod actions;
pub mod config;
pub mod error;
pub mod marketplace;
pub mod ops;
pub mod session;
pub mod traits;
pub mod util;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use actions::ActionDispatcher;
pub use config::*;
pub use error::{MarketError, MarketResult, RejectionKind};
pub use marketplace::{
    apply_action, Actor, ActorState, ExpectedOutcome, Expectation, Listing, ListingAction,
    ListingBuilder, ListingDetails, ListingId, ListingPatch, ListingState, ListingView,
    LocalSnapshot, Reconciliation, Transition, UserId,
};
pub use ops::{Accepted, LifecycleEngine, LiveListing, SnapshotUpdate, Synchronizer};
pub use session::{ListingSession, SessionEvent, SessionHandle};
pub use traits::{
    IdentityProvider, ListingStore, RandomSource, StoreEvent, StoreSubscription,
    SystemTimeProvider, ThreadRng, TimeProvider,
};
