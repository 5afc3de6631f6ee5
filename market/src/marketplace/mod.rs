pub mod actor;
pub mod lifecycle;
pub mod listing;
pub mod view;

pub use actor::{Actor, ActorState};
pub use lifecycle::{
    apply_action, ExpectedOutcome, Expectation, ListingAction, Reconciliation, Transition,
};
pub use listing::{
    Listing, ListingBuilder, ListingDetails, ListingId, ListingPatch, ListingState, UserId,
};
pub use view::{ListingView, LocalSnapshot};
