//! What a viewer should be shown for a (snapshot, actor) pair.
//!
//! Computed once per delivery so the presentation layer switches on a single
//! tag instead of re-deriving ownership and reservation rules itself.

use serde::Serialize;

use super::actor::ActorState;
use super::lifecycle::ListingAction;
use super::listing::{Listing, ListingState};

/// A viewer's provisional copy of the listing.
///
/// Replaced wholesale on every delivery from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LocalSnapshot {
    /// Subscribed, nothing delivered yet
    #[default]
    Awaiting,
    Present(Listing),
    Removed,
}

impl LocalSnapshot {
    pub const fn listing(&self) -> Option<&Listing> {
        match self {
            Self::Present(listing) => Some(listing),
            Self::Awaiting | Self::Removed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ListingView {
    /// Snapshot or identity still resolving
    Loading,
    Owned { sold: bool },
    Available,
    ReservedByMe,
    ReservedByOther,
    Sold,
    Removed,
}

impl ListingView {
    pub fn compute(local: &LocalSnapshot, actor: &ActorState) -> Self {
        let listing = match local {
            LocalSnapshot::Awaiting => return Self::Loading,
            LocalSnapshot::Removed => return Self::Removed,
            LocalSnapshot::Present(listing) => listing,
        };
        let Some(actor) = actor.resolved() else {
            return Self::Loading;
        };

        if actor.is(&listing.owner_id) {
            return Self::Owned {
                sold: listing.state == ListingState::Sold,
            };
        }

        match listing.state {
            ListingState::Available => Self::Available,
            ListingState::Reserved => match actor.uid() {
                Some(uid) if listing.is_reserved_by(uid) => Self::ReservedByMe,
                _ => Self::ReservedByOther,
            },
            ListingState::Sold => Self::Sold,
        }
    }

    /// Intents the presentation layer may enable for this view.
    pub const fn permitted_intents(self) -> &'static [ListingAction] {
        match self {
            Self::Owned { sold: false } => &[ListingAction::MarkSold, ListingAction::Delete],
            Self::Owned { sold: true } => &[ListingAction::MarkAvailable, ListingAction::Delete],
            Self::Available => &[ListingAction::Reserve],
            Self::ReservedByMe => &[ListingAction::Cancel],
            Self::Loading | Self::ReservedByOther | Self::Sold | Self::Removed => &[],
        }
    }

    pub fn permits(self, action: ListingAction) -> bool {
        self.permitted_intents().contains(&action)
    }
}
