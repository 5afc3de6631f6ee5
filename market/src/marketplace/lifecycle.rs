//! The listing lifecycle: legal transitions and their ownership guards.
//!
//! | From        | Action        | Guard           | To        | buyer          |
//! |-------------|---------------|-----------------|-----------|----------------|
//! | available   | reserve       | actor != owner  | reserved  | actor          |
//! | reserved    | cancel        | actor == buyer  | available | cleared        |
//! | any         | mark sold     | actor == owner  | sold      | kept (*)       |
//! | sold        | mark available| actor == owner  | available | cleared        |
//! | any         | delete        | actor == owner  | removed   | -              |
//!
//! (*) Marking an available listing sold records the owner as buyer so that
//! `buyer_id` stays present for every non-available state.
//!
//! Owner-only actions check identity before state; buyer actions check state
//! before identity. So a stranger cancelling someone else's reservation gets
//! `Unauthorized`, while cancelling an already-available listing is
//! `InvalidTransition` for everyone.

use serde::{Deserialize, Serialize};

use super::actor::Actor;
use super::listing::{Listing, ListingId, ListingPatch, ListingState, UserId};
use crate::error::{MarketError, MarketResult};

/// A lifecycle action a viewer can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingAction {
    Reserve,
    Cancel,
    MarkSold,
    MarkAvailable,
    Delete,
}

impl ListingAction {
    pub const ALL: [Self; 5] = [
        Self::Reserve,
        Self::Cancel,
        Self::MarkSold,
        Self::MarkAvailable,
        Self::Delete,
    ];

    /// Actions only the listing owner may take.
    pub const fn is_owner_action(self) -> bool {
        matches!(self, Self::MarkSold | Self::MarkAvailable | Self::Delete)
    }
}

impl std::fmt::Display for ListingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Reserve => "reserve",
            Self::Cancel => "cancel",
            Self::MarkSold => "mark_sold",
            Self::MarkAvailable => "mark_available",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Result of a legal action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Update {
        state: ListingState,
        buyer_id: Option<UserId>,
    },
    Remove,
}

impl Transition {
    /// The store patch implementing this transition, if it is an update.
    ///
    /// `based_on` is the revision the guard saw; it is recorded on the
    /// document so other viewers can tell a follow-up from a race.
    pub fn to_patch(
        &self,
        based_on: u64,
        expected_revision: Option<u64>,
    ) -> Option<ListingPatch> {
        match self {
            Self::Update { state, buyer_id } => Some(ListingPatch {
                state: Some(*state),
                buyer_id: Some(buyer_id.clone()),
                based_on: Some(based_on),
                expected_revision,
            }),
            Self::Remove => None,
        }
    }
}

/// Validate `action` by `actor` against `snapshot`.
///
/// Pure: never touches the store. Every `Ok` is a row of the transition table.
pub fn apply_action(
    snapshot: &Listing,
    actor: &Actor,
    action: ListingAction,
) -> MarketResult<Transition> {
    match action {
        ListingAction::Reserve => {
            if snapshot.state != ListingState::Available {
                return Err(MarketError::InvalidTransition(format!(
                    "cannot reserve a {} listing",
                    snapshot.state
                )));
            }
            let uid = actor
                .uid()
                .ok_or_else(|| MarketError::Unauthorized("sign in to reserve".into()))?;
            if snapshot.is_owned_by(uid) {
                return Err(MarketError::Unauthorized(
                    "owner cannot reserve their own listing".into(),
                ));
            }
            Ok(Transition::Update {
                state: ListingState::Reserved,
                buyer_id: Some(uid.clone()),
            })
        }
        ListingAction::Cancel => {
            if snapshot.state != ListingState::Reserved {
                return Err(MarketError::InvalidTransition(format!(
                    "no reservation to cancel on a {} listing",
                    snapshot.state
                )));
            }
            match actor.uid() {
                Some(uid) if snapshot.is_reserved_by(uid) => Ok(Transition::Update {
                    state: ListingState::Available,
                    buyer_id: None,
                }),
                _ => Err(MarketError::Unauthorized(
                    "only the reserving buyer may cancel".into(),
                )),
            }
        }
        ListingAction::MarkSold => {
            require_owner(snapshot, actor, action)?;
            let buyer_id = snapshot
                .buyer_id
                .clone()
                .unwrap_or_else(|| snapshot.owner_id.clone());
            Ok(Transition::Update {
                state: ListingState::Sold,
                buyer_id: Some(buyer_id),
            })
        }
        ListingAction::MarkAvailable => {
            require_owner(snapshot, actor, action)?;
            if snapshot.state != ListingState::Sold {
                return Err(MarketError::InvalidTransition(format!(
                    "only sold listings can be made available again (listing is {})",
                    snapshot.state
                )));
            }
            Ok(Transition::Update {
                state: ListingState::Available,
                buyer_id: None,
            })
        }
        ListingAction::Delete => {
            require_owner(snapshot, actor, action)?;
            Ok(Transition::Remove)
        }
    }
}

fn require_owner(snapshot: &Listing, actor: &Actor, action: ListingAction) -> MarketResult<()> {
    if actor.is(&snapshot.owner_id) {
        Ok(())
    } else {
        Err(MarketError::Unauthorized(format!(
            "only the owner may {action} this listing"
        )))
    }
}

/// What the actor should see once their accepted action is reflected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedOutcome {
    State {
        state: ListingState,
        buyer_id: Option<UserId>,
    },
    Removed,
}

impl From<&Transition> for ExpectedOutcome {
    fn from(transition: &Transition) -> Self {
        match transition {
            Transition::Update { state, buyer_id } => Self::State {
                state: *state,
                buyer_id: buyer_id.clone(),
            },
            Transition::Remove => Self::Removed,
        }
    }
}

/// An accepted action awaiting confirmation from the live snapshot stream.
///
/// There is no compare-and-swap in last-write-wins mode, so a write that the
/// store accepted can still be overwritten by a concurrent viewer. Seeing our
/// own write echoed back proves nothing about that, so the expectation stays
/// open until a later write lands. That write either built on ours (its
/// `based_on` is at or past our committed revision) or raced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub listing_id: ListingId,
    pub action: ListingAction,
    pub outcome: ExpectedOutcome,
    /// Revision the guard was evaluated against
    pub base_revision: u64,
    /// Revision the store reported for our write (updates only)
    pub committed_revision: Option<u64>,
}

/// How a fresher snapshot relates to a pending expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Not settled: the snapshot predates our write or is our write itself.
    Pending,
    /// A later write was made with our write in view.
    Confirmed,
    /// Someone else's write landed on top of ours without seeing it.
    Diverged {
        observed_state: Option<ListingState>,
        observed_buyer: Option<UserId>,
    },
    /// The listing was deleted; there is nothing left to compare against.
    Superseded,
}

impl Reconciliation {
    pub const fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Expectation {
    /// Revision our own write landed at.
    pub const fn settles_at(&self) -> u64 {
        match self.committed_revision {
            Some(revision) => revision,
            None => self.base_revision + 1,
        }
    }

    /// Compare against a delivered snapshot of the listing.
    pub fn reconcile_snapshot(&self, listing: &Listing) -> Reconciliation {
        let ExpectedOutcome::State { state, buyer_id } = &self.outcome else {
            return Reconciliation::Pending;
        };
        let ours = self.settles_at();
        let matches = listing.state == *state && listing.buyer_id == *buyer_id;
        let diverged = || Reconciliation::Diverged {
            observed_state: Some(listing.state),
            observed_buyer: listing.buyer_id.clone(),
        };

        if listing.revision < ours {
            return Reconciliation::Pending;
        }
        if listing.revision == ours {
            return if matches {
                Reconciliation::Pending
            } else {
                diverged()
            };
        }
        let built_on_ours = listing.based_on.is_some_and(|base| base >= ours);
        if built_on_ours || matches {
            Reconciliation::Confirmed
        } else {
            diverged()
        }
    }

    /// Compare against a delivered removal of the listing.
    pub const fn reconcile_removed(&self) -> Reconciliation {
        match self.outcome {
            ExpectedOutcome::Removed => Reconciliation::Confirmed,
            ExpectedOutcome::State { .. } => Reconciliation::Superseded,
        }
    }
}
