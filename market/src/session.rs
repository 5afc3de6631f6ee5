//! One viewer's live session on one listing.
//!
//! `ListingSession` ties together the live subscription, the identity stream
//! and the action dispatcher. The presentation layer drives it by awaiting
//! [`ListingSession::next_event`] and calling [`ListingSession::dispatch`];
//! other tasks can read the current view through a cloned [`SessionHandle`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::actions::ActionDispatcher;
use crate::config::MarketConfig;
use crate::error::{MarketError, MarketResult};
use crate::marketplace::{
    ActorState, Listing, ListingAction, ListingId, ListingState, ListingView, LocalSnapshot,
    Reconciliation, Transition, UserId,
};
use crate::ops::{Accepted, LifecycleEngine, LiveListing, SnapshotUpdate, Synchronizer};
use crate::traits::{IdentityProvider, ListingStore};

/// Something the viewer should react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The local copy was replaced with this snapshot.
    Snapshot(Listing),
    /// The listing was deleted; the session is over.
    Removed,
    ActorChanged(ActorState),
    /// An accepted write of ours was overwritten by another viewer.
    Conflict {
        action: ListingAction,
        observed_state: Option<ListingState>,
        observed_buyer: Option<UserId>,
    },
    /// The subscription broke; the local copy will not update again.
    Stale,
}

/// Read-only view of a session, shareable across tasks.
#[derive(Clone)]
pub struct SessionHandle {
    local: Arc<RwLock<LocalSnapshot>>,
    actor_rx: watch::Receiver<ActorState>,
}

impl SessionHandle {
    pub fn snapshot(&self) -> LocalSnapshot {
        self.local.read().clone()
    }

    pub fn actor(&self) -> ActorState {
        self.actor_rx.borrow().clone()
    }

    pub fn view(&self) -> ListingView {
        ListingView::compute(&self.local.read(), &self.actor_rx.borrow())
    }
}

pub struct ListingSession<S: ListingStore> {
    listing_id: ListingId,
    live: LiveListing,
    actor_rx: watch::Receiver<ActorState>,
    identity_open: bool,
    local: Arc<RwLock<LocalSnapshot>>,
    dispatcher: ActionDispatcher<S>,
    queued: VecDeque<SessionEvent>,
    stale_reported: bool,
}

impl<S: ListingStore> ListingSession<S> {
    /// Subscribe to `listing_id` and wait for its first snapshot.
    ///
    /// Fails with `NotFound` if the listing does not exist and with
    /// `Unavailable` if no snapshot arrives within the configured bound.
    pub async fn open<I: IdentityProvider>(
        store: S,
        identity: &I,
        listing_id: &ListingId,
        config: MarketConfig,
    ) -> MarketResult<Self> {
        let limit = config.snapshot_timeout;
        let sync = Synchronizer::new(store.clone());
        let mut live = tokio::time::timeout(limit, sync.subscribe(listing_id))
            .await
            .map_err(|_| {
                MarketError::Unavailable(format!(
                    "subscribing to listing {listing_id} timed out after {limit:?}"
                ))
            })??;

        let listing = match live.first_snapshot(limit).await? {
            SnapshotUpdate::Snapshot(listing) => listing,
            SnapshotUpdate::Removed => {
                return Err(MarketError::NotFound(format!("listing {listing_id}")));
            }
        };

        let actor_rx = identity.current_actor();

        debug!(listing = %listing_id, revision = listing.revision, "session opened");

        Ok(Self {
            listing_id: listing_id.clone(),
            live,
            actor_rx,
            identity_open: true,
            local: Arc::new(RwLock::new(LocalSnapshot::Present(listing))),
            dispatcher: ActionDispatcher::new(LifecycleEngine::new(store, config)),
            queued: VecDeque::new(),
            stale_reported: false,
        })
    }

    pub const fn listing_id(&self) -> &ListingId {
        &self.listing_id
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            local: self.local.clone(),
            actor_rx: self.actor_rx.clone(),
        }
    }

    pub fn snapshot(&self) -> LocalSnapshot {
        self.local.read().clone()
    }

    pub fn actor(&self) -> ActorState {
        self.actor_rx.borrow().clone()
    }

    pub fn view(&self) -> ListingView {
        ListingView::compute(&self.local.read(), &self.actor_rx.borrow())
    }

    pub const fn is_stale(&self) -> bool {
        self.live.is_stale()
    }

    /// True once the subscription is released, by removal, failure or close.
    pub const fn is_closed(&self) -> bool {
        self.live.is_finished()
    }

    /// Wait for the next thing the viewer should react to.
    ///
    /// Returns `None` once the subscription has ended and every pending
    /// event has been handed out.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Some(event);
            }
            if self.live.is_stale() && !self.stale_reported {
                self.stale_reported = true;
                return Some(SessionEvent::Stale);
            }
            if self.live.is_finished() {
                return None;
            }

            tokio::select! {
                update = self.live.next() => {
                    if let Some(update) = update {
                        self.absorb(update);
                    }
                }
                changed = self.actor_rx.changed(), if self.identity_open => {
                    match changed {
                        Ok(()) => {
                            let actor = self.actor_rx.borrow_and_update().clone();
                            self.queued.push_back(SessionEvent::ActorChanged(actor));
                        }
                        Err(_) => self.identity_open = false,
                    }
                }
            }
        }
    }

    /// Replace the local copy with the newest delivery and settle pending
    /// writes against it.
    fn absorb(&mut self, update: SnapshotUpdate) {
        // Only the newest queued delivery is worth showing.
        let mut latest = update;
        while let Some(next) = self.live.try_next() {
            latest = next;
        }

        let settled = self.dispatcher.reconcile(&latest);

        match latest {
            SnapshotUpdate::Snapshot(listing) => {
                *self.local.write() = LocalSnapshot::Present(listing.clone());
                self.queued.push_back(SessionEvent::Snapshot(listing));
            }
            SnapshotUpdate::Removed => {
                *self.local.write() = LocalSnapshot::Removed;
                self.queued.push_back(SessionEvent::Removed);
            }
        }

        for (expectation, reconciliation) in settled {
            let Reconciliation::Diverged {
                observed_state,
                observed_buyer,
            } = reconciliation
            else {
                continue;
            };
            let action = expectation.action;
            info!(
                listing = %self.listing_id,
                %action,
                committed_revision = ?expectation.committed_revision,
                ?observed_state,
                "accepted write was overwritten by another viewer"
            );
            self.queued.push_back(SessionEvent::Conflict {
                action,
                observed_state,
                observed_buyer,
            });
        }
    }

    /// Act on the snapshot currently displayed, as the actor currently known.
    ///
    /// The local copy is not touched by updates; their result shows up as a
    /// later [`SessionEvent::Snapshot`]. An accepted delete ends the session:
    /// the subscription is released, the local copy becomes `Removed` and
    /// [`SessionEvent::Removed`] is queued.
    pub async fn dispatch(&mut self, intent: ListingAction) -> MarketResult<Accepted> {
        let snapshot = self.local.read().clone();
        let actor = self.actor_rx.borrow().clone();
        let accepted = self.dispatcher.dispatch(&snapshot, &actor, intent).await?;

        if accepted.transition == Transition::Remove {
            self.live.unsubscribe();
            self.dispatcher.reconcile(&SnapshotUpdate::Removed);
            *self.local.write() = LocalSnapshot::Removed;
            self.queued.push_back(SessionEvent::Removed);
        }
        Ok(accepted)
    }

    /// Release the subscription. Also happens on drop.
    pub fn close(&mut self) {
        if self.live.unsubscribe() {
            debug!(listing = %self.listing_id, "session closed");
        }
    }
}
