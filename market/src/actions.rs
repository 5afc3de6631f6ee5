//! Intent dispatch for a single viewer.
//!
//! Turns a user intent into an engine call against the snapshot the viewer is
//! currently looking at, and tracks what that write should look like once the
//! store echoes it back.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::error::{MarketError, MarketResult};
use crate::marketplace::{ActorState, Expectation, ListingAction, LocalSnapshot, Reconciliation};
use crate::ops::{Accepted, LifecycleEngine, SnapshotUpdate};
use crate::traits::ListingStore;

/// Routes intents to the lifecycle engine.
///
/// The dispatcher never touches the local snapshot: the only way the viewer
/// learns the outcome of a write is the next delivery from the store.
/// Every accepted write is tracked until a delivery settles it, oldest
/// committed revision first.
pub struct ActionDispatcher<S: ListingStore> {
    engine: LifecycleEngine<S>,
    pending: VecDeque<Expectation>,
}

impl<S: ListingStore> ActionDispatcher<S> {
    pub const fn new(engine: LifecycleEngine<S>) -> Self {
        Self {
            engine,
            pending: VecDeque::new(),
        }
    }

    pub const fn engine(&self) -> &LifecycleEngine<S> {
        &self.engine
    }

    /// Accepted writes not yet settled, in commit order.
    pub fn pending(&self) -> impl ExactSizeIterator<Item = &Expectation> {
        self.pending.iter()
    }

    pub async fn dispatch(
        &mut self,
        snapshot: &LocalSnapshot,
        actor: &ActorState,
        intent: ListingAction,
    ) -> MarketResult<Accepted> {
        let Some(actor) = actor.resolved() else {
            debug!(%intent, "identity still resolving, intent suppressed");
            return Err(MarketError::Unresolved);
        };
        let listing = match snapshot {
            LocalSnapshot::Present(listing) => listing,
            LocalSnapshot::Awaiting => {
                debug!(%intent, "no snapshot yet, intent suppressed");
                return Err(MarketError::Unresolved);
            }
            LocalSnapshot::Removed => {
                return Err(MarketError::NotFound("listing has been removed".into()));
            }
        };

        let accepted = self
            .engine
            .execute(listing, actor, intent)
            .await
            .inspect_err(|e| {
                if !e.is_rejection() {
                    warn!(listing = %listing.id, %intent, "store write failed: {e}");
                }
            })?;

        let expectation = accepted.expectation.clone();
        let at = self
            .pending
            .partition_point(|e| e.settles_at() <= expectation.settles_at());
        self.pending.insert(at, expectation);
        Ok(accepted)
    }

    /// Match a fresh delivery against every pending write.
    ///
    /// Returns the writes this delivery settled, oldest first, and drops them
    /// from the pending set. Writes the delivery cannot settle yet stay.
    pub fn reconcile(&mut self, update: &SnapshotUpdate) -> Vec<(Expectation, Reconciliation)> {
        let mut settled = Vec::new();
        self.pending.retain(|expectation| {
            let outcome = match update {
                SnapshotUpdate::Snapshot(listing) => expectation.reconcile_snapshot(listing),
                SnapshotUpdate::Removed => expectation.reconcile_removed(),
            };
            if outcome.is_settled() {
                settled.push((expectation.clone(), outcome));
                false
            } else {
                true
            }
        });
        settled
    }
}
