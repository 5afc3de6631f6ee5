//! Live snapshot relay for a single listing.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{MarketError, MarketResult};
use crate::marketplace::{Listing, ListingId};
use crate::traits::{ListingStore, StoreEvent};

/// A delivery from the live subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotUpdate {
    Snapshot(Listing),
    Removed,
}

/// Opens live subscriptions against the store.
#[derive(Clone)]
pub struct Synchronizer<S: ListingStore> {
    store: S,
}

impl<S: ListingStore> Synchronizer<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Subscribe to a listing.
    ///
    /// The returned subscription yields the current snapshot first, then one
    /// update per committed change. Dropping it releases the store watch.
    pub async fn subscribe(&self, listing_id: &ListingId) -> MarketResult<LiveListing> {
        let subscription = self.store.subscribe(listing_id).await?;
        debug!(listing = %listing_id, "live subscription opened");
        Ok(LiveListing {
            listing_id: listing_id.clone(),
            events: subscription.events,
            cancel: subscription.cancel,
            stale: false,
            finished: false,
        })
    }
}

/// A standing subscription to one listing.
///
/// Interprets nothing: store snapshots are handed through as-is. A stream
/// failure ends delivery and marks the subscription stale; whatever the
/// consumer last received is then the best it will get.
#[derive(Debug)]
pub struct LiveListing {
    listing_id: ListingId,
    events: mpsc::UnboundedReceiver<StoreEvent>,
    cancel: CancellationToken,
    stale: bool,
    finished: bool,
}

impl LiveListing {
    pub const fn listing_id(&self) -> &ListingId {
        &self.listing_id
    }

    /// Wait for the next delivery. `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<SnapshotUpdate> {
        if self.finished {
            return None;
        }
        match self.events.recv().await {
            Some(event) => self.relay(event),
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// Take an already-queued delivery without waiting.
    pub fn try_next(&mut self) -> Option<SnapshotUpdate> {
        if self.finished {
            return None;
        }
        match self.events.try_recv() {
            Ok(event) => self.relay(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.finished = true;
                None
            }
        }
    }

    /// Wait for the initial delivery, bounded by `timeout`.
    pub async fn first_snapshot(&mut self, timeout: Duration) -> MarketResult<SnapshotUpdate> {
        match tokio::time::timeout(timeout, self.next()).await {
            Ok(Some(update)) => Ok(update),
            Ok(None) => Err(MarketError::Unavailable(format!(
                "subscription to listing {} ended before the first snapshot",
                self.listing_id
            ))),
            Err(_) => Err(MarketError::Unavailable(format!(
                "no snapshot of listing {} within {timeout:?}",
                self.listing_id
            ))),
        }
    }

    fn relay(&mut self, event: StoreEvent) -> Option<SnapshotUpdate> {
        match event {
            StoreEvent::Snapshot(listing) => Some(SnapshotUpdate::Snapshot(listing)),
            StoreEvent::Removed => {
                self.finished = true;
                Some(SnapshotUpdate::Removed)
            }
            StoreEvent::Failed(reason) => {
                warn!(
                    listing = %self.listing_id,
                    "live subscription failed, snapshot is now stale: {reason}"
                );
                self.stale = true;
                self.unsubscribe();
                None
            }
        }
    }

    /// Stop delivery and release the store watch.
    ///
    /// Idempotent; returns `true` only on the call that actually released.
    pub fn unsubscribe(&mut self) -> bool {
        self.finished = true;
        if self.cancel.is_cancelled() {
            return false;
        }
        self.cancel.cancel();
        self.events.close();
        debug!(listing = %self.listing_id, "live subscription released");
        true
    }

    /// True once the subscription failed; the last delivery may be outdated.
    pub const fn is_stale(&self) -> bool {
        self.stale
    }

    /// True once no further deliveries can arrive.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for LiveListing {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
