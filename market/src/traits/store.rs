//! Listing store abstraction: the external document store holding one record
//! per listing.
//!
//! The store is the sole source of truth. It offers point reads, field-level
//! updates, deletes, and per-listing change subscriptions.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::MarketResult;
use crate::marketplace::{Listing, ListingId, ListingPatch};

/// A change notification from the store for one listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Full document as committed by the store.
    Snapshot(Listing),
    /// The document was deleted.
    Removed,
    /// The subscription broke (store unreachable). No further events follow.
    Failed(String),
}

/// A standing store subscription.
///
/// The store pushes events into `events` until `cancel` fires or the
/// receiver is dropped. The first event is always the current document
/// (or `Removed` if it no longer exists).
#[derive(Debug)]
pub struct StoreSubscription {
    pub events: mpsc::UnboundedReceiver<StoreEvent>,
    pub cancel: CancellationToken,
}

/// Abstraction over the listing document store.
#[async_trait]
pub trait ListingStore: Send + Sync + Clone + 'static {
    /// Point read. Returns `NotFound` if the listing does not exist.
    async fn get(&self, id: &ListingId) -> MarketResult<Listing>;

    /// Start watching a listing.
    async fn subscribe(&self, id: &ListingId) -> MarketResult<StoreSubscription>;

    /// Apply a field-level update, last write wins per field.
    ///
    /// The patch's `based_on` replaces the document's, so every version
    /// records which revision its writer had seen. Returns the revision the
    /// write committed at. If `patch.expected_revision` is set and no longer
    /// matches, the store rejects the write with `Conflict` and changes
    /// nothing.
    async fn update(&self, id: &ListingId, patch: ListingPatch) -> MarketResult<u64>;

    /// Remove the listing document.
    async fn delete(&self, id: &ListingId) -> MarketResult<()>;
}
