//! In-memory listing store for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::{MarketError, MarketResult};
use crate::marketplace::{Listing, ListingDetails, ListingId, ListingPatch, UserId};
use crate::mocks::{MockRandom, MockTime};
use crate::traits::{
    ListingStore, RandomSource, StoreEvent, StoreSubscription, TimeProvider,
};

/// Types of failures that can be simulated.
#[derive(Debug, Clone)]
pub enum MockStoreFailure {
    /// Fail all operations.
    All,
    /// Fail only reads and subscribes.
    Reads,
    /// Fail only updates and deletes.
    Writes,
    /// Fail on a specific listing.
    OnListing(ListingId),
}

#[derive(Debug)]
struct Watcher {
    client: String,
    tx: mpsc::UnboundedSender<StoreEvent>,
    cancel: CancellationToken,
}

impl Watcher {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.tx.is_closed()
    }
}

#[derive(Debug, Default)]
struct StoreState {
    /// CBOR-encoded documents, keyed by listing id
    documents: HashMap<ListingId, Vec<u8>>,
    watchers: HashMap<ListingId, Vec<Watcher>>,
}

impl StoreState {
    fn decode(&self, id: &ListingId) -> MarketResult<Listing> {
        let bytes = self
            .documents
            .get(id)
            .ok_or_else(|| MarketError::NotFound(format!("listing {id}")))?;
        Listing::from_cbor(bytes)
    }

    /// Push an event to every live watcher of `id`, dropping released ones.
    fn notify(&mut self, id: &ListingId, event: &StoreEvent) {
        if let Some(watchers) = self.watchers.get_mut(id) {
            watchers.retain(|w| w.is_live() && w.tx.send(event.clone()).is_ok());
        }
    }
}

struct MockStoreInner {
    state: RwLock<StoreState>,
    writes: AtomicU64,
    time: Arc<dyn TimeProvider>,
    rng: Arc<dyn RandomSource>,
}

/// Mock document store for testing.
///
/// All clients created from the same `SharedStoreHandle` see the same
/// documents. Each `MockListingStore` is one client's connection, with its
/// own simulated failures and latency.
#[derive(Clone)]
pub struct MockListingStore {
    inner: Arc<MockStoreInner>,
    client: String,
    fail_mode: Arc<RwLock<Option<MockStoreFailure>>>,
    write_delay: Arc<RwLock<Option<Duration>>>,
}

/// Handle to shared store storage for creating client connections.
#[derive(Clone)]
pub struct SharedStoreHandle {
    inner: Arc<MockStoreInner>,
}

impl SharedStoreHandle {
    pub fn new() -> Self {
        Self::with_clock(MockTime::default(), MockRandom::default())
    }

    pub fn with_clock(
        time: impl TimeProvider + 'static,
        rng: impl RandomSource + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(MockStoreInner {
                state: RwLock::new(StoreState::default()),
                writes: AtomicU64::new(0),
                time: Arc::new(time),
                rng: Arc::new(rng),
            }),
        }
    }

    /// Create a connection to the shared store for one client.
    pub fn connect(&self, client: impl Into<String>) -> MockListingStore {
        MockListingStore {
            inner: self.inner.clone(),
            client: client.into(),
            fail_mode: Arc::new(RwLock::new(None)),
            write_delay: Arc::new(RwLock::new(None)),
        }
    }
}

impl Default for SharedStoreHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl MockListingStore {
    /// Create a new single-client store.
    ///
    /// For multi-viewer tests, use `SharedStoreHandle` instead.
    pub fn new() -> Self {
        SharedStoreHandle::new().connect("client-0")
    }

    /// Set failure mode for testing error handling.
    pub async fn set_fail_mode(&self, mode: Option<MockStoreFailure>) {
        *self.fail_mode.write().await = mode;
    }

    /// Delay every write from this client by `delay` before it commits.
    pub async fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.write().await = delay;
    }

    async fn should_fail(&self, is_write: bool, id: &ListingId) -> bool {
        let mode = self.fail_mode.read().await;
        match &*mode {
            None => false,
            Some(MockStoreFailure::All) => true,
            Some(MockStoreFailure::Reads) => !is_write,
            Some(MockStoreFailure::Writes) => is_write,
            Some(MockStoreFailure::OnListing(target)) => target == id,
        }
    }

    async fn before_write(&self, id: &ListingId, op: &str) -> MarketResult<()> {
        if self.should_fail(true, id).await {
            return Err(MarketError::Store(format!(
                "MockListingStore: simulated {op} failure"
            )));
        }
        let delay = *self.write_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    /// Create a new available listing owned by `owner`.
    pub async fn create_listing(
        &self,
        owner: &UserId,
        details: ListingDetails,
    ) -> MarketResult<Listing> {
        let id = ListingId::generate(self.inner.rng.as_ref());
        let ListingDetails {
            name,
            price,
            description,
            condition,
            subject,
            year_level,
            kind,
        } = details;

        let mut builder = Listing::builder_with_time(self.inner.time.clone())
            .id(id)
            .owner(owner.clone())
            .name(name)
            .price(price)
            .description(description)
            .condition(condition)
            .year_level(year_level)
            .kind(kind);
        if let Some(subject) = subject {
            builder = builder.subject(subject);
        }
        let listing = builder.build()?;

        self.insert_listing(listing.clone()).await?;
        Ok(listing)
    }

    /// Store a document as-is, replacing any existing one with the same id.
    pub async fn insert_listing(&self, listing: Listing) -> MarketResult<()> {
        self.before_write(&listing.id, "insert").await?;
        let bytes = listing.to_cbor()?;

        let mut state = self.inner.state.write().await;
        state.documents.insert(listing.id.clone(), bytes);
        state.notify(&listing.id, &StoreEvent::Snapshot(listing.clone()));
        Ok(())
    }

    /// Number of committed updates and deletes across all clients.
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Number of watchers on `id` that have not been released.
    pub async fn active_watchers(&self, id: &ListingId) -> usize {
        let mut state = self.inner.state.write().await;
        let Some(watchers) = state.watchers.get_mut(id) else {
            return 0;
        };
        watchers.retain(Watcher::is_live);
        watchers.len()
    }

    /// Simulate this client losing its connection: every subscription it
    /// holds receives a failure and is dropped.
    pub async fn break_subscriptions(&self, reason: &str) {
        let mut state = self.inner.state.write().await;
        for watchers in state.watchers.values_mut() {
            watchers.retain(|w| {
                if w.client != self.client {
                    return true;
                }
                let _ = w.tx.send(StoreEvent::Failed(reason.to_string()));
                false
            });
        }
    }

    /// Check if a listing exists.
    pub async fn has_listing(&self, id: &ListingId) -> bool {
        self.inner.state.read().await.documents.contains_key(id)
    }
}

impl Default for MockListingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListingStore for MockListingStore {
    async fn get(&self, id: &ListingId) -> MarketResult<Listing> {
        if self.should_fail(false, id).await {
            return Err(MarketError::Store(
                "MockListingStore: simulated read failure".into(),
            ));
        }
        self.inner.state.read().await.decode(id)
    }

    async fn subscribe(&self, id: &ListingId) -> MarketResult<StoreSubscription> {
        if self.should_fail(false, id).await {
            return Err(MarketError::Store(
                "MockListingStore: simulated subscribe failure".into(),
            ));
        }

        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let mut state = self.inner.state.write().await;
        match state.decode(id) {
            Ok(listing) => {
                let _ = tx.send(StoreEvent::Snapshot(listing));
                state.watchers.entry(id.clone()).or_default().push(Watcher {
                    client: self.client.clone(),
                    tx,
                    cancel: cancel.clone(),
                });
            }
            Err(MarketError::NotFound(_)) => {
                let _ = tx.send(StoreEvent::Removed);
            }
            Err(e) => return Err(e),
        }

        Ok(StoreSubscription { events, cancel })
    }

    async fn update(&self, id: &ListingId, patch: ListingPatch) -> MarketResult<u64> {
        self.before_write(id, "update").await?;

        let mut state = self.inner.state.write().await;
        let mut listing = state.decode(id)?;

        if let Some(expected) = patch.expected_revision {
            if listing.revision != expected {
                return Err(MarketError::Conflict(format!(
                    "listing {id} is at revision {}, write expected {expected}",
                    listing.revision
                )));
            }
        }

        listing.apply_patch(&patch);
        listing.revision += 1;
        listing.updated_at = self.inner.time.now_unix();

        state.documents.insert(id.clone(), listing.to_cbor()?);
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        let revision = listing.revision;
        state.notify(id, &StoreEvent::Snapshot(listing));
        Ok(revision)
    }

    async fn delete(&self, id: &ListingId) -> MarketResult<()> {
        self.before_write(id, "delete").await?;

        let mut state = self.inner.state.write().await;
        if state.documents.remove(id).is_none() {
            return Err(MarketError::NotFound(format!("listing {id}")));
        }
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        state.notify(id, &StoreEvent::Removed);
        state.watchers.remove(id);
        Ok(())
    }
}

/// Seed an available listing owned by `owner` with fixed details.
pub async fn seed_listing(store: &MockListingStore, owner: &str) -> Listing {
    store
        .create_listing(&UserId::new(owner), test_details("Year 12 Physics textbook"))
        .await
        .expect("seeding a listing into the mock store")
}

/// Plausible descriptive fields for tests.
pub fn test_details(name: &str) -> ListingDetails {
    ListingDetails {
        name: name.to_string(),
        price: 30,
        description: "Lightly used, no missing pages".to_string(),
        condition: "good".to_string(),
        subject: Some("Physics".to_string()),
        year_level: 12,
        kind: "textbook".to_string(),
    }
}
