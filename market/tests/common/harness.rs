//! Multi-viewer test harness for integration testing.
//!
//! Simulates several independent clients looking at the same listings
//! through one shared in-memory store, each with its own identity and its
//! own connection (so failures and latency can be injected per viewer).

use market::mocks::{
    test_details, MockIdentity, MockListingStore, MockRandom, MockTime, SharedStoreHandle,
};
use market::{Listing, ListingSession, MarketConfig, SessionEvent, UserId};

/// One viewer: an identity plus a store connection.
#[allow(dead_code)]
pub struct ViewerContext {
    pub index: usize,
    pub identity: MockIdentity,
    pub store: MockListingStore,
}

/// Several viewers sharing one store.
pub struct MultiViewerHarness {
    viewers: Vec<ViewerContext>,
    handle: SharedStoreHandle,
    admin: MockListingStore,
    config: MarketConfig,
    time: MockTime,
}

#[allow(dead_code)]
impl MultiViewerHarness {
    /// Create a harness with `num_viewers` viewers, all still resolving
    /// their identity.
    pub fn new(num_viewers: usize) -> Self {
        Self::with_config(num_viewers, MarketConfig::default())
    }

    pub fn with_config(num_viewers: usize, config: MarketConfig) -> Self {
        let time = MockTime::ticking(1000, 1);
        let handle = SharedStoreHandle::with_clock(time.clone(), MockRandom::new(42));
        let admin = handle.connect("admin");

        let viewers = (0..num_viewers)
            .map(|index| ViewerContext {
                index,
                identity: MockIdentity::new(),
                store: handle.connect(format!("viewer-{index}")),
            })
            .collect();

        Self {
            viewers,
            handle,
            admin,
            config,
            time,
        }
    }

    /// Viewer `i` signs in as `U{i}`.
    pub fn sign_in_all(&self) {
        for v in &self.viewers {
            v.identity.sign_in(&Self::uid(v.index));
        }
    }

    /// Conventional uid for viewer `i`.
    pub fn uid(index: usize) -> String {
        format!("U{index}")
    }

    pub fn viewer(&self, index: usize) -> &ViewerContext {
        &self.viewers[index]
    }

    pub fn num_viewers(&self) -> usize {
        self.viewers.len()
    }

    /// A connection outside every viewer, for checking what the store holds.
    pub fn admin(&self) -> &MockListingStore {
        &self.admin
    }

    pub fn time(&self) -> &MockTime {
        &self.time
    }

    /// Viewer `owner` lists an item.
    pub async fn create_listing(&self, owner: usize, name: &str) -> Listing {
        self.admin
            .create_listing(&UserId::new(Self::uid(owner)), test_details(name))
            .await
            .expect("Failed to create listing")
    }

    /// Open a session for viewer `index` on `listing`.
    pub async fn open(&self, index: usize, listing: &Listing) -> ListingSession<MockListingStore> {
        self.open_with(index, listing, self.config.clone()).await
    }

    pub async fn open_with(
        &self,
        index: usize,
        listing: &Listing,
        config: MarketConfig,
    ) -> ListingSession<MockListingStore> {
        let viewer = &self.viewers[index];
        ListingSession::open(viewer.store.clone(), &viewer.identity, &listing.id, config)
            .await
            .expect("Failed to open session")
    }

    /// Current stored copy of `listing`.
    pub async fn stored(&self, listing: &Listing) -> Listing {
        use market::ListingStore;
        self.admin
            .get(&listing.id)
            .await
            .expect("listing should exist")
    }

    /// A fresh connection for ad-hoc clients.
    pub fn connect(&self, name: &str) -> MockListingStore {
        self.handle.connect(name)
    }
}

/// Wait for the next event, skipping identity changes.
pub async fn next_listing_event(
    session: &mut ListingSession<MockListingStore>,
) -> Option<SessionEvent> {
    loop {
        match session.next_event().await {
            Some(SessionEvent::ActorChanged(_)) => continue,
            other => return other,
        }
    }
}

/// Everything already queued for a session, without blocking.
pub async fn drain_ready(session: &mut ListingSession<MockListingStore>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) =
        tokio::time::timeout(std::time::Duration::from_millis(20), session.next_event()).await
    {
        events.push(event);
    }
    events
}
