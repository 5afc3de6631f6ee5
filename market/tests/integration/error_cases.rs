//! Error and failure case integration tests.

use std::time::Duration;

use market::mocks::MockStoreFailure;
use market::{
    ListingAction, ListingId, ListingSession, ListingState, ListingView, MarketConfig,
    MarketError, RejectionKind, SessionEvent,
};

use crate::common::{drain_ready, next_listing_event, MultiViewerHarness};

#[tokio::test]
async fn test_unresolved_identity_suppresses_dispatch() {
    let harness = MultiViewerHarness::new(2);
    let listing = harness.create_listing(0, "Lab coat").await;

    let mut session = harness.open(1, &listing).await;
    assert_eq!(session.view(), ListingView::Loading);
    assert!(session.view().permitted_intents().is_empty());

    let err = session.dispatch(ListingAction::Reserve).await.unwrap_err();
    assert_eq!(err.kind(), RejectionKind::Unresolved);
    assert_eq!(harness.admin().write_count(), 0);

    harness.viewer(1).identity.sign_in("U1");
    session.next_event().await.unwrap();
    session.dispatch(ListingAction::Reserve).await.unwrap();
    assert_eq!(harness.admin().write_count(), 1);
}

#[tokio::test]
async fn test_cancel_twice_is_invalid() {
    let harness = MultiViewerHarness::new(2);
    harness.sign_in_all();
    let listing = harness.create_listing(0, "Protractor set").await;
    let mut buyer = harness.open(1, &listing).await;

    buyer.dispatch(ListingAction::Reserve).await.unwrap();
    next_listing_event(&mut buyer).await.unwrap();
    buyer.dispatch(ListingAction::Cancel).await.unwrap();
    next_listing_event(&mut buyer).await.unwrap();

    let err = buyer.dispatch(ListingAction::Cancel).await.unwrap_err();
    assert!(matches!(err, MarketError::InvalidTransition(_)));
    assert_eq!(harness.stored(&listing).await.revision, 2);
}

#[tokio::test]
async fn test_owner_actions_rejected_for_others() {
    let harness = MultiViewerHarness::new(2);
    harness.sign_in_all();
    let listing = harness.create_listing(0, "Tennis racquet").await;
    let mut other = harness.open(1, &listing).await;

    for action in [
        ListingAction::MarkSold,
        ListingAction::MarkAvailable,
        ListingAction::Delete,
    ] {
        let err = other.dispatch(action).await.unwrap_err();
        assert!(
            matches!(err, MarketError::Unauthorized(_)),
            "{action} should be unauthorized, got {err}"
        );
    }
    assert_eq!(harness.stored(&listing).await, listing);
}

#[tokio::test]
async fn test_store_outage_for_one_viewer() {
    let harness = MultiViewerHarness::new(3);
    harness.sign_in_all();
    let listing = harness.create_listing(0, "Calculator").await;

    let mut offline = harness.open(1, &listing).await;
    let mut online = harness.open(2, &listing).await;
    harness
        .viewer(1)
        .store
        .set_fail_mode(Some(MockStoreFailure::Writes))
        .await;

    let err = offline.dispatch(ListingAction::Reserve).await.unwrap_err();
    assert_eq!(err.kind(), RejectionKind::StoreFailure);
    // No optimistic local change.
    assert_eq!(offline.view(), ListingView::Available);

    online.dispatch(ListingAction::Reserve).await.unwrap();
    next_listing_event(&mut offline).await.unwrap();
    assert_eq!(offline.view(), ListingView::ReservedByOther);
}

#[tokio::test]
async fn test_broken_subscription_goes_stale() {
    let harness = MultiViewerHarness::new(2);
    harness.sign_in_all();
    let listing = harness.create_listing(0, "Sports bag").await;

    let mut owner = harness.open(0, &listing).await;
    let mut buyer = harness.open(1, &listing).await;

    harness.viewer(1).store.break_subscriptions("network down").await;
    assert_eq!(buyer.next_event().await, Some(SessionEvent::Stale));
    assert!(buyer.is_stale());

    owner.dispatch(ListingAction::MarkSold).await.unwrap();
    next_listing_event(&mut owner).await.unwrap();

    // The stale viewer keeps its last copy and hears nothing more.
    assert!(drain_ready(&mut buyer).await.is_empty());
    assert_eq!(buyer.view(), ListingView::Available);
    assert_eq!(harness.stored(&listing).await.state, ListingState::Sold);
}

#[tokio::test]
async fn test_open_missing_listing() {
    let harness = MultiViewerHarness::new(1);
    let viewer = harness.viewer(0);

    let result = ListingSession::open(
        viewer.store.clone(),
        &viewer.identity,
        &ListingId::new("0000000000"),
        MarketConfig::default(),
    )
    .await;
    assert!(matches!(result, Err(MarketError::NotFound(_))));
}

#[tokio::test]
async fn test_open_with_reads_down() {
    let harness = MultiViewerHarness::new(1);
    let listing = harness.create_listing(0, "Ruler").await;
    let viewer = harness.viewer(0);
    viewer
        .store
        .set_fail_mode(Some(MockStoreFailure::OnListing(listing.id.clone())))
        .await;

    let result = ListingSession::open(
        viewer.store.clone(),
        &viewer.identity,
        &listing.id,
        MarketConfig::default(),
    )
    .await;
    assert!(matches!(result, Err(MarketError::Store(_))));
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_write_times_out() {
    let config = MarketConfig::default().with_mutation_timeout(Duration::from_secs(2));
    let harness = MultiViewerHarness::with_config(2, config);
    harness.sign_in_all();
    let listing = harness.create_listing(0, "Drum sticks").await;

    let mut buyer = harness.open(1, &listing).await;
    harness
        .viewer(1)
        .store
        .set_write_delay(Some(Duration::from_secs(60)))
        .await;

    let err = buyer.dispatch(ListingAction::Reserve).await.unwrap_err();
    assert_eq!(err.kind(), RejectionKind::Unavailable);
    assert_eq!(harness.admin().write_count(), 0);
}
