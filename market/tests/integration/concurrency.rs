//! Uncoordinated writers racing on one listing.

use market::{
    ConsistencyMode, ListingAction, ListingState, ListingView, MarketConfig, MarketError,
    SessionEvent, UserId,
};
use tokio::task::JoinSet;

use crate::common::{drain_ready, next_listing_event, MultiViewerHarness};

#[tokio::test]
async fn test_reserve_race_reports_conflict_to_loser() {
    let harness = MultiViewerHarness::new(3);
    harness.sign_in_all();
    let listing = harness.create_listing(0, "Netball dress").await;

    let mut first = harness.open(1, &listing).await;
    let mut second = harness.open(2, &listing).await;

    // Both guards run against the same available snapshot and both pass.
    first.dispatch(ListingAction::Reserve).await.unwrap();
    second.dispatch(ListingAction::Reserve).await.unwrap();

    let stored = harness.stored(&listing).await;
    assert_eq!(stored.buyer_id, Some(UserId::new("U2")));
    assert_eq!(stored.revision, 2);

    let events = drain_ready(&mut first).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], SessionEvent::Snapshot(stored.clone()));
    assert_eq!(
        events[1],
        SessionEvent::Conflict {
            action: ListingAction::Reserve,
            observed_state: Some(ListingState::Reserved),
            observed_buyer: Some(UserId::new("U2")),
        }
    );
    assert_eq!(first.view(), ListingView::ReservedByOther);

    let events = drain_ready(&mut second).await;
    assert_eq!(events, vec![SessionEvent::Snapshot(stored)]);
    assert_eq!(second.view(), ListingView::ReservedByMe);
}

#[tokio::test]
async fn test_loser_told_after_seeing_own_reservation() {
    let harness = MultiViewerHarness::new(3);
    harness.sign_in_all();
    let listing = harness.create_listing(0, "Cricket whites").await;

    let mut first = harness.open(1, &listing).await;
    let mut second = harness.open(2, &listing).await;

    first.dispatch(ListingAction::Reserve).await.unwrap();
    // First sees its own write land before anyone else acts.
    let Some(SessionEvent::Snapshot(echo)) = next_listing_event(&mut first).await else {
        panic!("expected the reservation echo");
    };
    assert_eq!(echo.buyer_id, Some(UserId::new("U1")));
    assert_eq!(first.view(), ListingView::ReservedByMe);

    // Second still shows the listing as available.
    second.dispatch(ListingAction::Reserve).await.unwrap();
    let stored = harness.stored(&listing).await;

    let events = drain_ready(&mut first).await;
    assert_eq!(
        events,
        vec![
            SessionEvent::Snapshot(stored),
            SessionEvent::Conflict {
                action: ListingAction::Reserve,
                observed_state: Some(ListingState::Reserved),
                observed_buyer: Some(UserId::new("U2")),
            },
        ]
    );
    assert_eq!(first.view(), ListingView::ReservedByOther);
}

#[tokio::test]
async fn test_sale_after_reservation_is_not_a_conflict() {
    let harness = MultiViewerHarness::new(2);
    harness.sign_in_all();
    let listing = harness.create_listing(0, "Drawing board").await;

    let mut owner = harness.open(0, &listing).await;
    let mut buyer = harness.open(1, &listing).await;

    buyer.dispatch(ListingAction::Reserve).await.unwrap();
    // The owner acts only after the reservation reaches them.
    next_listing_event(&mut owner).await.unwrap();
    assert_eq!(owner.view(), ListingView::Owned { sold: false });
    owner.dispatch(ListingAction::MarkSold).await.unwrap();

    let stored = harness.stored(&listing).await;
    assert_eq!(stored.state, ListingState::Sold);
    assert_eq!(stored.buyer_id, Some(UserId::new("U1")));

    // The echo and the sale arrive together; neither is a lost write.
    let events = drain_ready(&mut buyer).await;
    assert_eq!(events, vec![SessionEvent::Snapshot(stored)]);
    assert_eq!(buyer.view(), ListingView::Sold);
}

#[tokio::test]
async fn test_cancel_then_stale_overwrite_reports_both_writes() {
    let harness = MultiViewerHarness::new(3);
    harness.sign_in_all();
    let listing = harness.create_listing(0, "Swimming goggles").await;

    let mut buyer = harness.open(1, &listing).await;
    let mut latecomer = harness.open(2, &listing).await;

    buyer.dispatch(ListingAction::Reserve).await.unwrap();
    next_listing_event(&mut buyer).await.unwrap();
    buyer.dispatch(ListingAction::Cancel).await.unwrap();
    latecomer.dispatch(ListingAction::Reserve).await.unwrap();

    let conflicts: Vec<_> = drain_ready(&mut buyer)
        .await
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Conflict { action, .. } => Some(action),
            _ => None,
        })
        .collect();
    assert_eq!(conflicts, vec![ListingAction::Reserve, ListingAction::Cancel]);
    assert_eq!(buyer.view(), ListingView::ReservedByOther);
}

#[tokio::test]
async fn test_guarded_reserve_race_rejects_second_writer() {
    let config = MarketConfig::default().with_consistency(ConsistencyMode::Guarded);
    let harness = MultiViewerHarness::with_config(3, config);
    harness.sign_in_all();
    let listing = harness.create_listing(0, "Netball dress").await;

    let mut first = harness.open(1, &listing).await;
    let mut second = harness.open(2, &listing).await;

    first.dispatch(ListingAction::Reserve).await.unwrap();
    let err = second.dispatch(ListingAction::Reserve).await.unwrap_err();

    assert!(matches!(err, MarketError::Conflict(_)));
    assert_eq!(harness.admin().write_count(), 1);

    // The loser catches up and sees the winner's reservation.
    next_listing_event(&mut second).await.unwrap();
    assert_eq!(second.view(), ListingView::ReservedByOther);
    assert!(drain_ready(&mut second).await.is_empty());
}

#[tokio::test]
async fn test_stale_reserve_can_overwrite_sale() {
    let harness = MultiViewerHarness::new(2);
    harness.sign_in_all();
    let listing = harness.create_listing(0, "Bike helmet").await;

    let mut owner = harness.open(0, &listing).await;
    let mut buyer = harness.open(1, &listing).await;

    owner.dispatch(ListingAction::MarkSold).await.unwrap();
    // Buyer still shows available and the write goes through.
    buyer.dispatch(ListingAction::Reserve).await.unwrap();

    let stored = harness.stored(&listing).await;
    assert_eq!(stored.state, ListingState::Reserved);
    assert!(stored.buyer_invariant_holds());

    let events = drain_ready(&mut owner).await;
    assert!(events.contains(&SessionEvent::Conflict {
        action: ListingAction::MarkSold,
        observed_state: Some(ListingState::Reserved),
        observed_buyer: Some(UserId::new("U1")),
    }));
    assert_eq!(owner.view(), ListingView::Owned { sold: false });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_buyers_one_winner_last_write_wins() {
    let harness = MultiViewerHarness::new(6);
    harness.sign_in_all();
    let listing = harness.create_listing(0, "Formal shoes").await;

    // Everyone loads the available listing before anyone acts.
    let mut opened = Vec::new();
    for i in 1..harness.num_viewers() {
        opened.push(harness.open(i, &listing).await);
    }

    let mut tasks = JoinSet::new();
    for mut session in opened {
        tasks.spawn(async move {
            let result = session.dispatch(ListingAction::Reserve).await;
            (session, result)
        });
    }

    let mut sessions = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (session, result) = joined.unwrap();
        assert!(result.is_ok(), "every stale guard passes");
        sessions.push(session);
    }
    assert_eq!(harness.admin().write_count(), 5);

    let winner = harness.stored(&listing).await.buyer_id.unwrap();
    let mut conflicts = 0;
    for session in &mut sessions {
        let events = drain_ready(session).await;
        if events
            .iter()
            .any(|e| matches!(e, SessionEvent::Conflict { .. }))
        {
            conflicts += 1;
            assert_eq!(session.view(), ListingView::ReservedByOther);
        } else {
            assert_eq!(session.actor().resolved().and_then(|a| a.uid()), Some(&winner));
            assert_eq!(session.view(), ListingView::ReservedByMe);
        }
    }
    assert_eq!(conflicts, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_buyers_one_winner_guarded() {
    let config = MarketConfig::default().with_consistency(ConsistencyMode::Guarded);
    let harness = MultiViewerHarness::with_config(6, config);
    harness.sign_in_all();
    let listing = harness.create_listing(0, "Formal shoes").await;

    // Everyone loads the available listing before anyone acts.
    let mut opened = Vec::new();
    for i in 1..harness.num_viewers() {
        opened.push(harness.open(i, &listing).await);
    }

    let mut tasks = JoinSet::new();
    for mut session in opened {
        tasks.spawn(async move { session.dispatch(ListingAction::Reserve).await });
    }

    let mut accepted = 0;
    let mut conflicts = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => accepted += 1,
            Err(MarketError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(conflicts, 4);
    assert_eq!(harness.admin().write_count(), 1);
    assert_eq!(harness.stored(&listing).await.revision, 1);
}
