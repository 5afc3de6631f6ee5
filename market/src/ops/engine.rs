//! Store-backed lifecycle engine.

use std::future::Future;

use tracing::{debug, info};

use crate::config::{ConsistencyMode, MarketConfig};
use crate::error::{MarketError, MarketResult};
use crate::marketplace::{
    apply_action, Actor, ExpectedOutcome, Expectation, Listing, ListingAction, Transition,
};
use crate::traits::ListingStore;

/// An action the engine validated and wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub action: ListingAction,
    pub transition: Transition,
    pub expectation: Expectation,
}

/// Validates lifecycle actions and issues the matching store mutation.
///
/// Exactly one store write per accepted action, none on rejection.
#[derive(Clone)]
pub struct LifecycleEngine<S: ListingStore> {
    store: S,
    config: MarketConfig,
}

impl<S: ListingStore> LifecycleEngine<S> {
    pub const fn new(store: S, config: MarketConfig) -> Self {
        Self { store, config }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Validate `action` against `snapshot` and, if legal, write it.
    ///
    /// In last-write-wins mode the write is unconditional: the snapshot may
    /// already be stale, and the caller learns about a lost race from the
    /// next delivered snapshot. In guarded mode the write is conditional on
    /// `snapshot.revision` and a lost race surfaces as `Conflict`.
    pub async fn execute(
        &self,
        snapshot: &Listing,
        actor: &Actor,
        action: ListingAction,
    ) -> MarketResult<Accepted> {
        let transition = apply_action(snapshot, actor, action).inspect_err(|e| {
            debug!(listing = %snapshot.id, %action, "lifecycle rejected: {e}");
        })?;

        let expected_revision = match self.config.consistency {
            ConsistencyMode::LastWriteWins => None,
            ConsistencyMode::Guarded => Some(snapshot.revision),
        };

        let committed_revision = match transition.to_patch(snapshot.revision, expected_revision) {
            Some(patch) => {
                let revision = self
                    .bounded("update", self.store.update(&snapshot.id, patch))
                    .await?;
                Some(revision)
            }
            None => {
                self.bounded("delete", self.store.delete(&snapshot.id))
                    .await?;
                None
            }
        };

        info!(
            listing = %snapshot.id,
            %action,
            base_revision = snapshot.revision,
            ?committed_revision,
            "lifecycle action written"
        );

        let expectation = Expectation {
            listing_id: snapshot.id.clone(),
            action,
            outcome: ExpectedOutcome::from(&transition),
            base_revision: snapshot.revision,
            committed_revision,
        };

        Ok(Accepted {
            action,
            transition,
            expectation,
        })
    }

    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = MarketResult<T>>,
    ) -> MarketResult<T> {
        let limit = self.config.mutation_timeout;
        tokio::time::timeout(limit, fut).await.map_err(|_| {
            MarketError::Unavailable(format!("store {what} timed out after {limit:?}"))
        })?
    }
}
