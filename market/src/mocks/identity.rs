//! Controllable identity provider for testing.

use std::sync::Arc;

use tokio::sync::watch;

use crate::marketplace::{Actor, ActorState, UserId};
use crate::traits::IdentityProvider;

/// Identity provider a test can sign in and out at will.
///
/// Starts in [`ActorState::Loading`] unless built with one of the resolved
/// constructors. Clones drive the same identity.
#[derive(Debug, Clone)]
pub struct MockIdentity {
    tx: Arc<watch::Sender<ActorState>>,
}

impl MockIdentity {
    pub fn new() -> Self {
        Self::with_state(ActorState::Loading)
    }

    pub fn signed_in(uid: &str) -> Self {
        Self::with_state(Actor::user(uid).into())
    }

    pub fn anonymous() -> Self {
        Self::with_state(Actor::Anonymous.into())
    }

    fn with_state(state: ActorState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx: Arc::new(tx) }
    }

    pub fn sign_in(&self, uid: &str) {
        self.set(ActorState::Resolved(Actor::User(UserId::new(uid))));
    }

    pub fn sign_out(&self) {
        self.set(ActorState::Resolved(Actor::Anonymous));
    }

    pub fn set(&self, state: ActorState) {
        self.tx.send_replace(state);
    }

    pub fn current(&self) -> ActorState {
        self.tx.borrow().clone()
    }
}

impl Default for MockIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for MockIdentity {
    fn current_actor(&self) -> watch::Receiver<ActorState> {
        self.tx.subscribe()
    }
}
