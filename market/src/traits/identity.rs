//! Identity provider abstraction.

use tokio::sync::watch;

use crate::marketplace::ActorState;

/// Supplies the current actor as a latest-value stream.
///
/// The value starts as [`ActorState::Loading`] and resolves asynchronously;
/// it may change again at any time (login, logout), independent of which
/// listing is being viewed.
pub trait IdentityProvider: Send + Sync + Clone + 'static {
    /// Subscribe to the current actor.
    fn current_actor(&self) -> watch::Receiver<ActorState>;
}
