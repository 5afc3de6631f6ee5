use serde::{Deserialize, Serialize};

use super::listing::UserId;

/// Who is attempting an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "uid", rename_all = "lowercase")]
pub enum Actor {
    Anonymous,
    User(UserId),
}

impl Actor {
    pub fn user(uid: impl Into<String>) -> Self {
        Self::User(UserId::new(uid))
    }

    pub const fn uid(&self) -> Option<&UserId> {
        match self {
            Self::Anonymous => None,
            Self::User(uid) => Some(uid),
        }
    }

    /// True when the actor is the given user.
    pub fn is(&self, user: &UserId) -> bool {
        self.uid() == Some(user)
    }
}

/// Actor as currently known to a viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "actor", rename_all = "lowercase")]
pub enum ActorState {
    /// Identity provider has not answered yet
    #[default]
    Loading,
    Resolved(Actor),
}

impl ActorState {
    pub const fn resolved(&self) -> Option<&Actor> {
        match self {
            Self::Loading => None,
            Self::Resolved(actor) => Some(actor),
        }
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

impl From<Actor> for ActorState {
    fn from(actor: Actor) -> Self {
        Self::Resolved(actor)
    }
}
