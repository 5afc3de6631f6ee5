/// Domain-specific error types for the marketplace library.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store operation failed: {0}")]
    Store(String),

    #[error("Actor identity unresolved")]
    Unresolved,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse error category handed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Unauthorized,
    InvalidTransition,
    NotFound,
    StoreFailure,
    Unresolved,
    Unavailable,
    Conflict,
}

impl MarketError {
    /// Map this error onto the category the presentation layer renders.
    pub const fn kind(&self) -> RejectionKind {
        match self {
            Self::Unauthorized(_) => RejectionKind::Unauthorized,
            Self::InvalidTransition(_) => RejectionKind::InvalidTransition,
            Self::NotFound(_) => RejectionKind::NotFound,
            Self::Unresolved => RejectionKind::Unresolved,
            Self::Unavailable(_) => RejectionKind::Unavailable,
            Self::Conflict(_) => RejectionKind::Conflict,
            Self::Store(_)
            | Self::Serialization(_)
            | Self::Validation(_)
            | Self::Config(_)
            | Self::Other(_) => RejectionKind::StoreFailure,
        }
    }

    /// Whether the error is a lifecycle rejection (no store write was issued).
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::InvalidTransition(_))
    }
}

/// Convenience type alias.
pub type MarketResult<T> = Result<T, MarketError>;
