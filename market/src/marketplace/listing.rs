use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{LISTING_ID_BYTES, MAX_LISTING_DOCUMENT_BYTES};
use crate::error::{MarketError, MarketResult};
use crate::traits::{RandomSource, TimeProvider};
use crate::util::{cbor_from_limited_reader, cbor_to_vec};

/// Stable identifier of a listing document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh hex id from the given random source.
    pub fn generate<R: RandomSource + ?Sized>(rng: &R) -> Self {
        let mut bytes = [0u8; LISTING_ID_BYTES];
        rng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of an authenticated user, as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingState {
    /// Open for reservation
    Available,
    /// Held by a buyer
    Reserved,
    /// Closed by the owner
    Sold,
}

impl fmt::Display for ListingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Available => "available",
            Self::Reserved => "reserved",
            Self::Sold => "sold",
        };
        f.write_str(name)
    }
}

/// Descriptive fields. None of these take part in the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDetails {
    pub name: String,
    /// Asking price in whole currency units
    pub price: u64,
    pub description: String,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub year_level: u8,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A marketplace listing as held by the store and delivered to viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: ListingId,

    /// Creator of the listing; never changes
    pub owner_id: UserId,

    /// Reserving actor; present exactly while the listing is not available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_id: Option<UserId>,

    pub state: ListingState,

    #[serde(flatten)]
    pub details: ListingDetails,

    /// Store-maintained version, bumped on every committed write
    pub revision: u64,

    /// Revision the writer of this version had last seen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub based_on: Option<u64>,

    pub created_at: u64,
    pub updated_at: u64,
}

impl Listing {
    /// Create a new listing builder with a custom time provider
    pub const fn builder_with_time<T: TimeProvider>(time: T) -> ListingBuilder<T> {
        ListingBuilder::new(time)
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }

    pub fn is_reserved_by(&self, user: &UserId) -> bool {
        self.state == ListingState::Reserved && self.buyer_id.as_ref() == Some(user)
    }

    /// `buyer_id` is set iff the listing is not available.
    pub fn buyer_invariant_holds(&self) -> bool {
        (self.state == ListingState::Available) == self.buyer_id.is_none()
    }

    /// Serialize the listing to CBOR bytes
    pub fn to_cbor(&self) -> MarketResult<Vec<u8>> {
        cbor_to_vec(self)
    }

    /// Deserialize a listing from CBOR bytes
    pub fn from_cbor(data: &[u8]) -> MarketResult<Self> {
        cbor_from_limited_reader(data, MAX_LISTING_DOCUMENT_BYTES)
    }

    /// Apply a field-level patch, overwriting exactly the fields it carries.
    ///
    /// `based_on` always describes the latest write, so it is replaced even
    /// when the patch leaves it unset. Does not touch `revision`; that is the
    /// store's job.
    pub fn apply_patch(&mut self, patch: &ListingPatch) {
        if let Some(state) = patch.state {
            self.state = state;
        }
        if let Some(buyer_id) = &patch.buyer_id {
            self.buyer_id.clone_from(buyer_id);
        }
        self.based_on = patch.based_on;
    }
}

/// Partial update of a listing document.
///
/// Absent fields are left untouched by the store. `buyer_id: Some(None)`
/// clears the buyer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPatch {
    pub state: Option<ListingState>,
    pub buyer_id: Option<Option<UserId>>,
    /// Revision the write was validated against, recorded on the document
    pub based_on: Option<u64>,
    /// Precondition: only apply if the stored revision still equals this
    pub expected_revision: Option<u64>,
}

/// Builder for creating new listings
pub struct ListingBuilder<T: TimeProvider> {
    time: T,
    id: Option<ListingId>,
    owner_id: Option<UserId>,
    name: Option<String>,
    price: Option<u64>,
    description: String,
    condition: Option<String>,
    subject: Option<String>,
    year_level: Option<u8>,
    kind: Option<String>,
}

impl<T: TimeProvider> ListingBuilder<T> {
    /// Create a new builder with a time provider
    pub const fn new(time: T) -> Self {
        Self {
            time,
            id: None,
            owner_id: None,
            name: None,
            price: None,
            description: String::new(),
            condition: None,
            subject: None,
            year_level: None,
            kind: None,
        }
    }

    #[must_use]
    pub fn id(mut self, id: ListingId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn owner(mut self, owner: UserId) -> Self {
        self.owner_id = Some(owner);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn price(mut self, price: u64) -> Self {
        self.price = Some(price);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub const fn year_level(mut self, year_level: u8) -> Self {
        self.year_level = Some(year_level);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Build an available listing at revision 0 (returns error if required fields are missing)
    pub fn build(self) -> MarketResult<Listing> {
        let created_at = self.time.now_unix();
        let missing = |field: &str| MarketError::Validation(format!("{field} is required"));

        let name = self.name.ok_or_else(|| missing("name"))?;
        if name.trim().is_empty() {
            return Err(MarketError::Validation("name must not be blank".into()));
        }

        Ok(Listing {
            id: self.id.ok_or_else(|| missing("id"))?,
            owner_id: self.owner_id.ok_or_else(|| missing("owner"))?,
            buyer_id: None,
            state: ListingState::Available,
            details: ListingDetails {
                name,
                price: self.price.ok_or_else(|| missing("price"))?,
                description: self.description,
                condition: self.condition.ok_or_else(|| missing("condition"))?,
                subject: self.subject,
                year_level: self.year_level.ok_or_else(|| missing("year_level"))?,
                kind: self.kind.ok_or_else(|| missing("kind"))?,
            },
            revision: 0,
            based_on: None,
            created_at,
            updated_at: created_at,
        })
    }
}
