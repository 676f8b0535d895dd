//! Update catalog client
//!
//! The catalog is the system of record for update metadata and for the
//! approve/decline lifecycle. This module only describes how we talk to it:
//! - `UpdateRepository` - the trait the cleanup engine is written against
//! - `HttpRepository` - adapter over the catalog's JSON admin API
//! - `MemoryRepository` - in-memory catalog for tests and dry experiments

pub mod http;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use http::HttpRepository;
pub use memory::MemoryRepository;

/// Opaque catalog identifier of an update
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateId(pub String);

impl UpdateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transient copy of a catalog update record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecord {
    pub id: UpdateId,
    pub title: String,
    #[serde(default)]
    pub product_titles: Vec<String>,
    /// Classification title, e.g. "Drivers" or "Security Updates"
    #[serde(default)]
    pub classification: String,
    /// Approval state of the latest revision
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub is_declined: bool,
}

impl UpdateRecord {
    /// Create an approved record with no products or classification
    pub fn approved(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: UpdateId::new(id),
            title: title.into(),
            product_titles: Vec::new(),
            classification: String::new(),
            is_approved: true,
            is_declined: false,
        }
    }

    pub fn with_products<I, S>(mut self, products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.product_titles = products.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = classification.into();
        self
    }

    pub fn with_approved(mut self, approved: bool) -> Self {
        self.is_approved = approved;
        self
    }

    pub fn with_declined(mut self, declined: bool) -> Self {
        self.is_declined = declined;
        self
    }

    /// Approved and not declined; the only state the engine acts on or
    /// trusts as a superseder
    pub fn is_effectively_approved(&self) -> bool {
        self.is_approved && !self.is_declined
    }
}

/// Coarse, repository-side predicate bounding an enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeFilter {
    /// Every record in the catalog
    AllUpdates,
    /// Records whose latest revision is approved
    LatestRevisionApproved,
}

impl ScopeFilter {
    pub fn includes(&self, record: &UpdateRecord) -> bool {
        match self {
            ScopeFilter::AllUpdates => true,
            ScopeFilter::LatestRevisionApproved => record.is_effectively_approved(),
        }
    }

    pub(crate) fn as_query(&self) -> &'static str {
        match self {
            ScopeFilter::AllUpdates => "all",
            ScopeFilter::LatestRevisionApproved => "approved",
        }
    }
}

/// Relationship between two update records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    /// Records that supersede the given record
    SupersedesThis,
    /// Records the given record supersedes
    SupersededByThis,
}

impl RelationKind {
    pub(crate) fn as_query(&self) -> &'static str {
        match self {
            RelationKind::SupersedesThis => "supersedes-this",
            RelationKind::SupersededByThis => "superseded-by-this",
        }
    }
}

/// Catalog errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// The catalog could not be reached or answered garbage
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    /// The catalog refused to decline a single record
    #[error("Decline of {id} rejected: {reason}")]
    DeclineRejected { id: UpdateId, reason: String },
}

impl RepositoryError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RepositoryError::DeclineRejected { .. })
    }
}

/// Lazy, single-pass stream of records
pub type UpdateStream<'a> = BoxStream<'a, Result<UpdateRecord, RepositoryError>>;

/// Access to the remote update catalog.
///
/// Implementations must stream `list_updates` when the transport allows it;
/// catalogs with tens of thousands of records are normal. Nothing here
/// retries; that belongs to the transport.
#[async_trait]
pub trait UpdateRepository: Send + Sync {
    /// Human-readable name of the catalog endpoint, for logs
    fn name(&self) -> &str;

    /// Enumerate records in `scope`
    fn list_updates(&self, scope: ScopeFilter) -> UpdateStream<'_>;

    /// Ask the catalog to decline `record`. Not reversible from here.
    async fn decline(&self, record: &UpdateRecord) -> Result<(), RepositoryError>;

    /// Records related to `record` by `relation`
    async fn related_updates(
        &self,
        record: &UpdateRecord,
        relation: RelationKind,
    ) -> Result<Vec<UpdateRecord>, RepositoryError>;
}
