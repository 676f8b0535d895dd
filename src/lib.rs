//! catalog-sweep: cleanup engine for update-distribution catalogs
//!
//! Declines approved updates that are obsolete, either because they match an
//! operator-curated pattern (by title, product or classification) or because
//! an approved update already supersedes them.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │            Orchestrator              │
//! │ titles → products → drivers → supers │
//! └───────────┬──────────────┬───────────┘
//!             ▼              ▼
//!   ┌──────────────────┐ ┌─────────────────────┐
//!   │ PatternDecline   │ │ SupersessionResolver│
//!   │ Engine + Confirm │ │ (single hop)        │
//!   └────────┬─────────┘ └──────────┬──────────┘
//!            └──────────┬───────────┘
//!                       ▼
//!             ┌───────────────────┐
//!             │ UpdateRepository  │
//!             │ (HTTP / memory)   │
//!             └───────────────────┘
//! ```

pub mod catalog;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod error;

pub use catalog::{
    HttpRepository, MemoryRepository, RelationKind, RepositoryError, ScopeFilter, UpdateId,
    UpdateRecord, UpdateRepository,
};
pub use cleanup::{
    CleanupPlan, CleanupSummary, DeclineMode, Orchestrator, SearchField, SearchSpec,
};
pub use config::Config;
pub use error::CleanupError;
