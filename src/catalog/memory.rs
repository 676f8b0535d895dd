//! In-memory catalog
//!
//! An arena of records plus an adjacency map of supersession edges. Decline
//! is not idempotent: declining twice is refused with
//! `DeclineRejected`, which is what stricter catalogs do.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::*;

#[derive(Default)]
struct CatalogState {
    records: Vec<UpdateRecord>,
    index: HashMap<UpdateId, usize>,
    /// record id -> ids of the records that supersede it
    superseded_by: HashMap<UpdateId, Vec<UpdateId>>,
    decline_requests: Vec<UpdateId>,
}

impl CatalogState {
    fn get(&self, id: &UpdateId) -> Option<&UpdateRecord> {
        self.index.get(id).map(|&slot| &self.records[slot])
    }
}

/// In-memory update catalog
pub struct MemoryRepository {
    name: String,
    state: Mutex<CatalogState>,
    available: AtomicBool,
    failing_lookups: Mutex<HashSet<UpdateId>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            state: Mutex::new(CatalogState::default()),
            available: AtomicBool::new(true),
            failing_lookups: Mutex::new(HashSet::new()),
        }
    }

    /// Builder form of `insert`
    pub fn with_record(self, record: UpdateRecord) -> Self {
        self.insert(record);
        self
    }

    /// Builder form of `supersede`
    pub fn with_supersession(self, newer: &str, older: &str) -> Self {
        self.supersede(UpdateId::new(newer), UpdateId::new(older));
        self
    }

    /// Insert or replace a record
    pub fn insert(&self, record: UpdateRecord) {
        let mut state = self.state();
        match state.index.get(&record.id).copied() {
            Some(slot) => state.records[slot] = record,
            None => {
                let slot = state.records.len();
                state.index.insert(record.id.clone(), slot);
                state.records.push(record);
            }
        }
    }

    /// Record that `newer` supersedes `older`
    pub fn supersede(&self, newer: UpdateId, older: UpdateId) {
        let mut state = self.state();
        let edges = state.superseded_by.entry(older).or_default();
        if !edges.contains(&newer) {
            edges.push(newer);
        }
    }

    /// Simulate the catalog going away (or coming back)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make relation lookups for `id` fail with `Unavailable`
    pub fn fail_lookups_for(&self, id: &str) {
        self.lookups().insert(UpdateId::new(id));
    }

    /// Current copy of a record
    pub fn record(&self, id: &str) -> Option<UpdateRecord> {
        self.state().get(&UpdateId::new(id)).cloned()
    }

    pub fn is_declined(&self, id: &str) -> bool {
        self.record(id).map(|r| r.is_declined).unwrap_or(false)
    }

    /// Every decline request received, accepted or not, in arrival order
    pub fn decline_requests(&self) -> Vec<UpdateId> {
        self.state().decline_requests.clone()
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lookups(&self) -> MutexGuard<'_, HashSet<UpdateId>> {
        self.failing_lookups
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::Unavailable(
                "memory catalog disabled".to_string(),
            ))
        }
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpdateRepository for MemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_updates(&self, scope: ScopeFilter) -> UpdateStream<'_> {
        if let Err(e) = self.check_available() {
            return stream::once(async move { Err(e) }).boxed();
        }

        let snapshot: Vec<UpdateRecord> = self
            .state()
            .records
            .iter()
            .filter(|r| scope.includes(r))
            .cloned()
            .collect();

        stream::iter(snapshot.into_iter().map(Ok)).boxed()
    }

    async fn decline(&self, record: &UpdateRecord) -> Result<(), RepositoryError> {
        self.check_available()?;

        let mut state = self.state();
        state.decline_requests.push(record.id.clone());

        let slot = match state.index.get(&record.id) {
            Some(&slot) => slot,
            None => {
                return Err(RepositoryError::DeclineRejected {
                    id: record.id.clone(),
                    reason: "unknown update".to_string(),
                })
            }
        };

        let stored = &mut state.records[slot];
        if stored.is_declined {
            return Err(RepositoryError::DeclineRejected {
                id: record.id.clone(),
                reason: "already declined".to_string(),
            });
        }

        stored.is_declined = true;
        stored.is_approved = false;
        Ok(())
    }

    async fn related_updates(
        &self,
        record: &UpdateRecord,
        relation: RelationKind,
    ) -> Result<Vec<UpdateRecord>, RepositoryError> {
        self.check_available()?;
        if self.lookups().contains(&record.id) {
            return Err(RepositoryError::Unavailable(format!(
                "relation lookup for {} failed",
                record.id
            )));
        }

        let state = self.state();
        let related: Vec<UpdateRecord> = match relation {
            RelationKind::SupersedesThis => state
                .superseded_by
                .get(&record.id)
                .map(|ids| ids.iter().filter_map(|id| state.get(id)).cloned().collect())
                .unwrap_or_default(),
            RelationKind::SupersededByThis => state
                .superseded_by
                .iter()
                .filter(|(_, newer)| newer.contains(&record.id))
                .filter_map(|(older, _)| state.get(older))
                .cloned()
                .collect(),
        };

        Ok(related)
    }
}
