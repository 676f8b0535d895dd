//! Pattern declination engine
//!
//! Counting and applying are separate operations. An interactive spec is
//! counted first, shown to the operator, and only on a yes is the catalog
//! scanned again and declined; the second scan never trusts the first.

use futures::TryStreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::confirm::{Confirm, ConfirmationRequest};
use super::pattern::{DeclinationTally, SearchField, SearchSpec};
use crate::catalog::{RepositoryError, ScopeFilter, UpdateId, UpdateRepository};
use crate::error::Result;

/// Whether declines wait for the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineMode {
    Interactive,
    Forced,
}

/// Dry-run result for one spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchCount {
    pub scanned: usize,
    pub matched: usize,
}

/// A single decline the catalog refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclineFailure {
    pub id: UpdateId,
    pub reason: String,
}

/// Result of one forced apply over a spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub matched: usize,
    pub declined: usize,
    pub rejected: Vec<DeclineFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    /// Nothing approved matched
    NoMatches,
    /// Matches were declined (some may have been refused by the catalog)
    Declined,
    /// The operator said no
    Refused,
}

/// Observable outcome of one spec within a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternOutcome {
    pub pattern: String,
    pub field: SearchField,
    pub status: PatternStatus,
    pub matched: usize,
    pub declined: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<DeclineFailure>,
}

impl PatternOutcome {
    fn no_matches(spec: &SearchSpec) -> Self {
        Self {
            pattern: spec.pattern().to_string(),
            field: spec.field(),
            status: PatternStatus::NoMatches,
            matched: 0,
            declined: 0,
            rejected: Vec::new(),
        }
    }

    fn refused(spec: &SearchSpec, matched: usize) -> Self {
        Self {
            status: PatternStatus::Refused,
            matched,
            ..Self::no_matches(spec)
        }
    }

    fn applied(spec: &SearchSpec, outcome: ApplyOutcome) -> Self {
        Self {
            pattern: spec.pattern().to_string(),
            field: spec.field(),
            status: if outcome.matched == 0 {
                PatternStatus::NoMatches
            } else {
                PatternStatus::Declined
            },
            matched: outcome.matched,
            declined: outcome.declined,
            rejected: outcome.rejected,
        }
    }
}

/// Count approved records selected by `spec`. Never declines anything.
pub async fn count_matches<R>(repo: &R, spec: &SearchSpec) -> Result<MatchCount>
where
    R: UpdateRepository + ?Sized,
{
    let mut updates = repo.list_updates(ScopeFilter::AllUpdates);
    let mut count = MatchCount {
        scanned: 0,
        matched: 0,
    };

    while let Some(record) = updates.try_next().await? {
        count.scanned += 1;
        if spec.selects(&record) {
            count.matched += 1;
        }
    }

    Ok(count)
}

/// Scan the catalog and decline every approved record selected by `spec`.
///
/// Refused declines are collected and the scan continues; an unreachable
/// catalog aborts with an error.
pub async fn apply_declines<R>(
    repo: &R,
    spec: &SearchSpec,
    tally: &mut DeclinationTally,
) -> Result<ApplyOutcome>
where
    R: UpdateRepository + ?Sized,
{
    let mut updates = repo.list_updates(ScopeFilter::AllUpdates);
    let mut outcome = ApplyOutcome::default();

    while let Some(record) = updates.try_next().await? {
        if !spec.selects(&record) {
            continue;
        }
        outcome.matched += 1;

        if tally.contains(&record.id) {
            debug!(update_id = %record.id, "Already declined in this run, skipping");
            continue;
        }

        match repo.decline(&record).await {
            Ok(()) => {
                tally.record(&record.id);
                outcome.declined += 1;
                debug!(update_id = %record.id, title = %record.title, "Declined");
            }
            Err(RepositoryError::DeclineRejected { id, reason }) => {
                warn!(update_id = %id, %reason, "Catalog refused decline");
                outcome.rejected.push(DeclineFailure { id, reason });
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(outcome)
}

/// Runs search specs through the count / confirm / apply protocol
pub struct PatternDeclineEngine<'a, R: ?Sized> {
    repo: &'a R,
    confirm: &'a dyn Confirm,
}

impl<'a, R> PatternDeclineEngine<'a, R>
where
    R: UpdateRepository + ?Sized,
{
    pub fn new(repo: &'a R, confirm: &'a dyn Confirm) -> Self {
        Self { repo, confirm }
    }

    /// Process one spec
    pub async fn run_spec(
        &self,
        spec: &SearchSpec,
        mode: DeclineMode,
        tally: &mut DeclinationTally,
    ) -> Result<PatternOutcome> {
        if mode == DeclineMode::Forced {
            let outcome = apply_declines(self.repo, spec, tally).await?;
            info!(
                pattern = spec.pattern(),
                field = %spec.field(),
                matched = outcome.matched,
                declined = outcome.declined,
                "Forced decline finished"
            );
            return Ok(PatternOutcome::applied(spec, outcome));
        }

        let count = count_matches(self.repo, spec).await?;
        info!(
            pattern = spec.pattern(),
            field = %spec.field(),
            scanned = count.scanned,
            matched = count.matched,
            "Counted approved matches"
        );

        if count.matched == 0 {
            return Ok(PatternOutcome::no_matches(spec));
        }

        let request = ConfirmationRequest {
            pattern: spec.pattern(),
            field: spec.field(),
            matched: count.matched,
        };
        if !self.confirm.confirm(&request) {
            info!(pattern = spec.pattern(), matched = count.matched, "Operator declined to proceed");
            return Ok(PatternOutcome::refused(spec, count.matched));
        }

        let outcome = apply_declines(self.repo, spec, tally).await?;
        info!(
            pattern = spec.pattern(),
            matched = outcome.matched,
            declined = outcome.declined,
            "Confirmed decline finished"
        );
        Ok(PatternOutcome::applied(spec, outcome))
    }

    /// Process specs in order, one at a time
    pub async fn run(
        &self,
        specs: &[SearchSpec],
        mode: DeclineMode,
        tally: &mut DeclinationTally,
    ) -> Result<Vec<PatternOutcome>> {
        let mut outcomes = Vec::with_capacity(specs.len());
        for spec in specs {
            outcomes.push(self.run_spec(spec, mode, tally).await?);
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryRepository, UpdateRecord};
    use crate::cleanup::confirm::ScriptedConfirm;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn catalog() -> MemoryRepository {
        MemoryRepository::new()
            .with_record(UpdateRecord::approved("xp-1", "Security Update for Windows XP"))
            .with_record(UpdateRecord::approved("xp-2", "Update for Windows XP SP3"))
            .with_record(UpdateRecord::approved("xp-3", "Windows XP hotfix").with_approved(false))
            .with_record(UpdateRecord::approved("w10", "Cumulative Update for Windows 10"))
    }

    #[tokio::test]
    async fn test_count_does_not_decline() {
        let repo = catalog();
        let spec = SearchSpec::title("windows xp").unwrap();

        let count = count_matches(&repo, &spec).await.unwrap();
        assert_eq!(count, MatchCount { scanned: 4, matched: 2 });
        assert!(repo.decline_requests().is_empty());
    }

    #[tokio::test]
    async fn test_apply_declines_matches() {
        let repo = catalog();
        let spec = SearchSpec::title("Windows XP").unwrap();
        let mut tally = DeclinationTally::new();

        let outcome = apply_declines(&repo, &spec, &mut tally).await.unwrap();
        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.declined, 2);
        assert!(repo.is_declined("xp-1"));
        assert!(repo.is_declined("xp-2"));
        assert!(!repo.is_declined("xp-3"));
        assert!(!repo.is_declined("w10"));
        assert_eq!(tally.total(), 2);
    }

    #[tokio::test]
    async fn test_forced_never_prompts() {
        let repo = catalog();
        let confirm = ScriptedConfirm::always(false);
        let engine = PatternDeclineEngine::new(&repo, &confirm);
        let mut tally = DeclinationTally::new();

        let outcome = engine
            .run_spec(&SearchSpec::title("Windows XP").unwrap(), DeclineMode::Forced, &mut tally)
            .await
            .unwrap();

        assert_eq!(outcome.status, PatternStatus::Declined);
        assert_eq!(outcome.declined, 2);
        assert_eq!(confirm.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_refusal_declines_nothing() {
        let repo = catalog();
        let confirm = ScriptedConfirm::new([false]);
        let engine = PatternDeclineEngine::new(&repo, &confirm);
        let mut tally = DeclinationTally::new();

        let outcome = engine
            .run_spec(
                &SearchSpec::title("Windows XP").unwrap(),
                DeclineMode::Interactive,
                &mut tally,
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, PatternStatus::Refused);
        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.declined, 0);
        assert!(repo.decline_requests().is_empty());
        assert_eq!(tally.total(), 0);
    }

    /// Approves another matching update while the operator is being asked
    struct ApprovesDuringPrompt<'r> {
        repo: &'r MemoryRepository,
        shown: AtomicUsize,
    }

    impl Confirm for ApprovesDuringPrompt<'_> {
        fn confirm(&self, request: &ConfirmationRequest<'_>) -> bool {
            self.shown.store(request.matched, Ordering::SeqCst);
            self.repo
                .insert(UpdateRecord::approved("xp-3", "Windows XP hotfix"));
            true
        }
    }

    #[tokio::test]
    async fn test_confirmed_apply_rescans() {
        let repo = catalog();
        let confirm = ApprovesDuringPrompt {
            repo: &repo,
            shown: AtomicUsize::new(0),
        };
        let engine = PatternDeclineEngine::new(&repo, &confirm);
        let mut tally = DeclinationTally::new();

        let outcome = engine
            .run_spec(
                &SearchSpec::title("Windows XP").unwrap(),
                DeclineMode::Interactive,
                &mut tally,
            )
            .await
            .unwrap();

        assert_eq!(confirm.shown.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.matched, 3);
        assert_eq!(outcome.declined, 3);
        assert!(repo.is_declined("xp-3"));
    }

    /// Refuses to decline one id, delegates everything else
    struct Refusing {
        inner: MemoryRepository,
        refuse: &'static str,
    }

    #[async_trait::async_trait]
    impl UpdateRepository for Refusing {
        fn name(&self) -> &str {
            "refusing"
        }

        fn list_updates(&self, scope: ScopeFilter) -> crate::catalog::UpdateStream<'_> {
            self.inner.list_updates(scope)
        }

        async fn decline(&self, record: &UpdateRecord) -> std::result::Result<(), RepositoryError> {
            if record.id.as_str() == self.refuse {
                return Err(RepositoryError::DeclineRejected {
                    id: record.id.clone(),
                    reason: "terminal state".to_string(),
                });
            }
            self.inner.decline(record).await
        }

        async fn related_updates(
            &self,
            record: &UpdateRecord,
            relation: crate::catalog::RelationKind,
        ) -> std::result::Result<Vec<UpdateRecord>, RepositoryError> {
            self.inner.related_updates(record, relation).await
        }
    }

    #[tokio::test]
    async fn test_rejected_decline_is_reported_and_pass_continues() {
        let repo = Refusing {
            inner: catalog(),
            refuse: "xp-1",
        };
        let confirm = ScriptedConfirm::default();
        let engine = PatternDeclineEngine::new(&repo, &confirm);
        let mut tally = DeclinationTally::new();

        let outcome = engine
            .run_spec(&SearchSpec::title("Windows XP").unwrap(), DeclineMode::Forced, &mut tally)
            .await
            .unwrap();

        assert_eq!(outcome.status, PatternStatus::Declined);
        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.declined, 1);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].id.as_str(), "xp-1");
        assert!(repo.inner.is_declined("xp-2"));
        assert_eq!(tally.total(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_catalog_aborts() {
        let repo = catalog();
        repo.set_available(false);
        let confirm = ScriptedConfirm::default();
        let engine = PatternDeclineEngine::new(&repo, &confirm);
        let mut tally = DeclinationTally::new();

        let result = engine
            .run_spec(
                &SearchSpec::title("Windows XP").unwrap(),
                DeclineMode::Interactive,
                &mut tally,
            )
            .await;

        assert!(matches!(
            result,
            Err(crate::error::CleanupError::Repository(RepositoryError::Unavailable(_)))
        ));
        assert_eq!(confirm.prompt_count(), 0);
    }
}
