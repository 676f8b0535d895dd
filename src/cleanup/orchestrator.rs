//! Cleanup orchestrator
//!
//! Runs the passes of a deep clean in a fixed order:
//! 1. title patterns (chosen mode)
//! 2. product patterns (chosen mode)
//! 3. classification patterns (always forced)
//! 4. supersession
//!
//! Later passes see what earlier ones declined.

use serde::Serialize;
use tracing::info;

use super::confirm::Confirm;
use super::decline::{count_matches, DeclineMode, PatternDeclineEngine, PatternOutcome};
use super::pattern::{DeclinationTally, SearchField, SearchSpec};
use super::supersession::{SupersessionReport, SupersessionResolver};
use crate::catalog::UpdateRepository;
use crate::error::Result;

/// Compiled pattern lists for every pattern pass
#[derive(Debug, Clone, Default)]
pub struct CleanupPlan {
    pub titles: Vec<SearchSpec>,
    pub products: Vec<SearchSpec>,
    pub classifications: Vec<SearchSpec>,
}

impl CleanupPlan {
    /// Every spec in pass order
    pub fn all_specs(&self) -> impl Iterator<Item = &SearchSpec> {
        self.titles
            .iter()
            .chain(self.products.iter())
            .chain(self.classifications.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Titles,
    Products,
    Classifications,
}

/// One pattern pass
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub kind: PassKind,
    pub mode: DeclineMode,
    pub outcomes: Vec<PatternOutcome>,
}

impl PassSummary {
    pub fn declined(&self) -> usize {
        self.outcomes.iter().map(|o| o.declined).sum()
    }
}

/// Everything a run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupSummary {
    pub passes: Vec<PassSummary>,
    /// One report per supersession pass that ran
    pub supersession: Vec<SupersessionReport>,
    /// Distinct records declined by this run
    pub grand_total: usize,
}

/// Dry-run count for one spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveyLine {
    pub pattern: String,
    pub field: SearchField,
    pub matched: usize,
}

pub struct Orchestrator<'a, R: ?Sized> {
    repo: &'a R,
    confirm: &'a dyn Confirm,
    verbose: bool,
}

impl<'a, R> Orchestrator<'a, R>
where
    R: UpdateRepository + ?Sized,
{
    pub fn new(repo: &'a R, confirm: &'a dyn Confirm) -> Self {
        Self {
            repo,
            confirm,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// All four passes in order
    pub async fn deep_clean(&self, plan: &CleanupPlan, mode: DeclineMode) -> Result<CleanupSummary> {
        info!(catalog = self.repo.name(), ?mode, "Starting deep clean");

        let mut tally = DeclinationTally::new();
        let mut summary = CleanupSummary::default();

        for kind in [PassKind::Titles, PassKind::Products, PassKind::Classifications] {
            let pass = self.pattern_pass(plan, kind, mode, &mut tally).await?;
            summary.passes.push(pass);
        }
        summary.supersession.push(self.supersede(&mut tally).await?);
        summary.grand_total = tally.total();

        info!(grand_total = summary.grand_total, "Deep clean finished");
        Ok(summary)
    }

    /// Run a single pattern pass as its own invocation
    pub async fn run_pass(
        &self,
        plan: &CleanupPlan,
        kind: PassKind,
        mode: DeclineMode,
    ) -> Result<CleanupSummary> {
        let mut tally = DeclinationTally::new();
        let pass = self.pattern_pass(plan, kind, mode, &mut tally).await?;

        Ok(CleanupSummary {
            passes: vec![pass],
            supersession: Vec::new(),
            grand_total: tally.total(),
        })
    }

    /// Run the resolver alone. With `until_stable` the resolver is invoked
    /// again while a pass still declines something, at most `max_passes`
    /// times.
    pub async fn supersede_only(&self, until_stable: bool, max_passes: u32) -> Result<CleanupSummary> {
        let mut tally = DeclinationTally::new();
        let mut summary = CleanupSummary::default();
        let max_passes = if until_stable { max_passes.max(1) } else { 1 };

        for pass in 1..=max_passes {
            let report = self.supersede(&mut tally).await?;
            let declined = report.declined;
            summary.supersession.push(report);

            if declined == 0 {
                break;
            }
            if pass == max_passes && until_stable {
                info!(max_passes, "Stopped before supersession settled");
            }
        }

        summary.grand_total = tally.total();
        Ok(summary)
    }

    /// Count approved matches for every spec without prompting or declining
    pub async fn survey(&self, plan: &CleanupPlan) -> Result<Vec<SurveyLine>> {
        let mut lines = Vec::new();
        for spec in plan.all_specs() {
            let count = count_matches(self.repo, spec).await?;
            lines.push(SurveyLine {
                pattern: spec.pattern().to_string(),
                field: spec.field(),
                matched: count.matched,
            });
        }
        Ok(lines)
    }

    async fn pattern_pass(
        &self,
        plan: &CleanupPlan,
        kind: PassKind,
        mode: DeclineMode,
        tally: &mut DeclinationTally,
    ) -> Result<PassSummary> {
        let (specs, mode) = match kind {
            PassKind::Titles => (&plan.titles, mode),
            PassKind::Products => (&plan.products, mode),
            // Driver removal is pre-approved by choosing a deep clean
            PassKind::Classifications => (&plan.classifications, DeclineMode::Forced),
        };

        info!(pass = ?kind, ?mode, patterns = specs.len(), "Starting pattern pass");
        let engine = PatternDeclineEngine::new(self.repo, self.confirm);
        let outcomes = engine.run(specs, mode, tally).await?;

        Ok(PassSummary {
            kind,
            mode,
            outcomes,
        })
    }

    async fn supersede(&self, tally: &mut DeclinationTally) -> Result<SupersessionReport> {
        SupersessionResolver::new(self.repo)
            .with_verbose(self.verbose)
            .resolve(tally)
            .await
    }
}
