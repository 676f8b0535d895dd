//! Supersession resolver
//!
//! Declines an approved update once some approved update supersedes it.
//! One hop per pass: if A is superseded only by an unapproved B, A stays
//! even when B is itself superseded by an approved C. Callers that want
//! the closure run passes until one declines nothing.

use futures::TryStreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::decline::DeclineFailure;
use super::pattern::DeclinationTally;
use crate::catalog::{RelationKind, RepositoryError, ScopeFilter, UpdateRepository};
use crate::error::Result;

/// Outcome of one resolver pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupersessionReport {
    /// Approved candidates inspected
    pub examined: usize,
    pub declined: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<DeclineFailure>,
}

pub struct SupersessionResolver<'a, R: ?Sized> {
    repo: &'a R,
    verbose: bool,
}

impl<'a, R> SupersessionResolver<'a, R>
where
    R: UpdateRepository + ?Sized,
{
    pub fn new(repo: &'a R) -> Self {
        Self {
            repo,
            verbose: false,
        }
    }

    /// Log every decline at info instead of debug
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run a single pass over the approved records
    pub async fn resolve(&self, tally: &mut DeclinationTally) -> Result<SupersessionReport> {
        let mut candidates = self.repo.list_updates(ScopeFilter::LatestRevisionApproved);
        let mut report = SupersessionReport::default();

        while let Some(candidate) = candidates.try_next().await? {
            if !candidate.is_effectively_approved() || tally.contains(&candidate.id) {
                continue;
            }
            report.examined += 1;

            // A failed lookup is not the same as "nothing supersedes this"
            let superseders = self
                .repo
                .related_updates(&candidate, RelationKind::SupersedesThis)
                .await?;

            let Some(superseder) = superseders.iter().find(|s| s.is_effectively_approved()) else {
                continue;
            };

            match self.repo.decline(&candidate).await {
                Ok(()) => {
                    tally.record(&candidate.id);
                    report.declined += 1;
                    if self.verbose {
                        info!(
                            update_id = %candidate.id,
                            title = %candidate.title,
                            superseded_by = %superseder.id,
                            "Declined superseded update"
                        );
                    } else {
                        debug!(
                            update_id = %candidate.id,
                            superseded_by = %superseder.id,
                            "Declined superseded update"
                        );
                    }
                }
                Err(RepositoryError::DeclineRejected { id, reason }) => {
                    warn!(update_id = %id, %reason, "Catalog refused decline");
                    report.rejected.push(DeclineFailure { id, reason });
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            examined = report.examined,
            declined = report.declined,
            rejected = report.rejected.len(),
            "Supersession pass finished"
        );

        Ok(report)
    }
}
