//! Update catalog cleanup engine
//!
//! - `pattern` - search specs and the per-run tally
//! - `decline` - count / confirm / apply over search specs
//! - `supersession` - single-hop supersession resolver
//! - `orchestrator` - sequences the passes of a deep clean
//! - `confirm` - operator confirmation channel

pub mod confirm;
pub mod decline;
pub mod orchestrator;
pub mod pattern;
pub mod supersession;

pub use confirm::{AssumeYes, Confirm, ConfirmationRequest, ConsolePrompt, ScriptedConfirm};
pub use decline::{
    apply_declines, count_matches, ApplyOutcome, DeclineFailure, DeclineMode, MatchCount,
    PatternDeclineEngine, PatternOutcome, PatternStatus,
};
pub use orchestrator::{
    CleanupPlan, CleanupSummary, Orchestrator, PassKind, PassSummary, SurveyLine,
};
pub use pattern::{DeclinationTally, SearchField, SearchSpec};
pub use supersession::{SupersessionReport, SupersessionResolver};
