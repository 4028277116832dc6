//! Onboarding wizard: fifteen ordered steps from baseline to finish.
//!
//! Each step keeps a draft that autosaves while the user types. Next checks
//! the step's readiness rule, fans the draft out into domain tables and marks
//! it completed, all in one transaction. Skip saves the draft and moves on
//! without touching domain data. Finish needs at least one goal and then
//! flags onboarding complete in the user's settings.

pub mod autosave;
pub mod calendar;
pub mod drafts;
pub mod navigator;
pub mod payload;
pub mod pipeline;
pub mod readiness;
pub mod steps;

pub use autosave::{AutosaveScheduler, CommitGuard, DraftKey};
pub use calendar::{Calendar, UtcCalendar};
pub use drafts::{DraftRecord, DraftStore, Progress};
pub use navigator::{ExitReason, Navigator, StepView, Transition, WizardCursor};
pub use payload::StepDraft;
pub use pipeline::{MergeStrategy, materialize, targets};
pub use readiness::{Readiness, ReadinessGate, Unmet};
pub use steps::{StepDefinition, StepId, TOTAL_STEPS, step_at, total_steps};
