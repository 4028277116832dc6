//! Navigation controller — the wizard's entry point for the presentation layer.
//!
//! Navigation state is an explicit [`WizardCursor`] passed in and handed back
//! inside every [`Transition`]; the navigator itself holds no per-user state
//! besides the autosave timers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::WizardConfig;
use crate::error::Result;
use crate::row;
use crate::store::{Database, Filter, LibSqlBackend, Table, Write};

use super::autosave::{AutosaveScheduler, DraftKey};
use super::calendar::{Calendar, UtcCalendar};
use super::drafts::{DraftStore, Progress};
use super::payload::StepDraft;
use super::pipeline::{MaterializeContext, materialize};
use super::readiness::{Readiness, ReadinessGate, Unmet};
use super::steps::{StepDefinition, StepId, TOTAL_STEPS, remaining_minutes};

/// Where a user is in the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardCursor {
    pub user_id: String,
    pub step: StepId,
}

impl WizardCursor {
    pub fn new(user_id: &str, step: StepId) -> Self {
        Self {
            user_id: user_id.to_string(),
            step,
        }
    }

    pub fn index(&self) -> usize {
        self.step.index()
    }

    fn key(&self) -> DraftKey {
        DraftKey::new(&self.user_id, self.step)
    }

    fn moved_to(&self, step: StepId) -> Self {
        Self::new(&self.user_id, step)
    }
}

/// Everything needed to render a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub cursor: WizardCursor,
    pub definition: &'static StepDefinition,
    /// The saved draft, or `{}` for a step never visited.
    pub payload: Value,
    pub completed: bool,
    pub readiness: Readiness,
    pub remaining_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Finish just succeeded.
    Finished,
    /// Onboarding was already complete on entry.
    AlreadyComplete,
}

/// Result of a navigation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// Render this step.
    Show(StepView),
    /// Stay on the cursor's step; `unmet` says why.
    Rejected {
        cursor: WizardCursor,
        unmet: Vec<Unmet>,
        /// Set when Finish is rejected.
        progress: Option<Progress>,
    },
    /// Leave the wizard for the main application.
    Exit { reason: ExitReason },
}

impl Transition {
    /// The cursor after this transition, if the user is still in the wizard.
    pub fn cursor(&self) -> Option<&WizardCursor> {
        match self {
            Self::Show(view) => Some(&view.cursor),
            Self::Rejected { cursor, .. } => Some(cursor),
            Self::Exit { .. } => None,
        }
    }
}

pub struct Navigator {
    db: Arc<dyn Database>,
    drafts: DraftStore,
    gate: ReadinessGate,
    autosave: AutosaveScheduler,
    calendar: Arc<dyn Calendar>,
}

impl Navigator {
    pub fn new(db: Arc<dyn Database>, config: &WizardConfig) -> Self {
        let drafts = DraftStore::new(db.clone());
        Self {
            gate: ReadinessGate::new(db.clone(), drafts.clone()),
            autosave: AutosaveScheduler::new(drafts.clone(), config.autosave_debounce),
            drafts,
            db,
            calendar: Arc::new(UtcCalendar),
        }
    }

    /// Open the configured database file and build a navigator over it.
    pub async fn open(config: &WizardConfig) -> Result<Self> {
        let db = LibSqlBackend::new_local(&config.database_path).await?;
        Ok(Self::new(Arc::new(db), config))
    }

    /// Replace the calendar used for the year compass and row timestamps.
    pub fn with_calendar(mut self, calendar: Arc<dyn Calendar>) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    pub fn autosave(&self) -> &AutosaveScheduler {
        &self.autosave
    }

    /// Whether the user's settings carry the onboarding-completed flag.
    pub async fn is_complete(&self, user_id: &str) -> Result<bool> {
        let rows = self
            .db
            .get(Table::UserSettings, &Filter::user(user_id))
            .await?;
        Ok(rows.first().is_some_and(|row| {
            row.get("onboarding_completed")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        }))
    }

    /// Enter the wizard at `requested`. Out-of-range indices land on the
    /// first step; a finished user is sent out of the wizard.
    pub async fn enter_step(&self, user_id: &str, requested: i64) -> Result<Transition> {
        if self.is_complete(user_id).await? {
            debug!(user_id, "Onboarding already complete, leaving wizard");
            return Ok(Transition::Exit {
                reason: ExitReason::AlreadyComplete,
            });
        }

        let step = usize::try_from(requested)
            .ok()
            .filter(|i| *i < TOTAL_STEPS)
            .and_then(StepId::from_index)
            .unwrap_or_else(|| {
                debug!(user_id, requested, "Step out of range, starting at the beginning");
                StepId::Baseline
            });
        self.show(WizardCursor::new(user_id, step)).await
    }

    /// Record a live edit: schedule an autosave and report readiness.
    pub async fn update_draft(&self, cursor: &WizardCursor, payload: Value) -> Result<Readiness> {
        let readiness = self
            .gate
            .evaluate(&cursor.user_id, cursor.step, &payload)
            .await?;
        self.autosave.schedule(cursor.key(), payload).await;
        Ok(readiness)
    }

    /// Next: gate, materialize, mark completed, advance.
    ///
    /// The step's domain writes and its completed draft land in one
    /// transaction. On the last step this runs [`Navigator::finish`].
    pub async fn commit_next(&self, cursor: &WizardCursor, payload: &Value) -> Result<Transition> {
        if cursor.step.is_terminal() {
            return self.finish(cursor).await;
        }

        let readiness = self
            .gate
            .evaluate(&cursor.user_id, cursor.step, payload)
            .await?;
        if let Readiness::Blocked { unmet } = readiness {
            debug!(user_id = %cursor.user_id, step = %cursor.step, unmet = unmet.len(), "Next rejected");
            return Ok(Transition::Rejected {
                cursor: cursor.clone(),
                unmet,
                progress: None,
            });
        }

        let draft = StepDraft::parse(cursor.step, payload)?;
        {
            let _guard = self.autosave.begin_commit(&cursor.key()).await;
            let now = self.calendar.now();
            let year = self.calendar.current_year(&cursor.user_id);
            let ctx =
                MaterializeContext::load(self.db.as_ref(), &cursor.user_id, cursor.step, year, now)
                    .await?;

            let mut writes = materialize(&draft, &ctx);
            let rows = writes.len();
            writes.push(DraftStore::save_write(
                &cursor.user_id,
                cursor.step,
                payload,
                true,
                now,
            ));
            self.db.apply(&writes).await?;
            info!(user_id = %cursor.user_id, step = %cursor.step, rows, "Step committed");
        }

        self.advance(cursor).await
    }

    /// Skip: save the draft as not completed and advance, materializing nothing.
    pub async fn commit_skip(&self, cursor: &WizardCursor, payload: &Value) -> Result<Transition> {
        if !cursor.step.definition().skippable {
            return Ok(Transition::Rejected {
                cursor: cursor.clone(),
                unmet: vec![Unmet::NotSkippable { step: cursor.step }],
                progress: None,
            });
        }

        {
            let _guard = self.autosave.begin_commit(&cursor.key()).await;
            self.drafts
                .save_draft(&cursor.user_id, cursor.step, payload, false)
                .await?;
        }
        info!(user_id = %cursor.user_id, step = %cursor.step, "Step skipped");

        self.advance(cursor).await
    }

    /// Previous: one step back, floored at the first step. Writes nothing.
    pub async fn go_previous(&self, cursor: &WizardCursor) -> Result<Transition> {
        let step = cursor.step.previous().unwrap_or(StepId::Baseline);
        self.show(cursor.moved_to(step)).await
    }

    /// Finish: requires at least one goal in domain data, then marks
    /// onboarding complete.
    pub async fn finish(&self, cursor: &WizardCursor) -> Result<Transition> {
        if !cursor.step.is_terminal() {
            return Ok(Transition::Rejected {
                cursor: cursor.clone(),
                unmet: vec![Unmet::FinishUnavailable],
                progress: None,
            });
        }

        let readiness = self
            .gate
            .evaluate(&cursor.user_id, StepId::Finish, &Value::Null)
            .await?;
        if let Readiness::Blocked { unmet } = readiness {
            let progress = self.progress(&cursor.user_id).await?;
            info!(
                user_id = %cursor.user_id,
                percent = progress.percent_complete,
                "Finish rejected"
            );
            return Ok(Transition::Rejected {
                cursor: cursor.clone(),
                unmet,
                progress: Some(progress),
            });
        }

        let _guard = self.autosave.begin_commit(&cursor.key()).await;
        let now = self.calendar.now();
        let stamp = now.to_rfc3339();
        self.db
            .apply(&[
                Write::upsert(
                    Table::UserSettings,
                    &["user_id"],
                    row! {
                        "user_id" => cursor.user_id,
                        "onboarding_completed" => true,
                        "onboarding_completed_at" => stamp,
                        "updated_at" => stamp,
                    },
                ),
                DraftStore::save_write(&cursor.user_id, StepId::Finish, &json!({}), true, now),
            ])
            .await?;

        info!(user_id = %cursor.user_id, "Onboarding finished");
        Ok(Transition::Exit {
            reason: ExitReason::Finished,
        })
    }

    /// Share of steps before Finish that have been committed.
    pub async fn progress(&self, user_id: &str) -> Result<Progress> {
        let drafts = self.drafts.load_all_drafts(user_id).await?;
        Ok(Progress::from_drafts(&drafts))
    }

    async fn advance(&self, cursor: &WizardCursor) -> Result<Transition> {
        let next = cursor.step.next().unwrap_or(StepId::Finish);
        self.show(cursor.moved_to(next)).await
    }

    async fn show(&self, cursor: WizardCursor) -> Result<Transition> {
        let record = self.drafts.load_draft(&cursor.user_id, cursor.step).await?;
        let (payload, completed) = match record {
            Some(record) => (record.payload, record.completed),
            None => (json!({}), false),
        };
        let readiness = self
            .gate
            .evaluate(&cursor.user_id, cursor.step, &payload)
            .await?;

        Ok(Transition::Show(StepView {
            definition: cursor.step.definition(),
            remaining_minutes: remaining_minutes(cursor.step),
            cursor,
            payload,
            completed,
            readiness,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn test_navigator() -> Navigator {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let config = WizardConfig {
            autosave_debounce: Duration::from_millis(30),
            ..WizardConfig::default()
        };
        Navigator::new(db, &config)
    }

    fn shown(transition: Transition) -> StepView {
        match transition {
            Transition::Show(view) => view,
            other => panic!("expected a step, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn enter_fresh_step_has_empty_payload() {
        let nav = test_navigator().await;
        let view = shown(nav.enter_step("u1", 2).await.unwrap());
        assert_eq!(view.cursor.step, StepId::Values);
        assert_eq!(view.payload, json!({}));
        assert!(!view.completed);
        assert!(!view.readiness.is_ready());
        assert_eq!(view.definition.id, StepId::Values);
    }

    #[tokio::test]
    async fn open_uses_configured_database_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = WizardConfig {
            database_path: tmp.path().join("nested").join("wizard.db"),
            ..WizardConfig::default()
        };
        let nav = Navigator::open(&config).await.unwrap();
        shown(nav.enter_step("u1", 0).await.unwrap());
        assert!(config.database_path.exists());
    }

    #[tokio::test]
    async fn out_of_range_entry_lands_on_first_step() {
        let nav = test_navigator().await;
        for requested in [-1, 15, i64::MAX] {
            let view = shown(nav.enter_step("u1", requested).await.unwrap());
            assert_eq!(view.cursor.index(), 0, "requested {requested}");
        }
    }

    #[tokio::test]
    async fn previous_floors_at_first_step() {
        let nav = test_navigator().await;
        let cursor = WizardCursor::new("u1", StepId::Baseline);
        let view = shown(nav.go_previous(&cursor).await.unwrap());
        assert_eq!(view.cursor.step, StepId::Baseline);

        let cursor = WizardCursor::new("u1", StepId::Goals);
        let view = shown(nav.go_previous(&cursor).await.unwrap());
        assert_eq!(view.cursor.step, StepId::Vision);
    }

    #[tokio::test]
    async fn non_skippable_step_rejects_skip() {
        let nav = test_navigator().await;
        let cursor = WizardCursor::new("u1", StepId::Values);
        let transition = nav.commit_skip(&cursor, &json!({})).await.unwrap();
        assert_eq!(
            transition,
            Transition::Rejected {
                cursor,
                unmet: vec![Unmet::NotSkippable {
                    step: StepId::Values
                }],
                progress: None,
            }
        );
        assert!(nav.drafts().load_draft("u1", StepId::Values).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finish_only_from_last_step() {
        let nav = test_navigator().await;
        let cursor = WizardCursor::new("u1", StepId::Goals);
        let transition = nav.finish(&cursor).await.unwrap();
        assert!(matches!(
            transition,
            Transition::Rejected { ref unmet, .. } if unmet == &[Unmet::FinishUnavailable]
        ));
    }

    #[tokio::test]
    async fn update_draft_reports_readiness_and_autosaves() {
        let nav = test_navigator().await;
        let cursor = WizardCursor::new("u1", StepId::Schedule);
        let readiness = nav
            .update_draft(&cursor, json!({"timezone": "Europe/Berlin"}))
            .await
            .unwrap();
        assert!(readiness.is_ready());

        tokio::time::sleep(Duration::from_millis(250)).await;
        let record = nav
            .drafts()
            .load_draft("u1", StepId::Schedule)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.payload, json!({"timezone": "Europe/Berlin"}));
        assert!(!record.completed);
    }

    #[tokio::test]
    async fn next_on_last_step_runs_finish() {
        let nav = test_navigator().await;
        let cursor = WizardCursor::new("u1", StepId::Finish);
        let transition = nav.commit_next(&cursor, &json!({})).await.unwrap();
        match transition {
            Transition::Rejected { unmet, progress, .. } => {
                assert_eq!(unmet, vec![Unmet::NoMaterializedGoals]);
                assert_eq!(progress.unwrap().completed_steps, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
