//! Per-(user, step) draft records.
//!
//! A draft is written on every autosave and every commit, and is never
//! deleted: revisiting a step re-seeds the form from it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Result, WizardError};
use crate::row;
use crate::store::{Database, Filter, Row, Table, Write};

use super::steps::StepId;

/// Key columns of the drafts table.
const DRAFT_KEY: &[&str] = &["user_id", "step_id"];

/// A persisted draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftRecord {
    pub user_id: String,
    pub step: StepId,
    pub payload: Value,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl DraftRecord {
    fn from_row(row: &Row) -> Result<Self> {
        let step_id = row.get("step_id").and_then(Value::as_str).unwrap_or_default();
        let step = StepId::from_ordinal(step_id).ok_or_else(|| WizardError::CorruptRecord {
            step: step_id.to_string(),
            reason: "unknown step id".to_string(),
        })?;

        Ok(Self {
            user_id: row
                .get("user_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            step,
            payload: row.get("payload").cloned().unwrap_or_else(|| json!({})),
            completed: row.get("completed").and_then(Value::as_bool).unwrap_or(false),
            completed_at: row
                .get("completed_at")
                .and_then(Value::as_str)
                .map(parse_datetime),
            updated_at: row
                .get("updated_at")
                .and_then(Value::as_str)
                .map(parse_datetime)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        })
    }
}

/// Parse an RFC 3339 timestamp; unreadable values sort first.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Adapter over the persistence collaborator for draft records.
#[derive(Clone)]
pub struct DraftStore {
    db: Arc<dyn Database>,
}

impl DraftStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// The upsert that persists a draft, for inclusion in a larger batch.
    ///
    /// A completed write stamps `completed_at`; an incomplete one clears it.
    pub fn save_write(
        user_id: &str,
        step: StepId,
        payload: &Value,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Write {
        let stamp = now.to_rfc3339();
        let completed_at = completed.then(|| stamp.clone());
        Write::upsert(
            Table::OnboardingDrafts,
            DRAFT_KEY,
            row! {
                "user_id" => user_id,
                "step_id" => step.ordinal(),
                "payload" => payload,
                "completed" => completed,
                "completed_at" => completed_at,
                "updated_at" => stamp,
            },
        )
    }

    pub async fn load_draft(&self, user_id: &str, step: StepId) -> Result<Option<DraftRecord>> {
        let filter = Filter::user(user_id).eq("step_id", step.ordinal());
        let rows = self.db.get(Table::OnboardingDrafts, &filter).await?;
        rows.first().map(DraftRecord::from_row).transpose()
    }

    /// Upsert the draft for (user, step).
    pub async fn save_draft(
        &self,
        user_id: &str,
        step: StepId,
        payload: &Value,
        completed: bool,
    ) -> Result<()> {
        let write = Self::save_write(user_id, step, payload, completed, Utc::now());
        self.db.apply(&[write]).await?;
        debug!(user_id, step = %step, completed, "Draft saved");
        Ok(())
    }

    /// Every draft the user has, in step order.
    pub async fn load_all_drafts(&self, user_id: &str) -> Result<Vec<DraftRecord>> {
        let rows = self
            .db
            .get(Table::OnboardingDrafts, &Filter::user(user_id))
            .await?;
        let mut drafts = rows
            .iter()
            .map(DraftRecord::from_row)
            .collect::<Result<Vec<_>>>()?;
        drafts.sort_by_key(|d| d.step.index());
        Ok(drafts)
    }
}

/// Aggregate progress over the steps before Finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed_steps: usize,
    pub total_steps: usize,
    pub percent_complete: u8,
    /// Steps with no committed draft, in wizard order.
    pub incomplete: Vec<StepId>,
}

impl Progress {
    pub fn from_drafts(drafts: &[DraftRecord]) -> Self {
        let countable: Vec<StepId> = StepId::ALL
            .into_iter()
            .filter(|s| !s.is_terminal())
            .collect();
        let incomplete: Vec<StepId> = countable
            .iter()
            .copied()
            .filter(|step| !drafts.iter().any(|d| d.step == *step && d.completed))
            .collect();
        let completed_steps = countable.len() - incomplete.len();
        let percent_complete = (completed_steps * 100 / countable.len()) as u8;

        Self {
            completed_steps,
            total_steps: countable.len(),
            percent_complete,
            incomplete,
        }
    }
}
