//! Materialization pipeline — turns a committed draft into domain writes.
//!
//! `materialize` is pure: it reads the draft and a [`MaterializeContext`]
//! and returns the writes to apply. The navigator applies them, together with
//! the draft's completed flag, in one transaction, so a step either lands
//! whole or not at all.
//!
//! Steps 7-11 resolve goal titles against goals already in domain data, never
//! against earlier drafts. Committing them before the Goals step attaches
//! nothing to any goal.

mod context;
mod foundation;
mod planning;

pub use context::{GoalRef, MaterializeContext, ValueRef, natural_key};

use serde::Serialize;
use serde_json::Value;

use crate::store::{Row, Table, Write};

use super::payload::StepDraft;
use super::steps::StepId;

/// Lead indicators kept per goal, counting ones already stored.
pub const MAX_INDICATORS_PER_GOAL: usize = 3;

/// Values that keep their rank; later ones are stored unranked.
pub const RANKED_VALUES: usize = 5;

/// How a step's rows merge with what is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Delete the user's rows, then insert the drafted set.
    ReplaceAll,
    /// Insert rows whose natural key is not yet present.
    Append,
    /// Insert or merge one row by key.
    Upsert,
    /// Delete rows that point at records the step no longer keeps.
    Prune,
}

/// Tables each step writes, with the strategy it uses for each.
pub fn targets(step: StepId) -> &'static [(Table, MergeStrategy)] {
    use MergeStrategy::*;

    match step {
        StepId::Baseline => &[(Table::UserBaseline, Upsert), (Table::UserSettings, Upsert)],
        StepId::Capture => &[(Table::InboxItems, Append), (Table::UserSettings, Upsert)],
        StepId::Values => &[(Table::UserValues, ReplaceAll), (Table::GoalValues, Prune)],
        StepId::Identity => &[(Table::IdentityStatements, ReplaceAll)],
        StepId::YearTheme => &[(Table::YearCompass, Upsert), (Table::UserSettings, Upsert)],
        StepId::LifeDomains => &[(Table::LifeDomains, ReplaceAll)],
        StepId::Vision => &[(Table::YearCompass, Upsert), (Table::UserSettings, Upsert)],
        StepId::Goals => &[(Table::Goals, Append), (Table::GoalValues, Append)],
        StepId::LeadIndicators => &[(Table::LeadIndicators, Append)],
        StepId::Projects => &[(Table::Projects, Append), (Table::Tasks, Append)],
        StepId::Obstacles => &[
            (Table::UserSettings, Upsert),
            (Table::Woops, Append),
            (Table::IfThenPlans, Append),
        ],
        StepId::Habits => &[(Table::Habits, Append)],
        StepId::Schedule | StepId::Dashboard => &[(Table::UserSettings, Upsert)],
        StepId::Finish => &[],
    }
}

/// The writes that commit `draft`.
pub fn materialize(draft: &StepDraft, ctx: &MaterializeContext) -> Vec<Write> {
    match draft {
        StepDraft::Baseline(d) => foundation::baseline(d, ctx),
        StepDraft::Capture(d) => foundation::capture(d, ctx),
        StepDraft::Values(d) => foundation::values(d, ctx),
        StepDraft::Identity(d) => foundation::identity(d, ctx),
        StepDraft::YearTheme(d) => foundation::year_theme(d, ctx),
        StepDraft::LifeDomains(d) => foundation::life_domains(d, ctx),
        StepDraft::Vision(d) => foundation::vision(d, ctx),
        StepDraft::Goals(d) => planning::goals(d, ctx),
        StepDraft::LeadIndicators(d) => planning::lead_indicators(d, ctx),
        StepDraft::Projects(d) => planning::projects(d, ctx),
        StepDraft::Obstacles(d) => planning::obstacles(d, ctx),
        StepDraft::Habits(d) => planning::habits(d, ctx),
        StepDraft::Schedule(d) => planning::schedule(d, ctx),
        StepDraft::Dashboard(d) => planning::dashboard(d, ctx),
        StepDraft::Finish => Vec::new(),
    }
}

/// Set `column` only when a value is present.
fn put<T: Serialize>(fields: &mut Row, column: &str, value: Option<T>) {
    if let Some(value) = value.and_then(|v| serde_json::to_value(v).ok()) {
        fields.insert(column.to_string(), value);
    }
}

/// Merge `fields` into the user's settings row. Nothing to merge, no write.
fn settings(ctx: &MaterializeContext, mut fields: Row) -> Option<Write> {
    if fields.is_empty() {
        return None;
    }
    fields.insert("user_id".into(), Value::from(ctx.user_id.as_str()));
    fields.insert("updated_at".into(), Value::from(ctx.timestamp()));
    Some(Write::upsert(Table::UserSettings, &["user_id"], fields))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    #[test]
    fn every_write_targets_a_declared_table() {
        let ctx = MaterializeContext::new("u1", 2026, Utc::now());
        let payloads = [
            (StepId::Baseline, json!({"overwhelm_level": 8, "motivation_level": 5})),
            (StepId::Capture, json!({"brain_dump": "a\nb", "capture_style": "daily"})),
            (StepId::Values, json!({"values": ["Health", "Growth", "Family"]})),
            (StepId::Identity, json!({"statements": ["I run", "I write", "I rest"]})),
            (StepId::YearTheme, json!({"theme": "Momentum", "definition_of_win": "Consistency"})),
            (StepId::LifeDomains, json!({"domains": ["Health", "Career", "Family"]})),
            (StepId::Vision, json!({"letter": "Dear me", "mantra": "Keep going"})),
            (StepId::Goals, json!({"goals": [{"title": "Run a marathon"}]})),
            (StepId::Obstacles, json!({"common_derailers": ["Phone"], "woops": [{"wish": "Run"}]})),
            (StepId::Habits, json!({"habits": [{"name": "Stretch"}]})),
            (StepId::Schedule, json!({"timezone": "Europe/Berlin"})),
            (StepId::Dashboard, json!({"theme": "dark"})),
        ];

        for (step, payload) in payloads {
            let draft = StepDraft::parse(step, &payload).unwrap();
            let writes = materialize(&draft, &ctx);
            assert!(!writes.is_empty(), "{step} produced no writes");
            for write in &writes {
                assert!(
                    targets(step).iter().any(|(table, _)| *table == write.table()),
                    "{step} wrote undeclared table {}",
                    write.table()
                );
            }
        }
    }

    #[test]
    fn finish_materializes_nothing() {
        let ctx = MaterializeContext::new("u1", 2026, Utc::now());
        assert!(materialize(&StepDraft::Finish, &ctx).is_empty());
        assert!(targets(StepId::Finish).is_empty());
    }

    #[test]
    fn empty_settings_produce_no_write() {
        let ctx = MaterializeContext::new("u1", 2026, Utc::now());
        assert!(settings(&ctx, Row::new()).is_none());
    }
}
