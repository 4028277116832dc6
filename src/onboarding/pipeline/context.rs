//! Read-side inputs for materialization: already-materialized goals and
//! values, plus the natural keys of rows the step would otherwise duplicate.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::store::{Database, Filter, Row, Table};

use super::super::payload::name_key;
use super::super::steps::StepId;

/// A goal row, as steps 8-11 see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalRef {
    pub id: String,
    pub title: String,
}

/// A stored value, as the Values and Goals steps see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRef {
    pub id: String,
    pub name: String,
}

/// Everything `materialize` needs besides the draft itself.
#[derive(Debug, Clone)]
pub struct MaterializeContext {
    pub user_id: String,
    pub year: i32,
    pub now: DateTime<Utc>,
    pub goals: Vec<GoalRef>,
    pub values: Vec<ValueRef>,
    /// Natural keys already present in the step's append targets.
    pub existing: HashSet<String>,
    /// Existing child rows per goal id (lead indicators).
    pub per_goal: HashMap<String, usize>,
}

impl MaterializeContext {
    /// A context with no materialized data.
    pub fn new(user_id: &str, year: i32, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            year,
            now,
            goals: Vec::new(),
            values: Vec::new(),
            existing: HashSet::new(),
            per_goal: HashMap::new(),
        }
    }

    /// Load only what `step` reads.
    pub async fn load(
        db: &dyn Database,
        user_id: &str,
        step: StepId,
        year: i32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let mut ctx = Self::new(user_id, year, now);
        let user = Filter::user(user_id);

        if matches!(
            step,
            StepId::Goals
                | StepId::LeadIndicators
                | StepId::Projects
                | StepId::Obstacles
                | StepId::Habits
        ) {
            ctx.goals = db
                .get(Table::Goals, &user)
                .await?
                .iter()
                .map(|row| GoalRef {
                    id: text(row, "id"),
                    title: text(row, "title"),
                })
                .collect();
        }

        if matches!(step, StepId::Values | StepId::Goals) {
            ctx.values = db
                .get(Table::UserValues, &user)
                .await?
                .iter()
                .map(|row| ValueRef {
                    id: text(row, "id"),
                    name: text(row, "name"),
                })
                .collect();
        }

        match step {
            StepId::Capture => {
                let rows = db.get(Table::InboxItems, &user).await?;
                ctx.existing = rows
                    .iter()
                    .map(|r| natural_key(&[text(r, "content").as_str()]))
                    .collect();
            }
            StepId::Goals => {
                ctx.existing = ctx
                    .goals
                    .iter()
                    .map(|g| natural_key(&[g.title.as_str()]))
                    .collect();
            }
            StepId::LeadIndicators => {
                for row in db.get(Table::LeadIndicators, &user).await? {
                    let goal_id = text(&row, "goal_id");
                    let name = text(&row, "name");
                    ctx.existing
                        .insert(natural_key(&[goal_id.as_str(), name.as_str()]));
                    *ctx.per_goal.entry(goal_id).or_default() += 1;
                }
            }
            StepId::Projects => {
                let rows = db.get(Table::Projects, &user).await?;
                ctx.existing = rows
                    .iter()
                    .map(|r| {
                        natural_key(&[text(r, "goal_id").as_str(), text(r, "title").as_str()])
                    })
                    .collect();
            }
            StepId::Obstacles => {
                for row in db.get(Table::Woops, &user).await? {
                    ctx.existing.insert(natural_key(&[
                        "woop",
                        text(&row, "goal_id").as_str(),
                        text(&row, "wish").as_str(),
                    ]));
                }
                for row in db.get(Table::IfThenPlans, &user).await? {
                    ctx.existing.insert(natural_key(&[
                        "if_then",
                        text(&row, "cue").as_str(),
                        text(&row, "response").as_str(),
                    ]));
                }
            }
            StepId::Habits => {
                let rows = db.get(Table::Habits, &user).await?;
                ctx.existing = rows
                    .iter()
                    .map(|r| natural_key(&[text(r, "name").as_str()]))
                    .collect();
            }
            _ => {}
        }

        Ok(ctx)
    }

    /// Materialized goal whose title matches, ignoring case and spacing.
    pub fn goal_by_title(&self, title: &str) -> Option<&GoalRef> {
        let key = name_key(title);
        self.goals.iter().find(|g| name_key(&g.title) == key)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&ValueRef> {
        let key = name_key(name);
        self.values.iter().find(|v| name_key(&v.name) == key)
    }

    /// Timestamp stamped on every row this commit writes.
    pub fn timestamp(&self) -> String {
        self.now.to_rfc3339()
    }

    /// Number of children the goal already has.
    pub fn children_of(&self, goal_id: &str) -> usize {
        self.per_goal.get(goal_id).copied().unwrap_or(0)
    }
}

/// Join normalized parts into a single comparable key.
pub fn natural_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| name_key(p))
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

fn text(row: &Row, column: &str) -> String {
    row.get(column)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
