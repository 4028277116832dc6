//! The minimum content a step needs before it can be left.
//!
//! Rules are pure over a parsed draft plus a small set of facts loaded from
//! the store ([`GateFacts`]). A failing rule is a value, never an error.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::store::{Database, Filter, Table};

use super::drafts::DraftStore;
use super::payload::{GoalsDraft, StepDraft, clean};
use super::steps::StepId;

const MIN_VALUES: usize = 3;
const MIN_IDENTITY_STATEMENTS: usize = 3;
const MIN_LIFE_DOMAINS: usize = 3;

/// One unmet prerequisite, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Unmet {
    #[error("baseline: overwhelm and motivation levels are required")]
    MissingLevels,

    #[error("values: need at least 3")]
    TooFewValues { found: usize },

    #[error("identity: need at least 3 statements")]
    TooFewIdentityStatements { found: usize },

    #[error("year theme: a theme is required")]
    MissingTheme,

    #[error("life domains: need at least 3")]
    TooFewLifeDomains { found: usize },

    #[error("goals: need at least one goal with a title")]
    NoGoals,

    #[error("lead indicators: \"{goal}\" needs at least one indicator")]
    MissingIndicators { goal: String },

    #[error("projects: \"{goal}\" needs a project with a next action")]
    MissingNextAction { goal: String },

    #[error("schedule: timezone is required")]
    MissingTimezone,

    #[error("at least one goal required")]
    NoMaterializedGoals,

    #[error("{step} cannot be skipped")]
    NotSkippable { step: StepId },

    #[error("finish is only available from the last step")]
    FinishUnavailable,

    #[error("{step}: {reason}")]
    MalformedDraft { step: StepId, reason: String },
}

/// Outcome of a readiness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Blocked { unmet: Vec<Unmet> },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Unmet prerequisites; empty when ready.
    pub fn unmet(&self) -> &[Unmet] {
        match self {
            Self::Ready => &[],
            Self::Blocked { unmet } => unmet,
        }
    }

    fn from_unmet(unmet: Vec<Unmet>) -> Self {
        if unmet.is_empty() {
            Self::Ready
        } else {
            Self::Blocked { unmet }
        }
    }
}

/// Store-derived inputs some rules need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateFacts {
    /// Titles from the Goals step draft, used by steps 8 and 9.
    pub drafted_goal_titles: Vec<String>,
    /// Goal rows in domain data, used by Finish.
    pub materialized_goals: i64,
}

/// Evaluate the rule for a parsed draft.
pub fn check(draft: &StepDraft, facts: &GateFacts) -> Readiness {
    let mut unmet = Vec::new();

    match draft {
        StepDraft::Baseline(d) => {
            if d.overwhelm_level.is_none() || d.motivation_level.is_none() {
                unmet.push(Unmet::MissingLevels);
            }
        }
        StepDraft::Values(d) => {
            let found = d.distinct().len();
            if found < MIN_VALUES {
                unmet.push(Unmet::TooFewValues { found });
            }
        }
        StepDraft::Identity(d) => {
            let found = d.non_empty().len();
            if found < MIN_IDENTITY_STATEMENTS {
                unmet.push(Unmet::TooFewIdentityStatements { found });
            }
        }
        StepDraft::YearTheme(d) => {
            if clean(&d.theme).is_none() {
                unmet.push(Unmet::MissingTheme);
            }
        }
        StepDraft::LifeDomains(d) => {
            let found = d.distinct().len();
            if found < MIN_LIFE_DOMAINS {
                unmet.push(Unmet::TooFewLifeDomains { found });
            }
        }
        StepDraft::Goals(d) => {
            if d.titled().is_empty() {
                unmet.push(Unmet::NoGoals);
            }
        }
        StepDraft::LeadIndicators(d) => {
            unmet.extend(
                facts
                    .drafted_goal_titles
                    .iter()
                    .filter(|title| d.for_goal(title).is_empty())
                    .map(|title| Unmet::MissingIndicators {
                        goal: title.clone(),
                    }),
            );
        }
        StepDraft::Projects(d) => {
            unmet.extend(
                facts
                    .drafted_goal_titles
                    .iter()
                    .filter(|title| d.actionable_for(title).is_empty())
                    .map(|title| Unmet::MissingNextAction {
                        goal: title.clone(),
                    }),
            );
        }
        StepDraft::Schedule(d) => {
            if clean(&d.timezone).is_none() {
                unmet.push(Unmet::MissingTimezone);
            }
        }
        StepDraft::Finish => {
            if facts.materialized_goals < 1 {
                unmet.push(Unmet::NoMaterializedGoals);
            }
        }
        StepDraft::Capture(_)
        | StepDraft::Vision(_)
        | StepDraft::Obstacles(_)
        | StepDraft::Habits(_)
        | StepDraft::Dashboard(_) => {}
    }

    Readiness::from_unmet(unmet)
}

/// Loads the facts a step's rule needs and evaluates it.
#[derive(Clone)]
pub struct ReadinessGate {
    db: Arc<dyn Database>,
    drafts: DraftStore,
}

impl ReadinessGate {
    pub fn new(db: Arc<dyn Database>, drafts: DraftStore) -> Self {
        Self { db, drafts }
    }

    /// Evaluate the rule for `step` against a raw payload.
    ///
    /// A payload that does not fit the step's shape is reported as unmet.
    pub async fn evaluate(&self, user_id: &str, step: StepId, payload: &Value) -> Result<Readiness> {
        let draft = match StepDraft::parse(step, payload) {
            Ok(draft) => draft,
            Err(e) => {
                return Ok(Readiness::Blocked {
                    unmet: vec![Unmet::MalformedDraft {
                        step,
                        reason: e.to_string(),
                    }],
                });
            }
        };
        let facts = self.facts_for(user_id, step).await?;
        Ok(check(&draft, &facts))
    }

    async fn facts_for(&self, user_id: &str, step: StepId) -> Result<GateFacts> {
        let mut facts = GateFacts::default();
        match step {
            StepId::LeadIndicators | StepId::Projects => {
                facts.drafted_goal_titles = self.drafted_goal_titles(user_id).await?;
            }
            StepId::Finish => {
                facts.materialized_goals =
                    self.db.count(Table::Goals, &Filter::user(user_id)).await?;
            }
            _ => {}
        }
        Ok(facts)
    }

    /// Titles from the Goals draft. An unreadable Goals draft counts as none.
    async fn drafted_goal_titles(&self, user_id: &str) -> Result<Vec<String>> {
        let Some(record) = self.drafts.load_draft(user_id, StepId::Goals).await? else {
            return Ok(Vec::new());
        };
        let goals: GoalsDraft = serde_json::from_value(record.payload).unwrap_or_default();
        Ok(goals
            .titled()
            .into_iter()
            .filter_map(|g| clean(&g.title).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::LibSqlBackend;

    fn parse(step: StepId, payload: Value) -> StepDraft {
        StepDraft::parse(step, &payload).unwrap()
    }

    #[test]
    fn baseline_needs_both_levels() {
        let facts = GateFacts::default();
        let partial = parse(StepId::Baseline, json!({"overwhelm_level": 6}));
        assert_eq!(check(&partial, &facts).unmet(), &[Unmet::MissingLevels]);

        let full = parse(
            StepId::Baseline,
            json!({"overwhelm_level": 6, "motivation_level": 8}),
        );
        assert!(check(&full, &facts).is_ready());
    }

    #[test]
    fn two_values_are_not_enough() {
        let draft = parse(StepId::Values, json!({"values": ["Health", "Growth"]}));
        let readiness = check(&draft, &GateFacts::default());
        assert_eq!(readiness.unmet(), &[Unmet::TooFewValues { found: 2 }]);
        assert_eq!(readiness.unmet()[0].to_string(), "values: need at least 3");
    }

    #[test]
    fn duplicate_values_count_once() {
        let draft = parse(
            StepId::Values,
            json!({"values": ["Health", "health", "Growth", " "]}),
        );
        assert!(!check(&draft, &GateFacts::default()).is_ready());
    }

    #[test]
    fn always_ready_steps() {
        for step in [
            StepId::Capture,
            StepId::Vision,
            StepId::Obstacles,
            StepId::Habits,
            StepId::Dashboard,
        ] {
            let draft = parse(step, json!({}));
            assert!(check(&draft, &GateFacts::default()).is_ready(), "{step}");
        }
    }

    #[test]
    fn goals_need_a_title() {
        let blank = parse(StepId::Goals, json!({"goals": [{"title": "  "}]}));
        assert_eq!(check(&blank, &GateFacts::default()).unmet(), &[Unmet::NoGoals]);

        let titled = parse(StepId::Goals, json!({"goals": [{"title": "Run a marathon"}]}));
        assert!(check(&titled, &GateFacts::default()).is_ready());
    }

    #[test]
    fn indicators_required_for_every_drafted_goal() {
        let facts = GateFacts {
            drafted_goal_titles: vec!["Run a marathon".into(), "Write a book".into()],
            materialized_goals: 0,
        };
        let draft = parse(
            StepId::LeadIndicators,
            json!({"goals": [{"goal_title": "run a marathon", "indicators": [{"name": "Weekly km"}]}]}),
        );
        assert_eq!(
            check(&draft, &facts).unmet(),
            &[Unmet::MissingIndicators {
                goal: "Write a book".into()
            }]
        );
    }

    #[test]
    fn indicators_and_projects_vacuous_without_goals() {
        let facts = GateFacts::default();
        assert!(check(&parse(StepId::LeadIndicators, json!({})), &facts).is_ready());
        assert!(check(&parse(StepId::Projects, json!({})), &facts).is_ready());
    }

    #[test]
    fn projects_need_a_next_action() {
        let facts = GateFacts {
            drafted_goal_titles: vec!["Run a marathon".into()],
            materialized_goals: 0,
        };
        let blank = parse(
            StepId::Projects,
            json!({"projects": [{"goal_title": "Run a marathon", "title": "Training", "next_action": ""}]}),
        );
        assert!(!check(&blank, &facts).is_ready());

        let ok = parse(
            StepId::Projects,
            json!({"projects": [{"goal_title": "Run a marathon", "next_action": "Buy running shoes"}]}),
        );
        assert!(check(&ok, &facts).is_ready());
    }

    #[test]
    fn finish_needs_materialized_goal() {
        let readiness = check(&StepDraft::Finish, &GateFacts::default());
        assert_eq!(readiness.unmet()[0].to_string(), "at least one goal required");
    }

    #[test]
    fn unmet_serializes_with_code() {
        let json = serde_json::to_value(Unmet::TooFewValues { found: 2 }).unwrap();
        assert_eq!(json, json!({"code": "too_few_values", "found": 2}));
    }

    #[tokio::test]
    async fn gate_reads_goal_titles_from_goals_draft() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let drafts = DraftStore::new(db.clone());
        let gate = ReadinessGate::new(db, drafts.clone());

        drafts
            .save_draft(
                "u1",
                StepId::Goals,
                &json!({"goals": [{"title": "Run a marathon"}]}),
                false,
            )
            .await
            .unwrap();

        let readiness = gate
            .evaluate("u1", StepId::Projects, &json!({"projects": []}))
            .await
            .unwrap();
        assert_eq!(
            readiness.unmet(),
            &[Unmet::MissingNextAction {
                goal: "Run a marathon".into()
            }]
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_blocked_not_error() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let gate = ReadinessGate::new(db.clone(), DraftStore::new(db));
        let readiness = gate
            .evaluate("u1", StepId::Identity, &json!({"statements": 5}))
            .await
            .unwrap();
        assert!(matches!(
            readiness.unmet(),
            [Unmet::MalformedDraft { step: StepId::Identity, .. }]
        ));
    }
}
