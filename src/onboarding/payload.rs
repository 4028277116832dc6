//! Typed draft payloads, one shape per wizard step.
//!
//! Drafts arrive as free-form JSON from the form layer. Every field is
//! optional on the wire (`#[serde(default)]`) so half-filled forms still
//! parse; the readiness gate decides whether the content is sufficient.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WizardError;

use super::steps::StepId;

/// Trimmed text, or `None` when blank.
pub fn clean(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Like [`clean`] for optional fields.
pub fn clean_opt(text: &Option<String>) -> Option<&str> {
    text.as_deref().and_then(clean)
}

/// Case- and whitespace-insensitive key used to match names across steps.
pub fn name_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Keep the first occurrence of every non-blank name, compared by [`name_key`].
fn distinct_by<'a, T>(items: &'a [T], name: impl Fn(&T) -> &str) -> Vec<&'a T> {
    let mut seen = std::collections::HashSet::new();
    items
        .iter()
        .filter(|item| clean(name(item)).is_some() && seen.insert(name_key(name(item))))
        .collect()
}

// ── Step 0 ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineDraft {
    pub overwhelm_level: Option<u8>,
    pub motivation_level: Option<u8>,
    pub biggest_struggle: Option<String>,
    pub current_system: Option<String>,
}

// ── Step 1 ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDraft {
    /// Free text, one open loop per line.
    pub brain_dump: String,
    pub capture_style: Option<String>,
}

impl CaptureDraft {
    /// Non-blank lines, trimmed.
    pub fn items(&self) -> Vec<&str> {
        self.brain_dump.lines().filter_map(clean).collect()
    }
}

// ── Step 2 ──────────────────────────────────────────────────────────

/// A value entry. Accepts either `"Health"` or `{"name": "Health", ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "NamedInput")]
pub struct ValueEntry {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuesDraft {
    /// Ranked, most important first.
    pub values: Vec<ValueEntry>,
}

impl ValuesDraft {
    /// Distinct named values in ranked order.
    pub fn distinct(&self) -> Vec<&ValueEntry> {
        distinct_by(&self.values, |v| v.name.as_str())
    }
}

// ── Step 3 ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityDraft {
    pub statements: Vec<String>,
}

impl IdentityDraft {
    pub fn non_empty(&self) -> Vec<&str> {
        self.statements.iter().filter_map(|s| clean(s)).collect()
    }
}

// ── Step 4 ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YearThemeDraft {
    pub theme: String,
    pub definition_of_win: Option<String>,
}

// ── Step 5 ──────────────────────────────────────────────────────────

/// A life domain. Accepts either `"Career"` or `{"name": "Career", "satisfaction": 6}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "NamedInput")]
pub struct DomainEntry {
    pub name: String,
    pub satisfaction: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifeDomainsDraft {
    pub domains: Vec<DomainEntry>,
}

impl LifeDomainsDraft {
    pub fn distinct(&self) -> Vec<&DomainEntry> {
        distinct_by(&self.domains, |d| d.name.as_str())
    }
}

/// Wire form shared by [`ValueEntry`] and [`DomainEntry`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NamedInput {
    Name(String),
    Full {
        #[serde(default)]
        name: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        satisfaction: Option<u8>,
    },
}

impl From<NamedInput> for ValueEntry {
    fn from(input: NamedInput) -> Self {
        match input {
            NamedInput::Name(name) => Self {
                name,
                description: None,
            },
            NamedInput::Full {
                name, description, ..
            } => Self { name, description },
        }
    }
}

impl From<NamedInput> for DomainEntry {
    fn from(input: NamedInput) -> Self {
        match input {
            NamedInput::Name(name) => Self {
                name,
                satisfaction: None,
            },
            NamedInput::Full {
                name, satisfaction, ..
            } => Self { name, satisfaction },
        }
    }
}

// ── Step 6 ──────────────────────────────────────────────────────────

/// Vision answers. Absent fields are left untouched on commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionDraft {
    pub letter: Option<String>,
    pub feelings: Option<Vec<String>>,
    pub scenes: Option<Vec<String>>,
    pub mantra: Option<String>,
    pub script: Option<String>,
}

// ── Step 7 ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalDraft {
    pub title: String,
    pub why: Option<String>,
    pub life_domain: Option<String>,
    pub target_date: Option<String>,
    /// Names of values (from the Values step) this goal serves.
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalsDraft {
    pub goals: Vec<GoalDraft>,
}

impl GoalsDraft {
    /// Distinct titled goals in drafted order.
    pub fn titled(&self) -> Vec<&GoalDraft> {
        distinct_by(&self.goals, |g| g.title.as_str())
    }
}

// ── Step 8 ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorDraft {
    pub name: String,
    pub target: Option<f64>,
    pub unit: Option<String>,
    pub cadence: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalIndicators {
    pub goal_title: String,
    pub indicators: Vec<IndicatorDraft>,
}

impl GoalIndicators {
    pub fn named(&self) -> Vec<&IndicatorDraft> {
        distinct_by(&self.indicators, |i| i.name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadIndicatorsDraft {
    pub goals: Vec<GoalIndicators>,
}

impl LeadIndicatorsDraft {
    /// Named indicators drafted for the goal with this title.
    pub fn for_goal(&self, title: &str) -> Vec<&IndicatorDraft> {
        let key = name_key(title);
        self.goals
            .iter()
            .filter(|g| name_key(&g.goal_title) == key)
            .flat_map(|g| g.named())
            .collect()
    }
}

// ── Step 9 ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectDraft {
    pub goal_title: String,
    pub title: String,
    pub next_action: String,
}

impl ProjectDraft {
    /// The project's name; falls back to the next action when untitled.
    pub fn display_title(&self) -> Option<&str> {
        clean(&self.title).or_else(|| clean(&self.next_action))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectsDraft {
    pub projects: Vec<ProjectDraft>,
}

impl ProjectsDraft {
    /// Projects for this goal that carry a next action.
    pub fn actionable_for(&self, title: &str) -> Vec<&ProjectDraft> {
        let key = name_key(title);
        self.projects
            .iter()
            .filter(|p| name_key(&p.goal_title) == key && clean(&p.next_action).is_some())
            .collect()
    }
}

// ── Step 10 ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WoopDraft {
    pub goal_title: Option<String>,
    pub wish: String,
    pub outcome: Option<String>,
    pub obstacle: Option<String>,
    pub plan: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IfThenDraft {
    pub goal_title: Option<String>,
    pub cue: String,
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstaclesDraft {
    pub common_derailers: Vec<String>,
    pub woops: Vec<WoopDraft>,
    pub if_then_plans: Vec<IfThenDraft>,
}

// ── Step 11 ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HabitDraft {
    pub name: String,
    pub cadence: Option<String>,
    pub goal_title: Option<String>,
    pub cue: Option<String>,
    pub tiny_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HabitsDraft {
    pub habits: Vec<HabitDraft>,
}

// ── Steps 12-13 ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleDraft {
    pub timezone: String,
    pub week_starts_on: Option<String>,
    pub daily_planning_time: Option<String>,
    pub weekly_review_day: Option<String>,
    pub weekly_review_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardDraft {
    pub theme: Option<String>,
    pub density: Option<String>,
    pub widgets: Option<Vec<String>>,
    pub show_quotes: Option<bool>,
}

// ── Dispatch ────────────────────────────────────────────────────────

/// A parsed draft, tagged by the step it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum StepDraft {
    Baseline(BaselineDraft),
    Capture(CaptureDraft),
    Values(ValuesDraft),
    Identity(IdentityDraft),
    YearTheme(YearThemeDraft),
    LifeDomains(LifeDomainsDraft),
    Vision(VisionDraft),
    Goals(GoalsDraft),
    LeadIndicators(LeadIndicatorsDraft),
    Projects(ProjectsDraft),
    Obstacles(ObstaclesDraft),
    Habits(HabitsDraft),
    Schedule(ScheduleDraft),
    Dashboard(DashboardDraft),
    Finish,
}

impl StepDraft {
    /// Parse a raw payload as the draft for `step`. `null` parses as empty.
    pub fn parse(step: StepId, payload: &Value) -> Result<Self, WizardError> {
        fn typed<T: serde::de::DeserializeOwned + Default>(
            step: StepId,
            payload: &Value,
        ) -> Result<T, WizardError> {
            if payload.is_null() {
                return Ok(T::default());
            }
            serde_json::from_value(payload.clone()).map_err(|e| WizardError::MalformedDraft {
                step: step.to_string(),
                reason: e.to_string(),
            })
        }

        Ok(match step {
            StepId::Baseline => Self::Baseline(typed(step, payload)?),
            StepId::Capture => Self::Capture(typed(step, payload)?),
            StepId::Values => Self::Values(typed(step, payload)?),
            StepId::Identity => Self::Identity(typed(step, payload)?),
            StepId::YearTheme => Self::YearTheme(typed(step, payload)?),
            StepId::LifeDomains => Self::LifeDomains(typed(step, payload)?),
            StepId::Vision => Self::Vision(typed(step, payload)?),
            StepId::Goals => Self::Goals(typed(step, payload)?),
            StepId::LeadIndicators => Self::LeadIndicators(typed(step, payload)?),
            StepId::Projects => Self::Projects(typed(step, payload)?),
            StepId::Obstacles => Self::Obstacles(typed(step, payload)?),
            StepId::Habits => Self::Habits(typed(step, payload)?),
            StepId::Schedule => Self::Schedule(typed(step, payload)?),
            StepId::Dashboard => Self::Dashboard(typed(step, payload)?),
            StepId::Finish => Self::Finish,
        })
    }

    pub fn step(&self) -> StepId {
        match self {
            Self::Baseline(_) => StepId::Baseline,
            Self::Capture(_) => StepId::Capture,
            Self::Values(_) => StepId::Values,
            Self::Identity(_) => StepId::Identity,
            Self::YearTheme(_) => StepId::YearTheme,
            Self::LifeDomains(_) => StepId::LifeDomains,
            Self::Vision(_) => StepId::Vision,
            Self::Goals(_) => StepId::Goals,
            Self::LeadIndicators(_) => StepId::LeadIndicators,
            Self::Projects(_) => StepId::Projects,
            Self::Obstacles(_) => StepId::Obstacles,
            Self::Habits(_) => StepId::Habits,
            Self::Schedule(_) => StepId::Schedule,
            Self::Dashboard(_) => StepId::Dashboard,
            Self::Finish => StepId::Finish,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_tags_every_step() {
        for step in StepId::ALL {
            let draft = StepDraft::parse(step, &json!({})).unwrap();
            assert_eq!(draft.step(), step);
        }
    }

    #[test]
    fn null_payload_is_empty_draft() {
        let draft = StepDraft::parse(StepId::Values, &Value::Null).unwrap();
        assert_eq!(draft, StepDraft::Values(ValuesDraft::default()));
    }

    #[test]
    fn values_accept_plain_names_and_objects() {
        let draft: ValuesDraft = serde_json::from_value(json!({
            "values": ["Health", {"name": "Growth", "description": "Learn every week"}]
        }))
        .unwrap();
        assert_eq!(draft.values[0].name, "Health");
        assert_eq!(draft.values[1].description.as_deref(), Some("Learn every week"));
    }

    #[test]
    fn distinct_values_ignore_case_and_blanks() {
        let draft: ValuesDraft = serde_json::from_value(json!({
            "values": ["Health", " health ", "", "Family", "Growth"]
        }))
        .unwrap();
        let names: Vec<&str> = draft.distinct().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["Health", "Family", "Growth"]);
    }

    #[test]
    fn capture_items_skip_blank_lines() {
        let draft = CaptureDraft {
            brain_dump: "call mum\n\n   \n  renew passport  \nfix bike".to_string(),
            capture_style: None,
        };
        assert_eq!(draft.items(), vec!["call mum", "renew passport", "fix bike"]);
    }

    #[test]
    fn indicators_match_goal_titles_loosely() {
        let draft: LeadIndicatorsDraft = serde_json::from_value(json!({
            "goals": [
                {"goal_title": "Run a  Marathon", "indicators": [{"name": "Weekly km"}, {"name": ""}]}
            ]
        }))
        .unwrap();
        assert_eq!(draft.for_goal("run a marathon").len(), 1);
        assert!(draft.for_goal("Write a book").is_empty());
    }

    #[test]
    fn untitled_project_uses_next_action() {
        let project = ProjectDraft {
            goal_title: "Run a marathon".to_string(),
            title: "  ".to_string(),
            next_action: "Buy running shoes".to_string(),
        };
        assert_eq!(project.display_title(), Some("Buy running shoes"));
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let err = StepDraft::parse(StepId::Goals, &json!({"goals": "lots"})).unwrap_err();
        assert!(matches!(err, WizardError::MalformedDraft { ref step, .. } if step == "goals"));
    }

    #[test]
    fn name_key_normalizes_whitespace_and_case() {
        assert_eq!(name_key("  Run   a Marathon "), "run a marathon");
    }
}
