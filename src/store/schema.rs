//! Every table the wizard reads or writes, with its columns.
//!
//! The generic row API in [`crate::store::Database`] only accepts column names
//! listed here, so SQL text is never built from caller-supplied identifiers.

use serde::{Deserialize, Serialize};

/// How a column is stored and how it maps back to JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    /// Stored as 0/1.
    Bool,
    /// Stored as JSON text, read back as a JSON value.
    Json,
}

/// A column definition.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

use ColumnKind::{Bool, Integer, Json, Real, Text};

const ONBOARDING_DRAFTS_COLUMNS: &[Column] = &[
    col("user_id", Text),
    col("step_id", Text),
    col("payload", Json),
    col("completed", Bool),
    col("completed_at", Text),
    col("updated_at", Text),
];

const USER_SETTINGS_COLUMNS: &[Column] = &[
    col("user_id", Text),
    col("coaching_intensity", Text),
    col("capture_style", Text),
    col("definition_of_win", Text),
    col("mantra", Text),
    col("script", Text),
    col("common_derailers", Json),
    col("timezone", Text),
    col("week_starts_on", Text),
    col("daily_planning_time", Text),
    col("weekly_review_day", Text),
    col("weekly_review_time", Text),
    col("dashboard_theme", Text),
    col("dashboard_density", Text),
    col("dashboard_widgets", Json),
    col("show_quotes", Bool),
    col("onboarding_completed", Bool),
    col("onboarding_completed_at", Text),
    col("updated_at", Text),
];

const USER_BASELINE_COLUMNS: &[Column] = &[
    col("user_id", Text),
    col("overwhelm_level", Integer),
    col("motivation_level", Integer),
    col("biggest_struggle", Text),
    col("current_system", Text),
    col("recorded_at", Text),
];

const INBOX_ITEMS_COLUMNS: &[Column] = &[
    col("id", Text),
    col("user_id", Text),
    col("content", Text),
    col("source", Text),
    col("created_at", Text),
];

const USER_VALUES_COLUMNS: &[Column] = &[
    col("id", Text),
    col("user_id", Text),
    col("name", Text),
    col("description", Text),
    col("rank", Integer),
    col("sort_order", Integer),
    col("created_at", Text),
];

const IDENTITY_STATEMENTS_COLUMNS: &[Column] = &[
    col("id", Text),
    col("user_id", Text),
    col("statement", Text),
    col("sort_order", Integer),
    col("created_at", Text),
];

const LIFE_DOMAINS_COLUMNS: &[Column] = &[
    col("id", Text),
    col("user_id", Text),
    col("name", Text),
    col("satisfaction", Integer),
    col("sort_order", Integer),
    col("created_at", Text),
];

const YEAR_COMPASS_COLUMNS: &[Column] = &[
    col("user_id", Text),
    col("year", Integer),
    col("theme", Text),
    col("letter", Text),
    col("feelings", Json),
    col("scenes", Json),
    col("updated_at", Text),
];

const GOALS_COLUMNS: &[Column] = &[
    col("id", Text),
    col("user_id", Text),
    col("title", Text),
    col("why", Text),
    col("life_domain", Text),
    col("target_date", Text),
    col("status", Text),
    col("created_at", Text),
];

const GOAL_VALUES_COLUMNS: &[Column] = &[
    col("id", Text),
    col("user_id", Text),
    col("goal_id", Text),
    col("value_id", Text),
];

const LEAD_INDICATORS_COLUMNS: &[Column] = &[
    col("id", Text),
    col("user_id", Text),
    col("goal_id", Text),
    col("name", Text),
    col("target", Real),
    col("unit", Text),
    col("cadence", Text),
    col("created_at", Text),
];

const PROJECTS_COLUMNS: &[Column] = &[
    col("id", Text),
    col("user_id", Text),
    col("goal_id", Text),
    col("title", Text),
    col("status", Text),
    col("created_at", Text),
];

const TASKS_COLUMNS: &[Column] = &[
    col("id", Text),
    col("user_id", Text),
    col("project_id", Text),
    col("title", Text),
    col("is_next_action", Bool),
    col("status", Text),
    col("created_at", Text),
];

const WOOPS_COLUMNS: &[Column] = &[
    col("id", Text),
    col("user_id", Text),
    col("goal_id", Text),
    col("wish", Text),
    col("outcome", Text),
    col("obstacle", Text),
    col("plan", Text),
    col("created_at", Text),
];

const IF_THEN_PLANS_COLUMNS: &[Column] = &[
    col("id", Text),
    col("user_id", Text),
    col("goal_id", Text),
    col("cue", Text),
    col("response", Text),
    col("created_at", Text),
];

const HABITS_COLUMNS: &[Column] = &[
    col("id", Text),
    col("user_id", Text),
    col("goal_id", Text),
    col("name", Text),
    col("cadence", Text),
    col("cue", Text),
    col("tiny_version", Text),
    col("created_at", Text),
];

/// Tables owned by the persistence collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    OnboardingDrafts,
    UserSettings,
    UserBaseline,
    InboxItems,
    UserValues,
    IdentityStatements,
    LifeDomains,
    YearCompass,
    Goals,
    GoalValues,
    LeadIndicators,
    Projects,
    Tasks,
    Woops,
    IfThenPlans,
    Habits,
}

impl Table {
    /// Every table, in migration order.
    pub const ALL: [Table; 16] = [
        Table::OnboardingDrafts,
        Table::UserSettings,
        Table::UserBaseline,
        Table::InboxItems,
        Table::UserValues,
        Table::IdentityStatements,
        Table::LifeDomains,
        Table::YearCompass,
        Table::Goals,
        Table::GoalValues,
        Table::LeadIndicators,
        Table::Projects,
        Table::Tasks,
        Table::Woops,
        Table::IfThenPlans,
        Table::Habits,
    ];

    /// SQL table name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OnboardingDrafts => "onboarding_drafts",
            Self::UserSettings => "user_settings",
            Self::UserBaseline => "user_baseline",
            Self::InboxItems => "inbox_items",
            Self::UserValues => "user_values",
            Self::IdentityStatements => "identity_statements",
            Self::LifeDomains => "life_domains",
            Self::YearCompass => "year_compass",
            Self::Goals => "goals",
            Self::GoalValues => "goal_values",
            Self::LeadIndicators => "lead_indicators",
            Self::Projects => "projects",
            Self::Tasks => "tasks",
            Self::Woops => "woops",
            Self::IfThenPlans => "if_then_plans",
            Self::Habits => "habits",
        }
    }

    /// Columns in select order.
    pub fn columns(&self) -> &'static [Column] {
        match self {
            Self::OnboardingDrafts => ONBOARDING_DRAFTS_COLUMNS,
            Self::UserSettings => USER_SETTINGS_COLUMNS,
            Self::UserBaseline => USER_BASELINE_COLUMNS,
            Self::InboxItems => INBOX_ITEMS_COLUMNS,
            Self::UserValues => USER_VALUES_COLUMNS,
            Self::IdentityStatements => IDENTITY_STATEMENTS_COLUMNS,
            Self::LifeDomains => LIFE_DOMAINS_COLUMNS,
            Self::YearCompass => YEAR_COMPASS_COLUMNS,
            Self::Goals => GOALS_COLUMNS,
            Self::GoalValues => GOAL_VALUES_COLUMNS,
            Self::LeadIndicators => LEAD_INDICATORS_COLUMNS,
            Self::Projects => PROJECTS_COLUMNS,
            Self::Tasks => TASKS_COLUMNS,
            Self::Woops => WOOPS_COLUMNS,
            Self::IfThenPlans => IF_THEN_PLANS_COLUMNS,
            Self::Habits => HABITS_COLUMNS,
        }
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns().iter().find(|c| c.name == name)
    }

    /// Whether rows carry a generated `id` primary key.
    pub fn has_id(&self) -> bool {
        self.column("id").is_some()
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
