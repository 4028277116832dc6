//! The fixed, ordered catalogue of wizard steps.

use serde::{Deserialize, Serialize};

/// Number of steps in the wizard.
pub const TOTAL_STEPS: usize = 15;

/// The steps of the onboarding wizard, in order.
///
/// Progresses linearly: Baseline → Capture → … → Dashboard → Finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Baseline,
    Capture,
    Values,
    Identity,
    YearTheme,
    LifeDomains,
    Vision,
    Goals,
    LeadIndicators,
    Projects,
    Obstacles,
    Habits,
    Schedule,
    Dashboard,
    Finish,
}

impl StepId {
    /// Every step in wizard order.
    pub const ALL: [StepId; TOTAL_STEPS] = [
        StepId::Baseline,
        StepId::Capture,
        StepId::Values,
        StepId::Identity,
        StepId::YearTheme,
        StepId::LifeDomains,
        StepId::Vision,
        StepId::Goals,
        StepId::LeadIndicators,
        StepId::Projects,
        StepId::Obstacles,
        StepId::Habits,
        StepId::Schedule,
        StepId::Dashboard,
        StepId::Finish,
    ];

    /// Zero-based position in the wizard.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<StepId> {
        Self::ALL.get(index).copied()
    }

    /// The persisted step id: the ordinal as a string, "0" through "14".
    pub fn ordinal(self) -> String {
        self.index().to_string()
    }

    pub fn from_ordinal(ordinal: &str) -> Option<StepId> {
        ordinal.trim().parse::<usize>().ok().and_then(Self::from_index)
    }

    /// Get the next step in the linear progression, if any.
    pub fn next(self) -> Option<StepId> {
        Self::from_index(self.index() + 1)
    }

    pub fn previous(self) -> Option<StepId> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// Whether this is the last step (the Finish gate).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finish)
    }

    pub fn definition(self) -> &'static StepDefinition {
        &STEPS[self.index()]
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Baseline => "baseline",
            Self::Capture => "capture",
            Self::Values => "values",
            Self::Identity => "identity",
            Self::YearTheme => "year_theme",
            Self::LifeDomains => "life_domains",
            Self::Vision => "vision",
            Self::Goals => "goals",
            Self::LeadIndicators => "lead_indicators",
            Self::Projects => "projects",
            Self::Obstacles => "obstacles",
            Self::Habits => "habits",
            Self::Schedule => "schedule",
            Self::Dashboard => "dashboard",
            Self::Finish => "finish",
        };
        write!(f, "{s}")
    }
}

/// Display metadata and navigation rules for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepDefinition {
    pub id: StepId,
    pub title: &'static str,
    pub description: &'static str,
    pub estimated_minutes: u32,
    /// Whether the step may be left via Skip without passing its readiness rule.
    pub skippable: bool,
}

static STEPS: [StepDefinition; TOTAL_STEPS] = [
    StepDefinition {
        id: StepId::Baseline,
        title: "Where you are today",
        description: "Rate how overwhelmed and how motivated you feel right now.",
        estimated_minutes: 3,
        skippable: false,
    },
    StepDefinition {
        id: StepId::Capture,
        title: "Empty your head",
        description: "Dump every open loop, one per line. Each line lands in your inbox.",
        estimated_minutes: 5,
        skippable: true,
    },
    StepDefinition {
        id: StepId::Values,
        title: "What matters most",
        description: "Pick at least three values and put the most important first.",
        estimated_minutes: 5,
        skippable: false,
    },
    StepDefinition {
        id: StepId::Identity,
        title: "Who you are becoming",
        description: "Write at least three \"I am someone who...\" statements.",
        estimated_minutes: 4,
        skippable: false,
    },
    StepDefinition {
        id: StepId::YearTheme,
        title: "A theme for the year",
        description: "Name the year and say what a win looks like.",
        estimated_minutes: 3,
        skippable: true,
    },
    StepDefinition {
        id: StepId::LifeDomains,
        title: "Areas of life",
        description: "Choose at least three life domains you want to tend.",
        estimated_minutes: 3,
        skippable: false,
    },
    StepDefinition {
        id: StepId::Vision,
        title: "Picture the year",
        description: "Write a letter from the end of the year, plus a mantra to carry.",
        estimated_minutes: 8,
        skippable: true,
    },
    StepDefinition {
        id: StepId::Goals,
        title: "Set your goals",
        description: "Add at least one goal and link it to your values.",
        estimated_minutes: 6,
        skippable: false,
    },
    StepDefinition {
        id: StepId::LeadIndicators,
        title: "Lead indicators",
        description: "For each goal, name up to three measures you control week to week.",
        estimated_minutes: 5,
        skippable: true,
    },
    StepDefinition {
        id: StepId::Projects,
        title: "Projects and next actions",
        description: "Give every goal a project and the very next physical action.",
        estimated_minutes: 6,
        skippable: false,
    },
    StepDefinition {
        id: StepId::Obstacles,
        title: "Plan for obstacles",
        description: "List what usually derails you and write WOOP and if-then plans.",
        estimated_minutes: 6,
        skippable: true,
    },
    StepDefinition {
        id: StepId::Habits,
        title: "Supporting habits",
        description: "Add small habits that move your goals forward.",
        estimated_minutes: 4,
        skippable: true,
    },
    StepDefinition {
        id: StepId::Schedule,
        title: "Your rhythm",
        description: "Set your timezone and when you plan and review.",
        estimated_minutes: 3,
        skippable: false,
    },
    StepDefinition {
        id: StepId::Dashboard,
        title: "Make it yours",
        description: "Choose how your dashboard looks.",
        estimated_minutes: 2,
        skippable: true,
    },
    StepDefinition {
        id: StepId::Finish,
        title: "Review and finish",
        description: "Check what is still open and start using the app.",
        estimated_minutes: 2,
        skippable: false,
    },
];

/// Definition of the step at `index`, or `None` when out of range.
pub fn step_at(index: usize) -> Option<&'static StepDefinition> {
    STEPS.get(index)
}

pub fn total_steps() -> usize {
    STEPS.len()
}

/// Estimated minutes left, counting `from` itself.
pub fn remaining_minutes(from: StepId) -> u32 {
    STEPS[from.index()..]
        .iter()
        .map(|s| s.estimated_minutes)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_ordered_by_id() {
        assert_eq!(total_steps(), TOTAL_STEPS);
        for (index, step) in StepId::ALL.iter().enumerate() {
            let def = step_at(index).unwrap();
            assert_eq!(def.id, *step, "step {index} out of order");
            assert_eq!(step.index(), index);
        }
        assert!(step_at(TOTAL_STEPS).is_none());
    }

    #[test]
    fn ordinal_roundtrip() {
        for step in StepId::ALL {
            assert_eq!(StepId::from_ordinal(&step.ordinal()), Some(step));
        }
        assert_eq!(StepId::Baseline.ordinal(), "0");
        assert_eq!(StepId::Finish.ordinal(), "14");
        assert_eq!(StepId::from_ordinal("15"), None);
        assert_eq!(StepId::from_ordinal("-1"), None);
        assert_eq!(StepId::from_ordinal("goals"), None);
    }

    #[test]
    fn next_walks_all_steps() {
        let mut current = StepId::Baseline;
        let mut visited = vec![current];
        while let Some(next) = current.next() {
            visited.push(next);
            current = next;
        }
        assert_eq!(visited, StepId::ALL.to_vec());
        assert!(current.is_terminal());
    }

    #[test]
    fn previous_stops_at_first_step() {
        assert_eq!(StepId::Baseline.previous(), None);
        assert_eq!(StepId::Values.previous(), Some(StepId::Capture));
        assert_eq!(StepId::Finish.previous(), Some(StepId::Dashboard));
    }

    #[test]
    fn display_matches_serde() {
        for step in StepId::ALL {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(format!("\"{step}\""), json, "mismatch for {step:?}");
        }
    }

    #[test]
    fn gating_steps_are_not_skippable() {
        for step in [
            StepId::Baseline,
            StepId::Values,
            StepId::Identity,
            StepId::LifeDomains,
            StepId::Goals,
            StepId::Projects,
            StepId::Schedule,
            StepId::Finish,
        ] {
            assert!(!step.definition().skippable, "{step} should not be skippable");
        }
        assert!(StepId::Capture.definition().skippable);
    }

    #[test]
    fn remaining_minutes_shrinks() {
        let total = remaining_minutes(StepId::Baseline);
        assert!(total > remaining_minutes(StepId::Goals));
        assert_eq!(remaining_minutes(StepId::Finish), 2);
    }
}
