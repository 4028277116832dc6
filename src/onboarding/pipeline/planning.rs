//! Steps 7-13: goals and everything that hangs off them, then scheduling and
//! dashboard preferences.

use std::collections::HashSet;

use uuid::Uuid;

use crate::row;
use crate::store::{Row, Table, Write};

use super::super::payload::{
    DashboardDraft, GoalsDraft, HabitsDraft, LeadIndicatorsDraft, ObstaclesDraft, ProjectsDraft,
    ScheduleDraft, clean, clean_opt,
};
use super::context::{MaterializeContext, natural_key};
use super::foundation::non_blank;
use super::{MAX_INDICATORS_PER_GOAL, put, settings};

pub(super) fn goals(d: &GoalsDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let created_at = ctx.timestamp();
    let mut seen = ctx.existing.clone();
    let mut writes = Vec::new();

    for goal in d.titled() {
        let Some(title) = clean(&goal.title) else {
            continue;
        };
        if !seen.insert(natural_key(&[title])) {
            continue;
        }

        let goal_id = Uuid::new_v4().to_string();
        writes.push(Write::insert(
            Table::Goals,
            row! {
                "id" => goal_id,
                "user_id" => ctx.user_id,
                "title" => title,
                "why" => clean_opt(&goal.why),
                "life_domain" => clean_opt(&goal.life_domain),
                "target_date" => clean_opt(&goal.target_date),
                "status" => "active",
                "created_at" => created_at,
            },
        ));

        let mut linked = HashSet::new();
        for value in goal.values.iter().filter_map(|name| ctx.value_by_name(name)) {
            if linked.insert(value.id.as_str()) {
                writes.push(Write::insert(
                    Table::GoalValues,
                    row! {
                        "user_id" => ctx.user_id,
                        "goal_id" => goal_id,
                        "value_id" => value.id,
                    },
                ));
            }
        }
    }

    writes
}

/// Up to three indicators per materialized goal, counting ones already stored.
pub(super) fn lead_indicators(d: &LeadIndicatorsDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let created_at = ctx.timestamp();
    let mut seen = ctx.existing.clone();
    let mut writes = Vec::new();

    for goal in &ctx.goals {
        let budget = MAX_INDICATORS_PER_GOAL.saturating_sub(ctx.children_of(&goal.id));
        let fresh = d
            .for_goal(&goal.title)
            .into_iter()
            .filter(|i| seen.insert(natural_key(&[goal.id.as_str(), i.name.as_str()])))
            .take(budget);

        for indicator in fresh {
            writes.push(Write::insert(
                Table::LeadIndicators,
                row! {
                    "user_id" => ctx.user_id,
                    "goal_id" => goal.id,
                    "name" => indicator.name.trim(),
                    "target" => indicator.target,
                    "unit" => clean_opt(&indicator.unit),
                    "cadence" => clean_opt(&indicator.cadence),
                    "created_at" => created_at,
                },
            ));
        }
    }

    writes
}

/// One project per drafted entry, each with exactly one open next action.
pub(super) fn projects(d: &ProjectsDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let created_at = ctx.timestamp();
    let mut seen = ctx.existing.clone();
    let mut writes = Vec::new();

    for goal in &ctx.goals {
        for project in d.actionable_for(&goal.title) {
            let (Some(title), Some(next_action)) =
                (project.display_title(), clean(&project.next_action))
            else {
                continue;
            };
            if !seen.insert(natural_key(&[goal.id.as_str(), title])) {
                continue;
            }

            let project_id = Uuid::new_v4().to_string();
            writes.push(Write::insert(
                Table::Projects,
                row! {
                    "id" => project_id,
                    "user_id" => ctx.user_id,
                    "goal_id" => goal.id,
                    "title" => title,
                    "status" => "active",
                    "created_at" => created_at,
                },
            ));
            writes.push(Write::insert(
                Table::Tasks,
                row! {
                    "user_id" => ctx.user_id,
                    "project_id" => project_id,
                    "title" => next_action,
                    "is_next_action" => true,
                    "status" => "open",
                    "created_at" => created_at,
                },
            ));
        }
    }

    writes
}

pub(super) fn obstacles(d: &ObstaclesDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let created_at = ctx.timestamp();
    let mut seen = ctx.existing.clone();
    let mut writes = Vec::new();

    let mut fields = Row::new();
    put(
        &mut fields,
        "common_derailers",
        Some(non_blank(&d.common_derailers)),
    );
    writes.extend(settings(ctx, fields));

    for woop in &d.woops {
        let Some(wish) = clean(&woop.wish) else {
            continue;
        };
        let goal_id = goal_id_for(ctx, woop.goal_title.as_deref());
        let key = natural_key(&["woop", goal_id.unwrap_or_default(), wish]);
        if !seen.insert(key) {
            continue;
        }
        writes.push(Write::insert(
            Table::Woops,
            row! {
                "user_id" => ctx.user_id,
                "goal_id" => goal_id,
                "wish" => wish,
                "outcome" => clean_opt(&woop.outcome),
                "obstacle" => clean_opt(&woop.obstacle),
                "plan" => clean_opt(&woop.plan),
                "created_at" => created_at,
            },
        ));
    }

    for plan in &d.if_then_plans {
        let (Some(cue), Some(response)) = (clean(&plan.cue), clean(&plan.response)) else {
            continue;
        };
        if !seen.insert(natural_key(&["if_then", cue, response])) {
            continue;
        }
        writes.push(Write::insert(
            Table::IfThenPlans,
            row! {
                "user_id" => ctx.user_id,
                "goal_id" => goal_id_for(ctx, plan.goal_title.as_deref()),
                "cue" => cue,
                "response" => response,
                "created_at" => created_at,
            },
        ));
    }

    writes
}

pub(super) fn habits(d: &HabitsDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let created_at = ctx.timestamp();
    let mut seen = ctx.existing.clone();

    d.habits
        .iter()
        .filter_map(|habit| clean(&habit.name).map(|name| (habit, name)))
        .filter(|(_, name)| seen.insert(natural_key(&[*name])))
        .map(|(habit, name)| {
            Write::insert(
                Table::Habits,
                row! {
                    "user_id" => ctx.user_id,
                    "goal_id" => goal_id_for(ctx, habit.goal_title.as_deref()),
                    "name" => name,
                    "cadence" => clean_opt(&habit.cadence).unwrap_or("daily"),
                    "cue" => clean_opt(&habit.cue),
                    "tiny_version" => clean_opt(&habit.tiny_version),
                    "created_at" => created_at,
                },
            )
        })
        .collect()
}

pub(super) fn schedule(d: &ScheduleDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let mut fields = Row::new();
    put(&mut fields, "timezone", clean(&d.timezone));
    put(&mut fields, "week_starts_on", clean_opt(&d.week_starts_on));
    put(&mut fields, "daily_planning_time", clean_opt(&d.daily_planning_time));
    put(&mut fields, "weekly_review_day", clean_opt(&d.weekly_review_day));
    put(&mut fields, "weekly_review_time", clean_opt(&d.weekly_review_time));
    settings(ctx, fields).into_iter().collect()
}

pub(super) fn dashboard(d: &DashboardDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let mut fields = Row::new();
    put(&mut fields, "dashboard_theme", clean_opt(&d.theme));
    put(&mut fields, "dashboard_density", clean_opt(&d.density));
    put(&mut fields, "dashboard_widgets", d.widgets.as_deref().map(non_blank));
    put(&mut fields, "show_quotes", d.show_quotes);
    settings(ctx, fields).into_iter().collect()
}

/// Materialized goal id for an optional title; unmatched titles attach nowhere.
fn goal_id_for<'a>(ctx: &'a MaterializeContext, title: Option<&str>) -> Option<&'a str> {
    title
        .and_then(clean)
        .and_then(|t| ctx.goal_by_title(t))
        .map(|g| g.id.as_str())
}
