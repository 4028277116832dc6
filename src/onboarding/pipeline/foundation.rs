//! Steps 0-6: baseline, capture, values, identity, year theme, life domains
//! and vision.

use std::collections::HashSet;

use serde_json::Value;
use uuid::Uuid;

use crate::row;
use crate::store::{Filter, Row, Table, Write};

use super::super::payload::{
    BaselineDraft, CaptureDraft, IdentityDraft, LifeDomainsDraft, ValuesDraft, VisionDraft,
    YearThemeDraft, clean, clean_opt,
};
use super::context::{MaterializeContext, natural_key};
use super::{RANKED_VALUES, put, settings};

/// Overwhelm at or above this level starts coaching gently.
const GENTLE_COACHING_THRESHOLD: u8 = 7;

pub(super) fn baseline(d: &BaselineDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let mut writes = vec![Write::upsert(
        Table::UserBaseline,
        &["user_id"],
        row! {
            "user_id" => ctx.user_id,
            "overwhelm_level" => d.overwhelm_level,
            "motivation_level" => d.motivation_level,
            "biggest_struggle" => clean_opt(&d.biggest_struggle),
            "current_system" => clean_opt(&d.current_system),
            "recorded_at" => ctx.timestamp(),
        },
    )];

    let mut fields = Row::new();
    put(
        &mut fields,
        "coaching_intensity",
        d.overwhelm_level.map(|level| {
            if level >= GENTLE_COACHING_THRESHOLD {
                "gentle"
            } else {
                "standard"
            }
        }),
    );
    writes.extend(settings(ctx, fields));
    writes
}

pub(super) fn capture(d: &CaptureDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let created_at = ctx.timestamp();
    let mut seen = ctx.existing.clone();
    let mut writes: Vec<Write> = d
        .items()
        .into_iter()
        .filter(|item| seen.insert(natural_key(&[*item])))
        .map(|item| {
            Write::insert(
                Table::InboxItems,
                row! {
                    "user_id" => ctx.user_id,
                    "content" => item,
                    "source" => "onboarding",
                    "created_at" => created_at,
                },
            )
        })
        .collect();

    let mut fields = Row::new();
    put(&mut fields, "capture_style", clean_opt(&d.capture_style));
    writes.extend(settings(ctx, fields));
    writes
}

/// Replaces the user's values. A value whose name survives keeps its id, so
/// goal links to it stay valid; links to dropped values are deleted.
pub(super) fn values(d: &ValuesDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let created_at = ctx.timestamp();
    let mut writes = vec![Write::delete_where(
        Table::UserValues,
        Filter::user(&ctx.user_id),
    )];

    let mut kept = HashSet::new();
    for (i, value) in d.distinct().into_iter().enumerate() {
        let id = match ctx.value_by_name(&value.name) {
            Some(existing) if kept.insert(existing.id.as_str()) => existing.id.clone(),
            _ => Uuid::new_v4().to_string(),
        };
        let rank = (i < RANKED_VALUES).then_some(i + 1);
        writes.push(Write::insert(
            Table::UserValues,
            row! {
                "id" => id,
                "user_id" => ctx.user_id,
                "name" => value.name.trim(),
                "description" => clean_opt(&value.description),
                "rank" => rank,
                "sort_order" => i,
                "created_at" => created_at,
            },
        ));
    }

    for dropped in ctx.values.iter().filter(|v| !kept.contains(v.id.as_str())) {
        writes.push(Write::delete_where(
            Table::GoalValues,
            Filter::user(&ctx.user_id).eq("value_id", dropped.id.as_str()),
        ));
    }
    writes
}

pub(super) fn identity(d: &IdentityDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let created_at = ctx.timestamp();
    let mut writes = vec![Write::delete_where(
        Table::IdentityStatements,
        Filter::user(&ctx.user_id),
    )];
    writes.extend(d.non_empty().into_iter().enumerate().map(|(i, statement)| {
        Write::insert(
            Table::IdentityStatements,
            row! {
                "user_id" => ctx.user_id,
                "statement" => statement,
                "sort_order" => i,
                "created_at" => created_at,
            },
        )
    }));
    writes
}

pub(super) fn year_theme(d: &YearThemeDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let mut writes = vec![Write::upsert(
        Table::YearCompass,
        &["user_id", "year"],
        row! {
            "user_id" => ctx.user_id,
            "year" => ctx.year,
            "theme" => clean(&d.theme),
            "updated_at" => ctx.timestamp(),
        },
    )];

    let mut fields = Row::new();
    put(&mut fields, "definition_of_win", clean_opt(&d.definition_of_win));
    writes.extend(settings(ctx, fields));
    writes
}

pub(super) fn life_domains(d: &LifeDomainsDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let created_at = ctx.timestamp();
    let mut writes = vec![Write::delete_where(
        Table::LifeDomains,
        Filter::user(&ctx.user_id),
    )];
    writes.extend(d.distinct().into_iter().enumerate().map(|(i, domain)| {
        Write::insert(
            Table::LifeDomains,
            row! {
                "user_id" => ctx.user_id,
                "name" => domain.name.trim(),
                "satisfaction" => domain.satisfaction,
                "sort_order" => i,
                "created_at" => created_at,
            },
        )
    }));
    writes
}

/// Only fields the user filled in are merged; the rest stay as stored.
pub(super) fn vision(d: &VisionDraft, ctx: &MaterializeContext) -> Vec<Write> {
    let mut writes = Vec::new();

    let mut compass = Row::new();
    put(&mut compass, "letter", clean_opt(&d.letter));
    put(&mut compass, "feelings", d.feelings.as_deref().map(non_blank));
    put(&mut compass, "scenes", d.scenes.as_deref().map(non_blank));
    if !compass.is_empty() {
        compass.insert("user_id".into(), Value::from(ctx.user_id.as_str()));
        compass.insert("year".into(), Value::from(ctx.year));
        compass.insert("updated_at".into(), Value::from(ctx.timestamp()));
        writes.push(Write::upsert(Table::YearCompass, &["user_id", "year"], compass));
    }

    let mut fields = Row::new();
    put(&mut fields, "mantra", clean_opt(&d.mantra));
    put(&mut fields, "script", clean_opt(&d.script));
    writes.extend(settings(ctx, fields));
    writes
}

/// Trimmed, non-blank entries, first occurrence only.
pub(super) fn non_blank(items: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(|s| clean(s))
        .filter(|s| seen.insert(*s))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::onboarding::payload::ValueEntry;
    use crate::onboarding::pipeline::ValueRef;

    fn ctx() -> MaterializeContext {
        MaterializeContext::new("u1", 2026, Utc::now())
    }

    fn inserts(writes: &[Write], table: Table) -> Vec<&Row> {
        writes
            .iter()
            .filter_map(|w| match w {
                Write::Insert { table: t, fields } if *t == table => Some(fields),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn high_overwhelm_coaches_gently() {
        let draft = BaselineDraft {
            overwhelm_level: Some(8),
            motivation_level: Some(4),
            ..Default::default()
        };
        let writes = baseline(&draft, &ctx());
        assert_eq!(writes.len(), 2);
        match &writes[1] {
            Write::Upsert { table, fields, .. } => {
                assert_eq!(*table, Table::UserSettings);
                assert_eq!(fields["coaching_intensity"], json!("gentle"));
            }
            other => panic!("unexpected write {other:?}"),
        }
    }

    #[test]
    fn capture_skips_lines_already_in_inbox() {
        let mut ctx = ctx();
        ctx.existing.insert(natural_key(&["call mum"]));
        let draft = CaptureDraft {
            brain_dump: "Call Mum\nfix bike\nfix bike\n".into(),
            capture_style: None,
        };
        let writes = capture(&draft, &ctx);
        let rows = inserts(&writes, Table::InboxItems);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["content"], json!("fix bike"));
        assert_eq!(rows[0]["source"], json!("onboarding"));
        assert_eq!(writes.len(), 1, "no capture style, no settings write");
    }

    #[test]
    fn values_replace_and_rank_first_five() {
        let names = ["A", "B", "C", "D", "E", "F"];
        let draft = ValuesDraft {
            values: names
                .iter()
                .map(|n| ValueEntry {
                    name: n.to_string(),
                    description: None,
                })
                .collect(),
        };
        let writes = values(&draft, &ctx());
        assert!(matches!(
            &writes[0],
            Write::DeleteWhere { table: Table::UserValues, .. }
        ));
        let rows = inserts(&writes, Table::UserValues);
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0]["rank"], json!(1));
        assert_eq!(rows[4]["rank"], json!(5));
        assert_eq!(rows[5]["rank"], Value::Null);
        assert_eq!(rows[5]["sort_order"], json!(5));
    }

    #[test]
    fn surviving_values_keep_their_ids() {
        let mut ctx = ctx();
        ctx.values = vec![
            ValueRef { id: "v-health".into(), name: "Health".into() },
            ValueRef { id: "v-growth".into(), name: "Growth".into() },
        ];
        let draft = ValuesDraft {
            values: ["HEALTH", "Family", "Rest"]
                .iter()
                .map(|n| ValueEntry {
                    name: n.to_string(),
                    description: None,
                })
                .collect(),
        };

        let writes = values(&draft, &ctx);
        let rows = inserts(&writes, Table::UserValues);
        assert_eq!(rows[0]["id"], json!("v-health"));
        assert_ne!(rows[1]["id"], json!("v-growth"));

        let pruned: Vec<&Filter> = writes
            .iter()
            .filter_map(|w| match w {
                Write::DeleteWhere { table: Table::GoalValues, filter } => Some(filter),
                _ => None,
            })
            .collect();
        assert_eq!(pruned.len(), 1);
        assert!(
            pruned[0]
                .clauses()
                .iter()
                .any(|(col, v)| *col == "value_id" && *v == json!("v-growth"))
        );
    }

    #[test]
    fn year_theme_upserts_by_user_and_year() {
        let draft = YearThemeDraft {
            theme: " Momentum ".into(),
            definition_of_win: None,
        };
        let writes = year_theme(&draft, &ctx());
        assert_eq!(writes.len(), 1);
        match &writes[0] {
            Write::Upsert { key, fields, .. } => {
                assert_eq!(key, &vec!["user_id", "year"]);
                assert_eq!(fields["year"], json!(2026));
                assert_eq!(fields["theme"], json!("Momentum"));
            }
            other => panic!("unexpected write {other:?}"),
        }
    }

    #[test]
    fn vision_merges_only_present_fields() {
        let draft = VisionDraft {
            letter: Some("Dear me".into()),
            scenes: Some(vec!["Finish line".into(), " ".into()]),
            ..Default::default()
        };
        let writes = vision(&draft, &ctx());
        assert_eq!(writes.len(), 1);
        match &writes[0] {
            Write::Upsert { fields, .. } => {
                assert_eq!(fields["letter"], json!("Dear me"));
                assert_eq!(fields["scenes"], json!(["Finish line"]));
                assert!(!fields.contains_key("feelings"));
            }
            other => panic!("unexpected write {other:?}"),
        }
    }

    #[test]
    fn empty_vision_writes_nothing() {
        assert!(vision(&VisionDraft::default(), &ctx()).is_empty());
    }
}
