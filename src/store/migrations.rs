//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "onboarding_core",
        sql: r#"
            CREATE TABLE IF NOT EXISTS onboarding_drafts (
                user_id TEXT NOT NULL,
                step_id TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT '{}',
                completed INTEGER NOT NULL DEFAULT 0,
                completed_at TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, step_id)
            );

            CREATE TABLE IF NOT EXISTS user_settings (
                user_id TEXT PRIMARY KEY,
                coaching_intensity TEXT,
                capture_style TEXT,
                definition_of_win TEXT,
                mantra TEXT,
                script TEXT,
                common_derailers TEXT,
                timezone TEXT,
                week_starts_on TEXT,
                daily_planning_time TEXT,
                weekly_review_day TEXT,
                weekly_review_time TEXT,
                dashboard_theme TEXT,
                dashboard_density TEXT,
                dashboard_widgets TEXT,
                show_quotes INTEGER,
                onboarding_completed INTEGER NOT NULL DEFAULT 0,
                onboarding_completed_at TEXT,
                updated_at TEXT
            );

            CREATE TABLE IF NOT EXISTS user_baseline (
                user_id TEXT PRIMARY KEY,
                overwhelm_level INTEGER,
                motivation_level INTEGER,
                biggest_struggle TEXT,
                current_system TEXT,
                recorded_at TEXT
            );
        "#,
    },
    Migration {
        version: 2,
        name: "foundation_tables",
        sql: r#"
            CREATE TABLE IF NOT EXISTS inbox_items (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                content TEXT NOT NULL,
                source TEXT,
                created_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_inbox_items_user ON inbox_items(user_id);

            CREATE TABLE IF NOT EXISTS user_values (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                rank INTEGER,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_user_values_user ON user_values(user_id);

            CREATE TABLE IF NOT EXISTS identity_statements (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                statement TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_identity_statements_user ON identity_statements(user_id);

            CREATE TABLE IF NOT EXISTS life_domains (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                satisfaction INTEGER,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_life_domains_user ON life_domains(user_id);

            CREATE TABLE IF NOT EXISTS year_compass (
                user_id TEXT NOT NULL,
                year INTEGER NOT NULL,
                theme TEXT,
                letter TEXT,
                feelings TEXT,
                scenes TEXT,
                updated_at TEXT,
                PRIMARY KEY (user_id, year)
            );
        "#,
    },
    Migration {
        version: 3,
        name: "planning_tables",
        sql: r#"
            CREATE TABLE IF NOT EXISTS goals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                why TEXT,
                life_domain TEXT,
                target_date TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_goals_user ON goals(user_id);

            CREATE TABLE IF NOT EXISTS goal_values (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                goal_id TEXT NOT NULL REFERENCES goals(id) ON DELETE CASCADE,
                value_id TEXT NOT NULL,
                UNIQUE (goal_id, value_id)
            );

            CREATE TABLE IF NOT EXISTS lead_indicators (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                goal_id TEXT NOT NULL REFERENCES goals(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                target REAL,
                unit TEXT,
                cadence TEXT,
                created_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_lead_indicators_goal ON lead_indicators(goal_id);

            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                goal_id TEXT REFERENCES goals(id) ON DELETE SET NULL,
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_projects_user ON projects(user_id);

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                project_id TEXT REFERENCES projects(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                is_next_action INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'open',
                created_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_one_next_action
                ON tasks(project_id) WHERE is_next_action = 1 AND status = 'open';

            CREATE TABLE IF NOT EXISTS woops (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                goal_id TEXT REFERENCES goals(id) ON DELETE SET NULL,
                wish TEXT NOT NULL,
                outcome TEXT,
                obstacle TEXT,
                plan TEXT,
                created_at TEXT
            );

            CREATE TABLE IF NOT EXISTS if_then_plans (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                goal_id TEXT REFERENCES goals(id) ON DELETE SET NULL,
                cue TEXT NOT NULL,
                response TEXT NOT NULL,
                created_at TEXT
            );

            CREATE TABLE IF NOT EXISTS habits (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                goal_id TEXT REFERENCES goals(id) ON DELETE SET NULL,
                name TEXT NOT NULL,
                cadence TEXT,
                cue TEXT,
                tiny_version TEXT,
                created_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_habits_user ON habits(user_id);
        "#,
    },
];

/// Run all pending migrations against the connection.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    let version = get_current_version(conn).await?;
    tracing::info!(version, "Database migrations complete");
    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row.get::<i64>(0).map_err(|e| {
            DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
        }),
        None => Ok(0),
    }
}

/// Record a migration as applied.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::Table;

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    async fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut rows = conn
            .query(&format!("PRAGMA table_info({table})"), ())
            .await
            .unwrap();
        let mut names = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            names.push(row.get::<String>(1).unwrap());
        }
        names
    }

    #[tokio::test]
    async fn migrations_create_every_catalogued_table() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        for table in Table::ALL {
            let columns = table_columns(&conn, table.name()).await;
            assert!(!columns.is_empty(), "{table} was not created");
            for column in table.columns() {
                assert!(
                    columns.iter().any(|c| c == column.name),
                    "{table} is missing column {}",
                    column.name
                );
            }
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();
        assert_eq!(get_current_version(&conn).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn version_tracking() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query("SELECT version, name FROM _migrations ORDER BY version", ())
            .await
            .unwrap();
        let mut applied = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            applied.push((row.get::<i64>(0).unwrap(), row.get::<String>(1).unwrap()));
        }
        assert_eq!(
            applied,
            vec![
                (1, "onboarding_core".to_string()),
                (2, "foundation_tables".to_string()),
                (3, "planning_tables".to_string()),
            ]
        );
    }
}
