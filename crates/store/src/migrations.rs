//! Versioned schema migrations for the SQLite store.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::{info, warn};

/// Current database schema version.
const SCHEMA_VERSION: i32 = 2;

/// Applies every migration newer than the recorded schema version.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current_version = current_version(pool).await?;
    info!(current_version, target_version = SCHEMA_VERSION, "checking database migrations");

    for version in (current_version + 1)..=SCHEMA_VERSION {
        run_migration(pool, version).await?;
    }

    Ok(())
}

async fn current_version(pool: &SqlitePool) -> Result<i32, sqlx::Error> {
    let row = sqlx::query("SELECT MAX(version) AS version FROM _migrations")
        .fetch_optional(pool)
        .await?;

    Ok(row
        .and_then(|row| row.try_get::<Option<i32>, _>("version").ok().flatten())
        .unwrap_or(0))
}

async fn run_migration(pool: &SqlitePool, version: i32) -> Result<(), sqlx::Error> {
    let (name, sql) = match version {
        1 => ("initial_schema", MIGRATION_V1),
        2 => ("listing_indexes", MIGRATION_V2),
        _ => {
            warn!(version, "unknown migration version");
            return Ok(());
        }
    };

    info!(version, name, "applying migration");

    let mut tx = pool.begin().await?;
    for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement.trim()).execute(&mut *tx).await?;
    }
    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(version)
        .bind(name)
        .execute(&mut *tx)
        .await?;
    tx.commit().await
}

/// Migration v1: agents, petitions and their generation records.
const MIGRATION_V1: &str = r#"
CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    model_id TEXT NOT NULL,
    role TEXT NOT NULL,
    specialty TEXT NOT NULL,
    prompt_template TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_agents_role_specialty ON agents(role, specialty);

CREATE TABLE IF NOT EXISTS petitions (
    id TEXT PRIMARY KEY,
    petition_type TEXT NOT NULL,
    client_id TEXT,
    client_name TEXT,
    request TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    final_text TEXT,
    failure_stage TEXT,
    failure_message TEXT,
    output_template TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS generation_records (
    id TEXT PRIMARY KEY,
    petition_id TEXT NOT NULL REFERENCES petitions(id) ON DELETE CASCADE,
    sequence INTEGER NOT NULL,
    stage TEXT NOT NULL,
    agent_id TEXT,
    model_id TEXT,
    input TEXT NOT NULL,
    output TEXT,
    error TEXT,
    succeeded INTEGER NOT NULL,
    duration_ms INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (petition_id, sequence)
)
"#;

/// Migration v2: indexes backing the petition listing filters.
const MIGRATION_V2: &str = r#"
CREATE INDEX IF NOT EXISTS idx_petitions_client ON petitions(client_id);
CREATE INDEX IF NOT EXISTS idx_petitions_type ON petitions(petition_type);
CREATE INDEX IF NOT EXISTS idx_petitions_status ON petitions(status);
CREATE INDEX IF NOT EXISTS idx_petitions_created ON petitions(created_at DESC)
"#;
