//! SQLite implementation of both persistence ports, via `sqlx`.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    Agent, AgentFilter, AgentId, AgentRepository, GenerationRecord, Petition, PetitionFilter,
    PetitionId, PetitionStatus, PetitionStore, PetitionSummary, StoreError,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::migrations;
use crate::rows::{AgentRow, PetitionRow, RecordRow, SummaryRow};

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend {
        message: err.to_string(),
    }
}

/// Agents and petitions in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and migrates it.
    ///
    /// `sqlite::memory:` gives a private in-memory database that lives as long
    /// as the store.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(backend)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        // Every connection to `:memory:` is a separate database, so pin one.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5).min_connections(1)
        };

        let pool = pool_options.connect_with(options).await.map_err(backend)?;
        let store = Self::from_pool(pool);
        store.migrate().await?;
        tracing::info!(url, "petition database ready");
        Ok(store)
    }

    /// Wraps an existing pool. Call [`migrate`](Self::migrate) before use.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        migrations::run_migrations(&self.pool).await.map_err(backend)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert_record(
        conn: &mut SqliteConnection,
        record: &GenerationRecord,
    ) -> Result<(), sqlx::Error> {
        let row = RecordRow::from_record(record);
        sqlx::query(
            r#"
            INSERT INTO generation_records (id, petition_id, sequence, stage, agent_id,
                model_id, input, output, error, succeeded, duration_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&row.id)
        .bind(&row.petition_id)
        .bind(row.sequence)
        .bind(&row.stage)
        .bind(&row.agent_id)
        .bind(&row.model_id)
        .bind(&row.input)
        .bind(&row.output)
        .bind(&row.error)
        .bind(row.succeeded)
        .bind(row.duration_ms)
        .bind(&row.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn stored_status(
        conn: &mut SqliteConnection,
        id: PetitionId,
    ) -> Result<Option<PetitionStatus>, StoreError> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM petitions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(conn)
            .await
            .map_err(backend)?;
        status
            .map(|s| {
                s.parse::<PetitionStatus>().map_err(|e| StoreError::Corrupt {
                    message: format!("petition status: {e}"),
                })
            })
            .transpose()
    }
}

// ============================================================================
// Agent repository
// ============================================================================

#[async_trait]
impl AgentRepository for SqliteStore {
    async fn add(&self, agent: Agent) -> Result<AgentId, StoreError> {
        let row = AgentRow::from_agent(&agent);
        sqlx::query(
            r#"
            INSERT INTO agents (id, name, description, model_id, role, specialty,
                prompt_template, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.description)
        .bind(&row.model_id)
        .bind(&row.role)
        .bind(&row.specialty)
        .bind(&row.prompt_template)
        .bind(&row.created_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(agent.id)
    }

    async fn get(&self, id: AgentId) -> Result<Option<Arc<Agent>>, StoreError> {
        let row = sqlx::query_as::<_, AgentRow>("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| r.into_agent().map(Arc::new)).transpose()
    }

    async fn list(&self, filter: &AgentFilter) -> Result<Vec<Arc<Agent>>, StoreError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM agents WHERE 1 = 1");
        if let Some(role) = filter.role {
            query.push(" AND role = ").push_bind(role.as_str());
        }
        if let Some(specialty) = &filter.specialty {
            query.push(" AND specialty = ").push_bind(specialty.as_str().to_string());
        }
        query.push(" ORDER BY created_at ASC, rowid ASC");

        let rows = query
            .build_query_as::<AgentRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.into_iter()
            .map(|r| r.into_agent().map(Arc::new))
            .collect()
    }
}

// ============================================================================
// Petition store
// ============================================================================

#[async_trait]
impl PetitionStore for SqliteStore {
    async fn save(&self, petition: &Petition) -> Result<(), StoreError> {
        let row = PetitionRow::from_petition(petition)?;
        let mut tx = self.pool.begin().await.map_err(backend)?;

        match Self::stored_status(&mut *tx, petition.id).await? {
            Some(status) if status.is_terminal() => {
                return Err(StoreError::TerminalState {
                    id: petition.id,
                    status,
                })
            }
            Some(_) => {
                sqlx::query(
                    r#"
                    UPDATE petitions
                    SET status = ?, final_text = ?, failure_stage = ?, failure_message = ?,
                        output_template = ?, updated_at = ?
                    WHERE id = ? AND status = 'pending'
                    "#,
                )
                .bind(&row.status)
                .bind(&row.final_text)
                .bind(&row.failure_stage)
                .bind(&row.failure_message)
                .bind(&row.output_template)
                .bind(&row.updated_at)
                .bind(&row.id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO petitions (id, petition_type, client_id, client_name, request,
                        status, final_text, failure_stage, failure_message, output_template,
                        created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&row.id)
                .bind(&row.petition_type)
                .bind(&row.client_id)
                .bind(&row.client_name)
                .bind(&row.request)
                .bind(&row.status)
                .bind(&row.final_text)
                .bind(&row.failure_stage)
                .bind(&row.failure_message)
                .bind(&row.output_template)
                .bind(&row.created_at)
                .bind(&row.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            }
        }

        for record in &petition.records {
            Self::insert_record(&mut *tx, record).await.map_err(backend)?;
        }

        tx.commit().await.map_err(backend)
    }

    async fn append_record(&self, record: &GenerationRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        match Self::stored_status(&mut *tx, record.petition_id).await? {
            None => {
                return Err(StoreError::UnknownPetition {
                    id: record.petition_id,
                })
            }
            Some(status) if status.is_terminal() => {
                return Err(StoreError::TerminalState {
                    id: record.petition_id,
                    status,
                })
            }
            Some(_) => {}
        }
        Self::insert_record(&mut *tx, record).await.map_err(backend)?;
        tx.commit().await.map_err(backend)
    }

    async fn get(&self, id: PetitionId) -> Result<Option<Petition>, StoreError> {
        let Some(row) = sqlx::query_as::<_, PetitionRow>("SELECT * FROM petitions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
        else {
            return Ok(None);
        };

        let records = sqlx::query_as::<_, RecordRow>(
            "SELECT * FROM generation_records WHERE petition_id = ? ORDER BY sequence ASC",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?
        .into_iter()
        .map(RecordRow::into_record)
        .collect::<Result<Vec<_>, _>>()?;

        row.into_petition(records).map(Some)
    }

    async fn list(&self, filter: &PetitionFilter) -> Result<Vec<PetitionSummary>, StoreError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, petition_type, client_id, client_name, status, created_at, updated_at \
             FROM petitions WHERE 1 = 1",
        );
        if let Some(client) = &filter.client_id {
            query.push(" AND client_id = ").push_bind(client.as_str().to_string());
        }
        if let Some(petition_type) = &filter.petition_type {
            query
                .push(" AND petition_type = ")
                .push_bind(petition_type.as_str().to_string());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created_at DESC, rowid DESC");

        query
            .build_query_as::<SummaryRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(SummaryRow::into_summary)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();

        let version: Option<i32> = sqlx::query_scalar("SELECT MAX(version) FROM _migrations")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(version, Some(2));
    }
}
