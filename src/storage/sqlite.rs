use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use super::{Run, Storage, TraceEntry};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::state::PipelinePhase;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory instance for tests.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_run(&self, run: &Run) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO runs (id, product_sku, region, event_type, phase, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(&run.product_sku)
        .bind(&run.region)
        .bind(&run.event_type)
        .bind(run.phase.to_string())
        .bind(run.created_at.to_rfc3339())
        .bind(run.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_run(&self, id: &str) -> StorageResult<Option<Run>> {
        let row: Option<RunRow> = sqlx::query_as(
            r#"
            SELECT id, product_sku, region, event_type, phase, created_at, updated_at
            FROM runs
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn update_run(&self, run: &Run) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET product_sku = ?, region = ?, event_type = ?, phase = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&run.product_sku)
        .bind(&run.region)
        .bind(&run.event_type)
        .bind(run.phase.to_string())
        .bind(run.updated_at.to_rfc3339())
        .bind(&run.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::RunNotFound {
                run_id: run.id.clone(),
            });
        }

        Ok(())
    }

    async fn get_or_create_run(&self, id: &Option<String>) -> StorageResult<Run> {
        if let Some(id) = id {
            if let Some(existing) = self.get_run(id).await? {
                return Ok(existing);
            }
            let run = Run::with_id(id);
            self.create_run(&run).await?;
            return Ok(run);
        }

        let run = Run::new();
        self.create_run(&run).await?;
        Ok(run)
    }

    async fn list_runs(&self, limit: i64) -> StorageResult<Vec<Run>> {
        let rows: Vec<RunRow> = sqlx::query_as(
            r#"
            SELECT id, product_sku, region, event_type, phase, created_at, updated_at
            FROM runs
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn append_trace(&self, entry: &TraceEntry) -> StorageResult<()> {
        let input = serde_json::to_string(&entry.input).unwrap_or_default();
        let output = entry
            .output
            .as_ref()
            .map(|o| serde_json::to_string(o).unwrap_or_default());

        sqlx::query(
            r#"
            INSERT INTO trace_entries (id, run_id, stage, tool_name, input, output, latency_ms, success, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.run_id)
        .bind(&entry.stage)
        .bind(&entry.tool_name)
        .bind(&input)
        .bind(&output)
        .bind(entry.latency_ms)
        .bind(entry.success)
        .bind(&entry.error)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_run_trace(&self, run_id: &str) -> StorageResult<Vec<TraceEntry>> {
        let rows: Vec<TraceEntryRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, stage, tool_name, input, output, latency_ms, success, error, created_at
            FROM trace_entries
            WHERE run_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    product_sku: Option<String>,
    region: Option<String>,
    event_type: Option<String>,
    phase: String,
    created_at: String,
    updated_at: String,
}

fn parse_timestamp(s: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

fn parse_phase(s: &str) -> PipelinePhase {
    match s {
        "demand_done" => PipelinePhase::DemandDone,
        "inventory_done" => PipelinePhase::InventoryDone,
        "vendor_done" => PipelinePhase::VendorDone,
        "vendor_skipped" => PipelinePhase::VendorSkipped,
        "routing_done" => PipelinePhase::RoutingDone,
        "routing_skipped" => PipelinePhase::RoutingSkipped,
        "alert_done" => PipelinePhase::AlertDone,
        "complete" => PipelinePhase::Complete,
        _ => PipelinePhase::Idle,
    }
}

impl From<RunRow> for Run {
    fn from(row: RunRow) -> Self {
        Self {
            id: row.id,
            product_sku: row.product_sku,
            region: row.region,
            event_type: row.event_type,
            phase: parse_phase(&row.phase),
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct TraceEntryRow {
    id: String,
    run_id: String,
    stage: String,
    tool_name: String,
    input: String,
    output: Option<String>,
    latency_ms: Option<i64>,
    success: bool,
    error: Option<String>,
    created_at: String,
}

impl From<TraceEntryRow> for TraceEntry {
    fn from(row: TraceEntryRow) -> Self {
        Self {
            id: row.id,
            run_id: row.run_id,
            stage: row.stage,
            tool_name: row.tool_name,
            input: serde_json::from_str(&row.input).unwrap_or_default(),
            output: row.output.and_then(|s| serde_json::from_str(&s).ok()),
            latency_ms: row.latency_ms,
            success: row.success,
            error: row.error,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn storage() -> SqliteStorage {
        SqliteStorage::new_in_memory()
            .await
            .expect("in-memory storage")
    }

    #[tokio::test]
    async fn test_create_and_get_run() {
        let storage = storage().await;
        let run = Run::new();
        storage.create_run(&run).await.unwrap();

        let fetched = storage.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, run.id);
        assert_eq!(fetched.phase, PipelinePhase::Idle);
    }

    #[tokio::test]
    async fn test_get_or_create_run_is_lazy() {
        let storage = storage().await;

        let run = storage
            .get_or_create_run(&Some("run-lazy".to_string()))
            .await
            .unwrap();
        assert_eq!(run.id, "run-lazy");

        // Second call returns the same run rather than failing
        let again = storage
            .get_or_create_run(&Some("run-lazy".to_string()))
            .await
            .unwrap();
        assert_eq!(again.id, run.id);
        assert_eq!(again.created_at, run.created_at);
    }

    #[tokio::test]
    async fn test_get_or_create_run_without_id() {
        let storage = storage().await;
        let a = storage.get_or_create_run(&None).await.unwrap();
        let b = storage.get_or_create_run(&None).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_update_run_phase() {
        let storage = storage().await;
        let mut run = Run::new();
        storage.create_run(&run).await.unwrap();

        run.product_sku = Some("RC-FULL-NVY-M".to_string());
        run.phase = PipelinePhase::DemandDone;
        storage.update_run(&run).await.unwrap();

        let fetched = storage.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(fetched.phase, PipelinePhase::DemandDone);
        assert_eq!(fetched.product_sku.as_deref(), Some("RC-FULL-NVY-M"));
    }

    #[tokio::test]
    async fn test_update_missing_run_fails() {
        let storage = storage().await;
        let run = Run::new();
        let err = storage.update_run(&run).await.unwrap_err();
        assert!(matches!(err, StorageError::RunNotFound { .. }));
    }

    #[tokio::test]
    async fn test_trace_preserves_invocation_order() {
        let storage = storage().await;
        let run = Run::new();
        storage.create_run(&run).await.unwrap();

        for (stage, tool) in [
            ("demand", "supply_forecast_demand"),
            ("inventory", "supply_optimize_inventory"),
            ("alert", "supply_send_alerts"),
        ] {
            let entry = TraceEntry::new(&run.id, stage, tool, json!({}))
                .success(json!({"ok": true}), 1);
            storage.append_trace(&entry).await.unwrap();
        }

        let trace = storage.get_run_trace(&run.id).await.unwrap();
        let stages: Vec<&str> = trace.iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(stages, vec!["demand", "inventory", "alert"]);
    }

    #[tokio::test]
    async fn test_trace_records_failures() {
        let storage = storage().await;
        let run = Run::new();
        storage.create_run(&run).await.unwrap();

        let entry = TraceEntry::new(
            &run.id,
            "inventory",
            "supply_optimize_inventory",
            json!({"region": "Pune"}),
        )
        .failure("No warehouse mapped for region: Pune", 2);
        storage.append_trace(&entry).await.unwrap();

        let trace = storage.get_run_trace(&run.id).await.unwrap();
        assert_eq!(trace.len(), 1);
        assert!(!trace[0].success);
        assert!(trace[0].error.as_deref().unwrap().contains("Pune"));
    }
}
