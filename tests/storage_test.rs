//! Integration tests for SQLite storage layer
//!
//! Tests run and trace persistence using an in-memory SQLite database,
//! plus an on-disk round trip through a temporary directory.

use chrono::Utc;
use serde_json::json;

use mcp_supplyflow::config::DatabaseConfig;
use mcp_supplyflow::state::PipelinePhase;
use mcp_supplyflow::storage::{Run, SqliteStorage, Storage, TraceEntry};

/// Create an in-memory storage instance for testing
async fn create_test_storage() -> SqliteStorage {
    SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage")
}

#[cfg(test)]
mod run_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_run() {
        let storage = create_test_storage().await;

        let run = Run::new();
        storage.create_run(&run).await.unwrap();

        let retrieved = storage.get_run(&run.id).await.unwrap();
        assert!(retrieved.is_some(), "Run should exist");
        let retrieved = retrieved.unwrap();
        assert_eq!(retrieved.id, run.id);
        assert_eq!(retrieved.phase, PipelinePhase::Idle);
        assert!(retrieved.product_sku.is_none());
    }

    #[tokio::test]
    async fn test_get_nonexistent_run() {
        let storage = create_test_storage().await;
        let result = storage.get_run("nonexistent-id").await.unwrap();
        assert!(result.is_none(), "Should return None for nonexistent run");
    }

    #[tokio::test]
    async fn test_update_run() {
        let storage = create_test_storage().await;

        let mut run = Run::new();
        storage.create_run(&run).await.unwrap();

        run.product_sku = Some("RC-FULL-NVY-M".to_string());
        run.region = Some("Mumbai".to_string());
        run.phase = PipelinePhase::DemandDone;
        run.updated_at = Utc::now();
        storage.update_run(&run).await.unwrap();

        let retrieved = storage.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(retrieved.product_sku.as_deref(), Some("RC-FULL-NVY-M"));
        assert_eq!(retrieved.phase, PipelinePhase::DemandDone);
    }

    #[tokio::test]
    async fn test_get_or_create_run_creates_lazily() {
        let storage = create_test_storage().await;

        // Unknown ID materializes a run under that ID
        let id = "client-chosen-id".to_string();
        let run = storage.get_or_create_run(&Some(id.clone())).await.unwrap();
        assert_eq!(run.id, id);

        // Second resolution returns the same run
        let again = storage.get_or_create_run(&Some(id.clone())).await.unwrap();
        assert_eq!(again.created_at, run.created_at);

        // None always creates a fresh run
        let fresh = storage.get_or_create_run(&None).await.unwrap();
        assert_ne!(fresh.id, id);
    }

    #[tokio::test]
    async fn test_list_runs_most_recent_first() {
        let storage = create_test_storage().await;

        let first = storage.get_or_create_run(&None).await.unwrap();
        let second = storage.get_or_create_run(&None).await.unwrap();

        let runs = storage.list_runs(10).await.unwrap();
        assert_eq!(runs.len(), 2);
        // Both runs present; recency ordering by created_at
        assert!(runs.iter().any(|r| r.id == first.id));
        assert_eq!(runs[0].id, second.id);
    }
}

#[cfg(test)]
mod trace_tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_fetch_trace_in_order() {
        let storage = create_test_storage().await;
        let run = storage.get_or_create_run(&None).await.unwrap();

        for (stage, tool) in [
            ("demand", "supply_forecast_demand"),
            ("inventory", "supply_optimize_inventory"),
            ("alert", "supply_send_alerts"),
        ] {
            let entry = TraceEntry::new(&run.id, stage, tool, json!({"step": stage}))
                .success(json!({"ok": true}), 3);
            storage.append_trace(&entry).await.unwrap();
        }

        let trace = storage.get_run_trace(&run.id).await.unwrap();
        let stages: Vec<&str> = trace.iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(stages, vec!["demand", "inventory", "alert"]);
        assert!(trace.iter().all(|e| e.success));
    }

    #[tokio::test]
    async fn test_failure_entry_round_trip() {
        let storage = create_test_storage().await;
        let run = storage.get_or_create_run(&None).await.unwrap();

        let entry = TraceEntry::new(
            &run.id,
            "demand",
            "supply_forecast_demand",
            json!({"product_sku": "NO-SUCH-SKU"}),
        )
        .failure("Product not found: NO-SUCH-SKU", 1);
        storage.append_trace(&entry).await.unwrap();

        let trace = storage.get_run_trace(&run.id).await.unwrap();
        assert_eq!(trace.len(), 1);
        assert!(!trace[0].success);
        assert_eq!(
            trace[0].error.as_deref(),
            Some("Product not found: NO-SUCH-SKU")
        );
        assert!(trace[0].output.is_none());
    }

    #[tokio::test]
    async fn test_traces_are_isolated_per_run() {
        let storage = create_test_storage().await;
        let run_a = storage.get_or_create_run(&None).await.unwrap();
        let run_b = storage.get_or_create_run(&None).await.unwrap();

        let entry = TraceEntry::new(&run_a.id, "demand", "supply_forecast_demand", json!({}))
            .success(json!({}), 2);
        storage.append_trace(&entry).await.unwrap();

        assert_eq!(storage.get_run_trace(&run_a.id).await.unwrap().len(), 1);
        assert!(storage.get_run_trace(&run_b.id).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_on_disk_database_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("supplyflow.db"),
        max_connections: 2,
    };

    let run_id;
    {
        let storage = SqliteStorage::new(&config).await.unwrap();
        let run = storage.get_or_create_run(&None).await.unwrap();
        run_id = run.id.clone();
        let entry = TraceEntry::new(&run.id, "demand", "supply_forecast_demand", json!({}))
            .success(json!({"peak_demand": 96}), 4);
        storage.append_trace(&entry).await.unwrap();
    }

    // Reopen and verify persistence
    let storage = SqliteStorage::new(&config).await.unwrap();
    let run = storage.get_run(&run_id).await.unwrap();
    assert!(run.is_some());
    let trace = storage.get_run_trace(&run_id).await.unwrap();
    assert_eq!(trace.len(), 1);
    assert_eq!(trace[0].output.as_ref().unwrap()["peak_demand"], 96);
}
