//! Core infrastructure shared by all pipeline stages.
//!
//! This module provides the [`StageCore`] struct that centralizes common
//! dependencies (the reference catalog and storage) used across all stage
//! implementations, plus the trace commit helpers every stage goes through.

use std::sync::Arc;

use chrono::Utc;

use crate::catalog::Catalog;
use crate::error::AppResult;
use crate::state::{TraceRecord, WorkflowState};
use crate::storage::{Run, SqliteStorage, Storage, TraceEntry};

/// Core infrastructure shared by all pipeline stages.
///
/// Contains the injected read-only catalog and the storage backend used
/// for persisting the execution trace. This struct is composed into each
/// stage to avoid duplicating these common fields.
#[derive(Clone)]
pub struct StageCore {
    /// Read-only reference data for the supply network.
    catalog: Arc<Catalog>,
    /// Storage backend for runs and trace entries.
    storage: SqliteStorage,
}

impl StageCore {
    /// Create a new stage core with the given catalog and storage.
    pub fn new(catalog: Arc<Catalog>, storage: SqliteStorage) -> Self {
        Self { catalog, storage }
    }

    /// Get a reference to the catalog.
    #[inline]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get a reference to the storage backend.
    #[inline]
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Commit a successful stage invocation.
    ///
    /// Appends the persisted trace entry, mirrors it into the in-memory
    /// trace, and syncs the run row with the state. The caller must have
    /// already written its section into the state.
    pub(crate) async fn commit(
        &self,
        run: &mut Run,
        state: &mut WorkflowState,
        entry: TraceEntry,
        summary: impl Into<String>,
    ) -> AppResult<()> {
        state.push_trace(TraceRecord {
            stage: entry.stage.clone(),
            tool: entry.tool_name.clone(),
            success: true,
            summary: summary.into(),
            timestamp: entry.created_at,
        });
        self.storage.append_trace(&entry).await?;

        run.product_sku = state.product_sku.clone();
        run.region = state.region.clone();
        run.event_type = state.event_type.clone();
        run.phase = state.phase;
        run.updated_at = Utc::now();
        self.storage.update_run(run).await?;

        Ok(())
    }

    /// Commit a failed stage invocation.
    ///
    /// The failure is traced but no section of the state changes.
    pub(crate) async fn commit_failure(
        &self,
        run: &mut Run,
        state: &mut WorkflowState,
        entry: TraceEntry,
    ) -> AppResult<()> {
        state.push_trace(TraceRecord {
            stage: entry.stage.clone(),
            tool: entry.tool_name.clone(),
            success: false,
            summary: entry.error.clone().unwrap_or_default(),
            timestamp: entry.created_at,
        });
        self.storage.append_trace(&entry).await?;

        run.updated_at = Utc::now();
        self.storage.update_run(run).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_storage() -> SqliteStorage {
        SqliteStorage::new_in_memory()
            .await
            .expect("Failed to create in-memory storage")
    }

    #[test]
    fn test_stage_core_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<StageCore>();
    }

    #[tokio::test]
    async fn test_stage_core_accessors() {
        let storage = create_test_storage().await;
        let core = StageCore::new(Arc::new(Catalog::builtin()), storage);

        assert_eq!(core.catalog().warehouses().len(), 5);
        let _pool = core.storage().pool();
    }

    #[tokio::test]
    async fn test_commit_mirrors_trace_and_syncs_run() {
        let storage = create_test_storage().await;
        let core = StageCore::new(Arc::new(Catalog::builtin()), storage.clone());

        let mut run = Run::new();
        storage.create_run(&run).await.unwrap();
        let mut state = WorkflowState::new();

        let entry = TraceEntry::new(
            &run.id,
            "demand",
            "supply_forecast_demand",
            serde_json::json!({}),
        )
        .success(serde_json::json!({"peak_demand": 96}), 5);

        core.commit(&mut run, &mut state, entry, "forecast recorded")
            .await
            .unwrap();

        assert_eq!(state.execution_trace.len(), 1);
        assert!(state.execution_trace[0].success);

        let persisted = storage.get_run_trace(&run.id).await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].stage, "demand");
    }
}
