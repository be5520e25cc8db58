//! Storage layer for pipeline run persistence.
//!
//! A run groups all stage invocations for one workflow; the trace is the
//! append-only record of those invocations and the only state that survives
//! the process. Everything else (the in-memory WorkflowState) can be
//! reconstructed or discarded.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::state::PipelinePhase;

/// A persisted pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique run identifier.
    pub id: String,
    /// SKU the run is about, once the demand stage has set it.
    pub product_sku: Option<String>,
    /// Region the run is about.
    pub region: Option<String>,
    /// Triggering event, if any.
    pub event_type: Option<String>,
    /// Last recorded pipeline phase.
    pub phase: PipelinePhase,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
    /// When the run was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// Create a new run with a fresh id.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            product_sku: None,
            region: None,
            event_type: None,
            phase: PipelinePhase::Idle,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a run with a caller-supplied id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new()
        }
    }
}

impl Default for Run {
    fn default() -> Self {
        Self::new()
    }
}

/// One persisted trace entry, recording a single stage invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Unique entry identifier.
    pub id: String,
    /// Parent run.
    pub run_id: String,
    /// Stage that ran ("demand", "inventory", "vendor", "routing", "alert").
    pub stage: String,
    /// MCP tool name that triggered the stage.
    pub tool_name: String,
    /// Input parameters as JSON.
    pub input: serde_json::Value,
    /// Output result as JSON (if successful).
    pub output: Option<serde_json::Value>,
    /// Latency in milliseconds.
    pub latency_ms: Option<i64>,
    /// Whether the invocation succeeded.
    pub success: bool,
    /// Error message (if failed).
    pub error: Option<String>,
    /// When the invocation occurred.
    pub created_at: DateTime<Utc>,
}

impl TraceEntry {
    /// Create a new pending trace entry.
    pub fn new(
        run_id: impl Into<String>,
        stage: impl Into<String>,
        tool_name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            stage: stage.into(),
            tool_name: tool_name.into(),
            input,
            output: None,
            latency_ms: None,
            success: false,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Mark the entry successful with its output and latency.
    pub fn success(mut self, output: serde_json::Value, latency_ms: i64) -> Self {
        self.output = Some(output);
        self.latency_ms = Some(latency_ms);
        self.success = true;
        self.error = None;
        self
    }

    /// Mark the entry failed with the error message and latency.
    pub fn failure(mut self, error: impl Into<String>, latency_ms: i64) -> Self {
        self.error = Some(error.into());
        self.latency_ms = Some(latency_ms);
        self.success = false;
        self
    }
}

/// Storage backend abstraction.
#[async_trait]
pub trait Storage: Send + Sync {
    // Run operations

    /// Create a new run.
    async fn create_run(&self, run: &Run) -> StorageResult<()>;
    /// Get a run by ID.
    async fn get_run(&self, id: &str) -> StorageResult<Option<Run>>;
    /// Update an existing run.
    async fn update_run(&self, run: &Run) -> StorageResult<()>;
    /// Get the run with the given ID, creating it if absent. `None` always
    /// creates a fresh run.
    async fn get_or_create_run(&self, id: &Option<String>) -> StorageResult<Run>;
    /// List runs, most recent first.
    async fn list_runs(&self, limit: i64) -> StorageResult<Vec<Run>>;

    // Trace operations

    /// Append one trace entry. Entries are never updated or deleted.
    async fn append_trace(&self, entry: &TraceEntry) -> StorageResult<()>;
    /// Get a run's full trace in invocation order.
    async fn get_run_trace(&self, run_id: &str) -> StorageResult<Vec<TraceEntry>>;
}
