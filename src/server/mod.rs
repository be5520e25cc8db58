//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state management

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::pipeline::Orchestrator;
use crate::stages::{AlertStage, DemandStage, InventoryStage, RoutingStage, VendorStage};
use crate::state::WorkflowState;
use crate::storage::SqliteStorage;

/// Application state shared across handlers.
///
/// Contains all stage handlers, the orchestrator, and shared resources
/// needed for processing tool calls.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend.
    pub storage: SqliteStorage,
    /// Reference data for products, warehouses, and suppliers.
    pub catalog: Arc<Catalog>,
    /// Demand forecasting stage handler.
    pub demand_stage: DemandStage,
    /// Inventory optimization stage handler.
    pub inventory_stage: InventoryStage,
    /// Vendor negotiation stage handler.
    pub vendor_stage: VendorStage,
    /// Route planning stage handler.
    pub routing_stage: RoutingStage,
    /// Alert dispatch stage handler.
    pub alert_stage: AlertStage,
    /// Fixed five-stage pipeline executor.
    pub orchestrator: Orchestrator,
    /// In-memory workflow state per run, keyed by run ID.
    ///
    /// Created lazily on the first tool call that touches a run; the
    /// persisted trace in storage is the durable record.
    pub workflows: Mutex<HashMap<String, WorkflowState>>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, storage: SqliteStorage) -> Self {
        let catalog = Arc::new(Catalog::builtin());

        let demand_stage = DemandStage::new(catalog.clone(), storage.clone());
        let inventory_stage =
            InventoryStage::new(catalog.clone(), storage.clone(), config.costs.clone());
        let vendor_stage = VendorStage::new(catalog.clone(), storage.clone());
        let routing_stage =
            RoutingStage::new(catalog.clone(), storage.clone(), config.costs.clone());
        let alert_stage = AlertStage::new(catalog.clone(), storage.clone());
        let orchestrator = Orchestrator::new(catalog.clone(), storage.clone(), &config);

        Self {
            config,
            storage,
            catalog,
            demand_stage,
            inventory_stage,
            vendor_stage,
            routing_stage,
            alert_stage,
            orchestrator,
            workflows: Mutex::new(HashMap::new()),
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
