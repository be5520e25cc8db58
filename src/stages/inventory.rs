//! Inventory optimization stage.
//!
//! Compares forecasted demand against the target warehouse's stock, plans
//! greedy inter-warehouse transfers to close the gap, and sizes an external
//! reorder for whatever the network cannot cover. Plans against the fixed
//! stock snapshot; warehouse stock is never mutated.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{serialize_for_trace, StageCore};
use crate::catalog::Catalog;
use crate::config::CostConfig;
use crate::error::{AppResult, ToolError};
use crate::state::{InventoryAction, InventoryPlan, TransferOrder, WorkflowState};
use crate::storage::{Run, SqliteStorage, TraceEntry};

/// Stage name used in trace entries.
pub const INVENTORY_STAGE: &str = "inventory";
/// Tool name for optimization.
pub const OPTIMIZE_TOOL: &str = "supply_optimize_inventory";
/// Tool name for the warehouse overview.
pub const WAREHOUSE_STATUS_TOOL: &str = "supply_warehouse_status";
/// Tool name for the product listing.
pub const LIST_PRODUCTS_TOOL: &str = "supply_list_products";

/// Share of its own stock a source warehouse always keeps.
const HOLDBACK_RATIO: f64 = 0.3;
/// Safety buffer added on top of the residual shortfall.
const SAFETY_BUFFER_RATIO: f64 = 0.2;
/// Assumed truck speed for transfer transit estimates.
const TRANSFER_SPEED_KMH: i64 = 60;

/// Input parameters for inventory optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeParams {
    /// Product SKU to optimize.
    pub product_sku: String,
    /// Target region (Mumbai, Delhi, Bangalore, Chennai, Kolkata).
    pub region: String,
    /// Units of demand to cover.
    pub forecasted_demand: i64,
    /// Optional run ID (creates a new run if not provided).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// One warehouse in the network overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseStatus {
    pub id: String,
    pub name: String,
    pub location: String,
    pub capacity: i64,
    /// Total units across all SKUs.
    pub current_stock: i64,
    /// Utilization percentage, one decimal.
    pub utilization_percent: f64,
    /// "healthy" below 80% utilization, "near_capacity" at or above.
    pub status: String,
}

/// Network-wide warehouse overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseStatusReport {
    pub warehouses: Vec<WarehouseStatus>,
}

/// Inventory optimization stage handler.
#[derive(Clone)]
pub struct InventoryStage {
    core: StageCore,
    costs: CostConfig,
}

impl InventoryStage {
    /// Create a new inventory stage.
    pub fn new(catalog: Arc<Catalog>, storage: SqliteStorage, costs: CostConfig) -> Self {
        Self {
            core: StageCore::new(catalog, storage),
            costs,
        }
    }

    /// Close the gap between forecasted demand and stock at the target region.
    pub async fn optimize(
        &self,
        run: &mut Run,
        state: &mut WorkflowState,
        params: &OptimizeParams,
    ) -> AppResult<InventoryPlan> {
        let start = Instant::now();
        debug!(
            run_id = %run.id,
            sku = %params.product_sku,
            region = %params.region,
            demand = params.forecasted_demand,
            "Optimizing inventory"
        );

        let entry = TraceEntry::new(
            &run.id,
            INVENTORY_STAGE,
            OPTIMIZE_TOOL,
            serialize_for_trace(params, "optimize input"),
        );

        let plan = match self.compute(params) {
            Ok(plan) => plan,
            Err(e) => {
                let latency = start.elapsed().as_millis() as i64;
                self.core
                    .commit_failure(run, state, entry.failure(e.to_string(), latency))
                    .await?;
                return Err(e);
            }
        };

        let latency = start.elapsed().as_millis() as i64;
        let entry = entry.success(serialize_for_trace(&plan, "optimize output"), latency);
        let summary = match plan.action {
            InventoryAction::NoneNeeded => {
                format!("stock sufficient, surplus {} units", plan.surplus)
            }
            InventoryAction::Rebalance => format!(
                "{} units via {} transfers, reorder {} units",
                plan.total_transferable,
                plan.transfers.len(),
                plan.reorder_quantity
            ),
        };

        state.set_inventory(plan.clone());
        self.core.commit(run, state, entry, summary).await?;

        info!(
            run_id = %run.id,
            sku = %params.product_sku,
            gap = plan.gap,
            transfers = plan.transfers.len(),
            reorder_needed = plan.reorder_needed,
            latency_ms = latency,
            "Inventory optimization completed"
        );

        Ok(plan)
    }

    fn compute(&self, params: &OptimizeParams) -> AppResult<InventoryPlan> {
        if params.product_sku.trim().is_empty() {
            return Err(ToolError::Validation {
                field: "product_sku".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        if params.forecasted_demand < 0 {
            return Err(ToolError::Validation {
                field: "forecasted_demand".to_string(),
                reason: "must not be negative".to_string(),
            }
            .into());
        }

        let catalog = self.core.catalog();
        let target = catalog.warehouse_for_region(&params.region)?;
        let current_stock = catalog.stock_of(&target.id, &params.product_sku);
        let gap = params.forecasted_demand - current_stock;
        let now = Utc::now();

        if gap <= 0 {
            return Ok(InventoryPlan {
                product_sku: params.product_sku.clone(),
                target_region: params.region.clone(),
                target_warehouse: target.name.clone(),
                action: InventoryAction::NoneNeeded,
                current_stock,
                forecasted_demand: params.forecasted_demand,
                gap,
                surplus: -gap,
                transfers: Vec::new(),
                total_transferable: 0,
                reorder_needed: false,
                reorder_quantity: 0,
                safety_buffer: 0,
                estimated_cost_transfers: 0,
                timestamp: now,
            });
        }

        let transfers = self.plan_transfers(&params.product_sku, &target.id, gap);
        let total_transferable: i64 = transfers.iter().map(|t| t.quantity).sum();
        let estimated_cost_transfers: i64 = transfers.iter().map(|t| t.estimated_cost).sum();

        let residual = gap - total_transferable;
        let reorder_needed = residual > 0;
        let safety_buffer = (gap as f64 * SAFETY_BUFFER_RATIO) as i64;
        let reorder_quantity = if reorder_needed {
            residual + safety_buffer
        } else {
            0
        };

        Ok(InventoryPlan {
            product_sku: params.product_sku.clone(),
            target_region: params.region.clone(),
            target_warehouse: target.name.clone(),
            action: InventoryAction::Rebalance,
            current_stock,
            forecasted_demand: params.forecasted_demand,
            gap,
            surplus: 0,
            transfers,
            total_transferable,
            reorder_needed,
            reorder_quantity,
            safety_buffer,
            estimated_cost_transfers,
            timestamp: now,
        })
    }

    /// Greedy first-fit over catalog warehouse order, holding back 30% of
    /// each source's own stock.
    fn plan_transfers(&self, sku: &str, target_id: &str, needed: i64) -> Vec<TransferOrder> {
        let catalog = self.core.catalog();
        let mut transfers = Vec::new();
        let mut remaining = needed;

        for warehouse in catalog.warehouses() {
            if warehouse.id == target_id || remaining <= 0 {
                continue;
            }

            let stock = catalog.stock_of(&warehouse.id, sku);
            let holdback = (stock as f64 * HOLDBACK_RATIO) as i64;
            let available = (stock - holdback).max(0);
            let quantity = available.min(remaining);
            if quantity <= 0 {
                continue;
            }

            let distance = catalog.distance_km(&warehouse.id, target_id);
            transfers.push(TransferOrder {
                from_warehouse: warehouse.name.clone(),
                from_warehouse_id: warehouse.id.clone(),
                quantity,
                distance_km: distance,
                estimated_cost: distance * self.costs.transfer_cost_per_km
                    + quantity * self.costs.transfer_handling_per_unit,
                transit_time_hours: distance / TRANSFER_SPEED_KMH,
                mode: "truck".to_string(),
            });

            remaining -= quantity;
        }

        transfers
    }

    /// Network-wide warehouse overview. Read-only, but still traced.
    pub async fn warehouse_status(
        &self,
        run: &mut Run,
        state: &mut WorkflowState,
    ) -> AppResult<WarehouseStatusReport> {
        let start = Instant::now();

        let warehouses = self
            .core
            .catalog()
            .warehouses()
            .iter()
            .map(|wh| {
                let current_stock: i64 = wh.stock.values().sum();
                let utilization = (current_stock as f64 / wh.capacity as f64) * 100.0;
                let utilization_percent = (utilization * 10.0).round() / 10.0;
                WarehouseStatus {
                    id: wh.id.clone(),
                    name: wh.name.clone(),
                    location: wh.location.clone(),
                    capacity: wh.capacity,
                    current_stock,
                    utilization_percent,
                    status: if utilization < 80.0 {
                        "healthy".to_string()
                    } else {
                        "near_capacity".to_string()
                    },
                }
            })
            .collect();
        let report = WarehouseStatusReport { warehouses };

        let latency = start.elapsed().as_millis() as i64;
        let entry = TraceEntry::new(
            &run.id,
            INVENTORY_STAGE,
            WAREHOUSE_STATUS_TOOL,
            serde_json::json!({}),
        )
        .success(serialize_for_trace(&report, "warehouse status"), latency);
        let summary = format!("{} warehouses reported", report.warehouses.len());
        self.core.commit(run, state, entry, summary).await?;

        Ok(report)
    }

    /// List every product in the catalog. Read-only, but still traced.
    pub async fn list_products(
        &self,
        run: &mut Run,
        state: &mut WorkflowState,
    ) -> AppResult<Vec<crate::catalog::Product>> {
        let start = Instant::now();

        let products: Vec<_> = self.core.catalog().products().to_vec();

        let latency = start.elapsed().as_millis() as i64;
        let entry = TraceEntry::new(
            &run.id,
            INVENTORY_STAGE,
            LIST_PRODUCTS_TOOL,
            serde_json::json!({}),
        )
        .success(serialize_for_trace(&products, "product listing"), latency);
        let summary = format!("{} products listed", products.len());
        self.core.commit(run, state, entry, summary).await?;

        Ok(products)
    }
}
