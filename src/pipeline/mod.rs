//! Pipeline orchestration.
//!
//! Fixed state machine over the five stages: Demand always runs first,
//! Inventory follows on the 7-day total, Vendor runs only when an external
//! reorder is needed, Routing only when there is something to ship, and
//! Alert always closes the run. Skipped stages leave no trace entry. The
//! branching is explicit and data-driven; no stage decides the flow for
//! another.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::AppResult;
use crate::stages::{
    AlertStage, DemandStage, ForecastParams, InventoryStage, NegotiateParams, OptimizeParams,
    PlanRouteParams, RoutingStage, SendAlertsParams, ShipmentRequest, Urgency, VendorStage,
};
use crate::state::{AlertSeverity, PipelinePhase, SourcingStatus, WorkflowState};
use crate::storage::{Run, SqliteStorage, Storage};

/// Input parameters for a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPipelineParams {
    /// Product SKU to manage.
    pub product_sku: String,
    /// Target region.
    pub region: String,
    /// Triggering event: cyclone, monsoon, cold_wave, festival.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Event description used in the stakeholder report; composed from the
    /// event type when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_description: Option<String>,
    /// Sourcing and routing urgency; defaults to high when a spike is
    /// detected, normal otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    /// Budget ceiling passed to vendor negotiation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_limit: Option<i64>,
    /// Region currently under a weather disruption, for routing delays.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disruption_region: Option<String>,
    /// Optional run ID (creates a new run if not provided).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// Result of a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// The run this report belongs to.
    pub run_id: String,
    /// Severity the orchestrator settled on.
    pub severity: AlertSeverity,
    /// Final phase; always `complete` on success.
    pub phase: PipelinePhase,
    /// Stages that actually executed, in order.
    pub stages_run: Vec<String>,
    /// Full workflow state at the end of the run, trace included.
    pub state: WorkflowState,
}

/// The pipeline orchestrator.
#[derive(Clone)]
pub struct Orchestrator {
    demand: DemandStage,
    inventory: InventoryStage,
    vendor: VendorStage,
    routing: RoutingStage,
    alert: AlertStage,
    storage: SqliteStorage,
}

impl Orchestrator {
    /// Create an orchestrator wired to the given catalog and storage.
    pub fn new(catalog: Arc<Catalog>, storage: SqliteStorage, config: &Config) -> Self {
        Self {
            demand: DemandStage::new(catalog.clone(), storage.clone()),
            inventory: InventoryStage::new(
                catalog.clone(),
                storage.clone(),
                config.costs.clone(),
            ),
            vendor: VendorStage::new(catalog.clone(), storage.clone()),
            routing: RoutingStage::new(catalog.clone(), storage.clone(), config.costs.clone()),
            alert: AlertStage::new(catalog, storage.clone()),
            storage,
        }
    }

    /// Access the demand stage.
    pub fn demand(&self) -> &DemandStage {
        &self.demand
    }

    /// Access the inventory stage.
    pub fn inventory(&self) -> &InventoryStage {
        &self.inventory
    }

    /// Access the vendor stage.
    pub fn vendor(&self) -> &VendorStage {
        &self.vendor
    }

    /// Access the routing stage.
    pub fn routing(&self) -> &RoutingStage {
        &self.routing
    }

    /// Access the alert stage.
    pub fn alert(&self) -> &AlertStage {
        &self.alert
    }

    /// Execute the whole five-stage workflow for one product and region.
    pub async fn run_pipeline(
        &self,
        run: &mut Run,
        state: &mut WorkflowState,
        params: &RunPipelineParams,
    ) -> AppResult<PipelineReport> {
        info!(
            run_id = %run.id,
            sku = %params.product_sku,
            region = %params.region,
            event = params.event_type.as_deref().unwrap_or("none"),
            "Starting pipeline run"
        );
        let mut stages_run = Vec::new();

        // Demand always leads
        let forecast = self
            .demand
            .forecast(
                run,
                state,
                &ForecastParams {
                    product_sku: params.product_sku.clone(),
                    region: params.region.clone(),
                    event_type: params.event_type.clone(),
                    run_id: Some(run.id.clone()),
                },
            )
            .await?;
        stages_run.push("demand".to_string());

        let urgency = params.urgency.unwrap_or(if forecast.spike_detected {
            Urgency::High
        } else {
            Urgency::Normal
        });

        // Inventory covers the whole horizon, not just the peak day
        let plan = self
            .inventory
            .optimize(
                run,
                state,
                &OptimizeParams {
                    product_sku: params.product_sku.clone(),
                    region: params.region.clone(),
                    forecasted_demand: forecast.total_7day_demand,
                    run_id: Some(run.id.clone()),
                },
            )
            .await?;
        stages_run.push("inventory".to_string());

        // Vendor only when the network cannot cover the gap
        let vendor_outcome = if plan.reorder_needed {
            let outcome = self
                .vendor
                .negotiate(
                    run,
                    state,
                    &NegotiateParams {
                        product_sku: params.product_sku.clone(),
                        quantity: plan.reorder_quantity,
                        urgency,
                        budget_limit: params.budget_limit,
                        run_id: Some(run.id.clone()),
                    },
                )
                .await?;
            stages_run.push("vendor".to_string());
            Some(outcome)
        } else {
            debug!(run_id = %run.id, "Vendor stage skipped, no reorder needed");
            state.phase = PipelinePhase::VendorSkipped;
            None
        };

        // Routing only when there is something to ship
        let shipments = build_shipments(&plan, vendor_outcome.as_ref());
        let route_plan = if shipments.is_empty() {
            debug!(run_id = %run.id, "Routing stage skipped, nothing to ship");
            state.phase = PipelinePhase::RoutingSkipped;
            None
        } else {
            let route_plan = self
                .routing
                .plan(
                    run,
                    state,
                    &PlanRouteParams {
                        transfers: shipments,
                        urgency,
                        disruption_region: params.disruption_region.clone(),
                        run_id: Some(run.id.clone()),
                    },
                )
                .await?;
            stages_run.push("routing".to_string());
            Some(route_plan)
        };

        // Severity is settled only after vendor and routing were attempted
        let severity = if forecast.spike_detected && plan.reorder_needed {
            AlertSeverity::Critical
        } else if forecast.spike_detected {
            AlertSeverity::High
        } else {
            AlertSeverity::Info
        };

        let total_cost = vendor_outcome
            .as_ref()
            .and_then(|v| v.total_price)
            .unwrap_or(0)
            + route_plan.as_ref().map(|r| r.total_cost).unwrap_or(0);

        let event_description = params.event_description.clone().unwrap_or_else(|| {
            match &params.event_type {
                Some(event) => format!("{} affecting {}", event, params.region),
                None => format!("Routine review for {}", params.region),
            }
        });

        // Alert always closes the run
        self.alert
            .send(
                run,
                state,
                &SendAlertsParams {
                    event_description,
                    region: params.region.clone(),
                    spike_multiplier: forecast
                        .spike_detected
                        .then_some(forecast.spike_multiplier),
                    peak_demand: Some(forecast.peak_demand),
                    reorder_quantity: plan.reorder_needed.then_some(plan.reorder_quantity),
                    vendor_selected: vendor_outcome
                        .as_ref()
                        .and_then(|v| v.vendor_selected.clone()),
                    total_cost: Some(total_cost),
                    severity,
                    run_id: Some(run.id.clone()),
                },
            )
            .await?;
        stages_run.push("alert".to_string());

        state.phase = PipelinePhase::Complete;
        run.phase = PipelinePhase::Complete;
        run.updated_at = chrono::Utc::now();
        self.storage.update_run(run).await?;

        info!(
            run_id = %run.id,
            severity = %severity,
            stages = stages_run.len(),
            "Pipeline run complete"
        );

        Ok(PipelineReport {
            run_id: run.id.clone(),
            severity,
            phase: PipelinePhase::Complete,
            stages_run,
            state: state.clone(),
        })
    }
}

/// Shipments to route: one per planned transfer, plus one supplier leg when
/// a purchase order was confirmed.
fn build_shipments(
    plan: &crate::state::InventoryPlan,
    vendor: Option<&crate::state::VendorOutcome>,
) -> Vec<ShipmentRequest> {
    let mut shipments: Vec<ShipmentRequest> = plan
        .transfers
        .iter()
        .map(|t| ShipmentRequest {
            from_warehouse: t.from_warehouse.clone(),
            to_warehouse: plan.target_warehouse.clone(),
            quantity: t.quantity,
            distance_km: t.distance_km,
        })
        .collect();

    if let Some(vendor) = vendor {
        if vendor.status == SourcingStatus::Success {
            if let Some(po) = &vendor.purchase_order {
                shipments.push(ShipmentRequest {
                    from_warehouse: po.supplier_name.clone(),
                    to_warehouse: plan.target_warehouse.clone(),
                    quantity: po.quantity,
                    // Supplier legs have no tabulated distance
                    distance_km: 1000,
                });
            }
        }
    }

    shipments
}
