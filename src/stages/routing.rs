//! Route planning stage.
//!
//! Picks a transport mode per shipment from urgency and distance, prices
//! the leg, and schedules delivery. Active weather disruptions are injected
//! by the caller as a region token; shipments headed into the disrupted
//! region pick up a fixed delay.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{serialize_for_trace, StageCore, Urgency};
use crate::catalog::Catalog;
use crate::config::CostConfig;
use crate::error::{AppResult, ToolError};
use crate::state::{RouteLeg, RoutePlan, TransportMode, WorkflowState};
use crate::storage::{Run, SqliteStorage, TraceEntry};

/// Stage name used in trace entries.
pub const ROUTING_STAGE: &str = "routing";
/// Tool name the stage is invoked through.
pub const PLAN_ROUTE_TOOL: &str = "supply_plan_route";

/// Hours added to a shipment headed into a disrupted region.
const DISRUPTION_DELAY_HOURS: i64 = 2;
/// Distance below which high urgency upgrades to express.
const EXPRESS_MAX_KM: i64 = 500;
/// Distance above which rail beats road.
const TRAIN_MIN_KM: i64 = 1500;

/// One shipment to route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRequest {
    /// Origin warehouse or supplier location.
    pub from_warehouse: String,
    /// Destination; defaults to Mumbai.
    #[serde(default = "default_destination")]
    pub to_warehouse: String,
    /// Units to move.
    pub quantity: i64,
    /// Leg distance; defaults to 1000 km when the caller has no figure.
    #[serde(default = "default_distance")]
    pub distance_km: i64,
}

fn default_destination() -> String {
    "Mumbai".to_string()
}

fn default_distance() -> i64 {
    1000
}

/// Input parameters for route planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRouteParams {
    /// Shipments to route; must not be empty.
    pub transfers: Vec<ShipmentRequest>,
    /// Urgency level; high unlocks express trucking on short hauls.
    #[serde(default)]
    pub urgency: Urgency,
    /// Region currently under a weather disruption, if any. Shipments whose
    /// destination contains this token are delayed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disruption_region: Option<String>,
    /// Optional run ID (creates a new run if not provided).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// Route planning stage handler.
#[derive(Clone)]
pub struct RoutingStage {
    core: StageCore,
    costs: CostConfig,
}

impl RoutingStage {
    /// Create a new routing stage.
    pub fn new(catalog: Arc<Catalog>, storage: SqliteStorage, costs: CostConfig) -> Self {
        Self {
            core: StageCore::new(catalog, storage),
            costs,
        }
    }

    /// Plan delivery routes for a batch of shipments.
    pub async fn plan(
        &self,
        run: &mut Run,
        state: &mut WorkflowState,
        params: &PlanRouteParams,
    ) -> AppResult<RoutePlan> {
        let start = Instant::now();
        debug!(
            run_id = %run.id,
            shipments = params.transfers.len(),
            "Planning delivery routes"
        );

        let entry = TraceEntry::new(
            &run.id,
            ROUTING_STAGE,
            PLAN_ROUTE_TOOL,
            serialize_for_trace(params, "route input"),
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
        let entry = entry.success(serialize_for_trace(&plan, "route output"), latency);
        let summary = format!(
            "{} routes, total cost {}",
            plan.total_routes, plan.total_cost
        );

        state.set_routing(plan.clone());
        self.core.commit(run, state, entry, summary).await?;

        info!(
            run_id = %run.id,
            routes = plan.total_routes,
            total_cost = plan.total_cost,
            latency_ms = latency,
            "Route planning completed"
        );

        Ok(plan)
    }

    fn compute(&self, params: &PlanRouteParams) -> AppResult<RoutePlan> {
        if params.transfers.is_empty() {
            return Err(ToolError::Validation {
                field: "transfers".to_string(),
                reason: "must contain at least one shipment".to_string(),
            }
            .into());
        }
        if let Some(bad) = params.transfers.iter().find(|t| t.quantity <= 0) {
            return Err(ToolError::Validation {
                field: "quantity".to_string(),
                reason: format!(
                    "must be positive for shipment from {}",
                    bad.from_warehouse
                ),
            }
            .into());
        }

        let routes: Vec<RouteLeg> = params
            .transfers
            .iter()
            .map(|shipment| self.route_one(shipment, params))
            .collect();

        let total_cost = routes.iter().map(|r| r.cost).sum();
        let earliest_delivery = routes
            .iter()
            .map(|r| r.eta)
            .min()
            .unwrap_or_else(Utc::now);
        let average_delivery_hours =
            routes.iter().map(|r| r.eta_hours).sum::<i64>() as f64 / routes.len() as f64;

        Ok(RoutePlan {
            total_routes: routes.len(),
            routes,
            total_cost,
            earliest_delivery,
            average_delivery_hours,
            timestamp: Utc::now(),
        })
    }

    fn route_one(&self, shipment: &ShipmentRequest, params: &PlanRouteParams) -> RouteLeg {
        let mode = select_mode(params.urgency, shipment.distance_km);

        let mut eta_hours = shipment.distance_km / mode.speed_kmh();
        let cost = shipment.distance_km * mode.cost_per_km()
            + shipment.quantity * self.costs.route_handling_per_unit;

        let weather_delay_hours = match &params.disruption_region {
            Some(region) if shipment.to_warehouse.contains(region.as_str()) => {
                DISRUPTION_DELAY_HOURS
            }
            _ => 0,
        };
        eta_hours += weather_delay_hours;

        RouteLeg {
            from: shipment.from_warehouse.clone(),
            to: shipment.to_warehouse.clone(),
            distance_km: shipment.distance_km,
            mode,
            quantity: shipment.quantity,
            eta_hours,
            eta: Utc::now() + Duration::hours(eta_hours),
            cost,
            weather_delay_hours,
            carrier: mode.carrier().to_string(),
        }
    }
}

/// Mode per leg: express on urgent short hauls, rail on long hauls,
/// otherwise road.
fn select_mode(urgency: Urgency, distance_km: i64) -> TransportMode {
    if urgency == Urgency::High && distance_km < EXPRESS_MAX_KM {
        TransportMode::ExpressTruck
    } else if distance_km > TRAIN_MIN_KM {
        TransportMode::Train
    } else {
        TransportMode::Truck
    }
}
