//! Shared workflow state for a pipeline run.
//!
//! This module defines the strongly-typed aggregate each stage reads from and
//! writes into, plus the in-memory execution trace. A section write replaces
//! the previous value for that section (last write wins); the trace only ever
//! appends. Stages communicate exclusively through this state, never through
//! globals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Severity and phase
// ============================================================================

/// Alert severity level, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Routine summary, no action required.
    #[default]
    Info,
    /// Demand spike detected, management attention needed.
    High,
    /// Spike plus external reorder, director-level escalation.
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "info"),
            AlertSeverity::High => write!(f, "high"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(AlertSeverity::Info),
            "high" => Ok(AlertSeverity::High),
            "critical" => Ok(AlertSeverity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Where an orchestrated run currently stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    /// No stage has run yet.
    #[default]
    Idle,
    /// Demand forecast recorded.
    DemandDone,
    /// Inventory plan recorded.
    InventoryDone,
    /// Vendor sourcing attempted.
    VendorDone,
    /// Vendor stage skipped (no reorder needed).
    VendorSkipped,
    /// Route plan recorded.
    RoutingDone,
    /// Routing stage skipped (nothing to ship).
    RoutingSkipped,
    /// Alert dispatched.
    AlertDone,
    /// Run finished.
    Complete,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelinePhase::Idle => "idle",
            PipelinePhase::DemandDone => "demand_done",
            PipelinePhase::InventoryDone => "inventory_done",
            PipelinePhase::VendorDone => "vendor_done",
            PipelinePhase::VendorSkipped => "vendor_skipped",
            PipelinePhase::RoutingDone => "routing_done",
            PipelinePhase::RoutingSkipped => "routing_skipped",
            PipelinePhase::AlertDone => "alert_done",
            PipelinePhase::Complete => "complete",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Demand section
// ============================================================================

/// One day of the 7-day forecast horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyDemand {
    /// Day number, 1-based.
    pub day: i64,
    /// Calendar date (YYYY-MM-DD).
    pub date: String,
    /// Predicted units for the day.
    pub predicted_demand: i64,
}

/// Output of the demand forecasting stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandForecast {
    pub product_sku: String,
    pub product_name: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Average daily sales under normal conditions.
    pub baseline_demand: i64,
    /// Seven consecutive days starting today.
    pub daily_forecast: Vec<DailyDemand>,
    pub peak_demand: i64,
    pub peak_date: String,
    /// Peak exceeds three times baseline.
    pub spike_detected: bool,
    /// Effective multiplier, rounded to one decimal.
    pub spike_multiplier: f64,
    pub confidence: f64,
    pub total_7day_demand: i64,
    /// Human-readable contributing factors.
    pub factors: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Inventory section
// ============================================================================

/// What the inventory stage decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryAction {
    /// Stock already covers the forecast.
    NoneNeeded,
    /// Transfers planned, possibly plus an external reorder.
    Rebalance,
}

/// A planned inter-warehouse stock transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOrder {
    pub from_warehouse: String,
    pub from_warehouse_id: String,
    pub quantity: i64,
    pub distance_km: i64,
    pub estimated_cost: i64,
    pub transit_time_hours: i64,
    /// Always "truck" for inter-warehouse moves.
    pub mode: String,
}

/// Output of the inventory optimization stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryPlan {
    pub product_sku: String,
    pub target_region: String,
    pub target_warehouse: String,
    pub action: InventoryAction,
    pub current_stock: i64,
    pub forecasted_demand: i64,
    /// Shortfall against forecast; non-positive means covered.
    pub gap: i64,
    /// Units of headroom when no action is needed.
    pub surplus: i64,
    pub transfers: Vec<TransferOrder>,
    pub total_transferable: i64,
    pub reorder_needed: bool,
    /// Residual shortfall plus the 20% safety buffer; 0 when not needed.
    pub reorder_quantity: i64,
    pub safety_buffer: i64,
    pub estimated_cost_transfers: i64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Vendor section
// ============================================================================

/// Terminal status of a sourcing attempt.
///
/// Sourcing failures are outcomes, not errors: the pipeline records them and
/// moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcingStatus {
    /// A purchase order was confirmed.
    Success,
    /// No supplier carries this product type.
    NoSuppliers,
    /// Quotes existed but none fit the constraints (MOQ, budget).
    NoViableQuote,
}

/// A supplier quote received in response to an RFQ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorQuote {
    pub supplier_id: String,
    pub supplier_name: String,
    pub supplier_rating: i64,
    pub unit_price: i64,
    pub total_price: i64,
    pub delivery_days: i64,
    pub delivery_date: String,
    pub payment_terms: String,
    pub location: String,
    /// Composite score assigned during selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// True once a bulk discount has been applied to the price.
    #[serde(default)]
    pub negotiated: bool,
}

/// A confirmed purchase order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    /// `PO-<YYYYMMDD>-<first 6 chars of SKU>`.
    pub po_number: String,
    pub supplier_id: String,
    pub supplier_name: String,
    pub product_sku: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub total_price: i64,
    pub delivery_date: String,
    pub payment_terms: String,
    pub issued_at: DateTime<Utc>,
    pub status: String,
}

/// Output of the vendor negotiation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorOutcome {
    pub status: SourcingStatus,
    pub product_sku: String,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_selected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_order: Option<PurchaseOrder>,
    pub quotes_compared: usize,
    /// Bulk-discount savings on the selected quote.
    pub negotiation_savings: i64,
    /// Explanation when sourcing did not produce a PO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Routing section
// ============================================================================

/// Transport mode selected per shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// High urgency, short haul.
    ExpressTruck,
    /// Default road freight.
    Truck,
    /// Long haul over 1500 km.
    Train,
}

impl TransportMode {
    /// Cruising speed used for transit-time estimates.
    pub fn speed_kmh(self) -> i64 {
        match self {
            TransportMode::ExpressTruck => 60,
            TransportMode::Truck => 55,
            TransportMode::Train => 50,
        }
    }

    /// Freight rate in rupees per kilometre.
    pub fn cost_per_km(self) -> i64 {
        match self {
            TransportMode::ExpressTruck => 15,
            TransportMode::Truck => 10,
            TransportMode::Train => 8,
        }
    }

    /// Contracted carrier for the mode.
    pub fn carrier(self) -> &'static str {
        match self {
            TransportMode::ExpressTruck => "BlueDart Express",
            TransportMode::Truck => "DTDC Logistics",
            TransportMode::Train => "Indian Railways Cargo",
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportMode::ExpressTruck => write!(f, "express_truck"),
            TransportMode::Truck => write!(f, "truck"),
            TransportMode::Train => write!(f, "train"),
        }
    }
}

/// One optimized delivery route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteLeg {
    pub from: String,
    pub to: String,
    pub distance_km: i64,
    pub mode: TransportMode,
    pub quantity: i64,
    /// Transit hours including any disruption delay.
    pub eta_hours: i64,
    pub eta: DateTime<Utc>,
    pub cost: i64,
    pub weather_delay_hours: i64,
    pub carrier: String,
}

/// Output of the route planning stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlan {
    pub routes: Vec<RouteLeg>,
    pub total_routes: usize,
    pub total_cost: i64,
    pub earliest_delivery: DateTime<Utc>,
    pub average_delivery_hours: f64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Alert section
// ============================================================================

/// Acknowledgment for one dispatched notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationReceipt {
    pub channel: String,
    pub recipients: Vec<String>,
    /// First 100 characters of the report.
    pub message_preview: String,
    pub severity: AlertSeverity,
    pub sent_at: DateTime<Utc>,
    pub status: String,
}

/// Immutable audit record created alongside the notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// `AUDIT-<YYYYMMDDHHMMSS>`; absent when nothing was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_id: Option<String>,
    pub status: String,
    pub notifications: Vec<NotificationReceipt>,
    /// Stage names that participated in the run.
    pub stages_involved: Vec<String>,
    pub total_actions: usize,
    pub created_at: DateTime<Utc>,
}

/// Output of the alert stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertOutcome {
    pub severity: AlertSeverity,
    pub notifications_sent: Vec<NotificationReceipt>,
    pub recipients_notified: usize,
    pub channels_used: Vec<String>,
    pub audit_record: AuditRecord,
    /// The rendered stakeholder report.
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Trace and aggregate
// ============================================================================

/// One entry in the in-memory execution trace.
///
/// Persisted 1:1 as a trace row by the stages; kept on the state so the
/// aggregate alone can answer "what happened in this run".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Stage name ("demand", "inventory", ...).
    pub stage: String,
    /// MCP tool that produced the entry.
    pub tool: String,
    pub success: bool,
    /// One-line outcome summary.
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

/// Accumulated state of one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub demand: Option<DemandForecast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<InventoryPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<VendorOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutePlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertOutcome>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_severity: Option<AlertSeverity>,
    pub phase: PipelinePhase,

    /// Append-only record of every stage invocation in this run.
    pub execution_trace: Vec<TraceRecord>,
}

impl WorkflowState {
    /// Fresh state for a new run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a trace record. The trace never shrinks or reorders.
    pub fn push_trace(&mut self, record: TraceRecord) {
        self.execution_trace.push(record);
    }

    /// Record the demand forecast, replacing any previous one.
    pub fn set_demand(&mut self, forecast: DemandForecast) {
        self.product_sku = Some(forecast.product_sku.clone());
        self.region = Some(forecast.region.clone());
        self.event_type = forecast.event_type.clone();
        self.demand = Some(forecast);
        self.phase = PipelinePhase::DemandDone;
    }

    /// Record the inventory plan, replacing any previous one.
    pub fn set_inventory(&mut self, plan: InventoryPlan) {
        self.inventory = Some(plan);
        self.phase = PipelinePhase::InventoryDone;
    }

    /// Record the vendor outcome, replacing any previous one.
    pub fn set_vendor(&mut self, outcome: VendorOutcome) {
        self.vendor = Some(outcome);
        self.phase = PipelinePhase::VendorDone;
    }

    /// Record the route plan, replacing any previous one.
    pub fn set_routing(&mut self, plan: RoutePlan) {
        self.routing = Some(plan);
        self.phase = PipelinePhase::RoutingDone;
    }

    /// Record the alert outcome, replacing any previous one.
    pub fn set_alert(&mut self, outcome: AlertOutcome) {
        self.alert_severity = Some(outcome.severity);
        self.alert = Some(outcome);
        self.phase = PipelinePhase::AlertDone;
    }
}
