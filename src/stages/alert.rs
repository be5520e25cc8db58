//! Alert stage.
//!
//! Renders the stakeholder report from whatever the upstream stages
//! produced, fans it out to the severity-appropriate recipients over slack
//! and email, and files an immutable audit record. Notification delivery
//! is simulated; the acknowledgments and the audit trail are the product.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{serialize_for_trace, StageCore};
use crate::catalog::Catalog;
use crate::error::AppResult;
use crate::state::{
    AlertOutcome, AlertSeverity, AuditRecord, NotificationReceipt, WorkflowState,
};
use crate::storage::{Run, SqliteStorage, TraceEntry};

/// Stage name used in trace entries.
pub const ALERT_STAGE: &str = "alert";
/// Tool name the stage is invoked through.
pub const SEND_ALERTS_TOOL: &str = "supply_send_alerts";

/// Characters of the report kept in each notification preview.
const PREVIEW_CHARS: usize = 100;

/// Input parameters for alert dispatch.
///
/// Every field beyond the event description is optional; the report renders
/// whatever is available and never fails on missing sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendAlertsParams {
    /// What happened (e.g. "Cyclone Nisarga Approaching Mumbai").
    pub event_description: String,
    /// Affected region.
    pub region: String,
    /// Detected spike factor, if the forecast found one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spike_multiplier: Option<f64>,
    /// Peak daily demand from the forecast.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_demand: Option<i64>,
    /// External reorder size from the inventory plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_quantity: Option<i64>,
    /// Selected supplier name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_selected: Option<String>,
    /// Total cost across procurement and routing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<i64>,
    /// Alert severity; defaults to info.
    #[serde(default)]
    pub severity: AlertSeverity,
    /// Optional run ID (creates a new run if not provided).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// Alert stage handler.
#[derive(Clone)]
pub struct AlertStage {
    core: StageCore,
}

impl AlertStage {
    /// Create a new alert stage.
    pub fn new(catalog: Arc<Catalog>, storage: SqliteStorage) -> Self {
        Self {
            core: StageCore::new(catalog, storage),
        }
    }

    /// Render the report and dispatch notifications.
    pub async fn send(
        &self,
        run: &mut Run,
        state: &mut WorkflowState,
        params: &SendAlertsParams,
    ) -> AppResult<AlertOutcome> {
        let start = Instant::now();
        debug!(
            run_id = %run.id,
            severity = %params.severity,
            "Dispatching alerts"
        );

        let entry = TraceEntry::new(
            &run.id,
            ALERT_STAGE,
            SEND_ALERTS_TOOL,
            serialize_for_trace(params, "alert input"),
        );

        let summary_text = render_report(state, params);
        let (slack, email) = recipients_for(params.severity);
        let now = Utc::now();

        let preview: String = summary_text.chars().take(PREVIEW_CHARS).collect();
        let preview = format!("{}...", preview);

        let notifications: Vec<NotificationReceipt> = [("slack", &slack), ("email", &email)]
            .into_iter()
            .map(|(channel, recipients)| NotificationReceipt {
                channel: channel.to_string(),
                recipients: recipients.clone(),
                message_preview: preview.clone(),
                severity: params.severity,
                sent_at: now,
                status: "sent".to_string(),
            })
            .collect();

        let audit_record = build_audit_record(state, &notifications, now);

        let outcome = AlertOutcome {
            severity: params.severity,
            recipients_notified: slack.len() + email.len(),
            channels_used: vec!["slack".to_string(), "email".to_string()],
            notifications_sent: notifications,
            audit_record,
            summary: summary_text,
            timestamp: now,
        };

        let latency = start.elapsed().as_millis() as i64;
        let entry = entry.success(serialize_for_trace(&outcome, "alert output"), latency);
        let trace_summary = format!(
            "{} alert to {} recipients",
            outcome.severity, outcome.recipients_notified
        );

        state.set_alert(outcome.clone());
        self.core.commit(run, state, entry, trace_summary).await?;

        info!(
            run_id = %run.id,
            severity = %outcome.severity,
            recipients = outcome.recipients_notified,
            latency_ms = latency,
            "Alerts dispatched"
        );

        Ok(outcome)
    }
}

/// Recipient lists per channel for a severity level.
fn recipients_for(severity: AlertSeverity) -> (Vec<String>, Vec<String>) {
    let (slack, email): (&[&str], &[&str]) = match severity {
        AlertSeverity::Critical => (
            &["@supply-chain-director", "@operations-manager"],
            &["director@styleflow.in", "ops@styleflow.in"],
        ),
        AlertSeverity::High => (&["@supply-chain-manager"], &["scm@styleflow.in"]),
        AlertSeverity::Info => (&["@supply-chain-team"], &["team@styleflow.in"]),
    };
    (
        slack.iter().map(|s| s.to_string()).collect(),
        email.iter().map(|s| s.to_string()).collect(),
    )
}

/// Render the fixed-template stakeholder report.
///
/// Sections appear only when the corresponding upstream data exists, either
/// in the workflow state or in the call parameters.
fn render_report(state: &WorkflowState, params: &SendAlertsParams) -> String {
    let rule = "=".repeat(50);
    let mut lines = Vec::new();

    lines.push(rule.clone());
    lines.push("SUPPLY CHAIN AUTO-OPTIMIZATION COMPLETE".to_string());
    lines.push(rule.clone());
    lines.push(String::new());

    lines.push(format!("EVENT: {}", params.event_description));
    lines.push(format!("REGION: {}", params.region));
    lines.push(String::new());

    let spike = state
        .demand
        .as_ref()
        .map(|d| (d.spike_detected, d.spike_multiplier, d.peak_demand, Some(d.confidence)))
        .or_else(|| {
            params
                .spike_multiplier
                .map(|m| (true, m, params.peak_demand.unwrap_or(0), None))
        });
    if let Some((true, multiplier, peak, confidence)) = spike {
        lines.push("DEMAND ANALYSIS:".to_string());
        lines.push(format!("   Spike Detected: {}x normal demand", multiplier));
        lines.push(format!("   Peak Demand: {} units", peak));
        if let Some(confidence) = confidence {
            lines.push(format!("   Confidence: {:.0}%", confidence * 100.0));
        }
        lines.push(String::new());
    }

    if let Some(inventory) = &state.inventory {
        if !inventory.transfers.is_empty() {
            lines.push("INVENTORY OPTIMIZATION:".to_string());
            for transfer in inventory.transfers.iter().take(2) {
                lines.push(format!(
                    "   Transfer: {} units from {}",
                    transfer.quantity, transfer.from_warehouse
                ));
            }
            if inventory.reorder_needed {
                lines.push(format!(
                    "   External Order: {} units",
                    inventory.reorder_quantity
                ));
            }
            lines.push(String::new());
        }
    } else if let Some(reorder) = params.reorder_quantity {
        lines.push("INVENTORY OPTIMIZATION:".to_string());
        lines.push(format!("   External Order: {} units", reorder));
        lines.push(String::new());
    }

    let vendor_name = state
        .vendor
        .as_ref()
        .and_then(|v| v.vendor_selected.clone())
        .or_else(|| params.vendor_selected.clone());
    if let Some(vendor_name) = vendor_name {
        lines.push("VENDOR PROCUREMENT:".to_string());
        lines.push(format!("   Supplier: {}", vendor_name));
        if let Some(vendor) = &state.vendor {
            lines.push(format!("   Quantity: {} units", vendor.quantity));
            if let Some(total) = vendor.total_price {
                lines.push(format!("   Cost: ₹{}", total));
            }
            if let Some(date) = &vendor.delivery_date {
                lines.push(format!("   Delivery: {}", date));
            }
        } else if let Some(total) = params.total_cost {
            lines.push(format!("   Cost: ₹{}", total));
        }
        lines.push(String::new());
    }

    if let Some(routing) = &state.routing {
        lines.push("DELIVERY SCHEDULED:".to_string());
        lines.push(format!("   Routes Planned: {}", routing.total_routes));
        lines.push(format!("   Total Cost: ₹{}", routing.total_cost));
        lines.push(format!(
            "   Earliest Delivery: {}",
            routing.earliest_delivery.format("%Y-%m-%d %H:%M")
        ));
        lines.push(String::new());
    }

    lines.push(rule.clone());
    lines.push("All actions completed automatically".to_string());
    lines.push(format!(
        "Timestamp: {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    ));
    lines.push(rule);

    lines.join("\n")
}

fn build_audit_record(
    state: &WorkflowState,
    notifications: &[NotificationReceipt],
    now: chrono::DateTime<Utc>,
) -> AuditRecord {
    let mut stages_involved: Vec<String> = Vec::new();
    for record in &state.execution_trace {
        if !stages_involved.contains(&record.stage) {
            stages_involved.push(record.stage.clone());
        }
    }
    if !stages_involved.contains(&ALERT_STAGE.to_string()) {
        stages_involved.push(ALERT_STAGE.to_string());
    }

    if notifications.is_empty() {
        return AuditRecord {
            audit_id: None,
            status: "no_notifications".to_string(),
            notifications: Vec::new(),
            stages_involved,
            total_actions: 0,
            created_at: now,
        };
    }

    let transfers = state
        .inventory
        .as_ref()
        .map(|i| i.transfers.len())
        .unwrap_or(0);

    AuditRecord {
        audit_id: Some(format!("AUDIT-{}", now.format("%Y%m%d%H%M%S"))),
        status: "recorded".to_string(),
        notifications: notifications.to_vec(),
        stages_involved,
        total_actions: notifications.len() + transfers,
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{InventoryAction, InventoryPlan, TransferOrder};
    use crate::storage::Storage;
    use pretty_assertions::assert_eq;

    async fn stage_fixture() -> (AlertStage, Run, WorkflowState) {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let run = storage.get_or_create_run(&None).await.unwrap();
        let stage = AlertStage::new(Arc::new(Catalog::builtin()), storage);
        (stage, run, WorkflowState::new())
    }

    fn params(severity: AlertSeverity) -> SendAlertsParams {
        SendAlertsParams {
            event_description: "Cyclone Nisarga Approaching Mumbai".to_string(),
            region: "Mumbai".to_string(),
            spike_multiplier: Some(12.0),
            peak_demand: Some(96),
            reorder_quantity: Some(79),
            vendor_selected: Some("RainShield Fashion".to_string()),
            total_cost: Some(24964),
            severity,
            run_id: None,
        }
    }

    fn sample_inventory() -> InventoryPlan {
        InventoryPlan {
            product_sku: "RC-FULL-NVY-M".to_string(),
            target_region: "Mumbai".to_string(),
            target_warehouse: "Mumbai Warehouse".to_string(),
            action: InventoryAction::Rebalance,
            current_stock: 50,
            forecasted_demand: 355,
            gap: 305,
            surplus: 0,
            transfers: vec![
                TransferOrder {
                    from_warehouse: "Delhi Warehouse".to_string(),
                    from_warehouse_id: "WH-DEL".to_string(),
                    quantity: 126,
                    distance_km: 1400,
                    estimated_cost: 14630,
                    transit_time_hours: 23,
                    mode: "truck".to_string(),
                },
                TransferOrder {
                    from_warehouse: "Bangalore Warehouse".to_string(),
                    from_warehouse_id: "WH-BLR".to_string(),
                    quantity: 84,
                    distance_km: 980,
                    estimated_cost: 10220,
                    transit_time_hours: 16,
                    mode: "truck".to_string(),
                },
                TransferOrder {
                    from_warehouse: "Chennai Warehouse".to_string(),
                    from_warehouse_id: "WH-CHN".to_string(),
                    quantity: 28,
                    distance_km: 1300,
                    estimated_cost: 13140,
                    transit_time_hours: 21,
                    mode: "truck".to_string(),
                },
            ],
            total_transferable: 287,
            reorder_needed: true,
            reorder_quantity: 79,
            safety_buffer: 61,
            estimated_cost_transfers: 37990,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_critical_alert_reaches_directors() {
        let (stage, mut run, mut state) = stage_fixture().await;

        let outcome = stage
            .send(&mut run, &mut state, &params(AlertSeverity::Critical))
            .await
            .unwrap();

        assert_eq!(outcome.recipients_notified, 4);
        assert_eq!(outcome.channels_used, vec!["slack", "email"]);
        let slack = &outcome.notifications_sent[0];
        assert_eq!(
            slack.recipients,
            vec!["@supply-chain-director", "@operations-manager"]
        );
        assert_eq!(slack.status, "sent");
    }

    #[tokio::test]
    async fn test_info_alert_reaches_team_only() {
        let (stage, mut run, mut state) = stage_fixture().await;

        let outcome = stage
            .send(&mut run, &mut state, &params(AlertSeverity::Info))
            .await
            .unwrap();

        assert_eq!(outcome.recipients_notified, 2);
        assert_eq!(outcome.notifications_sent[0].recipients, vec!["@supply-chain-team"]);
        assert_eq!(outcome.notifications_sent[1].recipients, vec!["team@styleflow.in"]);
    }

    #[tokio::test]
    async fn test_report_renders_state_sections() {
        let (stage, mut run, mut state) = stage_fixture().await;
        state.inventory = Some(sample_inventory());

        let outcome = stage
            .send(&mut run, &mut state, &params(AlertSeverity::Critical))
            .await
            .unwrap();

        assert!(outcome.summary.contains("EVENT: Cyclone Nisarga Approaching Mumbai"));
        assert!(outcome.summary.contains("Spike Detected: 12x normal demand"));
        assert!(outcome.summary.contains("Transfer: 126 units from Delhi Warehouse"));
        assert!(outcome.summary.contains("Transfer: 84 units from Bangalore Warehouse"));
        // Only the first two transfers appear
        assert!(!outcome.summary.contains("Chennai Warehouse"));
        assert!(outcome.summary.contains("External Order: 79 units"));
        assert!(outcome.summary.contains("Supplier: RainShield Fashion"));
    }

    #[tokio::test]
    async fn test_report_skips_missing_sections() {
        let (stage, mut run, mut state) = stage_fixture().await;
        let bare = SendAlertsParams {
            event_description: "Routine check".to_string(),
            region: "Chennai".to_string(),
            spike_multiplier: None,
            peak_demand: None,
            reorder_quantity: None,
            vendor_selected: None,
            total_cost: None,
            severity: AlertSeverity::Info,
            run_id: None,
        };

        let outcome = stage.send(&mut run, &mut state, &bare).await.unwrap();

        assert!(outcome.summary.contains("EVENT: Routine check"));
        assert!(!outcome.summary.contains("DEMAND ANALYSIS"));
        assert!(!outcome.summary.contains("INVENTORY OPTIMIZATION"));
        assert!(!outcome.summary.contains("VENDOR PROCUREMENT"));
        assert!(!outcome.summary.contains("DELIVERY SCHEDULED"));
    }

    #[tokio::test]
    async fn test_notification_preview_is_truncated() {
        let (stage, mut run, mut state) = stage_fixture().await;

        let outcome = stage
            .send(&mut run, &mut state, &params(AlertSeverity::High))
            .await
            .unwrap();

        let preview = &outcome.notifications_sent[0].message_preview;
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));
    }

    #[tokio::test]
    async fn test_audit_record_lists_participating_stages() {
        let (stage, mut run, mut state) = stage_fixture().await;
        state.push_trace(crate::state::TraceRecord {
            stage: "demand".to_string(),
            tool: "supply_forecast_demand".to_string(),
            success: true,
            summary: String::new(),
            timestamp: Utc::now(),
        });
        state.inventory = Some(sample_inventory());

        let outcome = stage
            .send(&mut run, &mut state, &params(AlertSeverity::Critical))
            .await
            .unwrap();

        let audit = &outcome.audit_record;
        assert!(audit.audit_id.as_deref().unwrap().starts_with("AUDIT-"));
        assert_eq!(audit.stages_involved, vec!["demand", "alert"]);
        // 2 notifications + 3 transfers
        assert_eq!(audit.total_actions, 5);
    }

    #[tokio::test]
    async fn test_alert_is_traced_and_sets_severity() {
        let (stage, mut run, mut state) = stage_fixture().await;

        stage
            .send(&mut run, &mut state, &params(AlertSeverity::High))
            .await
            .unwrap();

        assert_eq!(state.alert_severity, Some(AlertSeverity::High));
        assert_eq!(state.execution_trace.len(), 1);
        assert_eq!(state.execution_trace[0].tool, SEND_ALERTS_TOOL);
    }
}
