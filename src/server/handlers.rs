use serde_json::{json, Value};
use tracing::info;

use super::SharedState;
use crate::error::{AppError, McpError, McpResult};
use crate::pipeline::RunPipelineParams;
use crate::stages::{
    ForecastParams, NegotiateParams, OptimizeParams, PlanRouteParams, SendAlertsParams,
    FORECAST_TOOL, LIST_PRODUCTS_TOOL, NEGOTIATE_TOOL, OPTIMIZE_TOOL, PLAN_ROUTE_TOOL,
    SEND_ALERTS_TOOL, WAREHOUSE_STATUS_TOOL,
};
use crate::state::WorkflowState;
use crate::storage::Storage;

/// Tool name for the full pipeline runner.
pub const RUN_PIPELINE_TOOL: &str = "supply_run_pipeline";
/// Tool name for the execution trace query.
pub const EXECUTION_TRACE_TOOL: &str = "supply_execution_trace";

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        FORECAST_TOOL => handle_forecast_demand(state, arguments).await,
        OPTIMIZE_TOOL => handle_optimize_inventory(state, arguments).await,
        WAREHOUSE_STATUS_TOOL => handle_warehouse_status(state, arguments).await,
        LIST_PRODUCTS_TOOL => handle_list_products(state, arguments).await,
        NEGOTIATE_TOOL => handle_negotiate_vendor(state, arguments).await,
        PLAN_ROUTE_TOOL => handle_plan_route(state, arguments).await,
        SEND_ALERTS_TOOL => handle_send_alerts(state, arguments).await,
        RUN_PIPELINE_TOOL => handle_run_pipeline(state, arguments).await,
        EXECUTION_TRACE_TOOL => handle_execution_trace(state, arguments).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

/// Handle supply_forecast_demand tool call
async fn handle_forecast_demand(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: ForecastParams = parse_arguments(FORECAST_TOOL, arguments)?;

    let mut run = state
        .storage
        .get_or_create_run(&params.run_id)
        .await
        .map_err(AppError::from)?;
    let mut workflows = state.workflows.lock().await;
    let workflow = workflows
        .entry(run.id.clone())
        .or_insert_with(WorkflowState::new);

    let forecast = state
        .demand_stage
        .forecast(&mut run, workflow, &params)
        .await?;

    with_run_id(&run.id, serde_json::to_value(forecast)?)
}

/// Handle supply_optimize_inventory tool call
async fn handle_optimize_inventory(
    state: &SharedState,
    arguments: Option<Value>,
) -> McpResult<Value> {
    let params: OptimizeParams = parse_arguments(OPTIMIZE_TOOL, arguments)?;

    let mut run = state
        .storage
        .get_or_create_run(&params.run_id)
        .await
        .map_err(AppError::from)?;
    let mut workflows = state.workflows.lock().await;
    let workflow = workflows
        .entry(run.id.clone())
        .or_insert_with(WorkflowState::new);

    let plan = state
        .inventory_stage
        .optimize(&mut run, workflow, &params)
        .await?;

    with_run_id(&run.id, serde_json::to_value(plan)?)
}

/// Handle supply_warehouse_status tool call
async fn handle_warehouse_status(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(serde::Deserialize, Default)]
    struct StatusParams {
        #[serde(default)]
        run_id: Option<String>,
    }

    // Arguments are optional for read-only tools
    let params: StatusParams = match arguments {
        Some(args) => parse_value(WAREHOUSE_STATUS_TOOL, args)?,
        None => StatusParams::default(),
    };

    let mut run = state
        .storage
        .get_or_create_run(&params.run_id)
        .await
        .map_err(AppError::from)?;
    let mut workflows = state.workflows.lock().await;
    let workflow = workflows
        .entry(run.id.clone())
        .or_insert_with(WorkflowState::new);

    let report = state
        .inventory_stage
        .warehouse_status(&mut run, workflow)
        .await?;

    with_run_id(&run.id, serde_json::to_value(report)?)
}

/// Handle supply_list_products tool call
async fn handle_list_products(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(serde::Deserialize, Default)]
    struct ListParams {
        #[serde(default)]
        run_id: Option<String>,
    }

    let params: ListParams = match arguments {
        Some(args) => parse_value(LIST_PRODUCTS_TOOL, args)?,
        None => ListParams::default(),
    };

    let mut run = state
        .storage
        .get_or_create_run(&params.run_id)
        .await
        .map_err(AppError::from)?;
    let mut workflows = state.workflows.lock().await;
    let workflow = workflows
        .entry(run.id.clone())
        .or_insert_with(WorkflowState::new);

    let products = state
        .inventory_stage
        .list_products(&mut run, workflow)
        .await?;

    with_run_id(&run.id, json!({ "products": products }))
}

/// Handle supply_negotiate_vendor tool call
async fn handle_negotiate_vendor(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: NegotiateParams = parse_arguments(NEGOTIATE_TOOL, arguments)?;

    let mut run = state
        .storage
        .get_or_create_run(&params.run_id)
        .await
        .map_err(AppError::from)?;
    let mut workflows = state.workflows.lock().await;
    let workflow = workflows
        .entry(run.id.clone())
        .or_insert_with(WorkflowState::new);

    let outcome = state
        .vendor_stage
        .negotiate(&mut run, workflow, &params)
        .await?;

    with_run_id(&run.id, serde_json::to_value(outcome)?)
}

/// Handle supply_plan_route tool call
async fn handle_plan_route(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: PlanRouteParams = parse_arguments(PLAN_ROUTE_TOOL, arguments)?;

    let mut run = state
        .storage
        .get_or_create_run(&params.run_id)
        .await
        .map_err(AppError::from)?;
    let mut workflows = state.workflows.lock().await;
    let workflow = workflows
        .entry(run.id.clone())
        .or_insert_with(WorkflowState::new);

    let plan = state
        .routing_stage
        .plan(&mut run, workflow, &params)
        .await?;

    with_run_id(&run.id, serde_json::to_value(plan)?)
}

/// Handle supply_send_alerts tool call
async fn handle_send_alerts(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: SendAlertsParams = parse_arguments(SEND_ALERTS_TOOL, arguments)?;

    let mut run = state
        .storage
        .get_or_create_run(&params.run_id)
        .await
        .map_err(AppError::from)?;
    let mut workflows = state.workflows.lock().await;
    let workflow = workflows
        .entry(run.id.clone())
        .or_insert_with(WorkflowState::new);

    let outcome = state
        .alert_stage
        .send(&mut run, workflow, &params)
        .await?;

    with_run_id(&run.id, serde_json::to_value(outcome)?)
}

/// Handle supply_run_pipeline tool call
async fn handle_run_pipeline(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: RunPipelineParams = parse_arguments(RUN_PIPELINE_TOOL, arguments)?;

    let mut run = state
        .storage
        .get_or_create_run(&params.run_id)
        .await
        .map_err(AppError::from)?;
    let mut workflows = state.workflows.lock().await;
    let workflow = workflows
        .entry(run.id.clone())
        .or_insert_with(WorkflowState::new);

    let report = state
        .orchestrator
        .run_pipeline(&mut run, workflow, &params)
        .await?;

    // The report already carries its run_id
    serde_json::to_value(report).map_err(McpError::Json)
}

/// Handle supply_execution_trace tool call
async fn handle_execution_trace(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(serde::Deserialize)]
    struct TraceParams {
        run_id: String,
    }

    let params: TraceParams = parse_arguments(EXECUTION_TRACE_TOOL, arguments)?;

    let run = state
        .storage
        .get_run(&params.run_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| McpError::ExecutionFailed {
            message: format!("Run not found: {}", params.run_id),
        })?;

    let entries = state
        .storage
        .get_run_trace(&run.id)
        .await
        .map_err(AppError::from)?;

    Ok(json!({
        "run_id": run.id,
        "product_sku": run.product_sku,
        "region": run.region,
        "event_type": run.event_type,
        "phase": run.phase,
        "total_entries": entries.len(),
        "entries": entries,
    }))
}

/// Parse required tool arguments into a typed parameter struct.
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => parse_value(tool_name, args),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}

fn parse_value<T: serde::de::DeserializeOwned>(tool_name: &str, args: Value) -> McpResult<T> {
    serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
        tool_name: tool_name.to_string(),
        message: e.to_string(),
    })
}

/// Attach the resolved run ID to a tool result object.
fn with_run_id(run_id: &str, value: Value) -> McpResult<Value> {
    match value {
        Value::Object(mut map) => {
            map.insert("run_id".to_string(), Value::String(run_id.to_string()));
            Ok(Value::Object(map))
        }
        other => Ok(json!({ "run_id": run_id, "result": other })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::AppState;
    use crate::storage::SqliteStorage;
    use std::sync::Arc;

    async fn shared_state() -> SharedState {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        Arc::new(AppState::new(Config::default(), storage))
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected() {
        let state = shared_state().await;
        let err = handle_tool_call(&state, "supply_nonexistent", None)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn test_forecast_requires_arguments() {
        let state = shared_state().await;
        let err = handle_tool_call(&state, FORECAST_TOOL, None)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidParameters { .. }));
    }

    #[tokio::test]
    async fn test_forecast_returns_run_id() {
        let state = shared_state().await;
        let result = handle_tool_call(
            &state,
            FORECAST_TOOL,
            Some(json!({
                "product_sku": "RC-FULL-NVY-M",
                "region": "Mumbai",
                "event_type": "cyclone"
            })),
        )
        .await
        .unwrap();

        assert!(result["run_id"].is_string());
        assert_eq!(result["peak_demand"], 96);
        assert_eq!(result["spike_detected"], true);
    }

    #[tokio::test]
    async fn test_run_id_threads_through_calls() {
        let state = shared_state().await;
        let forecast = handle_tool_call(
            &state,
            FORECAST_TOOL,
            Some(json!({
                "product_sku": "RC-FULL-NVY-M",
                "region": "Mumbai",
                "event_type": "cyclone"
            })),
        )
        .await
        .unwrap();
        let run_id = forecast["run_id"].as_str().unwrap().to_string();

        let plan = handle_tool_call(
            &state,
            OPTIMIZE_TOOL,
            Some(json!({
                "product_sku": "RC-FULL-NVY-M",
                "region": "Mumbai",
                "forecasted_demand": forecast["total_7day_demand"],
                "run_id": run_id
            })),
        )
        .await
        .unwrap();
        assert_eq!(plan["run_id"].as_str().unwrap(), run_id);
        assert_eq!(plan["reorder_needed"], true);

        let trace = handle_tool_call(
            &state,
            EXECUTION_TRACE_TOOL,
            Some(json!({ "run_id": run_id })),
        )
        .await
        .unwrap();
        assert_eq!(trace["total_entries"], 2);
        assert_eq!(trace["entries"][0]["stage"], "demand");
        assert_eq!(trace["entries"][1]["stage"], "inventory");
    }

    #[tokio::test]
    async fn test_warehouse_status_without_arguments() {
        let state = shared_state().await;
        let result = handle_tool_call(&state, WAREHOUSE_STATUS_TOOL, None)
            .await
            .unwrap();
        assert_eq!(result["warehouses"].as_array().unwrap().len(), 5);
        assert!(result["run_id"].is_string());
    }

    #[tokio::test]
    async fn test_execution_trace_for_missing_run() {
        let state = shared_state().await;
        let err = handle_tool_call(
            &state,
            EXECUTION_TRACE_TOOL,
            Some(json!({ "run_id": "no-such-run" })),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, McpError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn test_run_pipeline_tool() {
        let state = shared_state().await;
        let result = handle_tool_call(
            &state,
            RUN_PIPELINE_TOOL,
            Some(json!({
                "product_sku": "RC-FULL-NVY-M",
                "region": "Mumbai",
                "event_type": "cyclone",
                "disruption_region": "Mumbai"
            })),
        )
        .await
        .unwrap();

        assert_eq!(result["severity"], "critical");
        assert_eq!(result["phase"], "complete");
        assert_eq!(result["stages_run"].as_array().unwrap().len(), 5);
    }
}
