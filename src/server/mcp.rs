//! MCP protocol implementation for JSON-RPC 2.0 communication.
//!
//! This module provides the core MCP server implementation including:
//! - JSON-RPC 2.0 request/response handling
//! - Tool definitions and schemas
//! - Stdio-based server communication

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use super::{handle_tool_call, SharedState};

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request identifier (None for notifications).
    pub id: Option<Value>,
    /// The method name to invoke.
    pub method: String,
    /// Optional parameters for the method.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request identifier (null if notification, must always be present per spec).
    pub id: Value,
    /// The result on success (mutually exclusive with error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure (mutually exclusive with result).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Error code (negative for predefined errors).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// MCP server information returned during initialization.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    /// The server name identifier.
    pub name: String,
    /// The server version string.
    pub version: String,
}

/// MCP server capabilities advertised to clients.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
}

/// Tool-specific capabilities.
#[derive(Debug, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change dynamically.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Result of the MCP initialize handshake.
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    /// The MCP protocol version supported.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities.
    pub capabilities: Capabilities,
    /// Server identification information.
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// MCP tool definition with JSON Schema.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    /// Unique tool name (used in tool calls).
    pub name: String,
    /// Human-readable description of the tool.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Parameters for a tools/call request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    /// The name of the tool to invoke.
    pub name: String,
    /// Optional arguments for the tool.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Content item within a tool result.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    /// The content type (e.g., "text").
    #[serde(rename = "type")]
    pub content_type: String,
    /// The text content of the result.
    pub text: String,
}

/// Result of a tool invocation.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    /// The result content items.
    pub content: Vec<ToolResultContent>,
    /// Whether the result represents an error.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP Server running over stdio.
///
/// Handles JSON-RPC 2.0 messages over stdin/stdout for MCP protocol
/// communication with clients.
pub struct McpServer {
    /// Shared application state.
    state: SharedState,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Run the server using async stdio
    pub async fn run(&self) -> std::io::Result<()> {
        info!("Supply chain MCP server starting...");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            // EOF reached
            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(request = %trimmed, "Received request");

            let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    Some(JsonRpcResponse::error(
                        None,
                        -32700,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            // Only send response if not a notification (per JSON-RPC 2.0 spec)
            if let Some(response) = response {
                let response_json = serde_json::to_string(&response)?;
                debug!(response = %response_json, "Sending response");

                stdout.write_all(response_json.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        Ok(())
    }

    /// Handle a single JSON-RPC request
    /// Returns None for notifications (requests without id) per JSON-RPC 2.0 spec
    pub(crate) async fn handle_request(
        &self,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_none();

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request.id)),
            "initialized" => {
                debug!("Received initialized notification");
                None
            }
            "notifications/cancelled" => {
                debug!("Received cancelled notification");
                None
            }
            "tools/list" => Some(self.handle_tools_list(request.id)),
            "tools/call" => Some(self.handle_tool_call(request.id, request.params).await),
            "ping" => Some(JsonRpcResponse::success(
                request.id,
                Value::Object(Default::default()),
            )),
            method => {
                if is_notification {
                    debug!(method = %method, "Unknown notification, ignoring");
                    None
                } else {
                    error!(method = %method, "Unknown method");
                    Some(JsonRpcResponse::error(
                        request.id,
                        -32601,
                        format!("Method not found: {}", method),
                    ))
                }
            }
        }
    }

    /// Handle initialize request
    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling initialize request");

        let result = InitializeResult {
            protocol_version: "2024-11-05".to_string(),
            capabilities: Capabilities {
                tools: ToolCapabilities {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: "mcp-supplyflow".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize initialize result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }

    /// Handle tools/list request
    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling tools/list request");

        let tools = tool_definitions();

        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "tools": tools
            }),
        )
    }

    /// Handle tools/call request
    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("Invalid params: {}", e));
                }
            },
            None => {
                return JsonRpcResponse::error(id, -32602, "Missing params");
            }
        };

        info!(tool = %params.name, "Handling tool call");

        let (content, is_error) =
            match handle_tool_call(&self.state, &params.name, params.arguments).await {
                Ok(result) => {
                    let text = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
                        error!(error = %e, "Failed to serialize tool result");
                        format!("{{\"error\": \"Serialization failed: {}\"}}", e)
                    });
                    (
                        ToolResultContent {
                            content_type: "text".to_string(),
                            text,
                        },
                        None,
                    )
                }
                Err(e) => (
                    ToolResultContent {
                        content_type: "text".to_string(),
                        text: format!("Error: {}", e),
                    },
                    Some(true),
                ),
            };

        let tool_result = ToolCallResult {
            content: vec![content],
            is_error,
        };

        match serde_json::to_value(tool_result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize tool call result");
                JsonRpcResponse::error(id.clone(), -32603, format!("Internal error: {}", e))
            }
        }
    }
}

/// All tool definitions advertised by tools/list.
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        get_forecast_demand_tool(),
        get_optimize_inventory_tool(),
        get_warehouse_status_tool(),
        get_list_products_tool(),
        get_negotiate_vendor_tool(),
        get_plan_route_tool(),
        get_send_alerts_tool(),
        get_run_pipeline_tool(),
        get_execution_trace_tool(),
    ]
}

/// Get the demand forecast tool definition
fn get_forecast_demand_tool() -> Tool {
    Tool {
        name: "supply_forecast_demand".to_string(),
        description: "Forecast 7-day demand for a product in a region, factoring in weather events and social signals. Detects demand spikes and returns a day-by-day forecast with peak and confidence.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "product_sku": {
                    "type": "string",
                    "description": "SKU of the product to forecast (e.g. 'RC-FULL-NVY-M')"
                },
                "region": {
                    "type": "string",
                    "description": "Target region (Mumbai, Delhi, Bangalore, Chennai, Kolkata)"
                },
                "event_type": {
                    "type": "string",
                    "description": "Triggering event: cyclone, monsoon, cold_wave, festival"
                },
                "run_id": {
                    "type": "string",
                    "description": "Optional run ID for workflow continuity"
                }
            },
            "required": ["product_sku", "region"],
            "additionalProperties": false
        }),
    }
}

/// Get the inventory optimization tool definition
fn get_optimize_inventory_tool() -> Tool {
    Tool {
        name: "supply_optimize_inventory".to_string(),
        description: "Plan inter-warehouse transfers to cover forecasted demand at a target region. Each source keeps a 30% holdback; any residual gap becomes an external reorder with a 20% safety buffer.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "product_sku": {
                    "type": "string",
                    "description": "SKU of the product to rebalance"
                },
                "region": {
                    "type": "string",
                    "description": "Target region whose warehouse must be stocked"
                },
                "forecasted_demand": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Units of demand to cover (typically the 7-day total)"
                },
                "run_id": {
                    "type": "string",
                    "description": "Optional run ID for workflow continuity"
                }
            },
            "required": ["product_sku", "region", "forecasted_demand"],
            "additionalProperties": false
        }),
    }
}

/// Get the warehouse status tool definition
fn get_warehouse_status_tool() -> Tool {
    Tool {
        name: "supply_warehouse_status".to_string(),
        description: "Report capacity utilization for every warehouse in the network. Flags warehouses at or above 80% utilization as near capacity.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "run_id": {
                    "type": "string",
                    "description": "Optional run ID for workflow continuity"
                }
            },
            "additionalProperties": false
        }),
    }
}

/// Get the product listing tool definition
fn get_list_products_tool() -> Tool {
    Tool {
        name: "supply_list_products".to_string(),
        description: "List the product catalog with prices, suppliers, baseline sales rates, and spike triggers.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "run_id": {
                    "type": "string",
                    "description": "Optional run ID for workflow continuity"
                }
            },
            "additionalProperties": false
        }),
    }
}

/// Get the vendor negotiation tool definition
fn get_negotiate_vendor_tool() -> Tool {
    Tool {
        name: "supply_negotiate_vendor".to_string(),
        description: "Source a quantity from the supplier pool. Collects quotes, scores them on price, rating, and delivery speed, applies volume discounts, and issues a purchase order to the winner.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "product_sku": {
                    "type": "string",
                    "description": "SKU of the product to source"
                },
                "quantity": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Units to order"
                },
                "urgency": {
                    "type": "string",
                    "enum": ["normal", "high"],
                    "description": "High urgency pays a 10% premium for one day faster delivery (default: normal)"
                },
                "budget_limit": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Optional total budget ceiling in rupees"
                },
                "run_id": {
                    "type": "string",
                    "description": "Optional run ID for workflow continuity"
                }
            },
            "required": ["product_sku", "quantity"],
            "additionalProperties": false
        }),
    }
}

/// Get the route planning tool definition
fn get_plan_route_tool() -> Tool {
    Tool {
        name: "supply_plan_route".to_string(),
        description: "Plan delivery routes for a batch of shipments. Selects express truck, truck, or rail per leg based on distance and urgency, and applies weather delays for disrupted destinations.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "transfers": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "from_warehouse": { "type": "string", "description": "Origin warehouse or supplier" },
                            "to_warehouse": { "type": "string", "description": "Destination (default: Mumbai)" },
                            "quantity": { "type": "integer", "minimum": 1, "description": "Units to ship" },
                            "distance_km": { "type": "integer", "minimum": 1, "description": "Leg distance in km (default: 1000)" }
                        },
                        "required": ["from_warehouse", "quantity"]
                    },
                    "minItems": 1,
                    "description": "Shipments to route"
                },
                "urgency": {
                    "type": "string",
                    "enum": ["normal", "high"],
                    "description": "High urgency uses express trucks on short legs (default: normal)"
                },
                "disruption_region": {
                    "type": "string",
                    "description": "Region under a weather disruption; matching destinations get a 2 hour delay"
                },
                "run_id": {
                    "type": "string",
                    "description": "Optional run ID for workflow continuity"
                }
            },
            "required": ["transfers"],
            "additionalProperties": false
        }),
    }
}

/// Get the alert dispatch tool definition
fn get_send_alerts_tool() -> Tool {
    Tool {
        name: "supply_send_alerts".to_string(),
        description: "Render the optimization report, notify stakeholders on Slack and email by severity, and record an audit entry.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "event_description": {
                    "type": "string",
                    "description": "What happened (e.g. 'Cyclone approaching Mumbai')"
                },
                "region": {
                    "type": "string",
                    "description": "Affected region"
                },
                "spike_multiplier": {
                    "type": "number",
                    "minimum": 1,
                    "description": "Detected spike factor, if any"
                },
                "peak_demand": {
                    "type": "integer",
                    "description": "Peak daily demand from the forecast"
                },
                "reorder_quantity": {
                    "type": "integer",
                    "description": "External reorder size from the inventory plan"
                },
                "vendor_selected": {
                    "type": "string",
                    "description": "Selected supplier name"
                },
                "total_cost": {
                    "type": "integer",
                    "description": "Total cost across procurement and routing in rupees"
                },
                "severity": {
                    "type": "string",
                    "enum": ["info", "high", "critical"],
                    "description": "Alert severity controlling the recipient list (default: info)"
                },
                "run_id": {
                    "type": "string",
                    "description": "Optional run ID for workflow continuity"
                }
            },
            "required": ["event_description", "region"],
            "additionalProperties": false
        }),
    }
}

/// Get the full pipeline tool definition
fn get_run_pipeline_tool() -> Tool {
    Tool {
        name: "supply_run_pipeline".to_string(),
        description: "Run the full five-stage workflow: forecast demand, optimize inventory, negotiate with vendors when a reorder is needed, plan routes when there is something to ship, then alert stakeholders. Returns the final workflow state with the execution trace.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "product_sku": {
                    "type": "string",
                    "description": "SKU of the product to manage"
                },
                "region": {
                    "type": "string",
                    "description": "Target region"
                },
                "event_type": {
                    "type": "string",
                    "description": "Triggering event: cyclone, monsoon, cold_wave, festival"
                },
                "event_description": {
                    "type": "string",
                    "description": "Description used in the stakeholder report"
                },
                "urgency": {
                    "type": "string",
                    "enum": ["normal", "high"],
                    "description": "Override sourcing/routing urgency (defaults by spike detection)"
                },
                "budget_limit": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Budget ceiling for vendor negotiation"
                },
                "disruption_region": {
                    "type": "string",
                    "description": "Region under a weather disruption, for routing delays"
                },
                "run_id": {
                    "type": "string",
                    "description": "Optional run ID (a new run is created if absent)"
                }
            },
            "required": ["product_sku", "region"],
            "additionalProperties": false
        }),
    }
}

/// Get the execution trace tool definition
fn get_execution_trace_tool() -> Tool {
    Tool {
        name: "supply_execution_trace".to_string(),
        description: "Fetch the persisted execution trace for a run: every stage invocation in order with inputs, outputs, latency, and success status.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "run_id": {
                    "type": "string",
                    "description": "The run ID to inspect"
                }
            },
            "required": ["run_id"],
            "additionalProperties": false
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::AppState;
    use crate::storage::SqliteStorage;
    use std::sync::Arc;

    async fn test_server() -> McpServer {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        McpServer::new(Arc::new(AppState::new(Config::default(), storage)))
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::json!(1)),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn test_initialize_handshake() {
        let server = test_server().await;
        let response = server.handle_request(request("initialize", None)).await.unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "mcp-supplyflow");
        assert_eq!(result["protocolVersion"], "2024-11-05");
    }

    #[tokio::test]
    async fn test_initialized_notification_gets_no_response() {
        let server = test_server().await;
        let response = server
            .handle_request(JsonRpcRequest {
                jsonrpc: "2.0".to_string(),
                id: None,
                method: "initialized".to_string(),
                params: None,
            })
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_tools_list_advertises_nine_tools() {
        let server = test_server().await;
        let response = server.handle_request(request("tools/list", None)).await.unwrap();

        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 9);
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"supply_forecast_demand"));
        assert!(names.contains(&"supply_run_pipeline"));
        assert!(names.contains(&"supply_execution_trace"));
    }

    #[tokio::test]
    async fn test_unknown_method_is_an_error() {
        let server = test_server().await;
        let response = server.handle_request(request("bogus/method", None)).await.unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_tool_call_roundtrip() {
        let server = test_server().await;
        let response = server
            .handle_request(request(
                "tools/call",
                Some(serde_json::json!({
                    "name": "supply_list_products",
                    "arguments": {}
                })),
            ))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert!(result["isError"].is_null());
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("RC-FULL-NVY-M"));
    }

    #[tokio::test]
    async fn test_tool_call_error_is_flagged() {
        let server = test_server().await;
        let response = server
            .handle_request(request(
                "tools/call",
                Some(serde_json::json!({
                    "name": "supply_no_such_tool",
                    "arguments": {}
                })),
            ))
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
    }

    #[tokio::test]
    async fn test_ping_returns_empty_object() {
        let server = test_server().await;
        let response = server.handle_request(request("ping", None)).await.unwrap();
        assert_eq!(response.result.unwrap(), serde_json::json!({}));
    }
}
