//! # Supply Chain MCP Server
//!
//! A Model Context Protocol (MCP) server that automates retail supply-chain
//! decisions through a fixed five-stage pipeline: demand forecasting,
//! inventory optimization, vendor negotiation, route planning, and
//! stakeholder alerting.
//!
//! ## Features
//!
//! - **Demand Forecasting**: 7-day forecast with weather and social signals
//! - **Inventory Optimization**: Greedy inter-warehouse rebalancing with
//!   holdbacks and safety buffers
//! - **Vendor Negotiation**: Quote scoring, volume discounts, and purchase
//!   order issuance
//! - **Route Planning**: Mode selection per leg with weather delays
//! - **Alerting**: Severity-based notification fan-out and audit records
//! - **Execution Trace**: Every stage invocation persisted per run
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (Rust) → Five-Stage Pipeline
//!                    ↓
//!              SQLite (runs + trace)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mcp_supplyflow::{AppState, Config, McpServer};
//! use mcp_supplyflow::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let state = Arc::new(AppState::new(config, storage));
//!     let server = McpServer::new(state);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

/// Static reference data: products, warehouses, suppliers, demo events.
pub mod catalog;
/// Configuration management for the MCP server.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Orchestrator executing the fixed five-stage workflow.
pub mod pipeline;
/// MCP server implementation and request handling.
pub mod server;
/// Stage handlers (demand, inventory, vendor, routing, alert).
pub mod stages;
/// Workflow state and stage result types.
pub mod state;
/// SQLite storage layer for runs and execution traces.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use pipeline::Orchestrator;
pub use server::{AppState, McpServer, SharedState};
