//! Pipeline stage implementations.
//!
//! Five decision stages, each a specialist over the shared workflow state:
//! - [`DemandStage`]: 7-day demand forecasting with spike detection
//! - [`InventoryStage`]: gap analysis and inter-warehouse transfer planning
//! - [`VendorStage`]: supplier RFQs, quote scoring, and purchase orders
//! - [`RoutingStage`]: transport mode selection and delivery scheduling
//! - [`AlertStage`]: stakeholder report rendering and notification dispatch
//!
//! All stages share common infrastructure via [`StageCore`] composition.
//! A stage invocation always appends exactly one trace record, on success
//! and on failure alike; section writes into the state replace the previous
//! value for that section.

mod alert;
mod core;
mod demand;
mod inventory;
mod routing;
mod vendor;

pub use alert::*;
pub use core::*;
pub use demand::*;
pub use inventory::*;
pub use routing::*;
pub use vendor::*;

use tracing::warn;

/// Serialize a value to JSON for trace logging, with warning on failure.
///
/// Instead of panicking or silently failing on serialization errors,
/// it logs a warning and returns an error object.
pub(crate) fn serialize_for_trace<T: serde::Serialize>(
    value: &T,
    context: &str,
) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        warn!(
            error = %e,
            context = %context,
            "Failed to serialize value for trace entry"
        );
        serde_json::json!({
            "serialization_error": e.to_string(),
            "context": context
        })
    })
}
