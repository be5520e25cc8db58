//! Vendor negotiation stage.
//!
//! Matches the product to eligible suppliers, prices quotes off the base
//! price table and supplier rating, scores them on price, quality, and
//! delivery speed, then negotiates a bulk discount and issues a purchase
//! order. Sourcing failures are structured outcomes, not errors: the
//! pipeline records them and continues.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{serialize_for_trace, StageCore};
use crate::catalog::{Catalog, Supplier};
use crate::error::{AppResult, ToolError};
use crate::state::{PurchaseOrder, SourcingStatus, VendorOutcome, VendorQuote, WorkflowState};
use crate::storage::{Run, SqliteStorage, TraceEntry};

/// Stage name used in trace entries.
pub const VENDOR_STAGE: &str = "vendor";
/// Tool name the stage is invoked through.
pub const NEGOTIATE_TOOL: &str = "supply_negotiate_vendor";

/// Scoring weights: price 40, quality 30, delivery 30.
const PRICE_WEIGHT: f64 = 40.0;
const QUALITY_WEIGHT: f64 = 30.0;
const DELIVERY_WEIGHT: f64 = 30.0;

/// Sourcing urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    Normal,
    High,
}

/// Input parameters for vendor negotiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiateParams {
    /// Product SKU to source.
    pub product_sku: String,
    /// Quantity needed.
    pub quantity: i64,
    /// Urgency level; high pays a premium for one day faster delivery.
    #[serde(default)]
    pub urgency: Urgency,
    /// Maximum budget in rupees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_limit: Option<i64>,
    /// Optional run ID (creates a new run if not provided).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// Vendor negotiation stage handler.
#[derive(Clone)]
pub struct VendorStage {
    core: StageCore,
}

impl VendorStage {
    /// Create a new vendor stage.
    pub fn new(catalog: Arc<Catalog>, storage: SqliteStorage) -> Self {
        Self {
            core: StageCore::new(catalog, storage),
        }
    }

    /// Source a quantity of a product from the supplier pool.
    pub async fn negotiate(
        &self,
        run: &mut Run,
        state: &mut WorkflowState,
        params: &NegotiateParams,
    ) -> AppResult<VendorOutcome> {
        let start = Instant::now();
        debug!(
            run_id = %run.id,
            sku = %params.product_sku,
            quantity = params.quantity,
            "Negotiating with vendors"
        );

        let entry = TraceEntry::new(
            &run.id,
            VENDOR_STAGE,
            NEGOTIATE_TOOL,
            serialize_for_trace(params, "negotiate input"),
        );

        let outcome = match self.compute(params) {
            Ok(outcome) => outcome,
            Err(e) => {
                let latency = start.elapsed().as_millis() as i64;
                self.core
                    .commit_failure(run, state, entry.failure(e.to_string(), latency))
                    .await?;
                return Err(e);
            }
        };

        let latency = start.elapsed().as_millis() as i64;
        let entry = entry.success(serialize_for_trace(&outcome, "negotiate output"), latency);
        let summary = match outcome.status {
            SourcingStatus::Success => format!(
                "PO {} with {} for {} units",
                outcome
                    .purchase_order
                    .as_ref()
                    .map(|po| po.po_number.as_str())
                    .unwrap_or("?"),
                outcome.vendor_selected.as_deref().unwrap_or("?"),
                outcome.quantity
            ),
            SourcingStatus::NoSuppliers => "no eligible suppliers".to_string(),
            SourcingStatus::NoViableQuote => "no quote within constraints".to_string(),
        };

        state.set_vendor(outcome.clone());
        self.core.commit(run, state, entry, summary).await?;

        info!(
            run_id = %run.id,
            sku = %params.product_sku,
            status = ?outcome.status,
            vendor = outcome.vendor_selected.as_deref().unwrap_or("-"),
            latency_ms = latency,
            "Vendor negotiation completed"
        );

        Ok(outcome)
    }

    fn compute(&self, params: &NegotiateParams) -> AppResult<VendorOutcome> {
        if params.quantity <= 0 {
            return Err(ToolError::Validation {
                field: "quantity".to_string(),
                reason: "must be positive".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let eligible = self.find_suppliers(&params.product_sku);

        if eligible.is_empty() {
            warn!(sku = %params.product_sku, "No suppliers for product type");
            return Ok(sourcing_failure(
                params,
                SourcingStatus::NoSuppliers,
                format!("No suppliers found for {}", params.product_sku),
                0,
            ));
        }

        let quotes = self.collect_quotes(params, &eligible);
        let Some(best) = select_best(&quotes, params.budget_limit) else {
            return Ok(sourcing_failure(
                params,
                SourcingStatus::NoViableQuote,
                "No suitable vendor found within constraints".to_string(),
                quotes.len(),
            ));
        };

        let (final_quote, savings) = negotiate_discount(best, params.quantity);
        let po = build_purchase_order(&final_quote, &params.product_sku, params.quantity);

        Ok(VendorOutcome {
            status: SourcingStatus::Success,
            product_sku: params.product_sku.clone(),
            quantity: params.quantity,
            vendor_selected: Some(final_quote.supplier_name.clone()),
            vendor_id: Some(final_quote.supplier_id.clone()),
            unit_price: Some(final_quote.unit_price),
            total_price: Some(final_quote.total_price),
            delivery_days: Some(final_quote.delivery_days),
            delivery_date: Some(final_quote.delivery_date.clone()),
            purchase_order: Some(po),
            quotes_compared: quotes.len(),
            negotiation_savings: savings,
            message: None,
            timestamp: now,
        })
    }

    /// Suppliers whose specialties cover the product's type, inferred from
    /// the SKU prefix.
    fn find_suppliers(&self, sku: &str) -> Vec<Supplier> {
        let product_type = if sku.contains("RC-") || sku.contains("WP-") {
            "Rainwear"
        } else if sku.contains("WJ-") || sku.contains("SW-") {
            "Winter Wear"
        } else if sku.contains("TS-") {
            "T-Shirts"
        } else if sku.contains("KT-") {
            "Ethnic Wear"
        } else {
            return Vec::new();
        };

        self.core
            .catalog()
            .suppliers_for_type(product_type)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Price RFQs per supplier. Suppliers whose MOQ exceeds the quantity do
    /// not quote.
    fn collect_quotes(&self, params: &NegotiateParams, suppliers: &[Supplier]) -> Vec<VendorQuote> {
        let base_price = self.core.catalog().base_price(&params.product_sku);
        let mut quotes = Vec::new();

        for supplier in suppliers {
            if params.quantity < supplier.min_order_quantity {
                continue;
            }

            let price_factor = 1.0 + (100 - supplier.rating) as f64 / 200.0;
            let mut unit_price = (base_price as f64 * price_factor) as i64;

            let delivery_days = match params.urgency {
                Urgency::High => {
                    unit_price = (unit_price as f64 * 1.1) as i64;
                    supplier.avg_delivery_days - 1
                }
                Urgency::Normal => supplier.avg_delivery_days,
            };

            quotes.push(VendorQuote {
                supplier_id: supplier.id.clone(),
                supplier_name: supplier.name.clone(),
                supplier_rating: supplier.rating,
                unit_price,
                total_price: unit_price * params.quantity,
                delivery_days,
                delivery_date: (Utc::now() + Duration::days(delivery_days))
                    .format("%Y-%m-%d")
                    .to_string(),
                payment_terms: supplier.payment_terms.clone(),
                location: supplier.location.clone(),
                score: None,
                negotiated: false,
            });
        }

        quotes
    }
}

/// Score the quotes within budget and pick the best; ties go to the first
/// maximum in supplier order.
fn select_best(quotes: &[VendorQuote], budget_limit: Option<i64>) -> Option<VendorQuote> {
    let affordable: Vec<&VendorQuote> = match budget_limit {
        Some(limit) => quotes.iter().filter(|q| q.total_price <= limit).collect(),
        None => quotes.iter().collect(),
    };
    if affordable.is_empty() {
        return None;
    }

    let min_total = affordable.iter().map(|q| q.total_price).min()? as f64;
    let min_days = affordable.iter().map(|q| q.delivery_days).min()? as f64;

    let mut best: Option<VendorQuote> = None;
    for quote in affordable {
        let price_score = (min_total / quote.total_price as f64) * PRICE_WEIGHT;
        let quality_score = (quote.supplier_rating as f64 / 100.0) * QUALITY_WEIGHT;
        // Same-day delivery scores as fast as the fastest quote
        let delivery_ratio = if quote.delivery_days == 0 {
            1.0
        } else {
            min_days / quote.delivery_days as f64
        };
        let delivery_score = delivery_ratio * DELIVERY_WEIGHT;
        let score = price_score + quality_score + delivery_score;

        let mut scored = quote.clone();
        scored.score = Some(score);
        match &best {
            Some(b) if b.score.unwrap_or(0.0) >= score => {}
            _ => best = Some(scored),
        }
    }

    best
}

/// Bulk discount on the selected quote: 5% above 200 units, 3% above 100.
fn negotiate_discount(mut quote: VendorQuote, quantity: i64) -> (VendorQuote, i64) {
    let discount_percent = if quantity > 200 {
        5
    } else if quantity > 100 {
        3
    } else {
        0
    };

    if discount_percent == 0 {
        return (quote, 0);
    }

    let original = quote.unit_price;
    let discounted = (original as f64 * (1.0 - discount_percent as f64 / 100.0)) as i64;
    let savings = (original - discounted) * quantity;

    quote.unit_price = discounted;
    quote.total_price = discounted * quantity;
    quote.negotiated = true;
    (quote, savings)
}

fn build_purchase_order(quote: &VendorQuote, sku: &str, quantity: i64) -> PurchaseOrder {
    let now = Utc::now();
    let sku_tag: String = sku.chars().take(6).collect();

    PurchaseOrder {
        po_number: format!("PO-{}-{}", now.format("%Y%m%d"), sku_tag),
        supplier_id: quote.supplier_id.clone(),
        supplier_name: quote.supplier_name.clone(),
        product_sku: sku.to_string(),
        quantity,
        unit_price: quote.unit_price,
        total_price: quote.total_price,
        delivery_date: quote.delivery_date.clone(),
        payment_terms: quote.payment_terms.clone(),
        issued_at: now,
        status: "confirmed".to_string(),
    }
}

fn sourcing_failure(
    params: &NegotiateParams,
    status: SourcingStatus,
    message: String,
    quotes_compared: usize,
) -> VendorOutcome {
    VendorOutcome {
        status,
        product_sku: params.product_sku.clone(),
        quantity: params.quantity,
        vendor_selected: None,
        vendor_id: None,
        unit_price: None,
        total_price: None,
        delivery_days: None,
        delivery_date: None,
        purchase_order: None,
        quotes_compared,
        negotiation_savings: 0,
        message: Some(message),
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    async fn stage_fixture() -> (VendorStage, Run, WorkflowState) {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let run = storage.get_or_create_run(&None).await.unwrap();
        let stage = VendorStage::new(Arc::new(Catalog::builtin()), storage);
        (stage, run, WorkflowState::new())
    }

    fn params(sku: &str, quantity: i64, urgency: Urgency, budget: Option<i64>) -> NegotiateParams {
        NegotiateParams {
            product_sku: sku.to_string(),
            quantity,
            urgency,
            budget_limit: budget,
            run_id: None,
        }
    }

    #[tokio::test]
    async fn test_urgent_raincoat_sourcing() {
        let (stage, mut run, mut state) = stage_fixture().await;

        let outcome = stage
            .negotiate(
                &mut run,
                &mut state,
                &params("RC-FULL-NVY-M", 79, Urgency::High, None),
            )
            .await
            .unwrap();

        // Only RainShield Fashion matches the Rainwear type
        assert_eq!(outcome.status, SourcingStatus::Success);
        assert_eq!(outcome.vendor_id.as_deref(), Some("SUP-002"));
        assert_eq!(outcome.quotes_compared, 1);

        // 280 * 1.03 = 288, urgency premium 288 * 1.1 = 316, one day faster
        assert_eq!(outcome.unit_price, Some(316));
        assert_eq!(outcome.total_price, Some(316 * 79));
        assert_eq!(outcome.delivery_days, Some(1));

        // 79 units earns no bulk discount
        assert_eq!(outcome.negotiation_savings, 0);

        let po = outcome.purchase_order.unwrap();
        assert!(po.po_number.starts_with("PO-"));
        assert!(po.po_number.ends_with("-RC-FUL"));
        assert_eq!(po.status, "confirmed");
    }

    #[tokio::test]
    async fn test_bulk_discount_above_200_units() {
        let (stage, mut run, mut state) = stage_fixture().await;

        let outcome = stage
            .negotiate(
                &mut run,
                &mut state,
                &params("RC-FULL-NVY-M", 250, Urgency::Normal, None),
            )
            .await
            .unwrap();

        // 288 discounted 5% to 273
        assert_eq!(outcome.unit_price, Some(273));
        assert_eq!(outcome.total_price, Some(273 * 250));
        assert_eq!(outcome.negotiation_savings, (288 - 273) * 250);
        assert_eq!(outcome.delivery_days, Some(2));
    }

    #[tokio::test]
    async fn test_moq_filters_out_supplier() {
        let (stage, mut run, mut state) = stage_fixture().await;

        // Cotton Mills India wants 200 minimum; 150 leaves no quotes
        let outcome = stage
            .negotiate(
                &mut run,
                &mut state,
                &params("TS-CREW-WHT-M", 150, Urgency::Normal, None),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, SourcingStatus::NoViableQuote);
        assert!(outcome.purchase_order.is_none());
        assert_eq!(outcome.quotes_compared, 0);
    }

    #[tokio::test]
    async fn test_unknown_product_type_has_no_suppliers() {
        let (stage, mut run, mut state) = stage_fixture().await;

        let outcome = stage
            .negotiate(
                &mut run,
                &mut state,
                &params("XX-MISC-GRN-S", 100, Urgency::Normal, None),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, SourcingStatus::NoSuppliers);
        assert!(outcome.message.as_deref().unwrap().contains("XX-MISC"));
        // Failure outcome is still a traced state write
        assert!(state.vendor.is_some());
        assert_eq!(state.execution_trace.len(), 1);
        assert!(state.execution_trace[0].success);
    }

    #[tokio::test]
    async fn test_budget_ceiling_drops_quotes() {
        let (stage, mut run, mut state) = stage_fixture().await;

        // 288 * 79 = 22752 over a 20000 ceiling
        let outcome = stage
            .negotiate(
                &mut run,
                &mut state,
                &params("RC-FULL-NVY-M", 79, Urgency::Normal, Some(20_000)),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, SourcingStatus::NoViableQuote);
        assert_eq!(outcome.quotes_compared, 1);
    }

    #[tokio::test]
    async fn test_invalid_quantity_is_an_error() {
        let (stage, mut run, mut state) = stage_fixture().await;

        let err = stage
            .negotiate(
                &mut run,
                &mut state,
                &params("RC-FULL-NVY-M", 0, Urgency::Normal, None),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("quantity"));
        assert!(state.vendor.is_none());
    }

    #[test]
    fn test_scoring_prefers_cheaper_on_tie_rating() {
        let quote = |id: &str, total: i64, rating: i64, days: i64| VendorQuote {
            supplier_id: id.to_string(),
            supplier_name: id.to_string(),
            supplier_rating: rating,
            unit_price: 1,
            total_price: total,
            delivery_days: days,
            delivery_date: "2026-01-01".to_string(),
            payment_terms: "Net 30".to_string(),
            location: "-".to_string(),
            score: None,
            negotiated: false,
        };

        let quotes = vec![
            quote("A", 10_000, 90, 3),
            quote("B", 12_000, 90, 3),
        ];
        let best = select_best(&quotes, None).unwrap();
        assert_eq!(best.supplier_id, "A");
    }

    #[test]
    fn test_first_maximum_wins_on_equal_scores() {
        let quote = |id: &str| VendorQuote {
            supplier_id: id.to_string(),
            supplier_name: id.to_string(),
            supplier_rating: 90,
            unit_price: 100,
            total_price: 10_000,
            delivery_days: 2,
            delivery_date: "2026-01-01".to_string(),
            payment_terms: "Net 30".to_string(),
            location: "-".to_string(),
            score: None,
            negotiated: false,
        };

        let quotes = vec![quote("first"), quote("second")];
        let best = select_best(&quotes, None).unwrap();
        assert_eq!(best.supplier_id, "first");
    }

    #[test]
    fn test_discount_marks_quote_negotiated() {
        let quote = VendorQuote {
            supplier_id: "SUP-002".to_string(),
            supplier_name: "RainShield Fashion".to_string(),
            supplier_rating: 88,
            unit_price: 288,
            total_price: 288 * 250,
            delivery_days: 2,
            delivery_date: "2026-01-01".to_string(),
            payment_terms: "Net 30".to_string(),
            location: "Mumbai".to_string(),
            score: None,
            negotiated: false,
        };

        let (discounted, savings) = negotiate_discount(quote.clone(), 250);
        assert!(discounted.negotiated);
        assert_eq!(discounted.unit_price, 273);
        assert_eq!(savings, (288 - 273) * 250);

        // Below the 100-unit tier the quote stays untouched
        let (untouched, savings) = negotiate_discount(quote, 79);
        assert!(!untouched.negotiated);
        assert_eq!(untouched.unit_price, 288);
        assert_eq!(savings, 0);
    }
}
