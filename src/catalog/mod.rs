//! Read-only reference catalog for the supply network.
//!
//! Provides products, warehouses with their initial stock snapshot,
//! suppliers, and the demo events that trigger demand spikes. The catalog
//! is injected into each stage at construction; nothing in this module is
//! ever mutated after [`Catalog::builtin`] returns.

mod builtins;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// A sellable product, keyed by SKU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Stock-keeping unit, unique across the catalog.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Merchandising category (e.g. "Raincoats").
    pub category: String,
    /// Retail price in rupees.
    pub price: i64,
    /// Procurement cost in rupees.
    pub cost: i64,
    /// Names of suppliers known to carry this product.
    pub suppliers: Vec<String>,
    /// Average units sold per day under normal conditions.
    pub avg_daily_sales: i64,
    /// Event tags that can trigger a demand spike.
    pub spike_triggers: Vec<String>,
    /// Configured spike factor; stages fall back to category defaults
    /// when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spike_multiplier: Option<f64>,
}

/// A warehouse with its initial stock snapshot.
///
/// Stock reads during a pipeline run are against this fixed snapshot;
/// stages plan against it but never mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warehouse {
    /// Warehouse identifier (e.g. "WH-MUM").
    pub id: String,
    /// Display name.
    pub name: String,
    /// Region the warehouse serves.
    pub region: String,
    /// Street-level location.
    pub location: String,
    /// Total unit capacity.
    pub capacity: i64,
    /// SKU -> on-hand quantity.
    pub stock: HashMap<String, i64>,
}

/// A supplier eligible for RFQs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    /// Supplier identifier (e.g. "SUP-002").
    pub id: String,
    /// Display name.
    pub name: String,
    /// Location.
    pub location: String,
    /// Quality rating, 0-100.
    pub rating: i64,
    /// Minimum order quantity the supplier will accept.
    pub min_order_quantity: i64,
    /// Average delivery lead time in days.
    pub avg_delivery_days: i64,
    /// Specialty tags used for eligibility matching.
    pub specialties: Vec<String>,
    /// Payment terms (e.g. "Net 30").
    pub payment_terms: String,
    /// Procurement contact address.
    pub contact: String,
}

/// A canned demand-spike scenario for demos and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoEvent {
    /// Scenario key (e.g. "monsoon_cyclone").
    pub key: String,
    /// Human-readable event name.
    pub name: String,
    /// Regions affected.
    pub affected_regions: Vec<String>,
    /// SKUs affected.
    pub affected_products: Vec<String>,
    /// Expected spike factor.
    pub spike_multiplier: f64,
    /// Expected duration in days.
    pub duration_days: i64,
}

/// The read-only reference-data service.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
    warehouses: Vec<Warehouse>,
    suppliers: Vec<Supplier>,
    demo_events: Vec<DemoEvent>,
    base_prices: HashMap<String, i64>,
    distances_km: HashMap<(String, String), i64>,
}

/// Fallback inter-warehouse distance when the pair is not tabulated.
const DEFAULT_DISTANCE_KM: i64 = 1000;

/// Fallback per-unit quote price when the SKU is not tabulated.
const DEFAULT_BASE_PRICE: i64 = 300;

impl Catalog {
    /// Build the built-in catalog.
    pub fn builtin() -> Self {
        builtins::build()
    }

    pub(crate) fn new(
        products: Vec<Product>,
        warehouses: Vec<Warehouse>,
        suppliers: Vec<Supplier>,
        demo_events: Vec<DemoEvent>,
        base_prices: HashMap<String, i64>,
        distances_km: HashMap<(String, String), i64>,
    ) -> Self {
        Self {
            products,
            warehouses,
            suppliers,
            demo_events,
            base_prices,
            distances_km,
        }
    }

    /// All products, in catalog order.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Look up a product by SKU.
    pub fn product(&self, sku: &str) -> CatalogResult<&Product> {
        self.products
            .iter()
            .find(|p| p.sku == sku)
            .ok_or_else(|| CatalogError::ProductNotFound {
                sku: sku.to_string(),
            })
    }

    /// All warehouses, in catalog order.
    ///
    /// This order is the iteration order the inventory stage uses for its
    /// greedy transfer allocation.
    pub fn warehouses(&self) -> &[Warehouse] {
        &self.warehouses
    }

    /// Look up a warehouse by id.
    pub fn warehouse(&self, id: &str) -> Option<&Warehouse> {
        self.warehouses.iter().find(|w| w.id == id)
    }

    /// Resolve the warehouse serving a region.
    pub fn warehouse_for_region(&self, region: &str) -> CatalogResult<&Warehouse> {
        self.warehouses
            .iter()
            .find(|w| w.region.eq_ignore_ascii_case(region))
            .ok_or_else(|| CatalogError::WarehouseNotFound {
                region: region.to_string(),
            })
    }

    /// On-hand stock for a SKU at a warehouse (0 if not stocked).
    pub fn stock_of(&self, warehouse_id: &str, sku: &str) -> i64 {
        self.warehouse(warehouse_id)
            .and_then(|w| w.stock.get(sku).copied())
            .unwrap_or(0)
    }

    /// All suppliers, in catalog order.
    ///
    /// Catalog order also breaks scoring ties in vendor selection (first
    /// maximum wins).
    pub fn suppliers(&self) -> &[Supplier] {
        &self.suppliers
    }

    /// Suppliers whose specialty tags contain `product_type`,
    /// case-insensitively.
    pub fn suppliers_for_type(&self, product_type: &str) -> Vec<&Supplier> {
        let needle = product_type.to_lowercase();
        self.suppliers
            .iter()
            .filter(|s| {
                s.specialties
                    .iter()
                    .any(|spec| spec.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// The canned demo events.
    pub fn demo_events(&self) -> &[DemoEvent] {
        &self.demo_events
    }

    /// Base per-unit quote price for a SKU.
    pub fn base_price(&self, sku: &str) -> i64 {
        self.base_prices
            .get(sku)
            .copied()
            .unwrap_or(DEFAULT_BASE_PRICE)
    }

    /// Road distance between two warehouses in kilometres.
    pub fn distance_km(&self, from_id: &str, to_id: &str) -> i64 {
        self.distances_km
            .get(&(from_id.to_string(), to_id.to_string()))
            .copied()
            .unwrap_or(DEFAULT_DISTANCE_KM)
    }
}
