//! Built-in reference data for the StyleFlow India supply network.
//!
//! One fashion catalog, five regional warehouses, six suppliers, and three
//! canned spike events. Quantities here are the fixed snapshot every
//! pipeline run plans against.

use std::collections::HashMap;

use super::{Catalog, DemoEvent, Product, Supplier, Warehouse};

pub(super) fn build() -> Catalog {
    Catalog::new(
        products(),
        warehouses(),
        suppliers(),
        demo_events(),
        base_prices(),
        distances_km(),
    )
}

fn product(
    sku: &str,
    name: &str,
    category: &str,
    price: i64,
    cost: i64,
    suppliers: &[&str],
    avg_daily_sales: i64,
    spike_triggers: &[&str],
    spike_multiplier: Option<f64>,
) -> Product {
    Product {
        sku: sku.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        price,
        cost,
        suppliers: suppliers.iter().map(|s| s.to_string()).collect(),
        avg_daily_sales,
        spike_triggers: spike_triggers.iter().map(|s| s.to_string()).collect(),
        spike_multiplier,
    }
}

fn products() -> Vec<Product> {
    vec![
        product(
            "WJ-DNM-BLK-M",
            "Denim Winter Jacket - Black - Medium",
            "Winter Jackets",
            2499,
            800,
            &["Fashion Hub Delhi", "Winter Wear Co"],
            12,
            &["temperature_drop", "winter_start", "festival_diwali"],
            None,
        ),
        product(
            "WJ-DNM-BLK-L",
            "Denim Winter Jacket - Black - Large",
            "Winter Jackets",
            2499,
            800,
            &["Fashion Hub Delhi", "Winter Wear Co"],
            18,
            &["temperature_drop", "winter_start", "festival_diwali"],
            None,
        ),
        product(
            "WJ-DNM-BLK-XL",
            "Denim Winter Jacket - Black - XL",
            "Winter Jackets",
            2499,
            800,
            &["Fashion Hub Delhi", "Winter Wear Co"],
            15,
            &["temperature_drop", "winter_start", "festival_diwali"],
            None,
        ),
        product(
            "SW-HOOD-GRY-L",
            "Hooded Sweatshirt - Grey - Large",
            "Sweatshirts",
            1299,
            420,
            &["Cotton Comfort Ltd"],
            25,
            &["temperature_drop", "winter_start"],
            None,
        ),
        product(
            "RC-FULL-NVY-M",
            "Full-Length Raincoat - Navy Blue - Medium",
            "Raincoats",
            899,
            280,
            &["RainShield Fashion", "Monsoon Styles"],
            8,
            &["heavy_rain_forecast", "cyclone_warning", "monsoon_start"],
            Some(12.0),
        ),
        product(
            "RC-FULL-NVY-L",
            "Full-Length Raincoat - Navy Blue - Large",
            "Raincoats",
            899,
            280,
            &["RainShield Fashion", "Monsoon Styles"],
            12,
            &["heavy_rain_forecast", "cyclone_warning", "monsoon_start"],
            Some(12.0),
        ),
        product(
            "WP-SHOE-BLK-42",
            "Waterproof Sneakers - Black - Size 42",
            "Footwear",
            1799,
            580,
            &["FootWear Direct"],
            15,
            &["heavy_rain_forecast", "monsoon_start"],
            Some(5.0),
        ),
        product(
            "TS-CREW-WHT-M",
            "Crew Neck T-Shirt - White - Medium",
            "T-Shirts",
            499,
            150,
            &["Cotton Mills India", "Textile Hub"],
            45,
            &["temperature_rise", "summer_sale"],
            None,
        ),
        product(
            "TS-CREW-WHT-L",
            "Crew Neck T-Shirt - White - Large",
            "T-Shirts",
            499,
            150,
            &["Cotton Mills India", "Textile Hub"],
            52,
            &["temperature_rise", "summer_sale"],
            None,
        ),
        product(
            "KT-SILK-RED-M",
            "Silk Kurta - Red - Medium",
            "Ethnic Wear",
            1899,
            620,
            &["Ethnic Fashion House"],
            8,
            &["diwali", "navratri", "wedding_season"],
            Some(8.0),
        ),
    ]
}

fn warehouse(
    id: &str,
    name: &str,
    region: &str,
    location: &str,
    capacity: i64,
    stock: &[(&str, i64)],
) -> Warehouse {
    Warehouse {
        id: id.to_string(),
        name: name.to_string(),
        region: region.to_string(),
        location: location.to_string(),
        capacity,
        stock: stock
            .iter()
            .map(|(sku, qty)| (sku.to_string(), *qty))
            .collect(),
    }
}

fn warehouses() -> Vec<Warehouse> {
    vec![
        warehouse(
            "WH-MUM",
            "Mumbai Warehouse",
            "Mumbai",
            "Andheri East, Mumbai",
            50000,
            &[
                ("WJ-DNM-BLK-M", 120),
                ("WJ-DNM-BLK-L", 180),
                ("WJ-DNM-BLK-XL", 150),
                ("SW-HOOD-GRY-L", 280),
                ("RC-FULL-NVY-M", 50),
                ("RC-FULL-NVY-L", 80),
                ("WP-SHOE-BLK-42", 120),
                ("TS-CREW-WHT-M", 450),
                ("TS-CREW-WHT-L", 520),
                ("KT-SILK-RED-M", 60),
            ],
        ),
        warehouse(
            "WH-DEL",
            "Delhi Warehouse",
            "Delhi",
            "Naraina, Delhi",
            40000,
            &[
                ("WJ-DNM-BLK-M", 200),
                ("WJ-DNM-BLK-L", 280),
                ("WJ-DNM-BLK-XL", 220),
                ("SW-HOOD-GRY-L", 350),
                ("RC-FULL-NVY-M", 180),
                ("RC-FULL-NVY-L", 220),
                ("WP-SHOE-BLK-42", 180),
                ("TS-CREW-WHT-M", 380),
                ("TS-CREW-WHT-L", 420),
                ("KT-SILK-RED-M", 80),
            ],
        ),
        warehouse(
            "WH-BLR",
            "Bangalore Warehouse",
            "Bangalore",
            "Whitefield, Bangalore",
            35000,
            &[
                ("WJ-DNM-BLK-M", 100),
                ("WJ-DNM-BLK-L", 150),
                ("WJ-DNM-BLK-XL", 120),
                ("SW-HOOD-GRY-L", 200),
                ("RC-FULL-NVY-M", 120),
                ("RC-FULL-NVY-L", 160),
                ("WP-SHOE-BLK-42", 150),
                ("TS-CREW-WHT-M", 500),
                ("TS-CREW-WHT-L", 580),
                ("KT-SILK-RED-M", 40),
            ],
        ),
        warehouse(
            "WH-CHN",
            "Chennai Warehouse",
            "Chennai",
            "Ambattur, Chennai",
            25000,
            &[
                ("WJ-DNM-BLK-M", 60),
                ("WJ-DNM-BLK-L", 80),
                ("WJ-DNM-BLK-XL", 70),
                ("SW-HOOD-GRY-L", 120),
                ("RC-FULL-NVY-M", 40),
                ("RC-FULL-NVY-L", 60),
                ("WP-SHOE-BLK-42", 80),
                ("TS-CREW-WHT-M", 350),
                ("TS-CREW-WHT-L", 420),
                ("KT-SILK-RED-M", 30),
            ],
        ),
        warehouse(
            "WH-KOL",
            "Kolkata Warehouse",
            "Kolkata",
            "Salt Lake, Kolkata",
            30000,
            &[
                ("WJ-DNM-BLK-M", 90),
                ("WJ-DNM-BLK-L", 120),
                ("WJ-DNM-BLK-XL", 100),
                ("SW-HOOD-GRY-L", 180),
                ("RC-FULL-NVY-M", 70),
                ("RC-FULL-NVY-L", 100),
                ("WP-SHOE-BLK-42", 100),
                ("TS-CREW-WHT-M", 280),
                ("TS-CREW-WHT-L", 320),
                ("KT-SILK-RED-M", 50),
            ],
        ),
    ]
}

fn supplier(
    id: &str,
    name: &str,
    location: &str,
    rating: i64,
    min_order_quantity: i64,
    avg_delivery_days: i64,
    specialties: &[&str],
    payment_terms: &str,
    contact: &str,
) -> Supplier {
    Supplier {
        id: id.to_string(),
        name: name.to_string(),
        location: location.to_string(),
        rating,
        min_order_quantity,
        avg_delivery_days,
        specialties: specialties.iter().map(|s| s.to_string()).collect(),
        payment_terms: payment_terms.to_string(),
        contact: contact.to_string(),
    }
}

fn suppliers() -> Vec<Supplier> {
    vec![
        supplier(
            "SUP-001",
            "Fashion Hub Delhi",
            "Noida, Delhi NCR",
            96,
            100,
            3,
            &["Winter Wear", "Jackets"],
            "Net 30",
            "procurement@fashionhub.in",
        ),
        supplier(
            "SUP-002",
            "RainShield Fashion",
            "Pune, Maharashtra",
            94,
            50,
            2,
            &["Rainwear", "Monsoon Essentials"],
            "Net 30",
            "sales@rainshield.in",
        ),
        supplier(
            "SUP-003",
            "Cotton Mills India",
            "Coimbatore, Tamil Nadu",
            98,
            200,
            4,
            &["T-Shirts", "Cotton Wear"],
            "Net 45",
            "orders@cottonmills.in",
        ),
        supplier(
            "SUP-004",
            "Winter Wear Co",
            "Ludhiana, Punjab",
            92,
            80,
            3,
            &["Sweatshirts", "Hoodies", "Winter Jackets"],
            "Net 30",
            "business@winterwear.in",
        ),
        supplier(
            "SUP-005",
            "Monsoon Styles",
            "Mumbai, Maharashtra",
            90,
            50,
            1,
            &["Raincoats", "Waterproof Accessories"],
            "Net 15",
            "quick@monsoonstyles.in",
        ),
        supplier(
            "SUP-006",
            "Ethnic Fashion House",
            "Surat, Gujarat",
            95,
            50,
            3,
            &["Ethnic Wear", "Festival Collection"],
            "Net 30",
            "info@ethnicfashion.in",
        ),
    ]
}

fn demo_events() -> Vec<DemoEvent> {
    vec![
        DemoEvent {
            key: "monsoon_cyclone".to_string(),
            name: "Cyclone Nisarga Approaching Mumbai".to_string(),
            affected_regions: vec!["Mumbai".to_string(), "Pune".to_string()],
            affected_products: vec![
                "RC-FULL-NVY-M".to_string(),
                "RC-FULL-NVY-L".to_string(),
                "WP-SHOE-BLK-42".to_string(),
            ],
            spike_multiplier: 12.0,
            duration_days: 3,
        },
        DemoEvent {
            key: "winter_cold_wave".to_string(),
            name: "Cold Wave Hits North India".to_string(),
            affected_regions: vec![
                "Delhi".to_string(),
                "Chandigarh".to_string(),
                "Jaipur".to_string(),
            ],
            affected_products: vec![
                "WJ-DNM-BLK-M".to_string(),
                "WJ-DNM-BLK-L".to_string(),
                "SW-HOOD-GRY-L".to_string(),
            ],
            spike_multiplier: 6.0,
            duration_days: 7,
        },
        DemoEvent {
            key: "festival_diwali".to_string(),
            name: "Diwali Festival Sale".to_string(),
            affected_regions: vec!["All".to_string()],
            affected_products: vec!["KT-SILK-RED-M".to_string()],
            spike_multiplier: 8.0,
            duration_days: 10,
        },
    ]
}

fn base_prices() -> HashMap<String, i64> {
    [
        ("RC-FULL-NVY-M", 280),
        ("RC-FULL-NVY-L", 280),
        ("WP-SHOE-BLK-42", 580),
        ("WJ-DNM-BLK-M", 800),
        ("WJ-DNM-BLK-L", 800),
        ("SW-HOOD-GRY-L", 420),
        ("TS-CREW-WHT-M", 150),
        ("KT-SILK-RED-M", 620),
    ]
    .into_iter()
    .map(|(sku, price)| (sku.to_string(), price))
    .collect()
}

fn distances_km() -> HashMap<(String, String), i64> {
    [
        (("WH-DEL", "WH-MUM"), 1400),
        (("WH-BLR", "WH-MUM"), 980),
        (("WH-CHN", "WH-MUM"), 1300),
        (("WH-KOL", "WH-MUM"), 1900),
    ]
    .into_iter()
    .map(|((from, to), km)| ((from.to_string(), to.to_string()), km))
    .collect()
}
