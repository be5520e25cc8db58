//! Demand forecasting stage.
//!
//! Produces a 7-day forecast from the product baseline and the signals
//! available for the region: weather events, social mentions, seasonal
//! patterns. Detects demand spikes and scores forecast confidence.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{serialize_for_trace, StageCore};
use crate::catalog::{Catalog, Product};
use crate::error::{AppResult, ToolError};
use crate::state::{DailyDemand, DemandForecast, WorkflowState};
use crate::storage::{Run, SqliteStorage, TraceEntry};

/// Stage name used in trace entries.
pub const DEMAND_STAGE: &str = "demand";
/// Tool name the stage is invoked through.
pub const FORECAST_TOOL: &str = "supply_forecast_demand";

/// Day index (0-based) at which demand peaks within the horizon.
const PEAK_DAY: usize = 2;
/// Forecast horizon in days.
const HORIZON_DAYS: usize = 7;
/// A peak above this multiple of baseline counts as a spike.
const SPIKE_THRESHOLD: i64 = 3;

/// Input parameters for demand forecasting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastParams {
    /// Product SKU (e.g. RC-FULL-NVY-M).
    pub product_sku: String,
    /// Region name (e.g. Mumbai, Delhi).
    pub region: String,
    /// Triggering event: cyclone, monsoon, cold_wave, festival.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Optional run ID (creates a new run if not provided).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// Weather outlook derived from the event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WeatherOutlook {
    HeavyRain,
    ColdWave,
    Normal,
}

impl WeatherOutlook {
    fn from_event(event_type: Option<&str>) -> Self {
        match event_type {
            Some("cyclone") | Some("monsoon") => WeatherOutlook::HeavyRain,
            Some("cold_wave") => WeatherOutlook::ColdWave,
            _ => WeatherOutlook::Normal,
        }
    }

    fn high_impact(self) -> bool {
        self != WeatherOutlook::Normal
    }
}

/// Social media signal for a product.
///
/// The feed integration is out of scope; the stage carries a fixed demo
/// signal that by itself never crosses the trending threshold.
#[derive(Debug, Clone, Copy)]
struct SocialSignal {
    mentions: i64,
    trending: bool,
}

impl SocialSignal {
    fn demo() -> Self {
        Self {
            mentions: 1500,
            trending: false,
        }
    }
}

/// Demand forecasting stage handler.
#[derive(Clone)]
pub struct DemandStage {
    core: StageCore,
}

impl DemandStage {
    /// Create a new demand stage.
    pub fn new(catalog: Arc<Catalog>, storage: SqliteStorage) -> Self {
        Self {
            core: StageCore::new(catalog, storage),
        }
    }

    /// Forecast demand for a product in a region over the next 7 days.
    pub async fn forecast(
        &self,
        run: &mut Run,
        state: &mut WorkflowState,
        params: &ForecastParams,
    ) -> AppResult<DemandForecast> {
        let start = Instant::now();
        debug!(
            run_id = %run.id,
            sku = %params.product_sku,
            region = %params.region,
            "Forecasting demand"
        );

        let entry = TraceEntry::new(
            &run.id,
            DEMAND_STAGE,
            FORECAST_TOOL,
            serialize_for_trace(params, "forecast input"),
        );

        let forecast = match self.compute(params) {
            Ok(forecast) => forecast,
            Err(e) => {
                let latency = start.elapsed().as_millis() as i64;
                self.core
                    .commit_failure(run, state, entry.failure(e.to_string(), latency))
                    .await?;
                return Err(e);
            }
        };

        let latency = start.elapsed().as_millis() as i64;
        let entry = entry.success(serialize_for_trace(&forecast, "forecast output"), latency);
        let summary = format!(
            "peak {} units/day ({}x baseline), spike={}",
            forecast.peak_demand, forecast.spike_multiplier, forecast.spike_detected
        );

        state.set_demand(forecast.clone());
        self.core.commit(run, state, entry, summary).await?;

        info!(
            run_id = %run.id,
            sku = %params.product_sku,
            peak_demand = forecast.peak_demand,
            spike_detected = forecast.spike_detected,
            latency_ms = latency,
            "Demand forecast completed"
        );

        Ok(forecast)
    }

    fn compute(&self, params: &ForecastParams) -> AppResult<DemandForecast> {
        if params.product_sku.trim().is_empty() {
            return Err(ToolError::Validation {
                field: "product_sku".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        if params.region.trim().is_empty() {
            return Err(ToolError::Validation {
                field: "region".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        let product = self.core.catalog().product(&params.product_sku)?;
        let weather = WeatherOutlook::from_event(params.event_type.as_deref());
        let social = SocialSignal::demo();

        let baseline = product.avg_daily_sales;
        let (multiplier, factors) = effective_multiplier(product, weather, social);

        let today = Utc::now();
        let mut daily_forecast = Vec::with_capacity(HORIZON_DAYS);
        for day in 0..HORIZON_DAYS {
            let demand = daily_demand(baseline, multiplier, day);
            daily_forecast.push(DailyDemand {
                day: day as i64 + 1,
                date: (today + Duration::days(day as i64))
                    .format("%Y-%m-%d")
                    .to_string(),
                predicted_demand: demand,
            });
        }

        let peak_demand = daily_forecast[PEAK_DAY].predicted_demand;
        let peak_date = daily_forecast[PEAK_DAY].date.clone();
        let total_7day_demand = daily_forecast.iter().map(|d| d.predicted_demand).sum();
        let spike_detected = peak_demand > baseline * SPIKE_THRESHOLD;

        let confidence = if weather.high_impact() { 0.92 } else { 0.85 };

        Ok(DemandForecast {
            product_sku: product.sku.clone(),
            product_name: product.name.clone(),
            region: params.region.clone(),
            event_type: params.event_type.clone(),
            baseline_demand: baseline,
            daily_forecast,
            peak_demand,
            peak_date,
            spike_detected,
            spike_multiplier: (multiplier * 10.0).round() / 10.0,
            confidence,
            total_7day_demand,
            factors,
            timestamp: Utc::now(),
        })
    }
}

/// Combine weather and social signals into a demand multiplier.
fn effective_multiplier(
    product: &Product,
    weather: WeatherOutlook,
    social: SocialSignal,
) -> (f64, Vec<String>) {
    let mut multiplier = 1.0;
    let mut factors = Vec::new();

    match weather {
        WeatherOutlook::HeavyRain => {
            if product.sku.contains("RC-FULL") || product.sku.contains("WP-SHOE") {
                multiplier *= product.spike_multiplier.unwrap_or(12.0);
                factors.push(format!("Heavy rain forecast (+{}x)", multiplier));
            }
        }
        WeatherOutlook::ColdWave => {
            if product.sku.contains("WJ-") || product.sku.contains("SW-") {
                multiplier *= product.spike_multiplier.unwrap_or(6.0);
                factors.push(format!("Cold wave (+{}x)", multiplier));
            }
        }
        WeatherOutlook::Normal => {}
    }

    if social.mentions > 1000 && social.trending {
        multiplier *= 1.2;
        factors.push("Social media trending (+20%)".to_string());
    }

    (multiplier, factors)
}

/// Demand for one day of the horizon: ramp to the peak, then 20%/day decay
/// floored at 30% of peak.
fn daily_demand(baseline: i64, multiplier: f64, day: usize) -> i64 {
    let baseline = baseline as f64;
    let value = if day < PEAK_DAY {
        baseline * (1.0 + (multiplier - 1.0) * (day as f64 / PEAK_DAY as f64))
    } else if day == PEAK_DAY {
        baseline * multiplier
    } else {
        let days_after_peak = (day - PEAK_DAY) as f64;
        let decline = (1.0 - days_after_peak * 0.2).max(0.3);
        baseline * multiplier * decline
    };
    value as i64
}
