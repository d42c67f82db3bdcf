use serde::Deserialize;

use crate::domain::forecast::{DEFAULT_FORECAST_MONTHS, MonthlyRevenue};

/// Longest horizon a forecast may be requested for.
pub const MAX_FORECAST_MONTHS: u32 = 24;

/// Payload accepted by `POST /analytics/revenue-forecast`.
#[derive(Debug, Deserialize)]
pub struct RevenueForecastForm {
    pub history: Vec<MonthlyRevenue>,
    pub months: Option<u32>,
}

/// Query parameters accepted by `GET /analytics/revenue-forecast`.
#[derive(Debug, Default, Deserialize)]
pub struct RevenueForecastQuery {
    pub months: Option<u32>,
}

/// Requested horizon, defaulted and clamped to `1..=MAX_FORECAST_MONTHS`.
pub fn forecast_months(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_FORECAST_MONTHS)
        .clamp(1, MAX_FORECAST_MONTHS)
}
