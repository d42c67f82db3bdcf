use serde::{Deserialize, Serialize};

/// Default number of months projected when none is requested.
pub const DEFAULT_FORECAST_MONTHS: u32 = 6;

/// Revenue recorded for one calendar month.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyRevenue {
    pub year: i32,
    /// Calendar month, 1-based.
    pub month: u32,
    pub revenue_cents: i64,
}

/// Projection for one future month under three scenarios.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyForecast {
    pub year: i32,
    pub month: u32,
    pub optimistic_cents: i64,
    pub realistic_cents: i64,
    pub pessimistic_cents: i64,
    /// Confidence in percent; decays the further out the month is.
    pub confidence: u32,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct ForecastStats {
    pub trend_slope: f64,
    /// Slope relative to the average revenue, in percent.
    pub growth_rate: f64,
    pub average_revenue_cents: i64,
    pub standard_deviation_cents: i64,
    pub forecast_months: u32,
    pub total_realistic_cents: i64,
    pub total_optimistic_cents: i64,
    pub total_pessimistic_cents: i64,
    pub average_confidence: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RevenueForecast {
    pub forecasts: Vec<MonthlyForecast>,
    pub stats: ForecastStats,
    pub history: Vec<MonthlyRevenue>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ForecastError {
    #[error("at least two months of revenue history are required")]
    NotEnoughHistory,
    #[error("invalid month in revenue history: {0}")]
    InvalidMonth(u32),
}

/// Construction seasonality multiplier for a calendar month.
pub fn seasonal_factor(month: u32) -> f64 {
    match month {
        1 => 0.9,
        2 => 0.85,
        3 => 1.2,
        4 => 1.05,
        5 | 6 => 1.0,
        7 => 0.95,
        8 => 0.9,
        9 => 1.05,
        10 | 11 => 1.1,
        12 => 1.15,
        _ => 1.0,
    }
}

/// Least-squares fit of `values` against their indices `0..n`.
fn linear_regression(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|x| x as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(x, y)| x as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|x| (x * x) as f64).sum();

    let denominator = n * sum_x2 - sum_x * sum_x;
    let slope = if denominator == 0.0 {
        0.0
    } else {
        (n * sum_xy - sum_x * sum_y) / denominator
    };
    let intercept = (sum_y - slope * sum_x) / n;

    (slope, intercept)
}

/// Population standard deviation.
fn standard_deviation(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Project revenue `months` ahead from a monthly history.
pub fn forecast_revenue(
    history: &[MonthlyRevenue],
    months: u32,
) -> Result<RevenueForecast, ForecastError> {
    if history.len() < 2 {
        return Err(ForecastError::NotEnoughHistory);
    }
    if let Some(bad) = history.iter().find(|point| !(1..=12).contains(&point.month)) {
        return Err(ForecastError::InvalidMonth(bad.month));
    }

    let revenues: Vec<f64> = history
        .iter()
        .map(|point| point.revenue_cents as f64)
        .collect();
    let n = revenues.len();
    let (slope, intercept) = linear_regression(&revenues);
    let average = revenues.iter().sum::<f64>() / n as f64;
    let std_dev = standard_deviation(&revenues, average);
    let growth_rate = if average == 0.0 { 0.0 } else { slope / average * 100.0 };

    let (mut year, mut month) = history
        .last()
        .map(|point| (point.year, point.month))
        .unwrap_or_default();

    let mut forecasts = Vec::with_capacity(months as usize);
    for i in 1..=months {
        (year, month) = next_month(year, month);

        let base = slope * (n as f64 + f64::from(i) - 1.0) + intercept;
        let adjusted = base * seasonal_factor(month);
        let clamp = |value: f64| (value.round() as i64).max(0);

        forecasts.push(MonthlyForecast {
            year,
            month,
            optimistic_cents: clamp(adjusted + std_dev * 1.5),
            realistic_cents: clamp(adjusted),
            pessimistic_cents: clamp(adjusted - std_dev * 1.5),
            confidence: 95u32.saturating_sub(i * 10).max(50),
        });
    }

    let average_confidence = if forecasts.is_empty() {
        0.0
    } else {
        forecasts.iter().map(|f| f64::from(f.confidence)).sum::<f64>() / forecasts.len() as f64
    };

    let stats = ForecastStats {
        trend_slope: slope,
        growth_rate: (growth_rate * 100.0).round() / 100.0,
        average_revenue_cents: average.round() as i64,
        standard_deviation_cents: std_dev.round() as i64,
        forecast_months: months,
        total_realistic_cents: forecasts.iter().map(|f| f.realistic_cents).sum(),
        total_optimistic_cents: forecasts.iter().map(|f| f.optimistic_cents).sum(),
        total_pessimistic_cents: forecasts.iter().map(|f| f.pessimistic_cents).sum(),
        average_confidence,
    };

    Ok(RevenueForecast {
        forecasts,
        stats,
        history: history.to_vec(),
    })
}
