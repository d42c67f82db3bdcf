pub mod domain;
pub mod dw;
pub mod forms;
pub mod models;
pub mod repository;
pub mod routes;
pub mod schema;
pub mod services;

use crate::dw::DwConfig;

pub const SERVICE_ACCESS_ROLE: &str = "admin";

/// Days between contract signature and the ordering deadline when
/// `ORDER_DEADLINE_DAYS` is not set.
pub const DEFAULT_ORDER_DEADLINE_DAYS: i64 = 7;

/// Application settings beyond the shared server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub order_deadline_days: i64,
    /// `None` disables the DW integration.
    pub dw: Option<DwConfig>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let order_deadline_days = std::env::var("ORDER_DEADLINE_DAYS")
            .ok()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|days| *days >= 0)
            .unwrap_or(DEFAULT_ORDER_DEADLINE_DAYS);

        Self {
            order_deadline_days,
            dw: DwConfig::from_env(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            order_deadline_days: DEFAULT_ORDER_DEADLINE_DAYS,
            dw: None,
        }
    }
}
