use chrono::{Datelike, NaiveDate};
use pushkind_common::domain::auth::AuthenticatedUser;
use pushkind_common::routes::check_role;
use serde::Serialize;

use crate::SERVICE_ACCESS_ROLE;
use crate::domain::customer::CustomerListQuery;
use crate::domain::forecast::{MonthlyRevenue, RevenueForecast, forecast_revenue};
use crate::domain::ledger::{ConstructionLedger, LedgerListQuery, LedgerStatus};
use crate::domain::segmentation::{
    CustomerMetrics, CustomerSegmentation, SegmentationSummary, segment_customer, summarize,
};
use crate::forms::analytics::{RevenueForecastForm, RevenueForecastQuery, forecast_months};
use crate::repository::{CustomerReader, LedgerReader};
use crate::services::{ServiceError, ServiceResult};

/// Number of past months the ledger-based forecast learns from.
const HISTORY_MONTHS: u32 = 12;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CustomerSegmentationReport {
    /// Best scoring customers first.
    pub customers: Vec<CustomerSegmentation>,
    pub summary: SegmentationSummary,
}

/// Forecast from a revenue history supplied by the caller.
pub fn revenue_forecast(
    user: &AuthenticatedUser,
    form: RevenueForecastForm,
) -> ServiceResult<RevenueForecast> {
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    forecast_revenue(&form.history, forecast_months(form.months))
        .map_err(|err| ServiceError::Form(err.to_string()))
}

/// Contract revenue per month over the `HISTORY_MONTHS` months ending with
/// the month of `today`. Months without contracts count as zero.
fn ledger_monthly_revenue(ledgers: &[ConstructionLedger], today: NaiveDate) -> Vec<MonthlyRevenue> {
    let mut months: Vec<MonthlyRevenue> = Vec::with_capacity(HISTORY_MONTHS as usize);
    let (mut year, mut month) = (today.year(), today.month());
    for _ in 0..HISTORY_MONTHS {
        months.push(MonthlyRevenue {
            year,
            month,
            revenue_cents: 0,
        });
        (year, month) = if month == 1 { (year - 1, 12) } else { (year, month - 1) };
    }
    months.reverse();

    for ledger in ledgers {
        if ledger.status == LedgerStatus::Cancelled {
            continue;
        }
        let created = ledger.created_at.date();
        if let Some(slot) = months
            .iter_mut()
            .find(|slot| slot.year == created.year() && slot.month == created.month())
        {
            slot.revenue_cents += ledger.contract_amount_cents;
        }
    }

    months
}

/// Forecast from the contract amounts of the hub's ledgers.
pub fn ledger_revenue_forecast<R>(
    repo: &R,
    user: &AuthenticatedUser,
    query: RevenueForecastQuery,
    today: NaiveDate,
) -> ServiceResult<RevenueForecast>
where
    R: LedgerReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let (_, ledgers) = repo
        .list_ledgers(LedgerListQuery::new(user.hub_id))
        .map_err(ServiceError::from)?;

    let history = ledger_monthly_revenue(&ledgers, today);
    forecast_revenue(&history, forecast_months(query.months))
        .map_err(|err| ServiceError::Form(err.to_string()))
}

/// Scores every customer of the hub from their ledgers.
pub fn customer_segmentation<R>(
    repo: &R,
    user: &AuthenticatedUser,
    today: NaiveDate,
) -> ServiceResult<CustomerSegmentationReport>
where
    R: CustomerReader + LedgerReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let (_, customers) = repo
        .list_customers(CustomerListQuery::new(user.hub_id))
        .map_err(ServiceError::from)?;
    let (_, ledgers) = repo
        .list_ledgers(LedgerListQuery::new(user.hub_id))
        .map_err(ServiceError::from)?;

    let mut segmented: Vec<CustomerSegmentation> = customers
        .iter()
        .map(|customer| {
            segment_customer(CustomerMetrics::from_ledgers(customer, &ledgers, today), today)
        })
        .collect();
    segmented.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.metrics.customer_id.cmp(&b.metrics.customer_id))
    });

    let summary = summarize(&segmented);
    Ok(CustomerSegmentationReport {
        customers: segmented,
        summary,
    })
}
