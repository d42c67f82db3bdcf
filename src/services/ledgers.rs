use pushkind_common::domain::auth::AuthenticatedUser;
use pushkind_common::pagination::{DEFAULT_ITEMS_PER_PAGE, Paginated};
use pushkind_common::routes::check_role;
use serde::{Deserialize, Serialize};

use crate::SERVICE_ACCESS_ROLE;
use crate::domain::ledger::{
    BudgetOperation, ConstructionLedger, CostAnalysis, CostBreakdown, LedgerAlert, LedgerHealth,
    LedgerListQuery, LedgerStatus, budget_change_for_order,
};
use crate::forms::ledgers::{AddLedgerForm, BudgetAdjustmentPayload};
use crate::repository::{CustomerReader, LedgerReader, LedgerWriter, OrderReader};
use crate::services::{ServiceError, ServiceResult};

/// Query parameters accepted by `GET /ledgers`.
#[derive(Debug, Default, Deserialize)]
pub struct LedgersQuery {
    /// Matched against construction number and name.
    pub search: Option<String>,
    pub status: Option<LedgerStatus>,
    pub customer_id: Option<i32>,
    pub page: Option<usize>,
}

/// Ledger together with its derived profit figures, analysis and alerts.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct LedgerDetail {
    #[serde(flatten)]
    pub ledger: ConstructionLedger,
    pub total_budget_cents: i64,
    pub expected_profit_cents: i64,
    pub expected_profit_rate: f64,
    pub actual_total_cents: i64,
    pub actual_profit_cents: i64,
    pub actual_profit_rate: f64,
    pub analysis: CostAnalysis,
    pub alerts: Vec<LedgerAlert>,
    pub health: LedgerHealth,
}

impl From<ConstructionLedger> for LedgerDetail {
    fn from(ledger: ConstructionLedger) -> Self {
        Self {
            total_budget_cents: ledger.total_budget(),
            expected_profit_cents: ledger.expected_profit(),
            expected_profit_rate: ledger.expected_profit_rate(),
            actual_total_cents: ledger.actual_total(),
            actual_profit_cents: ledger.actual_profit(),
            actual_profit_rate: ledger.actual_profit_rate(),
            analysis: ledger.cost_analysis(),
            alerts: ledger.alerts(),
            health: ledger.health(),
            ledger,
        }
    }
}

/// Result of moving an order's cost into or out of a ledger budget.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct BudgetAdjustment {
    pub ledger_id: i32,
    pub order_id: i32,
    pub operation: BudgetOperation,
    pub previous_budget: CostBreakdown,
    pub updated_budget: CostBreakdown,
    /// Signed per-category change that was applied.
    pub change: CostBreakdown,
}

/// Lists ledgers of the hub with their analysis.
pub fn list_ledgers<R>(
    repo: &R,
    user: &AuthenticatedUser,
    query: LedgersQuery,
) -> ServiceResult<Paginated<LedgerDetail>>
where
    R: LedgerReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let page = query.page.unwrap_or(1);
    let mut list_query = LedgerListQuery::new(user.hub_id).paginate(page, DEFAULT_ITEMS_PER_PAGE);
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        list_query = list_query.search(search);
    }
    if let Some(status) = query.status {
        list_query = list_query.status(status);
    }
    if let Some(customer_id) = query.customer_id {
        list_query = list_query.customer_id(customer_id);
    }

    let (total, ledgers) = repo.list_ledgers(list_query).map_err(ServiceError::from)?;
    let items = ledgers.into_iter().map(LedgerDetail::from).collect();

    Ok(Paginated::new(items, page, total.div_ceil(DEFAULT_ITEMS_PER_PAGE)))
}

pub fn get_ledger<R>(repo: &R, user: &AuthenticatedUser, ledger_id: i32) -> ServiceResult<LedgerDetail>
where
    R: LedgerReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    repo.get_ledger_by_id(ledger_id, user.hub_id)
        .map_err(ServiceError::from)?
        .map(LedgerDetail::from)
        .ok_or(ServiceError::NotFound)
}

/// Opens a ledger for a signed contract. The execution budget is derived
/// from the submitted estimate; construction numbers are unique per hub.
pub fn create_ledger<R>(
    repo: &R,
    user: &AuthenticatedUser,
    form: AddLedgerForm,
) -> ServiceResult<LedgerDetail>
where
    R: LedgerReader + LedgerWriter + CustomerReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let new_ledger = form
        .into_new_ledger(user.hub_id)
        .map_err(|err| ServiceError::Form(err.to_string()))?;

    if let Some(customer_id) = new_ledger.customer_id {
        let customer = repo
            .get_customer_by_id(customer_id, user.hub_id)
            .map_err(ServiceError::from)?;
        if customer.is_none() {
            return Err(ServiceError::Form(format!(
                "customer {customer_id} does not exist"
            )));
        }
    }

    let existing = repo
        .get_ledger_by_construction_no(&new_ledger.construction_no, user.hub_id)
        .map_err(ServiceError::from)?;
    if existing.is_some() {
        return Err(ServiceError::Conflict);
    }

    repo.create_ledger(&new_ledger)
        .map(LedgerDetail::from)
        .map_err(ServiceError::from)
}

/// Adds an order's work to a ledger budget, or takes it back out.
///
/// An order contributes to a budget at most once; adding twice or
/// subtracting an order that was never added is a conflict.
pub fn apply_order_to_budget<R>(
    repo: &R,
    user: &AuthenticatedUser,
    ledger_id: i32,
    payload: BudgetAdjustmentPayload,
) -> ServiceResult<BudgetAdjustment>
where
    R: LedgerReader + LedgerWriter + OrderReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let ledger = repo
        .get_ledger_by_id(ledger_id, user.hub_id)
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound)?;
    let order = repo
        .get_order_by_id(payload.order_id, user.hub_id)
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound)?;

    if order.ledger_id.is_some_and(|linked| linked != ledger_id) {
        return Err(ServiceError::Form(format!(
            "order {} belongs to another ledger",
            order.order_no
        )));
    }

    let change = budget_change_for_order(&order.work_items, order.total_cents)
        .scaled(payload.operation.multiplier());

    let updated = repo
        .apply_order_budget(ledger_id, order.id, user.hub_id, &change, payload.operation)
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::Conflict)?;

    log::info!(
        "Applied order {} to ledger {} budget ({:?})",
        order.order_no,
        ledger.construction_no,
        payload.operation
    );

    Ok(BudgetAdjustment {
        ledger_id,
        order_id: order.id,
        operation: payload.operation,
        previous_budget: ledger.execution_budget,
        updated_budget: updated.execution_budget,
        change,
    })
}

/// Rebuilds the ledger's actual cost from the DW costs of its orders.
pub fn reconcile_actual_costs<R>(
    repo: &R,
    user: &AuthenticatedUser,
    ledger_id: i32,
) -> ServiceResult<LedgerDetail>
where
    R: LedgerWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    repo.reconcile_ledger_costs(ledger_id, user.hub_id, chrono::Utc::now().naive_utc())
        .map(LedgerDetail::from)
        .map_err(ServiceError::from)
}
