use chrono::{Duration, NaiveDate, NaiveDateTime};
use pushkind_common::pagination::Pagination;
use serde::{Deserialize, Serialize};

use crate::domain::alert::AlertSeverity;
use crate::domain::ledger::WorkProgress;

/// Default tax rate applied to partner orders, in percent.
pub const DEFAULT_TAX_RATE_PERCENT: f64 = 10.0;

/// Possible lifecycle states for a partner order.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order has been created but not yet submitted for approval.
    #[default]
    Draft,
    /// Order awaits an approval decision.
    Pending,
    Approved,
    Rejected,
    /// Order has been pushed to DandoriWork.
    SentToDw,
    /// Partner reported work in progress.
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::SentToDw => "sent_to_dw",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether a manual status change from `self` to `next` is permitted.
    ///
    /// Approval outcomes and the DW push move orders on their own and are
    /// not reachable by hand.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, next),
            (Draft, Cancelled)
                | (Pending, Draft)
                | (Pending, Cancelled)
                | (Approved, Cancelled)
                | (Rejected, Draft)
                | (Rejected, Cancelled)
                | (SentToDw, InProgress)
                | (SentToDw, Cancelled)
                | (InProgress, Completed)
        )
    }

    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::Draft | Self::Cancelled)
    }

    /// Statuses that still have an ordering deadline to meet.
    pub fn awaits_placement(&self) -> bool {
        matches!(self, Self::Draft | Self::Pending | Self::Approved)
    }
}

impl From<&str> for OrderStatus {
    fn from(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            "sent_to_dw" => Self::SentToDw,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            _ => Self::Draft,
        }
    }
}

/// State of the order's synchronisation with DandoriWork.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DwSyncStatus {
    #[default]
    NotSynced,
    Pending,
    Synced,
    Error,
}

impl DwSyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSynced => "not_synced",
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl From<&str> for DwSyncStatus {
    fn from(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "synced" => Self::Synced,
            "error" => Self::Error,
            _ => Self::NotSynced,
        }
    }
}

/// Single line of work ordered from a partner.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OrderWorkItem {
    /// Work category label used for budget classification.
    pub category: String,
    pub name: String,
    pub quantity: i32,
    pub unit: Option<String>,
    pub unit_price_cents: i64,
    /// `quantity * unit_price_cents`, saturating at `i64::MAX`.
    pub amount_cents: i64,
}

impl OrderWorkItem {
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        quantity: i32,
        unit_price_cents: i64,
    ) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            quantity,
            unit: None,
            unit_price_cents,
            amount_cents: i64::from(quantity).saturating_mul(unit_price_cents),
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Actual cost reported by DandoriWork, split by DW cost account.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActualCosts {
    #[serde(default)]
    pub labor_cents: i64,
    #[serde(default)]
    pub material_cents: i64,
    #[serde(default)]
    pub equipment_cents: i64,
    #[serde(default)]
    pub other_cents: i64,
}

impl ActualCosts {
    pub fn total(&self) -> i64 {
        self.labor_cents
            .saturating_add(self.material_cents)
            .saturating_add(self.equipment_cents)
            .saturating_add(self.other_cents)
    }
}

/// Budget versus actual for a single DW cost line.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CostDetail {
    pub category: String,
    pub item_name: String,
    pub budget_cents: i64,
    pub actual_cents: i64,
}

/// Domain representation of a partner order belonging to a hub.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Order {
    pub id: i32,
    pub hub_id: i32,
    /// Construction ledger the order is charged to.
    pub ledger_id: Option<i32>,
    /// Hub-unique order number.
    pub order_no: String,
    pub project_name: String,
    pub partner_name: String,
    pub status: OrderStatus,
    pub work_items: Vec<OrderWorkItem>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub contract_signed_date: NaiveDate,
    /// Date by which the order has to be placed with the partner.
    pub order_deadline: NaiveDate,
    /// Set once the order has been added to the ledger's execution budget.
    pub budget_applied: bool,
    pub dw_order_id: Option<String>,
    pub dw_sync_status: DwSyncStatus,
    pub dw_synced_at: Option<NaiveDateTime>,
    pub dw_sync_error: Option<String>,
    pub actual_costs: ActualCosts,
    pub progress: WorkProgress,
    pub cost_details: Vec<CostDetail>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Order {
    /// Compare the order total against the actual cost reported by DW.
    pub fn cost_analysis(&self) -> OrderCostAnalysis {
        let budget = self.total_cents;
        let actual = self.actual_costs.total();
        let variance = budget.saturating_sub(actual);
        let variance_rate = if budget > 0 {
            variance as f64 / budget as f64 * 100.0
        } else {
            0.0
        };
        let is_over_budget = variance < 0;

        OrderCostAnalysis {
            budget_cents: budget,
            actual_cents: actual,
            variance_cents: variance,
            variance_rate,
            is_over_budget,
            status: if is_over_budget {
                BudgetStatus::OverBudget
            } else {
                BudgetStatus::WithinBudget
            },
        }
    }

    /// Payload sent to DandoriWork when the order is pushed.
    pub fn dw_payload(&self) -> DwOrderPayload {
        DwOrderPayload {
            order_id: self.id,
            order_no: self.order_no.clone(),
            project_name: self.project_name.clone(),
            partner_name: self.partner_name.clone(),
            contract_signed_date: self.contract_signed_date,
            order_deadline: self.order_deadline,
            subtotal_cents: self.subtotal_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
            work_items: self.work_items.clone(),
            notes: self.notes.clone(),
        }
    }

    pub fn days_until_deadline(&self, today: NaiveDate) -> i64 {
        (self.order_deadline - today).num_days()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    WithinBudget,
    OverBudget,
}

/// Budget-versus-actual figures of an order.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct OrderCostAnalysis {
    pub budget_cents: i64,
    pub actual_cents: i64,
    /// Positive when the order came in under budget.
    pub variance_cents: i64,
    pub variance_rate: f64,
    pub is_over_budget: bool,
    pub status: BudgetStatus,
}

/// Order data pushed to DandoriWork.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DwOrderPayload {
    pub order_id: i32,
    pub order_no: String,
    pub project_name: String,
    pub partner_name: String,
    pub contract_signed_date: NaiveDate,
    pub order_deadline: NaiveDate,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub work_items: Vec<OrderWorkItem>,
    pub notes: Option<String>,
}

/// Cost report received from DandoriWork for an order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DwCostReport {
    #[serde(default)]
    pub dw_order_id: String,
    /// Local order id; resolved through `dw_order_id` when absent.
    #[serde(default)]
    pub order_id: Option<i32>,
    pub actual_costs: ActualCosts,
    #[serde(default)]
    pub work_progress: Option<WorkProgress>,
    #[serde(default)]
    pub cost_details: Vec<CostDetail>,
}

/// Payload required to insert a new order for a hub.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub hub_id: i32,
    pub ledger_id: Option<i32>,
    pub order_no: String,
    pub project_name: String,
    pub partner_name: String,
    pub status: OrderStatus,
    pub work_items: Vec<OrderWorkItem>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub contract_signed_date: NaiveDate,
    pub order_deadline: NaiveDate,
    pub notes: Option<String>,
    pub updated_at: NaiveDateTime,
}

impl NewOrder {
    /// Build a draft order whose deadline falls `deadline_days` after signing.
    pub fn new(
        hub_id: i32,
        order_no: impl Into<String>,
        project_name: impl Into<String>,
        partner_name: impl Into<String>,
        contract_signed_date: NaiveDate,
        deadline_days: i64,
    ) -> Self {
        Self {
            hub_id,
            ledger_id: None,
            order_no: order_no.into(),
            project_name: project_name.into(),
            partner_name: partner_name.into(),
            status: OrderStatus::default(),
            work_items: Vec::new(),
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            contract_signed_date,
            order_deadline: contract_signed_date + Duration::days(deadline_days),
            notes: None,
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn with_ledger_id(mut self, ledger_id: i32) -> Self {
        self.ledger_id = Some(ledger_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Attach work items and derive subtotal, tax and total from them.
    /// Sums saturate; use [`checked_order_total`] to reject such orders.
    pub fn with_work_items(mut self, items: Vec<OrderWorkItem>, tax_rate_percent: f64) -> Self {
        let subtotal = items
            .iter()
            .fold(0i64, |sum, item| sum.saturating_add(item.amount_cents));
        let tax = tax_on(subtotal, tax_rate_percent);

        self.work_items = items;
        self.subtotal_cents = subtotal;
        self.tax_cents = tax;
        self.total_cents = subtotal.saturating_add(tax);
        self
    }
}

fn tax_on(subtotal: i64, tax_rate_percent: f64) -> i64 {
    (subtotal as f64 * tax_rate_percent / 100.0).round() as i64
}

/// Order total including tax, or `None` when pricing `items` overflows.
pub fn checked_order_total(items: &[OrderWorkItem], tax_rate_percent: f64) -> Option<i64> {
    let subtotal = items.iter().try_fold(0i64, |sum, item| {
        i64::from(item.quantity)
            .checked_mul(item.unit_price_cents)
            .and_then(|amount| sum.checked_add(amount))
    })?;
    subtotal.checked_add(tax_on(subtotal, tax_rate_percent))
}

/// Patch data applied when updating an existing order.
#[derive(Debug, Clone)]
pub struct UpdateOrder {
    pub status: Option<OrderStatus>,
    pub budget_applied: Option<bool>,
    pub dw_order_id: Option<Option<String>>,
    pub dw_sync_status: Option<DwSyncStatus>,
    pub dw_synced_at: Option<Option<NaiveDateTime>>,
    pub dw_sync_error: Option<Option<String>>,
    pub actual_costs: Option<ActualCosts>,
    pub progress: Option<WorkProgress>,
    /// Replaces all stored cost details when set.
    pub cost_details: Option<Vec<CostDetail>>,
    pub updated_at: NaiveDateTime,
}

impl Default for UpdateOrder {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateOrder {
    pub fn new() -> Self {
        Self {
            status: None,
            budget_applied: None,
            dw_order_id: None,
            dw_sync_status: None,
            dw_synced_at: None,
            dw_sync_error: None,
            actual_costs: None,
            progress: None,
            cost_details: None,
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn budget_applied(mut self, applied: bool) -> Self {
        self.budget_applied = Some(applied);
        self
    }

    /// Record a successful push to DandoriWork.
    pub fn dw_synced(mut self, dw_order_id: impl Into<String>, at: NaiveDateTime) -> Self {
        self.dw_order_id = Some(Some(dw_order_id.into()));
        self.dw_sync_status = Some(DwSyncStatus::Synced);
        self.dw_synced_at = Some(Some(at));
        self.dw_sync_error = Some(None);
        self
    }

    /// Record a failed push to DandoriWork.
    pub fn dw_failed(mut self, error: impl Into<String>) -> Self {
        self.dw_sync_status = Some(DwSyncStatus::Error);
        self.dw_sync_error = Some(Some(error.into()));
        self
    }

    /// Store the cost data received from DandoriWork.
    pub fn dw_costs(
        mut self,
        actual_costs: ActualCosts,
        progress: Option<WorkProgress>,
        cost_details: Vec<CostDetail>,
        at: NaiveDateTime,
    ) -> Self {
        self.actual_costs = Some(actual_costs);
        self.progress = progress.map(|progress| WorkProgress::new(progress.status, progress.rate));
        self.cost_details = Some(cost_details);
        self.dw_synced_at = Some(Some(at));
        self
    }
}

/// Query definition used to list orders for a hub.
#[derive(Debug, Clone)]
pub struct OrderListQuery {
    pub hub_id: i32,
    pub status: Option<OrderStatus>,
    pub ledger_id: Option<i32>,
    /// Optional term matched against the order number, project or partner.
    pub search: Option<String>,
    pub pagination: Option<Pagination>,
}

impl OrderListQuery {
    pub fn new(hub_id: i32) -> Self {
        Self {
            hub_id,
            status: None,
            ledger_id: None,
            search: None,
            pagination: None,
        }
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn ledger_id(mut self, ledger_id: i32) -> Self {
        self.ledger_id = Some(ledger_id);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn paginate(mut self, page: usize, per_page: usize) -> Self {
        self.pagination = Some(Pagination { page, per_page });
        self
    }
}

/// Ordering deadline warning for a single order.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DeadlineAlert {
    pub order_id: i32,
    pub order_no: String,
    pub project_name: String,
    pub partner_name: String,
    pub status: OrderStatus,
    pub order_deadline: NaiveDate,
    pub days_until_deadline: i64,
    pub is_overdue: bool,
    pub severity: AlertSeverity,
}

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeadlineAlertStats {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub overdue: usize,
}

fn deadline_severity(days: i64) -> AlertSeverity {
    if days <= 0 {
        AlertSeverity::Critical
    } else if days <= 3 {
        AlertSeverity::Warning
    } else {
        AlertSeverity::Info
    }
}

/// Deadline alerts for orders not yet placed, most urgent first.
///
/// Statistics always cover every alert; `severity` only filters the returned
/// list.
pub fn deadline_alerts(
    orders: &[Order],
    today: NaiveDate,
    severity: Option<AlertSeverity>,
) -> (Vec<DeadlineAlert>, DeadlineAlertStats) {
    let alerts: Vec<DeadlineAlert> = orders
        .iter()
        .filter(|order| order.status.awaits_placement())
        .map(|order| {
            let days = order.days_until_deadline(today);
            DeadlineAlert {
                order_id: order.id,
                order_no: order.order_no.clone(),
                project_name: order.project_name.clone(),
                partner_name: order.partner_name.clone(),
                status: order.status,
                order_deadline: order.order_deadline,
                days_until_deadline: days,
                is_overdue: days < 0,
                severity: deadline_severity(days),
            }
        })
        .collect();

    let mut stats = DeadlineAlertStats {
        total: alerts.len(),
        ..DeadlineAlertStats::default()
    };
    for alert in &alerts {
        match alert.severity {
            AlertSeverity::Critical => stats.critical += 1,
            AlertSeverity::Warning => stats.warning += 1,
            AlertSeverity::Info => stats.info += 1,
        }
        if alert.is_overdue {
            stats.overdue += 1;
        }
    }

    let mut alerts: Vec<DeadlineAlert> = alerts
        .into_iter()
        .filter(|alert| severity.is_none_or(|wanted| alert.severity == wanted))
        .collect();
    alerts.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then(a.days_until_deadline.cmp(&b.days_until_deadline))
    });

    (alerts, stats)
}
