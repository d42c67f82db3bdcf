use chrono::NaiveDateTime;
use pushkind_common::pagination::Pagination;
use serde::{Deserialize, Serialize};

use crate::domain::alert::AlertSeverity;
use crate::domain::order::{ActualCosts, OrderWorkItem};

/// Cost accounts a construction ledger tracks budgets and actuals against.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    Material,
    Labor,
    Outsourcing,
    Expense,
}

const MATERIAL_KEYWORDS: &[&str] = &["材料", "資材", "設備", "器具", "建材", "material"];
const LABOR_KEYWORDS: &[&str] = &["大工", "職人", "作業員", "労務", "人件費", "labor", "labour"];
const OUTSOURCING_KEYWORDS: &[&str] = &[
    "外注",
    "工事",
    "施工",
    "基礎",
    "屋根",
    "内装",
    "外装",
    "電気",
    "配管",
    "塗装",
    "給排水",
    "空調",
    "ガス",
    "外構",
    "subcontract",
];
const EXPENSE_KEYWORDS: &[&str] = &["運搬", "諸経費", "管理", "仮設", "廃棄", "expense", "transport"];

impl CostCategory {
    /// Classify a work category label by keyword. Checked in the order
    /// material, labor, outsourcing, expense; `None` when nothing matches.
    pub fn classify(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        let matches = |keywords: &[&str]| keywords.iter().any(|kw| label.contains(kw));

        if matches(MATERIAL_KEYWORDS) {
            Some(Self::Material)
        } else if matches(LABOR_KEYWORDS) {
            Some(Self::Labor)
        } else if matches(OUTSOURCING_KEYWORDS) {
            Some(Self::Outsourcing)
        } else if matches(EXPENSE_KEYWORDS) {
            Some(Self::Expense)
        } else {
            None
        }
    }
}

/// Amounts split by cost category, in the smallest currency unit.
/// Arithmetic saturates at the `i64` bounds.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct CostBreakdown {
    pub material_cents: i64,
    pub labor_cents: i64,
    pub outsourcing_cents: i64,
    pub expense_cents: i64,
}

impl CostBreakdown {
    pub fn total(&self) -> i64 {
        self.material_cents
            .saturating_add(self.labor_cents)
            .saturating_add(self.outsourcing_cents)
            .saturating_add(self.expense_cents)
    }

    /// Add `amount` to the bucket for `category`.
    pub fn add(&mut self, category: CostCategory, amount: i64) {
        let bucket = match category {
            CostCategory::Material => &mut self.material_cents,
            CostCategory::Labor => &mut self.labor_cents,
            CostCategory::Outsourcing => &mut self.outsourcing_cents,
            CostCategory::Expense => &mut self.expense_cents,
        };
        *bucket = bucket.saturating_add(amount);
    }

    /// Element-wise sum of two breakdowns.
    pub fn plus(&self, other: &CostBreakdown) -> CostBreakdown {
        CostBreakdown {
            material_cents: self.material_cents.saturating_add(other.material_cents),
            labor_cents: self.labor_cents.saturating_add(other.labor_cents),
            outsourcing_cents: self.outsourcing_cents.saturating_add(other.outsourcing_cents),
            expense_cents: self.expense_cents.saturating_add(other.expense_cents),
        }
    }

    /// Every bucket multiplied by `factor` (used with `-1` for subtraction).
    pub fn scaled(&self, factor: i64) -> CostBreakdown {
        CostBreakdown {
            material_cents: self.material_cents.saturating_mul(factor),
            labor_cents: self.labor_cents.saturating_mul(factor),
            outsourcing_cents: self.outsourcing_cents.saturating_mul(factor),
            expense_cents: self.expense_cents.saturating_mul(factor),
        }
    }
}

/// Line of the estimate a ledger's execution budget is derived from.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EstimateItem {
    pub category: String,
    pub amount_cents: i64,
}

/// Execution budget derived from estimate lines; unmatched lines count as
/// expenses.
pub fn execution_budget_from_estimate(items: &[EstimateItem]) -> CostBreakdown {
    let mut budget = CostBreakdown::default();
    for item in items {
        let category = CostCategory::classify(&item.category).unwrap_or(CostCategory::Expense);
        budget.add(category, item.amount_cents);
    }
    budget
}

/// Budget contribution of a partner order. Unmatched work items count as
/// outsourcing and an order without items contributes its whole total there.
pub fn budget_change_for_order(work_items: &[OrderWorkItem], order_total_cents: i64) -> CostBreakdown {
    let mut change = CostBreakdown::default();

    if work_items.is_empty() {
        change.outsourcing_cents = order_total_cents;
        return change;
    }

    for item in work_items {
        let label = if item.category.trim().is_empty() {
            item.name.as_str()
        } else {
            item.category.as_str()
        };
        let category = CostCategory::classify(label).unwrap_or(CostCategory::Outsourcing);
        change.add(category, item.amount_cents);
    }

    change
}

/// Ledger actual cost rebuilt from the DW costs reported on its orders.
/// Equipment maps to outsourcing and other costs map to expenses.
pub fn actual_cost_from_orders<'a, I>(costs: I) -> CostBreakdown
where
    I: IntoIterator<Item = &'a ActualCosts>,
{
    costs
        .into_iter()
        .fold(CostBreakdown::default(), |acc, cost| {
            acc.plus(&CostBreakdown {
                material_cents: cost.material_cents,
                labor_cents: cost.labor_cents,
                outsourcing_cents: cost.equipment_cents,
                expense_cents: cost.other_cents,
            })
        })
}

/// Direction of a budget adjustment driven by an order.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BudgetOperation {
    Add,
    Subtract,
}

impl BudgetOperation {
    pub fn multiplier(&self) -> i64 {
        match self {
            Self::Add => 1,
            Self::Subtract => -1,
        }
    }
}

/// Construction progress reported by the field (or DW).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl From<&str> for ProgressStatus {
    fn from(value: &str) -> Self {
        match value {
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            _ => Self::NotStarted,
        }
    }
}

/// Progress snapshot with a completion rate clamped to `0..=100`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(from = "RawWorkProgress")]
pub struct WorkProgress {
    pub status: ProgressStatus,
    pub rate: i32,
}

/// Wire shape of [`WorkProgress`] before the rate is clamped.
#[derive(Deserialize)]
struct RawWorkProgress {
    status: ProgressStatus,
    rate: i32,
}

impl From<RawWorkProgress> for WorkProgress {
    fn from(raw: RawWorkProgress) -> Self {
        Self::new(raw.status, raw.rate)
    }
}

impl WorkProgress {
    pub fn new(status: ProgressStatus, rate: i32) -> Self {
        Self {
            status,
            rate: rate.clamp(0, 100),
        }
    }
}

/// Lifecycle of a construction ledger.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Draft,
    /// Ledgers opened from a signed contract start out approved.
    #[default]
    Approved,
    InProgress,
    Completed,
    Cancelled,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<&str> for LedgerStatus {
    fn from(value: &str) -> Self {
        match value {
            "draft" => Self::Draft,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            _ => Self::Approved,
        }
    }
}

/// Construction ledger (工事台帳) tracking a contract's budget against actual cost.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConstructionLedger {
    pub id: i32,
    pub hub_id: i32,
    pub customer_id: Option<i32>,
    /// Hub-unique construction number.
    pub construction_no: String,
    pub construction_name: String,
    pub contract_no: Option<String>,
    /// Total contract amount including tax.
    pub contract_amount_cents: i64,
    pub execution_budget: CostBreakdown,
    pub actual_cost: CostBreakdown,
    pub progress: WorkProgress,
    pub status: LedgerStatus,
    /// Last time DW cost data was reconciled into the ledger.
    pub dw_last_updated_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

fn rate_of(numerator: i64, denominator: i64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64 * 100.0
    } else {
        0.0
    }
}

impl ConstructionLedger {
    pub fn total_budget(&self) -> i64 {
        self.execution_budget.total()
    }

    pub fn expected_profit(&self) -> i64 {
        self.contract_amount_cents - self.total_budget()
    }

    pub fn expected_profit_rate(&self) -> f64 {
        rate_of(self.expected_profit(), self.contract_amount_cents)
    }

    pub fn actual_total(&self) -> i64 {
        self.actual_cost.total()
    }

    pub fn actual_profit(&self) -> i64 {
        self.contract_amount_cents - self.actual_total()
    }

    pub fn actual_profit_rate(&self) -> f64 {
        rate_of(self.actual_profit(), self.contract_amount_cents)
    }

    /// Budget-versus-actual variance; positive values mean under budget.
    pub fn cost_analysis(&self) -> CostAnalysis {
        let budget = &self.execution_budget;
        let actual = &self.actual_cost;
        let total_variance = self.total_budget() - self.actual_total();
        let profit_variance = self.expected_profit() - self.actual_profit();

        CostAnalysis {
            material_variance_cents: budget.material_cents - actual.material_cents,
            labor_variance_cents: budget.labor_cents - actual.labor_cents,
            outsourcing_variance_cents: budget.outsourcing_cents - actual.outsourcing_cents,
            expense_variance_cents: budget.expense_cents - actual.expense_cents,
            total_variance_cents: total_variance,
            variance_rate: rate_of(total_variance, self.total_budget()),
            profit_variance_cents: profit_variance,
            profit_variance_rate: rate_of(profit_variance, self.expected_profit()),
        }
    }

    /// Alerts raised by the current budget and actual figures.
    pub fn alerts(&self) -> Vec<LedgerAlert> {
        let analysis = self.cost_analysis();
        let mut alerts = Vec::new();

        if analysis.variance_rate < -95.0 {
            alerts.push(LedgerAlert {
                kind: LedgerAlertKind::CostOverrun,
                severity: AlertSeverity::Critical,
                message: format!(
                    "Actual cost exceeds the budget by {:.1}%",
                    analysis.variance_rate.abs()
                ),
            });
        } else if analysis.variance_rate < 0.0 {
            alerts.push(LedgerAlert {
                kind: LedgerAlertKind::CostOverrun,
                severity: AlertSeverity::Warning,
                message: format!(
                    "Actual cost is over budget by {:.1}%",
                    analysis.variance_rate.abs()
                ),
            });
        }

        let expected_rate = self.expected_profit_rate();
        let actual_rate = self.actual_profit_rate();
        if self.actual_total() > 0 && actual_rate < expected_rate * 0.8 {
            alerts.push(LedgerAlert {
                kind: LedgerAlertKind::ProfitDecline,
                severity: AlertSeverity::Warning,
                message: format!(
                    "Profit rate is well below plan (planned {expected_rate:.1}%, actual {actual_rate:.1}%)"
                ),
            });
        }

        let actual_profit = self.actual_profit();
        if actual_profit < 0 {
            alerts.push(LedgerAlert {
                kind: LedgerAlertKind::LossMaking,
                severity: AlertSeverity::Critical,
                message: format!("Project is loss-making (actual profit {actual_profit})"),
            });
        }

        alerts
    }

    pub fn health(&self) -> LedgerHealth {
        if self.alerts().is_empty() {
            LedgerHealth::Healthy
        } else {
            LedgerHealth::Alert
        }
    }
}

/// Variance figures for a ledger.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct CostAnalysis {
    pub material_variance_cents: i64,
    pub labor_variance_cents: i64,
    pub outsourcing_variance_cents: i64,
    pub expense_variance_cents: i64,
    pub total_variance_cents: i64,
    /// Total variance as a percentage of the total budget.
    pub variance_rate: f64,
    pub profit_variance_cents: i64,
    pub profit_variance_rate: f64,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAlertKind {
    CostOverrun,
    ProfitDecline,
    LossMaking,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct LedgerAlert {
    pub kind: LedgerAlertKind,
    pub severity: AlertSeverity,
    pub message: String,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerHealth {
    Healthy,
    Alert,
}

/// Payload required to open a new ledger.
#[derive(Debug, Clone)]
pub struct NewLedger {
    pub hub_id: i32,
    pub customer_id: Option<i32>,
    pub construction_no: String,
    pub construction_name: String,
    pub contract_no: Option<String>,
    pub contract_amount_cents: i64,
    pub execution_budget: CostBreakdown,
    pub status: LedgerStatus,
    pub updated_at: NaiveDateTime,
}

impl NewLedger {
    pub fn new(
        hub_id: i32,
        construction_no: impl Into<String>,
        construction_name: impl Into<String>,
        contract_amount_cents: i64,
    ) -> Self {
        Self {
            hub_id,
            customer_id: None,
            construction_no: construction_no.into(),
            construction_name: construction_name.into(),
            contract_no: None,
            contract_amount_cents,
            execution_budget: CostBreakdown::default(),
            status: LedgerStatus::default(),
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn with_customer_id(mut self, customer_id: i32) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_contract_no(mut self, contract_no: impl Into<String>) -> Self {
        self.contract_no = Some(contract_no.into());
        self
    }

    pub fn with_execution_budget(mut self, budget: CostBreakdown) -> Self {
        self.execution_budget = budget;
        self
    }
}

/// Patch data applied when updating an existing ledger.
#[derive(Debug, Clone)]
pub struct UpdateLedger {
    pub execution_budget: Option<CostBreakdown>,
    pub actual_cost: Option<CostBreakdown>,
    pub progress: Option<WorkProgress>,
    pub status: Option<LedgerStatus>,
    pub dw_last_updated_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

impl UpdateLedger {
    pub fn new(updated_at: NaiveDateTime) -> Self {
        Self {
            execution_budget: None,
            actual_cost: None,
            progress: None,
            status: None,
            dw_last_updated_at: None,
            updated_at,
        }
    }

    pub fn execution_budget(mut self, budget: CostBreakdown) -> Self {
        self.execution_budget = Some(budget);
        self
    }

    pub fn actual_cost(mut self, actual: CostBreakdown) -> Self {
        self.actual_cost = Some(actual);
        self
    }

    pub fn progress(mut self, progress: WorkProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn status(mut self, status: LedgerStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn dw_last_updated_at(mut self, at: NaiveDateTime) -> Self {
        self.dw_last_updated_at = Some(at);
        self
    }
}

/// Query definition used to list ledgers for a hub.
#[derive(Debug, Clone)]
pub struct LedgerListQuery {
    pub hub_id: i32,
    pub customer_id: Option<i32>,
    pub status: Option<LedgerStatus>,
    /// Optional term matched against the construction number or name.
    pub search: Option<String>,
    pub pagination: Option<Pagination>,
}

impl LedgerListQuery {
    pub fn new(hub_id: i32) -> Self {
        Self {
            hub_id,
            customer_id: None,
            status: None,
            search: None,
            pagination: None,
        }
    }

    pub fn customer_id(mut self, customer_id: i32) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn status(mut self, status: LedgerStatus) -> Self {
        self.status = Some(status);
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
