use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::ledger::{
    ConstructionLedger as DomainLedger, CostBreakdown, NewLedger as DomainNewLedger,
    UpdateLedger as DomainUpdateLedger, WorkProgress,
};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::construction_ledgers)]
pub struct ConstructionLedger {
    pub id: i32,
    pub hub_id: i32,
    pub customer_id: Option<i32>,
    pub construction_no: String,
    pub construction_name: String,
    pub contract_no: Option<String>,
    pub contract_amount_cents: i64,
    pub budget_material_cents: i64,
    pub budget_labor_cents: i64,
    pub budget_outsourcing_cents: i64,
    pub budget_expense_cents: i64,
    pub actual_material_cents: i64,
    pub actual_labor_cents: i64,
    pub actual_outsourcing_cents: i64,
    pub actual_expense_cents: i64,
    pub progress_status: String,
    pub progress_rate: i32,
    pub status: String,
    pub dw_last_updated_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::construction_ledgers)]
pub struct NewLedger<'a> {
    pub hub_id: i32,
    pub customer_id: Option<i32>,
    pub construction_no: &'a str,
    pub construction_name: &'a str,
    pub contract_no: Option<&'a str>,
    pub contract_amount_cents: i64,
    pub budget_material_cents: i64,
    pub budget_labor_cents: i64,
    pub budget_outsourcing_cents: i64,
    pub budget_expense_cents: i64,
    pub status: &'a str,
    pub updated_at: NaiveDateTime,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = crate::schema::construction_ledgers)]
pub struct UpdateLedger<'a> {
    pub budget_material_cents: Option<i64>,
    pub budget_labor_cents: Option<i64>,
    pub budget_outsourcing_cents: Option<i64>,
    pub budget_expense_cents: Option<i64>,
    pub actual_material_cents: Option<i64>,
    pub actual_labor_cents: Option<i64>,
    pub actual_outsourcing_cents: Option<i64>,
    pub actual_expense_cents: Option<i64>,
    pub progress_status: Option<&'a str>,
    pub progress_rate: Option<i32>,
    pub status: Option<&'a str>,
    pub dw_last_updated_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

impl From<ConstructionLedger> for DomainLedger {
    fn from(value: ConstructionLedger) -> Self {
        Self {
            id: value.id,
            hub_id: value.hub_id,
            customer_id: value.customer_id,
            construction_no: value.construction_no,
            construction_name: value.construction_name,
            contract_no: value.contract_no,
            contract_amount_cents: value.contract_amount_cents,
            execution_budget: CostBreakdown {
                material_cents: value.budget_material_cents,
                labor_cents: value.budget_labor_cents,
                outsourcing_cents: value.budget_outsourcing_cents,
                expense_cents: value.budget_expense_cents,
            },
            actual_cost: CostBreakdown {
                material_cents: value.actual_material_cents,
                labor_cents: value.actual_labor_cents,
                outsourcing_cents: value.actual_outsourcing_cents,
                expense_cents: value.actual_expense_cents,
            },
            progress: WorkProgress::new(value.progress_status.as_str().into(), value.progress_rate),
            status: value.status.as_str().into(),
            dw_last_updated_at: value.dw_last_updated_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl<'a> From<&'a DomainNewLedger> for NewLedger<'a> {
    fn from(value: &'a DomainNewLedger) -> Self {
        let budget = &value.execution_budget;
        Self {
            hub_id: value.hub_id,
            customer_id: value.customer_id,
            construction_no: value.construction_no.as_str(),
            construction_name: value.construction_name.as_str(),
            contract_no: value.contract_no.as_deref(),
            contract_amount_cents: value.contract_amount_cents,
            budget_material_cents: budget.material_cents,
            budget_labor_cents: budget.labor_cents,
            budget_outsourcing_cents: budget.outsourcing_cents,
            budget_expense_cents: budget.expense_cents,
            status: value.status.as_str(),
            updated_at: value.updated_at,
        }
    }
}

impl<'a> From<&'a DomainUpdateLedger> for UpdateLedger<'a> {
    fn from(value: &'a DomainUpdateLedger) -> Self {
        let mut changes = Self {
            updated_at: value.updated_at,
            dw_last_updated_at: value.dw_last_updated_at,
            status: value.status.as_ref().map(|status| status.as_str()),
            ..Self::default()
        };

        if let Some(budget) = value.execution_budget {
            changes.budget_material_cents = Some(budget.material_cents);
            changes.budget_labor_cents = Some(budget.labor_cents);
            changes.budget_outsourcing_cents = Some(budget.outsourcing_cents);
            changes.budget_expense_cents = Some(budget.expense_cents);
        }

        if let Some(actual) = value.actual_cost {
            changes.actual_material_cents = Some(actual.material_cents);
            changes.actual_labor_cents = Some(actual.labor_cents);
            changes.actual_outsourcing_cents = Some(actual.outsourcing_cents);
            changes.actual_expense_cents = Some(actual.expense_cents);
        }

        if let Some(progress) = value.progress {
            changes.progress_status = Some(progress.status.as_str());
            changes.progress_rate = Some(progress.rate);
        }

        changes
    }
}
