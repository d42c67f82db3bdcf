use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;

use crate::domain::ledger::WorkProgress;
use crate::domain::order::{
    ActualCosts, CostDetail as DomainCostDetail, NewOrder as DomainNewOrder, Order as DomainOrder,
    OrderWorkItem as DomainOrderWorkItem, UpdateOrder as DomainUpdateOrder,
};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::orders)]
pub struct Order {
    pub id: i32,
    pub hub_id: i32,
    pub ledger_id: Option<i32>,
    pub order_no: String,
    pub project_name: String,
    pub partner_name: String,
    pub status: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub contract_signed_date: NaiveDate,
    pub order_deadline: NaiveDate,
    pub budget_applied: bool,
    pub dw_order_id: Option<String>,
    pub dw_sync_status: String,
    pub dw_synced_at: Option<NaiveDateTime>,
    pub dw_sync_error: Option<String>,
    pub actual_labor_cents: i64,
    pub actual_material_cents: i64,
    pub actual_equipment_cents: i64,
    pub actual_other_cents: i64,
    pub progress_status: String,
    pub progress_rate: i32,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Associations)]
#[diesel(table_name = crate::schema::order_work_items)]
#[diesel(belongs_to(Order, foreign_key = order_id))]
pub struct OrderWorkItem {
    pub id: i32,
    pub order_id: i32,
    pub category: String,
    pub name: String,
    pub quantity: i32,
    pub unit: Option<String>,
    pub unit_price_cents: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Associations)]
#[diesel(table_name = crate::schema::order_cost_details)]
#[diesel(belongs_to(Order, foreign_key = order_id))]
pub struct OrderCostDetail {
    pub id: i32,
    pub order_id: i32,
    pub category: String,
    pub item_name: String,
    pub budget_cents: i64,
    pub actual_cents: i64,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct NewOrder<'a> {
    pub hub_id: i32,
    pub ledger_id: Option<i32>,
    pub order_no: &'a str,
    pub project_name: &'a str,
    pub partner_name: &'a str,
    pub status: &'a str,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub contract_signed_date: NaiveDate,
    pub order_deadline: NaiveDate,
    pub notes: Option<&'a str>,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::order_work_items)]
pub struct NewOrderWorkItem<'a> {
    pub order_id: i32,
    pub category: &'a str,
    pub name: &'a str,
    pub quantity: i32,
    pub unit: Option<&'a str>,
    pub unit_price_cents: i64,
    pub amount_cents: i64,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::order_cost_details)]
pub struct NewOrderCostDetail<'a> {
    pub order_id: i32,
    pub category: &'a str,
    pub item_name: &'a str,
    pub budget_cents: i64,
    pub actual_cents: i64,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::orders)]
pub struct UpdateOrder<'a> {
    pub status: Option<&'a str>,
    pub budget_applied: Option<bool>,
    pub dw_order_id: Option<Option<&'a str>>,
    pub dw_sync_status: Option<&'a str>,
    pub dw_synced_at: Option<Option<NaiveDateTime>>,
    pub dw_sync_error: Option<Option<&'a str>>,
    pub actual_labor_cents: Option<i64>,
    pub actual_material_cents: Option<i64>,
    pub actual_equipment_cents: Option<i64>,
    pub actual_other_cents: Option<i64>,
    pub progress_status: Option<&'a str>,
    pub progress_rate: Option<i32>,
    pub updated_at: NaiveDateTime,
}

impl Order {
    pub fn into_domain(
        self,
        work_items: Vec<OrderWorkItem>,
        cost_details: Vec<OrderCostDetail>,
    ) -> DomainOrder {
        DomainOrder {
            id: self.id,
            hub_id: self.hub_id,
            ledger_id: self.ledger_id,
            order_no: self.order_no,
            project_name: self.project_name,
            partner_name: self.partner_name,
            status: self.status.as_str().into(),
            work_items: work_items
                .into_iter()
                .map(OrderWorkItem::into_domain)
                .collect(),
            subtotal_cents: self.subtotal_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
            contract_signed_date: self.contract_signed_date,
            order_deadline: self.order_deadline,
            budget_applied: self.budget_applied,
            dw_order_id: self.dw_order_id,
            dw_sync_status: self.dw_sync_status.as_str().into(),
            dw_synced_at: self.dw_synced_at,
            dw_sync_error: self.dw_sync_error,
            actual_costs: ActualCosts {
                labor_cents: self.actual_labor_cents,
                material_cents: self.actual_material_cents,
                equipment_cents: self.actual_equipment_cents,
                other_cents: self.actual_other_cents,
            },
            progress: WorkProgress::new(self.progress_status.as_str().into(), self.progress_rate),
            cost_details: cost_details
                .into_iter()
                .map(OrderCostDetail::into_domain)
                .collect(),
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl OrderWorkItem {
    pub fn into_domain(self) -> DomainOrderWorkItem {
        DomainOrderWorkItem {
            category: self.category,
            name: self.name,
            quantity: self.quantity,
            unit: self.unit,
            unit_price_cents: self.unit_price_cents,
            amount_cents: self.amount_cents,
        }
    }
}

impl OrderCostDetail {
    pub fn into_domain(self) -> DomainCostDetail {
        DomainCostDetail {
            category: self.category,
            item_name: self.item_name,
            budget_cents: self.budget_cents,
            actual_cents: self.actual_cents,
        }
    }
}

impl From<(Order, Vec<OrderWorkItem>, Vec<OrderCostDetail>)> for DomainOrder {
    fn from(value: (Order, Vec<OrderWorkItem>, Vec<OrderCostDetail>)) -> Self {
        value.0.into_domain(value.1, value.2)
    }
}

impl<'a> From<&'a DomainNewOrder> for NewOrder<'a> {
    fn from(value: &'a DomainNewOrder) -> Self {
        Self {
            hub_id: value.hub_id,
            ledger_id: value.ledger_id,
            order_no: value.order_no.as_str(),
            project_name: value.project_name.as_str(),
            partner_name: value.partner_name.as_str(),
            status: value.status.as_str(),
            subtotal_cents: value.subtotal_cents,
            tax_cents: value.tax_cents,
            total_cents: value.total_cents,
            contract_signed_date: value.contract_signed_date,
            order_deadline: value.order_deadline,
            notes: value.notes.as_deref(),
            updated_at: value.updated_at,
        }
    }
}

impl<'a> NewOrderWorkItem<'a> {
    pub fn from_domain(order_id: i32, value: &'a DomainOrderWorkItem) -> Self {
        Self {
            order_id,
            category: value.category.as_str(),
            name: value.name.as_str(),
            quantity: value.quantity,
            unit: value.unit.as_deref(),
            unit_price_cents: value.unit_price_cents,
            amount_cents: value.amount_cents,
        }
    }
}

impl<'a> NewOrderCostDetail<'a> {
    pub fn from_domain(order_id: i32, value: &'a DomainCostDetail) -> Self {
        Self {
            order_id,
            category: value.category.as_str(),
            item_name: value.item_name.as_str(),
            budget_cents: value.budget_cents,
            actual_cents: value.actual_cents,
        }
    }
}

impl<'a> From<&'a DomainUpdateOrder> for UpdateOrder<'a> {
    fn from(value: &'a DomainUpdateOrder) -> Self {
        Self {
            status: value.status.as_ref().map(|status| status.as_str()),
            budget_applied: value.budget_applied,
            dw_order_id: value
                .dw_order_id
                .as_ref()
                .map(|id| id.as_ref().map(String::as_str)),
            dw_sync_status: value.dw_sync_status.as_ref().map(|status| status.as_str()),
            dw_synced_at: value.dw_synced_at,
            dw_sync_error: value
                .dw_sync_error
                .as_ref()
                .map(|error| error.as_ref().map(String::as_str)),
            actual_labor_cents: value.actual_costs.map(|costs| costs.labor_cents),
            actual_material_cents: value.actual_costs.map(|costs| costs.material_cents),
            actual_equipment_cents: value.actual_costs.map(|costs| costs.equipment_cents),
            actual_other_cents: value.actual_costs.map(|costs| costs.other_cents),
            progress_status: value.progress.as_ref().map(|progress| progress.status.as_str()),
            progress_rate: value.progress.map(|progress| progress.rate),
            updated_at: value.updated_at,
        }
    }
}
