use chrono::NaiveDateTime;
use pushkind_common::db::{DbConnection, DbPool};
use pushkind_common::repository::errors::RepositoryResult;

use crate::domain::approval::{
    ApprovalInstance, ApprovalListQuery, NewApprovalInstance, RecordedAction,
};
use crate::domain::approval_flow::{ApprovalFlow, ApprovalFlowListQuery, NewApprovalFlow};
use crate::domain::customer::{Customer, CustomerListQuery, NewCustomer};
use crate::domain::ledger::{
    BudgetOperation, ConstructionLedger, CostBreakdown, LedgerListQuery, NewLedger, UpdateLedger,
};
use crate::domain::order::{NewOrder, Order, OrderListQuery, UpdateOrder};

pub mod approval;
pub mod approval_flow;
pub mod customer;
pub mod ledger;
pub mod order;

#[cfg(test)]
pub mod mock;

#[derive(Clone)]
/// Diesel-backed repository implementation that wraps an r2d2 pool.
pub struct DieselRepository {
    pool: DbPool, // r2d2::Pool is cheap to clone
}

impl DieselRepository {
    /// Create a new repository using the provided connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> RepositoryResult<DbConnection> {
        Ok(self.pool.get()?)
    }
}

/// Read-only operations over customer records.
pub trait CustomerReader {
    fn get_customer_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<Customer>>;
    fn list_customers(&self, query: CustomerListQuery) -> RepositoryResult<(usize, Vec<Customer>)>;
}

/// Write operations over customer records.
pub trait CustomerWriter {
    fn create_customer(&self, new_customer: &NewCustomer) -> RepositoryResult<Customer>;
}

/// Read-only operations over construction ledgers.
pub trait LedgerReader {
    fn get_ledger_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<ConstructionLedger>>;
    fn get_ledger_by_construction_no(
        &self,
        construction_no: &str,
        hub_id: i32,
    ) -> RepositoryResult<Option<ConstructionLedger>>;
    fn list_ledgers(
        &self,
        query: LedgerListQuery,
    ) -> RepositoryResult<(usize, Vec<ConstructionLedger>)>;
}

/// Write operations over construction ledgers.
pub trait LedgerWriter {
    fn create_ledger(&self, new_ledger: &NewLedger) -> RepositoryResult<ConstructionLedger>;
    fn update_ledger(
        &self,
        ledger_id: i32,
        hub_id: i32,
        updates: &UpdateLedger,
    ) -> RepositoryResult<ConstructionLedger>;
    /// Add the signed `change` to the ledger's execution budget and flip the
    /// order's `budget_applied` flag per `operation` in one transaction.
    /// Returns `None` when the flag was already in the target state.
    fn apply_order_budget(
        &self,
        ledger_id: i32,
        order_id: i32,
        hub_id: i32,
        change: &CostBreakdown,
        operation: BudgetOperation,
    ) -> RepositoryResult<Option<ConstructionLedger>>;
    /// Recompute the ledger's actual cost from the DW costs of its orders.
    fn reconcile_ledger_costs(
        &self,
        ledger_id: i32,
        hub_id: i32,
        at: NaiveDateTime,
    ) -> RepositoryResult<ConstructionLedger>;
}

/// Read-only operations over partner orders.
pub trait OrderReader {
    fn get_order_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<Order>>;
    fn get_order_by_no(&self, order_no: &str, hub_id: i32) -> RepositoryResult<Option<Order>>;
    fn get_order_by_dw_id(&self, dw_order_id: &str, hub_id: i32) -> RepositoryResult<Option<Order>>;
    fn list_orders(&self, query: OrderListQuery) -> RepositoryResult<(usize, Vec<Order>)>;
}

/// Write operations over partner orders.
pub trait OrderWriter {
    fn create_order(&self, new_order: &NewOrder) -> RepositoryResult<Order>;
    fn update_order(
        &self,
        order_id: i32,
        hub_id: i32,
        updates: &UpdateOrder,
    ) -> RepositoryResult<Order>;
    fn delete_order(&self, order_id: i32, hub_id: i32) -> RepositoryResult<()>;
    /// Store DW cost data on the order and reconcile the linked ledger in the
    /// same transaction.
    fn record_dw_costs(
        &self,
        order_id: i32,
        hub_id: i32,
        updates: &UpdateOrder,
    ) -> RepositoryResult<(Order, Option<ConstructionLedger>)>;
}

/// Read-only operations over approval flow definitions.
pub trait ApprovalFlowReader {
    fn get_flow_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<ApprovalFlow>>;
    fn list_flows(&self, query: ApprovalFlowListQuery) -> RepositoryResult<Vec<ApprovalFlow>>;
}

/// Write operations over approval flow definitions.
pub trait ApprovalFlowWriter {
    fn create_flow(&self, new_flow: &NewApprovalFlow) -> RepositoryResult<ApprovalFlow>;
    /// Replace a flow definition including all of its steps.
    fn update_flow(
        &self,
        flow_id: i32,
        hub_id: i32,
        flow: &NewApprovalFlow,
    ) -> RepositoryResult<ApprovalFlow>;
    fn delete_flow(&self, flow_id: i32, hub_id: i32) -> RepositoryResult<()>;
}

/// Read-only operations over approval instances.
pub trait ApprovalReader {
    fn get_approval_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<ApprovalInstance>>;
    fn list_approvals(
        &self,
        query: ApprovalListQuery,
    ) -> RepositoryResult<(usize, Vec<ApprovalInstance>)>;
}

/// Write operations over approval instances.
pub trait ApprovalWriter {
    /// Insert a new instance with its steps. Returns `None` when the
    /// document already has a pending instance.
    fn create_approval(
        &self,
        new_instance: &NewApprovalInstance,
    ) -> RepositoryResult<Option<ApprovalInstance>>;
    /// Persist the instance's progress and an optional new action if the
    /// stored version still equals `instance.version`. The stored version is
    /// incremented; `None` signals that another writer got there first.
    fn save_approval(
        &self,
        instance: &ApprovalInstance,
        action: Option<RecordedAction>,
    ) -> RepositoryResult<Option<ApprovalInstance>>;
}
