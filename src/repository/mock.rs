use chrono::NaiveDateTime;
use mockall::mock;

use super::{
    ApprovalFlowReader, ApprovalFlowWriter, ApprovalReader, ApprovalWriter, CustomerReader,
    CustomerWriter, LedgerReader, LedgerWriter, OrderReader, OrderWriter,
};
use crate::domain::{
    approval::{ApprovalInstance, ApprovalListQuery, NewApprovalInstance, RecordedAction},
    approval_flow::{ApprovalFlow, ApprovalFlowListQuery, NewApprovalFlow},
    customer::{Customer, CustomerListQuery, NewCustomer},
    ledger::{
        BudgetOperation, ConstructionLedger, CostBreakdown, LedgerListQuery, NewLedger,
        UpdateLedger,
    },
    order::{NewOrder, Order, OrderListQuery, UpdateOrder},
};
use pushkind_common::repository::errors::RepositoryResult;

mock! {
    pub CustomerReader {}

    impl CustomerReader for CustomerReader {
        fn get_customer_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<Customer>>;
        fn list_customers(&self, query: CustomerListQuery) -> RepositoryResult<(usize, Vec<Customer>)>;
    }
}

mock! {
    pub CustomerWriter {}

    impl CustomerWriter for CustomerWriter {
        fn create_customer(&self, new_customer: &NewCustomer) -> RepositoryResult<Customer>;
    }
}

mock! {
    pub LedgerReader {}

    impl LedgerReader for LedgerReader {
        fn get_ledger_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<ConstructionLedger>>;
        fn get_ledger_by_construction_no(&self, construction_no: &str, hub_id: i32) -> RepositoryResult<Option<ConstructionLedger>>;
        fn list_ledgers(&self, query: LedgerListQuery) -> RepositoryResult<(usize, Vec<ConstructionLedger>)>;
    }
}

mock! {
    pub LedgerWriter {}

    impl LedgerWriter for LedgerWriter {
        fn create_ledger(&self, new_ledger: &NewLedger) -> RepositoryResult<ConstructionLedger>;
        fn update_ledger(&self, ledger_id: i32, hub_id: i32, updates: &UpdateLedger) -> RepositoryResult<ConstructionLedger>;
        fn apply_order_budget(&self, ledger_id: i32, order_id: i32, hub_id: i32, change: &CostBreakdown, operation: BudgetOperation) -> RepositoryResult<Option<ConstructionLedger>>;
        fn reconcile_ledger_costs(&self, ledger_id: i32, hub_id: i32, at: NaiveDateTime) -> RepositoryResult<ConstructionLedger>;
    }
}

mock! {
    pub OrderReader {}

    impl OrderReader for OrderReader {
        fn get_order_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<Order>>;
        fn get_order_by_no(&self, order_no: &str, hub_id: i32) -> RepositoryResult<Option<Order>>;
        fn get_order_by_dw_id(&self, dw_order_id: &str, hub_id: i32) -> RepositoryResult<Option<Order>>;
        fn list_orders(&self, query: OrderListQuery) -> RepositoryResult<(usize, Vec<Order>)>;
    }
}

mock! {
    pub OrderWriter {}

    impl OrderWriter for OrderWriter {
        fn create_order(&self, new_order: &NewOrder) -> RepositoryResult<Order>;
        fn update_order(&self, order_id: i32, hub_id: i32, updates: &UpdateOrder) -> RepositoryResult<Order>;
        fn delete_order(&self, order_id: i32, hub_id: i32) -> RepositoryResult<()>;
        fn record_dw_costs(&self, order_id: i32, hub_id: i32, updates: &UpdateOrder) -> RepositoryResult<(Order, Option<ConstructionLedger>)>;
    }
}

mock! {
    pub ApprovalFlowReader {}

    impl ApprovalFlowReader for ApprovalFlowReader {
        fn get_flow_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<ApprovalFlow>>;
        fn list_flows(&self, query: ApprovalFlowListQuery) -> RepositoryResult<Vec<ApprovalFlow>>;
    }
}

mock! {
    pub ApprovalFlowWriter {}

    impl ApprovalFlowWriter for ApprovalFlowWriter {
        fn create_flow(&self, new_flow: &NewApprovalFlow) -> RepositoryResult<ApprovalFlow>;
        fn update_flow(&self, flow_id: i32, hub_id: i32, flow: &NewApprovalFlow) -> RepositoryResult<ApprovalFlow>;
        fn delete_flow(&self, flow_id: i32, hub_id: i32) -> RepositoryResult<()>;
    }
}

mock! {
    pub ApprovalReader {}

    impl ApprovalReader for ApprovalReader {
        fn get_approval_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<ApprovalInstance>>;
        fn list_approvals(&self, query: ApprovalListQuery) -> RepositoryResult<(usize, Vec<ApprovalInstance>)>;
    }
}

mock! {
    pub ApprovalWriter {}

    impl ApprovalWriter for ApprovalWriter {
        fn create_approval(
            &self,
            new_instance: &NewApprovalInstance,
        ) -> RepositoryResult<Option<ApprovalInstance>>;
        fn save_approval(&self, instance: &ApprovalInstance, action: Option<RecordedAction>) -> RepositoryResult<Option<ApprovalInstance>>;
    }
}
