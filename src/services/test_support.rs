//! Fixtures shared by the service tests.

use chrono::{NaiveDate, NaiveDateTime};
use pushkind_common::domain::auth::AuthenticatedUser;

use crate::domain::approval::{ApprovalInstance, ApprovalStatus, NewApprovalInstance};
use crate::domain::approval_flow::{
    ApprovalFlow, ApprovalStepDefinition, ApprovalStepMode, Approver, DocumentType,
};
use crate::domain::customer::Customer;
use crate::domain::ledger::{
    ConstructionLedger, CostBreakdown, LedgerStatus, ProgressStatus, WorkProgress,
};
use crate::domain::order::{
    ActualCosts, DwSyncStatus, Order, OrderStatus, OrderWorkItem,
};

pub fn user_with_roles(roles: &[&str]) -> AuthenticatedUser {
    AuthenticatedUser {
        sub: "user-1".to_string(),
        email: "user@example.com".to_string(),
        hub_id: 42,
        name: "Tester".to_string(),
        roles: roles.iter().map(|role| (*role).to_string()).collect(),
        exp: 0,
    }
}

pub fn admin_user(sub: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        sub: sub.to_string(),
        email: format!("{sub}@example.com"),
        name: format!("User {sub}"),
        ..user_with_roles(&[crate::SERVICE_ACCESS_ROLE])
    }
}

pub fn fixed_datetime() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("valid datetime")
}

pub fn customer(id: i32, name: &str) -> Customer {
    Customer {
        id,
        hub_id: 42,
        name: name.to_string(),
        email: None,
        phone: None,
        created_at: fixed_datetime(),
        updated_at: fixed_datetime(),
    }
}

pub fn ledger(id: i32) -> ConstructionLedger {
    ConstructionLedger {
        id,
        hub_id: 42,
        customer_id: None,
        construction_no: format!("C-{id}"),
        construction_name: "Office renovation".to_string(),
        contract_no: None,
        contract_amount_cents: 10_000_000,
        execution_budget: CostBreakdown {
            material_cents: 3_000_000,
            labor_cents: 2_000_000,
            outsourcing_cents: 2_000_000,
            expense_cents: 1_000_000,
        },
        actual_cost: CostBreakdown::default(),
        progress: WorkProgress::new(ProgressStatus::NotStarted, 0),
        status: LedgerStatus::Approved,
        dw_last_updated_at: None,
        created_at: fixed_datetime(),
        updated_at: fixed_datetime(),
    }
}

pub fn order(id: i32, status: OrderStatus) -> Order {
    let signed = NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date");
    Order {
        id,
        hub_id: 42,
        ledger_id: Some(1),
        order_no: format!("PO-{id}"),
        project_name: "Office renovation".to_string(),
        partner_name: "Tanaka Electric".to_string(),
        status,
        work_items: vec![OrderWorkItem::new("電気", "Wiring", 2, 50_000)],
        subtotal_cents: 100_000,
        tax_cents: 10_000,
        total_cents: 110_000,
        contract_signed_date: signed,
        order_deadline: signed + chrono::Duration::days(7),
        budget_applied: false,
        dw_order_id: None,
        dw_sync_status: DwSyncStatus::NotSynced,
        dw_synced_at: None,
        dw_sync_error: None,
        actual_costs: ActualCosts::default(),
        progress: WorkProgress::default(),
        cost_details: Vec::new(),
        notes: None,
        created_at: fixed_datetime(),
        updated_at: fixed_datetime(),
    }
}

pub fn approver(id: &str) -> Approver {
    Approver {
        id: id.to_string(),
        name: format!("User {id}"),
        email: format!("{id}@example.com"),
    }
}

pub fn step(mode: ApprovalStepMode, approvers: &[&str]) -> ApprovalStepDefinition {
    ApprovalStepDefinition {
        step_number: 1,
        name: "Review".to_string(),
        mode,
        approvers: approvers.iter().map(|id| approver(id)).collect(),
        required_approvals: None,
        timeout_hours: Some(24),
        allow_delegate: true,
        allow_skip: false,
    }
}

pub fn flow(id: i32, document_type: DocumentType, steps: Vec<ApprovalStepDefinition>) -> ApprovalFlow {
    let steps = steps
        .into_iter()
        .enumerate()
        .map(|(index, step)| ApprovalStepDefinition {
            step_number: index as i32 + 1,
            ..step
        })
        .collect();
    ApprovalFlow {
        id,
        hub_id: 42,
        name: format!("Flow {id}"),
        description: None,
        document_type,
        steps,
        conditions: Vec::new(),
        is_active: true,
        is_default: false,
        priority: 0,
        created_at: fixed_datetime(),
        updated_at: fixed_datetime(),
    }
}

/// Stored instance as the repository would return it after `create_approval`.
pub fn stored_instance(id: i32, new_instance: NewApprovalInstance) -> ApprovalInstance {
    ApprovalInstance {
        id,
        hub_id: new_instance.hub_id,
        flow_id: new_instance.flow_id,
        flow_name: new_instance.flow_name,
        document_type: new_instance.document_type,
        document_id: new_instance.document_id,
        document_title: new_instance.document_title,
        amount_cents: new_instance.amount_cents,
        requested_by: new_instance.requested_by,
        status: ApprovalStatus::Pending,
        current_step: 1,
        total_steps: new_instance.steps.len() as i32,
        steps: new_instance.steps,
        version: 1,
        created_at: new_instance.created_at,
        updated_at: new_instance.created_at,
        completed_at: None,
    }
}
