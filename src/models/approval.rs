use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::approval::{
    ActionKind, ApprovalAction as DomainAction, ApprovalInstance as DomainInstance,
    ApprovalInstanceStep as DomainStep, NewApprovalInstance as DomainNewInstance,
};
use crate::domain::approval_flow::{Approver, DocumentType};
use crate::models::approval_flow::{parse_approvers, to_json_list};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::approval_instances)]
pub struct ApprovalInstance {
    pub id: i32,
    pub hub_id: i32,
    pub flow_id: Option<i32>,
    pub flow_name: String,
    pub document_type: String,
    pub document_id: String,
    pub document_title: String,
    pub amount_cents: Option<i64>,
    pub requested_by_id: String,
    pub requested_by_name: String,
    pub requested_by_email: String,
    pub status: String,
    pub current_step: i32,
    pub total_steps: i32,
    pub version: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Associations)]
#[diesel(table_name = crate::schema::approval_instance_steps)]
#[diesel(belongs_to(ApprovalInstance, foreign_key = instance_id))]
pub struct ApprovalInstanceStep {
    pub id: i32,
    pub instance_id: i32,
    pub step_number: i32,
    pub name: String,
    pub mode: String,
    pub approvers: String,
    pub required_approvals: i32,
    pub allow_delegate: bool,
    pub timeout_hours: Option<i32>,
    pub status: String,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub timeout_at: Option<NaiveDateTime>,
    pub allow_skip: bool,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Associations)]
#[diesel(table_name = crate::schema::approval_actions)]
#[diesel(belongs_to(ApprovalInstance, foreign_key = instance_id))]
pub struct ApprovalAction {
    pub id: i32,
    pub instance_id: i32,
    pub step_number: i32,
    pub approver_id: String,
    pub approver_name: String,
    pub approver_email: String,
    pub on_behalf_of: Option<String>,
    pub action: String,
    pub comment: Option<String>,
    pub delegated_to: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::approval_instances)]
pub struct NewApprovalInstance<'a> {
    pub hub_id: i32,
    pub flow_id: Option<i32>,
    pub flow_name: &'a str,
    pub document_type: &'a str,
    pub document_id: &'a str,
    pub document_title: &'a str,
    pub amount_cents: Option<i64>,
    pub requested_by_id: &'a str,
    pub requested_by_name: &'a str,
    pub requested_by_email: &'a str,
    pub status: &'a str,
    pub current_step: i32,
    pub total_steps: i32,
    pub version: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::approval_instance_steps)]
pub struct NewApprovalInstanceStep<'a> {
    pub instance_id: i32,
    pub step_number: i32,
    pub name: &'a str,
    pub mode: &'a str,
    pub approvers: String,
    pub required_approvals: i32,
    pub allow_delegate: bool,
    pub timeout_hours: Option<i32>,
    pub status: &'a str,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub timeout_at: Option<NaiveDateTime>,
    pub allow_skip: bool,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::approval_actions)]
pub struct NewApprovalAction<'a> {
    pub instance_id: i32,
    pub step_number: i32,
    pub approver_id: &'a str,
    pub approver_name: &'a str,
    pub approver_email: &'a str,
    pub on_behalf_of: Option<&'a str>,
    pub action: &'a str,
    pub comment: Option<&'a str>,
    pub delegated_to: Option<&'a str>,
    pub created_at: NaiveDateTime,
}

/// Progress columns rewritten after every decision.
#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::approval_instances)]
#[diesel(treat_none_as_null = true)]
pub struct ApprovalProgress<'a> {
    pub status: &'a str,
    pub current_step: i32,
    pub version: i32,
    pub updated_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::approval_instance_steps)]
#[diesel(treat_none_as_null = true)]
pub struct StepProgress<'a> {
    pub status: &'a str,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub timeout_at: Option<NaiveDateTime>,
}

impl ApprovalInstance {
    /// Assemble the domain instance. Rows with an unknown document type are
    /// skipped with a warning.
    pub fn into_domain(
        self,
        steps: Vec<ApprovalInstanceStep>,
        actions: Vec<ApprovalAction>,
    ) -> Option<DomainInstance> {
        let document_type = match DocumentType::try_from(self.document_type.as_str()) {
            Ok(document_type) => document_type,
            Err(err) => {
                log::warn!("Skipping approval instance {}: {err}", self.id);
                return None;
            }
        };

        let mut domain_steps: Vec<DomainStep> =
            steps.into_iter().map(ApprovalInstanceStep::into_domain).collect();
        for action in actions {
            let step_number = action.step_number;
            let Some(domain_action) = action.into_domain() else {
                continue;
            };
            if let Some(step) = domain_steps
                .iter_mut()
                .find(|step| step.step_number == step_number)
            {
                step.actions.push(domain_action);
            }
        }

        Some(DomainInstance {
            id: self.id,
            hub_id: self.hub_id,
            flow_id: self.flow_id,
            flow_name: self.flow_name,
            document_type,
            document_id: self.document_id,
            document_title: self.document_title,
            amount_cents: self.amount_cents,
            requested_by: Approver {
                id: self.requested_by_id,
                name: self.requested_by_name,
                email: self.requested_by_email,
            },
            status: self.status.as_str().into(),
            current_step: self.current_step,
            total_steps: self.total_steps,
            steps: domain_steps,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        })
    }
}

impl ApprovalInstanceStep {
    pub fn into_domain(self) -> DomainStep {
        DomainStep {
            step_number: self.step_number,
            name: self.name,
            mode: self.mode.as_str().into(),
            approvers: parse_approvers(&self.approvers),
            required_approvals: self.required_approvals,
            allow_delegate: self.allow_delegate,
            allow_skip: self.allow_skip,
            timeout_hours: self.timeout_hours,
            status: self.status.as_str().into(),
            actions: Vec::new(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            timeout_at: self.timeout_at,
        }
    }
}

impl ApprovalAction {
    pub fn into_domain(self) -> Option<DomainAction> {
        let action = match ActionKind::try_from(self.action.as_str()) {
            Ok(action) => action,
            Err(err) => {
                log::warn!("Skipping approval action {}: {err}", self.id);
                return None;
            }
        };

        Some(DomainAction {
            approver_id: self.approver_id,
            approver_name: self.approver_name,
            approver_email: self.approver_email,
            on_behalf_of: self.on_behalf_of,
            action,
            comment: self.comment,
            delegated_to: self.delegated_to,
            created_at: self.created_at,
        })
    }
}

impl<'a> From<&'a DomainNewInstance> for NewApprovalInstance<'a> {
    fn from(value: &'a DomainNewInstance) -> Self {
        Self {
            hub_id: value.hub_id,
            flow_id: value.flow_id,
            flow_name: value.flow_name.as_str(),
            document_type: value.document_type.as_str(),
            document_id: value.document_id.as_str(),
            document_title: value.document_title.as_str(),
            amount_cents: value.amount_cents,
            requested_by_id: value.requested_by.id.as_str(),
            requested_by_name: value.requested_by.name.as_str(),
            requested_by_email: value.requested_by.email.as_str(),
            status: "pending",
            current_step: 1,
            total_steps: value.steps.len() as i32,
            version: 1,
            created_at: value.created_at,
            updated_at: value.created_at,
        }
    }
}

impl<'a> NewApprovalInstanceStep<'a> {
    pub fn from_domain(instance_id: i32, value: &'a DomainStep) -> Self {
        Self {
            instance_id,
            step_number: value.step_number,
            name: value.name.as_str(),
            mode: value.mode.as_str(),
            approvers: to_json_list(&value.approvers),
            required_approvals: value.required_approvals,
            allow_delegate: value.allow_delegate,
            timeout_hours: value.timeout_hours,
            status: value.status.as_str(),
            started_at: value.started_at,
            completed_at: value.completed_at,
            timeout_at: value.timeout_at,
            allow_skip: value.allow_skip,
        }
    }
}

impl<'a> NewApprovalAction<'a> {
    pub fn from_domain(instance_id: i32, step_number: i32, value: &'a DomainAction) -> Self {
        Self {
            instance_id,
            step_number,
            approver_id: value.approver_id.as_str(),
            approver_name: value.approver_name.as_str(),
            approver_email: value.approver_email.as_str(),
            on_behalf_of: value.on_behalf_of.as_deref(),
            action: value.action.as_str(),
            comment: value.comment.as_deref(),
            delegated_to: value.delegated_to.as_deref(),
            created_at: value.created_at,
        }
    }
}

impl<'a> ApprovalProgress<'a> {
    /// Progress of `value` with the version bumped past `value.version`.
    pub fn next_version(value: &'a DomainInstance) -> Self {
        Self {
            status: value.status.as_str(),
            current_step: value.current_step,
            version: value.version + 1,
            updated_at: value.updated_at,
            completed_at: value.completed_at,
        }
    }
}

impl<'a> From<&'a DomainStep> for StepProgress<'a> {
    fn from(value: &'a DomainStep) -> Self {
        Self {
            status: value.status.as_str(),
            started_at: value.started_at,
            completed_at: value.completed_at,
            timeout_at: value.timeout_at,
        }
    }
}
