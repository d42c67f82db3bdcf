use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::approval_flow::{
    ApprovalCondition, ApprovalFlow as DomainFlow, ApprovalStepDefinition, Approver, DocumentType,
    NewApprovalFlow as DomainNewFlow,
};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::approval_flows)]
pub struct ApprovalFlow {
    pub id: i32,
    pub hub_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub document_type: String,
    pub conditions: String,
    pub is_active: bool,
    pub is_default: bool,
    pub priority: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Associations)]
#[diesel(table_name = crate::schema::approval_flow_steps)]
#[diesel(belongs_to(ApprovalFlow, foreign_key = flow_id))]
pub struct ApprovalFlowStep {
    pub id: i32,
    pub flow_id: i32,
    pub step_number: i32,
    pub name: String,
    pub mode: String,
    pub approvers: String,
    pub required_approvals: Option<i32>,
    pub timeout_hours: Option<i32>,
    pub allow_delegate: bool,
    pub allow_skip: bool,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::approval_flows)]
pub struct NewApprovalFlow<'a> {
    pub hub_id: i32,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub document_type: &'a str,
    pub conditions: String,
    pub is_active: bool,
    pub is_default: bool,
    pub priority: i32,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::approval_flow_steps)]
pub struct NewApprovalFlowStep<'a> {
    pub flow_id: i32,
    pub step_number: i32,
    pub name: &'a str,
    pub mode: &'a str,
    pub approvers: String,
    pub required_approvals: Option<i32>,
    pub timeout_hours: Option<i32>,
    pub allow_delegate: bool,
    pub allow_skip: bool,
}

/// Serialize a list column. Falls back to an empty list so a row is never
/// written with unparseable JSON.
pub(crate) fn to_json_list<T: serde::Serialize>(items: &[T]) -> String {
    serde_json::to_string(items).unwrap_or_else(|err| {
        log::error!("Failed to serialize list column: {err}");
        "[]".to_string()
    })
}

pub(crate) fn from_json_list<T: serde::de::DeserializeOwned>(raw: &str) -> Vec<T> {
    serde_json::from_str(raw).unwrap_or_else(|err| {
        log::warn!("Ignoring malformed list column: {err}");
        Vec::new()
    })
}

pub(crate) fn parse_approvers(raw: &str) -> Vec<Approver> {
    from_json_list(raw)
}

impl ApprovalFlow {
    pub fn into_domain(self, steps: Vec<ApprovalFlowStep>) -> Option<DomainFlow> {
        let document_type = match DocumentType::try_from(self.document_type.as_str()) {
            Ok(document_type) => document_type,
            Err(err) => {
                log::warn!("Skipping approval flow {}: {err}", self.id);
                return None;
            }
        };

        Some(DomainFlow {
            id: self.id,
            hub_id: self.hub_id,
            name: self.name,
            description: self.description,
            document_type,
            steps: steps
                .into_iter()
                .map(ApprovalFlowStep::into_domain)
                .collect(),
            conditions: from_json_list::<ApprovalCondition>(&self.conditions),
            is_active: self.is_active,
            is_default: self.is_default,
            priority: self.priority,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ApprovalFlowStep {
    pub fn into_domain(self) -> ApprovalStepDefinition {
        ApprovalStepDefinition {
            step_number: self.step_number,
            name: self.name,
            mode: self.mode.as_str().into(),
            approvers: parse_approvers(&self.approvers),
            required_approvals: self.required_approvals,
            timeout_hours: self.timeout_hours,
            allow_delegate: self.allow_delegate,
            allow_skip: self.allow_skip,
        }
    }
}

impl<'a> From<&'a DomainNewFlow> for NewApprovalFlow<'a> {
    fn from(value: &'a DomainNewFlow) -> Self {
        Self {
            hub_id: value.hub_id,
            name: value.name.as_str(),
            description: value.description.as_deref(),
            document_type: value.document_type.as_str(),
            conditions: to_json_list(&value.conditions),
            is_active: value.is_active,
            is_default: value.is_default,
            priority: value.priority,
            updated_at: value.updated_at,
        }
    }
}

impl<'a> NewApprovalFlowStep<'a> {
    pub fn from_domain(flow_id: i32, value: &'a ApprovalStepDefinition) -> Self {
        Self {
            flow_id,
            step_number: value.step_number,
            name: value.name.as_str(),
            mode: value.mode.as_str(),
            approvers: to_json_list(&value.approvers),
            required_approvals: value.required_approvals,
            timeout_hours: value.timeout_hours,
            allow_delegate: value.allow_delegate,
            allow_skip: value.allow_skip,
        }
    }
}
