use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::domain::approval_flow::{
    ApprovalCondition, ApprovalFlowListQuery, ApprovalStepDefinition, ApprovalStepMode, Approver,
    ConditionOperator, ConditionValue, DocumentType, NewApprovalFlow,
};
use crate::forms::{sanitize_optional, sanitize_plain_text};

const NAME_MAX_LEN: u64 = 255;
const DESCRIPTION_MAX_LEN: u64 = 2048;

/// Result type returned by the approval flow form helpers.
pub type ApprovalFlowFormResult<T> = Result<T, ApprovalFlowFormError>;

/// Errors that can occur while processing approval flow payloads.
#[derive(Debug, Error)]
pub enum ApprovalFlowFormError {
    /// Validation failures from the `validator` crate.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("flow name cannot be empty")]
    EmptyName,
    #[error("a flow needs at least one step")]
    NoSteps,
    #[error("step {step} has no name")]
    EmptyStepName { step: usize },
    #[error("step {step} has an approver without an id")]
    EmptyApproverId { step: usize },
    #[error("step {step} lists approver {id} more than once")]
    DuplicateApprover { step: usize, id: String },
    #[error("condition on `{field}` can only compare text with eq or ne")]
    TextConditionOperator { field: String },
    #[error("a condition has no field")]
    EmptyConditionField,
    #[error("step {step} requires {required} approvals but lists {approvers} approvers")]
    RequiredApprovalsOutOfRange {
        step: usize,
        required: i32,
        approvers: usize,
    },
}

/// Approver entry of a step payload.
#[derive(Debug, Deserialize, Validate)]
pub struct ApproverPayload {
    #[validate(length(min = 1, max = NAME_MAX_LEN))]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
}

/// Step definition submitted with a flow. Step numbers are assigned from the
/// position in the list.
#[derive(Debug, Deserialize, Validate)]
pub struct StepPayload {
    #[validate(length(min = 1, max = NAME_MAX_LEN))]
    pub name: String,
    #[serde(default)]
    pub mode: ApprovalStepMode,
    #[serde(default)]
    #[validate(nested)]
    pub approvers: Vec<ApproverPayload>,
    pub required_approvals: Option<i32>,
    #[validate(range(min = 1))]
    pub timeout_hours: Option<i32>,
    #[serde(default)]
    pub allow_delegate: bool,
    #[serde(default)]
    pub allow_skip: bool,
}

fn default_active() -> bool {
    true
}

/// Payload accepted when creating or replacing an approval flow.
#[derive(Debug, Deserialize, Validate)]
pub struct ApprovalFlowForm {
    #[validate(length(min = 1, max = NAME_MAX_LEN))]
    pub name: String,
    #[validate(length(max = DESCRIPTION_MAX_LEN))]
    pub description: Option<String>,
    pub document_type: DocumentType,
    #[validate(nested)]
    pub steps: Vec<StepPayload>,
    #[serde(default)]
    pub conditions: Vec<ApprovalCondition>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub priority: i32,
}

impl ApprovalFlowForm {
    /// Validates the payload into a domain `NewApprovalFlow`.
    pub fn into_new_flow(self, hub_id: i32) -> ApprovalFlowFormResult<NewApprovalFlow> {
        self.validate()?;

        let name = sanitize_plain_text(&self.name);
        if name.is_empty() {
            return Err(ApprovalFlowFormError::EmptyName);
        }
        if self.steps.is_empty() {
            return Err(ApprovalFlowFormError::NoSteps);
        }

        let mut steps = Vec::with_capacity(self.steps.len());
        for (index, payload) in self.steps.into_iter().enumerate() {
            steps.push(step_definition(index + 1, payload)?);
        }

        let mut conditions = Vec::with_capacity(self.conditions.len());
        for condition in self.conditions {
            conditions.push(condition_definition(condition)?);
        }

        let mut flow = NewApprovalFlow::new(hub_id, name, self.document_type)
            .with_steps(steps)
            .with_conditions(conditions);
        flow.description = sanitize_optional(self.description);
        flow.is_active = self.is_active;
        flow.is_default = self.is_default;
        flow.priority = self.priority;

        Ok(flow)
    }
}

fn step_definition(
    step: usize,
    payload: StepPayload,
) -> ApprovalFlowFormResult<ApprovalStepDefinition> {
    let name = sanitize_plain_text(&payload.name);
    if name.is_empty() {
        return Err(ApprovalFlowFormError::EmptyStepName { step });
    }

    let mut approvers = Vec::with_capacity(payload.approvers.len());
    let mut seen = HashSet::new();
    for approver in payload.approvers {
        let id = approver.id.trim().to_string();
        if id.is_empty() {
            return Err(ApprovalFlowFormError::EmptyApproverId { step });
        }
        if !seen.insert(id.clone()) {
            return Err(ApprovalFlowFormError::DuplicateApprover { step, id });
        }
        approvers.push(Approver {
            id,
            name: sanitize_plain_text(&approver.name),
            email: approver
                .email
                .map(|email| email.trim().to_lowercase())
                .unwrap_or_default(),
        });
    }

    let required_approvals = match payload.mode {
        ApprovalStepMode::Parallel => payload.required_approvals,
        ApprovalStepMode::Serial => None,
    };
    let out_of_range = |required: i32| required < 1 || required as usize > approvers.len();
    if let Some(required) = required_approvals.filter(|r| !approvers.is_empty() && out_of_range(*r)) {
        return Err(ApprovalFlowFormError::RequiredApprovalsOutOfRange {
            step,
            required,
            approvers: approvers.len(),
        });
    }

    Ok(ApprovalStepDefinition {
        step_number: step as i32,
        name,
        mode: payload.mode,
        approvers,
        required_approvals,
        timeout_hours: payload.timeout_hours,
        allow_delegate: payload.allow_delegate,
        allow_skip: payload.allow_skip,
    })
}

fn condition_definition(condition: ApprovalCondition) -> ApprovalFlowFormResult<ApprovalCondition> {
    let field = condition.field.trim().to_string();
    if field.is_empty() {
        return Err(ApprovalFlowFormError::EmptyConditionField);
    }

    let ordered = !matches!(condition.operator, ConditionOperator::Eq | ConditionOperator::Ne);
    if let ConditionValue::Text(text) = &condition.value {
        if ordered && text.trim().parse::<f64>().is_err() {
            return Err(ApprovalFlowFormError::TextConditionOperator { field });
        }
    }

    Ok(ApprovalCondition { field, ..condition })
}

/// Query parameters accepted by `GET /approval-flows`.
#[derive(Debug, Default, Deserialize)]
pub struct ApprovalFlowsQuery {
    pub document_type: Option<DocumentType>,
    pub is_active: Option<bool>,
}

impl ApprovalFlowsQuery {
    pub fn into_list_query(self, hub_id: i32) -> ApprovalFlowListQuery {
        let mut query = ApprovalFlowListQuery::new(hub_id);
        if let Some(document_type) = self.document_type {
            query = query.document_type(document_type);
        }
        if let Some(active) = self.is_active {
            query = query.active(active);
        }
        query
    }
}
