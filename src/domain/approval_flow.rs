use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Kinds of document that can be routed through an approval flow.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Estimate,
    Contract,
    Invoice,
    Expense,
    Purchase,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Estimate => "estimate",
            Self::Contract => "contract",
            Self::Invoice => "invoice",
            Self::Expense => "expense",
            Self::Purchase => "purchase",
        }
    }
}

impl TryFrom<&str> for DocumentType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "estimate" => Ok(Self::Estimate),
            "contract" => Ok(Self::Contract),
            "invoice" => Ok(Self::Invoice),
            "expense" => Ok(Self::Expense),
            "purchase" => Ok(Self::Purchase),
            other => Err(format!("unknown document type: {other}")),
        }
    }
}

/// How the approvers of a step are asked.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStepMode {
    /// Approvers act one after another in listed order.
    #[default]
    Serial,
    /// Approvers act in any order until enough approvals are collected.
    Parallel,
}

impl ApprovalStepMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Parallel => "parallel",
        }
    }
}

impl From<&str> for ApprovalStepMode {
    fn from(value: &str) -> Self {
        match value {
            "parallel" => Self::Parallel,
            _ => Self::Serial,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Gte,
    Lte,
    Eq,
    Ne,
    Gt,
    Lt,
}

impl ConditionOperator {
    fn holds<T: PartialOrd + ?Sized>(self, actual: &T, expected: &T) -> bool {
        match self {
            Self::Gte => actual >= expected,
            Self::Lte => actual <= expected,
            Self::Eq => actual == expected,
            Self::Ne => actual != expected,
            Self::Gt => actual > expected,
            Self::Lt => actual < expected,
        }
    }
}

/// Right-hand side of a condition, given as a JSON number or string.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Text(String),
}

impl ConditionValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(value) => value.trim().parse().ok(),
        }
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Predicate on a request attribute that a flow requires to apply.
///
/// `amount` reads the document amount; any other field is looked up in the
/// request attributes (for example `customerType`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApprovalCondition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: ConditionValue,
}

impl ApprovalCondition {
    /// Evaluate against a request. Absent fields never match and text values
    /// only support `eq` and `ne`.
    pub fn matches(&self, request: &FlowRequest) -> bool {
        if self.field == "amount" {
            return match (request.amount_cents, self.value.as_number()) {
                (Some(actual), Some(expected)) => self.operator.holds(&(actual as f64), &expected),
                _ => false,
            };
        }

        let Some(actual) = request.attributes.get(&self.field) else {
            return false;
        };
        match &self.value {
            ConditionValue::Number(expected) => actual
                .trim()
                .parse::<f64>()
                .is_ok_and(|actual| self.operator.holds(&actual, expected)),
            ConditionValue::Text(expected) => match self.operator {
                ConditionOperator::Eq | ConditionOperator::Ne => {
                    self.operator.holds(actual.as_str(), expected.as_str())
                }
                _ => false,
            },
        }
    }
}

/// Person who may approve a step.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Approver {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Step template of an approval flow.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApprovalStepDefinition {
    pub step_number: i32,
    pub name: String,
    pub mode: ApprovalStepMode,
    /// Empty means any authorised user may act on the step.
    pub approvers: Vec<Approver>,
    /// Parallel steps only; defaults to every approver.
    pub required_approvals: Option<i32>,
    pub timeout_hours: Option<i32>,
    pub allow_delegate: bool,
    /// Lets an approver of the step pass it on without approving.
    pub allow_skip: bool,
}

impl ApprovalStepDefinition {
    /// Approvals needed to complete the step, never less than one.
    pub fn effective_required_approvals(&self) -> i32 {
        let slots = self.approvers.len() as i32;
        match self.mode {
            ApprovalStepMode::Serial => slots.max(1),
            ApprovalStepMode::Parallel => self.required_approvals.unwrap_or(slots).max(1),
        }
    }
}

/// Approval flow definition for a hub.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApprovalFlow {
    pub id: i32,
    pub hub_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub document_type: DocumentType,
    pub steps: Vec<ApprovalStepDefinition>,
    pub conditions: Vec<ApprovalCondition>,
    pub is_active: bool,
    pub is_default: bool,
    /// Higher priorities win during flow selection.
    pub priority: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ApprovalFlow {
    pub fn applies_to(&self, request: &FlowRequest) -> bool {
        self.is_active
            && self.document_type == request.document_type
            && self.conditions.iter().all(|condition| condition.matches(request))
    }
}

/// Attributes of a document used to pick an approval flow.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRequest {
    pub document_type: DocumentType,
    pub amount_cents: Option<i64>,
    pub attributes: HashMap<String, String>,
}

/// Pick the flow for a request: highest priority first, then default flows,
/// then the lowest id.
pub fn select_flow<'a>(flows: &'a [ApprovalFlow], request: &FlowRequest) -> Option<&'a ApprovalFlow> {
    flows
        .iter()
        .filter(|flow| flow.applies_to(request))
        .min_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.is_default.cmp(&a.is_default))
                .then(a.id.cmp(&b.id))
        })
}

/// Payload for creating or replacing an approval flow.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApprovalFlow {
    pub hub_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub document_type: DocumentType,
    pub steps: Vec<ApprovalStepDefinition>,
    pub conditions: Vec<ApprovalCondition>,
    pub is_active: bool,
    pub is_default: bool,
    pub priority: i32,
    pub updated_at: NaiveDateTime,
}

impl NewApprovalFlow {
    pub fn new(hub_id: i32, name: impl Into<String>, document_type: DocumentType) -> Self {
        Self {
            hub_id,
            name: name.into(),
            description: None,
            document_type,
            steps: Vec::new(),
            conditions: Vec::new(),
            is_active: true,
            is_default: false,
            priority: 0,
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Attach steps, renumbering them 1..n in the given order.
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<ApprovalStepDefinition>) -> Self {
        self.steps = steps
            .into_iter()
            .enumerate()
            .map(|(index, mut step)| {
                step.step_number = index as i32 + 1;
                step
            })
            .collect();
        self
    }

    #[must_use]
    pub fn with_conditions(mut self, conditions: Vec<ApprovalCondition>) -> Self {
        self.conditions = conditions;
        self
    }
}

/// Query definition used to list approval flows for a hub.
#[derive(Debug, Clone)]
pub struct ApprovalFlowListQuery {
    pub hub_id: i32,
    pub document_type: Option<DocumentType>,
    pub is_active: Option<bool>,
}

impl ApprovalFlowListQuery {
    pub fn new(hub_id: i32) -> Self {
        Self {
            hub_id,
            document_type: None,
            is_active: None,
        }
    }

    pub fn document_type(mut self, document_type: DocumentType) -> Self {
        self.document_type = Some(document_type);
        self
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn flow(id: i32, priority: i32, is_default: bool, conditions: Vec<ApprovalCondition>) -> ApprovalFlow {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        ApprovalFlow {
            id,
            hub_id: 1,
            name: format!("flow {id}"),
            description: None,
            document_type: DocumentType::Purchase,
            steps: Vec::new(),
            conditions,
            is_active: true,
            is_default,
            priority,
            created_at: now,
            updated_at: now,
        }
    }

    fn amount_at_least(value: f64) -> ApprovalCondition {
        ApprovalCondition {
            field: "amount".to_string(),
            operator: ConditionOperator::Gte,
            value: value.into(),
        }
    }

    fn request(amount: Option<i64>) -> FlowRequest {
        FlowRequest {
            document_type: DocumentType::Purchase,
            amount_cents: amount,
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn select_prefers_priority_then_default_then_id() {
        let flows = vec![
            flow(3, 0, true, Vec::new()),
            flow(2, 5, false, Vec::new()),
            flow(1, 5, false, Vec::new()),
            flow(4, 5, true, Vec::new()),
        ];

        let selected = select_flow(&flows, &request(Some(100))).unwrap();
        assert_eq!(selected.id, 4);

        let without_default = &flows[..3];
        let selected = select_flow(without_default, &request(Some(100))).unwrap();
        assert_eq!(selected.id, 1);
    }

    #[test]
    fn conditions_must_all_hold() {
        let flows = vec![
            flow(1, 10, false, vec![amount_at_least(1_000_000.0)]),
            flow(2, 0, true, Vec::new()),
        ];

        assert_eq!(select_flow(&flows, &request(Some(2_000_000))).unwrap().id, 1);
        assert_eq!(select_flow(&flows, &request(Some(500))).unwrap().id, 2);
        assert_eq!(select_flow(&flows, &request(None)).unwrap().id, 2);
    }

    #[test]
    fn unknown_condition_field_never_matches() {
        let condition = ApprovalCondition {
            field: "department".to_string(),
            operator: ConditionOperator::Eq,
            value: 1.0.into(),
        };
        assert!(!condition.matches(&request(Some(1))));
    }

    #[test]
    fn text_conditions_compare_request_attributes() {
        let corporate = ApprovalCondition {
            field: "customerType".to_string(),
            operator: ConditionOperator::Eq,
            value: "corporate".into(),
        };
        let mut request = request(Some(1));
        assert!(!corporate.matches(&request));

        request
            .attributes
            .insert("customerType".to_string(), "corporate".to_string());
        assert!(corporate.matches(&request));

        let not_corporate = ApprovalCondition {
            operator: ConditionOperator::Ne,
            ..corporate.clone()
        };
        assert!(!not_corporate.matches(&request));

        let ordered = ApprovalCondition {
            operator: ConditionOperator::Gte,
            ..corporate
        };
        assert!(!ordered.matches(&request));
    }

    #[test]
    fn numeric_conditions_parse_attributes_and_text_thresholds() {
        let mut request = request(Some(2_000_000));
        request.attributes.insert("floors".to_string(), "12".to_string());

        let tall = ApprovalCondition {
            field: "floors".to_string(),
            operator: ConditionOperator::Gt,
            value: 10.0.into(),
        };
        assert!(tall.matches(&request));

        let large = ApprovalCondition {
            field: "amount".to_string(),
            operator: ConditionOperator::Gte,
            value: "1000000".into(),
        };
        assert!(large.matches(&request));

        let garbage = ApprovalCondition {
            value: "lots".into(),
            ..large
        };
        assert!(!garbage.matches(&request));
    }

    #[test]
    fn condition_values_accept_numbers_and_strings() {
        let conditions: Vec<ApprovalCondition> = serde_json::from_str(
            r#"[
                {"field": "amount", "operator": "gte", "value": 500000},
                {"field": "customerType", "operator": "eq", "value": "individual"}
            ]"#,
        )
        .unwrap();

        assert_eq!(conditions[0].value, ConditionValue::Number(500_000.0));
        assert_eq!(conditions[1].value, ConditionValue::Text("individual".to_string()));
    }

    #[test]
    fn inactive_or_other_type_flows_are_skipped() {
        let mut inactive = flow(1, 10, false, Vec::new());
        inactive.is_active = false;
        let mut contract = flow(2, 10, false, Vec::new());
        contract.document_type = DocumentType::Contract;

        assert!(select_flow(&[inactive, contract], &request(Some(1))).is_none());
    }

    #[test]
    fn steps_are_renumbered_in_order() {
        let step = |number: i32, name: &str| ApprovalStepDefinition {
            step_number: number,
            name: name.to_string(),
            mode: ApprovalStepMode::Serial,
            approvers: Vec::new(),
            required_approvals: None,
            timeout_hours: None,
            allow_delegate: false,
            allow_skip: false,
        };

        let flow = NewApprovalFlow::new(1, "Purchase", DocumentType::Purchase)
            .with_steps(vec![step(7, "manager"), step(3, "director")]);

        let numbers: Vec<(i32, &str)> = flow
            .steps
            .iter()
            .map(|step| (step.step_number, step.name.as_str()))
            .collect();
        assert_eq!(numbers, vec![(1, "manager"), (2, "director")]);
    }

    #[test]
    fn required_approvals_default_to_all_and_at_least_one() {
        let approver = |id: &str| Approver {
            id: id.to_string(),
            name: id.to_string(),
            email: format!("{id}@example.com"),
        };
        let mut step = ApprovalStepDefinition {
            step_number: 1,
            name: "board".to_string(),
            mode: ApprovalStepMode::Parallel,
            approvers: vec![approver("a"), approver("b"), approver("c")],
            required_approvals: None,
            timeout_hours: None,
            allow_delegate: false,
            allow_skip: false,
        };
        assert_eq!(step.effective_required_approvals(), 3);

        step.required_approvals = Some(2);
        assert_eq!(step.effective_required_approvals(), 2);

        step.approvers.clear();
        step.required_approvals = None;
        assert_eq!(step.effective_required_approvals(), 1);
    }
}
