use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDateTime};
use pushkind_common::pagination::Pagination;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::approval_flow::{ApprovalFlow, ApprovalStepMode, Approver, DocumentType};

/// Overall state of an approval instance.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Expired,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl From<&str> for ApprovalStatus {
    fn from(value: &str) -> Self {
        match value {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            "cancelled" => Self::Cancelled,
            "expired" => Self::Expired,
            _ => Self::Pending,
        }
    }
}

/// State of a single step inside an approval instance.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not reached yet.
    #[default]
    Waiting,
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Expired,
    /// Passed over by an approver of a skippable step.
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Skipped => "skipped",
        }
    }
}

impl From<&str> for StepStatus {
    fn from(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            "cancelled" => Self::Cancelled,
            "expired" => Self::Expired,
            "skipped" => Self::Skipped,
            _ => Self::Waiting,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Approved,
    Rejected,
    Delegated,
    Skipped,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Delegated => "delegated",
            Self::Skipped => "skipped",
        }
    }
}

impl TryFrom<&str> for ActionKind {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "delegated" => Ok(Self::Delegated),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown approval action: {other}")),
        }
    }
}

/// Decision recorded on a step.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ApprovalAction {
    pub approver_id: String,
    pub approver_name: String,
    pub approver_email: String,
    /// Slot owner the actor stood in for after a delegation.
    pub on_behalf_of: Option<String>,
    pub action: ActionKind,
    pub comment: Option<String>,
    pub delegated_to: Option<String>,
    pub created_at: NaiveDateTime,
}

impl ApprovalAction {
    /// Approver slot the action was taken for.
    pub fn slot_id(&self) -> &str {
        self.on_behalf_of.as_deref().unwrap_or(&self.approver_id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("approval is not pending")]
    NotPending,
    #[error("approval step timed out")]
    Expired,
    #[error("you are not an approver of the current step")]
    NotAnApprover,
    #[error("an earlier approver of this step has not acted yet")]
    NotYourTurn,
    #[error("you have already acted on this step")]
    AlreadyActed,
    #[error("delegation is not allowed for this step")]
    DelegationNotAllowed,
    #[error("a delegate is required")]
    MissingDelegate,
    #[error("cannot delegate to yourself")]
    SelfDelegation,
    #[error("this step cannot be skipped")]
    SkipNotAllowed,
    #[error("approval flow has no steps")]
    EmptyFlow,
}

/// Step of a running approval instance.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApprovalInstanceStep {
    pub step_number: i32,
    pub name: String,
    pub mode: ApprovalStepMode,
    pub approvers: Vec<Approver>,
    pub required_approvals: i32,
    pub allow_delegate: bool,
    pub allow_skip: bool,
    pub timeout_hours: Option<i32>,
    pub status: StepStatus,
    pub actions: Vec<ApprovalAction>,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub timeout_at: Option<NaiveDateTime>,
}

impl ApprovalInstanceStep {
    fn start(&mut self, now: NaiveDateTime) {
        self.status = StepStatus::Pending;
        self.started_at = Some(now);
        self.timeout_at = self
            .timeout_hours
            .map(|hours| now + Duration::hours(i64::from(hours)));
    }

    fn finish(&mut self, status: StepStatus, now: NaiveDateTime) {
        self.status = status;
        self.completed_at = Some(now);
    }

    pub fn approvals(&self) -> i32 {
        self.actions
            .iter()
            .filter(|action| action.action == ActionKind::Approved)
            .count() as i32
    }

    pub fn is_timed_out(&self, now: NaiveDateTime) -> bool {
        self.status == StepStatus::Pending && self.timeout_at.is_some_and(|deadline| now > deadline)
    }

    /// Current holder of an approver slot after delegations.
    fn slot_holder<'a>(&'a self, slot: &'a Approver) -> &'a str {
        self.actions
            .iter()
            .filter(|action| action.action == ActionKind::Delegated && action.slot_id() == slot.id)
            .filter_map(|action| action.delegated_to.as_deref())
            .last()
            .unwrap_or(slot.id.as_str())
    }

    fn slot_decided(&self, slot_id: &str) -> bool {
        self.actions
            .iter()
            .any(|action| action.action != ActionKind::Delegated && action.slot_id() == slot_id)
    }

    /// Slot the actor may act for right now. `None` means the step accepts
    /// anyone (no approvers listed).
    fn actionable_slot(&self, actor_id: &str) -> Result<Option<&Approver>, ApprovalError> {
        if self.approvers.is_empty() {
            if self.slot_decided(actor_id) {
                return Err(ApprovalError::AlreadyActed);
            }
            return Ok(None);
        }

        let held: Vec<&Approver> = self
            .approvers
            .iter()
            .filter(|slot| self.slot_holder(slot) == actor_id)
            .collect();
        if held.is_empty() {
            return Err(ApprovalError::NotAnApprover);
        }

        let open: Vec<&Approver> = held
            .into_iter()
            .filter(|slot| !self.slot_decided(&slot.id))
            .collect();
        let Some(first_open) = open.first() else {
            return Err(ApprovalError::AlreadyActed);
        };

        match self.mode {
            ApprovalStepMode::Parallel => Ok(Some(*first_open)),
            ApprovalStepMode::Serial => {
                let next = self
                    .approvers
                    .iter()
                    .find(|slot| !self.slot_decided(&slot.id));
                match next {
                    Some(next) if open.iter().any(|slot| slot.id == next.id) => Ok(Some(next)),
                    _ => Err(ApprovalError::NotYourTurn),
                }
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.approvals() >= self.required_approvals.max(1)
    }
}

/// Action appended to a step by [`ApprovalInstance::act`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAction {
    pub step_number: i32,
    pub action: ApprovalAction,
}

/// Decision submitted by an approver.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub action: ActionKind,
    pub comment: Option<String>,
    pub delegate_to: Option<String>,
}

/// Approval instance tracking a document through its flow.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApprovalInstance {
    pub id: i32,
    pub hub_id: i32,
    pub flow_id: Option<i32>,
    pub flow_name: String,
    pub document_type: DocumentType,
    pub document_id: String,
    pub document_title: String,
    pub amount_cents: Option<i64>,
    pub requested_by: Approver,
    pub status: ApprovalStatus,
    /// One-based index of the step awaiting decisions.
    pub current_step: i32,
    pub total_steps: i32,
    pub steps: Vec<ApprovalInstanceStep>,
    /// Optimistic lock counter, bumped on every write.
    pub version: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl ApprovalInstance {
    pub fn current(&self) -> Option<&ApprovalInstanceStep> {
        self.steps
            .iter()
            .find(|step| step.step_number == self.current_step)
    }

    fn current_mut(&mut self) -> Option<&mut ApprovalInstanceStep> {
        let number = self.current_step;
        self.steps.iter_mut().find(|step| step.step_number == number)
    }

    /// Whether `user_id` can approve the current step right now.
    pub fn awaits(&self, user_id: &str) -> bool {
        self.status == ApprovalStatus::Pending
            && self
                .current()
                .is_some_and(|step| step.actionable_slot(user_id).is_ok())
    }

    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        self.status == ApprovalStatus::Pending
            && self.current().is_some_and(|step| step.is_timed_out(now))
    }

    /// Mark a pending instance whose current step timed out as expired.
    /// Returns whether anything changed.
    pub fn expire_if_overdue(&mut self, now: NaiveDateTime) -> bool {
        if !self.is_overdue(now) {
            return false;
        }
        if let Some(step) = self.current_mut() {
            step.finish(StepStatus::Expired, now);
        }
        self.status = ApprovalStatus::Expired;
        self.completed_at = Some(now);
        self.updated_at = now;
        true
    }

    pub fn cancel(&mut self, now: NaiveDateTime) -> Result<(), ApprovalError> {
        if self.status != ApprovalStatus::Pending {
            return Err(ApprovalError::NotPending);
        }
        if let Some(step) = self.current_mut() {
            step.finish(StepStatus::Cancelled, now);
        }
        self.status = ApprovalStatus::Cancelled;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Apply a decision by `actor` to the current step.
    ///
    /// Returns the recorded action. When the current step timed out the
    /// instance is expired in place and [`ApprovalError::Expired`] is returned.
    pub fn act(
        &mut self,
        actor: &Approver,
        request: ActionRequest,
        now: NaiveDateTime,
    ) -> Result<RecordedAction, ApprovalError> {
        if self.status != ApprovalStatus::Pending {
            return Err(ApprovalError::NotPending);
        }
        if self.expire_if_overdue(now) {
            return Err(ApprovalError::Expired);
        }

        let step_number = self.current_step;
        let step = self.current_mut().ok_or(ApprovalError::NotPending)?;
        let slot_id = step.actionable_slot(&actor.id)?.map(|slot| slot.id.clone());

        let mut advance = false;
        let mut action = ApprovalAction {
            approver_id: actor.id.clone(),
            approver_name: actor.name.clone(),
            approver_email: actor.email.clone(),
            on_behalf_of: slot_id.filter(|id| *id != actor.id),
            action: request.action,
            comment: request.comment,
            delegated_to: None,
            created_at: now,
        };

        match request.action {
            ActionKind::Delegated => {
                if !step.allow_delegate || step.approvers.is_empty() {
                    return Err(ApprovalError::DelegationNotAllowed);
                }
                let delegate = request
                    .delegate_to
                    .filter(|id| !id.trim().is_empty())
                    .ok_or(ApprovalError::MissingDelegate)?;
                if delegate == actor.id {
                    return Err(ApprovalError::SelfDelegation);
                }
                action.delegated_to = Some(delegate);
                step.actions.push(action.clone());
            }
            ActionKind::Rejected => {
                step.actions.push(action.clone());
                step.finish(StepStatus::Rejected, now);
                self.status = ApprovalStatus::Rejected;
                self.completed_at = Some(now);
            }
            ActionKind::Approved => {
                step.actions.push(action.clone());
                if step.is_complete() {
                    step.finish(StepStatus::Approved, now);
                    advance = true;
                }
            }
            ActionKind::Skipped => {
                if !step.allow_skip {
                    return Err(ApprovalError::SkipNotAllowed);
                }
                step.actions.push(action.clone());
                step.finish(StepStatus::Skipped, now);
                advance = true;
            }
        }

        if advance {
            if self.current_step < self.total_steps {
                self.current_step += 1;
                if let Some(next) = self.current_mut() {
                    next.start(now);
                }
            } else {
                self.status = ApprovalStatus::Approved;
                self.completed_at = Some(now);
            }
        }

        self.updated_at = now;
        Ok(RecordedAction {
            step_number,
            action,
        })
    }
}

/// Document submitted for approval.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequest {
    pub document_type: DocumentType,
    pub document_id: String,
    pub document_title: String,
    pub amount_cents: Option<i64>,
    pub requested_by: Approver,
    /// Extra attributes matched by flow conditions, such as `customerType`.
    pub attributes: HashMap<String, String>,
}

/// Approver slots are keyed by id, so a repeated id keeps its first entry.
fn distinct_approvers(approvers: &[Approver]) -> Vec<Approver> {
    let mut seen = HashSet::new();
    approvers
        .iter()
        .filter(|approver| seen.insert(approver.id.as_str()))
        .cloned()
        .collect()
}

/// Payload required to insert a new approval instance.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApprovalInstance {
    pub hub_id: i32,
    pub flow_id: Option<i32>,
    pub flow_name: String,
    pub document_type: DocumentType,
    pub document_id: String,
    pub document_title: String,
    pub amount_cents: Option<i64>,
    pub requested_by: Approver,
    pub steps: Vec<ApprovalInstanceStep>,
    pub created_at: NaiveDateTime,
}

impl NewApprovalInstance {
    /// Instantiate `flow` for a request: the first step starts immediately,
    /// later steps wait.
    pub fn from_flow(
        flow: &ApprovalFlow,
        request: ApprovalRequest,
        now: NaiveDateTime,
    ) -> Result<Self, ApprovalError> {
        if flow.steps.is_empty() {
            return Err(ApprovalError::EmptyFlow);
        }

        let mut steps: Vec<ApprovalInstanceStep> = flow
            .steps
            .iter()
            .enumerate()
            .map(|(index, definition)| {
                let approvers = distinct_approvers(&definition.approvers);
                let required_approvals = definition
                    .effective_required_approvals()
                    .min(approvers.len().max(1) as i32);
                ApprovalInstanceStep {
                    step_number: index as i32 + 1,
                    name: definition.name.clone(),
                    mode: definition.mode,
                    approvers,
                    required_approvals,
                    allow_delegate: definition.allow_delegate,
                    allow_skip: definition.allow_skip,
                    timeout_hours: definition.timeout_hours,
                    status: StepStatus::Waiting,
                    actions: Vec::new(),
                    started_at: None,
                    completed_at: None,
                    timeout_at: None,
                }
            })
            .collect();
        if let Some(first) = steps.first_mut() {
            first.start(now);
        }

        Ok(Self {
            hub_id: flow.hub_id,
            flow_id: Some(flow.id),
            flow_name: flow.name.clone(),
            document_type: request.document_type,
            document_id: request.document_id,
            document_title: request.document_title,
            amount_cents: request.amount_cents,
            requested_by: request.requested_by,
            steps,
            created_at: now,
        })
    }
}

/// Query definition used to list approval instances for a hub.
#[derive(Debug, Clone, Default)]
pub struct ApprovalListQuery {
    pub hub_id: i32,
    pub status: Option<ApprovalStatus>,
    pub document_type: Option<DocumentType>,
    pub document_id: Option<String>,
    pub requested_by: Option<String>,
    pub created_from: Option<NaiveDateTime>,
    pub created_to: Option<NaiveDateTime>,
    pub pagination: Option<Pagination>,
}

impl ApprovalListQuery {
    pub fn new(hub_id: i32) -> Self {
        Self {
            hub_id,
            ..Self::default()
        }
    }

    pub fn status(mut self, status: ApprovalStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn document_type(mut self, document_type: DocumentType) -> Self {
        self.document_type = Some(document_type);
        self
    }

    pub fn document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn requested_by(mut self, user_id: impl Into<String>) -> Self {
        self.requested_by = Some(user_id.into());
        self
    }

    /// Restrict to instances created within `[from, to]`.
    pub fn created_between(mut self, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> Self {
        self.created_from = from;
        self.created_to = to;
        self
    }

    pub fn paginate(mut self, page: usize, per_page: usize) -> Self {
        self.pagination = Some(Pagination { page, per_page });
        self
    }
}

/// Aggregated approval figures.
#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq)]
pub struct ApprovalStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub cancelled: usize,
    pub expired: usize,
    pub average_approval_hours: f64,
    /// Approved share of decided instances, in percent.
    pub approval_rate: f64,
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn approval_stats(instances: &[ApprovalInstance]) -> ApprovalStats {
    let mut stats = ApprovalStats {
        total: instances.len(),
        ..ApprovalStats::default()
    };

    let mut completed_hours = Vec::new();
    for instance in instances {
        match instance.status {
            ApprovalStatus::Pending => stats.pending += 1,
            ApprovalStatus::Approved => stats.approved += 1,
            ApprovalStatus::Rejected => stats.rejected += 1,
            ApprovalStatus::Cancelled => stats.cancelled += 1,
            ApprovalStatus::Expired => stats.expired += 1,
        }
        if let Some(completed_at) = instance.completed_at {
            let seconds = (completed_at - instance.created_at).num_seconds();
            completed_hours.push(seconds as f64 / 3600.0);
        }
    }

    if !completed_hours.is_empty() {
        let sum: f64 = completed_hours.iter().sum();
        stats.average_approval_hours = round_tenth(sum / completed_hours.len() as f64);
    }

    let decided = stats.approved + stats.rejected;
    if decided > 0 {
        stats.approval_rate = round_tenth(stats.approved as f64 / decided as f64 * 100.0);
    }

    stats
}
