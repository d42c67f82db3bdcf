use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Deserialize;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::domain::approval::{ActionKind, ActionRequest, ApprovalStatus};
use crate::domain::approval_flow::DocumentType;
use crate::forms::{sanitize_optional, sanitize_plain_text};

const TEXT_MAX_LEN: u64 = 255;
const COMMENT_MAX_LEN: u64 = 2048;

/// Result type returned by the approval form helpers.
pub type ApprovalFormResult<T> = Result<T, ApprovalFormError>;

#[derive(Debug, Error)]
pub enum ApprovalFormError {
    /// Validation failures from the `validator` crate.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("document id cannot be empty")]
    EmptyDocumentId,
}

/// Payload accepted by `POST /approvals`.
#[derive(Debug, Deserialize, Validate)]
pub struct RequestApprovalForm {
    pub document_type: DocumentType,
    #[validate(length(min = 1, max = TEXT_MAX_LEN))]
    pub document_id: String,
    #[serde(default)]
    #[validate(length(max = TEXT_MAX_LEN))]
    pub document_title: String,
    #[validate(range(min = 0))]
    pub amount_cents: Option<i64>,
    /// Extra values for flow conditions, e.g. `{"customerType": "corporate"}`.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// Sanitized approval request fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequestData {
    pub document_type: DocumentType,
    pub document_id: String,
    pub document_title: String,
    pub amount_cents: Option<i64>,
    pub attributes: HashMap<String, String>,
}

impl RequestApprovalForm {
    pub fn into_request(self) -> ApprovalFormResult<ApprovalRequestData> {
        self.validate()?;

        let document_id = self.document_id.trim().to_string();
        if document_id.is_empty() {
            return Err(ApprovalFormError::EmptyDocumentId);
        }

        Ok(ApprovalRequestData {
            document_type: self.document_type,
            document_id,
            document_title: sanitize_plain_text(&self.document_title),
            amount_cents: self.amount_cents,
            attributes: self
                .attributes
                .into_iter()
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .filter(|(key, _)| !key.is_empty())
                .collect(),
        })
    }
}

/// Payload accepted by `POST /approvals/{id}/action`.
#[derive(Debug, Deserialize, Validate)]
pub struct ApprovalActionForm {
    pub action: ActionKind,
    #[validate(length(max = COMMENT_MAX_LEN))]
    pub comment: Option<String>,
    pub delegate_to: Option<String>,
}

impl ApprovalActionForm {
    pub fn into_action_request(self) -> ApprovalFormResult<ActionRequest> {
        self.validate()?;

        Ok(ActionRequest {
            action: self.action,
            comment: sanitize_optional(self.comment),
            delegate_to: self
                .delegate_to
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        })
    }
}

/// Query parameters accepted by `GET /approvals`.
#[derive(Debug, Default, Deserialize)]
pub struct ApprovalsQuery {
    pub status: Option<ApprovalStatus>,
    pub document_type: Option<DocumentType>,
    pub document_id: Option<String>,
    pub requested_by: Option<String>,
    pub page: Option<usize>,
}

/// Query parameters accepted by `GET /approvals/stats`.
#[derive(Debug, Default, Deserialize)]
pub struct ApprovalStatsQuery {
    pub document_type: Option<DocumentType>,
    pub created_from: Option<NaiveDateTime>,
    pub created_to: Option<NaiveDateTime>,
}
