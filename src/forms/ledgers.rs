use serde::Deserialize;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::domain::ledger::{BudgetOperation, EstimateItem, NewLedger, execution_budget_from_estimate};
use crate::forms::{sanitize_optional, sanitize_plain_text};

const TEXT_MAX_LEN: u64 = 255;

/// Result type returned by the ledger form helpers.
pub type LedgerFormResult<T> = Result<T, LedgerFormError>;

/// Errors that can occur while processing ledger payloads.
#[derive(Debug, Error)]
pub enum LedgerFormError {
    /// Validation failures from the `validator` crate.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("construction number cannot be empty")]
    EmptyConstructionNo,
    #[error("construction name cannot be empty")]
    EmptyConstructionName,
}

/// Estimate line submitted with a new contract.
#[derive(Debug, Deserialize, Validate)]
pub struct EstimateItemPayload {
    #[serde(default)]
    #[validate(length(max = TEXT_MAX_LEN))]
    pub category: String,
    #[validate(range(min = 0))]
    pub amount_cents: i64,
}

/// Payload accepted by `POST /ledgers`: a signed contract and the estimate
/// the execution budget is derived from.
#[derive(Debug, Deserialize, Validate)]
pub struct AddLedgerForm {
    pub customer_id: Option<i32>,
    #[validate(length(min = 1, max = TEXT_MAX_LEN))]
    pub construction_no: String,
    #[validate(length(min = 1, max = TEXT_MAX_LEN))]
    pub construction_name: String,
    #[validate(length(max = TEXT_MAX_LEN))]
    pub contract_no: Option<String>,
    #[validate(range(min = 0))]
    pub contract_amount_cents: i64,
    #[serde(default)]
    #[validate(nested)]
    pub estimate_items: Vec<EstimateItemPayload>,
}

impl AddLedgerForm {
    /// Validates the contract and classifies the estimate into a budget.
    pub fn into_new_ledger(self, hub_id: i32) -> LedgerFormResult<NewLedger> {
        self.validate()?;

        let construction_no = sanitize_plain_text(&self.construction_no);
        if construction_no.is_empty() {
            return Err(LedgerFormError::EmptyConstructionNo);
        }
        let construction_name = sanitize_plain_text(&self.construction_name);
        if construction_name.is_empty() {
            return Err(LedgerFormError::EmptyConstructionName);
        }

        let items: Vec<EstimateItem> = self
            .estimate_items
            .into_iter()
            .map(|item| EstimateItem {
                category: sanitize_plain_text(&item.category),
                amount_cents: item.amount_cents,
            })
            .collect();

        let mut ledger = NewLedger::new(
            hub_id,
            construction_no,
            construction_name,
            self.contract_amount_cents,
        )
        .with_execution_budget(execution_budget_from_estimate(&items));

        if let Some(customer_id) = self.customer_id {
            ledger = ledger.with_customer_id(customer_id);
        }
        if let Some(contract_no) = sanitize_optional(self.contract_no) {
            ledger = ledger.with_contract_no(contract_no);
        }

        Ok(ledger)
    }
}

/// Payload accepted by `POST /ledgers/{id}/budget`.
#[derive(Debug, Deserialize)]
pub struct BudgetAdjustmentPayload {
    pub order_id: i32,
    pub operation: BudgetOperation,
}
