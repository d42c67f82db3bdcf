use std::io::{Read, Seek};

use actix_multipart::form::{MultipartForm, tempfile::TempFile};
use chrono::NaiveDate;
use csv::Trim;
use pushkind_common::routes::empty_string_as_none;
use serde::Deserialize;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::domain::alert::AlertSeverity;
use crate::domain::ledger::{ProgressStatus, WorkProgress};
use crate::domain::order::{
    ActualCosts, DEFAULT_TAX_RATE_PERCENT, NewOrder, OrderStatus, OrderWorkItem,
    checked_order_total,
};
use crate::forms::{sanitize_optional, sanitize_plain_text};

const TEXT_MAX_LEN: u64 = 255;
const NOTES_MAX_LEN: u64 = 2048;

/// Result type returned by the order form helpers.
pub type OrderFormResult<T> = Result<T, OrderFormError>;

/// Errors that can occur while processing order payloads.
#[derive(Debug, Error)]
pub enum OrderFormError {
    /// Validation failures from the `validator` crate.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("order number cannot be empty")]
    EmptyOrderNo,
    #[error("project name cannot be empty")]
    EmptyProjectName,
    #[error("partner name cannot be empty")]
    EmptyPartnerName,
    #[error("work item {index} has no name")]
    EmptyWorkItemName { index: usize },
    #[error("order amounts are too large")]
    AmountTooLarge,
}

/// Work line submitted with a new order.
#[derive(Debug, Deserialize, Validate)]
pub struct WorkItemPayload {
    #[serde(default)]
    #[validate(length(max = TEXT_MAX_LEN))]
    pub category: String,
    #[validate(length(min = 1, max = TEXT_MAX_LEN))]
    pub name: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub unit: Option<String>,
    #[validate(range(min = 0))]
    pub unit_price_cents: i64,
}

/// Payload accepted by `POST /orders`.
#[derive(Debug, Deserialize, Validate)]
pub struct AddOrderForm {
    pub ledger_id: Option<i32>,
    #[validate(length(min = 1, max = TEXT_MAX_LEN))]
    pub order_no: String,
    #[validate(length(min = 1, max = TEXT_MAX_LEN))]
    pub project_name: String,
    #[validate(length(min = 1, max = TEXT_MAX_LEN))]
    pub partner_name: String,
    pub contract_signed_date: NaiveDate,
    #[serde(default)]
    #[validate(nested)]
    pub work_items: Vec<WorkItemPayload>,
    /// Tax rate in percent; the default rate applies when omitted.
    #[validate(range(min = 0.0, max = 100.0))]
    pub tax_rate: Option<f64>,
    #[validate(length(max = NOTES_MAX_LEN))]
    pub notes: Option<String>,
}

impl AddOrderForm {
    /// Validates the payload and prices its work items into a draft order
    /// whose deadline falls `deadline_days` after the contract date.
    pub fn into_new_order(self, hub_id: i32, deadline_days: i64) -> OrderFormResult<NewOrder> {
        self.validate()?;

        let order_no = sanitize_plain_text(&self.order_no);
        if order_no.is_empty() {
            return Err(OrderFormError::EmptyOrderNo);
        }
        let project_name = sanitize_plain_text(&self.project_name);
        if project_name.is_empty() {
            return Err(OrderFormError::EmptyProjectName);
        }
        let partner_name = sanitize_plain_text(&self.partner_name);
        if partner_name.is_empty() {
            return Err(OrderFormError::EmptyPartnerName);
        }

        let mut items = Vec::with_capacity(self.work_items.len());
        for (index, item) in self.work_items.into_iter().enumerate() {
            let name = sanitize_plain_text(&item.name);
            if name.is_empty() {
                return Err(OrderFormError::EmptyWorkItemName { index: index + 1 });
            }
            let mut work_item = OrderWorkItem::new(
                sanitize_plain_text(&item.category),
                name,
                item.quantity,
                item.unit_price_cents,
            );
            if let Some(unit) = sanitize_optional(item.unit) {
                work_item = work_item.with_unit(unit);
            }
            items.push(work_item);
        }

        let tax_rate = self.tax_rate.unwrap_or(DEFAULT_TAX_RATE_PERCENT);
        if checked_order_total(&items, tax_rate).is_none() {
            return Err(OrderFormError::AmountTooLarge);
        }

        let mut order = NewOrder::new(
            hub_id,
            order_no,
            project_name,
            partner_name,
            self.contract_signed_date,
            deadline_days,
        )
        .with_work_items(items, tax_rate);

        if let Some(ledger_id) = self.ledger_id {
            order = order.with_ledger_id(ledger_id);
        }
        if let Some(notes) = sanitize_optional(self.notes) {
            order = order.with_notes(notes);
        }

        Ok(order)
    }
}

/// Payload accepted by `POST /orders/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusPayload {
    pub status: OrderStatus,
}

/// Query parameters accepted by `GET /orders/alerts`.
#[derive(Debug, Default, Deserialize)]
pub struct DeadlineAlertsQuery {
    pub severity: Option<AlertSeverity>,
}

#[derive(MultipartForm)]
/// Multipart form for uploading a CSV export of DW cost data.
pub struct UploadDwCostsForm {
    #[multipart(limit = "10MB")]
    /// CSV with the columns `order_no,labor,material,equipment,other,progress_rate`.
    pub csv: TempFile,
}

#[derive(Debug, Error)]
/// Errors that can occur while parsing an uploaded DW cost CSV file.
pub enum UploadDwCostsFormError {
    #[error("Error reading csv file")]
    FileReadError,
    #[error("Error parsing csv file")]
    CsvParseError,
}

impl From<std::io::Error> for UploadDwCostsFormError {
    fn from(_: std::io::Error) -> Self {
        UploadDwCostsFormError::FileReadError
    }
}

impl From<csv::Error> for UploadDwCostsFormError {
    fn from(_: csv::Error) -> Self {
        UploadDwCostsFormError::CsvParseError
    }
}

/// One row of an uploaded DW cost export.
#[derive(Debug, Clone, PartialEq)]
pub struct DwCostRow {
    pub order_no: String,
    pub actual_costs: ActualCosts,
    pub progress: Option<WorkProgress>,
}

impl UploadDwCostsForm {
    /// Parse the uploaded CSV file into cost rows keyed by order number.
    pub fn into_cost_rows(&mut self) -> Result<Vec<DwCostRow>, UploadDwCostsFormError> {
        self.csv.file.rewind()?;
        parse_cost_rows(self.csv.file.by_ref())
    }
}

#[derive(Deserialize)]
struct DwCostCsvRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    order_no: Option<String>,
    #[serde(default)]
    labor: Option<i64>,
    #[serde(default)]
    material: Option<i64>,
    #[serde(default)]
    equipment: Option<i64>,
    #[serde(default)]
    other: Option<i64>,
    #[serde(default)]
    progress_rate: Option<i32>,
}

fn progress_from_rate(rate: i32) -> WorkProgress {
    let status = match rate {
        r if r <= 0 => ProgressStatus::NotStarted,
        r if r >= 100 => ProgressStatus::Completed,
        _ => ProgressStatus::InProgress,
    };
    WorkProgress::new(status, rate)
}

fn parse_cost_rows<R: Read>(reader: R) -> Result<Vec<DwCostRow>, UploadDwCostsFormError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();

    for row in csv_reader.deserialize::<DwCostCsvRow>() {
        let record = row?;

        // Rows without an order number cannot be matched and are skipped.
        let Some(order_no) = record.order_no else {
            continue;
        };

        rows.push(DwCostRow {
            order_no,
            actual_costs: ActualCosts {
                labor_cents: record.labor.unwrap_or_default(),
                material_cents: record.material.unwrap_or_default(),
                equipment_cents: record.equipment.unwrap_or_default(),
                other_cents: record.other.unwrap_or_default(),
            },
            progress: record.progress_rate.map(progress_from_rate),
        });
    }

    Ok(rows)
}
