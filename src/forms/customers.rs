use pushkind_common::routes::empty_string_as_none;
use serde::Deserialize;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::domain::customer::NewCustomer;
use crate::forms::{sanitize_optional, sanitize_plain_text};

const NAME_MAX_LEN: u64 = 255;
const PHONE_MAX_LEN: u64 = 32;

/// Result type returned by the customer form helpers.
pub type CustomerFormResult<T> = Result<T, CustomerFormError>;

/// Errors that can occur while processing customer payloads.
#[derive(Debug, Error)]
pub enum CustomerFormError {
    /// Validation failures from the `validator` crate.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    /// The provided name is empty after sanitization.
    #[error("customer name cannot be empty")]
    EmptyName,
}

/// Payload accepted by `POST /customers`.
#[derive(Debug, Deserialize, Validate)]
pub struct AddCustomerForm {
    #[validate(length(min = 1, max = NAME_MAX_LEN))]
    pub name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(length(max = PHONE_MAX_LEN))]
    pub phone: Option<String>,
}

impl AddCustomerForm {
    /// Validates and sanitizes the payload into a domain `NewCustomer`.
    pub fn into_new_customer(self, hub_id: i32) -> CustomerFormResult<NewCustomer> {
        self.validate()?;

        let name = sanitize_plain_text(&self.name);
        if name.is_empty() {
            return Err(CustomerFormError::EmptyName);
        }

        let mut customer = NewCustomer::new(hub_id, name);
        if let Some(email) = self.email.as_deref().map(str::trim) {
            customer = customer.with_email(email);
        }
        if let Some(phone) = sanitize_optional(self.phone) {
            customer = customer.with_phone(phone);
        }

        Ok(customer)
    }
}
