use chrono::NaiveDateTime;
use pushkind_common::pagination::Pagination;
use serde::{Deserialize, Serialize};

/// Domain representation of a customer that belongs to a hub.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    /// Unique identifier of the customer.
    pub id: i32,
    /// Hub identifier that owns the customer.
    pub hub_id: i32,
    /// Human-friendly display name of the customer.
    pub name: String,
    /// Optional contact email stored in lowercase for comparisons.
    pub email: Option<String>,
    /// Optional contact phone number.
    pub phone: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Payload required to insert a new customer for a hub.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    /// Hub identifier that owns the customer.
    pub hub_id: i32,
    /// Human-friendly display name of the customer.
    pub name: String,
    /// Optional contact email stored in lowercase for comparisons.
    pub email: Option<String>,
    /// Optional contact phone number.
    pub phone: Option<String>,
    pub updated_at: NaiveDateTime,
}

impl NewCustomer {
    /// Build a new customer payload for the given hub.
    #[must_use]
    pub fn new(hub_id: i32, name: impl Into<String>) -> Self {
        Self {
            hub_id,
            name: name.into(),
            email: None,
            phone: None,
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Attach a contact email, normalised to lowercase.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into().to_lowercase());
        self
    }

    /// Attach a contact phone number.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Query definition used to list customers for a hub.
#[derive(Debug, Clone)]
pub struct CustomerListQuery {
    pub hub_id: i32,
    /// Optional term matched against the name or email.
    pub search: Option<String>,
    pub pagination: Option<Pagination>,
}

impl CustomerListQuery {
    /// Construct a query that targets all customers belonging to `hub_id`.
    pub fn new(hub_id: i32) -> Self {
        Self {
            hub_id,
            search: None,
            pagination: None,
        }
    }

    /// Filter the results by a search term.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Apply pagination to the query with the given page number and page size.
    pub fn paginate(mut self, page: usize, per_page: usize) -> Self {
        self.pagination = Some(Pagination { page, per_page });
        self
    }
}
