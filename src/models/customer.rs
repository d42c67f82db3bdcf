use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::customer::{Customer as DomainCustomer, NewCustomer as DomainNewCustomer};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::customers)]
pub struct Customer {
    pub id: i32,
    pub hub_id: i32,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::customers)]
pub struct NewCustomer<'a> {
    pub hub_id: i32,
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub updated_at: NaiveDateTime,
}

impl From<Customer> for DomainCustomer {
    fn from(value: Customer) -> Self {
        Self {
            id: value.id,
            hub_id: value.hub_id,
            name: value.name,
            email: value.email,
            phone: value.phone,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl<'a> From<&'a DomainNewCustomer> for NewCustomer<'a> {
    fn from(value: &'a DomainNewCustomer) -> Self {
        Self {
            hub_id: value.hub_id,
            name: value.name.as_str(),
            email: value.email.as_deref(),
            phone: value.phone.as_deref(),
            updated_at: value.updated_at,
        }
    }
}
