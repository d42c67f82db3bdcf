use pushkind_common::domain::auth::AuthenticatedUser;
use pushkind_common::pagination::{DEFAULT_ITEMS_PER_PAGE, Paginated};
use pushkind_common::routes::check_role;
use serde::Deserialize;

use crate::SERVICE_ACCESS_ROLE;
use crate::domain::customer::{Customer, CustomerListQuery};
use crate::forms::customers::AddCustomerForm;
use crate::repository::{CustomerReader, CustomerWriter};
use crate::services::{ServiceError, ServiceResult};

/// Query parameters accepted by `GET /customers`.
#[derive(Debug, Default, Deserialize)]
pub struct CustomersQuery {
    /// Optional search string matched against name and email.
    pub search: Option<String>,
    pub page: Option<usize>,
}

/// Lists the hub's customers one page at a time.
pub fn list_customers<R>(
    repo: &R,
    user: &AuthenticatedUser,
    query: CustomersQuery,
) -> ServiceResult<Paginated<Customer>>
where
    R: CustomerReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let page = query.page.unwrap_or(1);
    let mut list_query = CustomerListQuery::new(user.hub_id).paginate(page, DEFAULT_ITEMS_PER_PAGE);
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        list_query = list_query.search(search);
    }

    let (total, customers) = repo.list_customers(list_query).map_err(ServiceError::from)?;

    Ok(Paginated::new(
        customers,
        page,
        total.div_ceil(DEFAULT_ITEMS_PER_PAGE),
    ))
}

pub fn get_customer<R>(repo: &R, user: &AuthenticatedUser, customer_id: i32) -> ServiceResult<Customer>
where
    R: CustomerReader + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    repo.get_customer_by_id(customer_id, user.hub_id)
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::NotFound)
}

/// Creates a customer in the authenticated user's hub.
pub fn create_customer<R>(
    repo: &R,
    user: &AuthenticatedUser,
    form: AddCustomerForm,
) -> ServiceResult<Customer>
where
    R: CustomerWriter + ?Sized,
{
    if !check_role(SERVICE_ACCESS_ROLE, &user.roles) {
        return Err(ServiceError::Unauthorized);
    }

    let new_customer = form
        .into_new_customer(user.hub_id)
        .map_err(|err| ServiceError::Form(err.to_string()))?;

    repo.create_customer(&new_customer)
        .map_err(ServiceError::from)
}
