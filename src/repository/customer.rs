use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use pushkind_common::repository::errors::RepositoryResult;

use crate::{
    domain::customer::{Customer as DomainCustomer, NewCustomer as DomainNewCustomer},
    models::customer::{Customer as DbCustomer, NewCustomer as DbNewCustomer},
    repository::{CustomerListQuery, CustomerReader, CustomerWriter, DieselRepository},
    schema::customers,
};

/// Customers of `hub_id`, narrowed to those whose name, email or phone
/// contains `term`.
fn hub_customers(hub_id: i32, term: Option<&str>) -> customers::BoxedQuery<'static, Sqlite> {
    let mut query = customers::table
        .filter(customers::hub_id.eq(hub_id))
        .into_boxed();

    if let Some(term) = term {
        let pattern = format!("%{term}%");
        query = query.filter(
            customers::name
                .like(pattern.clone())
                .or(customers::email.like(pattern.clone()))
                .or(customers::phone.like(pattern)),
        );
    }

    query
}

impl CustomerReader for DieselRepository {
    fn get_customer_by_id(&self, id: i32, hub_id: i32) -> RepositoryResult<Option<DomainCustomer>> {
        let mut conn = self.conn()?;

        let customer = hub_customers(hub_id, None)
            .filter(customers::id.eq(id))
            .first::<DbCustomer>(&mut conn)
            .optional()?;

        Ok(customer.map(Into::into))
    }

    fn list_customers(
        &self,
        query: CustomerListQuery,
    ) -> RepositoryResult<(usize, Vec<DomainCustomer>)> {
        let mut conn = self.conn()?;
        let term = query.search.as_deref();

        let total = hub_customers(query.hub_id, term)
            .count()
            .get_result::<i64>(&mut conn)? as usize;

        let mut items =
            hub_customers(query.hub_id, term).order((customers::name.asc(), customers::id.asc()));

        if let Some(pagination) = &query.pagination {
            let offset = ((pagination.page.max(1) - 1) * pagination.per_page) as i64;
            items = items.offset(offset).limit(pagination.per_page as i64);
        }

        let rows = items.load::<DbCustomer>(&mut conn)?;

        Ok((total, rows.into_iter().map(Into::into).collect()))
    }
}

impl CustomerWriter for DieselRepository {
    fn create_customer(&self, new_customer: &DomainNewCustomer) -> RepositoryResult<DomainCustomer> {
        let mut conn = self.conn()?;

        diesel::insert_into(customers::table)
            .values(&DbNewCustomer::from(new_customer))
            .get_result::<DbCustomer>(&mut conn)
            .map(Into::into)
            .map_err(Into::into)
    }
}
