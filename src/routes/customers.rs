use actix_web::{Responder, get, post, web};
use pushkind_common::domain::auth::AuthenticatedUser;

use crate::forms::customers::AddCustomerForm;
use crate::repository::DieselRepository;
use crate::routes::{respond, respond_created};
use crate::services::customers::{self, CustomersQuery};

#[get("/customers")]
pub async fn list_customers(
    params: web::Query<CustomersQuery>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        customers::list_customers(repo.get_ref(), &user, params.into_inner()),
        "list customers",
    )
}

#[post("/customers")]
pub async fn create_customer(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    form: web::Json<AddCustomerForm>,
) -> impl Responder {
    respond_created(
        customers::create_customer(repo.get_ref(), &user, form.into_inner()),
        "create customer",
    )
}

#[get("/customers/{customer_id}")]
pub async fn get_customer(
    customer_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        customers::get_customer(repo.get_ref(), &user, customer_id.into_inner()),
        "load customer",
    )
}
