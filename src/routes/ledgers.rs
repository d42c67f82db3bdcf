use actix_web::{Responder, get, post, web};
use pushkind_common::domain::auth::AuthenticatedUser;

use crate::forms::ledgers::{AddLedgerForm, BudgetAdjustmentPayload};
use crate::repository::DieselRepository;
use crate::routes::{respond, respond_created};
use crate::services::ledgers::{self, LedgersQuery};

#[get("/ledgers")]
pub async fn list_ledgers(
    params: web::Query<LedgersQuery>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        ledgers::list_ledgers(repo.get_ref(), &user, params.into_inner()),
        "list ledgers",
    )
}

#[post("/ledgers")]
pub async fn create_ledger(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    form: web::Json<AddLedgerForm>,
) -> impl Responder {
    respond_created(
        ledgers::create_ledger(repo.get_ref(), &user, form.into_inner()),
        "create ledger",
    )
}

#[get("/ledgers/{ledger_id}")]
pub async fn get_ledger(
    ledger_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        ledgers::get_ledger(repo.get_ref(), &user, ledger_id.into_inner()),
        "load ledger",
    )
}

#[post("/ledgers/{ledger_id}/budget")]
/// Add an order's cost to the ledger's execution budget or take it out again.
pub async fn adjust_ledger_budget(
    ledger_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    payload: web::Json<BudgetAdjustmentPayload>,
) -> impl Responder {
    respond(
        ledgers::apply_order_to_budget(
            repo.get_ref(),
            &user,
            ledger_id.into_inner(),
            payload.into_inner(),
        ),
        "adjust ledger budget",
    )
}

#[post("/ledgers/{ledger_id}/reconcile")]
pub async fn reconcile_ledger(
    ledger_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        ledgers::reconcile_actual_costs(repo.get_ref(), &user, ledger_id.into_inner()),
        "reconcile ledger costs",
    )
}
