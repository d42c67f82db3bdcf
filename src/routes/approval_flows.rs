use actix_web::{Responder, get, post, web};
use pushkind_common::domain::auth::AuthenticatedUser;

use crate::forms::approval_flows::{ApprovalFlowForm, ApprovalFlowsQuery};
use crate::repository::DieselRepository;
use crate::routes::{respond, respond_created};
use crate::services::approval_flows;

#[get("/approval-flows")]
pub async fn list_approval_flows(
    params: web::Query<ApprovalFlowsQuery>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        approval_flows::list_approval_flows(repo.get_ref(), &user, params.into_inner()),
        "list approval flows",
    )
}

#[post("/approval-flows")]
pub async fn create_approval_flow(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    form: web::Json<ApprovalFlowForm>,
) -> impl Responder {
    respond_created(
        approval_flows::create_approval_flow(repo.get_ref(), &user, form.into_inner()),
        "create approval flow",
    )
}

#[get("/approval-flows/{flow_id}")]
pub async fn get_approval_flow(
    flow_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        approval_flows::get_approval_flow(repo.get_ref(), &user, flow_id.into_inner()),
        "load approval flow",
    )
}

#[post("/approval-flows/{flow_id}")]
/// Replace a flow definition including its steps.
pub async fn update_approval_flow(
    flow_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    form: web::Json<ApprovalFlowForm>,
) -> impl Responder {
    respond(
        approval_flows::update_approval_flow(
            repo.get_ref(),
            &user,
            flow_id.into_inner(),
            form.into_inner(),
        ),
        "update approval flow",
    )
}

#[post("/approval-flows/{flow_id}/delete")]
pub async fn delete_approval_flow(
    flow_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        approval_flows::delete_approval_flow(repo.get_ref(), &user, flow_id.into_inner()),
        "delete approval flow",
    )
}
