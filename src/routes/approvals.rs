use actix_web::{Responder, get, post, web};
use pushkind_common::domain::auth::AuthenticatedUser;

use crate::forms::approvals::{
    ApprovalActionForm, ApprovalStatsQuery, ApprovalsQuery, RequestApprovalForm,
};
use crate::repository::DieselRepository;
use crate::routes::{respond, respond_created};
use crate::services::approvals;

#[get("/approvals")]
pub async fn list_approvals(
    params: web::Query<ApprovalsQuery>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        approvals::list_approvals(repo.get_ref(), &user, params.into_inner()),
        "list approvals",
    )
}

#[post("/approvals")]
/// Open an approval for a document through the best matching flow.
pub async fn request_approval(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    form: web::Json<RequestApprovalForm>,
) -> impl Responder {
    respond_created(
        approvals::request_approval(repo.get_ref(), &user, form.into_inner()),
        "request approval",
    )
}

#[get("/approvals/inbox")]
/// Approvals waiting for the current user.
pub async fn approval_inbox(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        approvals::approval_inbox(repo.get_ref(), &user),
        "load approval inbox",
    )
}

#[get("/approvals/stats")]
pub async fn approval_stats(
    params: web::Query<ApprovalStatsQuery>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        approvals::approval_stats(repo.get_ref(), &user, params.into_inner()),
        "compute approval stats",
    )
}

#[post("/approvals/expire")]
pub async fn expire_approvals(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        approvals::expire_overdue_approvals(repo.get_ref(), &user),
        "expire overdue approvals",
    )
}

#[get("/approvals/{approval_id}")]
pub async fn get_approval(
    approval_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        approvals::get_approval(repo.get_ref(), &user, approval_id.into_inner()),
        "load approval",
    )
}

#[post("/approvals/{approval_id}/action")]
/// Approve, reject or delegate the current step.
pub async fn act_on_approval(
    approval_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    form: web::Json<ApprovalActionForm>,
) -> impl Responder {
    respond(
        approvals::act_on_approval(
            repo.get_ref(),
            &user,
            approval_id.into_inner(),
            form.into_inner(),
        ),
        "act on approval",
    )
}

#[post("/approvals/{approval_id}/cancel")]
pub async fn cancel_approval(
    approval_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        approvals::cancel_approval(repo.get_ref(), &user, approval_id.into_inner()),
        "cancel approval",
    )
}
