use actix_multipart::form::MultipartForm;
use actix_web::{HttpResponse, Responder, get, post, web};
use pushkind_common::domain::auth::AuthenticatedUser;

use crate::AppConfig;
use crate::domain::order::DwCostReport;
use crate::dw::{DwClient, DwError};
use crate::forms::orders::{
    AddOrderForm, DeadlineAlertsQuery, UpdateOrderStatusPayload, UploadDwCostsForm,
};
use crate::repository::DieselRepository;
use crate::routes::{error_response, respond, respond_created};
use crate::services::orders::{self, OrdersQuery};
use crate::services::{ServiceError, dw};

/// Error returned when a DW call is attempted without DW settings.
fn dw_not_configured() -> HttpResponse {
    error_response(
        ServiceError::Form(DwError::NotConfigured.to_string()),
        "call DW",
    )
}

#[get("/orders")]
pub async fn list_orders(
    params: web::Query<OrdersQuery>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        orders::list_orders(repo.get_ref(), &user, params.into_inner()),
        "list orders",
    )
}

#[post("/orders")]
pub async fn create_order(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    app_config: web::Data<AppConfig>,
    form: web::Json<AddOrderForm>,
) -> impl Responder {
    respond_created(
        orders::create_order(
            repo.get_ref(),
            &user,
            form.into_inner(),
            app_config.order_deadline_days,
        ),
        "create order",
    )
}

#[get("/orders/alerts")]
/// Ordering deadline alerts for orders that have not been placed yet.
pub async fn order_alerts(
    params: web::Query<DeadlineAlertsQuery>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let today = chrono::Utc::now().date_naive();
    respond(
        orders::order_deadline_alerts(repo.get_ref(), &user, params.into_inner(), today),
        "compute order alerts",
    )
}

#[get("/orders/{order_id}")]
pub async fn get_order(
    order_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        orders::get_order(repo.get_ref(), &user, order_id.into_inner()),
        "load order",
    )
}

#[post("/orders/{order_id}/status")]
pub async fn update_order_status(
    order_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    payload: web::Json<UpdateOrderStatusPayload>,
) -> impl Responder {
    respond(
        orders::update_order_status(
            repo.get_ref(),
            &user,
            order_id.into_inner(),
            payload.into_inner(),
        ),
        "update order status",
    )
}

#[post("/orders/{order_id}/delete")]
pub async fn delete_order(
    order_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        orders::delete_order(repo.get_ref(), &user, order_id.into_inner()),
        "delete order",
    )
}

#[post("/orders/{order_id}/submit")]
pub async fn submit_order(
    order_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    respond(
        orders::submit_order_for_approval(repo.get_ref(), &user, order_id.into_inner()),
        "submit order for approval",
    )
}

#[post("/orders/{order_id}/sync-to-dw")]
/// Push an approved order to DW and store the DW order id.
pub async fn sync_order_to_dw(
    order_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    dw_client: web::Data<Option<DwClient>>,
) -> impl Responder {
    let order_id = order_id.into_inner();

    let payload = match dw::prepare_dw_push(repo.get_ref(), &user, order_id) {
        Ok(payload) => payload,
        Err(err) => return error_response(err, "prepare DW push"),
    };
    let Some(client) = dw_client.get_ref().as_ref() else {
        return dw_not_configured();
    };

    let outcome = client
        .push_order(&payload)
        .await
        .map_err(|err| err.to_string());

    respond(
        dw::record_dw_push(repo.get_ref(), &user, order_id, outcome),
        "record DW push",
    )
}

#[post("/orders/sync-from-dw")]
/// Receive a cost report pushed by DW.
pub async fn sync_order_from_dw(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    report: web::Json<DwCostReport>,
) -> impl Responder {
    respond(
        dw::receive_dw_costs(repo.get_ref(), &user, report.into_inner()),
        "store DW costs",
    )
}

#[post("/orders/{order_id}/pull-dw-costs")]
/// Fetch the current DW cost report of an order and store it.
pub async fn pull_order_dw_costs(
    order_id: web::Path<i32>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    dw_client: web::Data<Option<DwClient>>,
) -> impl Responder {
    let order_id = order_id.into_inner();

    let dw_order_id = match dw::prepare_dw_pull(repo.get_ref(), &user, order_id) {
        Ok(dw_order_id) => dw_order_id,
        Err(err) => return error_response(err, "prepare DW pull"),
    };
    let Some(client) = dw_client.get_ref().as_ref() else {
        return dw_not_configured();
    };

    let mut report = match client.fetch_costs(&dw_order_id).await {
        Ok(report) => report,
        Err(err) => {
            log::warn!("Fetching DW costs for {dw_order_id} failed: {err}");
            return error_response(ServiceError::Form(err.to_string()), "fetch DW costs");
        }
    };
    report.order_id = Some(order_id);

    respond(
        dw::receive_dw_costs(repo.get_ref(), &user, report),
        "store DW costs",
    )
}

#[post("/orders/import-dw-costs")]
/// Apply a CSV export of DW costs to the hub's orders.
pub async fn import_dw_costs(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    MultipartForm(mut form): MultipartForm<UploadDwCostsForm>,
) -> impl Responder {
    let rows = match form.into_cost_rows() {
        Ok(rows) => rows,
        Err(err) => {
            log::warn!("Rejected DW cost upload: {err}");
            return error_response(ServiceError::Form(err.to_string()), "parse DW costs");
        }
    };

    respond(
        dw::import_dw_costs(repo.get_ref(), &user, rows),
        "import DW costs",
    )
}
