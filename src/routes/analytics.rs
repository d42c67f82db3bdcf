use actix_web::{Responder, get, post, web};
use pushkind_common::domain::auth::AuthenticatedUser;

use crate::forms::analytics::{RevenueForecastForm, RevenueForecastQuery};
use crate::repository::DieselRepository;
use crate::routes::respond;
use crate::services::analytics;

#[get("/analytics/revenue-forecast")]
/// Forecast built from the contract amounts of the hub's ledgers.
pub async fn ledger_revenue_forecast(
    params: web::Query<RevenueForecastQuery>,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let today = chrono::Utc::now().date_naive();
    respond(
        analytics::ledger_revenue_forecast(repo.get_ref(), &user, params.into_inner(), today),
        "forecast revenue",
    )
}

#[post("/analytics/revenue-forecast")]
/// Forecast built from a posted monthly revenue history.
pub async fn revenue_forecast(
    user: AuthenticatedUser,
    form: web::Json<RevenueForecastForm>,
) -> impl Responder {
    respond(
        analytics::revenue_forecast(&user, form.into_inner()),
        "forecast revenue",
    )
}

#[get("/analytics/customer-segmentation")]
pub async fn customer_segmentation(
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
) -> impl Responder {
    let today = chrono::Utc::now().date_naive();
    respond(
        analytics::customer_segmentation(repo.get_ref(), &user, today),
        "segment customers",
    )
}
