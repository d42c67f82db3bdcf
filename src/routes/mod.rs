//! JSON handlers mounted under `/api/v1`.
//!
//! Every response carries a `success` flag; successful ones put their payload
//! under `data`, failed ones describe the problem under `error`.

use actix_web::HttpResponse;
use serde::Serialize;

use crate::services::{ServiceError, ServiceResult};

pub mod analytics;
pub mod approval_flows;
pub mod approvals;
pub mod customers;
pub mod ledgers;
pub mod orders;

#[derive(Serialize)]
struct Success<T> {
    success: bool,
    data: T,
}

#[derive(Serialize)]
struct Failure {
    success: bool,
    error: String,
}

fn failure(error: impl Into<String>) -> Failure {
    Failure {
        success: false,
        error: error.into(),
    }
}

/// `200 OK` with `data` in the success envelope.
pub(crate) fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Success {
        success: true,
        data,
    })
}

/// Map a service error to its HTTP status. Unexpected errors are logged with
/// `action` and hidden behind a generic message.
pub(crate) fn error_response(err: ServiceError, action: &str) -> HttpResponse {
    match err {
        ServiceError::Unauthorized => HttpResponse::Unauthorized().json(failure("Insufficient permissions")),
        ServiceError::NotFound => HttpResponse::NotFound().json(failure("Not found")),
        ServiceError::Form(message) => HttpResponse::BadRequest().json(failure(message)),
        ServiceError::Conflict => HttpResponse::Conflict().json(failure(
            "The resource already exists or was changed concurrently",
        )),
        err => {
            log::error!("Failed to {action}: {err}");
            HttpResponse::InternalServerError().json(failure("Internal server error"))
        }
    }
}

/// Successful results are wrapped with [`ok`], errors go through
/// [`error_response`].
pub(crate) fn respond<T: Serialize>(result: ServiceResult<T>, action: &str) -> HttpResponse {
    match result {
        Ok(data) => ok(data),
        Err(err) => error_response(err, action),
    }
}

/// Like [`respond`] but answers `201 Created`.
pub(crate) fn respond_created<T: Serialize>(result: ServiceResult<T>, action: &str) -> HttpResponse {
    match result {
        Ok(data) => HttpResponse::Created().json(Success {
            success: true,
            data,
        }),
        Err(err) => error_response(err, action),
    }
}
