//! AMI pool handlers

use crate::dto::ApiResponse;
use actix_web::{web, HttpResponse};
use pabx_ami::AmiPool;
use pabx_core::AppError;
use tracing::{debug, instrument};

/// Pool summary: per-connection state, activity and reconnect counters
///
/// GET /api/v1/ami/status
#[instrument(skip(pool))]
pub async fn pool_status(pool: web::Data<AmiPool>) -> Result<HttpResponse, AppError> {
    let summary = pool.summary();
    debug!(total = summary.total, healthy = summary.healthy, "AMI pool status");

    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/ami").route("/status", web::get().to(pool_status)));
}
