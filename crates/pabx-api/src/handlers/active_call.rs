//! Active Call handlers
//!
//! Served from the latest published snapshots; nothing is recomputed here.

use crate::dto::ApiResponse;
use actix_web::{web, HttpResponse};
use pabx_core::traits::CacheService;
use pabx_core::AppError;
use pabx_services::CallConsolidator;
use tracing::{debug, instrument, warn};

/// List the active calls of every account
///
/// GET /api/v1/active-calls
#[instrument(skip(consolidator))]
pub async fn list_active_calls<C: CacheService + 'static>(
    consolidator: web::Data<CallConsolidator<C>>,
) -> Result<HttpResponse, AppError> {
    let calls = consolidator.get_all_active_calls().await?;
    debug!(count = calls.len(), "Listing active calls");

    Ok(HttpResponse::Ok().json(ApiResponse::success(calls)))
}

/// List the active calls of one account
///
/// GET /api/v1/active-calls/{account_code}
#[instrument(skip(consolidator))]
pub async fn get_account_active_calls<C: CacheService + 'static>(
    consolidator: web::Data<CallConsolidator<C>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let account_code = path.into_inner();
    if account_code.trim().is_empty() {
        warn!("Rejected blank account code");
        return Err(AppError::InvalidInput("account code must not be blank".to_string()));
    }

    let calls = consolidator.get_active_calls_by_account(&account_code).await?;
    debug!(account_code = %account_code, count = calls.len(), "Listing account active calls");

    Ok(HttpResponse::Ok().json(ApiResponse::success(calls)))
}

pub fn configure<C: CacheService + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/active-calls")
            .route("", web::get().to(list_active_calls::<C>))
            .route("/{account_code}", web::get().to(get_account_active_calls::<C>)),
    );
}
