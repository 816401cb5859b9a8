//! API layer for the PABX backend
//!
//! Read-only HTTP handlers over the AMI pool status and the consolidated
//! active call snapshots.

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;

use actix_web::web;
use pabx_core::traits::CacheService;

pub use dto::{ApiResponse, HealthResponse};
pub use handlers::{configure_active_calls, configure_ami};

/// Mount every route under `/api/v1`
///
/// Expects `web::Data<AmiPool>` and `web::Data<CallConsolidator<C>>` in the
/// app data.
pub fn configure_routes<C: CacheService + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Health check
            .route("/health", web::get().to(handlers::health::health_check))
            // Pool status
            .configure(configure_ami)
            // Active calls snapshots
            .configure(configure_active_calls::<C>),
    );
}
