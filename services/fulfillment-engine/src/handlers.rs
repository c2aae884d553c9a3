use crate::auth::AuthenticatedCaller;
use crate::errors::FulfillmentError;
use crate::metrics;
use crate::models::{FulfillRequest, FulfillResponse, LoadBody, LoadRequest, LoadResponse};
use crate::services::FulfillmentService;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const SERVICE_NAME: &str = "fulfillment-engine";

/// Service name and version
pub async fn version() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Health check endpoint
pub async fn health_check(service: web::Data<Arc<FulfillmentService>>) -> HttpResponse {
    match service.health().await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "service": SERVICE_NAME
            }))
        }
    }
}

/// Configured network ids
pub async fn list_networks(service: web::Data<Arc<FulfillmentService>>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "networks": service.available_networks(),
        "default": service.default_network()
    }))
}

/// Load a pool of codes for a (contract, offer)
pub async fn load_codes(
    service: web::Data<Arc<FulfillmentService>>,
    path: web::Path<(String, String)>,
    body: web::Json<LoadBody>,
) -> Result<HttpResponse, FulfillmentError> {
    let (contract_addr, offer_id) = path.into_inner();
    let body = body.into_inner();

    let outcome = service
        .load(LoadRequest {
            contract_address: contract_addr,
            offer_id,
            url: body.url,
            codes: body.codes,
        })
        .await?;

    Ok(HttpResponse::Ok().json(LoadResponse {
        message: format!(
            "loaded {} of {} codes",
            outcome.inserted, outcome.requested
        ),
        contract_addr: outcome.contract_address,
        offer_id: outcome.offer_id,
        inserted: outcome.inserted,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FulfillQuery {
    network: Option<String>,
}

/// Issue the code for a redemption transaction to its redeemer
pub async fn fulfill(
    service: web::Data<Arc<FulfillmentService>>,
    caller: AuthenticatedCaller,
    transaction_id: web::Path<String>,
    query: web::Query<FulfillQuery>,
) -> Result<HttpResponse, FulfillmentError> {
    let result = service
        .fulfill(FulfillRequest {
            transaction_id: transaction_id.into_inner(),
            caller_address: caller.0,
            network_id: query.into_inner().network.unwrap_or_default(),
        })
        .await?;

    Ok(HttpResponse::Ok().json(FulfillResponse {
        message: "fulfilled redemption".to_string(),
        url: result.url,
        code: result.code,
        transaction: result.transaction,
    }))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::metrics_handler() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "Failed to gather metrics",
            "details": e.to_string()
        })),
    }
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(version))
        .route("/version", web::get().to(version))
        .route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics_endpoint))
        .route("/networks", web::get().to(list_networks))
        .route("/load/{contract_addr}/{offer_id}", web::post().to(load_codes))
        .route("/fulfill/{transaction_id}", web::get().to(fulfill));
}
