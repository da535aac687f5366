use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;
use tracing::error;

use super::state::AppState;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    ledger: &'static str,
    worker: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Checks the ledger and the fulfillment worker; `None` when both are fine
async fn dependency_error(state: &AppState) -> Option<String> {
    if let Err(e) = state.ledger.ping().await {
        return Some(format!("Ledger unavailable: {}", e));
    }
    if !state.queue.is_running() {
        return Some("Fulfillment worker is not running".to_string());
    }
    None
}

fn probe(state: &AppState, error: Option<String>, up: &'static str, down: &'static str) -> HttpResponse {
    let worker = if state.queue.is_running() { "running" } else { "stopped" };
    match error {
        None => HttpResponse::Ok().json(HealthResponse {
            status: up,
            ledger: "connected",
            worker,
            error: None,
        }),
        Some(message) => {
            error!("{} check failed: {}", up, message);
            let ledger = if message.starts_with("Ledger") { "disconnected" } else { "connected" };
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: down,
                ledger,
                worker,
                error: Some(message),
            })
        }
    }
}

/// General health check including ledger connectivity and the worker.
/// Use for load balancers and uptime monitors.
#[get("/health")]
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let error = dependency_error(&state).await;
    probe(&state, error, "healthy", "unhealthy")
}

/// Readiness probe: 503 while the ledger is unreachable or the worker is down
#[get("/ready")]
async fn readiness_check(state: web::Data<AppState>) -> impl Responder {
    let error = dependency_error(&state).await;
    probe(&state, error, "ready", "not_ready")
}

/// Liveness probe. Does not check dependencies.
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive",
        ledger: "not_checked",
        worker: "not_checked",
        error: None,
    })
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}
