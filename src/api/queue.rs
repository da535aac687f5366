use actix_web::{HttpResponse, Responder, get, web};

use super::state::AppState;

/// Lock-free snapshot of the fulfillment queue
#[get("/queue/status")]
async fn queue_status(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.queue.status())
}

pub fn queue_config(config: &mut web::ServiceConfig) {
    config.service(queue_status);
}
