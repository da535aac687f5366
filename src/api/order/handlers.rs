use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{
    HttpResponse, get, post,
    web::{Data, Path, ServiceConfig, scope},
};
use actix_web_validator::Json;

use super::models::OrderRequest;
use super::service::{OrderService, ServiceError};
use crate::book::JobId;

#[post("")]
async fn submit_order(
    service: Data<OrderService>,
    request: Json<OrderRequest>,
) -> Result<HttpResponse, ServiceError> {
    let accepted = service.submit(request.into_inner()).await?;
    Ok(HttpResponse::Accepted().json(accepted))
}

#[get("/{order_id}/status")]
async fn order_status(service: Data<OrderService>, order_id: Path<String>) -> Result<HttpResponse, ServiceError> {
    let status = service.status(&JobId::from_order_reference(&order_id)).await?;
    Ok(HttpResponse::Ok().json(status))
}

#[get("/{order_id}/document")]
async fn order_document(service: Data<OrderService>, order_id: Path<String>) -> Result<HttpResponse, ServiceError> {
    let (filename, bytes) = service.document(&JobId::from_order_reference(&order_id)).await?;
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .body(bytes))
}

#[post("/{order_id}/redeliver")]
async fn redeliver_order(service: Data<OrderService>, order_id: Path<String>) -> Result<HttpResponse, ServiceError> {
    let response = service.redeliver(&JobId::from_order_reference(&order_id)).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub fn order_config(config: &mut ServiceConfig) {
    config.service(
        scope("orders")
            .service(submit_order)
            .service(order_status)
            .service(order_document)
            .service(redeliver_order),
    );
}
