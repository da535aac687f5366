use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use tracing::{error, info, warn};

use super::dto::{OrderAccepted, OrderStatusResponse, RedeliveryResponse};
use super::models::OrderRequest;
use crate::api::validation::ErrorResponse;
use crate::book::{Job, JobId, JobState};
use crate::db::{JobLedger, JobRecord, LedgerError};
use crate::pipeline::{BookPipeline, PipelineError};
use crate::storage::ArtifactError;
use crate::worker::{FulfillmentQueue, QueueError};

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("order not found: {0}")]
    NotFound(JobId),

    #[error("order {id} is {state}, not completed")]
    NotReady { id: JobId, state: JobState },

    #[error("order {id} is already {state}")]
    InProgress { id: JobId, state: JobState },

    #[error("fulfillment queue is not accepting orders")]
    QueueClosed,

    #[error("stored document unavailable: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("redelivery failed: {0}")]
    Delivery(PipelineError),
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::NotReady { .. } | ServiceError::InProgress { .. } => StatusCode::CONFLICT,
            ServiceError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Artifact(ArtifactError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServiceError::Artifact(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Delivery(PipelineError::MissingArtifact(ArtifactError::NotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::Delivery(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            ServiceError::Ledger(e) => {
                error!("Ledger error: {}", e);
                ErrorResponse::message("Failed to process request", "Ledger error occurred")
            }
            ServiceError::NotFound(id) => {
                warn!("Order not found: {}", id);
                ErrorResponse::message("Not found", format!("Order {} not found", id))
            }
            ServiceError::NotReady { id, state } => {
                ErrorResponse::message("Not ready", format!("Order {} is {}", id, state))
            }
            ServiceError::InProgress { id, state } => ErrorResponse::message(
                "Already in progress",
                format!("Order {} is already {}", id, state),
            ),
            ServiceError::QueueClosed => {
                warn!("Order rejected: queue is shut down");
                ErrorResponse::message("Service unavailable", "Orders are not being accepted right now")
            }
            ServiceError::Artifact(e) if status == StatusCode::NOT_FOUND => {
                ErrorResponse::message("Not found", e.to_string())
            }
            ServiceError::Artifact(e) => {
                error!("Artifact error: {}", e);
                ErrorResponse::message("Failed to process request", "Stored document could not be read")
            }
            ServiceError::Delivery(e) => {
                error!("Redelivery failed: {}", e);
                ErrorResponse::message("Redelivery failed", e.to_string())
            }
        };
        HttpResponse::build(status).json(body)
    }
}

/// Order intake and lookup on top of the queue, ledger and pipeline
pub struct OrderService {
    queue: Arc<FulfillmentQueue>,
    ledger: Arc<dyn JobLedger>,
    pipeline: Arc<BookPipeline>,
}

impl OrderService {
    pub fn new(queue: Arc<FulfillmentQueue>, ledger: Arc<dyn JobLedger>, pipeline: Arc<BookPipeline>) -> Self {
        Self {
            queue,
            ledger,
            pipeline,
        }
    }

    /// Accepts a completed purchase.
    ///
    /// # Business Logic
    /// - Records the job as queued (a ledger failure is logged, not fatal)
    /// - Appends the job to the fulfillment queue
    /// - Sends the order confirmation in the background
    pub async fn submit(&self, request: OrderRequest) -> Result<OrderAccepted, ServiceError> {
        let job = Job::new(request.into_order());
        let order = job.order().clone();
        info!(
            job_id = %job.id,
            edition = order.edition.as_str(),
            pages = order.total_pages,
            "Service: order received"
        );

        match self.ledger.record_queued(&job).await {
            Ok(()) => {}
            Err(LedgerError::InProgress { job_id, state }) => {
                warn!(job_id = %job_id, %state, "Order resubmitted while its previous run is unfinished");
                return Err(ServiceError::InProgress { id: job_id, state });
            }
            Err(e) => error!(job_id = %job.id, "Could not record queued job: {}", e),
        }

        let job_id = job.id.clone();
        let receipt = match self.queue.enqueue(job) {
            Ok(receipt) => receipt,
            Err(QueueError::Closed | QueueError::AlreadyStarted) => {
                if let Err(e) = self.ledger.mark_failed(&job_id, "queue closed").await {
                    warn!(job_id = %job_id, "Could not record rejected job: {}", e);
                }
                return Err(ServiceError::QueueClosed);
            }
        };

        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            pipeline.confirm_order(&order).await;
        });

        Ok(OrderAccepted {
            message: "Order accepted, your coloring book is being created".to_string(),
            job_id: receipt.job_id,
            queue_position: receipt.position,
        })
    }

    async fn record(&self, id: &JobId) -> Result<JobRecord, ServiceError> {
        self.ledger
            .find(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    async fn completed_record(&self, id: &JobId) -> Result<JobRecord, ServiceError> {
        let record = self.record(id).await?;
        if record.state != JobState::Completed {
            return Err(ServiceError::NotReady {
                id: id.clone(),
                state: record.state,
            });
        }
        Ok(record)
    }

    pub async fn status(&self, id: &JobId) -> Result<OrderStatusResponse, ServiceError> {
        let record = self.record(id).await?;
        Ok(OrderStatusResponse::new(record, &self.queue.status()))
    }

    /// Returns the stored PDF of a completed order
    pub async fn document(&self, id: &JobId) -> Result<(String, Vec<u8>), ServiceError> {
        self.completed_record(id).await?;
        let bytes = self.pipeline.artifacts().load(id).await?;
        Ok((format!("coloring_book_{}.pdf", id.file_stem()), bytes))
    }

    /// Re-sends the stored PDF; nothing is regenerated
    pub async fn redeliver(&self, id: &JobId) -> Result<RedeliveryResponse, ServiceError> {
        let record = self.completed_record(id).await?;
        self.pipeline
            .redeliver(&record)
            .await
            .map_err(ServiceError::Delivery)?;

        Ok(RedeliveryResponse {
            message: format!("Coloring book re-sent to {}", record.order.recipient),
            job_id: record.job_id,
        })
    }
}
