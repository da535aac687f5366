use std::sync::Arc;

use crate::db::JobLedger;
use crate::worker::FulfillmentQueue;

/// Shared handles the probes and the queue endpoint read from
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<FulfillmentQueue>,
    pub ledger: Arc<dyn JobLedger>,
}

impl AppState {
    pub fn new(queue: Arc<FulfillmentQueue>, ledger: Arc<dyn JobLedger>) -> Self {
        Self { queue, ledger }
    }
}
