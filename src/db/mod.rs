pub mod connection;
pub mod job_repository;
mod ledger;
mod memory;
pub mod migrations;
mod models;

pub use job_repository::PgJobLedger;
pub use ledger::{JobLedger, JobRecord, LedgerError};
pub use memory::MemoryJobLedger;
