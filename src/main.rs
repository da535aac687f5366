use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use sqlx::{Pool, Postgres};
use tracing::{info, warn};
use validator::Validate;

mod api;
mod book;
mod cli;
mod config;
mod db;
mod delivery;
mod logging;
mod pipeline;
mod prompt;
mod render;
mod shutdown;
mod storage;
mod synthesis;
#[cfg(test)]
mod testing;
mod worker;

use crate::api::{
    health::health_config,
    order::{OrderService, order_config},
    preview::{PreviewService, preview_config},
    queue::queue_config,
    state::AppState,
    validation,
};
use crate::api::order::models::OrderRequest;
use crate::book::Job;
use crate::cli::{Cli, Command, ServeArgs};
use crate::config::Config;
use crate::db::{JobLedger, MemoryJobLedger, PgJobLedger};
use crate::delivery::{DeliveryNotifier, LogNotifier, SendGridNotifier, SendGridSettings};
use crate::pipeline::BookPipeline;
use crate::shutdown::ShutdownCoordinator;
use crate::storage::ArtifactStore;
use crate::synthesis::{GoogleImageClient, ImageSynthesizer};
use crate::worker::FulfillmentQueue;

const EMAIL_TIMEOUT: Duration = Duration::from_secs(30);
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().expect("Failed to load configuration");

    logging::init(&config.log_dir).expect("Failed to initialize logging");

    match cli.command() {
        Command::Serve(args) => serve(config, args).await,
        Command::Generate { order, out, deliver } => generate(config, &order, &out, deliver).await,
        Command::Purge { days } => purge(config, days).await,
    }
}

async fn serve(config: Config, args: ServeArgs) -> std::io::Result<()> {
    let bind_address = args.bind.unwrap_or_else(|| config.bind_address.clone());
    let port = args.port.unwrap_or(config.port);
    let max_payload_size = config.max_payload_size;

    info!("Starting coloring-book-fulfillment");
    info!("Configuration loaded successfully:");
    info!("  - Max payload size: {} bytes", max_payload_size);
    info!("  - Line art model: {}", config.line_art_model);
    info!("  - Recolor model: {}", config.recolor_model);
    info!("  - Artifact directory: {}", config.artifact_dir.display());

    let (ledger, pool) = open_ledger(&config).await?;
    let notifier = build_notifier(&config)?;
    let synthesizer = build_synthesizer(&config)?;
    let pipeline = Arc::new(build_pipeline(&config, synthesizer.clone(), notifier));

    let queue = Arc::new(FulfillmentQueue::new(pipeline.clone(), ledger.clone()));
    queue.start().map_err(|e| startup_error("fulfillment queue", e))?;

    let app_state = web::Data::new(AppState::new(queue.clone(), ledger.clone()));
    let order_service = web::Data::new(OrderService::new(queue.clone(), ledger, pipeline));
    let preview_service = web::Data::new(PreviewService::new(synthesizer));

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(order_service.clone())
            .app_data(preview_service.clone())
            .app_data(web::PayloadConfig::default().limit(max_payload_size))
            .app_data(validation::json_config().limit(max_payload_size))
            .configure(health_config)
            .configure(queue_config)
            .configure(order_config)
            .configure(preview_config)
    });

    info!("Server starting on http://{}:{}", bind_address, port);

    let server = server.bind((bind_address.as_str(), port))?.run();
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let coordinator = ShutdownCoordinator::new(server_handle, server_task, queue, pool);
    coordinator.wait_for_shutdown().await
}

/// Builds one book in the foreground and writes it to `out`
async fn generate(config: Config, order_path: &Path, out: &Path, deliver: bool) -> std::io::Result<()> {
    let contents = tokio::fs::read_to_string(order_path).await?;
    let request: OrderRequest =
        serde_json::from_str(&contents).map_err(|e| startup_error("order file", e))?;
    request.validate().map_err(|e| startup_error("order file", e))?;

    let notifier: Arc<dyn DeliveryNotifier> = if deliver {
        build_notifier(&config)?
    } else {
        Arc::new(LogNotifier)
    };
    let pipeline = build_pipeline(&config, build_synthesizer(&config)?, notifier);

    let job = Job::new(request.into_order());
    info!(job_id = %job.id, pages = job.order().total_pages, "Generating book");

    let document = pipeline
        .execute(&job)
        .await
        .map_err(|e| startup_error("book generation", e))?;

    tokio::fs::write(out, &document.bytes).await?;
    info!(
        path = %out.display(),
        content_pages = document.content_page_count(),
        delivered = document.delivered,
        "Book written"
    );
    Ok(())
}

async fn purge(config: Config, days: u64) -> std::io::Result<()> {
    let max_age = Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY));
    let (ledger, pool) = open_ledger(&config).await?;

    let files = ArtifactStore::new(config.artifact_dir.clone())
        .purge_older_than(max_age)
        .await
        .map_err(|e| startup_error("artifact purge", e))?;
    let records = ledger
        .purge_older_than(max_age)
        .await
        .map_err(|e| startup_error("ledger purge", e))?;

    info!(days, files, records, "Purge completed");

    if let Some(pool) = pool {
        pool.close().await;
    }
    Ok(())
}

/// Postgres when `DATABASE_URL` is set, otherwise a process-local ledger
async fn open_ledger(config: &Config) -> std::io::Result<(Arc<dyn JobLedger>, Option<Pool<Postgres>>)> {
    let Some(database_url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL not set, job records will not survive a restart");
        return Ok((Arc::new(MemoryJobLedger::new()), None));
    };

    let pool = db::connection::get_connection(database_url, config.max_db_connections)
        .await
        .map_err(|e| startup_error("database connection", e))?;
    info!("Database connection pool established");

    db::migrations::run_migrations(&pool)
        .await
        .map_err(|e| startup_error("database migrations", e))?;
    info!("Database migrations completed successfully");

    Ok((Arc::new(PgJobLedger::new(pool.clone())), Some(pool)))
}

fn build_notifier(config: &Config) -> std::io::Result<Arc<dyn DeliveryNotifier>> {
    let Some(api_key) = config.sendgrid_api_key.clone() else {
        warn!("SENDGRID_API_KEY not set, emails will be logged instead of sent");
        return Ok(Arc::new(LogNotifier));
    };

    let notifier = SendGridNotifier::new(SendGridSettings {
        api_key,
        from_email: config.sendgrid_from_email.clone(),
        base_url: delivery::SENDGRID_BASE_URL.to_string(),
        timeout: EMAIL_TIMEOUT,
    })
    .map_err(|e| startup_error("email client", e))?;

    Ok(Arc::new(notifier))
}

fn build_synthesizer(config: &Config) -> std::io::Result<Arc<dyn ImageSynthesizer>> {
    let settings = config.image_settings().map_err(|e| startup_error("image provider", e))?;
    let client = GoogleImageClient::new(settings).map_err(|e| startup_error("image provider", e))?;
    Ok(Arc::new(client))
}

fn build_pipeline(
    config: &Config,
    synthesizer: Arc<dyn ImageSynthesizer>,
    notifier: Arc<dyn DeliveryNotifier>,
) -> BookPipeline {
    BookPipeline::new(
        synthesizer,
        notifier,
        ArtifactStore::new(config.artifact_dir.clone()),
        config.pipeline_settings(),
    )
}

fn startup_error(context: &str, error: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(format!("{context}: {error}"))
}
