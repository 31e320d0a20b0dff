//! AWS Lambda entry point for the comic mailer
//!
//! Deploy with `cargo lambda build --release --features lambda` and trigger
//! it from a schedule. State lives in S3; settings come from an optional
//! `config.toml` next to the state blobs, then from environment variables.

use comic_mailer::error::{AppError, Result};
use comic_mailer::models::Config;
use comic_mailer::pipeline::{RunOptions, RunOutcome, Runner};
use comic_mailer::services::{HttpIndexFetcher, SmtpMailer};
use comic_mailer::storage::{BlobStore, S3Store};
use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_KEY: &str = "config.toml";

/// Lambda invocation payload.
#[derive(Debug, Default, Deserialize)]
struct MailRequest {
    /// Override the configured batch size
    #[serde(default)]
    batch_size: Option<usize>,

    /// Send, but do not record the delivery
    #[serde(default)]
    dry_run: bool,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
struct MailResponse {
    success: bool,

    /// True when nothing was left to send
    exhausted: bool,

    /// Ids delivered this run
    delivered: Vec<u32>,

    caught_up: bool,

    /// Catalog upper bound after the sync
    catalog_upper_bound: u32,

    execution_time_ms: u64,
}

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> std::result::Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Comic mailer Lambda starting...");
    lambda_runtime::run(service_fn(handler)).await
}

/// Handler for AWS Lambda events.
#[instrument(skip(event))]
async fn handler(event: LambdaEvent<MailRequest>) -> std::result::Result<MailResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();
    info!(
        "Starting run: batch_size={:?}, dry_run={}",
        request.batch_size, request.dry_run
    );

    finish(run_mailer(&request).await, start.elapsed().as_millis() as u64)
}

/// Stamp a successful response; failures go back to the runtime as errors so
/// the invocation is recorded as failed.
fn finish(result: Result<MailResponse>, elapsed_ms: u64) -> std::result::Result<MailResponse, LambdaError> {
    match result {
        Ok(mut response) => {
            response.execution_time_ms = elapsed_ms;
            Ok(response)
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}

async fn run_mailer(request: &MailRequest) -> Result<MailResponse> {
    let mut config = Config::default();
    config.apply_env_overrides();
    let store = S3Store::from_config(&config.storage).await;

    if let Some(bytes) = store.load(CONFIG_KEY).await? {
        let text = String::from_utf8(bytes).map_err(|e| {
            AppError::config(format!("{CONFIG_KEY} is not valid UTF-8: {e}"))
        })?;
        config = toml::from_str(&text)?;
        config.apply_env_overrides();
        info!("Loaded config from {}", store.location(CONFIG_KEY));
    }
    if let Some(batch_size) = request.batch_size {
        config.selection.batch_size = batch_size;
    }
    config.validate()?;

    let fetcher = HttpIndexFetcher::new(&config.source)?;
    let mailer = SmtpMailer::from_config(&config.mail)?;
    let options = if request.dry_run {
        RunOptions::dry_run()
    } else {
        RunOptions::default()
    };
    let mut rng = StdRng::from_entropy();

    let outcome = Runner::new(&config, &store, &fetcher, &mailer)
        .run(&mut rng, options)
        .await?;

    Ok(match outcome {
        RunOutcome::Delivered(delivery) => {
            info!("Delivered {} items", delivery.delivered.len());
            MailResponse {
                success: true,
                catalog_upper_bound: delivery.sync.upper_bound_after,
                delivered: delivery.delivered,
                caught_up: delivery.caught_up,
                ..Default::default()
            }
        }
        RunOutcome::Exhausted { sync } => {
            info!("Nothing left to send");
            MailResponse {
                success: true,
                exhausted: true,
                catalog_upper_bound: sync.upper_bound_after,
                ..Default::default()
            }
        }
    })
}
