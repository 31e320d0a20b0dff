//! Comic mailer CLI
//!
//! Local execution entry point. For AWS Lambda, use `comic-mailer-lambda`.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use comic_mailer::{
    error::Result,
    models::Config,
    pipeline::{self, RunOptions, RunOutcome, Runner},
    services::{HttpIndexFetcher, Mailer, OutboxMailer, SmtpMailer},
    storage::LocalStore,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// comic-mailer - mails unread comics, multi-part stories in order
#[derive(Parser, Debug)]
#[command(name = "comic-mailer", version, about = "Mails unread comics from a scraped index")]
struct Cli {
    /// Directory holding config.toml and the persisted state
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync the catalog, pick unread items and mail them
    Run {
        /// Write the digest to the outbox and keep the read history unchanged
        #[arg(long)]
        dry_run: bool,

        /// Seed for the selection, for reproducible picks
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Sync the catalog only
    Sync,

    /// Show catalog and read-history figures
    Status,

    /// Validate the configuration
    Validate,

    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, default_level: &str) {
    let level = if verbose { "debug" } else { default_level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));

    if let Command::Init { force } = cli.command {
        init_logging(cli.verbose, "info");
        return write_default_config(&config_path, force);
    }

    let config = Config::load(&config_path);
    let level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let config = config.unwrap_or_else(|e| {
        log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            config_path.display(),
            e
        );
        Config::default()
    });
    log::debug!("Storage directory: {}", cli.storage_dir.display());

    let store = LocalStore::new(&cli.storage_dir);

    match cli.command {
        Command::Run { dry_run, seed } => {
            if dry_run {
                config.validate_source()?;
            } else {
                config.validate()?;
            }

            let fetcher = HttpIndexFetcher::new(&config.source)?;
            let mailer: Box<dyn Mailer> = if dry_run {
                Box::new(OutboxMailer::new(cli.storage_dir.join(&config.mail.outbox_dir)))
            } else {
                Box::new(SmtpMailer::from_config(&config.mail)?)
            };
            let options = if dry_run {
                RunOptions::dry_run()
            } else {
                RunOptions::default()
            };
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            let runner = Runner::new(&config, &store, &fetcher, mailer.as_ref());
            match runner.run(&mut rng, options).await? {
                RunOutcome::Delivered(delivery) => {
                    log::info!(
                        "Delivered {} items: {:?}",
                        delivery.delivered.len(),
                        delivery.delivered
                    );
                    if delivery.caught_up {
                        log::info!("Backlog cleared; the next run will only find new items");
                    }
                }
                RunOutcome::Exhausted { .. } => {
                    log::info!("Nothing left to send. You are up to date.");
                }
            }
        }

        Command::Sync => {
            config.validate_source()?;
            let fetcher = HttpIndexFetcher::new(&config.source)?;
            let report = pipeline::sync(&config, &store, &fetcher).await?;
            log::info!(
                "Catalog now reaches #{} (latest #{}), {} pages fetched, {} rows skipped",
                report.upper_bound_after,
                report.latest_id,
                report.pages.len(),
                report.merge.skipped
            );
        }

        Command::Status => {
            let report = pipeline::status(&config, &store).await?;
            log::info!("Catalog upper bound: #{}", report.upper_bound);
            log::info!("Items: {} ({} missing)", report.items, report.missing);
            log::info!("Multi-part chains: {}", report.chains);
            log::info!("Delivered: {}", report.delivered);
            log::info!("Unread: {}", report.unread);
            if report.untracked > 0 {
                log::info!("Not yet in read history: {}", report.untracked);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Init { force } => write_default_config(&config_path, force)?,
    }

    Ok(())
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        log::warn!(
            "Config already exists at {}. Use --force to overwrite.",
            path.display()
        );
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = Config::default().to_toml()?;
    std::fs::write(path, text)?;
    log::info!("Default config written to {}", path.display());
    Ok(())
}
