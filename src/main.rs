//! Covered Options - Main Entry Point
//!
//! Runs the sweep service, one-off sweeps, option creation from the command
//! line, and store inspection.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use covered_options::config::Config;
use covered_options::ledger::{
    HttpSettler, HttpTransactionBuilder, MockBuilder, MockSettler, MockSignerProvider,
    OptionSettler, RelaySignerProvider,
};
use covered_options::orchestrator::{OptionOrchestrator, OptionRequest, OptionType};
use covered_options::store::{OptionStore, SqliteOptionStore};
use covered_options::sweeper::ExpirySweeper;
use covered_options::wallet::{PairingData, WalletSession};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Covered Options CLI
#[derive(Parser)]
#[command(name = "covered-options")]
#[command(version, about = "Covered option NFT lifecycle engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sweep service (HTTP trigger + scheduled sweeps)
    Serve {
        /// Use in-memory mock ledger collaborators (paper mode)
        #[arg(long)]
        mock: bool,
    },

    /// Run a single sweep pass and exit
    Sweep {
        /// Use in-memory mock ledger collaborators (paper mode)
        #[arg(long)]
        mock: bool,
    },

    /// Create a covered option from the command line
    Create {
        /// Writer's ledger account id
        #[arg(long)]
        account: String,

        /// Pairing topic from an approved wallet connection
        #[arg(long)]
        topic: String,

        /// Identifier of the underlying asset
        #[arg(long)]
        token_id: String,

        /// Quantity of underlying
        #[arg(long)]
        amount: String,

        /// Strike price
        #[arg(long)]
        strike: String,

        /// Premium paid by the buyer (defaults to zero)
        #[arg(long, default_value = "")]
        premium: String,

        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry: String,

        /// "call" or "put"
        #[arg(long, default_value = "call")]
        option_type: String,

        /// Use in-memory mock ledger collaborators (paper mode)
        #[arg(long)]
        mock: bool,
    },

    /// Show persisted option records
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let config = Config::load()?;
    config.validate()?;

    // No subcommand means serve with real collaborators.
    match cli.command.unwrap_or(Commands::Serve { mock: false }) {
        Commands::Sweep { mock } => run_one_sweep(&config, mock).await,
        Commands::Create {
            account,
            topic,
            token_id,
            amount,
            strike,
            premium,
            expiry,
            option_type,
            mock,
        } => {
            let request = OptionRequest {
                token_id,
                amount,
                premium,
                strike,
                expiry,
                option_type: parse_option_type(&option_type)?,
            };
            run_create(&config, &account, &topic, request, mock).await
        }
        Commands::Status => show_status(&config),
        Commands::Serve { mock } => serve(&config, mock).await,
    }
}

fn parse_option_type(raw: &str) -> Result<OptionType> {
    match raw.to_ascii_lowercase().as_str() {
        "call" => Ok(OptionType::Call),
        "put" => Ok(OptionType::Put),
        other => anyhow::bail!("option type must be \"call\" or \"put\", got {other:?}"),
    }
}

fn open_store(config: &Config) -> Result<Arc<SqliteOptionStore>> {
    if let Some(parent) = std::path::Path::new(&config.store.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Arc::new(SqliteOptionStore::new(
        &config.store.db_path,
        &config.store.table,
    )?))
}

fn build_settler(config: &Config, mock: bool) -> Result<Arc<dyn OptionSettler>> {
    if mock {
        info!("Paper mode: using in-memory settler");
        Ok(Arc::new(MockSettler::new()))
    } else {
        Ok(Arc::new(HttpSettler::new(&config.ledger.builder_url)?))
    }
}

/// Run the HTTP trigger endpoint plus the scheduled sweep loop.
async fn serve(config: &Config, mock: bool) -> Result<()> {
    info!(
        "Covered Options v{} - sweep service",
        env!("CARGO_PKG_VERSION")
    );
    info!(
        network = %config.ledger.network,
        table = %config.store.table,
        interval_secs = config.sweep.interval_secs,
        "Configuration loaded"
    );

    let store = open_store(config)?;
    let settler = build_settler(config, mock)?;
    let sweeper = Arc::new(ExpirySweeper::new(store, settler));

    // Scheduled sweeps, starting with an immediate pass to clear any backlog.
    let scheduled = sweeper.clone();
    let interval_secs = config.sweep.interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            match scheduled.run_sweep(Utc::now()).await {
                Ok(report) if report.is_clean() => {
                    info!(processed = report.processed, "Scheduled sweep clean");
                }
                Ok(report) => {
                    warn!(
                        processed = report.processed,
                        failed = report.failed.len(),
                        "Scheduled sweep finished with failures"
                    );
                }
                Err(e) => error!(error = %e, "Scheduled sweep aborted"),
            }
        }
    });

    let app = covered_options::server::router(sweeper);
    let listener = tokio::net::TcpListener::bind(&config.sweep.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.sweep.listen_addr))?;
    info!("Sweep trigger listening on {}", config.sweep.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Sweep service failed")
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("Shutdown signal received");
}

/// Run one sweep pass and report the outcome.
async fn run_one_sweep(config: &Config, mock: bool) -> Result<()> {
    let store = open_store(config)?;
    let settler = build_settler(config, mock)?;
    let sweeper = ExpirySweeper::new(store, settler);

    let report = sweeper.run_sweep(Utc::now()).await?;
    info!(
        processed = report.processed,
        failed = report.failed.len(),
        "Sweep finished"
    );
    for failure in &report.failed {
        warn!(id = %failure.id, cause = %failure.cause, "Record not purged");
    }
    Ok(())
}

/// Create an option from the command line against a paired wallet.
async fn run_create(
    config: &Config,
    account: &str,
    topic: &str,
    request: OptionRequest,
    mock: bool,
) -> Result<()> {
    let orchestrator = if mock {
        info!("Paper mode: using in-memory builder and signer");
        OptionOrchestrator::new(
            Arc::new(MockBuilder::new()),
            Arc::new(MockSignerProvider),
            &config.ledger,
            &config.orchestrator,
        )
    } else {
        OptionOrchestrator::new(
            Arc::new(HttpTransactionBuilder::new(&config.ledger.builder_url)?),
            Arc::new(RelaySignerProvider::new(&config.ledger.relay_url)?),
            &config.ledger,
            &config.orchestrator,
        )
    };

    let session = WalletSession::connected(PairingData {
        topic: topic.to_string(),
        paired_account: account.to_string(),
    });

    match orchestrator.create_option(account, &session, request).await {
        Ok(summary) => {
            println!("{}", summary.message());
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "Option creation failed");
            anyhow::bail!("{}", err.user_message())
        }
    }
}

/// Print persisted option records and how many have expired.
fn show_status(config: &Config) -> Result<()> {
    let store = SqliteOptionStore::new(&config.store.db_path, &config.store.table)?;
    let records = store.list()?;
    let now = Utc::now();

    println!("Option records: {}", records.len());
    let mut expired = 0;
    for record in &records {
        let state = if record.expiry_date < now {
            expired += 1;
            "EXPIRED"
        } else {
            "active"
        };
        println!("  {:8} {}  expires {}", state, record.pk, record.expiry_string());
    }
    println!("Expired awaiting sweep: {expired}");
    Ok(())
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "covered-options.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("covered_options=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
