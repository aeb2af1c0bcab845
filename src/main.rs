mod classifier;
mod cli;
mod config;
mod driver;
mod error;
mod events;
mod executor;
mod locator;
mod orchestrator;
mod pipeline;
mod session;
mod state_machine;
mod store;
mod targets;
#[cfg(test)]
mod testing;
mod ui;
mod vocabulary;

use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use classifier::Classifier;
use cli::{Cli, Command};
use config::{Credentials, TicketeraConfig};
use driver::WebDriverClient;
use error::{SessionLost, TicketeraError};
use events::EventSink;
use executor::{Mode, StepExecutor};
use orchestrator::{BatchOrchestrator, RunEnd};
use pipeline::Pipeline;
use session::{Session, find_event};
use state_machine::TicketKind;
use store::{RecordStore, SheetsStore};
use ui::BatchProgress;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = TicketeraConfig::load(cli.config.as_deref())?;
    if let Some(headless) = cli.headless_override() {
        config.headless = headless;
    }
    if let Some(retries) = cli.retries {
        config.stage_retries = retries;
    }
    config.validate()?;

    match cli.command {
        Command::Check => {
            ui::print_config(&config);
            Ok(())
        }
        Command::Events => list_events(&config).await,
        Command::Run {
            event,
            mode,
            worksheet,
            spreadsheet,
        } => run(&config, &event, mode, worksheet, spreadsheet).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "ticketera=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn executor(config: &TicketeraConfig) -> StepExecutor {
    StepExecutor::new(
        Mode::from_headless(config.headless),
        config.timeouts.budgets(),
    )
}

/// Start the browser and log in.
async fn connect(
    config: &TicketeraConfig,
    credentials: &Credentials,
) -> Result<Session<WebDriverClient>> {
    let browser = WebDriverClient::connect(
        Some(&config.webdriver_url),
        config.headless,
        config.timeouts.navigation_ms,
    )
    .await
    .map_err(TicketeraError::from)
    .with_context(|| format!("starting browser at {}", config.webdriver_url))?;

    let mut session = Session::new(
        browser,
        &config.base_url,
        executor(config),
        config.timeouts.navigation(),
    );
    if let Err(e) = session.login(credentials).await {
        close(session).await;
        return Err(e.into());
    }
    Ok(session)
}

async fn close(mut session: Session<WebDriverClient>) {
    if !session.is_alive().await {
        return;
    }
    if let Err(e) = session.into_browser().quit().await {
        warn!(error = %e, "could not close the browser session");
    }
}

async fn list_events(config: &TicketeraConfig) -> Result<()> {
    let credentials = config.credentials()?;
    let mut session = connect(config, &credentials).await?;
    let events = session.list_events().await;
    close(session).await;
    ui::print_events(&events?);
    Ok(())
}

async fn run(
    config: &TicketeraConfig,
    event: &str,
    kind: TicketKind,
    worksheet: Option<String>,
    spreadsheet: Option<String>,
) -> Result<()> {
    let credentials = config.credentials()?;
    let spreadsheet =
        spreadsheet.unwrap_or_else(|| config.sheets.spreadsheet_id.clone());
    if spreadsheet.is_empty() {
        return Err(TicketeraError::Config(
            "no spreadsheet id: set sheets.spreadsheet_id or pass --spreadsheet".into(),
        )
        .into());
    }
    if config.sheets.token.is_empty() {
        return Err(TicketeraError::Config(
            "no sheets token: set GOOGLE_SHEETS_TOKEN or sheets.token".into(),
        )
        .into());
    }
    let worksheet = worksheet
        .or_else(|| config.sheets.worksheet.clone())
        .unwrap_or_else(|| kind.default_worksheet().to_string());

    let mut store = SheetsStore::new(
        &config.sheets.api_base,
        &spreadsheet,
        &worksheet,
        &config.sheets.token,
    )
    .map_err(TicketeraError::from)?;
    let records = store
        .read_all()
        .await
        .map_err(TicketeraError::from)
        .with_context(|| format!("reading worksheet {worksheet}"))?;
    info!(worksheet = %worksheet, records = records.len(), %kind, "records loaded");

    let mut session = connect(config, &credentials).await?;
    let outcome = issue_all(config, &mut session, &mut store, event, kind, &records).await;
    close(session).await;
    outcome
}

async fn issue_all(
    config: &TicketeraConfig,
    session: &mut Session<WebDriverClient>,
    store: &mut SheetsStore,
    wanted: &str,
    kind: TicketKind,
    records: &[state_machine::AttendeeRecord],
) -> Result<()> {
    let events = session.list_events().await?;
    let chosen = find_event(&events, wanted)
        .cloned()
        .ok_or_else(|| TicketeraError::EventNotFound(wanted.to_string()))?;
    session.open_sale(chosen).await?;

    let pipeline = Pipeline::new(
        executor(config),
        Classifier::new(config.timeouts.classify(), config.timeouts.budgets().poll),
        config.vocabulary.clone(),
        kind,
    )
    .with_confirmation(config.timeouts.confirmation())
    .with_stage_retries(config.stage_retries);

    let (sink, rx) = EventSink::channel();
    let orchestrator = BatchOrchestrator::new(pipeline, &config.screenshot_dir, sink);

    let stop = orchestrator.stop_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("stop requested; finishing the current record");
            stop.store(true, Ordering::SeqCst);
        }
    });
    let progress = tokio::spawn(BatchProgress::new().consume(rx));

    let report = orchestrator.run_batch(session, store, records).await;
    drop(orchestrator);
    progress.await.ok();

    let report = report?;
    info!(
        run = %report.run_id,
        written = report.results.len(),
        "{}",
        report.counters
    );
    match report.end {
        RunEnd::SessionLost(reason) => Err(SessionLost::new(reason).into()),
        RunEnd::Completed | RunEnd::Cancelled => Ok(()),
    }
}
