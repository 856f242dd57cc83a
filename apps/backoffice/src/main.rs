use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use backoffice_core::{
    default_fields, load_settings, load_settings_from, ConsoleSession, CsvUpload, FilterKind,
    InMemoryBackend, ListScreen, NotificationLevel, PageSize, ReorderRequest, ResponseShape,
    ScreenEvent,
};
use clap::{Parser, Subcommand, ValueEnum};
use shared::domain::{RecordId, Resource};
use tokio::task::JoinHandle;
use tokio_stream::{wrappers::errors::BroadcastStreamRecvError, StreamExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Back-office list management console")]
struct Cli {
    /// Settings file; defaults to ./backoffice.toml when present.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Serve lists from a JSON fixture file instead of the HTTP API.
    #[arg(long)]
    fixtures: Option<PathBuf>,
    /// Envelope the fixture backend wraps list responses in.
    #[arg(long, value_enum, default_value_t = FixtureShape::DataNamed)]
    fixture_shape: FixtureShape,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one page of a resource.
    List {
        resource: Resource,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Rows per page, or `all`.
        #[arg(long)]
        page_size: Option<PageSize>,
        /// `key=value`; repeatable.
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        #[arg(long)]
        json: bool,
    },
    /// Move `source` to the position currently held by `target`.
    Reorder {
        resource: Resource,
        source: i64,
        target: i64,
    },
    /// Upload a CSV file to a resource.
    Import { resource: Resource, file: PathBuf },
    /// Print dropdown options of one or more resources.
    Lookups {
        #[arg(required = true)]
        resources: Vec<Resource>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FixtureShape {
    BareArray,
    DataArray,
    Named,
    DataNamed,
}

impl From<FixtureShape> for ResponseShape {
    fn from(shape: FixtureShape) -> Self {
        match shape {
            FixtureShape::BareArray => ResponseShape::BareArray,
            FixtureShape::DataArray => ResponseShape::DataArray,
            FixtureShape::Named => ResponseShape::Named,
            FixtureShape::DataNamed => ResponseShape::DataNamed,
        }
    }
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => load_settings_from(Some(path.as_path()), |name| std::env::var(name).ok())?,
        None => load_settings()?,
    };
    let session = match &cli.fixtures {
        Some(path) => {
            let backend = InMemoryBackend::from_fixture_file(path, cli.fixture_shape.into()).await?;
            info!(fixtures = %path.display(), "using in-memory backend");
            ConsoleSession::new(Arc::new(backend), &settings)
        }
        None => ConsoleSession::connect(&settings)?,
    };

    let outcome = run(&session, cli.command).await;
    session.logout().await;
    outcome
}

async fn run(session: &ConsoleSession, command: Command) -> Result<()> {
    match command {
        Command::List {
            resource,
            page,
            page_size,
            filters,
            json,
        } => {
            let screen = session.open_screen(resource).await?;
            let printer = print_events(&screen);
            apply_filters(&screen, resource, &filters).await?;
            if let Some(page_size) = page_size {
                screen.set_page_size(page_size).await?;
            }
            if page > 1 {
                screen.set_page(page).await?;
            }
            let snapshot = screen.snapshot();
            finish(screen, printer).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot.result)?);
                return Ok(());
            }
            for row in &snapshot.result.items {
                println!(
                    "{:>6}  seq={:<4} {:<32} {:<20} {:?}",
                    row.id, row.sequence_number, row.name, row.parent.name, row.status
                );
            }
            println!(
                "total={} page={}/{}",
                snapshot.result.total,
                snapshot.query.request_page(),
                snapshot.total_pages()
            );
        }
        Command::Reorder {
            resource,
            source,
            target,
        } => {
            if !resource.is_sequenced() {
                bail!("{resource} has no manual ordering");
            }
            let screen = session.open_screen(resource).await?;
            let printer = print_events(&screen);
            screen.set_page_size(PageSize::All).await?;
            let rows = screen.snapshot().result.items;
            let find = |id: i64| {
                rows.iter()
                    .find(|row| row.id == RecordId(id))
                    .ok_or_else(|| anyhow!("{resource} {id} not found"))
            };
            let request = ReorderRequest::between(find(source)?, find(target)?)?;
            let Some(request) = request else {
                println!("source and target are the same row; nothing to do");
                return finish(screen, printer).await;
            };
            let outcome = screen.reorder(request).await;
            finish(screen, printer).await?;
            outcome?;
            println!(
                "moved {resource} {source} to sequence {}",
                request.new_sequence_number
            );
        }
        Command::Import { resource, file } => {
            let upload = CsvUpload::from_path(&file)
                .await
                .with_context(|| format!("failed to read '{}'", file.display()))?;
            let screen = session.open_screen(resource).await?;
            let printer = print_events(&screen);
            let outcome = screen.import_csv(upload).await;
            finish(screen, printer).await?;
            let summary = outcome?;
            for error in &summary.errors {
                eprintln!("  {error}");
            }
            println!(
                "processed={} created={} updated={} failed={}",
                summary.processed(),
                summary.created,
                summary.updated,
                summary.failed
            );
        }
        Command::Lookups { resources } => {
            let lookups = session.load_lookups(&resources).await;
            for resource in resources {
                println!("{resource}:");
                for option in lookups.get(&resource).into_iter().flatten() {
                    println!("  {:>6}  {}", option.id, option.name);
                }
            }
        }
    }
    Ok(())
}

/// Text filters are applied right away instead of waiting for the debounce.
async fn apply_filters(
    screen: &Arc<ListScreen>,
    resource: Resource,
    filters: &[(String, String)],
) -> Result<()> {
    let fields = default_fields(resource);
    for (key, value) in filters {
        let kind = fields
            .iter()
            .find(|field| &field.key == key)
            .map(|field| field.kind)
            .ok_or_else(|| anyhow!("{resource} has no filter '{key}'"))?;
        match kind {
            FilterKind::Text => {
                screen.input_text(key, value).await?;
                screen.flush_text(key).await?;
            }
            FilterKind::Select => screen.set_select(key, value).await?,
        }
    }
    Ok(())
}

/// Prints a screen's notifications as they arrive. The task ends once the
/// screen is dropped and yields the auth failure message, if one was seen.
fn print_events(screen: &ListScreen) -> JoinHandle<Option<String>> {
    let mut events = screen.event_stream();
    tokio::spawn(async move {
        let mut auth_failure = None;
        while let Some(event) = events.next().await {
            match event {
                Ok(ScreenEvent::Notification(notification)) => {
                    let label = match notification.level {
                        NotificationLevel::Success => "ok",
                        NotificationLevel::Info => "info",
                        NotificationLevel::Warning => "warning",
                        NotificationLevel::Error => "error",
                    };
                    eprintln!("[{label}] {}", notification.message);
                }
                Ok(ScreenEvent::AuthRequired { message, .. }) => auth_failure = Some(message),
                Ok(_) => {}
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "screen events dropped");
                }
            }
        }
        auth_failure
    })
}

/// Drops the screen, waits for its notifications to be printed and turns a
/// seen auth failure into the command's error.
async fn finish(screen: Arc<ListScreen>, printer: JoinHandle<Option<String>>) -> Result<()> {
    drop(screen);
    if let Some(message) = printer.await? {
        bail!("authentication required: {message}");
    }
    Ok(())
}
