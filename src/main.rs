use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livestats::{
    config::Config,
    errors::ResolveError,
    ingestor::{create_discovery_channel, FeedWatcher},
    metrics::{forwarder_from_config, SampleForwarder},
    models::{Credential, ResolvedEndpoint},
    session::{SessionOutcome, StreamingSession, WebSocketConnector},
    sources::{EndpointResolver, FeedScanner},
    storage::RecordStore,
    utils::{HttpFetcher, StandardHttpClient},
};

#[derive(Parser)]
#[command(name = "livestats")]
#[command(version)]
#[command(about = "Records the viewer count of live threads and forwards it to a metrics endpoint")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "livestats.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Credential sent with every metrics request
    #[arg(long, env = "LIVESTATS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Track one live thread until it completes
    Track {
        /// Live thread identifier
        thread_id: String,
    },
    /// Watch the feed and track each newly started live thread
    Watch,
    /// Print the live threads currently listed in the feed
    Scan,
}

/// Shared components for the pipeline
struct Tracker {
    config: Config,
    fetcher: Arc<dyn HttpFetcher>,
    store: RecordStore,
    forwarder: Arc<dyn SampleForwarder>,
    credential: Credential,
    /// Flips to `true` once the process was interrupted
    stop: tokio::sync::watch::Receiver<bool>,
}

impl Tracker {
    fn new(
        config: Config,
        credential: Credential,
        stop: tokio::sync::watch::Receiver<bool>,
    ) -> Result<Self> {
        let fetcher: Arc<dyn HttpFetcher> = Arc::new(StandardHttpClient::new(&config.http)?);
        let forwarder = forwarder_from_config(&config.metrics, &config.http)?;
        let store = RecordStore::new(&config.storage);
        info!("Recording viewer logs in {}", store.dir().display());
        Ok(Self {
            config,
            fetcher,
            store,
            forwarder,
            credential,
            stop,
        })
    }

    /// Resolves once the process was interrupted
    fn stopped(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut stop = self.stop.clone();
        async move {
            if stop.wait_for(|stopped| *stopped).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    fn resolver(&self) -> EndpointResolver {
        EndpointResolver::new(
            Arc::clone(&self.fetcher),
            self.store.clone(),
            self.config.resolver.clone(),
        )
    }

    fn scanner(&self) -> FeedScanner {
        FeedScanner::new(
            Arc::clone(&self.fetcher),
            self.config.feed.url.clone(),
            self.config.resolver.metadata_suffix.clone(),
        )
    }

    async fn stream(&self, endpoint: ResolvedEndpoint) -> Result<SessionOutcome> {
        let connector = Arc::new(WebSocketConnector::new(self.config.http.connect_timeout));
        let session = StreamingSession::new(
            endpoint,
            connector,
            self.store.clone(),
            Arc::clone(&self.forwarder),
            self.credential.clone(),
            self.config.session.clone(),
        );
        Ok(session.run_until(self.stopped()).await?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("livestats={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting livestats v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    info!("Configuration loaded from: {}", cli.config);

    let credential = Credential::new(cli.api_key.unwrap_or_default());
    if config.metrics.enabled && credential.is_empty() && !matches!(cli.command, Command::Scan) {
        anyhow::bail!(
            "metrics forwarding is enabled but no credential was given (use --api-key or LIVESTATS_API_KEY)"
        );
    }

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping");
            let _ = stop_tx.send(true);
        }
    });

    let tracker = Tracker::new(config, credential, stop_rx)?;

    match cli.command {
        Command::Track { thread_id } => track(&tracker, &thread_id).await,
        Command::Watch => watch(&tracker).await,
        Command::Scan => scan(&tracker).await,
    }
}

async fn track(tracker: &Tracker, thread_id: &str) -> Result<()> {
    let resolver = tracker.resolver();
    let resolved = tokio::select! {
        resolved = resolver.resolve(thread_id) => resolved,
        _ = tracker.stopped() => return Ok(()),
    };
    let endpoint = resolved.map_err(abort_on_resolve_error)?;

    match tracker.stream(endpoint).await? {
        SessionOutcome::Completed => info!("Live thread {} finished", thread_id),
        SessionOutcome::AlreadyOver => info!("Live thread {} was already over", thread_id),
        SessionOutcome::Stopped => info!("Stopped tracking live thread {}", thread_id),
    }
    Ok(())
}

/// Tracks one discovered thread at a time; later discoveries queue up
async fn watch(tracker: &Tracker) -> Result<()> {
    let watcher = FeedWatcher::new(tracker.scanner(), &tracker.config.feed);
    let (discovery_tx, mut discoveries) = create_discovery_channel(16);
    let watcher_handle = tokio::spawn(watcher.start(discovery_tx));

    let resolver = tracker.resolver();
    loop {
        let next = tokio::select! {
            next = discoveries.recv() => next,
            _ = tracker.stopped() => break,
        };
        let Some(candidate) = next else {
            break;
        };
        let Some(thread_id) = candidate.thread_id() else {
            warn!("Skipping \"{}\": no thread id in {}", candidate.title, candidate.link);
            continue;
        };

        let resolved = tokio::select! {
            resolved = resolver.resolve_at(&thread_id, &candidate.metadata_url) => resolved,
            _ = tracker.stopped() => break,
        };
        let endpoint = match resolved {
            Ok(endpoint) => endpoint,
            Err(e) => {
                watcher_handle.abort();
                return Err(abort_on_resolve_error(e));
            }
        };

        match tracker.stream(endpoint).await {
            Ok(SessionOutcome::Stopped) => break,
            Ok(_) => info!("Done with live thread {}", thread_id),
            Err(e) => {
                watcher_handle.abort();
                return Err(e);
            }
        }
    }

    if *tracker.stop.borrow() {
        watcher_handle.abort();
        return Ok(());
    }

    // The discovery channel only closes when the watcher has ended
    match watcher_handle.await {
        Ok(result) => result.context("Feed watcher stopped"),
        Err(e) => anyhow::bail!("Feed watcher task failed: {e}"),
    }
}

async fn scan(tracker: &Tracker) -> Result<()> {
    let candidates = tracker.scanner().scan().await?;
    if candidates.is_empty() {
        println!("No live threads in {}", tracker.config.feed.url);
    }
    for candidate in candidates {
        println!(
            "{}\t{}\t{}",
            candidate.thread_id().unwrap_or_else(|| "-".to_string()),
            candidate.observed_timestamp,
            candidate.title
        );
    }
    Ok(())
}

fn abort_on_resolve_error(e: ResolveError) -> anyhow::Error {
    if e.is_fatal() {
        error!("Could not resolve live thread, aborting: {}", e);
    }
    e.into()
}
