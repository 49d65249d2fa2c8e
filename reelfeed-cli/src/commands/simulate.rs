//! Simulate command - run the feed against a generated catalog and fake decoders.
//!
//! A scripted user swipes through the feed while simulated engines report
//! `ready` or a fatal error after a random startup delay. When the run
//! finishes the telemetry snapshot is printed.

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reelfeed::catalog::{CatalogClient, InMemoryCatalog};
use reelfeed::config::ConfigFile;
use reelfeed::logging::{self, LoggingGuard, DEFAULT_LOG_FILE};
use reelfeed::network::{ConnectionSample, EffectiveConnectionType};
use reelfeed::playback::{
    AttachTicket, BufferTarget, DecodingEngine, EngineEvent, EngineFactory, MediaErrorKind,
};
use reelfeed::preferences::{IniPreferenceStore, MemoryPreferenceStore, PreferenceStore};
use reelfeed::service::{FeedHandle, FeedService};
use reelfeed::visibility::VisibilitySample;
use reelfeed::{FeedController, FeedEvent, FeedPosition, MediaSource};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;

/// Connection profile reported to the feed.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ConnectionProfile {
    /// 4G with a fast downlink
    Fast,
    /// 3G-class connection
    Medium,
    /// 2G-class connection
    Slow,
    /// Fast connection with data saver enabled
    SaveData,
}

impl ConnectionProfile {
    /// Sample the host platform would report for this profile.
    pub fn sample(self) -> ConnectionSample {
        match self {
            ConnectionProfile::Fast => ConnectionSample::new(EffectiveConnectionType::FourG)
                .with_downlink(20.0)
                .with_rtt(Duration::from_millis(50)),
            ConnectionProfile::Medium => ConnectionSample::new(EffectiveConnectionType::ThreeG)
                .with_downlink(2.5)
                .with_rtt(Duration::from_millis(250)),
            ConnectionProfile::Slow => ConnectionSample::new(EffectiveConnectionType::TwoG)
                .with_downlink(0.3)
                .with_rtt(Duration::from_millis(900)),
            ConnectionProfile::SaveData => ConnectionSample::new(EffectiveConnectionType::FourG)
                .with_downlink(20.0)
                .with_save_data(true),
        }
    }
}

/// Arguments for the simulate command.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Number of items in the generated catalog
    #[arg(long, default_value_t = 60)]
    pub items: usize,

    /// Items per catalog page
    #[arg(long, default_value_t = 10)]
    pub page_size: usize,

    /// Simulated catalog latency in milliseconds
    #[arg(long, default_value_t = 150)]
    pub catalog_latency_ms: u64,

    /// Mount radius (overrides config.ini)
    #[arg(long)]
    pub radius: Option<usize>,

    /// Connection profile
    #[arg(long, value_enum, default_value_t = ConnectionProfile::Medium)]
    pub connection: ConnectionProfile,

    /// Probability that an attach fails
    #[arg(long, default_value_t = 0.15)]
    pub fail_rate: f64,

    /// Share of failures that are decode errors (terminal)
    #[arg(long, default_value_t = 0.2)]
    pub decode_share: f64,

    /// Number of swipes to perform
    #[arg(long, default_value_t = 20)]
    pub swipes: usize,

    /// Time spent on each item before swiping, in milliseconds
    #[arg(long, default_value_t = 800)]
    pub dwell_ms: u64,

    /// Seed for reproducible engine outcomes
    #[arg(long)]
    pub seed: Option<u64>,

    /// Persist and resume position using the preferences file
    #[arg(long)]
    pub resume: bool,

    /// Print feed events as they happen
    #[arg(long)]
    pub events: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

impl SimulateArgs {
    fn validate(&self) -> Result<(), CliError> {
        if !(0.0..=1.0).contains(&self.fail_rate) {
            return Err(CliError::Config("--fail-rate must be between 0 and 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.decode_share) {
            return Err(CliError::Config("--decode-share must be between 0 and 1".to_string()));
        }
        if self.items == 0 {
            return Err(CliError::Config("--items must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// Run the simulate command.
pub async fn run(args: SimulateArgs) -> Result<(), CliError> {
    args.validate()?;

    let config = ConfigFile::load()?;
    let _logging = init_logging(&config)?;

    let mut feed_config = config.feed_config();
    if let Some(radius) = args.radius {
        feed_config = feed_config.with_window_radius(radius);
    }
    tracing::info!(
        items = args.items,
        radius = feed_config.window_radius,
        connection = ?args.connection,
        fail_rate = args.fail_rate,
        "Starting simulation"
    );

    let preferences: Box<dyn PreferenceStore> = if args.resume {
        Box::new(IniPreferenceStore::open(IniPreferenceStore::default_path())?)
    } else {
        Box::new(MemoryPreferenceStore::new())
    };

    let (engine_tx, engine_rx) = mpsc::unbounded_channel();
    let factory = SimulatedEngines::new(&args, engine_tx);
    let controller = FeedController::new(feed_config.clone(), Box::new(factory), preferences);

    let catalog: Arc<dyn CatalogClient> = Arc::new(
        InMemoryCatalog::generated(args.items, args.page_size)
            .with_latency(Duration::from_millis(args.catalog_latency_ms)),
    );

    let cancellation = CancellationToken::new();
    let (service, events) =
        FeedService::start_with_cancellation(controller, catalog, cancellation.clone());
    let handle = service.handle();

    tokio::spawn(forward_engine_events(engine_rx, handle.clone()));
    let printer = tokio::spawn(print_events(events, args.events));
    tokio::spawn(cancel_on_ctrl_c(cancellation.clone()));

    handle.connection_changed(args.connection.sample())?;

    let dwell = Duration::from_millis(args.dwell_ms);
    let settle = feed_config.visibility.settle_period;
    let mut swipes = 0;

    while swipes < args.swipes {
        tokio::select! {
            _ = cancellation.cancelled() => break,
            _ = tokio::time::sleep(dwell) => {}
        }

        let status = handle.status().await?;
        let Some(active) = status.active else {
            if status.catalog_failed {
                handle.retry_catalog()?;
            }
            continue;
        };
        let next = active.index() + 1;
        if next >= status.loaded {
            if status.has_more {
                // Waiting for the next page
                continue;
            }
            break;
        }

        swipe(&handle, active, FeedPosition(next))?;
        swipes += 1;
    }

    // Let the final swipe settle
    tokio::time::sleep(settle + dwell).await;
    let status = handle.status().await?;
    let metrics = service.metrics();
    service.shutdown().await?;
    let _ = printer.await;

    let snapshot = metrics.snapshot();
    if args.json {
        let report = json!({
            "swipes": swipes,
            "status": status,
            "telemetry": snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Simulation finished after {} swipes", swipes);
        println!();
        match status.active {
            Some(active) => println!("Active item:       {} of {} loaded", active, status.loaded),
            None => println!("Active item:       (none)"),
        }
        println!("Connection tier:   {}", status.budget.tier);
        println!();
        println!("{}", snapshot);
    }
    Ok(())
}

fn init_logging(config: &ConfigFile) -> Result<LoggingGuard, CliError> {
    let directory = config
        .logging
        .directory
        .clone()
        .unwrap_or_else(logging::default_log_directory);
    let guard = logging::init(&directory.join(DEFAULT_LOG_FILE), &config.logging.level)?;
    Ok(guard)
}

/// Scroll from `from` to `to` the way an intersection observer reports it.
fn swipe(handle: &FeedHandle, from: FeedPosition, to: FeedPosition) -> Result<(), CliError> {
    handle.observe_visibility(vec![
        VisibilitySample::visible(from, 0.55),
        VisibilitySample::visible(to, 0.45),
    ])?;
    handle.observe_visibility(vec![
        VisibilitySample::visible(from, 0.1),
        VisibilitySample::visible(to, 0.9),
    ])?;
    handle.observe_visibility(vec![
        VisibilitySample::hidden(from),
        VisibilitySample::visible(to, 1.0),
    ])?;
    Ok(())
}

async fn forward_engine_events(
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
    handle: FeedHandle,
) {
    while let Some(event) = events.recv().await {
        if handle.engine_event(event).is_err() {
            break;
        }
    }
}

async fn print_events(mut events: mpsc::UnboundedReceiver<FeedEvent>, verbose: bool) {
    while let Some(event) = events.recv().await {
        if !verbose {
            continue;
        }
        match event {
            FeedEvent::ActiveChanged { to, .. } => println!("active      {}", to),
            FeedEvent::SlotStateChanged { position, from, to } => {
                println!("slot        {} {} -> {}", position, from, to)
            }
            FeedEvent::SlotError { position, kind } => {
                println!("error       {} {}", position, kind.as_str())
            }
            FeedEvent::FallbackShown { position, .. } => println!("fallback    {}", position),
            FeedEvent::PageLoaded { appended, total, has_more } => {
                println!("page        +{} ({} total, more: {})", appended, total, has_more)
            }
            FeedEvent::CatalogFailed { error } => println!("catalog     {}", error),
            FeedEvent::BudgetChanged { budget } => println!("budget      {}", budget.tier),
            FeedEvent::Mounted { .. } | FeedEvent::Unmounted { .. } => {}
        }
    }
}

async fn cancel_on_ctrl_c(cancellation: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Interrupted, stopping simulation");
        cancellation.cancel();
    }
}

// =============================================================================
// Simulated engines
// =============================================================================

/// Outcome drawn for one engine.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Outcome {
    startup: Duration,
    error: Option<MediaErrorKind>,
}

struct SimulatedEngines {
    rng: StdRng,
    fail_rate: f64,
    decode_share: f64,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl SimulatedEngines {
    fn new(args: &SimulateArgs, events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        let rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            fail_rate: args.fail_rate,
            decode_share: args.decode_share,
            events,
        }
    }

    fn draw(&mut self) -> Outcome {
        let startup = Duration::from_millis(self.rng.random_range(80..=600));
        let error = self.rng.random_bool(self.fail_rate).then(|| {
            if self.rng.random_bool(self.decode_share) {
                MediaErrorKind::Decode
            } else {
                MediaErrorKind::Transport
            }
        });
        Outcome { startup, error }
    }
}

impl EngineFactory for SimulatedEngines {
    fn create(&mut self, position: FeedPosition) -> Box<dyn DecodingEngine> {
        let outcome = self.draw();
        tracing::trace!(position = %position, ?outcome, "Created simulated engine");
        Box::new(SimulatedEngine {
            outcome,
            events: self.events.clone(),
            cancellation: CancellationToken::new(),
        })
    }
}

/// Reports a single outcome after its startup delay unless destroyed first.
struct SimulatedEngine {
    outcome: Outcome,
    events: mpsc::UnboundedSender<EngineEvent>,
    cancellation: CancellationToken,
}

impl DecodingEngine for SimulatedEngine {
    fn attach(&mut self, ticket: AttachTicket, source: &MediaSource, _buffer: BufferTarget) {
        tracing::trace!(ticket = %ticket, url = %source.url, "Simulated attach");
        let outcome = self.outcome;
        let events = self.events.clone();
        let cancellation = self.cancellation.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancellation.cancelled() => {}
                _ = tokio::time::sleep(outcome.startup) => {
                    let event = match outcome.error {
                        Some(kind) => EngineEvent::fatal(ticket, kind),
                        None => EngineEvent::ready(ticket),
                    };
                    let _ = events.send(event);
                }
            }
        });
    }

    fn set_buffer_target(&mut self, _buffer: BufferTarget) {}

    fn play(&mut self) {}

    fn pause(&mut self) {}

    fn set_muted(&mut self, _muted: bool) {}

    fn detach(&mut self) {
        self.cancellation.cancel();
    }

    fn destroy(&mut self) {
        self.cancellation.cancel();
    }
}
