use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use castbot_common::traits::repository_traits::ChannelStore;
use castbot_core::alerts::{AlertService, HttpAlertService, NoopAlertService};
use castbot_core::auth::HttpAuthenticator;
use castbot_core::eventbus::{Endpoint, EventBus};
use castbot_core::platforms::live_socket::WsTransport;
use castbot_core::repositories::FileChannelStore;
use castbot_core::services::EmoteAnnouncer;
use castbot_core::services::builtin_commands::register_builtin_commands;
use castbot_core::{ChannelSession, SessionServices};

#[derive(Parser, Debug, Clone)]
#[command(name = "castbot")]
#[command(author, version, about = "CastBot - live channel bot sessions")]
struct Args {
    /// Directory holding channels.json, commands.json, timers.json and languages.json
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Run only this channel. Defaults to every channel flagged autoEnter.
    #[arg(long)]
    channel: Option<String>,

    /// Base URL of the platform API used for login and channel info
    #[arg(long, default_value = "https://api.castbot.live/")]
    auth_url: String,

    /// Base URL of the alert service. Alerts are disabled when unset.
    #[arg(long)]
    alerts_url: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("castbot=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!("CastBot starting. data_dir={}", args.data_dir.display());

    if let Err(e) = run(args).await {
        error!("Server error: {:?}", e);
        return Err(e);
    }
    info!("Main finished. Goodbye!");
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let store = FileChannelStore::new(&args.data_dir);

    let alerts: Arc<dyn AlertService> = match &args.alerts_url {
        Some(url) => Arc::new(HttpAlertService::new(url.as_str())),
        None => Arc::new(NoopAlertService),
    };
    let services = SessionServices {
        authenticator: Arc::new(HttpAuthenticator::new(&args.auth_url)?),
        transport: Arc::new(WsTransport::new()),
        alerts,
        emotes: Arc::new(EmoteAnnouncer),
    };
    let events = EventBus::new();
    spawn_event_logger(&events);

    let channels = match args.channel {
        Some(channel) => vec![channel],
        None => store.list_auto_enter_channels().await?,
    };
    if channels.is_empty() {
        warn!("No channels to enter. Use --channel or set autoEnter in channels.json.");
        return Ok(());
    }

    let mut sessions = Vec::new();
    for channel in channels {
        match start_session(&store, &channel, services.clone(), events.clone()).await {
            Ok(session) => sessions.push(session),
            Err(e) => error!("Could not start session for '{}': {:?}", channel, e),
        }
    }
    info!("{} session(s) running. Press Ctrl-C to stop.", sessions.len());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Ctrl-C handler error: {:?}", e);
    }

    info!("Shutting down...");
    for session in &sessions {
        session.end();
    }
    events.shutdown();
    Ok(())
}

async fn start_session(
    store: &FileChannelStore,
    channel: &str,
    services: SessionServices,
    events: EventBus,
) -> anyhow::Result<ChannelSession> {
    let session = ChannelSession::from_store(store, channel, services, events)
        .await
        .with_context(|| format!("loading channel '{}'", channel))?;
    apply_env_credentials(&session);

    register_builtin_commands(&session);
    session.start().await.with_context(|| format!("starting channel '{}'", channel))?;
    let timers = session.start_timers();
    info!("Channel '{}' is live with {} timer(s).", channel, timers);
    Ok(session)
}

/// Fills missing credentials from CASTBOT_EMAIL / CASTBOT_PASSWORD.
fn apply_env_credentials(session: &ChannelSession) {
    let config = session.config();
    if !config.email.is_empty() && !config.password.is_empty() {
        return;
    }
    let email = std::env::var("CASTBOT_EMAIL").ok();
    let password = std::env::var("CASTBOT_PASSWORD").ok();
    if email.is_some() || password.is_some() {
        debug!("Using credentials from the environment for '{}'", config.channel);
        session.set_credentials(email, password);
    }
}

fn spawn_event_logger(events: &EventBus) {
    let mut rx = events.subscribe(Endpoint::Streamer);
    let mut shutdown = events.shutdown_rx.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = rx.recv() => {
                    debug!("[room {}] {} {}", event.room, event.event_type, event.payload);
                }
                _ = shutdown.changed() => break,
                else => break,
            }
        }
    });
}
