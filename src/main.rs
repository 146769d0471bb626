use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use rivulet::application::{ChatClient, ClientConfig, ClientEvent};
use rivulet::domain::entities::UserId;
use rivulet::domain::ports::ApiPort;
use rivulet::infrastructure::api::ApiClient;
use rivulet::infrastructure::config::{AppConfig, CliArgs, StorageManager};
use rivulet::infrastructure::{Session, SessionStore};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry().with(filter).init();
    }

    Ok(())
}

fn resolve_session(args: &CliArgs, store: Option<&SessionStore>) -> Result<Session> {
    if let (Some(token), Some(user_id)) = (&args.token, &args.user_id) {
        let session = Session::new(user_id.clone(), token.clone());
        if let Some(store) = store
            && let Err(e) = store.save(&session)
        {
            warn!(error = %e, "failed to persist session");
        }
        return Ok(session);
    }

    if let Some(store) = store
        && let Some(session) = store.load()?
    {
        return Ok(session);
    }

    Err(eyre!(
        "no session available; pass --token and --user-id or set RIVULET_TOKEN and RIVULET_USER_ID"
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse();

    let storage = StorageManager::new()?;
    let mut config = storage.load_config(args.config.as_deref())?;
    config.merge_with_args(&args);

    init_logging(&config)?;
    info!(version = rivulet::VERSION, "Starting rivulet");

    let session_store = SessionStore::new();
    let session = resolve_session(&args, session_store.as_ref())?;

    let api = Arc::new(ApiClient::with_base_url(&config.api_url)?);
    let client = Arc::new(ChatClient::new(
        ClientConfig {
            api_url: config.api_url.clone(),
            gateway_url: config.gateway_url.clone(),
        },
        Arc::clone(&api) as Arc<dyn ApiPort>,
    ));

    client.authenticate(session.token.clone(), UserId::from(session.user_id.clone()));
    client.connect()?;

    if let Err(e) = client.fetch_unreads().await {
        warn!(error = %e, "failed to fetch unread state");
    }

    let mut events = client.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ClientEvent::Event(event)) => {
                    info!(event = event.name(), "event applied");
                }
                Ok(ClientEvent::ServerError(code)) => {
                    warn!(%code, "server error, shutting down");
                    break;
                }
                Ok(ClientEvent::SessionExpired) => {
                    warn!("session expired, clearing stored session");
                    if let Some(store) = &session_store {
                        let _ = store.clear();
                    }
                    break;
                }
                Ok(ClientEvent::Disconnected { reason }) => {
                    warn!(%reason, "disconnected");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "event stream lagged or closed");
                    break;
                }
            },

            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                break;
            }
        }
    }

    client.destroy();
    Ok(())
}
