use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use stream_notify::config::AppConfig;
use stream_notify::database;
use stream_notify::database::repositories::{SqlxSubscriptionStore, SubscriptionStore};
use stream_notify::dispatcher::discord::DiscordDispatcher;
use stream_notify::logging;
use stream_notify::monitor::StreamPoller;
use stream_notify::provider::twitch::TwitchProvider;
use stream_notify::registry::StreamRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before anything reads them.
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // Keep the guard alive for the process lifetime.
    let _log_guard = logging::init_logging(&config.log_dir)?;

    let pool = database::init_pool(&config.database_url).await?;
    let store = Arc::new(SqlxSubscriptionStore::new(pool));
    store.migrate().await?;

    let registry = Arc::new(StreamRegistry::new());
    registry.load(store.list_streams().await?);
    info!(streams = registry.len(), "Registry loaded from store");

    let provider = Arc::new(TwitchProvider::new(config.twitch.clone())?);
    let dispatcher = Arc::new(DiscordDispatcher::new(config.discord.clone())?);

    let poller = Arc::new(StreamPoller::new(
        store.clone(),
        provider,
        dispatcher,
        registry.clone(),
        config.poller.clone(),
    ));

    let cancel = CancellationToken::new();
    let poller_handle = tokio::spawn({
        let poller = poller.clone();
        let cancel = cancel.clone();
        async move { poller.run(cancel).await }
    });

    info!("stream-notify started");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, stopping polling loop");

    // Let an in-flight tick finish, then stop rescheduling.
    cancel.cancel();
    if let Err(e) = poller_handle.await {
        error!(error = %e, "Polling task ended abnormally");
    }

    Ok(())
}
