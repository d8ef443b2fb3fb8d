use archive_bot::cache::{EntityResolver, NameProjector};
use archive_bot::config::{ConfigEvent, ConfigStore, JsonFileStore, load_settings};
use archive_bot::error::Result;
use archive_bot::lists::ListFormatter;
use archive_bot::secrets::load_token;
use archive_bot::slack::{SlackClient, SlackConnection};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("archive_bot=debug,slack_morphism=info")),
        )
        .with_target(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting archive bot");

    let settings = load_settings()?;
    tracing::debug!(
        config = ?settings.config_path,
        team_id = %settings.slack.team_id,
        "Settings loaded"
    );

    let persistence = Arc::new(JsonFileStore::new(&settings.config_path));
    let config = Arc::new(ConfigStore::load(persistence).await?);
    let _config_log = config.subscribe(|event| match event {
        ConfigEvent::PersistenceFailed(e) => {
            tracing::error!(error = %e, "Configuration was not saved")
        }
        ConfigEvent::Saved { at } => tracing::debug!(at = %at, "Configuration saved"),
        other => tracing::info!(event = other.name(), "Configuration changed"),
    });

    let token = load_token(config.secrets_locator()).await?;
    let client = SlackClient::new(token)?;
    let connection = Arc::new(SlackConnection::connect(client, &settings.slack).await?);
    tracing::info!(workspace = %connection.guild().name, "Connected to Slack");

    let resolver = EntityResolver::new(config.clone(), connection.clone());
    let projector = NameProjector::new(resolver.clone());
    let formatter = ListFormatter::new(projector.clone());

    log_lists(&formatter).await;

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<String>(1);
    tokio::spawn(async move {
        let signal_name = setup_shutdown_handler().await;
        let _ = shutdown_tx.send(signal_name).await;
    });

    let mut ticker = tokio::time::interval(settings.refresh_interval);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match connection.refresh().await {
                    Ok(0) => {}
                    Ok(_) => log_lists(&formatter).await,
                    Err(e) => tracing::warn!(error = %e, "Workspace refresh failed"),
                }
                resolver.stats().log("resolver");
                projector.stats().log("names");
            }
            Some(signal_name) = shutdown_rx.recv() => {
                tracing::info!(
                    signal = %signal_name,
                    "Received shutdown signal, saving configuration"
                );
                break;
            }
        }
    }

    if let Err(e) = config.save().await {
        tracing::error!(error = %e, "Failed to save configuration on shutdown");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn log_lists(formatter: &ListFormatter) {
    match formatter.get_admins().await {
        Ok(admins) => tracing::info!("Admins:\n{}", admins),
        Err(e) => tracing::warn!(error = %e, "Could not list admins"),
    }
    match formatter.get_guilds() {
        Ok(guilds) => tracing::info!("Guilds:\n{}", guilds),
        Err(e) => tracing::warn!(error = %e, "Could not list guilds"),
    }
    match formatter.get_all_channels() {
        Ok(channels) => {
            for (guild, list) in channels {
                tracing::info!(guild_id = %guild, "Channels:\n{}", list);
            }
        }
        Err(e) => tracing::warn!(error = %e, "Could not list channels"),
    }
}

/// Handles SIGINT (Ctrl+C), SIGTERM, and SIGQUIT on Unix systems
async fn setup_shutdown_handler() -> String {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
        let mut sigquit = signal(SignalKind::quit()).expect("Failed to setup SIGQUIT handler");

        tokio::select! {
            _ = sigint.recv() => "SIGINT (Ctrl+C)".to_string(),
            _ = sigterm.recv() => "SIGTERM".to_string(),
            _ = sigquit.recv() => "SIGQUIT".to_string(),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        "Ctrl+C".to_string()
    }
}
