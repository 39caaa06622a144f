use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use vigil::clients::geo::HttpGeoLocator;
use vigil::clients::media_server::HttpMediaServer;
use vigil::clients::notify::{Notifier, WebhookNotifier};
use vigil::clients::security::HttpSecurityClient;
use vigil::configuration::config::Config;
use vigil::detection::{AnomalyDetector, EnforcementController};
use vigil::monitor::Monitor;
use vigil::session_tracking::SessionRegistry;
use vigil::storage::database_storage::DatabaseStorage;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(version)]
#[command(about = "Playback session monitor and account-sharing guard for media servers")]
struct Args {
    /// Path to the TOML configuration file. A template is generated on
    /// first start.
    #[arg(long, default_value = "config.toml")]
    config_file: PathBuf,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    println!(
        "vigil v{} | playback session monitor and account-sharing guard",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();

    if !args.config_file.exists() {
        match Config::write_template(&args.config_file) {
            Ok(()) => info!(
                "configuration template written to {}, fill in the [server] section and restart",
                args.config_file.display()
            ),
            Err(e) => error!("unable to write configuration template: {}", e),
        }
        std::process::exit(1);
    }

    let config = match Config::from_file(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!(
                "unable to load configuration from {}: {}",
                args.config_file.display(),
                e
            );
            std::process::exit(1);
        }
    };
    info!("configuration loaded from {}", args.config_file.display());

    let storage = match DatabaseStorage::new_file(&config.database.path).await {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            error!("unable to open database: {}", e);
            std::process::exit(1);
        }
    };

    let media_server = Arc::new(HttpMediaServer::new(
        &config.server.url,
        &config.server.api_key,
    ));
    let security = Arc::new(HttpSecurityClient::new(
        &config.server.url,
        &config.server.api_key,
    ));
    let geo = Arc::new(HttpGeoLocator::new());
    let notifier: Option<Arc<dyn Notifier>> = WebhookNotifier::from_config(&config.webhook)
        .map(|notifier| Arc::new(notifier) as Arc<dyn Notifier>);
    if notifier.is_some() {
        info!("webhook notifications enabled");
    } else {
        info!("webhook notifications disabled");
    }

    let enforcement = EnforcementController::new(
        media_server.clone(),
        security,
        geo.clone(),
        notifier,
        storage.clone(),
        &config.security.whitelist,
        config.security.auto_disable,
    );
    let detector = AnomalyDetector::new(
        config.alerts.enable_alerts,
        config.alerts.alert_threshold,
        config.security.ipv6_prefix_length,
    );
    let mut monitor = Monitor::new(
        SessionRegistry::new(storage),
        media_server,
        geo,
        detector,
        enforcement,
        Duration::from_secs(config.monitor.check_interval_seconds),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {}", e);
        }
        info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    monitor.run(shutdown_rx).await;
}
