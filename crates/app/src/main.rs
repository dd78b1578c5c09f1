use anyhow::{Context, Result};
use mintwatch_config::{load_from_env_or_default, AppConfig, NotifierConfig};
use mintwatch_market_data::{
    CooldownGate, CriteriaEngine, HeliusAssetResolver, ImageResolver, MarketDataClient,
    NoopImageResolver,
};
use mintwatch_signals::{
    Notifier, SignalDeps, SignalService, TelegramNotifier, TracingNotifier, TriggerMode,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod task_spawns;
mod telemetry;
mod web;

use task_spawns::{spawn_dedup_prune_task, spawn_drop_report_task, spawn_volume_trigger_task};
use telemetry::format_error_chain;
use web::WebRuntimeHandle;

const DEFAULT_CONFIG_PATH: &str = "configs/dev.toml";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cli_config = parse_config_arg();
    let default_path = cli_config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let (config, loaded_config_path) = load_from_env_or_default(&default_path)?;

    init_tracing(&config.system.log_level, config.system.log_json);
    info!(
        config_path = %loaded_config_path.display(),
        env = %config.system.env,
        trigger_mode = %config.signals.trigger_mode,
        notifier = %config.notifier.mode,
        "configuration loaded"
    );

    let service = Arc::new(build_signal_service(&config)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = spawn_background_tasks(&config, &service, &shutdown_rx);

    let web = WebRuntimeHandle::new(Arc::clone(&service), &config.webhook);
    if !web.auth_is_configured() {
        warn!("webhook.auth_header is empty, webhook accepts unauthenticated deliveries");
    }
    let mut server = tokio::spawn(web.run_server(config.webhook.clone(), shutdown_rx.clone()));

    let server_result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("shutdown requested");
            None
        }
        finished = &mut server => Some(finished),
    };

    let _ = shutdown_tx.send(true);
    let server_result = match server_result {
        Some(finished) => finished,
        None => {
            tasks.push(tokio::spawn(async move {
                match server.await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => warn!(
                        error = %format_error_chain(&error),
                        "webhook server stopped with error"
                    ),
                    Err(error) => warn!(error = %error, "webhook server task failed"),
                }
            }));
            Ok(Ok(()))
        }
    };
    for task in tasks {
        if time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
            warn!("background task did not stop within shutdown grace period");
        }
    }
    info!("mintwatch stopped");
    server_result.context("webhook server task panicked")?
}

fn build_signal_service(config: &AppConfig) -> Result<SignalService> {
    let cooldown = Arc::new(CooldownGate::new());
    let market_data = MarketDataClient::new(
        &config.market_data,
        CriteriaEngine::new(config.criteria.clone()),
        cooldown,
    )
    .context("failed to initialize market data client")?;
    let images: Arc<dyn ImageResolver> = match HeliusAssetResolver::from_config(&config.assets)
        .context("failed to initialize asset image lookup")?
    {
        Some(resolver) => Arc::new(resolver),
        None => {
            info!("asset image lookup disabled");
            Arc::new(NoopImageResolver)
        }
    };
    let notifier = build_notifier(&config.notifier)?;
    SignalService::from_config(
        config,
        SignalDeps {
            validator: Arc::new(market_data),
            notifier,
            images,
        },
    )
    .context("failed to initialize signal service")
}

fn build_notifier(config: &NotifierConfig) -> Result<Arc<dyn Notifier>> {
    if config.mode.trim().eq_ignore_ascii_case("telegram") {
        let notifier = TelegramNotifier::from_config(config)
            .context("failed to initialize telegram notifier")?;
        return Ok(Arc::new(notifier));
    }
    Ok(Arc::new(TracingNotifier))
}

fn spawn_background_tasks(
    config: &AppConfig,
    service: &Arc<SignalService>,
    shutdown: &watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();
    if config.tracker.enabled {
        let tracker = Arc::clone(service.tracker());
        tasks.push(tokio::spawn(tracker.run(shutdown.clone())));
    } else {
        info!("progress tracker disabled");
    }
    let volume = Arc::clone(service.volume());
    tasks.push(tokio::spawn(volume.run_sweeper(
        Duration::from_secs(config.volume.sweep_interval_seconds),
        shutdown.clone(),
    )));
    if service.trigger_mode() == TriggerMode::Volume {
        tasks.push(spawn_volume_trigger_task(
            Arc::clone(service),
            Duration::from_secs(config.volume.check_interval_seconds),
            shutdown.clone(),
        ));
    }
    if service.dedup().retention().is_some() {
        tasks.push(spawn_dedup_prune_task(
            Arc::clone(service),
            Duration::from_secs(config.dedup.prune_interval_seconds),
            shutdown.clone(),
        ));
    }
    tasks.push(spawn_drop_report_task(
        Arc::clone(service),
        Duration::from_secs(config.system.drop_report_seconds),
        shutdown.clone(),
    ));
    tasks
}

fn parse_config_arg() -> Option<PathBuf> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(inline) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(inline));
        }
    }
    None
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    if json {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_env_filter(filter)
            .compact()
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_mode_builds_tracing_notifier_and_service() {
        let config = AppConfig::default();
        assert!(build_notifier(&config.notifier).is_ok());
        let service = build_signal_service(&config).expect("service");
        assert_eq!(service.trigger_mode(), TriggerMode::FirstSeen);
    }

    #[test]
    fn telegram_mode_without_credentials_fails_fast() {
        let config = NotifierConfig {
            mode: "telegram".to_string(),
            ..NotifierConfig::default()
        };
        let error = build_notifier(&config).err().expect("missing token");
        assert!(format_error_chain(&error).contains("telegram_bot_token"));
    }
}
