use std::env;
use std::thread;

use anyhow::{Context as _, Result, anyhow};
use hark::lifecycle::ShutdownSignal;
use hark::{
    CancelToken, ConfigManager, ContextBuilder, DEFAULT_LOG_LEVEL, StateMachine, TracingRenderer,
    VERSION, start_listener, wake_channel,
};
use hark_core::{CONFIG_ENV, LOG_ENV};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize the logger
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .init();

    info!(version = VERSION, "starting hark");

    // Load config
    let config_manager = match env::var_os(CONFIG_ENV) {
        Some(path) => ConfigManager::from_path(path),
        None => ConfigManager::new()?,
    };
    let config = config_manager.load()?;
    // save back the config to create the file if it doesn't exist
    config_manager.save(&config)?;
    info!(path = %config_manager.config_path().display(), "configuration loaded");
    config.warn_missing_credentials();

    let cancel = CancelToken::new();
    let (trigger, wake) = wake_channel();
    let wake_source = config.wake;
    let button_pin = config.wake_button_pin;

    let ctx = ContextBuilder::from_config(config)?
        .cancel(cancel.clone())
        .wake(Box::new(wake))
        .renderer(Box::new(TracingRenderer))
        .build()?;

    // Stop the loop on Ctrl-C / SIGTERM
    let shutdown_trigger = trigger.clone();
    let shutdown_cancel = cancel.clone();
    ctx.runtime().spawn(async move {
        ShutdownSignal::new().wait().await;
        info!("shutdown requested");
        shutdown_cancel.cancel();
        shutdown_trigger.shutdown();
    });

    // held until exit so button interrupts stay registered
    let _listener =
        start_listener(wake_source, button_pin, trigger).context("failed to start wake listener")?;

    let result = thread::scope(|scope| {
        thread::Builder::new()
            .name("hark-fsm".to_string())
            .spawn_scoped(scope, || StateMachine::new(&ctx).start())
            .context("failed to spawn state machine thread")?
            .join()
            .map_err(|_| anyhow!("state machine thread panicked"))
    })?;

    ctx.reset_signals();
    result.context("state machine stopped")?;

    info!("goodbye");
    Ok(())
}
