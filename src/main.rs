//! botvisor binary: wires config, notification channels, the operator
//! console, and the session manager onto a current-thread runtime.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use botvisor::{Command, Config, LineConnector, SessionManager, notifier_from_url, run_console};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // An unattended long-running session survives isolated faults: panics
    // are logged, never re-raised into an abort.
    std::panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %info, "panic caught, process continues");
    }));
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env();
    info!(
        host = %cfg.host,
        port = cfg.port,
        username = %cfg.username,
        control = cfg.enable_control,
        autopay = cfg.enable_autopay,
        "starting botvisor"
    );

    let notifier = notifier_from_url(&cfg.notify_url);
    let roster_notifier = notifier_from_url(&cfg.roster_url);
    let manager = SessionManager::new(cfg, Arc::new(LineConnector), notifier, roster_notifier);
    let commands = manager.handle();

    let _console = tokio::spawn(run_console(commands.clone()));

    let mut manager_task = tokio::spawn(manager.run());
    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            info!("shutdown signal received");
            let _ = commands.send(Command::Shutdown).await;
            let _ = (&mut manager_task).await;
        }
        _ = &mut manager_task => {}
    }
}

/// Completes when the process receives a termination signal.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    Ok(())
}

/// Completes when the process receives a termination signal.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
