use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eyre::WrapErr as _;
use marshal_broker::{BrokerSidecar, SidecarCompletionHandler};
use marshal_config::{IsolatedProcessorConfig, MarshalConfig};
use marshal_core::{CompletionHandler, Governor};
use marshal_processor::{BrokerBackedLauncher, LocalLauncher, ProcessorLauncher};
use tokio::sync::watch;
use tracing::info;

pub async fn run(config_path: Option<PathBuf>) -> eyre::Result<()> {
    let config = MarshalConfig::load(config_path.as_deref()).wrap_err("failed to load configuration")?;

    marshal_telemetry::init(marshal_telemetry::TelemetryOptions {
        debug: config.debug,
        log_to_stdout: config.log_to_stdout,
        external_loggers: config.external_loggers.clone(),
    });

    let launcher: Arc<dyn ProcessorLauncher> = match &config.isolated_processor {
        IsolatedProcessorConfig::Local => Arc::new(LocalLauncher),
        IsolatedProcessorConfig::BrokerBacked { url, task_queue } => Arc::new(BrokerBackedLauncher::new(
            url.clone(),
            task_queue.clone(),
            config.retries,
            config.inactivity_timeout_secs as u64,
        )),
    };

    let max_concurrent_tasks = config
        .max_concurrent_tasks
        .unwrap_or_else(marshal_core::default_max_concurrent_tasks);

    let governor = Governor::with_capacity(launcher, max_concurrent_tasks)
        .with_previous_tasks_capacity(config.previous_tasks_capacity)
        .with_dead_man_timeout(Duration::from_secs(config.dead_man_timeout_secs));

    marshal_demo_models::register_all_on_governor(&governor, &config.accepted_model_classes)
        .wrap_err("failed to register demo model classes")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut sidecar_tasks = Vec::new();
    for spec in &config.message_broker_managers {
        let (handler, completions) = SidecarCompletionHandler::new_pair();
        governor
            .attach_sidecar(spec.name.clone(), Arc::new(handler) as Arc<dyn CompletionHandler>)
            .await;

        let sidecar = BrokerSidecar::new(
            spec.name.clone(),
            spec.url.clone(),
            spec.task_queue.clone(),
            governor.handle(),
            completions,
        );
        let sidecar_shutdown = shutdown_rx.clone();
        sidecar_tasks.push(tokio::spawn(async move {
            sidecar.run(sidecar_shutdown).await;
        }));
    }

    let handle = governor.handle();
    let http_addr: SocketAddr = ([0, 0, 0, 0], config.http_port).into();
    let http_shutdown_rx = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(err) = marshal_http::serve(http_addr, handle, wait_for_shutdown(http_shutdown_rx)).await {
            tracing::error!(error = %err, "http adapter exited with an error");
        }
    });

    let governor_shutdown = governor.shutdown_handle();
    let loop_task = tokio::spawn(governor.run());

    info!(%http_addr, max_concurrent_tasks, "marshald node running");

    wait_for_termination_signal().await?;
    info!("shutdown signal received, stopping node");

    let _ = shutdown_tx.send(true);
    let _ = governor_shutdown.send(true);

    let _ = http_task.await;
    let _ = loop_task.await;
    for task in sidecar_tasks {
        let _ = task.await;
    }

    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(unix)]
async fn wait_for_termination_signal() -> eyre::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_termination_signal() -> eyre::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("received ctrl-c");
    Ok(())
}
