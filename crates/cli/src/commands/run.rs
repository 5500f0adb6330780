//! `run` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use bridge::{BridgeServices, PublishLoop, ScenarioController, ServiceServer, SinkSet};
use contracts::BridgeSettings;
use sim_client::{MockSimClient, SensorRegistry, SimClient};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::commands::{load_settings, resolver};

/// Execute the `run` command
pub async fn run_bridge(args: &RunArgs) -> Result<()> {
    let mut settings = load_settings(&args.documents)?;
    apply_overrides(&mut settings, args);
    config_loader::validate_settings(&settings).context("Invalid settings after CLI overrides")?;

    info!(
        host = %settings.engine.host,
        port = settings.engine.port,
        listen = %settings.listen_addr,
        tick_rate_hz = settings.tick_rate_hz,
        sinks = settings.sinks.len(),
        mock = args.mock,
        "Settings loaded"
    );

    if args.mock {
        serve(Arc::new(MockSimClient::new()), settings).await
    } else {
        serve_remote(settings).await
    }
}

fn apply_overrides(settings: &mut BridgeSettings, args: &RunArgs) {
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding engine host from CLI");
        settings.engine.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port = %port, "Overriding engine port from CLI");
        settings.engine.port = port;
    }
    if let Some(ref scenario) = args.scenario {
        settings.scenario = Some(scenario.clone());
    }
    if let Some(rate) = args.tick_rate {
        settings.tick_rate_hz = rate;
    }
    if let Some(ref listen) = args.listen {
        settings.listen_addr = listen.clone();
    }
}

#[cfg(feature = "remote-engine")]
async fn serve_remote(settings: BridgeSettings) -> Result<()> {
    serve(Arc::new(sim_client::RemoteSimClient::new()), settings).await
}

#[cfg(not(feature = "remote-engine"))]
async fn serve_remote(_settings: BridgeSettings) -> Result<()> {
    Err(crate::error::CliError::RemoteEngineUnavailable.into())
}

/// Connect, optionally start a scenario, then serve until a shutdown signal
async fn serve<C: SimClient>(client: Arc<C>, settings: BridgeSettings) -> Result<()> {
    bridge::connect_engine(client.as_ref(), &settings.engine.host, settings.engine.port)
        .await
        .context("Engine unavailable")?;

    let resolver = resolver(&settings);
    let catalog = resolver
        .load_catalog(&settings.sensor_paths)
        .context("Failed to load sensor definitions")?;
    let registry = SensorRegistry::with_defaults();
    registry
        .validate_catalog(&catalog)
        .context("Sensor catalog names an unknown sensor class")?;

    let controller = Arc::new(ScenarioController::new(
        Arc::clone(&client),
        registry,
        catalog,
        resolver,
    ));
    if let Some(ref scenario) = settings.scenario {
        controller
            .start_scenario(scenario)
            .await
            .with_context(|| format!("Failed to start scenario {}", scenario.display()))?;
    }

    let sinks = SinkSet::from_configs(&settings.sinks)
        .await
        .context("Failed to create sinks")?;
    let publish = PublishLoop::new(
        Arc::clone(&client),
        controller.slot(),
        sinks,
        settings.tick_rate_hz,
    )?;

    let listener = TcpListener::bind(&settings.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.listen_addr))?;
    let server = ServiceServer::new(BridgeServices::new(Arc::clone(&controller)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_task = tokio::spawn(server.serve(listener, shutdown_rx.clone()));
    let loop_task = tokio::spawn(publish.run(shutdown_rx));

    info!("Bridge running, press Ctrl+C to stop");
    shutdown_signal().await;
    warn!("Received shutdown signal, stopping bridge...");

    // receivers are only dropped once both tasks have returned
    let _ = shutdown_tx.send(true);
    let summary = loop_task.await.context("Publish loop task panicked")?;
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Service server stopped with error"),
        Err(e) => error!(error = ?e, "Service server task panicked"),
    }

    if let Err(e) = client.disconnect().await {
        warn!(error = %e, "Engine disconnect failed");
    }

    println!("\n{summary}");
    info!("Sim Bridge finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::DocumentArgs;

    fn args() -> RunArgs {
        RunArgs {
            documents: DocumentArgs {
                config: None,
                sensor_paths: Vec::new(),
                package_root: None,
            },
            host: Some("sim-host".into()),
            port: Some(7000),
            scenario: Some("scenarios/demo.json".into()),
            tick_rate: Some(30.0),
            listen: None,
            mock: true,
            metrics_port: 0,
        }
    }

    #[test]
    fn cli_overrides_replace_settings() {
        let mut settings = BridgeSettings::default();
        apply_overrides(&mut settings, &args());

        assert_eq!(settings.engine.host, "sim-host");
        assert_eq!(settings.engine.port, 7000);
        assert_eq!(settings.tick_rate_hz, 30.0);
        assert_eq!(settings.scenario, Some("scenarios/demo.json".into()));
        assert_eq!(settings.listen_addr, BridgeSettings::default().listen_addr);
    }

    #[tokio::test]
    async fn invalid_tick_rate_is_rejected_before_connecting() {
        let mut run = args();
        run.tick_rate = Some(0.0);
        let err = run_bridge(&run).await.unwrap_err();
        assert!(err.to_string().contains("Invalid settings"));
    }

    #[tokio::test]
    async fn missing_catalog_fails_startup() {
        let mut run = args();
        run.documents.sensor_paths = vec!["/nonexistent/sensors.json".into()];
        run.scenario = None;
        let err = run_bridge(&run).await.unwrap_err();
        assert!(err.to_string().contains("sensor definitions"));
    }
}
