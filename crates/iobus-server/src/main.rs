//! IOBus server binary.
//!
//! Binds the TCP control port and the UDP data port, wires the input
//! collaborators, and runs both planes until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use iobus_server::config::ServerConfig;
use iobus_server::input::trace::TraceInput;
use iobus_server::session::SessionRegistry;
use iobus_server::transport::control::{run_control_server, ControlSettings};
use iobus_server::transport::data::{run_data_server, DataDispatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os("IOBUS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("iobus.toml"));
    let config = ServerConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();
    info!("iobus-server starting: {}", config.summary());

    let tcp = TcpListener::bind((config.bind_address.as_str(), config.tcp_port))
        .await
        .with_context(|| format!("binding TCP {}:{}", config.bind_address, config.tcp_port))?;
    let udp = UdpSocket::bind((config.bind_address.as_str(), config.udp_port))
        .await
        .with_context(|| format!("binding UDP {}:{}", config.bind_address, config.udp_port))?;

    let registry = SessionRegistry::new();
    // TraceInput logs events instead of injecting them; platform adapters
    // slot in here.
    let input = Arc::new(TraceInput);
    let dispatcher = DataDispatcher::new(
        registry.clone(),
        input.clone(),
        input.clone(),
        input.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let control_task = tokio::spawn(run_control_server(
        tcp,
        registry,
        ControlSettings::from(&config),
        input.clone(),
        input,
        shutdown_rx.clone(),
    ));
    let data_task = tokio::spawn(run_data_server(udp, dispatcher, shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown requested");
    shutdown_tx.send(true).ok();

    control_task.await.context("control server task")??;
    data_task.await.context("data server task")??;
    info!("iobus-server stopped");
    Ok(())
}
