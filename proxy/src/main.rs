use anyhow::{Context, Result};
use clap::Parser;
use common::SharedLimit;
use proxy::cli::{Cli, Command, ServeArgs};
use proxy::{ControlClient, ControlServer, ProxyConfig, ProxyServer, telemetry};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::SetLimit {
            control_addr,
            bitrate,
        } => {
            let _guard = telemetry::init_tracing(None, "", "warn", None);
            let applied = ControlClient::new(control_addr)
                .set_limit(bitrate)
                .await
                .context("Failed to set max bitrate")?;
            println!("{applied}");
            Ok(())
        }
        Command::GetLimit { control_addr } => {
            let _guard = telemetry::init_tracing(None, "", "warn", None);
            let current = ControlClient::new(control_addr)
                .get_limit()
                .await
                .context("Failed to read max bitrate")?;
            println!("{current}");
            Ok(())
        }
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let mut cfg = match &args.config {
        Some(path) => ProxyConfig::load(path).with_context(|| format!("Failed to load config {path}"))?,
        None => ProxyConfig::default(),
    };
    args.apply(&mut cfg);

    let _guard = telemetry::init_tracing(
        cfg.log_dir.as_deref(),
        &cfg.log_file,
        &cfg.log_level,
        cfg.console_port,
    );

    info!("Starting proxy with configuration: {:?}", cfg);

    let limit = Arc::new(SharedLimit::new(cfg.max_bitrate));
    let proxy_server = ProxyServer::new(limit.clone(), &cfg)?;
    let control_server = ControlServer::new(limit);

    let proxy_listener = TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("Failed to bind proxy listener on {}", cfg.listen_addr))?;
    let control_listener = TcpListener::bind(&cfg.control_addr)
        .await
        .with_context(|| format!("Failed to bind control listener on {}", cfg.control_addr))?;

    let shutdown = CancellationToken::new();
    let mut proxy_task = tokio::spawn(proxy_server.run(proxy_listener, shutdown.clone()));
    let mut control_task = tokio::spawn(control_server.run(control_listener, shutdown.clone()));

    let signalled = tokio::select! {
        result = &mut proxy_task => {
            error!("Proxy server stopped unexpectedly: {:?}", result);
            false
        }
        result = &mut control_task => {
            error!("Control server stopped unexpectedly: {:?}", result);
            false
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal");
            true
        }
    };

    shutdown.cancel();
    if signalled {
        let (proxy_result, control_result) = tokio::join!(proxy_task, control_task);
        if let Ok(Err(e)) = proxy_result {
            error!("Proxy server error: {}", e);
        }
        if let Ok(Err(e)) = control_result {
            error!("Control server error: {}", e);
        }
    }

    info!("Proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
