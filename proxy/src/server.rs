use crate::config::ProxyConfig;
use crate::error::Result;
use crate::forward::{Forwarder, Upstream};
use common::SharedLimit;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct ProxyServer {
    forwarder: Arc<Forwarder>,
}

impl ProxyServer {
    pub fn new(limit: Arc<SharedLimit>, config: &ProxyConfig) -> Result<Self> {
        let upstream = config.upstream.as_deref().map(Upstream::parse).transpose()?;
        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let forwarder = Forwarder::new(limit, upstream, connect_timeout);

        Ok(Self {
            forwarder: Arc::new(forwarder),
        })
    }

    /// Accepts connections until `shutdown` fires, then asks every open
    /// connection to finish its in-flight response and close.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        info!("Proxy server listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("Accepted connection from {}", addr);
                            let forwarder = self.forwarder.clone();
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, addr, forwarder, shutdown).await {
                                    error!("Error serving connection from {}: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Proxy server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    forwarder: Arc<Forwarder>,
    shutdown: CancellationToken,
) -> Result<()> {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req| {
        let forwarder = forwarder.clone();
        async move { Ok::<_, Infallible>(forwarder.handle(req, addr).await) }
    });

    let mut conn = pin!(http1::Builder::new().serve_connection(io, service));

    tokio::select! {
        result = conn.as_mut() => result?,
        _ = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await?;
        }
    }

    debug!("Connection from {} closed", addr);
    Ok(())
}
