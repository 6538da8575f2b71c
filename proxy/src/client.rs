use crate::control::LimitResponse;
use crate::error::{ProxyError, Result};
use bytes::Bytes;
use common::Bitrate;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Talks to the control endpoint of a running proxy.
#[derive(Debug, Clone)]
pub struct ControlClient {
    control_addr: String,
}

impl ControlClient {
    /// `control_addr` is `host:port`, or `:port` for the local machine.
    pub fn new(control_addr: impl Into<String>) -> Self {
        Self {
            control_addr: control_addr.into(),
        }
    }

    pub fn dial_addr(&self) -> String {
        if self.control_addr.starts_with(':') {
            format!("127.0.0.1{}", self.control_addr)
        } else {
            self.control_addr.clone()
        }
    }

    pub async fn get_limit(&self) -> Result<Bitrate> {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(HOST, self.dial_addr())
            .body(Full::new(Bytes::new()))?;

        let (status, reply) = self.send(request).await?;
        if status != StatusCode::OK {
            return Err(rejected(status, reply));
        }
        Ok(reply.bitrate)
    }

    /// Asks the proxy to apply `bitrate`; returns the limit now in effect.
    ///
    /// Negative values are sent as-is so the server's reason comes back in
    /// [`ProxyError::Rejected`].
    pub async fn set_limit(&self, bitrate: i64) -> Result<Bitrate> {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(HOST, self.dial_addr())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Full::new(Bytes::from(format!("bitrate={bitrate}"))))?;

        let (status, reply) = self.send(request).await?;
        if status != StatusCode::ACCEPTED {
            return Err(rejected(status, reply));
        }

        info!("Max bitrate set to {} bps on {}", reply.bitrate, self.control_addr);
        Ok(reply.bitrate)
    }

    async fn send(&self, request: Request<Full<Bytes>>) -> Result<(StatusCode, LimitResponse)> {
        let stream = TcpStream::connect(self.dial_addr()).await?;
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("Control connection error: {}", e);
            }
        });

        let response = sender.send_request(request).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();

        match serde_json::from_slice::<LimitResponse>(&body) {
            Ok(reply) => Ok((status, reply)),
            Err(e) if status.is_success() => Err(e.into()),
            Err(_) => Err(ProxyError::Rejected {
                status,
                message: String::from_utf8_lossy(&body).into_owned(),
            }),
        }
    }
}

fn rejected(status: StatusCode, reply: LimitResponse) -> ProxyError {
    ProxyError::Rejected {
        status,
        message: reply
            .error
            .unwrap_or_else(|| format!("unexpected status, limit is {} bps", reply.bitrate)),
    }
}
