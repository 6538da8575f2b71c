use anyhow::Result;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Largest payload `/bytes/<n>` will produce.
pub const MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// Mock origin serving fixed-size payloads for throughput runs
pub struct MockHttpServer {
    port: u16,
}

impl MockHttpServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("127.0.0.1:{}", self.port).parse()?;
        let listener = TcpListener::bind(addr).await?;
        info!("Mock HTTP server listening on {}", addr);
        serve(listener).await
    }
}

pub async fn serve(listener: TcpListener) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(io, service_fn(handle_http_request))
                        .await
                    {
                        error!("Error serving connection: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_http_request(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>> {
    let path = req.uri().path();
    debug!("HTTP request: {} {}", req.method(), path);

    let response = match path {
        "/health" => Response::builder()
            .status(StatusCode::OK)
            .body(full_body("OK"))?,
        "/large" => Response::builder()
            .status(StatusCode::OK)
            .body(full_body(vec![b'A'; 1024 * 1024]))?,
        _ => match payload_size(path) {
            Some(size) => Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/octet-stream")
                .body(full_body(vec![b'A'; size]))?,
            None => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(full_body("Not Found"))?,
        },
    };

    Ok(response)
}

fn payload_size(path: &str) -> Option<usize> {
    path.strip_prefix("/bytes/")?
        .parse::<usize>()
        .ok()
        .filter(|size| *size <= MAX_PAYLOAD)
}

fn full_body<T: Into<Bytes>>(body: T) -> BoxBody<Bytes, hyper::Error> {
    BoxBody::new(Full::new(body.into()).map_err(|e| match e {}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_paths() {
        assert_eq!(payload_size("/bytes/524288"), Some(524_288));
        assert_eq!(payload_size("/bytes/0"), Some(0));
        assert_eq!(payload_size("/bytes/abc"), None);
        assert_eq!(payload_size("/bytes/999999999999"), None);
        assert_eq!(payload_size("/other/12"), None);
    }
}
