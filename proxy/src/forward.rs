use crate::error::{ProxyError, Result};
use bytes::Bytes;
use common::{Bitrate, SharedLimit, ThrottleError, ThrottledReader};
use futures::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Body, Frame, Incoming};
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::http::uri::{Authority, PathAndQuery, Scheme, Uri};
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, error, instrument, warn};

/// Response header carrying the limit that shaped the response, in bps.
pub const MAX_BITRATE_HEADER: &str = "x-max-bitrate";

const X_FORWARDED_FOR: &str = "x-forwarded-for";

const BODY_READ_CAPACITY: usize = 32 * 1024;

const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type ProxyBody = UnsyncBoxBody<Bytes, io::Error>;

/// Fixed scheme and authority every request is sent to (reverse-proxy mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
}

impl Upstream {
    pub fn parse(base: &str) -> Result<Self> {
        let uri: Uri = base
            .parse()
            .map_err(|e| ProxyError::Configuration(format!("invalid upstream {base}: {e}")))?;
        let parts = uri.into_parts();
        match (parts.scheme, parts.authority) {
            (Some(scheme), Some(authority)) => Ok(Self { scheme, authority }),
            _ => Err(ProxyError::Configuration(format!(
                "upstream must be an absolute URI, got {base}"
            ))),
        }
    }
}

/// Sends client requests to their origin and shapes what comes back.
pub struct Forwarder {
    client: Client<HttpConnector, Incoming>,
    limit: Arc<SharedLimit>,
    upstream: Option<Upstream>,
}

impl Forwarder {
    pub fn new(limit: Arc<SharedLimit>, upstream: Option<Upstream>, connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            limit,
            upstream,
        }
    }

    pub fn limit(&self) -> &Arc<SharedLimit> {
        &self.limit
    }

    #[instrument(skip(self, req), fields(method = %req.method(), uri = %req.uri()))]
    pub async fn handle(&self, req: Request<Incoming>, client_addr: SocketAddr) -> Response<ProxyBody> {
        if req.method() == Method::CONNECT {
            warn!("CONNECT tunnels are not supported");
            return error_response(StatusCode::METHOD_NOT_ALLOWED, "CONNECT is not supported");
        }

        let req = match self.prepare_request(req, client_addr) {
            Ok(req) => req,
            Err(e) => {
                warn!("Rejecting request: {}", e);
                return error_response(StatusCode::BAD_REQUEST, &e.to_string());
            }
        };

        match self.client.request(req).await {
            Ok(response) => self.shape_response(response),
            Err(e) => {
                error!("Upstream request failed: {}", e);
                error_response(StatusCode::BAD_GATEWAY, "Failed to reach upstream")
            }
        }
    }

    /// Rewrites a client request into one the origin can accept.
    pub fn prepare_request<B>(&self, req: Request<B>, client_addr: SocketAddr) -> Result<Request<B>> {
        let (mut parts, body) = req.into_parts();
        parts.uri = target_uri(&parts.uri, &parts.headers, self.upstream.as_ref())?;
        strip_hop_by_hop(&mut parts.headers);
        append_forwarded_for(&mut parts.headers, client_addr);
        Ok(Request::from_parts(parts, body))
    }

    /// Stamps the current limit on the response and paces its body to it.
    ///
    /// The limit is read once here. Later updates apply to the next response,
    /// never to a body that is already being delivered.
    pub fn shape_response<B>(&self, response: Response<B>) -> Response<ProxyBody>
    where
        B: Body<Data = Bytes> + Send + Unpin + 'static,
        B::Error: Into<BoxError>,
    {
        let limit = self.limit.get();
        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        parts
            .headers
            .insert(MAX_BITRATE_HEADER, HeaderValue::from(limit.bits_per_second()));

        let body = if limit.is_zero() {
            BodyExt::map_err(body, io::Error::other).boxed_unsync()
        } else {
            match throttle_body(body, limit) {
                Ok(body) => body,
                Err(e) => {
                    error!("Cannot shape response at {} bps: {}", limit, e);
                    return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to shape response");
                }
            }
        };

        debug!(status = %parts.status, %limit, "Forwarding response");
        Response::from_parts(parts, body)
    }
}

/// Wraps a body so its data frames arrive no faster than `bitrate`.
pub fn throttle_body<B>(body: B, bitrate: Bitrate) -> std::result::Result<ProxyBody, ThrottleError>
where
    B: Body<Data = Bytes> + Send + Unpin + 'static,
    B::Error: Into<BoxError>,
{
    let chunks = TryStreamExt::map_err(body.into_data_stream(), io::Error::other);
    let reader = ThrottledReader::new(StreamReader::new(chunks), bitrate)?;
    let frames = ReaderStream::with_capacity(reader, BODY_READ_CAPACITY).map_ok(Frame::data);
    Ok(StreamBody::new(frames).boxed_unsync())
}

pub fn error_response(status: StatusCode, message: &str) -> Response<ProxyBody> {
    let body = Full::new(Bytes::from(message.to_string()))
        .map_err(|never| match never {})
        .boxed_unsync();
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

fn target_uri(uri: &Uri, headers: &HeaderMap, upstream: Option<&Upstream>) -> Result<Uri> {
    let path_and_query = uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    let (scheme, authority) = if let Some(upstream) = upstream {
        (upstream.scheme.clone(), upstream.authority.clone())
    } else if let (Some(scheme), Some(authority)) = (uri.scheme(), uri.authority()) {
        (scheme.clone(), authority.clone())
    } else {
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ProxyError::InvalidRequest("Missing host".to_string()))?;
        let authority = host
            .parse::<Authority>()
            .map_err(|e| ProxyError::InvalidRequest(format!("invalid host {host}: {e}")))?;
        (Scheme::HTTP, authority)
    };

    Ok(Uri::builder()
        .scheme(scheme)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()?)
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client_addr: SocketAddr) {
    let ip = client_addr.ip().to_string();
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        ip
    } else {
        format!("{}, {}", prior.join(", "), ip)
    };

    match HeaderValue::from_str(&value) {
        Ok(value) => {
            headers.insert(X_FORWARDED_FOR, value);
        }
        Err(e) => debug!("Skipping {}: {}", X_FORWARDED_FOR, e),
    }
}
