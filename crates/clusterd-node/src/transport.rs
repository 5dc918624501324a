//! HTTP clients for the clusterd surface.
//!
//! Each request opens a TCP connection, performs an HTTP/1 exchange
//! with hyper and decodes the [`ApiResponse`] envelope. The whole
//! exchange is bounded by a timeout.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http_body_util::{BodyExt, Full};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use clusterd_state::NodeDescriptor;

use crate::agent::ClusterAgent;
use crate::diagnostics::Diagnostics;
use crate::error::{ClusterError, ClusterResult};
use crate::peer::PeerClient;
use crate::secret::Secret;
use crate::wire::*;

/// Default port daemons listen on.
pub const DEFAULT_PORT: u16 = 8896;

/// Perform one JSON request against `address` (a `host:port`).
async fn request_json<Req, Resp>(
    method: Method,
    address: &str,
    path: &str,
    body: Option<&Req>,
    timeout: Duration,
) -> ClusterResult<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let uri = format!("http://{address}{path}");
    let payload = match body {
        Some(body) => Bytes::from(
            serde_json::to_vec(body).map_err(|e| ClusterError::MalformedInput(e.to_string()))?,
        ),
        None => Bytes::new(),
    };

    let exchange = async {
        let stream = tokio::net::TcpStream::connect(address)
            .await
            .map_err(|e| ClusterError::Transport(format!("connect to {address}: {e}")))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ClusterError::Transport(format!("handshake with {address}: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "connection closed with error");
            }
        });

        let req = http::Request::builder()
            .method(method.clone())
            .uri(&uri)
            .header(HOST, address)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, "clusterd/0.1")
            .body(Full::new(payload))
            .map_err(|e| ClusterError::MalformedInput(format!("request to {uri}: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ClusterError::Transport(format!("{method} {uri}: {e}")))?;
        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ClusterError::Transport(format!("reading reply from {uri}: {e}")))?
            .to_bytes();
        debug!(%uri, %status, len = bytes.len(), "reply received");
        Ok::<Bytes, ClusterError>(bytes)
    };

    let bytes = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| ClusterError::Timeout(format!("{method} {uri} after {timeout:?}")))??;

    let envelope: ApiResponse<serde_json::Value> = serde_json::from_slice(&bytes)
        .map_err(|e| ClusterError::Transport(format!("undecodable reply from {uri}: {e}")))?;
    envelope.into_result()
}

/// Turn a descriptor address into a dialable `host:port`, filling in
/// `default_port` when the address does not carry one.
pub fn resolve_address(address: &str, default_port: u16) -> String {
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    match address.parse::<IpAddr>() {
        Ok(IpAddr::V6(ip)) => format!("[{ip}]:{default_port}"),
        Ok(IpAddr::V4(ip)) => format!("{ip}:{default_port}"),
        Err(_) if address.contains(':') => address.to_string(),
        Err(_) => format!("{address}:{default_port}"),
    }
}

// ── Peer client ────────────────────────────────────────────────────

/// Reaches other daemons' peer endpoints over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    peer_port: u16,
    request_timeout: Duration,
}

impl HttpPeerClient {
    pub fn new(peer_port: u16, request_timeout: Duration) -> Self {
        Self {
            peer_port,
            request_timeout,
        }
    }
}

impl Default for HttpPeerClient {
    fn default() -> Self {
        Self::new(DEFAULT_PORT, Duration::from_secs(2))
    }
}

impl PeerClient for HttpPeerClient {
    fn admit(
        &self,
        address: &str,
        request: &AdmitRequest,
    ) -> impl Future<Output = ClusterResult<AdmitReply>> + Send {
        let target = resolve_address(address, self.peer_port);
        let timeout = self.request_timeout;
        async move { request_json(Method::POST, &target, ADMIT_PATH, Some(request), timeout).await }
    }

    fn announce(
        &self,
        address: &str,
        request: &AnnounceRequest,
    ) -> impl Future<Output = ClusterResult<()>> + Send {
        let target = resolve_address(address, self.peer_port);
        let timeout = self.request_timeout;
        async move { request_json(Method::POST, &target, ANNOUNCE_PATH, Some(request), timeout).await }
    }
}

// ── Daemon client ──────────────────────────────────────────────────

/// Drives a running daemon through its command endpoints.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    address: String,
    timeout: Duration,
}

impl DaemonClient {
    pub fn new(address: &str, timeout: Duration) -> Self {
        Self {
            address: resolve_address(address, DEFAULT_PORT),
            timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&Req>,
    ) -> ClusterResult<Resp> {
        request_json(Method::POST, &self.address, path, body, self.timeout).await
    }
}

impl ClusterAgent for DaemonClient {
    fn create(
        &self,
        descriptor: NodeDescriptor,
    ) -> impl Future<Output = ClusterResult<Secret>> + Send {
        async move {
            let resp: CreateResponse = self
                .post(CREATE_PATH, Some(&CreateRequest { descriptor }))
                .await?;
            Ok(resp.secret)
        }
    }

    fn join(
        &self,
        secret: Secret,
        descriptor: NodeDescriptor,
        existing: Vec<NodeDescriptor>,
    ) -> impl Future<Output = ClusterResult<()>> + Send {
        async move {
            let request = JoinRequest {
                secret,
                descriptor,
                existing,
            };
            self.post(JOIN_PATH, Some(&request)).await
        }
    }

    fn shutdown(&self) -> impl Future<Output = ClusterResult<()>> + Send {
        self.post::<(), ()>(SHUTDOWN_PATH, None)
    }

    fn destroy(&self) -> impl Future<Output = ClusterResult<()>> + Send {
        self.post::<(), ()>(DESTROY_PATH, None)
    }

    fn diagnostics(&self) -> impl Future<Output = ClusterResult<Diagnostics>> + Send {
        request_json::<(), Diagnostics>(
            Method::GET,
            &self.address,
            DIAGNOSTICS_PATH,
            None,
            self.timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_fills_in_default_port() {
        assert_eq!(resolve_address("10.0.0.1", 8896), "10.0.0.1:8896");
        assert_eq!(resolve_address("10.0.0.1:9000", 8896), "10.0.0.1:9000");
        assert_eq!(resolve_address("::1", 8896), "[::1]:8896");
        assert_eq!(resolve_address("[::1]:9000", 8896), "[::1]:9000");
        assert_eq!(resolve_address("cluster1", 8896), "cluster1:8896");
        assert_eq!(resolve_address("cluster1:9000", 8896), "cluster1:9000");
    }

    #[tokio::test]
    async fn unreachable_daemon_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = DaemonClient::new(&addr.to_string(), Duration::from_secs(2));
        let err = client.diagnostics().await.unwrap_err();
        assert!(err.is_unreachable(), "unexpected error: {err}");
    }
}
