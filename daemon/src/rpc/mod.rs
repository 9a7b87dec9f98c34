/// Client for the Transmission RPC endpoint.
///
/// Transmission gates every call behind a session id: the first request (or any
/// request carrying a stale id) is answered with `409 Conflict` and a fresh id in
/// the `X-Transmission-Session-Id` header. The client stores that id and resends
/// the identical body exactly once. A second 409 is a [`RpcError::Session`].
pub mod error;
pub mod protocol;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::TransmissionConfig;
pub use error::{RpcError, RpcResult};
use protocol::{
    Method, RpcRequest, RpcResponse, SessionStats, TorrentGetArguments, TorrentInfo,
    RESULT_SUCCESS, SESSION_ID_HEADER,
};

/// Upper bound on a single HTTP round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Operations the agent needs from the download daemon.
///
/// Methods take `&mut self`: one call is in flight per instance at a time.
#[async_trait]
pub trait TorrentRpc: Send {
    /// Aggregate counters (`session-stats`).
    async fn session_stats(&mut self) -> RpcResult<SessionStats>;

    /// `{id, status}` for every torrent (`torrent-get`).
    async fn torrent_statuses(&mut self) -> RpcResult<Vec<TorrentInfo>>;

    /// `torrent-start` with no `ids`, i.e. every torrent.
    async fn start_all(&mut self) -> RpcResult<()>;

    /// `torrent-stop` with no `ids`, i.e. every torrent.
    async fn stop_all(&mut self) -> RpcResult<()>;

    /// Connectivity check used to validate configuration.
    async fn probe(&mut self) -> bool {
        match self.session_stats().await {
            Ok(_) => true,
            Err(e) => {
                debug!("probe failed: {e}");
                false
            }
        }
    }
}

/// Session credential handshake state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    NoCredential,
    HaveCredential(String),
}

/// Outcome of one HTTP exchange, before any retry decision.
enum Attempt {
    Done(Vec<u8>),
    /// 409 with the session id the server offered, if any.
    Conflict(Option<String>),
}

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    auth: Option<(String, String)>,
    session: SessionState,
}

impl RpcClient {
    pub fn new(config: &TransmissionConfig) -> RpcResult<Self> {
        Self::with_timeout(config, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(config: &TransmissionConfig, timeout: Duration) -> RpcResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: config.rpc_url(),
            auth: config
                .credentials()
                .map(|(u, p)| (u.to_string(), p.to_string())),
            session: SessionState::NoCredential,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Sends `request`, performing the session handshake at most once.
    pub async fn call<A: DeserializeOwned>(
        &mut self,
        request: &RpcRequest,
    ) -> RpcResult<RpcResponse<A>> {
        let body = serde_json::to_vec(request)?;

        let bytes = match self.attempt(&body).await? {
            Attempt::Done(bytes) => bytes,
            Attempt::Conflict(None) => {
                warn!("409 from {} without a session id header", self.url);
                return Err(RpcError::Protocol {
                    status: StatusCode::CONFLICT.as_u16(),
                });
            }
            Attempt::Conflict(Some(token)) => {
                debug!("acquired new Transmission session id");
                self.session = SessionState::HaveCredential(token);
                match self.attempt(&body).await? {
                    Attempt::Done(bytes) => bytes,
                    Attempt::Conflict(_) => return Err(RpcError::Session),
                }
            }
        };

        let response: RpcResponse<A> = serde_json::from_slice(&bytes)?;
        if response.result != RESULT_SUCCESS {
            warn!(
                method = request.method.as_str(),
                "Transmission replied with result {:?}", response.result
            );
        }
        Ok(response)
    }

    /// One POST with whatever credential is currently held.
    async fn attempt(&self, body: &[u8]) -> RpcResult<Attempt> {
        let mut req = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        if let SessionState::HaveCredential(token) = &self.session {
            req = req.header(SESSION_ID_HEADER, token);
        }
        if let Some((user, pass)) = &self.auth {
            req = req.basic_auth(user, Some(pass));
        }

        let resp = req.send().await?;
        let status = resp.status();

        if status == StatusCode::CONFLICT {
            let token = resp
                .headers()
                .get(SESSION_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned);
            return Ok(Attempt::Conflict(token));
        }
        if !status.is_success() {
            return Err(RpcError::Protocol {
                status: status.as_u16(),
            });
        }

        Ok(Attempt::Done(resp.bytes().await?.to_vec()))
    }

    async fn require_arguments<A: DeserializeOwned>(&mut self, request: RpcRequest) -> RpcResult<A> {
        self.call::<A>(&request).await?.arguments.ok_or_else(|| {
            RpcError::Decode(format!("{} reply has no arguments", request.method.as_str()))
        })
    }
}

#[async_trait]
impl TorrentRpc for RpcClient {
    async fn session_stats(&mut self) -> RpcResult<SessionStats> {
        self.require_arguments(RpcRequest::new(Method::SessionStats))
            .await
    }

    async fn torrent_statuses(&mut self) -> RpcResult<Vec<TorrentInfo>> {
        let args: TorrentGetArguments = self
            .require_arguments(RpcRequest::new(Method::TorrentGet).with_fields(&["id", "status"]))
            .await?;
        Ok(args.torrents)
    }

    async fn start_all(&mut self) -> RpcResult<()> {
        self.call::<IgnoredAny>(&RpcRequest::new(Method::TorrentStart))
            .await
            .map(|_| ())
    }

    async fn stop_all(&mut self) -> RpcResult<()> {
        self.call::<IgnoredAny>(&RpcRequest::new(Method::TorrentStop))
            .await
            .map(|_| ())
    }
}
