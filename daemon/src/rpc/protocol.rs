/// Wire types for the Transmission JSON-RPC dialect.
///
/// Every call is a single `{"method": ..., "arguments": {...}}` object POSTed to
/// `/transmission/rpc`. Replies carry `{"arguments": {...}, "result": "success"}`.
use serde::{Deserialize, Serialize};

/// Header carrying the session credential in both directions.
pub const SESSION_ID_HEADER: &str = "X-Transmission-Session-Id";
/// Fixed RPC path on the daemon.
pub const RPC_PATH: &str = "/transmission/rpc";
/// Value of `result` on a successful call.
pub const RESULT_SUCCESS: &str = "success";

/// RPC methods consumed by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    SessionStats,
    TorrentGet,
    TorrentStart,
    TorrentStop,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::SessionStats => "session-stats",
            Method::TorrentGet => "torrent-get",
            Method::TorrentStart => "torrent-start",
            Method::TorrentStop => "torrent-stop",
        }
    }
}

/// Request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub method: Method,
    pub arguments: RequestArguments,
}

impl RpcRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            arguments: RequestArguments::default(),
        }
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.arguments.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }
}

/// Optional method arguments.
///
/// `ids: None` is omitted from the payload entirely, which the daemon reads as
/// "every torrent". Sending `null` or `[]` would mean something else.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

/// Response envelope. `arguments` is absent on some error replies.
#[derive(Debug, Deserialize)]
pub struct RpcResponse<A> {
    pub arguments: Option<A>,
    #[serde(default)]
    pub result: String,
}

/// Arguments of a `session-stats` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub active_torrent_count: u32,
    #[serde(default)]
    pub download_speed: i64,
    #[serde(default)]
    pub upload_speed: i64,
}

/// Arguments of a `torrent-get` reply.
#[derive(Debug, Deserialize)]
pub struct TorrentGetArguments {
    pub torrents: Vec<TorrentInfo>,
}

/// Minimal per-torrent row requested with `fields: ["id", "status"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TorrentInfo {
    pub id: i64,
    pub status: TorrentState,
}

/// Transmission's numeric torrent status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "i64")]
pub enum TorrentState {
    Stopped,
    CheckWait,
    Checking,
    DownloadWait,
    Downloading,
    SeedWait,
    Seeding,
    Unknown(i64),
}

impl From<i64> for TorrentState {
    fn from(code: i64) -> Self {
        match code {
            0 => TorrentState::Stopped,
            1 => TorrentState::CheckWait,
            2 => TorrentState::Checking,
            3 => TorrentState::DownloadWait,
            4 => TorrentState::Downloading,
            5 => TorrentState::SeedWait,
            6 => TorrentState::Seeding,
            other => TorrentState::Unknown(other),
        }
    }
}

impl TorrentState {
    /// True for every state other than stopped.
    pub fn is_running(self) -> bool {
        !matches!(self, TorrentState::Stopped)
    }
}
