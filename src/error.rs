use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = PictError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PictError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("download failed with status {status}")]
    DownloadFailed { status: StatusCode },

    #[error("{kind} upload failed with status {status}")]
    UploadFailed {
        kind: UploadKind,
        status: StatusCode,
    },

    #[error("channel token RPC failed: {0}")]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Which OBS upload endpoint rejected the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    ProfilePicture,
    TalkObject,
    HomeObject,
}

impl std::fmt::Display for UploadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadKind::ProfilePicture => write!(f, "profile picture"),
            UploadKind::TalkObject => write!(f, "talk object"),
            UploadKind::HomeObject => write!(f, "home object"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RpcError {
    /// Framing, sequence id, method name or application exception errors
    /// reported by the Thrift protocol layer.
    #[error(transparent)]
    Thrift(#[from] thrift::Error),

    #[error("channel exception (code {code}): {reason}")]
    Channel { code: i32, reason: String },

    #[error("{method}: reply carried no result")]
    MissingResult { method: String },

    #[error("transport returned status {0}")]
    Transport(StatusCode),
}
