use crate::net::TransportError;
use crate::session::SessionState;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed json envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed binary envelope: {0}")]
    Binary(rkyv::rancor::Error),
    #[error("unknown envelope tag {0:?}")]
    UnknownTag(String),
    #[error("`{tag}` envelope is missing required field `{field}`")]
    MissingRequiredField {
        tag: &'static str,
        field: &'static str,
    },
    #[error("`{tag}` envelope has invalid field `{field}`: {reason}")]
    InvalidField {
        tag: &'static str,
        field: &'static str,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("binary serialization failed: {0}")]
    Binary(rkyv::rancor::Error),
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{tag}` envelope has non-finite field `{field}`")]
    NonFinite {
        tag: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Player,
    Resource,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Player => "player",
            IndexKind::Resource => "resource",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("`{tag}` is not valid while {state:?}")]
    UnexpectedMessageForState {
        tag: &'static str,
        state: SessionState,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{} index {index} out of range (have {len})", kind.as_str())]
    IndexOutOfRange {
        kind: IndexKind,
        index: usize,
        len: usize,
    },
    #[error("session is closed")]
    Closed,
}
