use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unreachable,
    UpstreamProtocolError,
}

/// Terminal outcome of a retrieval that produced no usable match set.
///
/// Every variant discards whatever was accumulated before it occurred.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("quotes upstream unreachable: {detail}")]
    Unreachable { detail: String },
    #[error("quotes upstream responded with status {status}")]
    UpstreamStatus { status: u16 },
    #[error("quotes upstream returned a malformed body (status {status}): {detail}")]
    MalformedBody { status: u16, detail: String },
}

impl RetrievalError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unreachable { .. } => FailureKind::Unreachable,
            Self::UpstreamStatus { .. } | Self::MalformedBody { .. } => {
                FailureKind::UpstreamProtocolError
            }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unreachable { .. } => None,
            Self::UpstreamStatus { status } | Self::MalformedBody { status, .. } => Some(*status),
        }
    }

    pub fn malformed(status: u16, detail: impl Into<String>) -> Self {
        Self::MalformedBody { status, detail: detail.into() }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self::Unreachable { detail: detail.into() }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{FailureKind, RetrievalError};

    #[test]
    fn transport_failures_classify_as_unreachable() {
        let error = RetrievalError::unreachable("connection refused");

        assert_eq!(error.kind(), FailureKind::Unreachable);
        assert_eq!(error.status(), None);
    }

    #[test]
    fn bad_status_and_bad_body_share_protocol_kind() {
        let status = RetrievalError::UpstreamStatus { status: 401 };
        let body = RetrievalError::malformed(200, "`Data` is null");

        assert_eq!(status.kind(), FailureKind::UpstreamProtocolError);
        assert_eq!(body.kind(), FailureKind::UpstreamProtocolError);
        assert_eq!(status.status(), Some(401));
        assert_eq!(body.status(), Some(200));
    }

    #[test]
    fn display_names_the_upstream_status() {
        let error = RetrievalError::UpstreamStatus { status: 503 };
        assert_eq!(error.to_string(), "quotes upstream responded with status 503");
    }
}
