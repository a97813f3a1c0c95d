//! Error types for the linkback receiver.
//!
//! Library crates use these via `thiserror`; the CLI wraps them with
//! `color-eyre` for rich diagnostics.
//!
//! Two families live here:
//! - [`LinkbackError`]: infrastructure failures (config, I/O, client setup).
//! - [`RejectionError`]: the single structured outcome of a rejected
//!   verification attempt, with a stable numeric code.

use std::path::PathBuf;

use serde::Serialize;

/// Infrastructure error type for linkback operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkbackError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// HTTP client construction error.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad id, malformed registry file, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LinkbackError>;

impl LinkbackError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// FetchError
// ---------------------------------------------------------------------------

/// Failure retrieving the claimed source page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The server answered, but not with a success status.
    #[error("HTTP error \"{status} {reason}\"")]
    Http { status: u16, reason: String },

    /// Connection, DNS, TLS, timeout or body-read failure.
    #[error("transport error \"{message}\"")]
    Transport { message: String },

    /// The body exceeded the configured size cap.
    #[error("response exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

impl FetchError {
    /// Status code for HTTP-level failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// RejectionError
// ---------------------------------------------------------------------------

/// Why a linkback claim was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// The protocol handler field was not supplied.
    MissingHandler,
    /// Source URL missing or malformed, or no local content reference.
    InvalidCandidate,
    /// The source page could not be retrieved.
    RemoteFetchFailed,
    /// The source page does not link to the local content.
    BacklinkNotFound,
    /// The same claim is already on record.
    AlreadyRegistered,
    /// The local target may not receive this linkback.
    LocalTargetNotAllowed,
}

impl RejectionKind {
    /// Stable code for this kind, following the pingback fault-code table.
    pub fn default_code(self) -> i32 {
        match self {
            Self::MissingHandler | Self::InvalidCandidate => 0,
            Self::RemoteFetchFailed => 16,
            Self::BacklinkNotFound => 17,
            Self::LocalTargetNotAllowed => 33,
            Self::AlreadyRegistered => 48,
        }
    }

    /// Whether a later attempt with the same input could succeed.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RemoteFetchFailed)
    }
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MissingHandler => "missing handler",
            Self::InvalidCandidate => "invalid candidate",
            Self::RemoteFetchFailed => "remote fetch failed",
            Self::BacklinkNotFound => "backlink not found",
            Self::AlreadyRegistered => "already registered",
            Self::LocalTargetNotAllowed => "local target not allowed",
        };
        f.write_str(s)
    }
}

/// Terminal rejection of one verification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind} (code {code}): {cause}")]
pub struct RejectionError {
    /// Rejection category.
    pub kind: RejectionKind,
    /// Stable numeric identifier.
    pub code: i32,
    /// Human-readable cause.
    pub cause: String,
    /// Underlying fetch failure, for [`RejectionKind::RemoteFetchFailed`].
    #[serde(skip)]
    pub fetch: Option<FetchError>,
}

impl RejectionError {
    /// Build a rejection with the kind's default code.
    pub fn new(kind: RejectionKind, cause: impl Into<String>) -> Self {
        Self::with_code(kind, kind.default_code(), cause)
    }

    /// Build a rejection carrying an explicit code (e.g. from a storage policy).
    pub fn with_code(kind: RejectionKind, code: i32, cause: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            cause: cause.into(),
            fetch: None,
        }
    }

    pub fn missing_handler() -> Self {
        Self::new(
            RejectionKind::MissingHandler,
            "the linkback handler must be provided",
        )
    }

    pub fn fetch_failed(source_url: &str, err: FetchError) -> Self {
        let mut rejection = Self::new(
            RejectionKind::RemoteFetchFailed,
            format!("failed to fetch {source_url}: {err}"),
        );
        rejection.fetch = Some(err);
        rejection
    }

    pub fn backlink_not_found(content: impl std::fmt::Display) -> Self {
        Self::new(
            RejectionKind::BacklinkNotFound,
            format!("no link found in source url referencing content with id {content}"),
        )
    }

    /// HTTP status of the failed fetch, if any.
    pub fn http_status(&self) -> Option<u16> {
        self.fetch.as_ref().and_then(FetchError::status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = LinkbackError::config("base_url is not absolute");
        assert_eq!(err.to_string(), "config error: base_url is not absolute");

        let err = LinkbackError::validation("content id must not be empty");
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn rejection_codes_are_stable() {
        assert_eq!(RejectionKind::MissingHandler.default_code(), 0);
        assert_eq!(RejectionKind::RemoteFetchFailed.default_code(), 16);
        assert_eq!(RejectionKind::BacklinkNotFound.default_code(), 17);
        assert_eq!(RejectionKind::LocalTargetNotAllowed.default_code(), 33);
        assert_eq!(RejectionKind::AlreadyRegistered.default_code(), 48);
    }

    #[test]
    fn fetch_rejection_keeps_status() {
        let err = RejectionError::fetch_failed(
            "http://example.com/post",
            FetchError::Http {
                status: 404,
                reason: "Not Found".into(),
            },
        );
        assert_eq!(err.kind, RejectionKind::RemoteFetchFailed);
        assert_eq!(err.code, 16);
        assert_eq!(err.http_status(), Some(404));
        assert!(err.to_string().contains("404 Not Found"));
        assert!(err.kind.is_transient());
    }

    #[test]
    fn explicit_code_is_preserved() {
        let err = RejectionError::with_code(RejectionKind::AlreadyRegistered, 4801, "dup");
        assert_eq!(err.code, 4801);
        assert_eq!(err.http_status(), None);
    }

    #[test]
    fn rejection_serializes_without_fetch_detail() {
        let err = RejectionError::missing_handler();
        let json = serde_json::to_value(&err).expect("serialize");
        assert_eq!(json["kind"], "missing_handler");
        assert_eq!(json["code"], 0);
        assert!(json.get("fetch").is_none());
    }
}
