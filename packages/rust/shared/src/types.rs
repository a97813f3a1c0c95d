//! Core domain types for received linkbacks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::LinkbackError;

// ---------------------------------------------------------------------------
// ContentRef
// ---------------------------------------------------------------------------

/// Opaque identifier of a piece of local content (a node id, typically).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(String);

impl ContentRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for ContentRef {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ContentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ContentRef {
    type Err = LinkbackError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.contains('/') {
            return Err(LinkbackError::validation(format!(
                "invalid content id: {s:?}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Locale
// ---------------------------------------------------------------------------

/// A configured site language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    /// Language code (e.g. `en`).
    pub code: String,
    /// URL path prefix; empty for the default language.
    #[serde(default)]
    pub prefix: String,
}

impl Locale {
    pub fn new(code: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            prefix: prefix.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// LinkbackCandidate
// ---------------------------------------------------------------------------

/// An unverified linkback claim as handed over by an ingestion endpoint.
///
/// Empty `title`/`excerpt` mean "not supplied"; they are filled from the
/// source page during verification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkbackCandidate {
    /// Where the claim says the link lives.
    pub source_url: String,
    /// The local content being linked to.
    #[serde(default)]
    pub local_content_ref: Option<ContentRef>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    /// Protocol variant that produced the claim (pingback, webmention, ...).
    #[serde(default)]
    pub handler: Option<String>,
    /// Network origin of the submitter, if the ingestion layer knows it.
    #[serde(default)]
    pub origin: Option<String>,
}

impl LinkbackCandidate {
    /// Candidate for `source_url` → `content` produced by `handler`.
    pub fn new(
        source_url: impl Into<String>,
        content: impl Into<ContentRef>,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            local_content_ref: Some(content.into()),
            handler: Some(handler.into()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = excerpt.into();
        self
    }

    /// Whether title and excerpt are both already supplied.
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.excerpt.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// VerifiedLinkback / AcceptedRecord
// ---------------------------------------------------------------------------

/// A candidate whose required fields are present and whose content is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedLinkback {
    pub source_url: Url,
    pub content: ContentRef,
    pub handler: String,
    pub title: String,
    pub excerpt: String,
}

/// A linkback that passed every check, ready for the storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedRecord {
    /// Time-sortable record identifier.
    pub id: Uuid,
    #[serde(flatten)]
    pub linkback: VerifiedLinkback,
    /// Submitter origin (client address or hostname).
    pub origin: String,
    pub created_at: DateTime<Utc>,
    pub changed_at: DateTime<Utc>,
}

impl AcceptedRecord {
    /// Stamp a verified linkback with an id, origin and creation time.
    pub fn stamp(linkback: VerifiedLinkback, origin: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            linkback,
            origin: origin.into(),
            created_at: now,
            changed_at: now,
        }
    }

    pub fn title(&self) -> &str {
        &self.linkback.title
    }

    pub fn excerpt(&self) -> &str {
        &self.linkback.excerpt
    }
}
