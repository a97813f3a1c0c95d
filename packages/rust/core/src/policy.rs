//! Registration policy: the storage-side checks a verified linkback must pass.
//!
//! The pipeline does not know how records are stored. It hands the verified
//! linkback to a [`RegistrationPolicy`] and surfaces whatever violation comes
//! back, code and cause untouched.

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;

use linkback_shared::{
    ContentRef, LinkbackError, RejectionError, RejectionKind, Result, VerifiedLinkback,
};
use serde::Deserialize;
use url::Url;

/// Duplicate and eligibility checks owned by the storage collaborator.
pub trait RegistrationPolicy: Send + Sync {
    /// Return the first violation, if any.
    fn check(
        &self,
        linkback: &VerifiedLinkback,
    ) -> impl Future<Output = std::result::Result<(), RejectionError>> + Send;
}

/// Checks `A` first, then `B`.
impl<A: RegistrationPolicy, B: RegistrationPolicy> RegistrationPolicy for (A, B) {
    async fn check(&self, linkback: &VerifiedLinkback) -> std::result::Result<(), RejectionError> {
        self.0.check(linkback).await?;
        self.1.check(linkback).await
    }
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl RegistrationPolicy for AllowAll {
    async fn check(&self, _linkback: &VerifiedLinkback) -> std::result::Result<(), RejectionError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SelfLinkPolicy
// ---------------------------------------------------------------------------

/// Rejects linkbacks whose source lives on the local site itself.
#[derive(Debug, Clone)]
pub struct SelfLinkPolicy {
    local_host: String,
}

impl SelfLinkPolicy {
    pub fn new(local_host: impl Into<String>) -> Self {
        Self {
            local_host: local_host.into().to_ascii_lowercase(),
        }
    }

    /// Build from the site's base URL.
    pub fn for_site(base_url: &Url) -> Result<Self> {
        base_url
            .host_str()
            .map(Self::new)
            .ok_or_else(|| LinkbackError::config(format!("URL has no host: {base_url}")))
    }
}

impl RegistrationPolicy for SelfLinkPolicy {
    async fn check(&self, linkback: &VerifiedLinkback) -> std::result::Result<(), RejectionError> {
        let source_host = linkback.source_url.host_str().unwrap_or_default();
        if source_host.eq_ignore_ascii_case(&self.local_host) {
            return Err(RejectionError::new(
                RejectionKind::LocalTargetNotAllowed,
                format!(
                    "content {} cannot receive a linkback from its own site ({source_host})",
                    linkback.content
                ),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// KnownLinkbacks
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct KnownEntry {
    source_url: Url,
    content: ContentRef,
}

/// In-memory set of already registered `(source URL, content)` claims.
#[derive(Debug, Clone, Default)]
pub struct KnownLinkbacks {
    known: HashSet<(String, ContentRef)>,
}

impl KnownLinkbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_url: &Url, content: ContentRef) -> bool {
        self.known.insert((source_url.to_string(), content))
    }

    pub fn contains(&self, source_url: &Url, content: &ContentRef) -> bool {
        self.known.contains(&(source_url.to_string(), content.clone()))
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Parse a JSON array of objects with `source_url` and `content` fields
    /// (accepted records qualify; extra fields are ignored).
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<KnownEntry> = serde_json::from_str(json)
            .map_err(|e| LinkbackError::validation(format!("invalid registry JSON: {e}")))?;
        let mut known = Self::new();
        for entry in entries {
            known.insert(&entry.source_url, entry.content);
        }
        Ok(known)
    }

    /// Load a registry file written as a JSON array.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LinkbackError::io(path, e))?;
        Self::from_json(&content)
    }
}

impl RegistrationPolicy for KnownLinkbacks {
    async fn check(&self, linkback: &VerifiedLinkback) -> std::result::Result<(), RejectionError> {
        if self.contains(&linkback.source_url, &linkback.content) {
            return Err(RejectionError::new(
                RejectionKind::AlreadyRegistered,
                format!(
                    "a linkback from {} to content {} is already registered",
                    linkback.source_url, linkback.content
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linkback(source: &str) -> VerifiedLinkback {
        VerifiedLinkback {
            source_url: Url::parse(source).unwrap(),
            content: ContentRef::from(42u64),
            handler: "pingback".into(),
            title: "t".into(),
            excerpt: "e".into(),
        }
    }

    #[tokio::test]
    async fn self_link_is_rejected() {
        let policy = SelfLinkPolicy::for_site(&Url::parse("https://MySite.test/").unwrap()).unwrap();
        let err = policy
            .check(&linkback("https://mysite.test/node/7"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, RejectionKind::LocalTargetNotAllowed);
        assert_eq!(err.code, 33);

        assert!(policy.check(&linkback("https://example.com/post")).await.is_ok());
    }

    #[tokio::test]
    async fn known_claim_is_rejected() {
        let mut known = KnownLinkbacks::new();
        assert!(known.insert(&Url::parse("http://example.com/post").unwrap(), ContentRef::from(42u64)));
        assert_eq!(known.len(), 1);

        let err = known
            .check(&linkback("http://example.com/post"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, RejectionKind::AlreadyRegistered);
        assert_eq!(err.code, 48);

        assert!(known.check(&linkback("http://example.com/other")).await.is_ok());
    }

    #[test]
    fn registry_parses_accepted_records() {
        let json = r#"[
            {"id": "0190a5a0-0000-7000-8000-000000000000", "source_url": "http://example.com/post",
             "content": "42", "handler": "webmention", "title": "My Post", "excerpt": "x",
             "origin": "203.0.113.9", "created_at": "2024-01-01T00:00:00Z",
             "changed_at": "2024-01-01T00:00:00Z"},
            {"source_url": "http://example.com/post", "content": "42"},
            {"source_url": "http://example.com/other", "content": "7"}
        ]"#;
        let known = KnownLinkbacks::from_json(json).unwrap();
        assert_eq!(known.len(), 2);
        assert!(known.contains(&Url::parse("http://example.com/other").unwrap(), &ContentRef::from(7u64)));

        assert!(KnownLinkbacks::from_json("{not json").is_err());
    }

    #[tokio::test]
    async fn tuple_policy_reports_first_violation() {
        let mut known = KnownLinkbacks::new();
        known.insert(&Url::parse("https://mysite.test/node/7").unwrap(), ContentRef::from(42u64));
        let policy = (SelfLinkPolicy::new("mysite.test"), known);

        let err = policy
            .check(&linkback("https://mysite.test/node/7"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, RejectionKind::LocalTargetNotAllowed);

        assert!(policy.check(&linkback("https://example.com/")).await.is_ok());
        assert!(AllowAll.check(&linkback("https://mysite.test/")).await.is_ok());
    }
}
