//! Linkback validation pipeline: candidate → verified → accepted | rejected.
//!
//! One call to [`LinkbackValidator::validate`] is one verification attempt.
//! Steps run strictly in order and the first failing step is terminal:
//!
//! 1. Structural checks (handler, source URL, content reference)
//! 2. Content completion: fetch the source and verify the backlink, unless
//!    the candidate already carries a title and an excerpt
//! 3. Registration policy (duplicates, disallowed targets)
//! 4. Stamp origin and timestamps
//!
//! Nothing is shared between attempts, so a validator can serve concurrent
//! calls. Nothing is retried either.

use linkback_extract::Extraction;
use linkback_fetcher::Fetcher;
use linkback_routing::UrlVariantGenerator;
use linkback_shared::{
    AcceptedRecord, ContentRef, ExcerptOptions, LinkbackCandidate, RejectionError, RejectionKind,
    VerifiedLinkback,
};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::policy::RegistrationPolicy;

/// Verifies linkback candidates against their claimed source pages.
pub struct LinkbackValidator<F, P> {
    fetcher: F,
    variants: UrlVariantGenerator,
    policy: P,
    excerpt: ExcerptOptions,
    origin: Option<String>,
}

/// Required fields, once checked.
struct Structured {
    source_url: Url,
    content: ContentRef,
    handler: String,
}

impl<F: Fetcher, P: RegistrationPolicy> LinkbackValidator<F, P> {
    pub fn new(fetcher: F, variants: UrlVariantGenerator, policy: P) -> Self {
        Self {
            fetcher,
            variants,
            policy,
            excerpt: ExcerptOptions::default(),
            origin: None,
        }
    }

    /// Override the excerpt window.
    pub fn with_excerpt_options(mut self, excerpt: ExcerptOptions) -> Self {
        self.excerpt = excerpt;
        self
    }

    /// Network origin of the submitter, stamped on accepted records.
    ///
    /// Takes precedence over the candidate's own `origin` field.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Run one verification attempt.
    #[instrument(skip_all, fields(source_url = %candidate.source_url))]
    pub async fn validate(
        &self,
        candidate: LinkbackCandidate,
    ) -> Result<AcceptedRecord, RejectionError> {
        let outcome = self.run(candidate).await;
        match &outcome {
            Ok(record) => info!(
                id = %record.id,
                content = %record.linkback.content,
                handler = %record.linkback.handler,
                "linkback accepted"
            ),
            Err(rejection) => warn!(
                kind = %rejection.kind,
                code = rejection.code,
                cause = %rejection.cause,
                "linkback rejected"
            ),
        }
        outcome
    }

    async fn run(&self, candidate: LinkbackCandidate) -> Result<AcceptedRecord, RejectionError> {
        let Structured {
            source_url,
            content,
            handler,
        } = check_structure(&candidate)?;

        let LinkbackCandidate {
            mut title,
            mut excerpt,
            origin,
            ..
        } = candidate;

        if is_blank(&title) || is_blank(&excerpt) {
            let (found_title, found_excerpt) = self.fetch_and_verify(&source_url, &content).await?;
            if is_blank(&title) {
                title = found_title;
            }
            if is_blank(&excerpt) {
                excerpt = found_excerpt;
            }
        } else {
            debug!("title and excerpt supplied, skipping source fetch");
        }

        if is_blank(&excerpt) {
            return Err(RejectionError::new(
                RejectionKind::InvalidCandidate,
                "excerpt is required: the backlink on the source page is not inside a paragraph",
            ));
        }

        let linkback = VerifiedLinkback {
            source_url,
            content,
            handler,
            title,
            excerpt,
        };

        self.policy.check(&linkback).await?;

        let origin = self.origin.clone().or(origin).unwrap_or_default();
        Ok(AcceptedRecord::stamp(linkback, origin))
    }

    /// Fetch the source page and look for a link to any variant of `content`.
    async fn fetch_and_verify(
        &self,
        source_url: &Url,
        content: &ContentRef,
    ) -> Result<(String, String), RejectionError> {
        let body = self
            .fetcher
            .fetch(source_url)
            .await
            .map_err(|e| RejectionError::fetch_failed(source_url.as_str(), e))?;

        let variants = self.variants.generate(content, true);
        debug!(bytes = body.len(), variants = variants.len(), "verifying backlink");

        match linkback_extract::extract(
            &body,
            variants.as_slice(),
            source_url.as_str(),
            &self.excerpt,
        ) {
            Extraction::Found { title, excerpt } => Ok((title, excerpt)),
            Extraction::NotFound => Err(RejectionError::backlink_not_found(content)),
        }
    }
}

/// Collect every structural violation in one pass.
///
/// A missing handler wins over the other violations; they are still listed in
/// the cause.
fn check_structure(candidate: &LinkbackCandidate) -> Result<Structured, RejectionError> {
    let mut violations: Vec<String> = Vec::new();

    let handler = candidate
        .handler
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty());
    if handler.is_none() {
        violations.push("the linkback handler must be provided".into());
    }

    let source_url = if is_blank(&candidate.source_url) {
        violations.push("source URL is required".into());
        None
    } else {
        match Url::parse(candidate.source_url.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
            Ok(url) => {
                violations.push(format!("source URL must be http(s), got {}", url.scheme()));
                None
            }
            Err(e) => {
                violations.push(format!("source URL {:?} is malformed: {e}", candidate.source_url));
                None
            }
        }
    };

    if candidate.local_content_ref.is_none() {
        violations.push("local content reference is required".into());
    }

    match (handler, source_url, &candidate.local_content_ref) {
        (Some(handler), Some(source_url), Some(content)) => Ok(Structured {
            source_url,
            content: content.clone(),
            handler: handler.to_string(),
        }),
        (None, _, _) => Err(RejectionError::new(
            RejectionKind::MissingHandler,
            violations.join("; "),
        )),
        _ => Err(RejectionError::new(
            RejectionKind::InvalidCandidate,
            violations.join("; "),
        )),
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
