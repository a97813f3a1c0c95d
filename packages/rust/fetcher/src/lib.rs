//! Retrieval of the remote page a linkback claims to come from.
//!
//! [`HttpFetcher`] issues a single GET with a text-oriented `Accept` header,
//! a bounded timeout and a body-size cap, and maps every failure onto
//! [`FetchError`]. It never retries: retry policy belongs to the caller.
//! Dropping the returned future aborts the request.

use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;

use linkback_shared::{FetchError, FetchOptions, LinkbackError, Result};
use reqwest::Client;
use reqwest::header::ACCEPT;
use reqwest::redirect::Policy;
use url::Url;

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("linkback-receiver/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Fetcher trait
// ---------------------------------------------------------------------------

/// Retrieves the raw body of a source page.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &Url) -> impl Future<Output = std::result::Result<String, FetchError>> + Send;
}

impl<T: Fetcher> Fetcher for Arc<T> {
    fn fetch(&self, url: &Url) -> impl Future<Output = std::result::Result<String, FetchError>> + Send {
        (**self).fetch(url)
    }
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    accept: String,
    max_response_bytes: u64,
    guard: Option<TargetGuard>,
}

/// Predicate naming URLs that must never be requested.
type TargetGuard = fn(&Url) -> bool;

impl HttpFetcher {
    /// Build a fetcher with its own HTTP client.
    pub fn new(opts: &FetchOptions) -> Result<Self> {
        let guard = (!opts.allow_private_hosts).then_some(is_ssrf_target as TargetGuard);
        Self::with_guard(opts, guard)
    }

    /// The guard applies to the requested URL and to every redirect hop.
    fn with_guard(opts: &FetchOptions, guard: Option<TargetGuard>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect_policy(opts.max_redirects, guard))
            .timeout(opts.timeout)
            .build()
            .map_err(|e| LinkbackError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            accept: opts.accept.clone(),
            max_response_bytes: opts.max_response_bytes,
            guard,
        })
    }
}

/// Same cap as `Policy::limited`, but every hop is re-checked against `guard`.
fn redirect_policy(max_redirects: usize, guard: Option<TargetGuard>) -> Policy {
    Policy::custom(move |attempt| {
        if guard.is_some_and(|blocked| blocked(attempt.url())) {
            let message = format!(
                "refusing to follow redirect to a local or private address: {}",
                attempt.url()
            );
            attempt.error(message)
        } else if attempt.previous().len() > max_redirects {
            attempt.error(format!("too many redirects (limit {max_redirects})"))
        } else {
            attempt.follow()
        }
    })
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> std::result::Result<String, FetchError> {
        if self.guard.is_some_and(|blocked| blocked(url)) {
            return Err(FetchError::Transport {
                message: format!("{url}: refusing to fetch a local or private address"),
            });
        }

        let mut response = self
            .client
            .get(url.as_str())
            .header(ACCEPT, self.accept.as_str())
            .send()
            .await
            .map_err(|e| transport(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_response_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_response_bytes,
                });
            }
        }

        // Content-Length may be absent or wrong; enforce the cap while reading.
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| transport(url, &e))? {
            if (body.len() + chunk.len()) as u64 > self.max_response_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_response_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn transport(url: &Url, err: &reqwest::Error) -> FetchError {
    let message = if err.is_timeout() {
        format!("{url}: timed out")
    } else if err.is_redirect() {
        // The policy's own message sits in the source chain.
        match std::error::Error::source(err) {
            Some(cause) => format!("{url}: {cause}"),
            None => format!("{url}: {err}"),
        }
    } else {
        format!("{url}: {err}")
    };
    FetchError::Transport { message }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 0.0.0.0/8 "this network"
                || v4.octets()[0] == 0
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                // ::ffff:a.b.c.d mapped and ::a.b.c.d compatible forms
                || v6
                    .to_ipv4()
                    .is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}
