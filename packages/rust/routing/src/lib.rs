//! Local URL variants for a piece of content.
//!
//! A remote page may link to local content in several equivalent forms:
//! absolute or site-relative, with or without a language prefix, and with the
//! final path segment percent-encoded by whoever wrote the link. The
//! [`UrlVariantGenerator`] produces all of them, in a deterministic order, so
//! the verifier can match `href` attributes exactly.

mod resolver;

use linkback_shared::{AppConfig, ContentRef, LinkbackError, Locale, Result};
use tracing::debug;
use url::Url;

pub use resolver::{PatternRoutes, RouteResolver};

// ---------------------------------------------------------------------------
// UrlVariantSet
// ---------------------------------------------------------------------------

/// Ordered, duplicate-free collection of URL strings for one content ref.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlVariantSet {
    urls: Vec<String>,
}

impl UrlVariantSet {
    /// Append `url` unless it is already present.
    fn push(&mut self, url: String) {
        if !self.urls.contains(&url) {
            self.urls.push(url);
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.iter().any(|u| u == url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.urls
    }

    pub fn into_vec(self) -> Vec<String> {
        self.urls
    }
}

impl<'a> IntoIterator for &'a UrlVariantSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.urls.iter()
    }
}

// ---------------------------------------------------------------------------
// UrlVariantGenerator
// ---------------------------------------------------------------------------

/// Builds every URL under which local content may legitimately be linked.
pub struct UrlVariantGenerator {
    /// `scheme://host[:port]` of the local site.
    origin: String,
    /// Sub-path the site is served under, without trailing slash (often empty).
    base_path: String,
    locales: Vec<Locale>,
    resolver: Box<dyn RouteResolver>,
}

impl UrlVariantGenerator {
    /// Create a generator for the site at `base_url`.
    pub fn new(
        base_url: &Url,
        locales: Vec<Locale>,
        resolver: Box<dyn RouteResolver>,
    ) -> Result<Self> {
        if locales.is_empty() {
            return Err(LinkbackError::config("at least one locale is required"));
        }
        Ok(Self {
            origin: origin_url(base_url)?,
            base_path: base_url.path().trim_end_matches('/').to_string(),
            locales,
            resolver,
        })
    }

    /// Create a generator from the `[site]` config section.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let base_url = Url::parse(&config.site.base_url).map_err(|e| {
            LinkbackError::config(format!("site.base_url {:?}: {e}", config.site.base_url))
        })?;
        let routes = PatternRoutes::new(&config.site.route_pattern)
            .with_aliases(config.site.aliases.clone());
        Self::new(&base_url, config.site.locales.clone(), Box::new(routes))
    }

    /// The local site's origin, e.g. `https://mysite.test`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn locales(&self) -> &[Locale] {
        &self.locales
    }

    /// Site-relative URL for `content`, optionally localized.
    pub fn relative_url(&self, content: &ContentRef, locale: Option<&Locale>) -> String {
        format!("{}{}", self.base_path, self.resolver.path(content, locale))
    }

    /// Absolute URL for `content`, optionally localized.
    pub fn absolute_url(&self, content: &ContentRef, locale: Option<&Locale>) -> String {
        format!("{}{}", self.origin, self.relative_url(content, locale))
    }

    /// Produce the variant set for `content`.
    ///
    /// Without `include_all_locales` this is just the absolute canonical URL.
    /// With it: relative canonical, absolute canonical, then an absolute and a
    /// relative URL per configured locale, then each of those with its final
    /// path segment percent-encoded.
    pub fn generate(&self, content: &ContentRef, include_all_locales: bool) -> UrlVariantSet {
        let mut set = UrlVariantSet::default();

        if !include_all_locales {
            set.push(self.absolute_url(content, None));
            return set;
        }

        set.push(self.relative_url(content, None));
        set.push(self.absolute_url(content, None));
        for locale in &self.locales {
            set.push(self.absolute_url(content, Some(locale)));
            set.push(self.relative_url(content, Some(locale)));
        }

        let plain = set.urls.clone();
        for url in plain {
            set.push(encode_last_segment(&url));
        }

        debug!(
            resolver = self.resolver.name(),
            %content,
            variants = set.len(),
            "generated url variants"
        );
        set
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract the origin (scheme + host + port) from a URL.
fn origin_url(url: &Url) -> Result<String> {
    let scheme = url.scheme();
    let host = url
        .host_str()
        .ok_or_else(|| LinkbackError::config(format!("URL has no host: {url}")))?;

    match url.port() {
        Some(port) => Ok(format!("{scheme}://{host}:{port}")),
        None => Ok(format!("{scheme}://{host}")),
    }
}

/// Form-encode the part after the last `/` (space becomes `+`).
pub fn encode_last_segment(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((head, last)) => format!("{head}/{}", form_encode(last)),
        None => form_encode(url),
    }
}

/// `application/x-www-form-urlencoded` with `*` escaped too, so only
/// alphanumerics and `-_.` pass through unchanged.
fn form_encode(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn generator(base: &str, locales: Vec<Locale>) -> UrlVariantGenerator {
        UrlVariantGenerator::new(
            &Url::parse(base).unwrap(),
            locales,
            Box::new(PatternRoutes::new("/node/{id}")),
        )
        .unwrap()
    }

    fn two_locales() -> Vec<Locale> {
        vec![Locale::new("en", ""), Locale::new("fr", "fr")]
    }

    #[test]
    fn single_variant_is_absolute_canonical() {
        let generator = generator("https://mysite.test", two_locales());
        let set = generator.generate(&ContentRef::from(42u64), false);
        assert_eq!(set.as_slice(), ["https://mysite.test/node/42"]);
    }

    #[test]
    fn all_locales_order_is_deterministic() {
        let generator = generator("https://mysite.test", two_locales());
        let set = generator.generate(&ContentRef::from(42u64), true);
        assert_eq!(
            set.as_slice(),
            [
                "/node/42",
                "https://mysite.test/node/42",
                "https://mysite.test/fr/node/42",
                "/fr/node/42",
            ]
        );
    }

    #[test]
    fn all_locales_is_superset_of_single() {
        let generator = generator("http://localhost:8080/", two_locales());
        for id in [1u64, 42, 9000] {
            let content = ContentRef::from(id);
            let all = generator.generate(&content, true);
            for url in &generator.generate(&content, false) {
                assert!(all.contains(url), "{url} missing from {all:?}");
            }
        }
    }

    #[test]
    fn encoded_forms_follow_plain_forms() {
        let mut aliases = BTreeMap::new();
        aliases.insert("7".to_string(), "/blog/café au lait".to_string());
        let generator = UrlVariantGenerator::new(
            &Url::parse("https://mysite.test").unwrap(),
            two_locales(),
            Box::new(PatternRoutes::new("/node/{id}").with_aliases(aliases)),
        )
        .unwrap();

        let set = generator.generate(&ContentRef::from(7u64), true);
        assert_eq!(
            set.as_slice(),
            [
                "/blog/café au lait",
                "https://mysite.test/blog/café au lait",
                "https://mysite.test/fr/blog/café au lait",
                "/fr/blog/café au lait",
                "/blog/caf%C3%A9+au+lait",
                "https://mysite.test/blog/caf%C3%A9+au+lait",
                "https://mysite.test/fr/blog/caf%C3%A9+au+lait",
                "/fr/blog/caf%C3%A9+au+lait",
            ]
        );
        for url in set.iter() {
            assert!(set.contains(&encode_last_segment(url)));
        }
    }

    #[test]
    fn base_path_prefixes_relative_urls() {
        let generator = generator("https://example.org/site/", vec![Locale::new("de", "de")]);
        let content = ContentRef::from(3u64);
        assert_eq!(generator.relative_url(&content, None), "/site/node/3");
        assert_eq!(
            generator.absolute_url(&content, generator.locales().first()),
            "https://example.org/site/de/node/3"
        );
        assert_eq!(generator.origin(), "https://example.org");
    }

    #[test]
    fn from_config_uses_site_section() {
        let mut config = AppConfig::default();
        config.site.base_url = "https://mysite.test:8443".into();
        config.site.route_pattern = "/content/{id}".into();
        let generator = UrlVariantGenerator::from_config(&config).unwrap();
        let set = generator.generate(&ContentRef::from(5u64), false);
        assert_eq!(set.as_slice(), ["https://mysite.test:8443/content/5"]);
    }

    #[test]
    fn rejects_empty_locale_list() {
        let result = UrlVariantGenerator::new(
            &Url::parse("https://mysite.test").unwrap(),
            Vec::new(),
            Box::new(PatternRoutes::new("/node/{id}")),
        );
        assert!(result.is_err());
    }

    #[test]
    fn encode_last_segment_only_touches_tail() {
        assert_eq!(encode_last_segment("/a b/c d"), "/a b/c+d");
        assert_eq!(encode_last_segment("https://x.test/node/42"), "https://x.test/node/42");
        assert_eq!(encode_last_segment("/node/"), "/node/");
        assert_eq!(encode_last_segment("/tags/a*b~c"), "/tags/a%2Ab%7Ec");
        assert_eq!(encode_last_segment("/x/a-b_c.d"), "/x/a-b_c.d");
    }
}
