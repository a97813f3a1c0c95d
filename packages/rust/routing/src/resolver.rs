//! Content-to-path resolution.

use std::collections::BTreeMap;

use linkback_shared::{ContentRef, ID_PLACEHOLDER, Locale};

/// Resolves the site-relative path of a piece of content.
///
/// The returned path starts with `/`, includes the locale prefix when one is
/// given, and excludes the site's base path.
pub trait RouteResolver: Send + Sync {
    fn path(&self, content: &ContentRef, locale: Option<&Locale>) -> String;

    /// Human-readable resolver name for tracing.
    fn name(&self) -> &str;
}

/// Pattern-based routing (`/node/{id}`) with optional per-id path aliases.
#[derive(Debug, Clone)]
pub struct PatternRoutes {
    pattern: String,
    aliases: BTreeMap<String, String>,
}

impl PatternRoutes {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            aliases: BTreeMap::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: BTreeMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    fn unprefixed(&self, content: &ContentRef) -> String {
        match self.aliases.get(content.as_str()) {
            Some(alias) if alias.starts_with('/') => alias.clone(),
            Some(alias) => format!("/{alias}"),
            None => self.pattern.replace(ID_PLACEHOLDER, content.as_str()),
        }
    }
}

impl RouteResolver for PatternRoutes {
    fn path(&self, content: &ContentRef, locale: Option<&Locale>) -> String {
        let path = self.unprefixed(content);
        match locale.map(|l| l.prefix.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("/{prefix}{path}"),
            _ => path,
        }
    }

    fn name(&self) -> &str {
        "pattern"
    }
}
