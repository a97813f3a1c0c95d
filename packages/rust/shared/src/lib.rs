//! Shared types, error model, and configuration for the linkback receiver.
//!
//! This crate is the foundation depended on by all other linkback crates.
//! It provides:
//! - [`LinkbackError`], [`FetchError`], [`RejectionError`]: the error model
//! - Domain types ([`LinkbackCandidate`], [`AcceptedRecord`], [`ContentRef`], [`Locale`])
//! - Configuration ([`AppConfig`], runtime options, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExcerptConfig, ExcerptOptions, FetchConfig, FetchOptions, ID_PLACEHOLDER,
    SiteConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{FetchError, LinkbackError, RejectionError, RejectionKind, Result};
pub use types::{AcceptedRecord, ContentRef, LinkbackCandidate, Locale, VerifiedLinkback};
