//! Linkback verification core.
//!
//! Wires the URL variant generator, the remote fetcher and the backlink
//! extractor into [`LinkbackValidator`], and defines the
//! [`RegistrationPolicy`] contract for storage-side checks.

pub mod pipeline;
pub mod policy;

pub use pipeline::LinkbackValidator;
pub use policy::{AllowAll, KnownLinkbacks, RegistrationPolicy, SelfLinkPolicy};
