//! `clearlydefined` is a rate-limit-aware client for the
//! [ClearlyDefined](https://clearlydefined.io) definitions service, built for
//! enriching SBOM components with declared-license data.
//!
//! Requests are answered from a shared content store when possible and
//! otherwise queued behind a single coordinator that paces dispatch by the
//! quota the service declares through its `x-ratelimit-*` response headers.
//! Confirmed-absent definitions are cached negatively, so a 404 is fetched at
//! most once per store.
//!
//! ```no_run
//! use std::sync::Arc;
//! use clearlydefined::{ClientBuilder, Component, DiskCache};
//! use url::Url;
//!
//! #[derive(Debug, Default)]
//! struct BomComponent {
//!     properties: Vec<(String, String)>,
//! }
//!
//! impl Component for BomComponent {
//!     fn add_property(&mut self, name: &str, value: &str) {
//!         self.properties.push((name.into(), value.into()));
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> clearlydefined::Result<()> {
//!     let store = Arc::new(DiskCache::new("cache").expect("cache directory"));
//!     let client = ClientBuilder::builder()
//!         .content_handler(store)
//!         .build()
//!         .client::<BomComponent>()?;
//!
//!     let url = Url::parse(
//!         "https://api.clearlydefined.io/definitions/maven/mavencentral/org.example/lib/1.0.0",
//!     ).expect("valid url");
//!     let response = client.submit(BomComponent::default(), url).await?;
//!     println!("{}: {:?}", response.status(), response.component());
//!
//!     client.wait_for_completion().await;
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_crate_dependencies,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod component;
mod coordinator;
mod license;
mod queue;
mod waiter;
mod worker;

/// The content store consulted before any network round trip
pub mod content;

/// Tracking of server-declared rate limits
pub mod ratelimit;

mod types;

#[cfg(test)]
pub(crate) mod test_utils;

#[doc(inline)]
pub use crate::{
    // Constants get exposed so that embedding applications can reuse the
    // library defaults
    client::{
        Client, ClientBuilder, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_REDIRECTS,
        DEFAULT_MAX_RETRIES, DEFAULT_USER_AGENT,
    },
    component::Component,
    content::{ContentError, ContentHandler, DiskCache, MemoryCache},
    license::{LICENSE_PROPERTY, declared_license},
    ratelimit::RateLimitTracker,
    types::{Enrichment, ErrorKind, Response, Result, Status},
};
