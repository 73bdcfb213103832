//! # Tsunagi - Cross-provider manga and anime entity resolution
//!
//! Tsunagi takes a work known to one authoritative "base" provider, searches
//! every other registered provider for the same work under each of its known
//! titles, and produces a single canonical [`Media`](types::Media) record that
//! links every provider's identifier to it.
//!
//! ## Features
//!
//! - **Fuzzy title matching**: Bigram Dice scoring with title normalization
//! - **Capability-typed registry**: Base, secondary and information roles
//! - **Proxy relays**: Per-category relay pools reloaded from disk
//! - **Rate limiting**: Per-provider minimum delay between requests
//! - **Cancellation**: Every resolution can be aborted mid-flight
//! - **Layered config**: Defaults, `tsunagi.toml` and `TSUNAGI_` environment
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tsunagi::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!
//!     let proxies = Arc::new(ProxyStore::new(config.proxies.clone()));
//!     proxies.init().await?;
//!
//!     let pipeline = MappingPipeline::from_config(
//!         Arc::new(Providers::with_defaults(proxies)),
//!         Arc::new(MemoryStore::new()),
//!         &config,
//!     );
//!
//!     let request = MappingRequest::new(
//!         "a1c7c817-4e59-43b7-9365-09675a149a6f",
//!         MediaType::Manga,
//!         vec![Format::Manga],
//!     );
//!
//!     for mapping in pipeline.load(&request).await?.mappings() {
//!         println!("{} -> {} ({:.2})", mapping.provider_id, mapping.id, mapping.similarity);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`similarity`]: Title normalization, scoring and slugs
//! - [`net`]: Shared HTTP client, rate limiting, request dispatch and relays
//! - [`provider`]: Provider role traits and the registry
//! - [`providers`]: Concrete providers behind feature flags
//! - [`mapping`]: The resolution pipeline
//! - [`store`] / [`events`]: Existing-record lookup and completion signalling
//! - [`config`]: Layered configuration
//! - [`error`]: Crate-wide error type

pub mod config;
pub mod error;
pub mod events;
pub mod mapping;
pub mod net;
pub mod provider;
pub mod providers;
pub mod similarity;
pub mod store;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```rust
/// use tsunagi::prelude::*;
///
/// let policy = MatchPolicy::default();
/// assert_eq!(policy.accept_threshold, 0.4);
/// ```
pub mod prelude {
    pub use crate::{
        config::Config,
        error::{Error, Result},
        events::{Event, EventSink, LogSink},
        mapping::{MappingOutcome, MappingPipeline, MatchPolicy},
        net::proxy::{ProxySources, ProxyStore},
        provider::{
            BaseProvider, InformationProvider, Provider, ProviderKind, Providers,
            SecondaryProvider,
        },
        store::{MediaStore, MemoryStore},
        types::{
            Format, Mapping, MappingRequest, Media, MediaInfo, MediaType, SearchResult, Title,
        },
    };
}

// Re-export main types at crate root for direct access
pub use error::{Error, Result};
pub use mapping::{MappingOutcome, MappingPipeline};
pub use provider::Providers;
pub use similarity::slugify;
