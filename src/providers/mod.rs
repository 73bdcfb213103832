//! Concrete provider implementations with conditional compilation support.
//!
//! Individual providers are protected by feature flags so minimal builds only
//! include what they need.
//!
//! # Feature Flags
//!
//! - `source-mangadex` - Enables the MangaDex provider in all three roles
//! - `all-sources` - Enables all providers (default)
//!
//! Build with only MangaDex support:
//! ```bash
//! cargo build --no-default-features --features source-mangadex
//! ```

use std::sync::Arc;

use crate::{net::proxy::ProxyStore, provider::Providers};

#[cfg(feature = "source-mangadex")]
pub mod mangadex;

#[cfg(feature = "source-mangadex")]
pub use mangadex::{MangaDexBase, MangaDexInformation, MangaDexManga};

impl Providers {
    /// A registry holding every compiled-in provider, all sharing `proxies`.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use tsunagi::prelude::*;
    ///
    /// let providers = Providers::with_defaults(Arc::new(ProxyStore::empty()));
    /// # #[cfg(feature = "source-mangadex")]
    /// assert!(providers.base_for(Format::OneShot).is_some());
    /// ```
    #[allow(unused_variables, unused_mut)]
    pub fn with_defaults(proxies: Arc<ProxyStore>) -> Self {
        let mut providers = Providers::new();

        #[cfg(feature = "source-mangadex")]
        {
            let (base, manga, information) = mangadex::all(proxies);
            providers
                .add_base(base)
                .add_manga(manga)
                .add_information(information);
        }

        providers
    }
}
