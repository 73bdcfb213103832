//! Categorized relay pools shared by every outbound request.
//!
//! Relays are grouped into four [`ProxyCategory`] buckets, each loaded from
//! its own JSON file. A [`ProxyStore`] owns the current [`ProxyPool`] and
//! replaces it wholesale on [`ProxyStore::reload`], so readers always see
//! either the old pool or the new one and never a partially filled one.
//!
//! # Examples
//!
//! ```rust
//! use tsunagi::net::proxy::{ProxyCategory, ProxyStore};
//!
//! let store = ProxyStore::empty();
//! assert_eq!(ProxyCategory::for_provider("mangadex"), ProxyCategory::Manga);
//! assert!(store.select("unknown-provider").is_none());
//! ```

use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Records are appended in chunks of this size while importing.
const IMPORT_BATCH: usize = 100;

const BASE_PROVIDERS: &[&str] = &["anilist", "mal", "kitsu"];
const ANIME_PROVIDERS: &[&str] = &["gogoanime", "zoro", "animepahe"];
const MANGA_PROVIDERS: &[&str] = &["mangadex", "comick", "mangasee"];

/// The bucket a provider draws relays from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyCategory {
    Base,
    Anime,
    Manga,
    Meta,
}

impl ProxyCategory {
    /// Resolves the category a provider id draws from.
    ///
    /// `novelupdates` is routed to the manga bucket even though it is not a
    /// manga source.
    pub fn for_provider(provider_id: &str) -> Self {
        if provider_id == "novelupdates" {
            ProxyCategory::Manga
        } else if BASE_PROVIDERS.contains(&provider_id) {
            ProxyCategory::Base
        } else if ANIME_PROVIDERS.contains(&provider_id) {
            ProxyCategory::Anime
        } else if MANGA_PROVIDERS.contains(&provider_id) {
            ProxyCategory::Manga
        } else {
            ProxyCategory::Meta
        }
    }
}

/// A relay endpoint as stored in the category files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    #[serde(rename = "providerId")]
    pub provider_id: String,
    #[serde(rename = "ip")]
    pub address: String,
}

impl Proxy {
    pub fn new(provider_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            address: normalize_address(address.into()),
        }
    }
}

fn normalize_address(address: String) -> String {
    if address.contains("://") {
        address
    } else {
        format!("http://{address}")
    }
}

/// File locations of the four category sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySources {
    pub base: PathBuf,
    pub anime: PathBuf,
    pub manga: PathBuf,
    pub meta: PathBuf,
}

impl Default for ProxySources {
    fn default() -> Self {
        Self {
            base: PathBuf::from("./baseProxies.json"),
            anime: PathBuf::from("./animeProxies.json"),
            manga: PathBuf::from("./mangaProxies.json"),
            meta: PathBuf::from("./metaProxies.json"),
        }
    }
}

impl ProxySources {
    /// Points all four categories at files inside `dir`, using the default
    /// file names.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            base: dir.join("baseProxies.json"),
            anime: dir.join("animeProxies.json"),
            manga: dir.join("mangaProxies.json"),
            meta: dir.join("metaProxies.json"),
        }
    }
}

/// An immutable snapshot of all four categories.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    pub base: Vec<Proxy>,
    pub anime: Vec<Proxy>,
    pub manga: Vec<Proxy>,
    pub meta: Vec<Proxy>,
}

impl ProxyPool {
    pub fn category(&self, category: ProxyCategory) -> &[Proxy] {
        match category {
            ProxyCategory::Base => &self.base,
            ProxyCategory::Anime => &self.anime,
            ProxyCategory::Manga => &self.manga,
            ProxyCategory::Meta => &self.meta,
        }
    }

    /// Total number of relays across all categories.
    pub fn len(&self) -> usize {
        self.base.len() + self.anime.len() + self.manga.len() + self.meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Picks a relay address uniformly at random from the provider's
    /// category, or `None` when the category is empty.
    pub fn select(&self, provider_id: &str) -> Option<String> {
        let candidates = self.category(ProxyCategory::for_provider(provider_id));
        if candidates.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..candidates.len());
        Some(candidates[index].address.clone())
    }
}

/// Owner of the process-wide relay pool.
///
/// Clone the surrounding `Arc` to share it; readers take a cheap snapshot
/// and never hold the lock across an await.
#[derive(Debug)]
pub struct ProxyStore {
    sources: ProxySources,
    pool: RwLock<Arc<ProxyPool>>,
}

impl ProxyStore {
    /// Creates an unloaded store; call [`init`](Self::init) before use.
    pub fn new(sources: ProxySources) -> Self {
        Self {
            sources,
            pool: RwLock::new(Arc::new(ProxyPool::default())),
        }
    }

    /// A store with no relays, for providers that only run direct.
    pub fn empty() -> Self {
        Self::new(ProxySources::default())
    }

    /// A store wrapping an already built pool.
    pub fn from_pool(pool: ProxyPool) -> Self {
        Self {
            sources: ProxySources::default(),
            pool: RwLock::new(Arc::new(pool)),
        }
    }

    /// Loads all four categories concurrently and publishes the result once
    /// every load has finished.
    pub async fn init(&self) -> crate::Result<()> {
        self.reload().await
    }

    /// Re-reads every category and swaps the whole pool at once.
    pub async fn reload(&self) -> crate::Result<()> {
        let (base, anime, manga, meta) = tokio::join!(
            load_category(&self.sources.base),
            load_category(&self.sources.anime),
            load_category(&self.sources.manga),
            load_category(&self.sources.meta),
        );

        let pool = ProxyPool {
            base: base?,
            anime: anime?,
            manga: manga?,
            meta: meta?,
        };

        info!("Proxy pool ready with {} relays", pool.len());
        *self.pool.write() = Arc::new(pool);
        Ok(())
    }

    /// The pool as of now. Later reloads do not affect the returned value.
    pub fn snapshot(&self) -> Arc<ProxyPool> {
        self.pool.read().clone()
    }

    /// See [`ProxyPool::select`].
    pub fn select(&self, provider_id: &str) -> Option<String> {
        self.snapshot().select(provider_id)
    }

    pub fn sources(&self) -> &ProxySources {
        &self.sources
    }
}

/// Reads one category file.
///
/// A missing file is an empty category. A file that is not a JSON array of
/// `{providerId, ip}` records is logged and also treated as empty. Other IO
/// failures propagate.
pub async fn load_category(path: &Path) -> crate::Result<Vec<Proxy>> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No proxy file at {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let records: Vec<Proxy> = match serde_json::from_slice(&raw) {
        Ok(records) => records,
        Err(e) => {
            warn!("Ignoring malformed proxy file {}: {}", path.display(), e);
            return Ok(Vec::new());
        }
    };

    let total = records.len();
    let mut proxies = Vec::with_capacity(total);
    for (i, batch) in records.chunks(IMPORT_BATCH).enumerate() {
        proxies.extend(batch.iter().map(|record| Proxy {
            provider_id: record.provider_id.clone(),
            address: normalize_address(record.address.clone()),
        }));
        debug!("Imported proxy batch {} from {}", i + 1, path.display());
    }

    info!("Finished importing {} proxies from {}", total, path.display());
    Ok(proxies)
}
