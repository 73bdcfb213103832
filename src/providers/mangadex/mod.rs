//! MangaDex, wired up in all three provider roles.
//!
//! - [`MangaDexBase`] - Authoritative manga records, seasonal lists, id map
//! - [`MangaDexManga`] - Secondary manga search
//! - [`MangaDexInformation`] - Descriptive fields for mapped media
//!
//! All three share id `mangadex`, a 250 ms rate limit and relay through the
//! manga proxy category. Call `.direct()` on any of them to skip the relay.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tsunagi::prelude::*;
//! use tsunagi::providers::mangadex::MangaDexManga;
//!
//! # async fn example() -> tsunagi::Result<()> {
//! let provider = MangaDexManga::new(Arc::new(ProxyStore::empty())).direct();
//! let results = provider.search("Mushoku Tensei", Format::Manga, Some(2014)).await?;
//! println!("{} hits", results.len());
//! # Ok(())
//! # }
//! ```

use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

mod base;
mod information;
mod manga;
pub(crate) mod models;

pub use base::MangaDexBase;
pub use information::MangaDexInformation;
pub use manga::MangaDexManga;

use crate::{
    error::Result,
    net::{Dispatcher, OutboundRequest, proxy::ProxyStore},
    provider::{Provider, ProviderDescriptor},
    types::{Format, ProviderType},
};
use models::{Collection, MangaData};

pub const PROVIDER_ID: &str = "mangadex";
pub const SITE_URL: &str = "https://mangadex.org";
pub const API_URL: &str = "https://api.mangadex.org";
pub const COVER_URL: &str = "https://uploads.mangadex.org/covers";
pub const ID_MAP_URL: &str =
    "https://raw.githubusercontent.com/ArdaxHz/mangadex-id-map/main/json/manga_map.json";
/// The curated list behind https://mangadex.org/titles/seasonal.
pub const SEASONAL_LIST_ID: &str = "54736a5c-eb7f-4844-971b-80ee171cdf29";

const RATE_LIMIT_MS: u64 = 250;
pub(crate) const PAGE_SIZE: u32 = 25;
pub(crate) const MAX_PAGE_SIZE: u32 = 100;
pub(crate) const SEARCH_PAGES: u32 = 2;

pub(crate) fn descriptor(formats: Vec<Format>, needs_proxy: bool) -> ProviderDescriptor {
    ProviderDescriptor {
        id: PROVIDER_ID.to_string(),
        url: SITE_URL.to_string(),
        formats,
        provider_type: Some(ProviderType::Manga),
        rate_limit_ms: RATE_LIMIT_MS,
        needs_proxy,
        use_translation: false,
    }
}

/// A dispatcher carrying the `mangadex` rate limit. Roles built from clones
/// of one dispatcher share that limit.
pub(crate) fn new_dispatcher(proxies: Arc<ProxyStore>) -> Dispatcher {
    Dispatcher::new(PROVIDER_ID, proxies).with_rate_limit(RATE_LIMIT_MS)
}

/// Builds an API URL from a path and repeated query pairs.
pub(crate) fn api_url(path: &str, query: &[(&str, String)]) -> Result<Url> {
    let mut url = Url::parse(&format!("{API_URL}{path}"))
        .map_err(|e| crate::Error::parse(format!("{path}: {e}")))?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Query pairs shared by every title listing.
pub(crate) fn listing_query(limit: u32, offset: u32) -> Vec<(&'static str, String)> {
    vec![
        ("limit", limit.to_string()),
        ("offset", offset.to_string()),
        ("contentRating[]", "safe".to_string()),
        ("contentRating[]", "suggestive".to_string()),
        ("includes[]", "cover_art".to_string()),
    ]
}

/// Query pairs for a relevance-ordered title search.
pub(crate) fn title_query(title: &str, limit: u32, offset: u32) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("title", title.to_string()),
        ("order[relevance]", "desc".to_string()),
    ];
    query.extend(listing_query(limit, offset));
    query
}

/// GETs `url` through the provider and decodes a JSON body.
pub(crate) async fn fetch_json<P, T>(provider: &P, url: Url) -> Result<T>
where
    P: Provider + ?Sized,
    T: DeserializeOwned,
{
    let request = OutboundRequest::new(Method::GET, url);
    provider.request(&request, None).await?.json().await
}

/// Runs a relevance search over [`SEARCH_PAGES`] pages of [`PAGE_SIZE`].
pub(crate) async fn search_titles<P>(provider: &P, title: &str) -> Result<Vec<MangaData>>
where
    P: Provider + ?Sized,
{
    let mut results = Vec::new();
    for page in 0..SEARCH_PAGES {
        let url = api_url("/manga", &title_query(title, PAGE_SIZE, PAGE_SIZE * page))?;
        let collection: Collection<MangaData> = fetch_json(provider, url).await?;
        let exhausted = collection.data.len() < PAGE_SIZE as usize;
        results.extend(collection.data);
        if exhausted {
            break;
        }
    }
    Ok(results)
}

/// Fetches a single title, `None` on 404.
pub(crate) async fn fetch_manga<P>(provider: &P, id: &str) -> Result<Option<MangaData>>
where
    P: Provider + ?Sized,
{
    let path = format!("/manga/{}", urlencoding::encode(id));
    let url = api_url(
        &path,
        &[
            ("includes[]", "cover_art".to_string()),
            ("includes[]", "author".to_string()),
            ("includes[]", "artist".to_string()),
        ],
    )?;

    let request = OutboundRequest::new(Method::GET, url);
    let response = provider.request(&request, None).await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }

    let entity: models::Entity<MangaData> = response.json().await?;
    Ok(Some(entity.data))
}

/// All three MangaDex roles sharing one relay store and one rate limit.
pub fn all(proxies: Arc<ProxyStore>) -> (MangaDexBase, MangaDexManga, MangaDexInformation) {
    let dispatcher = new_dispatcher(proxies);
    (
        MangaDexBase::with_dispatcher(dispatcher.clone()),
        MangaDexManga::with_dispatcher(dispatcher.clone()),
        MangaDexInformation::with_dispatcher(dispatcher),
    )
}
