use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use super::models::{Collection, Entity, ListData, MangaData, Tag};
use super::{
    API_URL, ID_MAP_URL, MAX_PAGE_SIZE, PAGE_SIZE, SEASONAL_LIST_ID, api_url, descriptor,
    fetch_json, fetch_manga, listing_query, new_dispatcher, title_query,
};
use crate::{
    error::Result,
    net::{Dispatcher, OutboundRequest, proxy::ProxyStore},
    provider::{BaseProvider, Provider, ProviderDescriptor},
    types::{AdvancedSearchParams, Format, MediaInfo, MediaType, SeasonalResponse},
};

/// How far back "trending" looks for newly created titles.
const TRENDING_WINDOW_DAYS: i64 = 3;

/// MangaDex as the authoritative source for manga records.
#[derive(Debug, Clone)]
pub struct MangaDexBase {
    descriptor: ProviderDescriptor,
    dispatcher: Dispatcher,
}

impl MangaDexBase {
    pub fn new(proxies: Arc<ProxyStore>) -> Self {
        Self::with_dispatcher(new_dispatcher(proxies))
    }

    /// Uses `dispatcher` for every request, sharing its rate limit with
    /// the other roles holding a clone of it.
    pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            descriptor: descriptor(vec![Format::Manga, Format::OneShot], true),
            dispatcher,
        }
    }

    /// Sends every request directly instead of through a relay.
    pub fn direct(mut self) -> Self {
        self.descriptor.needs_proxy = false;
        self
    }

    /// Downloads the tag catalog, keyed by group, as `(english name, id)`.
    async fn tag_catalog(&self) -> Result<HashMap<String, Vec<(String, String)>>> {
        let url = api_url("/manga/tag", &[])?;
        let tags: Collection<Tag> = fetch_json(self, url).await?;

        let mut catalog: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for tag in &tags.data {
            if let Some(name) = tag.english_name() {
                catalog
                    .entry(tag.attributes.group.clone())
                    .or_default()
                    .push((name.to_string(), tag.id.clone()));
            }
        }
        Ok(catalog)
    }

    async fn listing(&self, query: Vec<(&'static str, String)>) -> Result<Vec<MediaInfo>> {
        let url = api_url("/manga", &query)?;
        let collection: Collection<MangaData> = fetch_json(self, url).await?;
        Ok(collection
            .data
            .into_iter()
            .map(MangaData::into_media_info)
            .collect())
    }

    /// Titles on the curated seasonal list.
    async fn seasonal_list(&self) -> Result<Vec<MediaInfo>> {
        let url = api_url(&format!("/list/{SEASONAL_LIST_ID}"), &[])?;
        let list: Entity<ListData> = fetch_json(self, url).await?;

        let ids = list.data.manga_ids();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = listing_query(MAX_PAGE_SIZE, 0);
        query.extend(ids.into_iter().take(MAX_PAGE_SIZE as usize).map(|id| ("ids[]", id)));
        self.listing(query).await
    }
}

/// Resolves names against the catalog groups accepted by `matches_group`.
/// Names the catalog doesn't know are dropped.
fn resolve_names(
    catalog: &HashMap<String, Vec<(String, String)>>,
    names: &[String],
    matches_group: impl Fn(&str) -> bool,
) -> Vec<String> {
    names
        .iter()
        .filter_map(|wanted| {
            catalog
                .iter()
                .filter(|(group, _)| matches_group(group.as_str()))
                .flat_map(|(_, entries)| entries.iter())
                .find(|(name, _)| name.eq_ignore_ascii_case(wanted.trim()))
                .map(|(_, id)| id.clone())
        })
        .collect()
}

fn retain_formats(results: Vec<MediaInfo>, formats: &[Format]) -> Vec<MediaInfo> {
    if formats.is_empty() {
        return results;
    }
    results
        .into_iter()
        .filter(|info| formats.contains(&info.format))
        .collect()
}

/// `(limit, offset)` for a zero-based page.
fn paging(page: u32, per_page: u32) -> (u32, u32) {
    let limit = if per_page == 0 {
        PAGE_SIZE
    } else {
        per_page.min(MAX_PAGE_SIZE)
    };
    (limit, limit * page)
}

#[async_trait]
impl Provider for MangaDexBase {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Probes the API through a relay.
    async fn proxy_check(&self) -> Result<bool> {
        let request = OutboundRequest::get(&format!("{API_URL}/ping"))?;
        match self.request(&request, Some(true)).await {
            Ok(response) => Ok(response.status() == StatusCode::OK),
            Err(e) if e.is_recoverable() => {
                debug!("[mangadex] proxy check failed: {}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl BaseProvider for MangaDexBase {
    async fn search(
        &self,
        query: &str,
        media_type: MediaType,
        formats: &[Format],
        page: u32,
        per_page: u32,
    ) -> Result<Vec<MediaInfo>> {
        if media_type != MediaType::Manga {
            return Ok(Vec::new());
        }

        let (limit, offset) = paging(page, per_page);
        let results = self.listing(title_query(query, limit, offset)).await?;
        Ok(retain_formats(results, formats))
    }

    async fn search_advanced(&self, params: &AdvancedSearchParams) -> Result<Vec<MediaInfo>> {
        if params.media_type != MediaType::Manga {
            return Ok(Vec::new());
        }

        let (limit, offset) = paging(params.page, params.per_page);
        let mut query = title_query(&params.query, limit, offset);

        if let Some(year) = params.year.filter(|y| *y > 0) {
            query.push(("year", year.to_string()));
        }

        let filtering = !(params.genres.is_empty()
            && params.genres_excluded.is_empty()
            && params.tags.is_empty()
            && params.tags_excluded.is_empty());

        if filtering {
            let catalog = self.tag_catalog().await?;
            let is_genre = |group: &str| group == "genre";
            let is_tag = |group: &str| group != "genre";

            let mut included = resolve_names(&catalog, &params.genres, is_genre);
            included.extend(resolve_names(&catalog, &params.tags, is_tag));
            let mut excluded = resolve_names(&catalog, &params.genres_excluded, is_genre);
            excluded.extend(resolve_names(&catalog, &params.tags_excluded, is_tag));

            if !included.is_empty() {
                query.push(("includedTagsMode", "AND".to_string()));
            }
            query.extend(included.into_iter().map(|id| ("includedTags[]", id)));
            query.extend(excluded.into_iter().map(|id| ("excludedTags[]", id)));
        }

        let results = self.listing(query).await?;
        Ok(retain_formats(results, &params.formats))
    }

    async fn get_media(&self, id: &str) -> Result<MediaInfo> {
        match fetch_manga(self, id).await? {
            Some(data) => Ok(data.into_media_info()),
            None => {
                debug!("[mangadex] no title with id {}", id);
                Ok(MediaInfo {
                    id: id.to_string(),
                    ..MediaInfo::default()
                })
            }
        }
    }

    async fn get_seasonal(
        &self,
        media_type: MediaType,
        formats: &[Format],
    ) -> Result<SeasonalResponse> {
        if media_type != MediaType::Manga {
            return Ok(SeasonalResponse::default());
        }

        let since = (Utc::now() - Duration::days(TRENDING_WINDOW_DAYS))
            .format("%Y-%m-%dT00:00:00")
            .to_string();

        let ordered = |order: &'static str, extra: Option<(&'static str, String)>| {
            let mut query = listing_query(PAGE_SIZE, 0);
            query.push((order, "desc".to_string()));
            query.push(("includes[]", "author".to_string()));
            query.push(("includes[]", "artist".to_string()));
            query.push(("hasAvailableChapters", "true".to_string()));
            query.extend(extra);
            query
        };

        let (trending, popular, top, seasonal) = tokio::try_join!(
            self.listing(ordered("order[followedCount]", Some(("createdAtSince", since)))),
            self.listing(ordered("order[followedCount]", None)),
            self.listing(ordered("order[rating]", None)),
            self.seasonal_list(),
        )?;

        Ok(SeasonalResponse {
            seasonal: retain_formats(seasonal, formats),
            trending: retain_formats(trending, formats),
            popular: retain_formats(popular, formats),
            top: retain_formats(top, formats),
        })
    }

    async fn get_ids(&self) -> Result<Vec<String>> {
        // The id map is served as text/plain, so skip the JSON content check.
        let request = OutboundRequest::get(ID_MAP_URL)?;
        let bytes = self.request(&request, Some(false)).await?.ensure_ok()?.bytes().await?;
        let map: HashMap<String, String> = serde_json::from_slice(&bytes)?;

        Ok(map.into_values().collect::<BTreeSet<_>>().into_iter().collect())
    }
}
