//! Cross-provider entity resolution.
//!
//! [`MappingPipeline::load`] takes a work's id, fetches its authoritative
//! record, searches every capable secondary provider under each known title
//! and folds the accepted matches into one canonical [`Media`]:
//!
//! 1. **Existing check** - stop early if the store already has the work
//! 2. **Authoritative resolution** - first base provider supporting the format
//! 3. **Candidate gathering** - one search per provider and title variant
//! 4. **Matching** - 2-D best match, format/year filters, final similarity
//! 5. **Accumulation** - at most one mapping per provider
//! 6. **Aggregate construction** - a [`Media`] with one [`Mapping`] each
//!
//! A completion event is emitted at the end of every invocation, whatever
//! the outcome.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tsunagi::prelude::*;
//!
//! # async fn example() -> tsunagi::Result<()> {
//! let proxies = Arc::new(ProxyStore::new(ProxySources::default()));
//! proxies.init().await?;
//!
//! let pipeline = MappingPipeline::new(
//!     Arc::new(Providers::with_defaults(proxies)),
//!     Arc::new(MemoryStore::new()),
//! );
//!
//! let request = MappingRequest::new(
//!     "a1c7c817-4e59-43b7-9365-09675a149a6f",
//!     MediaType::Manga,
//!     vec![Format::Manga],
//! );
//! match pipeline.load(&request).await? {
//!     MappingOutcome::Mapped(media) => println!("{} mappings", media.mappings.len()),
//!     MappingOutcome::AlreadyResolved(_) => println!("already resolved"),
//!     MappingOutcome::NotFound => println!("not found"),
//! }
//! # Ok(())
//! # }
//! ```

use futures::{StreamExt, stream};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{Error, Result},
    events::{Event, EventSink, LogSink},
    provider::{Providers, SecondaryProvider},
    similarity::{find_best_match_2d, similarity_with_threshold, slugify},
    store::MediaStore,
    types::{
        Format, MappedResult, Mapping, MappingRequest, Media, MediaInfo, SearchResult,
    },
};

/// Acceptance thresholds for a candidate match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// Minimum 2-D best-match rating for a provider's result list.
    pub best_match_threshold: f64,
    /// Score above which two titles count as the same work.
    pub same_threshold: f64,
    /// Minimum final similarity for a match to be accepted.
    pub accept_threshold: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            best_match_threshold: 0.7,
            same_threshold: 0.6,
            accept_threshold: 0.4,
        }
    }
}

fn known_year(year: Option<i32>) -> Option<i32> {
    year.filter(|y| *y != 0)
}

impl MatchPolicy {
    /// Picks the result in `results` that corresponds to `info`, if any.
    ///
    /// Rejections are logged at debug level with the rule that failed.
    pub fn evaluate(&self, info: &MediaInfo, results: &[SearchResult]) -> Option<MappedResult> {
        let groups: Vec<Vec<String>> = results.iter().map(SearchResult::candidate_titles).collect();
        if groups.iter().all(Vec::is_empty) {
            return None;
        }

        let provider_id = results
            .first()
            .map(|r| r.provider_id.as_str())
            .unwrap_or_default();

        let matched = find_best_match_2d(&info.title_variants(), &groups);
        if matched.best_match.rating < self.best_match_threshold {
            debug!(
                "[{}] best rating {:.3} below {} for {}",
                provider_id, matched.best_match.rating, self.best_match_threshold, info.id
            );
            return None;
        }

        let best = results.get(matched.best_match_index)?;

        if best.format.is_known() && info.format.is_known() && best.format != info.format {
            debug!(
                "[{}] format mismatch for {}: {:?} != {:?}",
                provider_id, best.id, best.format, info.format
            );
            return None;
        }

        if let (Some(found), Some(expected)) = (known_year(best.year), known_year(info.year)) {
            if found != expected {
                debug!(
                    "[{}] year mismatch for {}: {} != {}",
                    provider_id, best.id, found, expected
                );
                return None;
            }
        }

        let alt_titles: Vec<String> = [&info.title.romaji, &info.title.english, &info.title.native]
            .into_iter()
            .flatten()
            .chain(info.synonyms.iter())
            .cloned()
            .collect();
        let primary = info.title.primary().unwrap_or_default();

        let score = similarity_with_threshold(primary, &best.title, &alt_titles, self.same_threshold);
        if score.value < self.accept_threshold {
            debug!(
                "[{}] similarity {:.3} below {} for {}",
                provider_id, score.value, self.accept_threshold, best.id
            );
            return None;
        }

        Some(MappedResult {
            id: best.id.clone(),
            slug: slugify([&best.title]),
            data: best.clone(),
            similarity: score.value,
        })
    }
}

/// Keeps at most one candidate per provider: the most similar one, or the
/// first seen on a tie. Provider order follows first appearance.
pub fn unique_by_provider(candidates: impl IntoIterator<Item = MappedResult>) -> Vec<MappedResult> {
    let mut accepted: Vec<MappedResult> = Vec::new();
    for candidate in candidates {
        match accepted
            .iter_mut()
            .find(|m| m.provider_id() == candidate.provider_id())
        {
            Some(existing) => {
                if candidate.similarity > existing.similarity {
                    *existing = candidate;
                }
            }
            None => accepted.push(candidate),
        }
    }
    accepted
}

/// Folds accepted matches into the canonical aggregate.
///
/// The aggregate takes the requested id, a slug of the authoritative primary
/// title, and the authoritative title set and format. Other descriptive
/// fields are left for information providers to fill in.
pub fn create_media(
    request: &MappingRequest,
    info: &MediaInfo,
    mapped: &[MappedResult],
) -> Media {
    let mut media = Media::new(
        &request.id,
        slugify(info.title.primary()),
        request.media_type,
    );
    media.title = info.title.clone();
    media.format = info.format;
    media.mappings = mapped
        .iter()
        .map(|m| Mapping {
            id: m.id.clone(),
            provider_id: m.provider_id().to_string(),
            provider_type: Some(request.media_type.into()),
            similarity: m.similarity,
        })
        .collect();
    media
}

/// Terminal state of one resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingOutcome {
    /// The store already held the work.
    AlreadyResolved(Media),
    /// No base provider supports the format, or the record has no titles.
    NotFound,
    /// A freshly built aggregate. `mappings` is empty when nothing matched.
    Mapped(Media),
}

impl MappingOutcome {
    pub fn media(&self) -> Option<&Media> {
        match self {
            MappingOutcome::AlreadyResolved(media) | MappingOutcome::Mapped(media) => Some(media),
            MappingOutcome::NotFound => None,
        }
    }

    pub fn mappings(&self) -> &[Mapping] {
        self.media().map(|m| m.mappings.as_slice()).unwrap_or_default()
    }
}

/// Orchestrates resolution requests against a provider registry.
pub struct MappingPipeline {
    providers: Arc<Providers>,
    store: Arc<dyn MediaStore>,
    events: Arc<dyn EventSink>,
    policy: MatchPolicy,
    worker_limit: usize,
    store_timeout: Duration,
}

impl MappingPipeline {
    /// Creates a pipeline with default policy that reports completion to
    /// the log.
    pub fn new(providers: Arc<Providers>, store: Arc<dyn MediaStore>) -> Self {
        Self {
            providers,
            store,
            events: Arc::new(LogSink),
            policy: MatchPolicy::default(),
            worker_limit: 4,
            store_timeout: Duration::from_secs(10),
        }
    }

    /// Creates a pipeline using the policy and limits from `config`.
    pub fn from_config(
        providers: Arc<Providers>,
        store: Arc<dyn MediaStore>,
        config: &Config,
    ) -> Self {
        Self::new(providers, store)
            .with_policy(config.policy)
            .with_worker_limit(config.pipeline.worker_limit)
            .with_store_timeout(config.pipeline.store_timeout())
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Number of providers searched at once. Zero is treated as one.
    pub fn with_worker_limit(mut self, limit: usize) -> Self {
        self.worker_limit = limit.max(1);
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Resolves one work. See the module docs for the steps.
    ///
    /// # Errors
    ///
    /// Fails when the store lookup fails or times out, or when the
    /// authoritative fetch fails. Secondary search failures are logged and
    /// skipped.
    pub async fn load(&self, request: &MappingRequest) -> Result<MappingOutcome> {
        self.load_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// [`load`](Self::load), aborted with [`Error::Cancelled`] as soon as
    /// `token` is cancelled. In-flight requests are dropped.
    pub async fn load_with_cancel(
        &self,
        request: &MappingRequest,
        token: &CancellationToken,
    ) -> Result<MappingOutcome> {
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            outcome = self.resolve(request) => outcome,
        };

        self.events.emit(Event::MappingLoadCompleted);
        outcome
    }

    async fn resolve(&self, request: &MappingRequest) -> Result<MappingOutcome> {
        if let Some(existing) = self.existing(request).await? {
            debug!("{} already resolved", request.id);
            return Ok(MappingOutcome::AlreadyResolved(existing));
        }

        let format = request.primary_format();
        let Some(base) = self.providers.base_for(format) else {
            info!("No base provider supports {:?}; skipping {}", format, request.id);
            return Ok(MappingOutcome::NotFound);
        };

        let info = base.get_media(&request.id).await?;
        if !info.title.is_found() {
            info!("Media {} not found on {}", request.id, base.id());
            return Ok(MappingOutcome::NotFound);
        }

        let secondaries = self.providers.secondary_for(request.media_type, format);
        let result_lists = self.gather(&info, secondaries).await;
        info!(
            "Gathered {} result lists for {}",
            result_lists.len(),
            request.id
        );

        let candidates: Vec<MappedResult> = result_lists
            .par_iter()
            .filter_map(|results| self.policy.evaluate(&info, results))
            .collect();

        let mapped = unique_by_provider(candidates);
        info!("Found {} mappings for {}", mapped.len(), request.id);

        Ok(MappingOutcome::Mapped(create_media(request, &info, &mapped)))
    }

    async fn existing(&self, request: &MappingRequest) -> Result<Option<Media>> {
        let lookup = self.store.get(&request.id, request.media_type);
        match tokio::time::timeout(self.store_timeout, lookup).await {
            Ok(found) => Ok(found?.filter(|media| !media.id.is_empty())),
            Err(_) => Err(Error::Timeout {
                provider: "store".to_string(),
            }),
        }
    }

    /// Searches every provider under every title variant. Calls to one
    /// provider run in sequence; providers run concurrently up to the
    /// worker limit.
    async fn gather(
        &self,
        info: &MediaInfo,
        providers: Vec<Arc<dyn SecondaryProvider>>,
    ) -> Vec<Vec<SearchResult>> {
        let variants = info.title_variants();

        let per_provider: Vec<Vec<Vec<SearchResult>>> = stream::iter(
            providers
                .into_iter()
                .map(|provider| search_provider(provider, &variants, info.format, info.year)),
        )
        .buffered(self.worker_limit)
        .collect()
        .await;

        per_provider.into_iter().flatten().collect()
    }
}

async fn search_provider(
    provider: Arc<dyn SecondaryProvider>,
    variants: &[String],
    format: Format,
    year: Option<i32>,
) -> Vec<Vec<SearchResult>> {
    let mut lists = Vec::new();
    for title in variants {
        match provider.search(title, format, year).await {
            Ok(results) if results.is_empty() => {
                debug!("[{}] no results for {:?}", provider.id(), title);
            }
            Ok(results) => lists.push(results),
            Err(e) => warn!("[{}] search for {:?} failed: {}", provider.id(), title, e),
        }
    }
    lists
}

impl std::fmt::Debug for MappingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingPipeline")
            .field("providers", &self.providers)
            .field("policy", &self.policy)
            .field("worker_limit", &self.worker_limit)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}
