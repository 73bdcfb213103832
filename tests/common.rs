//! Common test utilities and constants
//!
//! Mock providers and fixtures shared across test modules.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tsunagi::net::Dispatcher;
use tsunagi::net::proxy::ProxyStore;
use tsunagi::prelude::*;
use tsunagi::provider::{ProviderDescriptor, ProviderDescriptorBuilder};
use tsunagi::types::{AdvancedSearchParams, SeasonalResponse};

#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);
#[allow(dead_code)]
pub const MUSHOKU_ID: &str = "3e873ea3-1ba2-4e1b-9a5f-e8e6e4bcc9a5";

fn mock_descriptor(id: &str, formats: Vec<Format>) -> ProviderDescriptor {
    ProviderDescriptorBuilder::default()
        .id(id)
        .url(format!("https://{id}.invalid"))
        .formats(formats)
        .rate_limit_ms(0u64)
        .build()
        .unwrap()
}

/// Base provider that answers every id with a fixed record, or with an
/// upstream 502 once [`MockBase::failing`] is set.
#[allow(dead_code)]
pub struct MockBase {
    descriptor: ProviderDescriptor,
    dispatcher: Dispatcher,
    record: MediaInfo,
    failing: bool,
    pub lookups: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl MockBase {
    pub fn new(id: &str, formats: Vec<Format>, record: MediaInfo) -> Self {
        let descriptor = mock_descriptor(id, formats);
        let dispatcher = descriptor.dispatcher(Arc::new(ProxyStore::empty()));
        Self {
            descriptor,
            dispatcher,
            record,
            failing: false,
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

#[async_trait]
impl Provider for MockBase {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[async_trait]
impl BaseProvider for MockBase {
    async fn search(
        &self,
        _query: &str,
        _media_type: MediaType,
        _formats: &[Format],
        _page: u32,
        _per_page: u32,
    ) -> Result<Vec<MediaInfo>> {
        Ok(vec![self.record.clone()])
    }

    async fn search_advanced(&self, _params: &AdvancedSearchParams) -> Result<Vec<MediaInfo>> {
        Ok(Vec::new())
    }

    async fn get_media(&self, id: &str) -> Result<MediaInfo> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(Error::upstream(self.id(), 502));
        }
        Ok(MediaInfo {
            id: id.to_string(),
            ..self.record.clone()
        })
    }

    async fn get_seasonal(
        &self,
        _media_type: MediaType,
        _formats: &[Format],
    ) -> Result<SeasonalResponse> {
        Ok(SeasonalResponse::default())
    }

    async fn get_ids(&self) -> Result<Vec<String>> {
        Ok(vec![self.record.id.clone()])
    }
}

/// Secondary provider answering from a per-title table.
#[allow(dead_code)]
pub struct MockSecondary {
    descriptor: ProviderDescriptor,
    dispatcher: Dispatcher,
    responses: HashMap<String, Vec<SearchResult>>,
    fallback: Vec<SearchResult>,
    failing: bool,
    delay: Option<Duration>,
    pub calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl MockSecondary {
    pub fn new(id: &str, formats: Vec<Format>) -> Self {
        let descriptor = mock_descriptor(id, formats);
        let dispatcher = descriptor.dispatcher(Arc::new(ProxyStore::empty()));
        Self {
            descriptor,
            dispatcher,
            responses: HashMap::new(),
            fallback: Vec::new(),
            failing: false,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Results returned when searching exactly `title`.
    pub fn respond(mut self, title: &str, results: Vec<SearchResult>) -> Self {
        self.responses.insert(title.to_string(), results);
        self
    }

    /// Results returned for every title without an explicit response.
    pub fn respond_all(mut self, results: Vec<SearchResult>) -> Self {
        self.fallback = results;
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Provider for MockSecondary {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[async_trait]
impl SecondaryProvider for MockSecondary {
    async fn search(
        &self,
        title: &str,
        _format: Format,
        _year: Option<i32>,
    ) -> Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(Error::upstream(self.id(), 503));
        }
        Ok(self
            .responses
            .get(title)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// A search hit with the given provider, titles, format and year.
#[allow(dead_code)]
pub fn hit(
    provider_id: &str,
    id: &str,
    title: &str,
    alt_titles: &[&str],
    format: Format,
    year: Option<i32>,
) -> SearchResult {
    SearchResult {
        id: id.to_string(),
        title: title.to_string(),
        alt_titles: alt_titles.iter().map(|t| t.to_string()).collect(),
        year,
        format,
        provider_id: provider_id.to_string(),
        img: None,
    }
}

/// Authoritative record for Mushoku Tensei with an English title only.
#[allow(dead_code)]
pub fn mushoku_record() -> MediaInfo {
    MediaInfo {
        id: MUSHOKU_ID.to_string(),
        title: Title {
            english: Some("Mushoku Tensei".to_string()),
            romaji: None,
            native: None,
        },
        format: Format::Manga,
        year: Some(2014),
        media_type: Some(MediaType::Manga),
        ..MediaInfo::default()
    }
}

#[allow(dead_code)]
pub fn manga_request(id: &str) -> MappingRequest {
    MappingRequest::new(id, MediaType::Manga, vec![Format::Manga])
}
