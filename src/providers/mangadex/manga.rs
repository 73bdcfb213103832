use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::models::MangaData;
use super::{descriptor, new_dispatcher, search_titles};
use crate::{
    error::Result,
    net::{Dispatcher, proxy::ProxyStore},
    provider::{Provider, ProviderDescriptor, SecondaryProvider},
    types::{Format, SearchResult},
};

/// MangaDex as a secondary manga source.
#[derive(Debug, Clone)]
pub struct MangaDexManga {
    descriptor: ProviderDescriptor,
    dispatcher: Dispatcher,
}

impl MangaDexManga {
    pub fn new(proxies: Arc<ProxyStore>) -> Self {
        Self::with_dispatcher(new_dispatcher(proxies))
    }

    /// Uses `dispatcher` for every request, sharing its rate limit with
    /// the other roles holding a clone of it.
    pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            descriptor: descriptor(vec![Format::Manga], true),
            dispatcher,
        }
    }

    /// Sends every request directly instead of through a relay.
    pub fn direct(mut self) -> Self {
        self.descriptor.needs_proxy = false;
        self
    }
}

#[async_trait]
impl Provider for MangaDexManga {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[async_trait]
impl SecondaryProvider for MangaDexManga {
    /// Relevance search by title. Format and year are left to the matcher.
    async fn search(
        &self,
        title: &str,
        _format: Format,
        _year: Option<i32>,
    ) -> Result<Vec<SearchResult>> {
        let results: Vec<SearchResult> = search_titles(self, title)
            .await?
            .into_iter()
            .map(MangaData::into_search_result)
            .collect();

        debug!("[mangadex] {} results for {:?}", results.len(), title);
        Ok(results)
    }
}
