use async_trait::async_trait;
use std::sync::Arc;

use super::{PROVIDER_ID, descriptor, fetch_manga, new_dispatcher};
use crate::{
    error::Result,
    net::{Dispatcher, proxy::ProxyStore},
    provider::{InformationProvider, Provider, ProviderDescriptor},
    types::{Format, Media, MediaInfo, MediaInfoKey},
};

/// MangaDex as a source of corroborating metadata for mapped media.
#[derive(Debug, Clone)]
pub struct MangaDexInformation {
    descriptor: ProviderDescriptor,
    dispatcher: Dispatcher,
}

impl MangaDexInformation {
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
}

#[async_trait]
impl Provider for MangaDexInformation {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[async_trait]
impl InformationProvider for MangaDexInformation {
    async fn info(&self, media: &Media) -> Result<Option<MediaInfo>> {
        let Some(mapping) = media.mapping_for(PROVIDER_ID) else {
            return Ok(None);
        };

        let data = fetch_manga(self, &mapping.id).await?;
        Ok(data.map(|data| data.into_media_info()))
    }

    fn shared_area(&self) -> Vec<MediaInfoKey> {
        vec![
            MediaInfoKey::Synonyms,
            MediaInfoKey::Genres,
            MediaInfoKey::Artwork,
            MediaInfoKey::Tags,
        ]
    }
}
