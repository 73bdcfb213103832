//! Provider traits and the capability-typed provider registry.
//!
//! Every remote source implements [`Provider`] plus one or more role traits:
//!
//! - [`BaseProvider`] - The authoritative source of a work's title set
//! - [`SecondaryProvider`] - An anime or manga source searched for matches
//! - [`InformationProvider`] - A source of descriptive fields for a mapped work
//!
//! A single remote service may play several roles. The registry,
//! [`Providers`], holds a heterogeneous mix through [`ProviderKind`] and is
//! queried by [`Format`] to find the providers eligible for a work.
//!
//! # Examples
//!
//! ```rust
//! use tsunagi::prelude::*;
//!
//! let providers = Providers::new();
//! assert!(providers.base_for(Format::Manga).is_none());
//! assert!(providers.secondary_for(MediaType::Manga, Format::Manga).is_empty());
//! ```

use async_trait::async_trait;
use derive_builder::Builder;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    error::Result,
    net::{Dispatcher, OutboundRequest, RequestMode, Response, proxy::ProxyStore},
    types::{
        AdvancedSearchParams, Format, Media, MediaInfo, MediaInfoKey, MediaType, ProviderType,
        ScheduleResponse, SearchResult, Season, SeasonalResponse,
    },
};

/// Static description of a registered provider.
///
/// Immutable once the provider is constructed.
///
/// ```rust
/// use tsunagi::provider::ProviderDescriptorBuilder;
/// use tsunagi::types::Format;
///
/// let descriptor = ProviderDescriptorBuilder::default()
///     .id("mangadex")
///     .url("https://api.mangadex.org")
///     .formats(vec![Format::Manga, Format::OneShot])
///     .needs_proxy(true)
///     .build()
///     .unwrap();
///
/// assert!(descriptor.supports(Format::OneShot));
/// assert_eq!(descriptor.rate_limit_ms, 250);
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct ProviderDescriptor {
    pub id: String,
    pub url: String,
    #[builder(default)]
    pub formats: Vec<Format>,
    #[builder(default)]
    pub provider_type: Option<ProviderType>,
    /// Minimum delay between requests, in milliseconds.
    #[builder(default = "250")]
    pub rate_limit_ms: u64,
    #[builder(default)]
    pub needs_proxy: bool,
    #[builder(default)]
    pub use_translation: bool,
}

impl ProviderDescriptor {
    pub fn supports(&self, format: Format) -> bool {
        self.formats.contains(&format)
    }

    /// A dispatcher bound to this provider's id and rate limit.
    pub fn dispatcher(&self, proxies: Arc<ProxyStore>) -> Dispatcher {
        Dispatcher::new(&self.id, proxies).with_rate_limit(self.rate_limit_ms)
    }

    /// The mode a request goes out in.
    ///
    /// `proxy` defaults to the descriptor's `needs_proxy`. Asking for a relay
    /// on a provider that does not need one is downgraded to direct.
    pub fn request_mode(&self, proxy: Option<bool>) -> RequestMode {
        let relay = proxy.unwrap_or(self.needs_proxy) && self.needs_proxy;
        RequestMode::resolve(relay, self.use_translation)
    }
}

/// Behaviour shared by every provider role.
///
/// Implementors supply [`descriptor`](Provider::descriptor) and
/// [`dispatcher`](Provider::dispatcher); everything else has a default.
#[async_trait]
pub trait Provider: Send + Sync {
    fn descriptor(&self) -> &ProviderDescriptor;

    fn dispatcher(&self) -> &Dispatcher;

    fn id(&self) -> &str {
        &self.descriptor().id
    }

    fn url(&self) -> &str {
        &self.descriptor().url
    }

    fn formats(&self) -> &[Format] {
        &self.descriptor().formats
    }

    fn supports(&self, format: Format) -> bool {
        self.descriptor().supports(format)
    }

    fn provider_type(&self) -> Option<ProviderType> {
        self.descriptor().provider_type
    }

    /// Sends a request through this provider's dispatcher.
    ///
    /// See [`ProviderDescriptor::request_mode`] for how `proxy` is resolved.
    async fn request(&self, request: &OutboundRequest, proxy: Option<bool>) -> Result<Response> {
        let mode = self.descriptor().request_mode(proxy);
        self.dispatcher().send(request, mode).await
    }

    /// Whether the provider is reachable through its relays. Providers that
    /// do not implement a probe report `false`.
    async fn proxy_check(&self) -> Result<bool> {
        Ok(false)
    }
}

/// An authoritative source of title sets.
#[async_trait]
pub trait BaseProvider: Provider {
    async fn search(
        &self,
        query: &str,
        media_type: MediaType,
        formats: &[Format],
        page: u32,
        per_page: u32,
    ) -> Result<Vec<MediaInfo>>;

    /// Searches with genre and tag filters.
    ///
    /// Genre and tag names are resolved to provider identifiers first;
    /// unknown names are dropped.
    async fn search_advanced(&self, params: &AdvancedSearchParams) -> Result<Vec<MediaInfo>>;

    async fn get_current_season(&self) -> Result<Season> {
        Ok(Season::Unknown)
    }

    /// Fetches the record for `id`.
    ///
    /// A record whose title set is empty means "not found".
    async fn get_media(&self, id: &str) -> Result<MediaInfo>;

    async fn get_seasonal(
        &self,
        media_type: MediaType,
        formats: &[Format],
    ) -> Result<SeasonalResponse>;

    async fn get_schedule(&self) -> Result<ScheduleResponse> {
        Ok(ScheduleResponse::default())
    }

    /// Every external id the provider knows, for backfill.
    async fn get_ids(&self) -> Result<Vec<String>>;
}

/// An anime or manga source searched for matching records.
#[async_trait]
pub trait SecondaryProvider: Provider {
    async fn search(
        &self,
        title: &str,
        format: Format,
        year: Option<i32>,
    ) -> Result<Vec<SearchResult>>;
}

/// A source of descriptive fields for an already mapped work.
#[async_trait]
pub trait InformationProvider: Provider {
    /// Returns `None` when the media has no mapping for this provider.
    async fn info(&self, media: &Media) -> Result<Option<MediaInfo>>;

    /// Fields this provider corroborates.
    fn shared_area(&self) -> Vec<MediaInfoKey> {
        Vec::new()
    }

    /// Fields this provider is authoritative for.
    fn priority_area(&self) -> Vec<MediaInfoKey> {
        Vec::new()
    }
}

/// One registry entry, tagged by role.
#[derive(Clone)]
pub enum ProviderKind {
    Base(Arc<dyn BaseProvider>),
    Anime(Arc<dyn SecondaryProvider>),
    Manga(Arc<dyn SecondaryProvider>),
    Information(Arc<dyn InformationProvider>),
}

impl ProviderKind {
    pub fn id(&self) -> &str {
        match self {
            ProviderKind::Base(p) => p.id(),
            ProviderKind::Anime(p) | ProviderKind::Manga(p) => p.id(),
            ProviderKind::Information(p) => p.id(),
        }
    }

    pub fn formats(&self) -> &[Format] {
        match self {
            ProviderKind::Base(p) => p.formats(),
            ProviderKind::Anime(p) | ProviderKind::Manga(p) => p.formats(),
            ProviderKind::Information(p) => p.formats(),
        }
    }
}

impl std::fmt::Debug for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match self {
            ProviderKind::Base(_) => "Base",
            ProviderKind::Anime(_) => "Anime",
            ProviderKind::Manga(_) => "Manga",
            ProviderKind::Information(_) => "Information",
        };
        write!(f, "{}({})", role, self.id())
    }
}

/// A collection of providers, queried by role and format.
///
/// Registration order is preserved and decides which base provider wins
/// when several support the same format.
#[derive(Debug, Clone, Default)]
pub struct Providers {
    entries: Vec<ProviderKind>,
}

impl Providers {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, provider: ProviderKind) -> &mut Self {
        self.entries.push(provider);
        self
    }

    pub fn add_base(&mut self, provider: impl BaseProvider + 'static) -> &mut Self {
        self.add(ProviderKind::Base(Arc::new(provider)))
    }

    pub fn add_anime(&mut self, provider: impl SecondaryProvider + 'static) -> &mut Self {
        self.add(ProviderKind::Anime(Arc::new(provider)))
    }

    pub fn add_manga(&mut self, provider: impl SecondaryProvider + 'static) -> &mut Self {
        self.add(ProviderKind::Manga(Arc::new(provider)))
    }

    pub fn add_information(&mut self, provider: impl InformationProvider + 'static) -> &mut Self {
        self.add(ProviderKind::Information(Arc::new(provider)))
    }

    /// Every registered base provider, in registration order.
    pub fn base(&self) -> Vec<Arc<dyn BaseProvider>> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                ProviderKind::Base(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    /// The first base provider supporting `format`.
    pub fn base_for(&self, format: Format) -> Option<Arc<dyn BaseProvider>> {
        self.base().into_iter().find(|p| p.supports(format))
    }

    /// Secondary providers of the given media type that support `format`.
    pub fn secondary_for(
        &self,
        media_type: MediaType,
        format: Format,
    ) -> Vec<Arc<dyn SecondaryProvider>> {
        self.entries
            .iter()
            .filter_map(|entry| match (entry, media_type) {
                (ProviderKind::Anime(p), MediaType::Anime) => Some(p.clone()),
                (ProviderKind::Manga(p), MediaType::Manga) => Some(p.clone()),
                _ => None,
            })
            .filter(|p| p.supports(format))
            .collect()
    }

    pub fn information(&self) -> Vec<Arc<dyn InformationProvider>> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                ProviderKind::Information(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    /// Entries registered under `id`, across all roles.
    pub fn get(&self, id: &str) -> Vec<&ProviderKind> {
        self.entries.iter().filter(|entry| entry.id() == id).collect()
    }

    /// Distinct provider ids, sorted.
    pub fn list_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.id().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderKind> {
        self.entries.iter()
    }

    /// Number of registry entries; a provider with several roles counts once
    /// per role.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
