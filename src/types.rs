//! Core data types for authoritative records, provider hits and mapped media.
//!
//! This module defines the fundamental data structures used throughout Tsunagi:
//!
//! - [`Title`] - Localized names where absence is distinct from an empty string
//! - [`MediaInfo`] - The authoritative record fetched from a base provider
//! - [`SearchResult`] - One hit from a secondary provider
//! - [`MappedResult`] - A secondary hit accepted by the matcher
//! - [`Media`] / [`Mapping`] - The canonical aggregate and its provider links
//! - [`AdvancedSearchParams`] - Filters for a base provider's advanced search
//!
//! # Examples
//!
//! ```rust
//! use tsunagi::types::*;
//!
//! let title = Title {
//!     english: Some("Mushoku Tensei".to_string()),
//!     romaji: None,
//!     native: Some(String::new()),
//! };
//!
//! assert!(title.is_found());
//! assert_eq!(title.primary(), Some("Mushoku Tensei"));
//! assert_eq!(title.variants().count(), 1);
//! ```

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Kind of work a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    Anime,
    Manga,
}

/// Capability class of a secondary provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderType {
    Anime,
    Manga,
}

impl From<MediaType> for ProviderType {
    fn from(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Anime => ProviderType::Anime,
            MediaType::Manga => ProviderType::Manga,
        }
    }
}

/// Publication format of a work.
///
/// `Unknown` means "not known" and never causes a format mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Format {
    Tv,
    TvShort,
    Movie,
    Special,
    Ova,
    Ona,
    Music,
    Manga,
    Novel,
    OneShot,
    #[default]
    Unknown,
}

impl Format {
    /// Returns `true` unless the format is [`Format::Unknown`].
    pub fn is_known(self) -> bool {
        self != Format::Unknown
    }
}

/// Airing season of a work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
    #[default]
    Unknown,
}

/// Localized names of a work.
///
/// Each field is independently optional. An absent field is skipped by the
/// matcher, while a present-but-empty one is treated the same way only after
/// an explicit emptiness check, so the two states stay distinguishable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Title {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

impl Title {
    /// A title set is found when at least one field is present and non-empty.
    pub fn is_found(&self) -> bool {
        self.variants().next().is_some()
    }

    /// The display title: English, then romaji, then native.
    pub fn primary(&self) -> Option<&str> {
        self.variants().next()
    }

    /// Non-empty title fields in English, romaji, native order.
    pub fn variants(&self) -> impl Iterator<Item = &str> {
        [&self.english, &self.romaji, &self.native]
            .into_iter()
            .filter_map(|t| t.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

/// One hit returned by a secondary provider's search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub alt_titles: Vec<String>,
    pub year: Option<i32>,
    #[serde(default)]
    pub format: Format,
    pub provider_id: String,
    pub img: Option<String>,
}

impl SearchResult {
    /// The display title followed by every non-empty alternate title.
    pub fn candidate_titles(&self) -> Vec<String> {
        std::iter::once(&self.title)
            .chain(self.alt_titles.iter())
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect()
    }
}

/// The authoritative record for a work, as returned by a base provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub id: String,
    pub title: Title,
    #[serde(default)]
    pub synonyms: Vec<String>,
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub format: Format,
    pub year: Option<i32>,
    #[serde(default)]
    pub season: Season,
    pub status: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub banner_image: Option<String>,
    pub country_of_origin: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub total_episodes: Option<i32>,
    pub current_episode: Option<i32>,
    pub duration: Option<i32>,
    pub total_chapters: Option<i32>,
    pub total_volumes: Option<i32>,
    pub rating: Option<f64>,
    pub popularity: Option<f64>,
}

impl MediaInfo {
    /// Every non-empty title variant followed by every non-empty synonym.
    pub fn title_variants(&self) -> Vec<String> {
        self.title
            .variants()
            .map(str::to_string)
            .chain(
                self.synonyms
                    .iter()
                    .filter(|s| !s.trim().is_empty())
                    .cloned(),
            )
            .collect()
    }
}

/// A secondary search hit accepted by the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedResult {
    pub id: String,
    pub slug: String,
    pub data: SearchResult,
    pub similarity: f64,
}

impl MappedResult {
    pub fn provider_id(&self) -> &str {
        &self.data.provider_id
    }
}

/// A link from a canonical [`Media`] to one provider's identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub id: String,
    pub provider_id: String,
    pub provider_type: Option<ProviderType>,
    pub similarity: f64,
}

/// The canonical aggregate entity, one per real-world work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: String,
    pub slug: String,
    pub media_type: MediaType,
    pub title: Title,
    #[serde(default)]
    pub mappings: Vec<Mapping>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub format: Format,
    pub year: Option<i32>,
    #[serde(default)]
    pub season: Season,
    pub status: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub banner_image: Option<String>,
    pub country_of_origin: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub total_episodes: Option<i32>,
    pub total_chapters: Option<i32>,
    pub total_volumes: Option<i32>,
}

impl Media {
    /// Creates an empty aggregate with every descriptive field absent.
    pub fn new(id: impl Into<String>, slug: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            media_type,
            title: Title::default(),
            mappings: Vec::new(),
            synonyms: Vec::new(),
            format: Format::Unknown,
            year: None,
            season: Season::Unknown,
            status: None,
            description: None,
            cover_image: None,
            banner_image: None,
            country_of_origin: None,
            genres: Vec::new(),
            tags: Vec::new(),
            author: None,
            publisher: None,
            total_episodes: None,
            total_chapters: None,
            total_volumes: None,
        }
    }

    /// Looks up the mapping recorded for a provider.
    pub fn mapping_for(&self, provider_id: &str) -> Option<&Mapping> {
        self.mappings.iter().find(|m| m.provider_id == provider_id)
    }
}

/// Descriptive fields an information provider can declare itself
/// authoritative or corroborative for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaInfoKey {
    Title,
    Synonyms,
    Description,
    CoverImage,
    BannerImage,
    Artwork,
    Genres,
    Tags,
    Year,
    Status,
    CountryOfOrigin,
    Author,
    Publisher,
    TotalChapters,
    TotalVolumes,
    TotalEpisodes,
}

/// Lists returned by a base provider's seasonal endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeasonalResponse {
    pub seasonal: Vec<MediaInfo>,
    pub trending: Vec<MediaInfo>,
    pub popular: Vec<MediaInfo>,
    pub top: Vec<MediaInfo>,
}

/// Airing schedule grouped by weekday.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub sunday: Vec<MediaInfo>,
    pub monday: Vec<MediaInfo>,
    pub tuesday: Vec<MediaInfo>,
    pub wednesday: Vec<MediaInfo>,
    pub thursday: Vec<MediaInfo>,
    pub friday: Vec<MediaInfo>,
    pub saturday: Vec<MediaInfo>,
}

/// Parameters for a base provider's advanced search.
///
/// Genre and tag names are human-readable; providers resolve them to their
/// own identifiers before searching and silently drop names they don't know.
///
/// # Builder Usage
///
/// ```rust
/// use tsunagi::types::{AdvancedSearchParamsBuilder, Format, MediaType};
///
/// let params = AdvancedSearchParamsBuilder::default()
///     .query("isekai")
///     .media_type(MediaType::Manga)
///     .formats(vec![Format::Manga])
///     .tags(vec!["Aliens".to_string()])
///     .tags_excluded(vec!["Harem".to_string()])
///     .build()
///     .unwrap();
///
/// assert_eq!(params.per_page, 25);
/// assert!(params.year.is_none());
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct AdvancedSearchParams {
    #[builder(default)]
    pub query: String,
    pub media_type: MediaType,
    #[builder(default)]
    pub formats: Vec<Format>,
    #[builder(default)]
    pub page: u32,
    #[builder(default = "25")]
    pub per_page: u32,
    #[builder(default)]
    pub genres: Vec<String>,
    #[builder(default)]
    pub genres_excluded: Vec<String>,
    #[builder(default)]
    pub season: Season,
    #[builder(default)]
    pub year: Option<i32>,
    #[builder(default)]
    pub tags: Vec<String>,
    #[builder(default)]
    pub tags_excluded: Vec<String>,
}

/// One resolution request handed to the mapping pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingRequest {
    pub id: String,
    pub media_type: MediaType,
    pub formats: Vec<Format>,
}

impl MappingRequest {
    pub fn new(id: impl Into<String>, media_type: MediaType, formats: Vec<Format>) -> Self {
        Self {
            id: id.into(),
            media_type,
            formats,
        }
    }

    /// The format providers are filtered by: the first requested one.
    pub fn primary_format(&self) -> Format {
        self.formats.first().copied().unwrap_or_default()
    }
}
