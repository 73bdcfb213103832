//! MangaDex API wire models and their conversion into crate types.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

use super::{COVER_URL, PROVIDER_ID};
use crate::types::{Format, MediaInfo, MediaType, SearchResult, Title};

/// Display-title language priority for secondary search results.
const DISPLAY_LANGUAGES: &[&str] = &["en", "ja-ro", "jp-ro", "jp", "ja", "ko"];
const ROMAJI_LANGUAGES: &[&str] = &["ja-ro", "jp-ro"];
const NATIVE_LANGUAGES: &[&str] = &["jp", "ja", "ko"];

/// Localized strings keyed by language code.
pub(crate) type Localized = BTreeMap<String, String>;

/// MangaDex serializes an empty localized map as `[]`.
fn localized<'de, D>(deserializer: D) -> Result<Localized, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        Map(Localized),
        List(Vec<serde_json::Value>),
        Null(()),
    }

    Ok(match Field::deserialize(deserializer)? {
        Field::Map(map) => map,
        Field::List(_) | Field::Null(_) => Localized::new(),
    })
}

/// `{"data": [...]}` list envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// `{"data": {...}}` single-entity envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Entity<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MangaData {
    pub id: String,
    #[serde(default)]
    pub attributes: MangaAttributes,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MangaAttributes {
    #[serde(default, deserialize_with = "localized")]
    pub title: Localized,
    #[serde(default)]
    pub alt_titles: Vec<Localized>,
    #[serde(default, deserialize_with = "localized")]
    pub description: Localized,
    pub original_language: Option<String>,
    pub last_volume: Option<String>,
    pub last_chapter: Option<String>,
    pub status: Option<String>,
    pub year: Option<i32>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Relationship {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Option<RelationshipAttributes>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RelationshipAttributes {
    pub name: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Tag {
    pub id: String,
    pub attributes: TagAttributes,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagAttributes {
    #[serde(default, deserialize_with = "localized")]
    pub name: Localized,
    #[serde(default)]
    pub group: String,
}

impl Tag {
    pub fn english_name(&self) -> Option<&str> {
        self.attributes.name.get("en").map(|n| n.trim())
    }
}

/// A custom list, such as the curated seasonal list.
#[derive(Debug, Deserialize)]
pub(crate) struct ListData {
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl ListData {
    pub fn manga_ids(&self) -> Vec<String> {
        self.relationships
            .iter()
            .filter(|r| r.kind == "manga")
            .map(|r| r.id.clone())
            .collect()
    }
}

impl MangaAttributes {
    /// First value for any of `languages`, checking the main title map
    /// before the alternates.
    fn lookup(&self, languages: &[&str]) -> Option<String> {
        languages
            .iter()
            .find_map(|lang| self.title.get(*lang))
            .or_else(|| {
                self.alt_titles
                    .iter()
                    .find_map(|alt| languages.iter().find_map(|lang| alt.get(*lang)))
            })
            .cloned()
    }

    /// English prefers the alternates, since MangaDex often keeps the
    /// romanized title under `en` in the main map.
    fn english(&self) -> Option<String> {
        self.alt_titles
            .iter()
            .find_map(|alt| alt.get("en"))
            .or_else(|| self.title.get("en"))
            .cloned()
    }

    fn title(&self) -> Title {
        Title {
            romaji: self.lookup(ROMAJI_LANGUAGES),
            english: self.english(),
            native: self.lookup(NATIVE_LANGUAGES),
        }
    }

    /// The display title for a search hit, first language found in
    /// priority order.
    fn display_title(&self) -> String {
        DISPLAY_LANGUAGES
            .iter()
            .find_map(|lang| {
                self.title
                    .get(*lang)
                    .or_else(|| self.alt_titles.iter().find_map(|alt| alt.get(*lang)))
            })
            .or_else(|| self.title.values().next())
            .cloned()
            .unwrap_or_default()
    }

    /// Every alternate and main title value, deduplicated in order.
    fn all_titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = Vec::new();
        let values = self
            .alt_titles
            .iter()
            .flat_map(|alt| alt.values())
            .chain(self.title.values());
        for value in values {
            if !value.trim().is_empty() && !titles.contains(value) {
                titles.push(value.clone());
            }
        }
        titles
    }

    fn format(&self) -> Format {
        let oneshot = self
            .tags
            .iter()
            .any(|tag| tag.english_name() == Some("Oneshot"));
        if oneshot { Format::OneShot } else { Format::Manga }
    }

    fn names_in_group(&self, group: &str) -> Vec<String> {
        self.tags
            .iter()
            .filter(|tag| tag.attributes.group == group)
            .filter_map(|tag| tag.english_name().map(str::to_string))
            .collect()
    }

    fn description(&self) -> Option<String> {
        self.description
            .get("en")
            .or_else(|| self.description.values().next())
            .filter(|d| !d.trim().is_empty())
            .cloned()
    }

    fn country_of_origin(&self) -> Option<String> {
        let language = self.original_language.as_deref()?;
        let country = match language {
            "ja" => "JP".to_string(),
            "ko" => "KR".to_string(),
            l if l.starts_with("zh") => "CN".to_string(),
            l => l.to_uppercase(),
        };
        Some(country)
    }
}

fn parse_count(value: &Option<String>) -> Option<i32> {
    value
        .as_deref()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|n| n as i32)
}

impl MangaData {
    fn related(&self, kind: &str) -> Option<&RelationshipAttributes> {
        self.relationships
            .iter()
            .filter(|r| r.kind == kind)
            .find_map(|r| r.attributes.as_ref())
    }

    pub fn cover_url(&self) -> Option<String> {
        self.related("cover_art")
            .and_then(|attributes| attributes.file_name.as_deref())
            .map(|file| format!("{}/{}/{}", COVER_URL, self.id, file))
    }

    pub fn into_media_info(self) -> MediaInfo {
        let attributes = &self.attributes;
        MediaInfo {
            id: self.id.clone(),
            title: attributes.title(),
            synonyms: attributes.all_titles(),
            media_type: Some(MediaType::Manga),
            format: attributes.format(),
            year: attributes.year.filter(|y| *y > 0),
            status: attributes.status.clone(),
            description: attributes.description(),
            cover_image: self.cover_url(),
            country_of_origin: attributes.country_of_origin(),
            genres: attributes.names_in_group("genre"),
            tags: attributes.names_in_group("theme"),
            author: self.related("author").and_then(|a| a.name.clone()),
            total_chapters: parse_count(&attributes.last_chapter),
            total_volumes: parse_count(&attributes.last_volume),
            ..MediaInfo::default()
        }
    }

    pub fn into_search_result(self) -> SearchResult {
        let attributes = &self.attributes;
        SearchResult {
            id: self.id.clone(),
            title: attributes.display_title(),
            alt_titles: attributes.all_titles(),
            year: attributes.year.filter(|y| *y > 0),
            format: attributes.format(),
            provider_id: PROVIDER_ID.to_string(),
            img: self.cover_url(),
        }
    }
}
