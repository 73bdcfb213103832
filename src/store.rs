//! Read side of canonical record storage.
//!
//! The pipeline only asks whether a work was already resolved. Persisting the
//! [`Media`] it builds is left to the embedder, who can implement
//! [`MediaStore`] over any database. [`MemoryStore`] keeps everything in
//! process and is what the tests use.
//!
//! # Examples
//!
//! ```rust
//! use tsunagi::store::{MediaStore, MemoryStore};
//! use tsunagi::types::{Media, MediaType};
//!
//! # async fn example() -> tsunagi::Result<()> {
//! let store = MemoryStore::new();
//! store.insert(Media::new("abc", "mushoku-tensei", MediaType::Manga));
//!
//! assert!(store.get("abc", MediaType::Manga).await?.is_some());
//! assert!(store.get("abc", MediaType::Anime).await?.is_none());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::{
    error::Result,
    types::{Media, MediaType},
};

/// Lookup of existing canonical records.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Returns the record stored under `id` for the given type, if any.
    async fn get(&self, id: &str, media_type: MediaType) -> Result<Option<Media>>;
}

/// In-process store keyed by media type and id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(MediaType, String), Media>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record, replacing any previous one with the same type and id.
    pub fn insert(&self, media: Media) -> Option<Media> {
        self.records
            .write()
            .insert((media.media_type, media.id.clone()), media)
    }

    pub fn remove(&self, id: &str, media_type: MediaType) -> Option<Media> {
        self.records.write().remove(&(media_type, id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn get(&self, id: &str, media_type: MediaType) -> Result<Option<Media>> {
        Ok(self
            .records
            .read()
            .get(&(media_type, id.to_string()))
            .cloned())
    }
}
