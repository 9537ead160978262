//! # Cache Module
//!
//! Resolution cache for the track resolver.
//!
//! Resolving a query means spawning yt-dlp or probing a URL, which takes
//! seconds. Popular queries are requested over and over, so resolved
//! [`Track`]s are kept in a bounded LRU cache with a time-to-live.
//!
//! ## Configuration
//!
//! ```env
//! CACHE_SIZE=256   # Maximum number of resolved queries
//! CACHE_TTL=1h     # Time-to-live per entry
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use guild_jukebox::{audio::Track, cache::ResolveCache};
//! use std::time::Duration;
//!
//! # fn example() {
//! let cache = ResolveCache::new(256, Duration::from_secs(3600));
//! cache.put("Never Gonna Give You Up", Track::new("Never Gonna Give You Up", "https://youtu.be/dQw4w9WgXcQ"));
//!
//! if let Some(track) = cache.get("  never gonna give you up ") {
//!     println!("cached: {}", track.title());
//! }
//! # }
//! ```

pub mod lru_cache;

use lru_cache::{CacheMetrics, LRUCache};
use std::time::Duration;
use tracing::debug;

use crate::{audio::Track, sources::ytdlp::youtube_video_id};

/// Resolved tracks keyed by normalized query.
#[derive(Debug, Clone)]
pub struct ResolveCache {
    inner: LRUCache<String, Track>,
}

impl ResolveCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: LRUCache::with_ttl(capacity, Some(ttl)),
        }
    }

    pub fn get(&self, query: &str) -> Option<Track> {
        let hit = self.inner.get(&normalize(query));
        if hit.is_some() {
            debug!("💾 Cache hit for `{}`", query);
        }
        hit
    }

    pub fn put(&self, query: &str, track: Track) {
        self.inner.insert(normalize(query), track);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.inner.metrics()
    }
}

/// Case and surrounding whitespace do not change what a search resolves to,
/// and every form of a YouTube link shares one entry. Other links are kept
/// verbatim since their paths are case-sensitive.
fn normalize(query: &str) -> String {
    if let Some(id) = youtube_video_id(query) {
        return format!("youtube:{}", id);
    }
    let query = query.trim();
    if url::Url::parse(query).is_ok() {
        return query.to_string();
    }
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
