//! Track resolution: turns a free-text query or a link into a playable [`Track`].

pub mod direct_url;
pub mod ytdlp;

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub use direct_url::DirectUrlSource;
pub use ytdlp::YtDlpSource;

use crate::{audio::Track, cache::ResolveCache, config::Config};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no results")]
    NotFound,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// What the session registry asks for a track.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Track, ResolveError>;
}

/// One catalog the resolver can consult.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MusicSource: Send + Sync {
    /// Name used in logs.
    fn source_name(&self) -> &'static str;

    /// Whether this source understands `query` at all.
    fn can_handle(&self, query: &str) -> bool;

    /// `Ok(None)` when the source answered but found nothing.
    async fn lookup(&self, query: &str) -> anyhow::Result<Option<Track>>;
}

/// Asks each source in order until one returns a track.
///
/// Every source gets its own timeout; hits are cached by normalized query.
pub struct FallbackResolver {
    sources: Vec<Arc<dyn MusicSource>>,
    timeout_per_source: Duration,
    cache: ResolveCache,
}

impl FallbackResolver {
    pub fn new(
        sources: Vec<Arc<dyn MusicSource>>,
        timeout_per_source: Duration,
        cache: ResolveCache,
    ) -> Self {
        Self {
            sources,
            timeout_per_source,
            cache,
        }
    }

    /// Direct audio links first, then yt-dlp (links and search).
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let sources: Vec<Arc<dyn MusicSource>> = vec![
            Arc::new(DirectUrlSource::new()?),
            Arc::new(YtDlpSource::new()),
        ];

        Ok(Self::new(
            sources,
            config.resolve_timeout,
            ResolveCache::new(config.cache_size, config.cache_ttl),
        ))
    }

    pub fn cache(&self) -> &ResolveCache {
        &self.cache
    }
}

#[async_trait]
impl TrackResolver for FallbackResolver {
    async fn resolve(&self, query: &str) -> Result<Track, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::NotFound);
        }

        if let Some(track) = self.cache.get(query) {
            return Ok(track);
        }

        let mut last_error = None;

        for source in self.sources.iter().filter(|source| source.can_handle(query)) {
            debug!("🔍 Trying {} for `{}`", source.source_name(), query);

            match timeout(self.timeout_per_source, source.lookup(query)).await {
                Ok(Ok(Some(track))) => {
                    info!("✅ {} resolved `{}` -> {}", source.source_name(), query, track.title());
                    self.cache.put(query, track.clone());
                    return Ok(track);
                }
                Ok(Ok(None)) => {
                    debug!("⚠️ {} found nothing for `{}`", source.source_name(), query);
                }
                Ok(Err(e)) => {
                    warn!("❌ {} failed for `{}`: {}", source.source_name(), query, e);
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(
                        "⏰ {} timed out after {:?} for `{}`",
                        source.source_name(),
                        self.timeout_per_source,
                        query
                    );
                    last_error = Some(anyhow::anyhow!(
                        "{} timed out after {:?}",
                        source.source_name(),
                        self.timeout_per_source
                    ));
                }
            }
        }

        match last_error {
            Some(e) => Err(ResolveError::Backend(e)),
            None => Err(ResolveError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    fn source(name: &'static str) -> MockMusicSource {
        let mut source = MockMusicSource::new();
        source.expect_source_name().return_const(name);
        source
    }

    fn resolver(sources: Vec<MockMusicSource>) -> FallbackResolver {
        FallbackResolver::new(
            sources
                .into_iter()
                .map(|source| Arc::new(source) as Arc<dyn MusicSource>)
                .collect(),
            Duration::from_secs(1),
            ResolveCache::new(16, Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn falls_back_to_next_source() {
        let mut first = source("first");
        first.expect_can_handle().return_const(true);
        first
            .expect_lookup()
            .returning(|_| Err(anyhow::anyhow!("catalog down")));

        let mut second = source("second");
        second.expect_can_handle().return_const(true);
        second
            .expect_lookup()
            .with(eq("lofi beats"))
            .times(1)
            .returning(|_| Ok(Some(Track::new("Lofi Beats", "https://youtu.be/abc"))));

        let resolver = resolver(vec![first, second]);
        let track = resolver.resolve("  lofi beats ").await.unwrap();
        assert_eq!(track.title(), "Lofi Beats");
    }

    #[tokio::test]
    async fn skips_sources_that_cannot_handle_the_query() {
        let mut direct = source("direct");
        direct.expect_can_handle().return_const(false);
        direct.expect_lookup().never();

        let mut search = source("search");
        search.expect_can_handle().return_const(true);
        search
            .expect_lookup()
            .returning(|query| Ok(Some(Track::new(query, query))));

        let track = resolver(vec![direct, search]).resolve("anything").await.unwrap();
        assert_eq!(track.playable_reference(), "anything");
    }

    #[tokio::test]
    async fn caches_hits() {
        let mut only = source("only");
        only.expect_can_handle().return_const(true);
        only.expect_lookup()
            .times(1)
            .returning(|_| Ok(Some(Track::new("Song", "ref"))));

        let resolver = resolver(vec![only]);
        resolver.resolve("Song").await.unwrap();
        let again = resolver.resolve("song").await.unwrap();
        assert_eq!(again.title(), "Song");
        assert_eq!(resolver.cache().metrics().hits, 1);
    }

    #[tokio::test]
    async fn nothing_found_vs_backend_failure() {
        let mut empty = source("empty");
        empty.expect_can_handle().return_const(true);
        empty.expect_lookup().returning(|_| Ok(None));
        assert!(matches!(
            resolver(vec![empty]).resolve("zzz").await,
            Err(ResolveError::NotFound)
        ));

        let mut broken = source("broken");
        broken.expect_can_handle().return_const(true);
        broken
            .expect_lookup()
            .returning(|_| Err(anyhow::anyhow!("yt-dlp exploded")));
        assert!(matches!(
            resolver(vec![broken]).resolve("zzz").await,
            Err(ResolveError::Backend(_))
        ));

        assert!(matches!(
            resolver(vec![]).resolve("   ").await,
            Err(ResolveError::NotFound)
        ));
    }
}
