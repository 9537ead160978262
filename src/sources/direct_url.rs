use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::MusicSource;
use crate::audio::Track;

const AUDIO_EXTENSIONS: [&str; 8] = [".mp3", ".wav", ".ogg", ".flac", ".m4a", ".opus", ".aac", ".webm"];

/// Links straight to an audio file, streamed over HTTP without yt-dlp.
pub struct DirectUrlSource {
    client: reqwest::Client,
}

impl DirectUrlSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (compatible; Discord Music Bot)")
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MusicSource for DirectUrlSource {
    fn source_name(&self) -> &'static str {
        "direct"
    }

    fn can_handle(&self, query: &str) -> bool {
        is_direct_audio_url(query)
    }

    async fn lookup(&self, query: &str) -> Result<Option<Track>> {
        let response = self.client.head(query).send().await?;
        if !response.status().is_success() {
            debug!("🔗 {} answered {}", query, response.status());
            return Ok(None);
        }

        let title = title_from_url(query).unwrap_or_else(|| query.to_string());
        Ok(Some(Track::new(title, query)))
    }
}

/// An http(s) URL whose path ends in a known audio extension.
pub fn is_direct_audio_url(candidate: &str) -> bool {
    let Ok(url) = Url::parse(candidate) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }

    let path = url.path().to_lowercase();
    AUDIO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// File name without extension, e.g. `https://x.io/a/My%20Song.mp3` -> `My Song`.
fn title_from_url(candidate: &str) -> Option<String> {
    let url = Url::parse(candidate).ok()?;
    let file = url.path_segments()?.next_back()?;
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    let title = stem.replace("%20", " ").replace(['_', '+'], " ");
    let title = title.trim();

    (!title.is_empty()).then(|| title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn detects_audio_links() {
        assert!(is_direct_audio_url("https://cdn.example.com/music/song.mp3"));
        assert!(is_direct_audio_url("http://example.com/a/B.FLAC?token=1"));
        assert!(!is_direct_audio_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(!is_direct_audio_url("ftp://example.com/song.mp3"));
        assert!(!is_direct_audio_url("song.mp3"));
        assert!(!is_direct_audio_url("never gonna give you up"));
    }

    #[test]
    fn titles_come_from_the_file_name() {
        assert_eq!(
            title_from_url("https://x.io/a/My%20Song_live.mp3"),
            Some("My Song live".to_string())
        );
        assert_eq!(title_from_url("https://x.io/.mp3"), None);
    }
}
