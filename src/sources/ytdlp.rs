use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::{debug, info};

use super::MusicSource;
use crate::audio::Track;

static YOUTUBE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|shorts/)|youtu\.be/)([a-zA-Z0-9_-]{11})")
        .unwrap_or_else(|e| unreachable!("invalid YouTube id pattern: {e}"))
});

/// yt-dlp output for a single video, or for a search playlist wrapping it.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    #[serde(default)]
    is_live: Option<bool>,
    #[serde(default)]
    entries: Option<Vec<YtDlpInfo>>,
}

/// Any site yt-dlp supports, plus free-text YouTube search.
pub struct YtDlpSource {
    binary: String,
}

impl YtDlpSource {
    pub fn new() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
        }
    }

    /// Checks that yt-dlp is installed, returning its version.
    pub async fn version(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("could not run {}", self.binary))?;

        if !output.status.success() {
            anyhow::bail!("{} --version exited with {}", self.binary, output.status);
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("✅ yt-dlp version: {}", version);
        Ok(version)
    }
}

impl Default for YtDlpSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MusicSource for YtDlpSource {
    fn source_name(&self) -> &'static str {
        "yt-dlp"
    }

    fn can_handle(&self, _query: &str) -> bool {
        true
    }

    async fn lookup(&self, query: &str) -> Result<Option<Track>> {
        debug!("🔧 yt-dlp lookup: {}", query);

        let output = Command::new(&self.binary)
            .args([
                "--dump-single-json",
                "--no-playlist",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
                "--quiet",
                "--default-search",
                "ytsearch1",
                "--socket-timeout",
                "15",
                "--",
                query,
            ])
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("could not run {}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("No video results") || stderr.contains("Unsupported URL") {
                return Ok(None);
            }
            anyhow::bail!("yt-dlp failed: {}", stderr.trim());
        }

        parse_info(&output.stdout)
    }
}

fn parse_info(json: &[u8]) -> Result<Option<Track>> {
    let info: YtDlpInfo = serde_json::from_slice(json).context("unexpected yt-dlp output")?;

    let info = match info.entries {
        Some(entries) => match entries.into_iter().next() {
            Some(first) => first,
            None => return Ok(None),
        },
        None => info,
    };

    let reference = match (&info.webpage_url, &info.id) {
        (Some(url), _) => url.clone(),
        (None, Some(id)) if id.len() == 11 => format!("https://www.youtube.com/watch?v={}", id),
        _ => return Ok(None),
    };

    let title = info.title.unwrap_or_else(|| reference.clone());
    let duration = if info.is_live.unwrap_or(false) {
        0
    } else {
        info.duration.map_or(0, |secs| secs.max(0.0).round() as u64)
    };

    let mut track = Track::new(title, reference).with_duration_secs(duration);
    if let Some(artist) = info.uploader.or(info.channel) {
        track = track.with_artist(artist);
    }
    if let Some(thumbnail) = info.thumbnail {
        track = track.with_thumbnail_url(thumbnail);
    }
    if let Some(id) = info.id {
        track = track.with_source_metadata(id);
    }

    Ok(Some(track))
}

/// Extracts the video id from any form of YouTube link.
pub fn youtube_video_id(url: &str) -> Option<&str> {
    YOUTUBE_ID
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str())
}
