use std::time::Duration;

/// A resolved, playable track.
///
/// Built by a [`TrackResolver`](crate::sources::TrackResolver) through the
/// `with_*` builders and never mutated once it enters a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    playable_reference: String,
    duration_secs: u64,
    requested_by: String,
    artist: Option<String>,
    thumbnail_url: Option<String>,
    source_metadata: Option<String>,
}

impl Track {
    pub fn new(title: impl Into<String>, playable_reference: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            playable_reference: playable_reference.into(),
            duration_secs: 0,
            requested_by: String::new(),
            artist: None,
            thumbnail_url: None,
            source_metadata: None,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn playable_reference(&self) -> &str {
        &self.playable_reference
    }
    /// Zero when unknown (live streams, sources without length info).
    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
    pub fn requested_by(&self) -> &str {
        &self.requested_by
    }
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }
    /// Catalog-specific id, kept for "more like this" lookups.
    pub fn source_metadata(&self) -> Option<&str> {
        self.source_metadata.as_deref()
    }

    // Builders
    pub fn with_duration_secs(mut self, duration_secs: u64) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    pub fn with_requested_by(mut self, requested_by: impl Into<String>) -> Self {
        self.requested_by = requested_by.into();
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_thumbnail_url(mut self, thumbnail_url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(thumbnail_url.into());
        self
    }

    pub fn with_source_metadata(mut self, source_metadata: impl Into<String>) -> Self {
        self.source_metadata = Some(source_metadata.into());
        self
    }

    /// `m:ss`, or `h:mm:ss` past the hour. Unknown durations render as `0:00`.
    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration())
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
