//! Seam between the session state machine and the voice backend.
//!
//! The registry only ever talks to these traits. [`super::voice`] implements
//! them on top of songbird; tests use an in-memory fake.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use thiserror::Error;
use tokio::sync::mpsc;

/// Identifies one started stream so late events from a replaced stream can
/// be told apart from the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

/// Events a connection reports back to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The stream finished (or was stopped).
    Idle { stream: StreamId },
    /// The stream died mid-playback.
    Error { stream: StreamId, message: String },
    /// The voice connection dropped.
    Disconnected,
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("stream open failed: {0}")]
    OpenFailed(String),

    #[error("playback control failed: {0}")]
    Playback(String),

    #[error("not connected")]
    NotConnected,
}

/// Opens voice connections.
#[async_trait]
pub trait AudioTransport: Send + Sync + 'static {
    type Connection: VoiceConnection;

    /// Joins `channel_id`. Stream and connection events for the returned
    /// connection are delivered on `events`.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: EventSender,
    ) -> Result<Self::Connection, TransportError>;
}

/// A live voice connection with a single audio player.
///
/// Volume is a linear gain where `1.0` is unity.
#[async_trait]
pub trait VoiceConnection: Send + Sync + 'static {
    type Stream: Send + 'static;

    async fn open_stream(&self, playable_reference: &str) -> Result<Self::Stream, TransportError>;

    /// Starts `stream`, replacing anything currently playing.
    async fn play(&self, stream: Self::Stream, id: StreamId, volume: f32) -> Result<(), TransportError>;

    fn pause(&self) -> Result<(), TransportError>;

    fn resume(&self) -> Result<(), TransportError>;

    fn stop(&self) -> Result<(), TransportError>;

    fn set_volume(&self, volume: f32) -> Result<(), TransportError>;

    async fn disconnect(&self);
}

/// Converts a stored percentage volume into transport gain.
pub fn gain(volume: i32) -> f32 {
    volume.max(0) as f32 / 100.0
}
