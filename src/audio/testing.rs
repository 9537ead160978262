//! In-memory voice backend for exercising the session state machine.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::watch;

use super::{
    track::Track,
    transport::{AudioTransport, EventSender, StreamId, TransportError, TransportEvent, VoiceConnection},
};
use crate::sources::{ResolveError, TrackResolver};

#[derive(Default)]
struct GuildLine {
    events: Option<EventSender>,
    current: Option<StreamId>,
    played: Vec<String>,
    volume: Option<f32>,
    paused: bool,
    connected: bool,
}

#[derive(Default)]
struct Inner {
    denied: HashSet<ChannelId>,
    broken: HashSet<String>,
    guilds: HashMap<GuildId, GuildLine>,
    opens: usize,
    connects: usize,
}

/// Scriptable transport: deny channels, break references, hold stream opens
/// and fire idle/error/disconnect events on demand.
#[derive(Clone)]
pub struct FakeTransport {
    inner: Arc<Mutex<Inner>>,
    gate: Arc<watch::Sender<bool>>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            inner: Arc::default(),
            gate: Arc::new(gate),
        }
    }
}

impl FakeTransport {
    pub fn deny(&self, channel_id: ChannelId) {
        self.inner.lock().denied.insert(channel_id);
    }

    pub fn break_reference(&self, reference: &str) {
        self.inner.lock().broken.insert(reference.to_string());
    }

    /// Stream opens block until [`release_opens`](Self::release_opens).
    pub fn hold_opens(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_opens(&self) {
        self.gate.send_replace(true);
    }

    /// The current stream ran to its end.
    pub fn finish_current(&self, guild_id: GuildId) {
        self.fire(guild_id, |stream| TransportEvent::Idle { stream });
    }

    pub fn fail_current(&self, guild_id: GuildId, message: &str) {
        self.fire(guild_id, |stream| TransportEvent::Error {
            stream,
            message: message.to_string(),
        });
    }

    /// Sends an event for a stream that is not (or no longer) playing.
    pub fn send_raw(&self, guild_id: GuildId, event: TransportEvent) {
        if let Some(events) = self.line(guild_id, |line| line.events.clone()).flatten() {
            let _ = events.send(event);
        }
    }

    pub fn drop_connection(&self, guild_id: GuildId) {
        self.send_raw(guild_id, TransportEvent::Disconnected);
    }

    pub fn played(&self, guild_id: GuildId) -> Vec<String> {
        self.line(guild_id, |line| line.played.clone()).unwrap_or_default()
    }

    pub fn current_stream(&self, guild_id: GuildId) -> Option<StreamId> {
        self.line(guild_id, |line| line.current).flatten()
    }

    pub fn volume(&self, guild_id: GuildId) -> Option<f32> {
        self.line(guild_id, |line| line.volume).flatten()
    }

    pub fn is_paused(&self, guild_id: GuildId) -> bool {
        self.line(guild_id, |line| line.paused).unwrap_or(false)
    }

    pub fn is_connected(&self, guild_id: GuildId) -> bool {
        self.line(guild_id, |line| line.connected).unwrap_or(false)
    }

    pub fn opens(&self) -> usize {
        self.inner.lock().opens
    }

    pub fn connects(&self) -> usize {
        self.inner.lock().connects
    }

    fn line<R>(&self, guild_id: GuildId, read: impl FnOnce(&GuildLine) -> R) -> Option<R> {
        self.inner.lock().guilds.get(&guild_id).map(read)
    }

    fn fire(&self, guild_id: GuildId, event: impl FnOnce(StreamId) -> TransportEvent) {
        let target = {
            let inner = self.inner.lock();
            inner
                .guilds
                .get(&guild_id)
                .and_then(|line| Some((line.events.clone()?, line.current?)))
        };
        if let Some((events, stream)) = target {
            let _ = events.send(event(stream));
        }
    }
}

#[async_trait]
impl AudioTransport for FakeTransport {
    type Connection = FakeConnection;

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: EventSender,
    ) -> Result<FakeConnection, TransportError> {
        let mut inner = self.inner.lock();
        if inner.denied.contains(&channel_id) {
            return Err(TransportError::PermissionDenied(format!(
                "missing CONNECT in {}",
                channel_id
            )));
        }

        inner.connects += 1;
        let line = inner.guilds.entry(guild_id).or_default();
        line.events = Some(events);
        line.connected = true;

        Ok(FakeConnection {
            guild_id,
            transport: self.clone(),
        })
    }
}

pub struct FakeConnection {
    guild_id: GuildId,
    transport: FakeTransport,
}

#[derive(Debug)]
pub struct FakeStream(String);

impl FakeConnection {
    fn with_line<R>(&self, update: impl FnOnce(&mut GuildLine) -> R) -> R {
        let mut inner = self.transport.inner.lock();
        update(inner.guilds.entry(self.guild_id).or_default())
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    type Stream = FakeStream;

    async fn open_stream(&self, playable_reference: &str) -> Result<FakeStream, TransportError> {
        let mut gate = self.transport.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        let mut inner = self.transport.inner.lock();
        inner.opens += 1;
        if inner.broken.contains(playable_reference) {
            return Err(TransportError::OpenFailed(playable_reference.to_string()));
        }
        Ok(FakeStream(playable_reference.to_string()))
    }

    async fn play(&self, stream: FakeStream, id: StreamId, volume: f32) -> Result<(), TransportError> {
        self.with_line(|line| {
            line.current = Some(id);
            line.played.push(stream.0);
            line.volume = Some(volume);
            line.paused = false;
        });
        Ok(())
    }

    fn pause(&self) -> Result<(), TransportError> {
        self.with_line(|line| line.paused = true);
        Ok(())
    }

    fn resume(&self) -> Result<(), TransportError> {
        self.with_line(|line| line.paused = false);
        Ok(())
    }

    fn stop(&self) -> Result<(), TransportError> {
        self.with_line(|line| line.current = None);
        Ok(())
    }

    fn set_volume(&self, volume: f32) -> Result<(), TransportError> {
        self.with_line(|line| line.volume = Some(volume));
        Ok(())
    }

    async fn disconnect(&self) {
        self.with_line(|line| {
            line.current = None;
            line.connected = false;
            line.events = None;
        });
    }
}

/// Resolves every query to a track whose title and reference are the query
/// itself. `"missing"` resolves to nothing.
pub struct EchoResolver;

#[async_trait]
impl TrackResolver for EchoResolver {
    async fn resolve(&self, query: &str) -> Result<Track, ResolveError> {
        if query == "missing" {
            return Err(ResolveError::NotFound);
        }
        Ok(Track::new(query, query).with_duration_secs(180))
    }
}
