use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::{
    error::PlayerError,
    player::{Reply, RoomMessage, RoomPlayer, Stream},
    session::{Enqueued, PlayerEvent, Session, SessionSnapshot},
    state::CloseReason,
    track::Track,
    transport::AudioTransport,
};
use crate::{
    config::PlayerConfig,
    sources::{ResolveError, TrackResolver},
};

/// An enqueue that races a session shutting down is retried on a fresh session.
const ENQUEUE_ATTEMPTS: usize = 3;
const EVENT_BUFFER: usize = 256;

pub(crate) struct RoomHandle<T: AudioTransport> {
    pub(crate) inbox: mpsc::UnboundedSender<RoomMessage<Stream<T>>>,
    pub(crate) snapshot: watch::Receiver<SessionSnapshot>,
    pub(crate) epoch: u64,
}

impl<T: AudioTransport> Clone for RoomHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inbox: self.inbox.clone(),
            snapshot: self.snapshot.clone(),
            epoch: self.epoch,
        }
    }
}

/// Owns every guild's session and is the only way to reach one.
///
/// Each session runs as its own task; the registry hands commands to that
/// task and waits for the answer. Commands for one guild are therefore
/// applied strictly in arrival order, interleaved with the session's own
/// events (track ended, stream errors, auto-leave), while different guilds
/// never wait on each other.
///
/// # Example
///
/// ```rust,no_run
/// # use guild_jukebox::audio::{registry::SessionRegistry, voice::SongbirdTransport};
/// # use serenity::all::{ChannelId, GuildId};
/// # async fn example(registry: SessionRegistry<SongbirdTransport>) -> anyhow::Result<()> {
/// let guild_id = GuildId::new(123456789);
/// let added = registry
///     .enqueue(guild_id, Some(ChannelId::new(42)), "never gonna give you up", "alice")
///     .await?;
/// println!("queued at position {}", added.position);
///
/// registry.pause(guild_id).await;
/// registry.resume(guild_id).await;
/// registry.skip(guild_id).await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionRegistry<T: AudioTransport> {
    rooms: Arc<DashMap<GuildId, RoomHandle<T>>>,
    transport: Arc<T>,
    resolver: Arc<dyn TrackResolver>,
    config: PlayerConfig,
    events: broadcast::Sender<PlayerEvent>,
    next_epoch: AtomicU64,
}

impl<T: AudioTransport> SessionRegistry<T> {
    pub fn new(transport: Arc<T>, resolver: Arc<dyn TrackResolver>, config: PlayerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            rooms: Arc::new(DashMap::new()),
            transport,
            resolver,
            config,
            events,
            next_epoch: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Resolves `query` and appends the track to the guild's queue, creating
    /// the session (and joining `requester_channel`) when needed.
    ///
    /// # Errors
    ///
    /// * `PermissionDenied` - the requester is not in a voice channel, or it cannot be joined
    /// * `NotFound` - nothing matched `query`
    /// * `QueueFull` - the queue is at capacity
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        requester_channel: Option<ChannelId>,
        query: &str,
        requested_by: &str,
    ) -> Result<Enqueued, PlayerError> {
        let voice_channel = requester_channel.ok_or_else(|| {
            PlayerError::PermissionDenied("you need to be in a voice channel".to_string())
        })?;

        // Resolution happens outside the session task so a slow lookup never
        // holds up the guild's other commands.
        let track = match self.resolver.resolve(query).await {
            Ok(track) => track.with_requested_by(requested_by),
            Err(ResolveError::NotFound) => return Err(PlayerError::NotFound(query.to_string())),
            Err(ResolveError::Backend(e)) => {
                warn!("⚠️ Resolver failed for `{}`: {:?}", query, e);
                return Err(PlayerError::NotFound(query.to_string()));
            }
        };

        for attempt in 1..=ENQUEUE_ATTEMPTS {
            let room = self.room_or_create(guild_id);
            let (reply, answer) = oneshot::channel();
            let message = RoomMessage::Enqueue {
                track: track.clone(),
                voice_channel,
                reply,
            };

            if room.inbox.send(message).is_ok() {
                if let Ok(result) = answer.await {
                    return result;
                }
            }

            debug!(
                "🔁 Session in guild {} closed during enqueue (attempt {})",
                guild_id, attempt
            );
            self.forget(guild_id, room.epoch);
        }

        Err(PlayerError::NoActiveSession)
    }

    /// Stops the current track and moves on. Returns the skipped track.
    pub async fn skip(&self, guild_id: GuildId) -> Result<Track, PlayerError> {
        self.request(guild_id, |reply| RoomMessage::Skip { reply })
            .await
            .unwrap_or(Err(PlayerError::NoActiveSession))
    }

    /// Returns `false` when there was nothing to pause.
    pub async fn pause(&self, guild_id: GuildId) -> bool {
        self.request(guild_id, |reply| RoomMessage::Pause { reply })
            .await
            .unwrap_or(false)
    }

    /// Returns `false` when there was nothing to resume.
    pub async fn resume(&self, guild_id: GuildId) -> bool {
        self.request(guild_id, |reply| RoomMessage::Resume { reply })
            .await
            .unwrap_or(false)
    }

    /// Clears the queue, leaves the voice channel and drops the session
    /// immediately. Returns `false` when there was no session.
    pub async fn stop(&self, guild_id: GuildId) -> bool {
        self.close(guild_id, CloseReason::Stopped).await
    }

    /// Clamps `value` into the configured range and applies it. Returns the
    /// stored volume.
    pub async fn set_volume(&self, guild_id: GuildId, value: i32) -> Result<i32, PlayerError> {
        self.request(guild_id, |reply| RoomMessage::SetVolume { value, reply })
            .await
            .ok_or(PlayerError::NoActiveSession)
    }

    pub async fn toggle_loop(&self, guild_id: GuildId) -> Result<bool, PlayerError> {
        self.request(guild_id, |reply| RoomMessage::ToggleLoop { reply })
            .await
            .ok_or(PlayerError::NoActiveSession)
    }

    pub async fn toggle_shuffle(&self, guild_id: GuildId) -> Result<bool, PlayerError> {
        self.request(guild_id, |reply| RoomMessage::ToggleShuffle { reply })
            .await
            .ok_or(PlayerError::NoActiveSession)
    }

    /// The bot is the only one left in the voice channel.
    pub async fn notify_alone(&self, guild_id: GuildId) {
        if self.close(guild_id, CloseReason::Alone).await {
            info!("🚪 Left guild {}: nobody is listening", guild_id);
        }
    }

    /// Stops every session. Used on shutdown.
    pub async fn shutdown(&self) {
        let guilds = self.active_guilds();
        info!("⏹️ Closing {} active sessions", guilds.len());

        futures::future::join_all(
            guilds
                .into_iter()
                .map(|guild_id| self.close(guild_id, CloseReason::Shutdown)),
        )
        .await;
    }

    /// Queue contents, head first. Empty when the guild has no session.
    pub fn queue_snapshot(&self, guild_id: GuildId) -> Vec<Track> {
        self.snapshot(guild_id)
            .map(|snapshot| snapshot.queue.tracks)
            .unwrap_or_default()
    }

    pub fn current_track(&self, guild_id: GuildId) -> Option<Track> {
        self.snapshot(guild_id)?.current().cloned()
    }

    pub fn snapshot(&self, guild_id: GuildId) -> Option<SessionSnapshot> {
        let room = self.rooms.get(&guild_id)?;
        let snapshot = room.snapshot.borrow().clone();
        Some(snapshot)
    }

    /// Follows a session's snapshots as they change.
    pub fn watch(&self, guild_id: GuildId) -> Option<watch::Receiver<SessionSnapshot>> {
        self.rooms.get(&guild_id).map(|room| room.snapshot.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn active_guilds(&self) -> Vec<GuildId> {
        self.rooms.iter().map(|room| *room.key()).collect()
    }

    pub fn has_session(&self, guild_id: GuildId) -> bool {
        self.rooms.contains_key(&guild_id)
    }

    async fn close(&self, guild_id: GuildId, reason: CloseReason) -> bool {
        self.request(guild_id, |reply| RoomMessage::Stop { reason, reply })
            .await
            .is_some()
    }

    /// Sends a command to an existing session and waits for its answer.
    /// `None` when there is no session or it closed before answering.
    async fn request<R>(
        &self,
        guild_id: GuildId,
        message: impl FnOnce(Reply<R>) -> RoomMessage<Stream<T>>,
    ) -> Option<R> {
        let room = self.rooms.get(&guild_id).map(|room| room.clone())?;
        let (reply, answer) = oneshot::channel();
        room.inbox.send(message(reply)).ok()?;
        answer.await.ok()
    }

    fn room_or_create(&self, guild_id: GuildId) -> RoomHandle<T> {
        self.rooms
            .entry(guild_id)
            .or_insert_with(|| self.spawn_room(guild_id))
            .clone()
    }

    fn spawn_room(&self, guild_id: GuildId) -> RoomHandle<T> {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        let (transport_events, transport_rx) = mpsc::unbounded_channel();

        let session = Session::new(guild_id, &self.config);
        let (snapshot_tx, snapshot) = watch::channel(session.snapshot());

        let player = RoomPlayer::new(
            session,
            self.transport.clone(),
            self.config.clone(),
            inbox.clone(),
            transport_events,
            self.events.clone(),
            snapshot_tx,
            self.rooms.clone(),
            epoch,
        );
        tokio::spawn(player.run(inbox_rx, transport_rx));

        info!("🆕 Session created for guild {}", guild_id);
        RoomHandle {
            inbox,
            snapshot,
            epoch,
        }
    }

    fn forget(&self, guild_id: GuildId, epoch: u64) {
        self.rooms.remove_if(&guild_id, |_, room| room.epoch == epoch);
    }
}
