use serenity::model::id::{ChannelId, GuildId};
use std::{collections::HashSet, sync::Arc};

use super::{
    queue::{MusicQueue, QueueInfo},
    state::{CloseReason, PlaybackState},
    timer::LeaveTimer,
    track::Track,
    transport::{StreamId, VoiceConnection},
};
use crate::config::PlayerConfig;

/// Everything one guild's playback owns.
///
/// Only the guild's [`RoomPlayer`](super::player::RoomPlayer) task touches a
/// `Session`; the rest of the process sees it through [`SessionSnapshot`]s.
pub struct Session<C: VoiceConnection> {
    pub guild_id: GuildId,
    pub voice_channel: Option<ChannelId>,
    pub connection: Option<Arc<C>>,
    pub queue: MusicQueue,
    pub state: PlaybackState,
    pub volume: i32,
    /// Titles ever enqueued here; input for recommendation de-duplication.
    pub played_titles: HashSet<String>,
    /// The one stream the transport is currently playing for us.
    pub active_stream: Option<StreamId>,
    /// Id of the stream open in flight; results for any other id are stale.
    pub pending_load: Option<u64>,
    pub leave_timer: Option<LeaveTimer>,
    next_stream: u64,
    next_load: u64,
    next_timer: u64,
}

impl<C: VoiceConnection> Session<C> {
    pub fn new(guild_id: GuildId, config: &PlayerConfig) -> Self {
        Self {
            guild_id,
            voice_channel: None,
            connection: None,
            queue: MusicQueue::new(config.max_queue_size),
            state: PlaybackState::Idle,
            volume: config.clamp_volume(config.default_volume),
            played_titles: HashSet::new(),
            active_stream: None,
            pending_load: None,
            leave_timer: None,
            next_stream: 0,
            next_load: 0,
            next_timer: 0,
        }
    }

    /// `playing` in the user-facing sense: a stream is running and not paused.
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn next_stream_id(&mut self) -> StreamId {
        self.next_stream += 1;
        StreamId(self.next_stream)
    }

    pub fn next_load_id(&mut self) -> u64 {
        self.next_load += 1;
        self.next_load
    }

    pub fn next_timer_token(&mut self) -> u64 {
        self.next_timer += 1;
        self.next_timer
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            queue: self.queue.info(),
            volume: self.volume,
            voice_channel: self.voice_channel,
            has_stream: self.active_stream.is_some(),
            played_titles: self.played_titles.len(),
        }
    }
}

/// Read-only view of a session, published after every mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub queue: QueueInfo,
    pub volume: i32,
    pub voice_channel: Option<ChannelId>,
    pub has_stream: bool,
    pub played_titles: usize,
}

impl SessionSnapshot {
    pub fn playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn current(&self) -> Option<&Track> {
        self.queue.current()
    }
}

/// Result of a successful enqueue.
#[derive(Debug, Clone, PartialEq)]
pub struct Enqueued {
    pub track: Track,
    /// 0 when the track is (about to be) playing.
    pub position: usize,
}

/// Broadcast to observers (now-playing announcements, tests).
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEvent {
    pub guild_id: GuildId,
    pub kind: PlayerEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEventKind {
    StateChanged {
        from: PlaybackState,
        to: PlaybackState,
    },
    TrackStarted(Track),
    TrackFailed {
        track: Track,
        reason: String,
    },
    SessionClosed(CloseReason),
}
