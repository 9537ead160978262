//! Per-guild playback state machine.
//!
//! Each guild gets one [`RoomPlayer`] task. Commands from the registry,
//! stream-open results, timer expiries and transport events all land in that
//! task and are handled one at a time, so a guild's queue and state only ever
//! change from a single place.

use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use super::{
    error::PlayerError,
    registry::RoomHandle,
    session::{Enqueued, PlayerEvent, PlayerEventKind, Session, SessionSnapshot},
    state::{CloseReason, PlaybackState},
    timer::LeaveTimer,
    track::Track,
    transport::{gain, AudioTransport, EventSender, TransportError, TransportEvent, VoiceConnection},
};
use crate::config::PlayerConfig;

pub(crate) type Stream<T> = <<T as AudioTransport>::Connection as VoiceConnection>::Stream;
pub(crate) type Reply<R> = oneshot::Sender<R>;

pub(crate) enum RoomMessage<S> {
    Enqueue {
        track: Track,
        voice_channel: ChannelId,
        reply: Reply<Result<Enqueued, PlayerError>>,
    },
    Skip {
        reply: Reply<Result<Track, PlayerError>>,
    },
    Pause {
        reply: Reply<bool>,
    },
    Resume {
        reply: Reply<bool>,
    },
    Stop {
        reason: CloseReason,
        reply: Reply<()>,
    },
    SetVolume {
        value: i32,
        reply: Reply<i32>,
    },
    ToggleLoop {
        reply: Reply<bool>,
    },
    ToggleShuffle {
        reply: Reply<bool>,
    },
    LeaveTimerFired {
        token: u64,
    },
    StreamOpened {
        load: u64,
        result: Result<S, TransportError>,
    },
}

/// How the head of the queue is being consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Advance {
    /// Played to the end; loop may re-append it.
    Finished,
    Skipped,
    /// Could not open, or died mid-playback.
    Failed,
}

pub(crate) struct RoomPlayer<T: AudioTransport> {
    session: Session<T::Connection>,
    transport: Arc<T>,
    config: PlayerConfig,
    inbox: mpsc::UnboundedSender<RoomMessage<Stream<T>>>,
    transport_events: EventSender,
    events: broadcast::Sender<PlayerEvent>,
    snapshot: watch::Sender<SessionSnapshot>,
    rooms: Arc<DashMap<GuildId, RoomHandle<T>>>,
    epoch: u64,
    /// Opens left before a run of consecutive failures gives up on the queue.
    failure_budget: Option<usize>,
}

impl<T: AudioTransport> RoomPlayer<T> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        session: Session<T::Connection>,
        transport: Arc<T>,
        config: PlayerConfig,
        inbox: mpsc::UnboundedSender<RoomMessage<Stream<T>>>,
        transport_events: EventSender,
        events: broadcast::Sender<PlayerEvent>,
        snapshot: watch::Sender<SessionSnapshot>,
        rooms: Arc<DashMap<GuildId, RoomHandle<T>>>,
        epoch: u64,
    ) -> Self {
        Self {
            session,
            transport,
            config,
            inbox,
            transport_events,
            events,
            snapshot,
            rooms,
            epoch,
            failure_budget: None,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<RoomMessage<Stream<T>>>,
        mut transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        debug!("🧵 Session task started for guild {}", self.session.guild_id);

        loop {
            tokio::select! {
                Some(message) = inbox.recv() => self.handle(message).await,
                Some(event) = transport_events.recv() => self.handle_transport(event).await,
                else => break,
            }

            self.publish();

            if self.session.state == PlaybackState::Terminated {
                break;
            }
        }

        // Anything still queued is answered by dropping its reply sender.
        inbox.close();
        debug!("🧵 Session task finished for guild {}", self.session.guild_id);
    }

    async fn handle(&mut self, message: RoomMessage<Stream<T>>) {
        match message {
            RoomMessage::Enqueue {
                track,
                voice_channel,
                reply,
            } => {
                let result = self.enqueue(track, voice_channel).await;
                self.respond(reply, result);
            }
            RoomMessage::Skip { reply } => {
                let result = self.skip();
                self.respond(reply, result);
            }
            RoomMessage::Pause { reply } => {
                let paused = self.pause();
                self.respond(reply, paused);
            }
            RoomMessage::Resume { reply } => {
                let resumed = self.resume();
                self.respond(reply, resumed);
            }
            RoomMessage::Stop { reason, reply } => {
                self.terminate(reason).await;
                self.respond(reply, ());
            }
            RoomMessage::SetVolume { value, reply } => {
                let volume = self.set_volume(value);
                self.respond(reply, volume);
            }
            RoomMessage::ToggleLoop { reply } => {
                let enabled = self.session.queue.toggle_loop();
                self.respond(reply, enabled);
            }
            RoomMessage::ToggleShuffle { reply } => {
                let enabled = self.session.queue.toggle_shuffle();
                self.respond(reply, enabled);
            }
            RoomMessage::LeaveTimerFired { token } => self.on_leave_timer(token).await,
            RoomMessage::StreamOpened { load, result } => self.on_stream_opened(load, result).await,
        }
    }

    /// Publishes the snapshot before answering so callers never read a view
    /// older than their own command.
    fn respond<R>(&self, reply: Reply<R>, value: R) {
        self.publish();
        let _ = reply.send(value);
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.session.snapshot());
    }

    fn emit(&self, kind: PlayerEventKind) {
        let _ = self.events.send(PlayerEvent {
            guild_id: self.session.guild_id,
            kind,
        });
    }

    fn transition(&mut self, to: PlaybackState) {
        let from = self.session.state;
        if from == to {
            return;
        }

        if from == PlaybackState::Draining && self.session.leave_timer.take().is_some() {
            debug!("⏱️ Auto-leave cancelled in guild {}", self.session.guild_id);
        }

        self.session.state = to;
        debug!("🔄 Guild {}: {} -> {}", self.session.guild_id, from, to);
        self.emit(PlayerEventKind::StateChanged { from, to });
    }

    async fn enqueue(&mut self, track: Track, voice_channel: ChannelId) -> Result<Enqueued, PlayerError> {
        if self.session.connection.is_none() {
            self.transition(PlaybackState::Connecting);

            match self
                .transport
                .connect(self.session.guild_id, voice_channel, self.transport_events.clone())
                .await
            {
                Ok(connection) => {
                    info!(
                        "🔊 Connected to voice channel {} in guild {}",
                        voice_channel, self.session.guild_id
                    );
                    self.session.connection = Some(Arc::new(connection));
                    self.session.voice_channel = Some(voice_channel);
                }
                Err(e) => {
                    warn!(
                        "🚫 Could not join voice channel {} in guild {}: {}",
                        voice_channel, self.session.guild_id, e
                    );
                    if self.session.queue.is_empty() {
                        self.terminate(CloseReason::ConnectFailed).await;
                    }
                    return Err(e.into());
                }
            }
        }

        let position = match self.session.queue.push(track.clone()) {
            Ok(position) => position,
            Err(e) => {
                if self.session.state == PlaybackState::Connecting {
                    self.enter_draining();
                }
                return Err(e);
            }
        };
        self.session.played_titles.insert(track.title().to_string());

        if self.session.state.needs_kickoff() {
            self.start_loading();
        }

        Ok(Enqueued { track, position })
    }

    fn skip(&mut self) -> Result<Track, PlayerError> {
        if !self.session.state.is_skippable() {
            return Err(PlayerError::NoActiveSession);
        }

        let skipped = self.advance(Advance::Skipped).ok_or(PlayerError::NoActiveSession)?;
        info!("⏭️ Skipped in guild {}: {}", self.session.guild_id, skipped.title());
        Ok(skipped)
    }

    fn pause(&mut self) -> bool {
        if self.session.state != PlaybackState::Playing {
            return false;
        }

        if let Some(connection) = &self.session.connection {
            if let Err(e) = connection.pause() {
                warn!("⚠️ Pause failed in guild {}: {}", self.session.guild_id, e);
                return false;
            }
        }

        self.transition(PlaybackState::Paused);
        info!("⏸️ Paused in guild {}", self.session.guild_id);
        true
    }

    fn resume(&mut self) -> bool {
        if self.session.state != PlaybackState::Paused {
            return false;
        }

        if let Some(connection) = &self.session.connection {
            if let Err(e) = connection.resume() {
                warn!("⚠️ Resume failed in guild {}: {}", self.session.guild_id, e);
                return false;
            }
        }

        self.transition(PlaybackState::Playing);
        info!("▶️ Resumed in guild {}", self.session.guild_id);
        true
    }

    fn set_volume(&mut self, value: i32) -> i32 {
        let volume = self.config.clamp_volume(value);
        self.session.volume = volume;

        if self.session.active_stream.is_some() {
            if let Some(connection) = &self.session.connection {
                if let Err(e) = connection.set_volume(gain(volume)) {
                    warn!("⚠️ Could not apply volume in guild {}: {}", self.session.guild_id, e);
                }
            }
        }

        info!("🔊 Volume set to {}% in guild {}", volume, self.session.guild_id);
        volume
    }

    /// Opens a stream for the head of the queue in the background.
    fn start_loading(&mut self) {
        let Some(head) = self.session.queue.head() else {
            self.enter_draining();
            return;
        };
        let reference = head.playable_reference().to_string();
        let title = head.title().to_string();

        let Some(connection) = self.session.connection.clone() else {
            error!("❌ No voice connection to load `{}` in guild {}", title, self.session.guild_id);
            self.session.queue.clear();
            self.enter_draining();
            return;
        };

        let load = self.session.next_load_id();
        self.session.pending_load = Some(load);
        self.transition(PlaybackState::Loading);
        debug!("📥 Opening stream for `{}` (load {})", title, load);

        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            let result = connection.open_stream(&reference).await;
            let _ = inbox.send(RoomMessage::StreamOpened { load, result });
        });
    }

    async fn on_stream_opened(&mut self, load: u64, result: Result<Stream<T>, TransportError>) {
        if self.session.pending_load != Some(load) || self.session.state != PlaybackState::Loading {
            debug!(
                "🗑️ Discarding stale stream (load {}) in guild {}",
                load, self.session.guild_id
            );
            return;
        }
        self.session.pending_load = None;

        let (Some(track), Some(connection)) =
            (self.session.queue.head().cloned(), self.session.connection.clone())
        else {
            self.enter_draining();
            return;
        };

        let started = match result {
            Ok(stream) => {
                let id = self.session.next_stream_id();
                connection
                    .play(stream, id, gain(self.session.volume))
                    .await
                    .map(|_| id)
            }
            Err(e) => Err(e),
        };

        match started {
            Ok(id) => {
                self.session.active_stream = Some(id);
                self.failure_budget = None;
                self.transition(PlaybackState::Playing);
                info!("🎵 Now playing in guild {}: {}", self.session.guild_id, track.title());
                self.emit(PlayerEventKind::TrackStarted(track));
            }
            Err(e) => {
                warn!(
                    "❌ Could not start `{}` in guild {}: {}",
                    track.title(),
                    self.session.guild_id,
                    e
                );
                self.emit(PlayerEventKind::TrackFailed {
                    track,
                    reason: e.to_string(),
                });
                self.advance(Advance::Failed);
            }
        }
    }

    async fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Idle { stream } if self.session.active_stream == Some(stream) => {
                debug!("🏁 Track finished in guild {}", self.session.guild_id);
                self.advance(Advance::Finished);
            }
            TransportEvent::Error { stream, message } if self.session.active_stream == Some(stream) => {
                warn!("❌ Playback error in guild {}: {}", self.session.guild_id, message);
                if let Some(track) = self.session.queue.head().cloned() {
                    self.emit(PlayerEventKind::TrackFailed {
                        track,
                        reason: message,
                    });
                }
                self.advance(Advance::Failed);
            }
            TransportEvent::Disconnected => {
                warn!("🔌 Voice connection lost in guild {}", self.session.guild_id);
                self.terminate(CloseReason::Disconnected).await;
            }
            stale => debug!(
                "🗑️ Ignoring stale transport event in guild {}: {:?}",
                self.session.guild_id, stale
            ),
        }
    }

    /// The single place that decides "play next, or drain".
    ///
    /// Returns the consumed head, if any.
    fn advance(&mut self, cause: Advance) -> Option<Track> {
        self.transition(PlaybackState::Advancing);
        self.session.pending_load = None;

        if self.session.active_stream.take().is_some() && cause != Advance::Finished {
            if let Some(connection) = &self.session.connection {
                if let Err(e) = connection.stop() {
                    warn!("⚠️ Could not stop stream in guild {}: {}", self.session.guild_id, e);
                }
            }
        }

        let consumed = match cause {
            Advance::Finished => self.session.queue.finish_head(),
            Advance::Skipped | Advance::Failed => self.session.queue.drop_head(),
        };

        if cause == Advance::Failed {
            // Counts the failed head too, so each queued track gets one attempt.
            let remaining = self.session.queue.len();
            let budget = self.failure_budget.get_or_insert(remaining + 1);
            *budget = budget.saturating_sub(1);

            if *budget == 0 && !self.session.queue.is_empty() {
                warn!(
                    "🚨 Too many consecutive failures in guild {}, clearing the queue",
                    self.session.guild_id
                );
                self.session.queue.clear();
            }
        } else {
            self.failure_budget = None;
        }

        if self.session.queue.is_empty() {
            self.enter_draining();
        } else {
            self.start_loading();
        }

        consumed
    }

    fn enter_draining(&mut self) {
        self.transition(PlaybackState::Draining);
        self.failure_budget = None;

        let token = self.session.next_timer_token();
        let inbox = self.inbox.clone();
        self.session.leave_timer = Some(LeaveTimer::arm(
            token,
            self.config.auto_leave_timeout,
            move |token| {
                let _ = inbox.send(RoomMessage::LeaveTimerFired { token });
            },
        ));

        info!(
            "📭 Queue empty in guild {}, leaving in {}",
            self.session.guild_id,
            humantime::format_duration(self.config.auto_leave_timeout)
        );
    }

    async fn on_leave_timer(&mut self, token: u64) {
        let current = self.session.leave_timer.as_ref().map(LeaveTimer::token);
        let idle = self.session.state == PlaybackState::Draining
            && self.session.queue.is_empty()
            && !self.session.is_playing();

        if current != Some(token) || !idle {
            debug!("⏱️ Ignoring stale auto-leave timer {} in guild {}", token, self.session.guild_id);
            return;
        }

        self.terminate(CloseReason::IdleTimeout).await;
    }

    /// Tears everything down and removes the session from the registry.
    async fn terminate(&mut self, reason: CloseReason) {
        if self.session.state == PlaybackState::Terminated {
            return;
        }

        self.session.leave_timer = None;
        self.session.pending_load = None;
        self.session.queue.clear();

        if let Some(connection) = self.session.connection.take() {
            if self.session.active_stream.take().is_some() {
                if let Err(e) = connection.stop() {
                    warn!("⚠️ Could not stop stream in guild {}: {}", self.session.guild_id, e);
                }
            }
            connection.disconnect().await;
        }

        self.transition(PlaybackState::Terminated);
        self.rooms
            .remove_if(&self.session.guild_id, |_, room| room.epoch == self.epoch);

        info!("👋 Session closed in guild {} ({})", self.session.guild_id, reason);
        self.emit(PlayerEventKind::SessionClosed(reason));
    }
}
