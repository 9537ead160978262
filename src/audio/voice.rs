use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    events::CoreEvent,
    input::{AudioStream, Compose, HttpRequest, Input, LiveInput, YoutubeDl},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::transport::{
    AudioTransport, EventSender, StreamId, TransportError, TransportEvent, VoiceConnection,
};
use crate::sources::direct_url;

/// Voice backend on top of songbird.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    open_timeout: Duration,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, open_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; Discord Music Bot)")
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            manager,
            http,
            open_timeout,
        })
    }
}

#[async_trait]
impl AudioTransport for SongbirdTransport {
    type Connection = SongbirdConnection;

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: EventSender,
    ) -> Result<SongbirdConnection, TransportError> {
        let call = match self.manager.join(guild_id, channel_id).await {
            Ok(call) => call,
            Err(e) => {
                // A failed join can leave a half-open call behind.
                let _ = self.manager.remove(guild_id).await;
                return Err(TransportError::PermissionDenied(e.to_string()));
            }
        };

        {
            let mut handler = call.lock().await;
            let _ = handler.deafen(true).await;
            handler.add_global_event(
                Event::Core(CoreEvent::DriverDisconnect),
                DisconnectNotifier {
                    guild_id,
                    events: events.clone(),
                },
            );
        }

        debug!("🔗 songbird call ready in guild {}", guild_id);
        Ok(SongbirdConnection {
            guild_id,
            call,
            manager: self.manager.clone(),
            http: self.http.clone(),
            open_timeout: self.open_timeout,
            events,
            current: Mutex::new(None),
        })
    }
}

pub struct SongbirdConnection {
    guild_id: GuildId,
    call: Arc<tokio::sync::Mutex<Call>>,
    manager: Arc<Songbird>,
    http: reqwest::Client,
    open_timeout: Duration,
    events: EventSender,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdConnection {
    fn with_track(
        &self,
        action: impl FnOnce(&TrackHandle) -> songbird::tracks::TrackResult<()>,
    ) -> Result<(), TransportError> {
        let current = self.current.lock();
        let track = current.as_ref().ok_or(TransportError::NotConnected)?;
        action(track).map_err(|e| TransportError::Playback(e.to_string()))
    }

    async fn create(&self, playable_reference: &str) -> Result<Input, TransportError> {
        let open_failed = |e: songbird::input::AudioStreamError| {
            TransportError::OpenFailed(format!("{}: {}", playable_reference, e))
        };

        if direct_url::is_direct_audio_url(playable_reference) {
            let mut request = HttpRequest::new(self.http.clone(), playable_reference.to_string());
            let stream: AudioStream<_> = request.create_async().await.map_err(open_failed)?;
            Ok(Input::Live(LiveInput::Raw(stream), Some(Box::new(request))))
        } else {
            let mut ytdl = YoutubeDl::new(self.http.clone(), playable_reference.to_string());
            let stream: AudioStream<_> = ytdl.create_async().await.map_err(open_failed)?;
            Ok(Input::Live(LiveInput::Raw(stream), Some(Box::new(ytdl))))
        }
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    type Stream = Input;

    async fn open_stream(&self, playable_reference: &str) -> Result<Input, TransportError> {
        match tokio::time::timeout(self.open_timeout, self.create(playable_reference)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::OpenFailed(format!(
                "{}: timed out after {:?}",
                playable_reference, self.open_timeout
            ))),
        }
    }

    async fn play(&self, stream: Input, id: StreamId, volume: f32) -> Result<(), TransportError> {
        let track = {
            let mut call = self.call.lock().await;
            call.play_only_input(stream)
        };

        track
            .set_volume(volume)
            .map_err(|e| TransportError::Playback(e.to_string()))?;

        for event in [TrackEvent::End, TrackEvent::Error] {
            track
                .add_event(
                    Event::Track(event),
                    StreamNotifier {
                        guild_id: self.guild_id,
                        stream: id,
                        events: self.events.clone(),
                    },
                )
                .map_err(|e| TransportError::Playback(e.to_string()))?;
        }

        *self.current.lock() = Some(track);
        Ok(())
    }

    fn pause(&self) -> Result<(), TransportError> {
        self.with_track(TrackHandle::pause)
    }

    fn resume(&self) -> Result<(), TransportError> {
        self.with_track(TrackHandle::play)
    }

    fn stop(&self) -> Result<(), TransportError> {
        let result = self.with_track(TrackHandle::stop);
        *self.current.lock() = None;
        result
    }

    fn set_volume(&self, volume: f32) -> Result<(), TransportError> {
        self.with_track(|track| track.set_volume(volume))
    }

    async fn disconnect(&self) {
        self.current.lock().take();
        {
            let mut call = self.call.lock().await;
            call.remove_all_global_events();
            call.stop();
        }

        match self.manager.remove(self.guild_id).await {
            Ok(()) => info!("🔇 Left voice in guild {}", self.guild_id),
            Err(e) => warn!("⚠️ Error leaving voice in guild {}: {}", self.guild_id, e),
        }
    }
}

/// Reports the end or failure of one stream.
struct StreamNotifier {
    guild_id: GuildId,
    stream: StreamId,
    events: EventSender,
}

#[async_trait]
impl VoiceEventHandler for StreamNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let EventContext::Track(tracks) = ctx else {
            return None;
        };

        for (state, _handle) in *tracks {
            let event = match &state.playing {
                PlayMode::Errored(e) => TransportEvent::Error {
                    stream: self.stream,
                    message: format!("{:?}", e),
                },
                PlayMode::End | PlayMode::Stop => TransportEvent::Idle {
                    stream: self.stream,
                },
                other => {
                    debug!("🎚️ Track event in guild {}: {:?}", self.guild_id, other);
                    continue;
                }
            };
            let _ = self.events.send(event);
        }

        None
    }
}

struct DisconnectNotifier {
    guild_id: GuildId,
    events: EventSender,
}

#[async_trait]
impl VoiceEventHandler for DisconnectNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::DriverDisconnect(data) = ctx {
            warn!(
                "🔌 Voice driver disconnected in guild {}: {:?}",
                self.guild_id, data.reason
            );
            let _ = self.events.send(TransportEvent::Disconnected);
        }

        None
    }
}
