use dashmap::DashMap;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

use super::embeds;
use crate::audio::{PlayerEvent, PlayerEventKind};

/// Posts playback events into the text channel each guild last used.
pub fn spawn_announcer(
    http: Arc<Http>,
    mut events: broadcast::Receiver<PlayerEvent>,
    channels: Arc<DashMap<GuildId, ChannelId>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("📣 Now-playing announcer started");

        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("📣 Announcer fell behind, {} events dropped", missed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if let PlayerEventKind::SessionClosed(_) = event.kind {
                // The channel binding dies with the session.
                let channel = channels.remove(&event.guild_id).map(|(_, channel)| channel);
                if let (Some(channel), Some(embed)) = (channel, announcement(&event.kind)) {
                    send(&http, channel, embed).await;
                }
                continue;
            }

            let Some(embed) = announcement(&event.kind) else {
                continue;
            };
            let Some(channel) = channels.get(&event.guild_id).map(|entry| *entry) else {
                debug!("📣 No text channel known for guild {}", event.guild_id);
                continue;
            };
            send(&http, channel, embed).await;
        }

        info!("📣 Announcer stopped");
    })
}

/// What, if anything, an event is worth telling the guild.
pub fn announcement(kind: &PlayerEventKind) -> Option<CreateEmbed> {
    match kind {
        PlayerEventKind::TrackStarted(track) => Some(embeds::now_playing(track, false)),
        PlayerEventKind::TrackFailed { track, reason } => Some(embeds::track_failed(track, reason)),
        PlayerEventKind::SessionClosed(reason) => embeds::session_closed(*reason),
        PlayerEventKind::StateChanged { .. } => None,
    }
}

async fn send(http: &Http, channel: ChannelId, embed: CreateEmbed) {
    if let Err(e) = channel
        .send_message(http, CreateMessage::new().embed(embed))
        .await
    {
        warn!("⚠️ Could not announce in channel {}: {:?}", channel, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{CloseReason, PlaybackState, Track};

    #[test]
    fn announces_only_user_facing_events() {
        let track = Track::new("Song", "https://example.com/song.mp3");

        assert!(announcement(&PlayerEventKind::TrackStarted(track.clone())).is_some());
        assert!(announcement(&PlayerEventKind::TrackFailed {
            track,
            reason: "403".to_string(),
        })
        .is_some());
        assert!(announcement(&PlayerEventKind::StateChanged {
            from: PlaybackState::Loading,
            to: PlaybackState::Playing,
        })
        .is_none());
        assert!(announcement(&PlayerEventKind::SessionClosed(CloseReason::Stopped)).is_none());
    }
}
