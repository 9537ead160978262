//! # Bot Module
//!
//! Discord front end: turns slash commands and `d!` prefix commands into
//! [`SessionRegistry`] calls and watches the gateway for the voice events
//! the sessions care about.
//!
//! ## Architecture
//!
//! The bot is built around the [`MusicBot`] struct which implements
//! Serenity's [`EventHandler`] trait. It manages:
//!
//! - Command registration (global, or one guild during development)
//! - Command dispatch through [`handlers`]
//! - Voice occupancy: leaving when the bot is alone, tearing down when kicked
//! - The now-playing announcer in [`events`]

use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    all::{
        ChannelId, Context, EventHandler, Guild, GuildId, Interaction, Message, Ready,
        UnavailableGuild, UserId, VoiceState,
    },
    async_trait,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod embeds;
pub mod events;
pub mod handlers;

use crate::{
    audio::{registry::SessionRegistry, voice::SongbirdTransport},
    config::Config,
};

/// Main Discord event handler.
pub struct MusicBot {
    pub(crate) config: Arc<Config>,
    pub(crate) registry: Arc<SessionRegistry<SongbirdTransport>>,
    /// Text channel each guild last issued a command from.
    announce_channels: Arc<DashMap<GuildId, ChannelId>>,
    announcer_started: AtomicBool,
}

impl MusicBot {
    pub fn new(config: Arc<Config>, registry: Arc<SessionRegistry<SongbirdTransport>>) -> Self {
        Self {
            config,
            registry,
            announce_channels: Arc::new(DashMap::new()),
            announcer_started: AtomicBool::new(false),
        }
    }

    pub(crate) fn announce_in(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.announce_channels.insert(guild_id, channel_id);
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");
        let max_volume = self.config.max_volume;

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id, max_volume).await?;
                info!("✅ Guild commands registered for {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx, max_volume).await?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }

    /// Tears the guild's session down if nobody but bots is left listening.
    async fn check_occupancy(&self, ctx: &Context, guild_id: GuildId, bot_id: UserId) {
        if !self.registry.has_session(guild_id) {
            return;
        }

        let listeners = {
            let Some(guild) = guild_id.to_guild_cached(&ctx.cache) else {
                return;
            };
            let Some(channel) = guild
                .voice_states
                .get(&bot_id)
                .and_then(|state| state.channel_id)
            else {
                return;
            };

            guild
                .voice_states
                .values()
                .filter(|state| state.channel_id == Some(channel) && state.user_id != bot_id)
                .filter(|state| !state.member.as_ref().is_some_and(|member| member.user.bot))
                .count()
        };

        debug!("👥 {} listeners left in guild {}", listeners, guild_id);
        if listeners == 0 {
            self.registry.notify_alone(guild_id).await;
        }
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} servers", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("❌ Could not register commands: {:?}", e);
        }

        // `ready` fires again after every gateway reconnect.
        if !self.announcer_started.swap(true, Ordering::SeqCst) {
            events::spawn_announcer(
                ctx.http.clone(),
                self.registry.subscribe(),
                self.announce_channels.clone(),
            );
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("❌ Error handling command: {:?}", e);
            }
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        if let Err(e) = handlers::handle_message(&ctx, &msg, self).await {
            error!("❌ Error handling message command: {:?}", e);
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let bot_id = ctx.cache.current_user().id;

        if new.user_id == bot_id {
            let was_connected = old.as_ref().and_then(|state| state.channel_id).is_some();
            if was_connected && new.channel_id.is_none() {
                info!("🔌 Disconnected from voice in guild {}", guild_id);
                self.registry.stop(guild_id).await;
                return;
            }
        }

        self.check_occupancy(&ctx, guild_id, bot_id).await;
    }

    async fn guild_delete(&self, _ctx: Context, incomplete: UnavailableGuild, _full: Option<Guild>) {
        if incomplete.unavailable {
            warn!("⚠️ Guild {} is temporarily unavailable", incomplete.id);
            return;
        }

        if self.registry.stop(incomplete.id).await {
            info!("🚪 Removed from guild {}, session closed", incomplete.id);
        }
    }
}
