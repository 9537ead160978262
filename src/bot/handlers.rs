use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage,
        EditInteractionResponse,
    },
    model::{
        application::{CommandData, CommandInteraction},
        channel::Message,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use super::{embeds, MusicBot};
use crate::audio::{
    queue::QueueInfo, registry::SessionRegistry, transport::AudioTransport, Enqueued, PlayerError,
    Track,
};

/// A playback command, whichever surface it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicCommand {
    Play(String),
    Skip,
    Pause,
    Resume,
    Stop,
    /// `None` shows the current volume.
    Volume(Option<i32>),
    Loop,
    Shuffle,
    Queue(usize),
    NowPlaying,
    Help,
}

impl MusicCommand {
    /// Parses `d!play song`-style messages. `None` when the message does not
    /// carry the prefix; `Err` carries a usage hint.
    pub fn parse_prefix(content: &str, prefix: &str) -> Option<Result<Self, String>> {
        let rest = content.trim_start().strip_prefix(prefix)?;
        let mut parts = rest.trim().splitn(2, char::is_whitespace);
        let name = parts.next().filter(|name| !name.is_empty())?.to_lowercase();
        let args = parts.next().map(str::trim).unwrap_or_default();

        let command = match name.as_str() {
            "play" | "p" => {
                if args.is_empty() {
                    Err(format!("Usage: `{}play <song name or link>`", prefix))
                } else {
                    Ok(Self::Play(args.to_string()))
                }
            }
            "skip" | "s" => Ok(Self::Skip),
            "pause" => Ok(Self::Pause),
            "resume" | "r" => Ok(Self::Resume),
            "stop" => Ok(Self::Stop),
            "volume" | "vol" | "v" => match args {
                "" => Ok(Self::Volume(None)),
                level => level
                    .parse()
                    .map(|level| Self::Volume(Some(level)))
                    .map_err(|_| format!("Usage: `{}volume <0-150>`", prefix)),
            },
            "loop" => Ok(Self::Loop),
            "shuffle" => Ok(Self::Shuffle),
            "queue" | "q" => Ok(Self::Queue(args.parse().unwrap_or(1))),
            "nowplaying" | "np" => Ok(Self::NowPlaying),
            "help" | "h" => Ok(Self::Help),
            _ => Err(format!(
                "Unknown command. Use `{}help` to see available commands",
                prefix
            )),
        };

        Some(command)
    }

    pub fn from_slash(data: &CommandData) -> Result<Self, String> {
        let option = |name: &str| data.options.iter().find(|opt| opt.name == name);

        match data.name.as_str() {
            "play" => option("query")
                .and_then(|opt| opt.value.as_str())
                .map(|query| Self::Play(query.to_string()))
                .ok_or_else(|| "Missing `query`".to_string()),
            "skip" => Ok(Self::Skip),
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "stop" => Ok(Self::Stop),
            "volume" => Ok(Self::Volume(
                option("level")
                    .and_then(|opt| opt.value.as_i64())
                    .map(|level| level.clamp(i32::MIN as i64, i32::MAX as i64) as i32),
            )),
            "loop" => Ok(Self::Loop),
            "shuffle" => Ok(Self::Shuffle),
            "queue" => Ok(Self::Queue(
                option("page")
                    .and_then(|opt| opt.value.as_i64())
                    .map_or(1, |page| page.max(1) as usize),
            )),
            "nowplaying" => Ok(Self::NowPlaying),
            "help" => Ok(Self::Help),
            other => Err(format!("Unknown command `{}`", other)),
        }
    }
}

/// Who issued a command.
#[derive(Debug, Clone)]
pub struct Requester {
    pub user_id: UserId,
    pub voice_channel: Option<ChannelId>,
}

/// Outcome of a command, rendered by [`embeds::reply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Queued(Enqueued),
    Skipped(Track),
    Paused(bool),
    Resumed(bool),
    Stopped(bool),
    Volume(i32),
    Loop(bool),
    Shuffle(bool),
    Queue { info: QueueInfo, page: usize },
    NowPlaying { track: Track, paused: bool },
    Help,
    Failed(PlayerError),
    Usage(String),
}

pub async fn execute<T: AudioTransport>(
    registry: &SessionRegistry<T>,
    guild_id: GuildId,
    requester: &Requester,
    command: MusicCommand,
) -> Reply {
    let reply = match command {
        MusicCommand::Play(query) => registry
            .enqueue(
                guild_id,
                requester.voice_channel,
                &query,
                &requester.user_id.to_string(),
            )
            .await
            .map(Reply::Queued),
        MusicCommand::Skip => registry.skip(guild_id).await.map(Reply::Skipped),
        MusicCommand::Pause => Ok(Reply::Paused(registry.pause(guild_id).await)),
        MusicCommand::Resume => Ok(Reply::Resumed(registry.resume(guild_id).await)),
        MusicCommand::Stop => Ok(Reply::Stopped(registry.stop(guild_id).await)),
        MusicCommand::Volume(Some(level)) => {
            registry.set_volume(guild_id, level).await.map(Reply::Volume)
        }
        MusicCommand::Volume(None) => registry
            .snapshot(guild_id)
            .map(|snapshot| Reply::Volume(snapshot.volume))
            .ok_or(PlayerError::NoActiveSession),
        MusicCommand::Loop => registry.toggle_loop(guild_id).await.map(Reply::Loop),
        MusicCommand::Shuffle => registry.toggle_shuffle(guild_id).await.map(Reply::Shuffle),
        MusicCommand::Queue(page) => Ok(Reply::Queue {
            info: registry
                .snapshot(guild_id)
                .map(|snapshot| snapshot.queue)
                .unwrap_or_default(),
            page,
        }),
        MusicCommand::NowPlaying => registry
            .snapshot(guild_id)
            .filter(|snapshot| snapshot.state.has_stream())
            .and_then(|snapshot| {
                let paused = !snapshot.playing();
                snapshot.current().cloned().map(|track| Reply::NowPlaying { track, paused })
            })
            .ok_or(PlayerError::NoActiveSession),
        MusicCommand::Help => Ok(Reply::Help),
    };

    reply.unwrap_or_else(Reply::Failed)
}

/// Slash command entry point.
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("❌ This command only works in a server")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    };

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    let parsed = match MusicCommand::from_slash(&command.data) {
        Ok(parsed) => parsed,
        Err(usage) => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(embeds::reply(
                                &Reply::Usage(usage),
                                &bot.config.command_prefix,
                            ))
                            .ephemeral(true),
                    ),
                )
                .await?;
            return Ok(());
        }
    };

    // Resolving and joining can take longer than Discord's 3 second window.
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    bot.announce_in(guild_id, command.channel_id);
    let requester = Requester {
        user_id: command.user.id,
        voice_channel: user_voice_channel(ctx, guild_id, command.user.id),
    };
    let reply = execute(&bot.registry, guild_id, &requester, parsed).await;

    command
        .edit_response(&ctx.http, EditInteractionResponse::new()
                .embed(embeds::reply(&reply, &bot.config.command_prefix)))
        .await?;

    Ok(())
}

/// Prefix commands (`d!play ...`).
pub async fn handle_message(ctx: &Context, msg: &Message, bot: &MusicBot) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    let Some(parsed) = MusicCommand::parse_prefix(&msg.content, &bot.config.command_prefix) else {
        return Ok(());
    };

    info!(
        "📝 {} used by {} in guild {}",
        msg.content, msg.author.name, guild_id
    );

    let reply = match parsed {
        Ok(command) => {
            bot.announce_in(guild_id, msg.channel_id);
            let requester = Requester {
                user_id: msg.author.id,
                voice_channel: user_voice_channel(ctx, guild_id, msg.author.id),
            };
            execute(&bot.registry, guild_id, &requester, command).await
        }
        Err(usage) => Reply::Usage(usage),
    };

    if let Err(e) = msg
        .channel_id
        .send_message(
            &ctx.http,
            CreateMessage::new()
                .embed(embeds::reply(&reply, &bot.config.command_prefix))
                .reference_message(msg),
        )
        .await
    {
        warn!("⚠️ Could not answer in channel {}: {:?}", msg.channel_id, e);
    }

    Ok(())
}

/// The voice channel `user_id` is currently in, from the gateway cache.
pub fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
