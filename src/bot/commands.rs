use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Registers every command globally. Propagation can take up to an hour.
pub async fn register_global_commands(ctx: &Context, max_volume: i32) -> Result<()> {
    for command in all_commands(max_volume) {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registers commands for a single guild (development).
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId, max_volume: i32) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands(max_volume)).await?;

    Ok(())
}

fn all_commands(max_volume: i32) -> Vec<CreateCommand> {
    vec![
        play_command(),
        skip_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        volume_command(max_volume),
        loop_command(),
        shuffle_command(),
        queue_command(),
        nowplaying_command(),
        help_command(),
    ]
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a song, or add it to the queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "Link or search terms")
                .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip the current song")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pause playback")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resume paused playback")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop, clear the queue and leave the voice channel")
}

// Settings

fn volume_command(max_volume: i32) -> CreateCommand {
    CreateCommand::new("volume")
        .description("Show or set the volume")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volume in percent")
                .min_int_value(0)
                .max_int_value(max_volume.max(0) as u64),
        )
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Toggle looping the queue")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Toggle shuffle for upcoming songs")
}

// Info

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Show the queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Page number")
                .min_int_value(1),
        )
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Show the current song")
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("List the available commands")
}
