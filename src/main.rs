use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

use guild_jukebox::{
    audio::{voice::SongbirdTransport, SessionRegistry},
    bot::MusicBot,
    config::Config,
    sources::{ytdlp::YtDlpSource, FallbackResolver},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Guild Jukebox v{}", env!("CARGO_PKG_VERSION"));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let songbird = Songbird::serenity();
    let transport = Arc::new(SongbirdTransport::new(songbird.clone(), config.resolve_timeout)?);
    let resolver = Arc::new(FallbackResolver::from_config(&config)?);
    let registry = Arc::new(SessionRegistry::new(transport, resolver, config.player()));

    let handler = MusicBot::new(config.clone(), registry.clone());

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("❌ Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        warn!("⚠️ Shutdown signal received, closing sessions...");
        registry.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Connecting to Discord");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    info!("👋 Bye");
    Ok(())
}

async fn health_check() -> Result<()> {
    let yt_dlp = YtDlpSource::new().version().await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if !ffmpeg.status.success() {
        anyhow::bail!("ffmpeg is missing");
    }

    println!("OK (yt-dlp {})", yt_dlp);
    Ok(())
}
