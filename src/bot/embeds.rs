use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use super::handlers::Reply;
use crate::audio::{
    queue::QueueInfo, track::format_duration, CloseReason, Enqueued, PlayerError, Track,
};

/// Standard embed palette.
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";
const QUEUE_PAGE_SIZE: usize = 10;

/// Renders a command outcome. `prefix` is the prefix command surface, used
/// in hints.
pub fn reply(reply: &Reply, prefix: &str) -> CreateEmbed {
    match reply {
        Reply::Queued(added) => track_added(added),
        Reply::Skipped(track) => success("⏭️ Skipped", &format!("**{}**", track.title())),
        Reply::Paused(true) => success("⏸️ Paused", "Use `/resume` to continue"),
        Reply::Paused(false) => info("⏸️ Pause", "Nothing is playing right now"),
        Reply::Resumed(true) => success("▶️ Resumed", "Back to the music"),
        Reply::Resumed(false) => info("▶️ Resume", "Nothing is paused right now"),
        Reply::Stopped(true) => success("⏹️ Stopped", "Queue cleared, see you next time 👋"),
        Reply::Stopped(false) => info("⏹️ Stop", "I'm not playing anything here"),
        Reply::Volume(volume) => volume_embed(*volume),
        Reply::Loop(enabled) => toggle("🔁 Loop", *enabled),
        Reply::Shuffle(enabled) => toggle("🔀 Shuffle", *enabled),
        Reply::Queue { info, page } => queue(info, *page),
        Reply::NowPlaying { track, paused } => now_playing(track, *paused),
        Reply::Help => help(prefix),
        Reply::Failed(e) => player_error(e),
        Reply::Usage(usage) => error("❓ Usage", usage),
    }
}

pub fn now_playing(track: &Track, paused: bool) -> CreateEmbed {
    let title = if paused {
        "⏸️ Paused"
    } else {
        "🎵 Now Playing"
    };

    with_track_details(
        base(title, colors::SUCCESS_GREEN).description(format!("**{}**", track.title())),
        track,
    )
}

pub fn track_failed(track: &Track, reason: &str) -> CreateEmbed {
    base("⚠️ Skipped an unplayable track", colors::WARNING_ORANGE)
        .description(format!("**{}**\n`{}`", track.title(), truncate(reason, 200)))
}

pub fn session_closed(reason: CloseReason) -> Option<CreateEmbed> {
    let description = match reason {
        CloseReason::IdleTimeout => "Queue has been empty for a while, leaving the voice channel",
        CloseReason::Alone => "Everyone left the voice channel, so did I",
        CloseReason::Disconnected => "Lost the voice connection",
        CloseReason::Stopped | CloseReason::ConnectFailed | CloseReason::Shutdown => return None,
    };

    Some(base("👋 Left the voice channel", colors::NEUTRAL_GRAY).description(description))
}

fn help(prefix: &str) -> CreateEmbed {
    let commands = [
        ("play", "p", "<song or link>", "Play a song, or add it to the queue"),
        ("skip", "s", "", "Skip the current song"),
        ("pause", "", "", "Pause playback"),
        ("resume", "r", "", "Resume paused playback"),
        ("stop", "", "", "Stop, clear the queue and leave"),
        ("volume", "v", "[level]", "Show or set the volume"),
        ("loop", "", "", "Toggle looping the queue"),
        ("shuffle", "", "", "Toggle shuffle for upcoming songs"),
        ("queue", "q", "[page]", "Show the queue"),
        ("nowplaying", "np", "", "Show the current song"),
    ];

    let list = commands
        .iter()
        .map(|(name, alias, args, about)| {
            let mut line = if args.is_empty() {
                format!("`{}{}`", prefix, name)
            } else {
                format!("`{}{} {}`", prefix, name, args)
            };
            if !alias.is_empty() {
                line.push_str(&format!(" (`{}{}`)", prefix, alias));
            }
            format!("{} {}", line, about)
        })
        .collect::<Vec<_>>()
        .join("\n");

    base("📖 Commands", colors::INFO_BLUE)
        .description(format!("Every command also works as a slash command.\n\n{}", list))
}

fn track_added(added: &Enqueued) -> CreateEmbed {
    let embed = if added.position == 0 {
        base("🎵 Starting playback", colors::SUCCESS_GREEN)
    } else {
        base("➕ Added to queue", colors::MUSIC_PURPLE).field(
            "📍 Position",
            format!("#{}", added.position),
            true,
        )
    };

    with_track_details(
        embed.description(format!("**{}**", added.track.title())),
        &added.track,
    )
}

fn queue(info: &QueueInfo, page: usize) -> CreateEmbed {
    let mut embed = base("📋 Queue", colors::INFO_BLUE);

    let Some(current) = info.current() else {
        return embed
            .description("😴 **The queue is empty**\n\n💡 Use `/play <song>` to add music")
            .color(colors::NEUTRAL_GRAY);
    };

    let status = if info.loop_enabled { "🔁" } else { "▶️" };
    embed = embed.field(
        format!("{} Now Playing", status),
        format!("**{}**{}", current.title(), by_artist(current)),
        false,
    );

    let page = info.page(page, QUEUE_PAGE_SIZE);
    if !page.items.is_empty() {
        let list = page
            .items
            .iter()
            .enumerate()
            .map(|(i, track)| {
                format!(
                    "**{}**. {}{} `[{}]`",
                    page.first_position + i,
                    track.title(),
                    by_artist(track),
                    track.formatted_duration()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        embed = embed.field("⏭️ Up Next", list, false);
    }

    let mut modes = Vec::new();
    if info.loop_enabled {
        modes.push("🔁 loop");
    }
    if info.shuffle_enabled {
        modes.push("🔀 shuffle");
    }

    embed
        .field("📊 Tracks", info.tracks.len().to_string(), true)
        .field("⏱️ Total", format_duration(info.total_duration), true)
        .field(
            "⚙️ Modes",
            if modes.is_empty() {
                "none".to_string()
            } else {
                modes.join(", ")
            },
            true,
        )
        .footer(CreateEmbedFooter::new(format!(
            "Page {}/{} • {}",
            page.current_page, page.total_pages, STANDARD_FOOTER
        )))
}

fn volume_embed(volume: i32) -> CreateEmbed {
    let icon = match volume {
        0 => "🔇",
        1..=33 => "🔈",
        34..=66 => "🔉",
        _ => "🔊",
    };

    base(&format!("{} Volume", icon), colors::INFO_BLUE)
        .description(format!("{} **{}%**", volume_bar(volume), volume))
}

fn volume_bar(volume: i32) -> String {
    let filled = (volume.clamp(0, 150) / 10) as usize;
    format!("{}{}", "▰".repeat(filled), "▱".repeat(15 - filled))
}

fn toggle(title: &str, enabled: bool) -> CreateEmbed {
    if enabled {
        success(title, "Enabled")
    } else {
        info(title, "Disabled")
    }
}

fn player_error(err: &PlayerError) -> CreateEmbed {
    let title = match err {
        PlayerError::PermissionDenied(_) => "🚫 Can't join",
        PlayerError::NotFound(_) => "🔍 Nothing found",
        PlayerError::NoActiveSession => "🤷 Nothing playing",
        PlayerError::QueueFull { .. } => "📦 Queue full",
        PlayerError::OpenFailed(_) | PlayerError::TransportError(_) => "❌ Playback error",
    };
    error(title, &err.to_string())
}

fn with_track_details(mut embed: CreateEmbed, track: &Track) -> CreateEmbed {
    embed = embed
        .field("🎤 Artist", track.artist().unwrap_or("Unknown"), true)
        .field(
            "⏱️ Duration",
            if track.duration_secs() == 0 {
                "🔴 Live".to_string()
            } else {
                track.formatted_duration()
            },
            true,
        );

    if !track.requested_by().is_empty() {
        embed = embed.field("👤 Requested by", format!("<@{}>", track.requested_by()), true);
    }
    if let Some(thumbnail) = track.thumbnail_url() {
        embed = embed.thumbnail(thumbnail);
    }
    if track.playable_reference().starts_with("http") {
        embed = embed.url(track.playable_reference());
    }

    embed
}

fn by_artist(track: &Track) -> String {
    track
        .artist()
        .map(|artist| format!(" - {}", artist))
        .unwrap_or_default()
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

fn base(title: &str, colour: serenity::all::Colour) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .color(colour)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn success(title: &str, description: &str) -> CreateEmbed {
    base(title, colors::SUCCESS_GREEN).description(description)
}

fn info(title: &str, description: &str) -> CreateEmbed {
    base(title, colors::INFO_BLUE).description(description)
}

fn error(title: &str, description: &str) -> CreateEmbed {
    base(title, colors::ERROR_RED).description(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn volume_bar_scales_to_fifteen_cells() {
        assert_eq!(volume_bar(0), "▱".repeat(15));
        assert_eq!(volume_bar(150), "▰".repeat(15));
        assert_eq!(volume_bar(100).chars().filter(|c| *c == '▰').count(), 10);
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé…");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn help_lists_prefix_aliases() {
        let embed = serde_json::to_value(help("d!")).unwrap();
        let commands = embed["description"].as_str().unwrap();
        assert!(commands.contains("`d!play <song or link>` (`d!p`)"));
        assert!(commands.contains("`d!stop` Stop"));
    }

    #[test]
    fn quiet_closes_are_not_announced() {
        assert!(session_closed(CloseReason::Stopped).is_none());
        assert!(session_closed(CloseReason::Shutdown).is_none());
        assert!(session_closed(CloseReason::IdleTimeout).is_some());
        assert!(session_closed(CloseReason::Alone).is_some());
    }
}
