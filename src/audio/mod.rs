//! # Audio Module
//!
//! Per-guild playback orchestration.
//!
//! ## Architecture
//!
//! ### [`registry`] - Session Registry
//! - Single entry point for every playback command
//! - Creates a session on first enqueue, removes it on teardown
//! - Lock-free reads through published snapshots
//!
//! ### [`player`] - Playback State Machine
//! - One task per guild, commands applied in arrival order
//! - Track end, skip and stream failures all go through one advance step
//! - Auto-leave once the queue has been empty for a while
//!
//! ### [`queue`] - Queue Management
//! - Loop and shuffle policies
//! - Capacity limit and paging for display
//!
//! ### [`voice`] - Voice Backend
//! - songbird implementation of the [`transport`] traits
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use guild_jukebox::audio::{registry::SessionRegistry, voice::SongbirdTransport};
//! use serenity::all::{ChannelId, GuildId};
//!
//! # async fn example(registry: SessionRegistry<SongbirdTransport>) -> anyhow::Result<()> {
//! let guild_id = GuildId::new(123456789);
//!
//! // Queue a track, joining the requester's channel if needed
//! registry
//!     .enqueue(guild_id, Some(ChannelId::new(42)), "https://example.com/song.mp3", "alice")
//!     .await?;
//!
//! // Control playback
//! registry.pause(guild_id).await;
//! registry.resume(guild_id).await;
//! registry.skip(guild_id).await?;
//! registry.set_volume(guild_id, 80).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub(crate) mod player;
pub mod queue;
pub mod registry;
pub mod session;
pub mod state;
pub mod timer;
pub mod track;
pub mod transport;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;

pub use error::PlayerError;
pub use registry::SessionRegistry;
pub use session::{Enqueued, PlayerEvent, PlayerEventKind, SessionSnapshot};
pub use state::{CloseReason, PlaybackState};
pub use track::Track;
