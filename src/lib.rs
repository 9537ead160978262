//! Multi-guild Discord music bot.
//!
//! Every guild gets an independent playback session: a queue, one active
//! stream and a small state machine that recovers from broken tracks and
//! leaves the voice channel once nobody needs it.

pub mod audio;
pub mod bot;
pub mod cache;
pub mod config;
pub mod sources;
