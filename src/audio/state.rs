use std::fmt;

/// Lifecycle of a guild session.
///
/// ```text
/// Idle -> Connecting -> Loading -> Playing <-> Paused
///                          ^          |
///                          |          v
///                          +------ Advancing -> Draining -> Terminated
/// ```
///
/// `stop`, a lost connection, or an empty voice channel jump straight to
/// `Terminated` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Connecting,
    Loading,
    Playing,
    Paused,
    Advancing,
    Draining,
    Terminated,
}

impl PlaybackState {
    /// A stream is open on the transport in these states.
    pub fn has_stream(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }

    /// States a `skip` can act on.
    pub fn is_skippable(self) -> bool {
        matches!(self, Self::Loading | Self::Playing | Self::Paused)
    }

    /// An enqueue in these states must kick off loading of the head.
    pub fn needs_kickoff(self) -> bool {
        matches!(self, Self::Idle | Self::Connecting | Self::Draining)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Advancing => "advancing",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Stopped,
    IdleTimeout,
    Alone,
    Disconnected,
    ConnectFailed,
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Stopped => "stopped",
            Self::IdleTimeout => "inactivity",
            Self::Alone => "empty voice channel",
            Self::Disconnected => "disconnected",
            Self::ConnectFailed => "could not connect",
            Self::Shutdown => "shutdown",
        };
        f.write_str(reason)
    }
}
