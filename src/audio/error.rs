use thiserror::Error;

use super::transport::TransportError;

/// Failures surfaced by the session registry to the command layer.
///
/// `OpenFailed` and `TransportError` are normally absorbed by the state
/// machine (the offending track is dropped and the queue advances). A failed
/// voice join reaches the `enqueue` caller through the `From<TransportError>`
/// mapping, which is `PermissionDenied` for a refused join.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlayerError {
    #[error("cannot join the voice channel: {0}")]
    PermissionDenied(String),

    #[error("no results found for `{0}`")]
    NotFound(String),

    #[error("nothing is playing in this server")]
    NoActiveSession,

    #[error("could not open a stream for `{0}`")]
    OpenFailed(String),

    #[error("voice transport failure: {0}")]
    TransportError(String),

    #[error("the queue is full (max {max} tracks)")]
    QueueFull { max: usize },
}

impl From<TransportError> for PlayerError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::PermissionDenied(reason) => Self::PermissionDenied(reason),
            TransportError::OpenFailed(reason) => Self::OpenFailed(reason),
            other => Self::TransportError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn transport_failures_keep_their_kind() {
        assert_eq!(
            PlayerError::from(TransportError::PermissionDenied("missing CONNECT".into())),
            PlayerError::PermissionDenied("missing CONNECT".into())
        );
        assert_eq!(
            PlayerError::from(TransportError::OpenFailed("403".into())),
            PlayerError::OpenFailed("403".into())
        );
        assert_eq!(
            PlayerError::from(TransportError::NotConnected),
            PlayerError::TransportError("not connected".into())
        );
    }
}
