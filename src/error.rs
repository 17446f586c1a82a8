/// Failures reported by the handoff channel and its orchestration helpers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `send` was called after the channel was closed.
    #[error("send on a closed channel")]
    SendAfterClose,
    /// The channel was closed while a sent value was still waiting to be taken.
    #[error("channel closed before the pending value was taken")]
    Disconnected,
    #[error("channel already closed")]
    AlreadyClosed,
    #[error("invalid wait mode {0:?}, expected \"block\" or \"spin\"")]
    InvalidWaitMode(String),
    #[error("failed to spawn a routine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
