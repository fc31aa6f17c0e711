//! Typed errors for the tracking library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors that can occur while operating a tracking job.
#[derive(Debug, Error)]
pub enum TrackError {
    /// Browser session failed
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Storage operation failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Chat platform operation failed
    #[error("chat error: {0}")]
    Chat(#[from] ChatError),

    /// URL does not look like a public order page
    #[error("not a recognized order link: {url}")]
    InvalidOrderUrl { url: String },
}

/// Errors raised by the shared browser session pool.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Browser process failed to launch
    #[error("browser launch failed: {0}")]
    Launch(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A browser operation failed and is unlikely to recover
    #[error("browser error: {0}")]
    Browser(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Navigation did not finish within the deadline
    #[error("navigation timed out: {url}")]
    Timeout { url: String },

    /// A rendering fault that a later attempt may not hit
    #[error("transient render fault: {0}")]
    Transient(String),

    /// The pool has been shut down
    #[error("session pool closed")]
    Closed,
}

/// Errors raised by the job store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database error
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A persisted row could not be decoded
    #[error("corrupt job row: {0}")]
    Corrupt(String),
}

/// Errors raised by the chat platform collaborator.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The target message no longer exists (deleted or purged)
    #[error("message no longer exists: {message_id}")]
    MessageMissing { message_id: String },

    /// The channel cannot be fetched or is not visible
    #[error("channel inaccessible: {channel_id}")]
    ChannelInaccessible { channel_id: String },

    /// Any other platform failure
    #[error("platform error: {0}")]
    Platform(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias for tracking operations.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Result type alias for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for chat operations.
pub type ChatResult<T> = std::result::Result<T, ChatError>;
