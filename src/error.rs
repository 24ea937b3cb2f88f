//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror`, while `main`
//! uses `anyhow` for startup plumbing and [`Error::exit_code`] to pick the
//! process exit status.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - Module-specific errors ([`ProviderError`], [`AudioError`],
//!   [`FormatMismatch`]) for detailed handling

use crate::audio::{AudioError, FormatMismatch};
use crate::provider::{LoginError, ProviderError};

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit status for usage errors and generic startup failures.
pub const EXIT_FAILURE: u8 = 1;

/// Exit status for authentication failures.
pub const EXIT_LOGIN_FAILED: u8 = 2;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Streaming provider error
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Login rejected by the provider
    #[error("Login failed: {0}")]
    Login(#[from] LoginError),

    /// Audio output error
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// Delivered audio in a format the jukebox cannot play
    #[error("Audio format error: {0}")]
    Format(#[from] FormatMismatch),

    /// Unrecoverable playback error raised from a callback thread
    #[error("Playback error: {0}")]
    Playback(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a playback error.
    pub fn playback(message: impl Into<String>) -> Self {
        Self::Playback(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Login(_) => EXIT_LOGIN_FAILED,
            Self::WithContext { source, .. } => source.exit_code(),
            _ => EXIT_FAILURE,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, ProviderError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Provider(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, AudioError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Audio(e).context(ctx))
    }
}
