//! Application error types with rich context

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Daemon/Process Errors
    // ─────────────────────────────────────────────────────────────
    #[error("bwt daemon binary not found (searched: {searched})")]
    DaemonNotFound { searched: String },

    #[error("Failed to spawn bwt daemon: {reason}")]
    ProcessSpawn { reason: String },

    #[error("Failed to allocate a local port: {reason}")]
    PortAllocation { reason: String },

    // ─────────────────────────────────────────────────────────────
    // Wallet/Key Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Unsupported network: {chain}")]
    UnsupportedNetwork { chain: String },

    #[error("Unsupported wallet {wallet}: {reason}")]
    UnsupportedWallet { wallet: String, reason: String },

    #[error("Invalid extended public key: {reason}")]
    InvalidKey { reason: String },

    #[error("Unknown multisig script type: {script_type}")]
    UnknownScriptType { script_type: String },

    #[error("No watch-only wallets with public key material are loaded")]
    NoWatchOnlyWallets,

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    #[error("Unknown setting: {key}")]
    UnknownSetting { key: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    // ─────────────────────────────────────────────────────────────
    // Host/Channel Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Host error: {message}")]
    Host { message: String },

    #[error("Channel send error: {message}")]
    ChannelSend { message: String },

    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn process_spawn(reason: impl Into<String>) -> Self {
        Self::ProcessSpawn {
            reason: reason.into(),
        }
    }

    pub fn unsupported_network(chain: impl Into<String>) -> Self {
        Self::UnsupportedNetwork {
            chain: chain.into(),
        }
    }

    pub fn unsupported_wallet(wallet: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedWallet {
            wallet: wallet.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }

    pub fn unknown_script_type(script_type: impl Into<String>) -> Self {
        Self::UnknownScriptType {
            script_type: script_type.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn unknown_setting(key: impl Into<String>) -> Self {
        Self::UnknownSetting { key: key.into() }
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }

    pub fn channel_send(message: impl Into<String>) -> Self {
        Self::ChannelSend {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error.
    ///
    /// Per-wallet errors are recovered by skipping the wallet; the build of
    /// the remaining wallets carries on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedWallet { .. }
                | Error::InvalidKey { .. }
                | Error::UnknownScriptType { .. }
                | Error::Host { .. }
                | Error::ChannelSend { .. }
        )
    }

    /// Check if this error must be surfaced to the user instead of retried
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedNetwork { .. }
                | Error::DaemonNotFound { .. }
                | Error::ProcessSpawn { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
