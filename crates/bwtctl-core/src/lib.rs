//! # bwtctl-core - Core Domain Types
//!
//! Foundation crate for bwtctl. Provides domain types, error handling,
//! daemon event definitions and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, regex, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`LogLevel`], [`LogRecord`] - Classified daemon output
//! - [`Network`] - Chain variant passed to the daemon
//! - [`RescanPolicy`] - How far back the daemon rescans
//! - [`MultisigScriptType`] - Descriptor wrapping for multisig wallets
//! - [`SupervisorState`], [`Generation`] - Daemon lifecycle
//!
//! ### Events (`events`)
//! - [`DaemonEvent`] - Log / readiness / end-of-output events of one launch
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use bwtctl_core::prelude::*;
//! ```

pub mod ansi;
pub mod error;
pub mod events;
pub mod logging;
pub mod prelude;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use ansi::{contains_ansi_codes, strip_ansi_codes};
pub use error::{Error, Result, ResultExt};
pub use events::DaemonEvent;
pub use types::{
    Generation, LogLevel, LogRecord, MultisigScriptType, Network, RescanPolicy, SupervisorState,
};
