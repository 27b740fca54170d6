//! # bwtctl-daemon - bwt Process Management
//!
//! Everything that touches the external `bwt` daemon: turning wallet key
//! material into a command line, spawning the process, and classifying its
//! output.
//!
//! Depends on [`bwtctl_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Argument Building
//! - [`DaemonConfig`] - Immutable per-launch snapshot, rendered with `to_args()`
//! - [`WatchedWallet`], [`WalletKeys`] - Key material input
//! - [`LaunchOptions`] - User settings that feed the command line
//! - [`canonicalize_xpub()`] - SLIP-132 to BIP-32 key conversion
//!
//! ### Process Management
//! - [`DaemonProcess`] - Spawned daemon plus its output reader task
//! - [`Launcher`], [`RunningDaemon`] - Seam used by the supervisor
//! - [`ProcessLauncher`] - Real launcher bound to a tokio runtime
//! - [`allocate_ephemeral_port()`] - Pick the RPC listen port
//! - [`resolve_daemon_binary()`] - Locate the `bwt` executable
//!
//! ### Output Parsing
//! - [`parse_log_line()`] - Classify one output line
//! - [`is_readiness()`] - Detect the RPC-server-running announcement

pub mod args;
pub mod binary;
pub mod log_parser;
pub mod port;
pub mod process;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod xpub;

pub use args::{
    multisig_descriptors, wallet_key_material, DaemonConfig, KeyMaterial, LaunchOptions,
    WalletKeys, WatchedWallet,
};
pub use binary::{daemon_file_name, resolve_daemon_binary};
pub use log_parser::{is_readiness, parse_log_line, FALLBACK_TAG, READINESS_PHRASE};
pub use port::{allocate_ephemeral_port, local_rpc_addr, LOCAL_HOST};
pub use process::{DaemonProcess, LaunchRequest, Launcher, ProcessLauncher, ReadyHook, RunningDaemon};
pub use xpub::canonicalize_xpub;
