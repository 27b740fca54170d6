//! bwtctl-app - Supervision of the bwt daemon on behalf of a wallet host
//!
//! Ties the daemon plumbing in `bwtctl-daemon` to a host application: which
//! wallets to watch, when to (re)start the daemon, and how the host is pointed
//! at the daemon's RPC server and restored afterwards.

pub mod config;
pub mod handoff;
pub mod host;
pub mod overrides;
pub mod plugin;
pub mod standalone;
pub mod supervisor;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod watch_set;

// Re-export primary types
pub use config::{PluginSettings, SettingKey, SettingsStore};
pub use handoff::{HandoffController, PriorHostSettings};
pub use host::{Host, NetworkParameters, OverrideKey, Protocol, WalletInfo, WalletKind};
pub use overrides::OverrideLayer;
pub use plugin::WalletEvents;
pub use standalone::StandaloneHost;
pub use supervisor::Supervisor;
pub use watch_set::WatchSet;

// Re-export daemon types for the binary
pub use bwtctl_daemon::{Launcher, ProcessLauncher};
