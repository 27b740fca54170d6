//! Plugin configuration
//!
//! - `types` - the `bwt_*` setting keys
//! - `settings` - typed [`PluginSettings`] over the host's settings store
//! - `store` - TOML file backing the standalone host

pub mod settings;
pub mod store;
pub mod types;

pub use settings::{default_bitcoind_dir, default_socket_path, PluginSettings, MAX_VERBOSITY};
pub use store::SettingsStore;
pub use types::{SettingKey, SettingKind};
