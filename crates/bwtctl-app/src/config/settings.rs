//! Plugin settings, read from and written to the host's settings store

use std::path::PathBuf;

use bwtctl_core::logging::data_directory;
use bwtctl_core::prelude::*;
use bwtctl_core::{Network, RescanPolicy};
use bwtctl_daemon::LaunchOptions;

use super::types::SettingKey;
use crate::host::Host;

/// Highest `-v` count the daemon understands
pub const MAX_VERBOSITY: u8 = 4;

const SOCKET_FILENAME: &str = "bwt-socket";

/// Typed view of the `bwt_*` settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSettings {
    pub enabled: bool,
    pub bitcoind_url: String,
    pub bitcoind_dir: PathBuf,
    pub bitcoind_auth: Option<String>,
    pub bitcoind_wallet: Option<String>,
    pub rescan: RescanPolicy,
    /// Free-form daemon arguments (`bwt_custom_opt`)
    pub extra_args: String,
    pub verbosity: u8,
    pub socket_path: Option<PathBuf>,
    pub daemon_path: Option<PathBuf>,
}

impl PluginSettings {
    /// Settings used when nothing has been persisted yet
    pub fn defaults(network: Network) -> Self {
        Self {
            enabled: false,
            bitcoind_url: network.default_bitcoind_url(),
            bitcoind_dir: default_bitcoind_dir(),
            bitcoind_auth: None,
            bitcoind_wallet: None,
            rescan: RescanPolicy::All,
            extra_args: String::new(),
            verbosity: 0,
            socket_path: Some(default_socket_path()),
            daemon_path: None,
        }
    }

    /// Load settings from the host, falling back to defaults per key.
    ///
    /// A value of the wrong type or shape is logged and ignored.
    pub fn load(host: &dyn Host, network: Network) -> Self {
        let mut settings = Self::defaults(network);
        for key in SettingKey::ALL {
            if let Some(value) = host.get_setting(key.as_str()) {
                if let Err(e) = settings.apply_value(key, &value) {
                    warn!("Ignoring {}: {}", key, e);
                }
            }
        }
        settings
    }

    /// Set one field from a stored value.
    ///
    /// Booleans and integers may also arrive as strings. An empty string
    /// clears an optional field.
    pub fn apply_value(&mut self, key: SettingKey, value: &toml::Value) -> Result<()> {
        match key {
            SettingKey::Enabled => self.enabled = value_as_bool(key, value)?,
            SettingKey::BitcoindUrl => self.bitcoind_url = required_text(key, value)?,
            SettingKey::BitcoindDir => {
                self.bitcoind_dir = PathBuf::from(required_text(key, value)?)
            }
            SettingKey::BitcoindAuth => self.bitcoind_auth = optional_text(key, value)?,
            SettingKey::BitcoindWallet => self.bitcoind_wallet = optional_text(key, value)?,
            SettingKey::RescanSince => {
                self.rescan = optional_text(key, value)?
                    .map(|s| s.parse::<RescanPolicy>())
                    .transpose()?
                    .unwrap_or_default()
            }
            SettingKey::CustomOpt => {
                self.extra_args = optional_text(key, value)?.unwrap_or_default()
            }
            SettingKey::Verbose => {
                let verbosity = value_as_integer(key, value)?;
                self.verbosity = u8::try_from(verbosity)
                    .ok()
                    .filter(|v| *v <= MAX_VERBOSITY)
                    .ok_or_else(|| {
                        Error::config_invalid(format!(
                            "{} must be between 0 and {}, got {}",
                            key, MAX_VERBOSITY, verbosity
                        ))
                    })?;
            }
            SettingKey::SocketPath => {
                self.socket_path = optional_text(key, value)?.map(PathBuf::from)
            }
            SettingKey::DaemonPath => {
                self.daemon_path = optional_text(key, value)?.map(PathBuf::from)
            }
        }
        Ok(())
    }

    /// Persist every key through the host
    pub fn save(&self, host: &dyn Host) -> Result<()> {
        for (key, value) in self.to_values() {
            host.set_setting(key.as_str(), value)
                .with_context(|| format!("Failed to save {}", key))?;
        }
        info!("Saved bwt settings");
        Ok(())
    }

    /// All settings as stored values; unset optionals become empty strings
    pub fn to_values(&self) -> Vec<(SettingKey, toml::Value)> {
        let text = |value: Option<String>| toml::Value::String(value.unwrap_or_default());
        vec![
            (SettingKey::Enabled, toml::Value::Boolean(self.enabled)),
            (
                SettingKey::BitcoindUrl,
                toml::Value::String(self.bitcoind_url.clone()),
            ),
            (
                SettingKey::BitcoindDir,
                toml::Value::String(self.bitcoind_dir.display().to_string()),
            ),
            (SettingKey::BitcoindAuth, text(self.bitcoind_auth.clone())),
            (SettingKey::BitcoindWallet, text(self.bitcoind_wallet.clone())),
            (
                SettingKey::RescanSince,
                toml::Value::String(self.rescan.as_arg()),
            ),
            (
                SettingKey::CustomOpt,
                toml::Value::String(self.extra_args.clone()),
            ),
            (
                SettingKey::Verbose,
                toml::Value::Integer(i64::from(self.verbosity)),
            ),
            (
                SettingKey::SocketPath,
                text(self.socket_path.as_ref().map(|p| p.display().to_string())),
            ),
            (
                SettingKey::DaemonPath,
                text(self.daemon_path.as_ref().map(|p| p.display().to_string())),
            ),
        ]
    }

    /// Check the values a user can get wrong in the settings form
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.bitcoind_url).map_err(|e| {
            Error::config_invalid(format!(
                "{} '{}' is not a valid URL: {}",
                SettingKey::BitcoindUrl,
                self.bitcoind_url,
                e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config_invalid(format!(
                "{} must use http or https, got '{}'",
                SettingKey::BitcoindUrl,
                url.scheme()
            )));
        }

        if self.bitcoind_dir.as_os_str().is_empty() {
            return Err(Error::config_invalid(format!(
                "{} must not be empty",
                SettingKey::BitcoindDir
            )));
        }

        if let Some(auth) = &self.bitcoind_auth {
            match auth.split_once(':') {
                Some((user, _)) if !user.is_empty() => {}
                _ => {
                    return Err(Error::config_invalid(format!(
                        "{} must be <user>:<pass>",
                        SettingKey::BitcoindAuth
                    )))
                }
            }
        }

        if self.verbosity > MAX_VERBOSITY {
            return Err(Error::config_invalid(format!(
                "{} must be between 0 and {}, got {}",
                SettingKey::Verbose,
                MAX_VERBOSITY,
                self.verbosity
            )));
        }

        Ok(())
    }

    /// The part of the settings that ends up on the daemon command line
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            bitcoind_url: self.bitcoind_url.clone(),
            bitcoind_dir: self.bitcoind_dir.clone(),
            bitcoind_auth: self.bitcoind_auth.clone(),
            bitcoind_wallet: self.bitcoind_wallet.clone(),
            rescan: self.rescan,
            socket_path: self.socket_path.clone(),
            verbosity: self.verbosity,
            extra_args: self.extra_args.clone(),
        }
    }
}

/// Bitcoin Core's default data directory on this platform
pub fn default_bitcoind_dir() -> PathBuf {
    let dir = if cfg!(any(target_os = "macos", target_os = "windows")) {
        dirs::data_dir().map(|d| d.join("Bitcoin"))
    } else {
        dirs::home_dir().map(|d| d.join(".bitcoin"))
    };
    dir.unwrap_or_else(|| PathBuf::from(".bitcoin"))
}

/// `<data_local_dir>/bwtctl/bwt-socket`
pub fn default_socket_path() -> PathBuf {
    data_directory().join(SOCKET_FILENAME)
}

fn optional_text(key: SettingKey, value: &toml::Value) -> Result<Option<String>> {
    match value {
        toml::Value::String(s) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        other => Err(Error::config_invalid(format!(
            "{} expects a string, got {}",
            key, other
        ))),
    }
}

fn required_text(key: SettingKey, value: &toml::Value) -> Result<String> {
    optional_text(key, value)?
        .ok_or_else(|| Error::config_invalid(format!("{} must not be empty", key)))
}

fn value_as_bool(key: SettingKey, value: &toml::Value) -> Result<bool> {
    match value {
        toml::Value::Boolean(b) => Ok(*b),
        toml::Value::String(s) => match key.parse_value(s)? {
            toml::Value::Boolean(b) => Ok(b),
            other => Err(Error::config_invalid(format!(
                "{} expects a boolean, got {}",
                key, other
            ))),
        },
        other => Err(Error::config_invalid(format!(
            "{} expects a boolean, got {}",
            key, other
        ))),
    }
}

fn value_as_integer(key: SettingKey, value: &toml::Value) -> Result<i64> {
    match value {
        toml::Value::Integer(i) => Ok(*i),
        toml::Value::String(s) => s.trim().parse().map_err(|_| {
            Error::config_invalid(format!("{} expects an integer, got '{}'", key, s))
        }),
        other => Err(Error::config_invalid(format!(
            "{} expects an integer, got {}",
            key, other
        ))),
    }
}
