//! Persisted setting keys
//!
//! Every plugin setting is stored in the host's settings store under a
//! `bwt_`-prefixed key. [`SettingKey`] names them and knows how to turn a
//! command-line string into the value type stored for each.

use std::fmt;
use std::str::FromStr;

use bwtctl_core::prelude::*;

/// Value type of a persisted setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Bool,
    Integer,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    Enabled,
    BitcoindUrl,
    BitcoindDir,
    BitcoindAuth,
    BitcoindWallet,
    RescanSince,
    CustomOpt,
    Verbose,
    SocketPath,
    DaemonPath,
}

impl SettingKey {
    pub const ALL: [SettingKey; 10] = [
        SettingKey::Enabled,
        SettingKey::BitcoindUrl,
        SettingKey::BitcoindDir,
        SettingKey::BitcoindAuth,
        SettingKey::BitcoindWallet,
        SettingKey::RescanSince,
        SettingKey::CustomOpt,
        SettingKey::Verbose,
        SettingKey::SocketPath,
        SettingKey::DaemonPath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::Enabled => "bwt_enabled",
            SettingKey::BitcoindUrl => "bwt_bitcoind_url",
            SettingKey::BitcoindDir => "bwt_bitcoind_dir",
            SettingKey::BitcoindAuth => "bwt_bitcoind_auth",
            SettingKey::BitcoindWallet => "bwt_bitcoind_wallet",
            SettingKey::RescanSince => "bwt_rescan_since",
            SettingKey::CustomOpt => "bwt_custom_opt",
            SettingKey::Verbose => "bwt_verbose",
            SettingKey::SocketPath => "bwt_socket_path",
            SettingKey::DaemonPath => "bwt_daemon_path",
        }
    }

    pub fn kind(&self) -> SettingKind {
        match self {
            SettingKey::Enabled => SettingKind::Bool,
            SettingKey::Verbose => SettingKind::Integer,
            _ => SettingKind::Text,
        }
    }

    /// One-line description for `config list`
    pub fn description(&self) -> &'static str {
        match self {
            SettingKey::Enabled => "Start the daemon when watch-only wallets are open",
            SettingKey::BitcoindUrl => "Bitcoin Core RPC URL",
            SettingKey::BitcoindDir => "Bitcoin Core data directory (for cookie auth)",
            SettingKey::BitcoindAuth => "RPC credentials as <user>:<pass>",
            SettingKey::BitcoindWallet => "Bitcoin Core wallet to import addresses into",
            SettingKey::RescanSince => "Rescan from 'all', 'none' or YYYY-MM-DD",
            SettingKey::CustomOpt => "Extra daemon arguments, whitespace separated",
            SettingKey::Verbose => "Daemon verbosity (0-4)",
            SettingKey::SocketPath => "Unix socket for sync notifications (Linux)",
            SettingKey::DaemonPath => "Path to the bwt executable",
        }
    }

    /// Convert a user-supplied string into the stored value type
    pub fn parse_value(&self, raw: &str) -> Result<toml::Value> {
        let raw = raw.trim();
        match self.kind() {
            SettingKind::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(toml::Value::Boolean(true)),
                "false" | "0" | "no" | "off" => Ok(toml::Value::Boolean(false)),
                _ => Err(Error::config_invalid(format!(
                    "{} expects true or false, got '{}'",
                    self, raw
                ))),
            },
            SettingKind::Integer => raw.parse::<i64>().map(toml::Value::Integer).map_err(|e| {
                Error::config_invalid(format!("{} expects an integer, got '{}': {}", self, raw, e))
            }),
            SettingKind::Text => Ok(toml::Value::String(raw.to_string())),
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = Error;

    /// Accepts the full key or the name without the `bwt_` prefix
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        SettingKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s || key.as_str().strip_prefix("bwt_") == Some(s))
            .ok_or_else(|| Error::unknown_setting(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_prefixed_and_unique() {
        let mut names: Vec<_> = SettingKey::ALL.iter().map(|k| k.as_str()).collect();
        assert!(names.iter().all(|n| n.starts_with("bwt_")));
        names.sort();
        names.dedup();
        assert_eq!(names.len(), SettingKey::ALL.len());
    }

    #[test]
    fn test_parse_key_with_and_without_prefix() {
        assert_eq!(
            "bwt_bitcoind_url".parse::<SettingKey>().unwrap(),
            SettingKey::BitcoindUrl
        );
        assert_eq!("verbose".parse::<SettingKey>().unwrap(), SettingKey::Verbose);
        assert!(matches!(
            "bwt_colour".parse::<SettingKey>(),
            Err(Error::UnknownSetting { .. })
        ));
    }

    #[test]
    fn test_parse_value_by_kind() {
        assert_eq!(
            SettingKey::Enabled.parse_value("Yes").unwrap(),
            toml::Value::Boolean(true)
        );
        assert!(SettingKey::Enabled.parse_value("maybe").is_err());

        assert_eq!(
            SettingKey::Verbose.parse_value(" 2 ").unwrap(),
            toml::Value::Integer(2)
        );
        assert!(SettingKey::Verbose.parse_value("loud").is_err());

        assert_eq!(
            SettingKey::CustomOpt.parse_value("--gap-limit 50").unwrap(),
            toml::Value::String("--gap-limit 50".to_string())
        );
    }
}
