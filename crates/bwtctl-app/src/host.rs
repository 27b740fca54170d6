//! The wallet application the supervisor plugs into
//!
//! [`Host`] is the narrow interface the supervisor consumes: chain identity,
//! the active network endpoint, the runtime override layer and the persisted
//! settings store. [`WalletInfo`] is the read-only view of a host wallet.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use bwtctl_core::prelude::*;

/// Transport used to reach an Electrum server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plaintext TCP (`t`)
    #[default]
    Tcp,
    /// TLS (`s`)
    Ssl,
}

impl Protocol {
    pub fn as_char(&self) -> char {
        match self {
            Protocol::Tcp => 't',
            Protocol::Ssl => 's',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            't' => Some(Protocol::Tcp),
            's' => Some(Protocol::Ssl),
            _ => None,
        }
    }
}

/// The host's active network endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParameters {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    /// Connect to `host` only, never to other servers
    pub oneserver: bool,
    /// Proxy the host routes connections through, carried over unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl Default for NetworkParameters {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 50001,
            protocol: Protocol::Tcp,
            oneserver: false,
            proxy: None,
        }
    }
}

impl NetworkParameters {
    /// `host:port:protocol`, the format of the `server` override
    pub fn server_string(&self) -> String {
        format!("{}:{}:{}", self.host, self.port, self.protocol.as_char())
    }

    /// Parse a `host:port:protocol` server string, keeping the other fields
    /// of `self`.
    pub fn with_server(&self, server: &str) -> Result<Self> {
        let mut parts = server.rsplitn(3, ':');
        let (Some(protocol), Some(port), Some(host)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::config_invalid(format!(
                "server must be host:port:protocol, got '{}'",
                server
            )));
        };

        let protocol = protocol
            .chars()
            .next()
            .filter(|_| protocol.len() == 1)
            .and_then(Protocol::from_char)
            .ok_or_else(|| {
                Error::config_invalid(format!("unknown server protocol '{}'", protocol))
            })?;
        let port = port
            .parse::<u16>()
            .map_err(|e| Error::config_invalid(format!("bad server port '{}': {}", port, e)))?;

        Ok(Self {
            host: host.to_string(),
            port,
            protocol,
            ..self.clone()
        })
    }
}

impl fmt::Display for NetworkParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.server_string())?;
        if self.oneserver {
            write!(f, " (oneserver)")?;
        }
        Ok(())
    }
}

/// Runtime settings the supervisor overrides while the daemon is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideKey {
    OneServer,
    SkipMerkleCheck,
    Server,
}

impl OverrideKey {
    pub const ALL: [OverrideKey; 3] = [
        OverrideKey::OneServer,
        OverrideKey::SkipMerkleCheck,
        OverrideKey::Server,
    ];

    /// Name of the setting in the host's configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideKey::OneServer => "oneserver",
            OverrideKey::SkipMerkleCheck => "skipmerklecheck",
            OverrideKey::Server => "server",
        }
    }
}

impl fmt::Display for OverrideKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverrideKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        OverrideKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::unknown_setting(s))
    }
}

/// How a wallet signs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WalletKind {
    Standard,
    Multisig { threshold: usize },
}

/// Read-only view of a wallet open in the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub id: String,
    pub kind: WalletKind,
    /// Exportable extended public keys, in any SLIP-132 serialization
    #[serde(default)]
    pub master_public_keys: Vec<String>,
    /// Multisig script type tag (`p2sh`, `p2wsh`, `p2wsh-p2sh`)
    #[serde(default)]
    pub script_type: Option<String>,
    /// False for wallets holding private keys
    #[serde(default)]
    pub watch_only: bool,
}

/// The hosting wallet application.
///
/// `set_network_parameters` is called from the daemon output reader task,
/// so implementations must tolerate being called off the control thread.
#[cfg_attr(test, mockall::automock)]
pub trait Host: Send + Sync {
    /// Global chain selector (`mainnet`, `testnet`, `regtest`, ...)
    fn chain_identity(&self) -> String;

    fn network_parameters(&self) -> NetworkParameters;

    fn set_network_parameters(&self, params: NetworkParameters) -> Result<()>;

    /// Value in the non-persistent override layer, if any
    fn get_override(&self, key: OverrideKey) -> Option<toml::Value>;

    fn set_override(&self, key: OverrideKey, value: toml::Value);

    fn remove_override(&self, key: OverrideKey);

    /// Value from the persisted settings store
    fn get_setting(&self, key: &str) -> Option<toml::Value>;

    fn set_setting(&self, key: &str, value: toml::Value) -> Result<()>;
}
