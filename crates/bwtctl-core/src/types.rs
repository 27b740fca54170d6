//! Core domain types for bwtctl

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Log records
// ─────────────────────────────────────────────────────────────────

/// Severity of a daemon log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parse one of the daemon's severity tokens (exact, upper case)
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ERROR" => Some(LogLevel::Error),
            "WARN" => Some(LogLevel::Warn),
            "INFO" => Some(LogLevel::Info),
            "DEBUG" => Some(LogLevel::Debug),
            "TRACE" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    /// Display color used by log panels
    pub fn color_hex(&self) -> &'static str {
        match self {
            LogLevel::Error => "#CD0200",
            LogLevel::Warn => "#D47500",
            LogLevel::Info => "#4BBF73",
            LogLevel::Debug => "#2780E3",
            LogLevel::Trace => "#888888",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified line of daemon output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    /// Module path reported by the daemon, or `daemon` for unstructured lines
    pub tag: String,
    pub message: String,
    /// Timestamp prefix, when the daemon printed one
    pub timestamp: Option<DateTime<Utc>>,
}

impl LogRecord {
    pub fn new(level: LogLevel, tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            tag: tag.into(),
            message: message.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} » {}", self.level, self.tag, self.message)
    }
}

// ─────────────────────────────────────────────────────────────────
// Network
// ─────────────────────────────────────────────────────────────────

/// Chain variants the daemon understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Bitcoin,
    Testnet,
    Regtest,
}

impl Network {
    /// Map the host's chain identity onto a daemon network.
    ///
    /// Anything other than mainnet, testnet or regtest is a configuration
    /// error that retrying cannot fix.
    pub fn from_chain_identity(chain: &str) -> Result<Self> {
        match chain.trim().to_ascii_lowercase().as_str() {
            "bitcoin" | "mainnet" | "bitcoinmainnet" => Ok(Network::Bitcoin),
            "testnet" | "bitcointestnet" => Ok(Network::Testnet),
            "regtest" | "bitcoinregtest" => Ok(Network::Regtest),
            _ => Err(Error::unsupported_network(chain)),
        }
    }

    /// Value for `--network`
    pub fn as_arg(&self) -> &'static str {
        match self {
            Network::Bitcoin => "bitcoin",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }

    /// Default bitcoind RPC port
    pub fn default_rpc_port(&self) -> u16 {
        match self {
            Network::Bitcoin => 8332,
            Network::Testnet => 18332,
            Network::Regtest => 18443,
        }
    }

    pub fn default_bitcoind_url(&self) -> String {
        format!("http://localhost:{}/", self.default_rpc_port())
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

// ─────────────────────────────────────────────────────────────────
// Rescan policy
// ─────────────────────────────────────────────────────────────────

/// How far back the daemon rescans wallet history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RescanPolicy {
    #[default]
    All,
    None,
    Since(NaiveDate),
}

impl RescanPolicy {
    pub const DATE_FORMAT: &'static str = "%Y-%m-%d";

    /// Value for `--rescan-since`
    pub fn as_arg(&self) -> String {
        match self {
            RescanPolicy::All => "all".to_string(),
            RescanPolicy::None => "none".to_string(),
            RescanPolicy::Since(date) => date.format(Self::DATE_FORMAT).to_string(),
        }
    }
}

impl FromStr for RescanPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "all" => Ok(RescanPolicy::All),
            "none" => Ok(RescanPolicy::None),
            other => NaiveDate::parse_from_str(other, Self::DATE_FORMAT)
                .map(RescanPolicy::Since)
                .map_err(|e| {
                    Error::config_invalid(format!(
                        "rescan policy must be 'all', 'none' or YYYY-MM-DD, got '{}': {}",
                        other, e
                    ))
                }),
        }
    }
}

impl fmt::Display for RescanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_arg())
    }
}

// ─────────────────────────────────────────────────────────────────
// Multisig script types
// ─────────────────────────────────────────────────────────────────

/// Script wrapping of a multisig wallet, as tagged by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultisigScriptType {
    /// `sh(sortedmulti(..))`
    P2sh,
    /// `wsh(sortedmulti(..))`
    P2wsh,
    /// `sh(wsh(sortedmulti(..)))`
    P2wshP2sh,
}

impl MultisigScriptType {
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "p2sh" => Ok(MultisigScriptType::P2sh),
            "p2wsh" => Ok(MultisigScriptType::P2wsh),
            "p2wsh-p2sh" => Ok(MultisigScriptType::P2wshP2sh),
            other => Err(Error::unknown_script_type(other)),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            MultisigScriptType::P2sh => "p2sh",
            MultisigScriptType::P2wsh => "p2wsh",
            MultisigScriptType::P2wshP2sh => "p2wsh-p2sh",
        }
    }

    /// Wrap an inner `sortedmulti(..)` expression
    pub fn wrap(&self, inner: &str) -> String {
        match self {
            MultisigScriptType::P2sh => format!("sh({})", inner),
            MultisigScriptType::P2wsh => format!("wsh({})", inner),
            MultisigScriptType::P2wshP2sh => format!("sh(wsh({}))", inner),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Supervisor lifecycle
// ─────────────────────────────────────────────────────────────────

/// Lifecycle state of the supervised daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    #[default]
    Stopped,
    Starting,
    Running,
}

/// Identifies one launch of the daemon.
///
/// Incremented on every spawn so that output from a superseded instance can
/// be told apart from the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
