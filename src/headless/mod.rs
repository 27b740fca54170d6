//! Headless mode - JSON event output for scripts and tests
//!
//! `bwtctl run` does not draw anything. It reports what the supervised daemon
//! is doing as NDJSON (newline-delimited JSON) on stdout, one event per line,
//! each tagged with an `event` field.
//!
//! # Example Output
//!
//! ```json
//! {"event":"started","generation":1,"port":40211,"wallets":2,"timestamp":1704700001000}
//! {"event":"log","generation":1,"level":"info","tag":"bwt::electrum","message":"Electrum RPC server running on 127.0.0.1:40211","timestamp":1704700002000}
//! {"event":"rpc_ready","generation":1,"port":40211,"server":"127.0.0.1:40211:t","timestamp":1704700002001}
//! ```

pub mod runner;
pub mod signals;

use std::io::{self, Write};

use chrono::Utc;
use serde::Serialize;

use bwtctl_core::{DaemonEvent, LogLevel, SupervisorState};

/// Events emitted in headless mode
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// A daemon instance was spawned
    Started {
        generation: u64,
        port: u16,
        wallets: usize,
        timestamp: i64,
    },

    /// A classified line of daemon output
    Log {
        generation: u64,
        level: LogLevel,
        tag: String,
        message: String,
        timestamp: i64,
    },

    /// The daemon's Electrum server is accepting connections
    RpcReady {
        generation: u64,
        port: u16,
        /// Server string the host was pointed at
        server: String,
        timestamp: i64,
    },

    /// The daemon closed its output streams
    DaemonExited { generation: u64, timestamp: i64 },

    /// Answer to a `status` command on stdin
    Status {
        state: SupervisorState,
        generation: u64,
        port: Option<u16>,
        wallets: usize,
        timestamp: i64,
    },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },

    /// The runner shut the daemon down and restored the host configuration
    Stopped {
        reason: Option<String>,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Write this event as one JSON line and flush
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        serde_json::to_writer(&mut *out, self)?;
        out.write_all(b"\n")?;
        out.flush()
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    pub fn started(generation: u64, port: u16, wallets: usize) -> Self {
        Self::Started {
            generation,
            port,
            wallets,
            timestamp: Self::now(),
        }
    }

    pub fn status(
        state: SupervisorState,
        generation: u64,
        port: Option<u16>,
        wallets: usize,
    ) -> Self {
        Self::Status {
            state,
            generation,
            port,
            wallets,
            timestamp: Self::now(),
        }
    }

    pub fn error(message: impl Into<String>, fatal: bool) -> Self {
        Self::Error {
            message: message.into(),
            fatal,
            timestamp: Self::now(),
        }
    }

    pub fn stopped(reason: Option<String>) -> Self {
        Self::Stopped {
            reason,
            timestamp: Self::now(),
        }
    }
}

impl From<&DaemonEvent> for HeadlessEvent {
    fn from(event: &DaemonEvent) -> Self {
        let generation = event.generation().0;
        match event {
            DaemonEvent::Log { record, .. } => Self::Log {
                generation,
                level: record.level,
                tag: record.tag.clone(),
                message: record.message.clone(),
                timestamp: record
                    .timestamp
                    .map_or_else(Self::now, |t| t.timestamp_millis()),
            },
            DaemonEvent::RpcReady { port, .. } => Self::RpcReady {
                generation,
                port: *port,
                server: format!("127.0.0.1:{}:t", port),
                timestamp: Self::now(),
            },
            DaemonEvent::OutputClosed { .. } => Self::DaemonExited {
                generation,
                timestamp: Self::now(),
            },
        }
    }
}
