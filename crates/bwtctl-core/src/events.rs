//! Events produced by a supervised daemon instance

use serde::Serialize;

use crate::types::{Generation, LogRecord};

/// Event emitted by the output reader of one daemon launch
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DaemonEvent {
    /// A classified output line
    Log {
        generation: Generation,
        record: LogRecord,
    },

    /// The daemon announced its Electrum RPC listener
    RpcReady { generation: Generation, port: u16 },

    /// Both output streams reached end-of-file (the process exited or closed them)
    OutputClosed { generation: Generation },
}

impl DaemonEvent {
    pub fn generation(&self) -> Generation {
        match self {
            DaemonEvent::Log { generation, .. }
            | DaemonEvent::RpcReady { generation, .. }
            | DaemonEvent::OutputClosed { generation } => *generation,
        }
    }

    /// The log record carried by this event, if any
    pub fn record(&self) -> Option<&LogRecord> {
        match self {
            DaemonEvent::Log { record, .. } => Some(record),
            _ => None,
        }
    }
}
