// Message types exchanged with the runtime task

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::state::ControlState;

// Ingestion contexts -> runtime. The runtime is the only owner of control
// state, so every read or write of it travels as one of these.
#[derive(Debug)]
pub enum Request {
    /// One assembled command line; `None` comes back for a blank line
    Line {
        line: String,
        reply: oneshot::Sender<Option<String>>,
    },
    /// Session greeting, which shows the live destination
    Banner { reply: oneshot::Sender<String> },
}

/// Snapshot published on the status topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub target_position: u16,
    pub current_position: u16,
    /// Hex, high byte first (e.g. "FFFF")
    pub destination: String,
    pub packets_sent: u32,
    pub message_count: u32,
}

impl From<&ControlState> for StatusReport {
    fn from(state: &ControlState) -> Self {
        Self {
            target_position: state.target_position,
            current_position: state.current_position,
            destination: state.destination.to_string(),
            packets_sent: state.packets_sent,
            message_count: state.message_count,
        }
    }
}
