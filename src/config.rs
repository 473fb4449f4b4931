// Timing, protocol constants, topics and runtime configuration
use std::path::Path;

use serde::{Deserialize, Serialize};

// Control loop frequency
pub const LOOP_HZ: u64 = 100;

// Largest position change applied in a single tick
pub const MAX_STEP: u16 = 50;

// Link keeper: transmit at least once every N ticks even when idle
pub const HEARTBEAT_TICKS: u32 = 10;

// Position range of the focus motor (12 bits)
pub const POSITION_MAX: u16 = 4095;
pub const POSITION_CENTER: u16 = 2048;

// Scan burst: repetitions and the test position the motor is driven to.
// 1234 is unlikely to be the current position and keeps clear of both end stops.
pub const SCAN_BURST: usize = 10;
pub const SCAN_TEST_POSITION: u16 = 1234;

// Command line buffer (bytes beyond this are discarded)
pub const MAX_LINE_LEN: usize = 255;

// Output queue depth for console replies (chunks, best effort)
pub const TX_QUEUE_DEPTH: usize = 64;

// Pending command lines waiting for the control task
pub const REQUEST_QUEUE_DEPTH: usize = 16;

// Status snapshots are published every N ticks
pub const STATUS_PUBLISH_TICKS: u32 = 10;

// Zenoh topics
pub const TOPIC_CMD: &str = "nucleus/cmd"; // command lines in
pub const TOPIC_REPLY: &str = "nucleus/reply"; // responses out
pub const TOPIC_STATUS: &str = "nucleus/state/status"; // periodic status

// Serial defaults for the radio dongle and the command port
pub const DEFAULT_RADIO_PORT: &str = "/dev/ttyACM0";
pub const DEFAULT_COMMAND_PORT: &str = "/dev/ttyGS0";
pub const DEFAULT_BAUDRATE: u32 = 115_200;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Loop rate must be between 1 and 1000 Hz, got {0}")]
    LoopRate(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioKind {
    /// Raw frames written to a serial-attached 802.15.4 dongle
    Serial,
    /// No hardware, frames are only logged
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleKind {
    Stdio,
    Serial,
    Off,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub kind: RadioKind,
    pub port: String,
    pub baudrate: u32,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            kind: RadioKind::Serial,
            port: DEFAULT_RADIO_PORT.to_string(),
            baudrate: DEFAULT_BAUDRATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub kind: ConsoleKind,
    pub port: String,
    pub baudrate: u32,
    /// Echo typed characters back (off for a cooked terminal, on for raw serial)
    pub echo: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            kind: ConsoleKind::Stdio,
            port: DEFAULT_COMMAND_PORT.to_string(),
            baudrate: DEFAULT_BAUDRATE,
            echo: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub loop_hz: u64,
    pub radio: RadioConfig,
    pub console: ConsoleConfig,
    /// Bridge commands and status over zenoh
    pub zenoh: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            loop_hz: LOOP_HZ,
            radio: RadioConfig::default(),
            console: ConsoleConfig::default(),
            zenoh: false,
        }
    }
}

impl RuntimeConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=1000).contains(&self.loop_hz) {
            return Err(ConfigError::LoopRate(self.loop_hz));
        }
        Ok(())
    }
}
