// Raw frame transmission
//
// Sends are fire-and-forget: the receiver never acknowledges, so a failed
// write is logged and dropped. The next control tick corrects for it.

use std::io::Write;
#[cfg(test)]
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{trace, warn};

use super::frame::FRAME_LEN;
#[cfg(test)]
use super::frame::Frame;

/// Write timeout for the radio dongle; one frame is far below this at any sane baud rate
const WRITE_TIMEOUT_MS: u64 = 20;

#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    #[error("Cannot open radio port {port}: {source}")]
    Open {
        port: String,
        source: serialport::Error,
    },
}

pub trait RadioTransport: Send {
    fn transmit_raw(&mut self, frame: &[u8; FRAME_LEN]);
}

/// 802.15.4 dongle on a serial port. The leading length byte delimits frames.
pub struct SerialRadio {
    port: Box<dyn SerialPort>,
}

impl SerialRadio {
    pub fn open(port_name: &str, baudrate: u32) -> Result<Self, RadioError> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(WRITE_TIMEOUT_MS))
            .open()
            .map_err(|source| RadioError::Open {
                port: port_name.to_string(),
                source,
            })?;

        Ok(Self { port })
    }
}

impl RadioTransport for SerialRadio {
    fn transmit_raw(&mut self, frame: &[u8; FRAME_LEN]) {
        if let Err(e) = self.port.write_all(frame).and_then(|_| self.port.flush()) {
            warn!("Radio write failed, frame dropped: {}", e);
        }
    }
}

/// No hardware attached; frames only show up in the trace log
#[derive(Debug, Default)]
pub struct SimulatedRadio {
    frames: u64,
}

impl SimulatedRadio {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RadioTransport for SimulatedRadio {
    fn transmit_raw(&mut self, frame: &[u8; FRAME_LEN]) {
        self.frames += 1;
        trace!("sim tx #{}: {:02X?}", self.frames, frame);
    }
}

/// Keeps every transmitted frame; clones share the same log
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct RecordingRadio {
    frames: Arc<Mutex<Vec<Frame>>>,
}

#[cfg(test)]
impl RecordingRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn take(&self) -> Vec<Frame> {
        self.frames
            .lock()
            .map(|mut f| std::mem::take(&mut *f))
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl RadioTransport for RecordingRadio {
    fn transmit_raw(&mut self, frame: &[u8; FRAME_LEN]) {
        if let Ok(mut frames) = self.frames.lock() {
            frames.push(Frame::from_bytes(*frame));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_clones_share_log() {
        let recorder = RecordingRadio::new();
        let mut radio: Box<dyn RadioTransport> = Box::new(recorder.clone());

        let mut frame = Frame::template();
        frame.set_sequence(7);
        radio.transmit_raw(frame.as_bytes());

        let frames = recorder.take();
        assert_eq!(frames, vec![frame]);
        assert!(recorder.frames().is_empty());
    }
}
