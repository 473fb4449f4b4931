// Radio link to the focus motor
//
// Provides:
// - Fixed 16-byte frame codec (position, destination, checksum)
// - Raw transmit backends (serial dongle, simulator)
// - Destination scan bursts

pub mod frame;
pub mod scanner;
pub mod transport;

pub use frame::{Address, FRAME_LEN, Frame, build_scan_frame};
pub use transport::{RadioError, RadioTransport, SerialRadio, SimulatedRadio};
#[cfg(test)]
pub use transport::RecordingRadio;
