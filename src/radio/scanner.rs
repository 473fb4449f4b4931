// Destination discovery
//
// Brute force: a fixed burst of frames drives the candidate address to a test
// position. Nothing comes back over the air; the operator watches the lens and
// re-scans other addresses until it moves, then stores the winner with DEST.

use tracing::info;

use super::frame::{Address, Frame, build_scan_frame};
use super::transport::RadioTransport;
use crate::config::{SCAN_BURST, SCAN_TEST_POSITION};
use crate::state::ControlState;

/// Send the scan burst to `address`. Returns the number of frames sent.
///
/// Works on copies of `template`; the live frame, target, current position and
/// stored destination are untouched. Only the shared sequence counter and
/// `packets_sent` advance.
pub fn scan(
    template: &Frame,
    address: Address,
    state: &mut ControlState,
    radio: &mut dyn RadioTransport,
) -> usize {
    info!(
        "Scanning {} with {} frames at position {}",
        address, SCAN_BURST, SCAN_TEST_POSITION
    );

    for _ in 0..SCAN_BURST {
        let frame = build_scan_frame(template, address, SCAN_TEST_POSITION, state.sequence_mut());
        radio.transmit_raw(frame.as_bytes());
        state.count_packet();
    }

    SCAN_BURST
}
