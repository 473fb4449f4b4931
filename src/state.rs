// Process-wide control state, owned by the runtime task

use crate::config::POSITION_CENTER;
use crate::radio::Address;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    /// Last position requested by the operator (0-4095)
    pub target_position: u16,
    /// Position actually transmitted, converging toward the target
    pub current_position: u16,
    /// Forces a transmission on the next tick
    pub position_changed: bool,
    pub destination: Address,
    sequence: u8,
    pub packets_sent: u32,
    pub message_count: u32,
}

impl ControlState {
    pub fn new() -> Self {
        Self {
            target_position: POSITION_CENTER,
            current_position: POSITION_CENTER,
            position_changed: false,
            destination: Address::BROADCAST,
            sequence: 0,
            packets_sent: 0,
            message_count: 0,
        }
    }

    /// Shared by the live template and scan bursts; post-increment, never reset
    pub fn sequence_mut(&mut self) -> &mut u8 {
        &mut self.sequence
    }

    pub fn next_sequence(&mut self) -> u8 {
        let seq = self.sequence;
        self.sequence = seq.wrapping_add(1);
        seq
    }

    pub fn count_packet(&mut self) {
        self.packets_sent = self.packets_sent.wrapping_add(1);
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}
