// Motion smoothing and link keeping
//
// Runs once per control tick. Slews the transmitted position toward the
// target at no more than MAX_STEP per tick, and re-sends the live frame every
// HEARTBEAT_TICKS so the receiver never sees the link go idle.

use tracing::trace;

use crate::config::{HEARTBEAT_TICKS, MAX_STEP, POSITION_MAX};
use crate::radio::{Address, Frame, RadioTransport};
use crate::state::ControlState;

/// Owns the live frame template used for periodic transmissions
pub struct MotionSmoother {
    frame: Frame,
    tick: u32,
}

impl MotionSmoother {
    pub fn new() -> Self {
        Self {
            frame: Frame::template(),
            tick: 0,
        }
    }

    /// Patch the live template so the next transmission goes to `address`
    pub fn set_destination(&mut self, address: Address) {
        self.frame.set_destination(address);
    }

    pub fn template(&self) -> &Frame {
        &self.frame
    }

    pub fn ticks(&self) -> u32 {
        self.tick
    }

    /// Advance one tick. Returns the transmitted position, if a frame was sent.
    pub fn tick(
        &mut self,
        state: &mut ControlState,
        radio: &mut dyn RadioTransport,
    ) -> Option<u16> {
        if state.current_position != state.target_position {
            state.current_position = step_toward(state.current_position, state.target_position);
            state.position_changed = true;
        }

        let heartbeat = self.tick % HEARTBEAT_TICKS == 0;
        let sent = if state.position_changed || heartbeat {
            // Alternating 1-unit jitter; clamped so 4095 + 1 cannot wrap to 0 in the 12-bit field
            let jitter = (self.tick % 2) as u16;
            let position = (state.current_position + jitter).min(POSITION_MAX);

            self.frame.encode_position(position);
            self.frame.set_sequence(state.next_sequence());
            radio.transmit_raw(self.frame.as_bytes());
            state.count_packet();
            state.position_changed = false;

            trace!(
                "tick {}: tx pos={} seq={} dest={}",
                self.tick,
                position,
                self.frame.sequence(),
                self.frame.destination()
            );
            Some(position)
        } else {
            None
        };

        self.tick = self.tick.wrapping_add(1);
        sent
    }
}

impl Default for MotionSmoother {
    fn default() -> Self {
        Self::new()
    }
}

/// Move at most MAX_STEP toward `target`, snapping once within range
fn step_toward(current: u16, target: u16) -> u16 {
    if current.abs_diff(target) > MAX_STEP {
        if target > current {
            current + MAX_STEP
        } else {
            current - MAX_STEP
        }
    } else {
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::RecordingRadio;

    fn ticks_to_converge(from: u16, to: u16) -> usize {
        let mut smoother = MotionSmoother::new();
        let mut state = ControlState::new();
        let mut radio = RecordingRadio::new();
        state.current_position = from;
        state.target_position = to;

        let mut ticks = 0;
        while state.current_position != to {
            let before = state.current_position;
            smoother.tick(&mut state, &mut radio);
            ticks += 1;

            // Never overshoot, never step more than MAX_STEP
            assert!(before.abs_diff(state.current_position) <= MAX_STEP);
            if to > from {
                assert!(state.current_position <= to);
            } else {
                assert!(state.current_position >= to);
            }
            assert!(ticks <= 100, "did not converge");
        }
        ticks
    }

    #[test]
    fn test_step_toward() {
        assert_eq!(step_toward(2048, 500), 1998);
        assert_eq!(step_toward(500, 2048), 550);
        assert_eq!(step_toward(520, 500), 500);
        assert_eq!(step_toward(450, 500), 500);
        assert_eq!(step_toward(500, 500), 500);
    }

    #[test]
    fn test_convergence_tick_count() {
        assert_eq!(ticks_to_converge(2048, 500), 31); // ceil(1548 / 50)
        assert_eq!(ticks_to_converge(0, 4095), 82); // ceil(4095 / 50)
        assert_eq!(ticks_to_converge(4095, 0), 82);
        assert_eq!(ticks_to_converge(100, 150), 1);
        assert_eq!(ticks_to_converge(100, 200), 2);
        assert_eq!(ticks_to_converge(1000, 999), 1);
    }

    #[test]
    fn test_every_moving_tick_transmits() {
        let mut smoother = MotionSmoother::new();
        let mut state = ControlState::new();
        let mut radio = RecordingRadio::new();
        state.target_position = 2048 + 200;

        for _ in 0..4 {
            assert!(smoother.tick(&mut state, &mut radio).is_some());
        }
        assert_eq!(state.current_position, 2248);
        assert_eq!(radio.frames().len(), 4);
        assert_eq!(state.packets_sent, 4);
        assert!(!state.position_changed);
    }

    #[test]
    fn test_heartbeat_when_idle() {
        let mut smoother = MotionSmoother::new();
        let mut state = ControlState::new();
        let mut radio = RecordingRadio::new();

        let mut sent_at = Vec::new();
        for tick in 0..100u32 {
            if smoother.tick(&mut state, &mut radio).is_some() {
                sent_at.push(tick);
            }
        }

        assert_eq!(sent_at, (0..100).step_by(10).collect::<Vec<u32>>());
        let frames = radio.frames();
        assert_eq!(frames.len(), 10);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.sequence(), i as u8);
            assert_eq!(frame.position(), 2048);
            assert!(frame.checksum_valid());
        }
    }

    #[test]
    fn test_dirty_flag_forces_send_with_jitter() {
        let mut smoother = MotionSmoother::new();
        let mut state = ControlState::new();
        let mut radio = RecordingRadio::new();

        smoother.tick(&mut state, &mut radio); // tick 0, heartbeat
        state.position_changed = true;
        // tick 1 is odd, so the jitter adds one unit
        assert_eq!(smoother.tick(&mut state, &mut radio), Some(2049));
        assert_eq!(smoother.tick(&mut state, &mut radio), None);
    }

    #[test]
    fn test_jitter_clamped_at_top() {
        let mut smoother = MotionSmoother::new();
        let mut state = ControlState::new();
        let mut radio = RecordingRadio::new();
        state.current_position = 4095;
        state.target_position = 4095;

        smoother.tick(&mut state, &mut radio);
        state.position_changed = true;
        assert_eq!(smoother.tick(&mut state, &mut radio), Some(4095));
        assert_eq!(radio.frames()[1].position(), 4095);
    }

    #[test]
    fn test_destination_patch_used_next_tick() {
        let mut smoother = MotionSmoother::new();
        let mut state = ControlState::new();
        let mut radio = RecordingRadio::new();

        smoother.set_destination(Address::new(0x12, 0x34));
        smoother.tick(&mut state, &mut radio);

        assert_eq!(radio.frames()[0].destination(), Address::new(0x12, 0x34));
    }
}
