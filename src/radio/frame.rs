// Nucleus focus motor radio frame (802.15.4 data frame, 16 bytes)
//
// Frame layout:
// [0]     = 0x0F       - Frame length
// [1-2]   = 0x61 0x88  - Frame control
// [3]     = Sequence number
// [4-5]   = 0xE4 0x3D  - Destination PAN ID
// [6-7]   = Destination address (high, low)
// [8-9]   = 0x96 0xF0  - Source address
// [10-11] = 0x4 flag nibble + 12-bit position
// [12]    = Accessory byte (covered by checksum)
// [13]    = Checksum: 0 - [10] - [11] - [12]
// [14-15] = Padding

use std::fmt;

/// Total frame size on the wire
pub const FRAME_LEN: usize = 16;

const SEQUENCE: usize = 3;
const DEST_HIGH: usize = 6;
const DEST_LOW: usize = 7;
const POSITION_HIGH: usize = 10;
const POSITION_LOW: usize = 11;
const EXTRA: usize = 12;
const CHECKSUM: usize = 13;

/// Flag nibble carried in the upper half of the first position byte
const POSITION_FLAGS: u8 = 0x40;

/// Power-on template: broadcast destination, position 0x405
const TEMPLATE: [u8; FRAME_LEN] = [
    0x0F, 0x61, 0x88, 0x00, 0xE4, 0x3D, 0xFF, 0xFF, 0x96, 0xF0, 0x44, 0x05, 0x00, 0xB7, 0x00, 0x00,
];

/// Two-byte receiver address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub high: u8,
    pub low: u8,
}

impl Address {
    pub const BROADCAST: Address = Address::new(0xFF, 0xFF);

    pub const fn new(high: u8, low: u8) -> Self {
        Self { high, low }
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::BROADCAST
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}", self.high, self.low)
    }
}

/// One radio frame. The runtime keeps a single live instance and patches it in place.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    pub fn template() -> Self {
        Self { bytes: TEMPLATE }
    }

    #[cfg(test)]
    pub fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Self { bytes }
    }

    /// Write a position and recompute the checksum.
    ///
    /// Precondition: `position <= 4095`. Higher bits are masked off rather than
    /// rejected, so range checking belongs to the caller.
    pub fn encode_position(&mut self, position: u16) {
        self.bytes[POSITION_HIGH] = POSITION_FLAGS | ((position >> 8) & 0x0F) as u8;
        self.bytes[POSITION_LOW] = (position & 0xFF) as u8;
        self.bytes[CHECKSUM] = checksum(
            self.bytes[POSITION_HIGH],
            self.bytes[POSITION_LOW],
            self.bytes[EXTRA],
        );
    }

    /// Overwrite the destination address. The checksum does not cover it.
    pub fn set_destination(&mut self, address: Address) {
        self.bytes[DEST_HIGH] = address.high;
        self.bytes[DEST_LOW] = address.low;
    }

    pub fn set_sequence(&mut self, sequence: u8) {
        self.bytes[SEQUENCE] = sequence;
    }

    pub fn sequence(&self) -> u8 {
        self.bytes[SEQUENCE]
    }

    pub fn destination(&self) -> Address {
        Address::new(self.bytes[DEST_HIGH], self.bytes[DEST_LOW])
    }

    /// Decode the 12-bit position field
    pub fn position(&self) -> u16 {
        (((self.bytes[POSITION_HIGH] & 0x0F) as u16) << 8) | self.bytes[POSITION_LOW] as u16
    }

    pub fn checksum_valid(&self) -> bool {
        self.bytes[CHECKSUM]
            .wrapping_add(self.bytes[POSITION_HIGH])
            .wrapping_add(self.bytes[POSITION_LOW])
            .wrapping_add(self.bytes[EXTRA])
            == 0
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::template()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:02X?})", self.bytes)
    }
}

/// Two's-complement sum-to-zero over the position bytes and accessory byte
fn checksum(position_high: u8, position_low: u8, extra: u8) -> u8 {
    0u8.wrapping_sub(position_high)
        .wrapping_sub(position_low)
        .wrapping_sub(extra)
}

/// Build a disposable frame for `address` from the live template.
///
/// Stamps the next value of the shared sequence counter and advances it;
/// the template itself is left untouched.
pub fn build_scan_frame(
    template: &Frame,
    address: Address,
    position: u16,
    sequence: &mut u8,
) -> Frame {
    let mut frame = *template;
    frame.set_destination(address);
    frame.encode_position(position);
    frame.set_sequence(*sequence);
    *sequence = sequence.wrapping_add(1);
    frame
}
