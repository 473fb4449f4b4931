// Text command interpreter
//
// One line in, one response out. Keywords are case-insensitive, arguments are
// decimal. Range checks happen here: the frame codec masks instead of
// rejecting, so nothing out of range may get past this module.

use std::num::IntErrorKind;

use tracing::{debug, info};

use crate::config::{POSITION_MAX, SCAN_TEST_POSITION};
use crate::radio::{Address, RadioTransport, scanner};
use crate::smoother::MotionSmoother;
use crate::state::ControlState;

pub const VERSION_LINE: &str = "VERSION: Tilta Motor Control v2.0";
pub const PRODUCT_LINE: &str = "Tilta Nucleus Nano 2 Motor Control v2.0";

const HELP_LINES: [&str; 8] = [
    "Commands:",
    "  POS <value>      - Set motor position (0-4095)",
    "  DEST <hi> <lo>   - Set destination address (0-255 each)",
    "  SCAN <hi> <lo>   - Test a specific address",
    "  GETDEST          - Get current destination",
    "  STATUS           - Get current status",
    "  VERSION          - Get firmware version",
    "  HELP             - Show this help",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pos(u16),
    Dest(Address),
    Scan(Address),
    GetDest,
    Status,
    Version,
    Help,
}

/// Display output is the exact line sent to the operator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("ERROR: Position must be 0-4095")]
    PositionRange,

    #[error("ERROR: Address bytes must be 0-255")]
    AddressRange,

    #[error("ERROR: Usage: {0}")]
    Usage(&'static str),

    #[error("ERROR: Invalid number '{0}'")]
    InvalidNumber(String),

    #[error("ERROR: Unknown command '{0}'")]
    Unknown(String),
}

impl Command {
    /// Parse one line. `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            return Ok(None);
        };
        let keyword = keyword.to_ascii_uppercase();

        let command = match keyword.as_str() {
            "POS" => {
                let arg = tokens.next().ok_or(CommandError::Usage("POS <value>"))?;
                let value = parse_number(arg)?;
                if !(0..=POSITION_MAX as i64).contains(&value) {
                    return Err(CommandError::PositionRange);
                }
                Command::Pos(value as u16)
            }
            "DEST" => Command::Dest(parse_address(&mut tokens, "DEST <high> <low>")?),
            "SCAN" => Command::Scan(parse_address(&mut tokens, "SCAN <high> <low>")?),
            "GETDEST" => Command::GetDest,
            "STATUS" => Command::Status,
            "VERSION" => Command::Version,
            "HELP" => Command::Help,
            _ => return Err(CommandError::Unknown(keyword)),
        };
        Ok(Some(command))
    }
}

/// Overflowing integers saturate so they fail the caller's range check
fn parse_number(token: &str) -> Result<i64, CommandError> {
    token.parse::<i64>().or_else(|e| match e.kind() {
        IntErrorKind::PosOverflow => Ok(i64::MAX),
        IntErrorKind::NegOverflow => Ok(i64::MIN),
        _ => Err(CommandError::InvalidNumber(token.to_string())),
    })
}

fn parse_address<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    usage: &'static str,
) -> Result<Address, CommandError> {
    let (Some(high), Some(low)) = (tokens.next(), tokens.next()) else {
        return Err(CommandError::Usage(usage));
    };
    let high = parse_number(high)?;
    let low = parse_number(low)?;
    match (u8::try_from(high), u8::try_from(low)) {
        (Ok(high), Ok(low)) => Ok(Address::new(high, low)),
        _ => Err(CommandError::AddressRange),
    }
}

/// Count, parse and run one line. `None` for a blank line.
pub fn handle_line(
    line: &str,
    state: &mut ControlState,
    smoother: &mut MotionSmoother,
    radio: &mut dyn RadioTransport,
) -> Option<String> {
    state.message_count = state.message_count.wrapping_add(1);

    match Command::parse(line) {
        Ok(Some(command)) => Some(execute(command, state, smoother, radio)),
        Ok(None) => None,
        Err(e) => {
            debug!("Rejected {:?}: {}", line, e);
            Some(format!("{}\r\n", e))
        }
    }
}

/// Apply a parsed command. Every line of the returned text ends in CRLF.
pub fn execute(
    command: Command,
    state: &mut ControlState,
    smoother: &mut MotionSmoother,
    radio: &mut dyn RadioTransport,
) -> String {
    match command {
        Command::Pos(value) => {
            state.target_position = value;
            state.position_changed = true;
            debug!("Target position {}", value);
            format!("OK:POS={}\r\n", value)
        }
        Command::Dest(address) => {
            state.destination = address;
            smoother.set_destination(address);
            info!("Destination set to {}", address);
            format!("OK:DEST={}\r\n", address)
        }
        Command::Scan(address) => {
            scanner::scan(smoother.template(), address, state, radio);
            format!("OK:SCAN={}@{}\r\n", address, SCAN_TEST_POSITION)
        }
        Command::GetDest => format!("OK:DEST={}\r\n", state.destination),
        Command::Status => format!(
            "STATUS: Target={}, Current={}, Dest={}, Packets={}, Messages={}\r\n",
            state.target_position,
            state.current_position,
            state.destination,
            state.packets_sent,
            state.message_count
        ),
        Command::Version => format!("{}\r\n", VERSION_LINE),
        Command::Help => HELP_LINES.iter().map(|l| format!("{}\r\n", l)).collect(),
    }
}

/// Greeting written when a console session starts
pub fn banner(destination: Address) -> String {
    let rule = "========================================";
    format!(
        "\r\n{rule}\r\n{PRODUCT_LINE}\r\n{rule}\r\n\
         Commands: POS, DEST, SCAN, GETDEST, STATUS, HELP\r\n\
         Destination: {destination}\r\n\
         Ready!\r\n"
    )
}
