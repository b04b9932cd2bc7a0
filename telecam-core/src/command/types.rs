//! Motion and stream-control commands sent to the remote peer.
//!
//! Unknown opcode bytes are rejected through `TryFrom`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommandError;

// ── Opcode ───────────────────────────────────────────────────────

/// Single-byte opcodes understood by the camera firmware.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    /// Begin streaming frames.
    StartStream = 0x01,
    /// Restart the capture pipeline on the remote side.
    Restart = 0x02,
    /// Stop streaming frames.
    StopStream = 0x08,
    /// Drive forward.
    Advance = 0x0A,
    /// Drive backward.
    Retreat = 0x0B,
    TurnLeft = 0x0C,
    TurnRight = 0x0D,
    /// Stop all motion.
    Halt = 0x0E,
}

impl Opcode {
    pub const ALL: [Opcode; 8] = [
        Opcode::StartStream,
        Opcode::Restart,
        Opcode::StopStream,
        Opcode::Advance,
        Opcode::Retreat,
        Opcode::TurnLeft,
        Opcode::TurnRight,
        Opcode::Halt,
    ];

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Opcode::StartStream => "start",
            Opcode::Restart => "restart",
            Opcode::StopStream => "stop",
            Opcode::Advance => "advance",
            Opcode::Retreat => "retreat",
            Opcode::TurnLeft => "left",
            Opcode::TurnRight => "right",
            Opcode::Halt => "halt",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = CommandError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Opcode::StartStream),
            0x02 => Ok(Opcode::Restart),
            0x08 => Ok(Opcode::StopStream),
            0x0A => Ok(Opcode::Advance),
            0x0B => Ok(Opcode::Retreat),
            0x0C => Ok(Opcode::TurnLeft),
            0x0D => Ok(Opcode::TurnRight),
            0x0E => Ok(Opcode::Halt),
            other => Err(CommandError::UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Opcode {
    type Err = CommandError;

    /// Accepts the long names and the single-key console shortcuts.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" | "start-stream" => Ok(Opcode::StartStream),
            "restart" | "r" => Ok(Opcode::Restart),
            "stop" | "stop-stream" => Ok(Opcode::StopStream),
            "advance" | "forward" | "up" | "w" => Ok(Opcode::Advance),
            "retreat" | "back" | "down" | "s" => Ok(Opcode::Retreat),
            "left" | "turn-left" | "a" => Ok(Opcode::TurnLeft),
            "right" | "turn-right" | "d" => Ok(Opcode::TurnRight),
            "halt" | "x" => Ok(Opcode::Halt),
            other => Err(CommandError::InvalidCommand(other.to_string())),
        }
    }
}

// ── Command ──────────────────────────────────────────────────────

/// An opcode plus an optional one-byte parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    pub opcode: Opcode,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub param: Option<u8>,
}

impl Command {
    pub const fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            param: None,
        }
    }

    pub const fn with_param(opcode: Opcode, param: u8) -> Self {
        Self {
            opcode,
            param: Some(param),
        }
    }

    pub const fn start_stream() -> Self {
        Self::new(Opcode::StartStream)
    }

    pub const fn stop_stream() -> Self {
        Self::new(Opcode::StopStream)
    }

    /// Number of bytes this command occupies on the wire.
    pub const fn wire_len(&self) -> usize {
        match self.param {
            Some(_) => 2,
            None => 1,
        }
    }
}

impl From<Opcode> for Command {
    fn from(opcode: Opcode) -> Self {
        Command::new(opcode)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.param {
            Some(p) => write!(f, "{}({p:#04x})", self.opcode),
            None => write!(f, "{}", self.opcode),
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    /// `"<opcode> [param]"`, e.g. `"advance"` or `"left 30"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let Some(name) = parts.next() else {
            return Err(CommandError::InvalidCommand(s.to_string()));
        };
        let opcode: Opcode = name.parse()?;
        match parts.next() {
            None => Ok(Command::new(opcode)),
            Some(p) => {
                let param = p
                    .parse::<u8>()
                    .map_err(|_| CommandError::InvalidCommand(s.to_string()))?;
                Ok(Command::with_param(opcode, param))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmware_opcode_values() {
        assert_eq!(Opcode::StartStream.as_u8(), 0x01);
        assert_eq!(Opcode::StopStream.as_u8(), 0x08);
        assert_eq!(Opcode::Advance.as_u8(), 0x0A);
        assert_eq!(Opcode::Retreat.as_u8(), 0x0B);
        assert_eq!(Opcode::TurnLeft.as_u8(), 0x0C);
        assert_eq!(Opcode::TurnRight.as_u8(), 0x0D);
    }

    #[test]
    fn try_from_covers_every_opcode() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::try_from(op.as_u8()).unwrap(), op);
        }
        assert!(matches!(
            Opcode::try_from(0x42),
            Err(CommandError::UnknownOpcode(0x42))
        ));
    }

    #[test]
    fn parse_names_and_shortcuts() {
        assert_eq!("w".parse::<Opcode>().unwrap(), Opcode::Advance);
        assert_eq!("Left".parse::<Opcode>().unwrap(), Opcode::TurnLeft);
        assert_eq!("stop-stream".parse::<Opcode>().unwrap(), Opcode::StopStream);
        assert!("jump".parse::<Opcode>().is_err());
    }

    #[test]
    fn parse_command_with_param() {
        let cmd: Command = "right 30".parse().unwrap();
        assert_eq!(cmd, Command::with_param(Opcode::TurnRight, 30));
        assert_eq!(cmd.wire_len(), 2);
        assert_eq!(cmd.to_string(), "right(0x1e)");
        assert!("right 300".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }
}
