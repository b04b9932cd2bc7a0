//! Stdin console → link command conversion.
//!
//! One line per action. Single keys follow the usual WASD layout, and
//! full opcode names are accepted along with an optional parameter byte.

use telecam_core::{Command, CommandError};

/// What a console line asks the station to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    /// Deposit a command in the link mailbox.
    Send(Command),
    /// Print the latest stream stats.
    Stats,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  w / advance        drive forward
  s / retreat        drive backward
  a / left [n]       turn left
  d / right [n]      turn right
  x / halt           stop moving
  start | stop       start or stop the stream
  r / restart        restart the camera pipeline
  stats              print stream statistics
  q / quit           stop the stream and exit";

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleAction>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let action = match line.to_ascii_lowercase().as_str() {
        "q" | "quit" | "exit" => ConsoleAction::Quit,
        "?" | "h" | "help" => ConsoleAction::Help,
        "stats" => ConsoleAction::Stats,
        _ => ConsoleAction::Send(line.parse()?),
    };
    Ok(Some(action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use telecam_core::Opcode;

    #[test]
    fn wasd_keys_map_to_motion() {
        let expect = [
            ("w", Opcode::Advance),
            ("a", Opcode::TurnLeft),
            ("s", Opcode::Retreat),
            ("d", Opcode::TurnRight),
            ("x", Opcode::Halt),
        ];
        for (key, op) in expect {
            assert_eq!(
                parse_line(key).unwrap(),
                Some(ConsoleAction::Send(Command::new(op))),
                "key {key}"
            );
        }
    }

    #[test]
    fn names_params_and_meta_commands() {
        assert_eq!(
            parse_line("  left 15 \n").unwrap(),
            Some(ConsoleAction::Send(Command::with_param(Opcode::TurnLeft, 15)))
        );
        assert_eq!(
            parse_line("STOP").unwrap(),
            Some(ConsoleAction::Send(Command::stop_stream()))
        );
        assert_eq!(parse_line("q").unwrap(), Some(ConsoleAction::Quit));
        assert_eq!(parse_line("stats").unwrap(), Some(ConsoleAction::Stats));
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn unknown_words_are_errors() {
        assert!(matches!(
            parse_line("jump"),
            Err(CommandError::InvalidCommand(_))
        ));
    }
}
