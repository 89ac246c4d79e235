//! Input-channel text protocol.
//!
//! The viewer sends one text message per pointer event:
//!
//! ```text
//! <command>:<x>,<y>
//! ```
//!
//! where `command` is one of `down`, `move`, `up`, `click` and `x`/`y` are
//! signed decimal integers in viewer-space pixels.  Surrounding whitespace is
//! ignored.
//!
//! `up` carries no meaningful position (the release happens wherever the OS
//! cursor actually is), so the pair is optional for it: `up`, `up:` and
//! `up:0,0` are all accepted.  When a pair is present it must still be well
//! formed.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::domain::geometry::Point;

/// Why an input-channel message could not be parsed.
///
/// Always recoverable: the offending message is dropped and the connection
/// continues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedInput {
    #[error("empty message")]
    Empty,

    #[error("missing ':' separator in {0:?}")]
    MissingSeparator(String),

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    /// The coordinate part did not split into exactly two fields.
    #[error("expected 2 coordinates, found {0}")]
    WrongFieldCount(usize),

    #[error("coordinate {0:?} is not an integer")]
    InvalidCoordinate(String),
}

/// The four commands understood on the input channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputCommand {
    Down,
    Move,
    Up,
    Click,
}

impl InputCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            InputCommand::Down => "down",
            InputCommand::Move => "move",
            InputCommand::Up => "up",
            InputCommand::Click => "click",
        }
    }
}

impl FromStr for InputCommand {
    type Err = MalformedInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "down" => Ok(InputCommand::Down),
            "move" => Ok(InputCommand::Move),
            "up" => Ok(InputCommand::Up),
            "click" => Ok(InputCommand::Click),
            other => Err(MalformedInput::UnknownCommand(other.to_string())),
        }
    }
}

/// One decoded input-channel event, positions in viewer space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Down(Point),
    Move(Point),
    Up,
    Click(Point),
}

impl InputEvent {
    pub fn command(&self) -> InputCommand {
        match self {
            InputEvent::Down(_) => InputCommand::Down,
            InputEvent::Move(_) => InputCommand::Move,
            InputEvent::Up => InputCommand::Up,
            InputEvent::Click(_) => InputCommand::Click,
        }
    }

    /// The viewer-space position, if the command carries one.
    pub fn position(&self) -> Option<Point> {
        match *self {
            InputEvent::Down(p) | InputEvent::Move(p) | InputEvent::Click(p) => Some(p),
            InputEvent::Up => None,
        }
    }
}

impl FromStr for InputEvent {
    type Err = MalformedInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MalformedInput::Empty);
        }

        let (command, coords) = match s.split_once(':') {
            Some((command, coords)) => (command.parse::<InputCommand>()?, Some(coords)),
            // A bare "up" is the only command allowed without a pair.
            None if s == "up" => (InputCommand::Up, None),
            None => return Err(MalformedInput::MissingSeparator(s.to_string())),
        };

        if command == InputCommand::Up {
            match coords {
                Some(c) if !c.trim().is_empty() => {
                    parse_pair(c)?;
                }
                _ => {}
            }
            return Ok(InputEvent::Up);
        }

        let point = parse_pair(coords.unwrap_or_default())?;
        Ok(match command {
            InputCommand::Down => InputEvent::Down(point),
            InputCommand::Move => InputEvent::Move(point),
            InputCommand::Click => InputEvent::Click(point),
            InputCommand::Up => InputEvent::Up,
        })
    }
}

impl fmt::Display for InputEvent {
    /// Formats in wire form; `up` is written as `up:0,0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.position().unwrap_or_default();
        write!(f, "{}:{},{}", self.command().as_str(), p.x, p.y)
    }
}

fn parse_pair(coords: &str) -> Result<Point, MalformedInput> {
    let fields: Vec<&str> = coords.split(',').collect();
    if fields.len() != 2 {
        return Err(MalformedInput::WrongFieldCount(fields.len()));
    }
    let x = parse_coordinate(fields[0])?;
    let y = parse_coordinate(fields[1])?;
    Ok(Point::new(x, y))
}

fn parse_coordinate(field: &str) -> Result<i32, MalformedInput> {
    field
        .trim()
        .parse::<i32>()
        .map_err(|_| MalformedInput::InvalidCoordinate(field.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
