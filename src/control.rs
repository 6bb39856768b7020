//! Control commands typed on a line of text, e.g. `postpone 5 minutes`.

use std::fmt;
use std::str::FromStr;

use crate::deferred::Payload;
use crate::error::CommandError;
use crate::timeout::Timeout;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Control {
    Pause,
    Play,
    Stop,
    Reset,
    Trigger,
    Clear,
    Complete,
    Postpone(String),
    Advance(String),
    Times(u32),
    /// Report the handle's state without changing it.
    Status,
}

impl FromStr for Control {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let argument = |name: &'static str| {
            if rest.is_empty() {
                Err(CommandError::MissingArgument(name))
            } else {
                Ok(rest.to_string())
            }
        };

        match word.to_lowercase().as_str() {
            "pause" => Ok(Control::Pause),
            "play" | "resume" => Ok(Control::Play),
            "stop" => Ok(Control::Stop),
            "reset" => Ok(Control::Reset),
            "trigger" | "fire" => Ok(Control::Trigger),
            "clear" | "cancel" => Ok(Control::Clear),
            "complete" => Ok(Control::Complete),
            "postpone" => argument("postpone").map(Control::Postpone),
            "advance" => argument("advance").map(Control::Advance),
            "times" => {
                let count = argument("times")?;
                count
                    .parse()
                    .map(Control::Times)
                    .map_err(|_| CommandError::InvalidCount(count))
            }
            "status" => Ok(Control::Status),
            _ => Err(CommandError::Unknown(line.to_string())),
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Pause => write!(f, "pause"),
            Control::Play => write!(f, "play"),
            Control::Stop => write!(f, "stop"),
            Control::Reset => write!(f, "reset"),
            Control::Trigger => write!(f, "trigger"),
            Control::Clear => write!(f, "clear"),
            Control::Complete => write!(f, "complete"),
            Control::Postpone(time) => write!(f, "postpone {time}"),
            Control::Advance(time) => write!(f, "advance {time}"),
            Control::Times(n) => write!(f, "times {n}"),
            Control::Status => write!(f, "status"),
        }
    }
}

impl Control {
    /// Apply this command to `timeout`. `Status` leaves it untouched.
    pub fn apply<A: Payload>(&self, timeout: &Timeout<A>) {
        match self {
            Control::Pause => {
                timeout.pause();
            }
            Control::Play => {
                timeout.play();
            }
            Control::Stop => {
                timeout.stop();
            }
            Control::Reset => {
                timeout.reset();
            }
            Control::Trigger => {
                timeout.trigger();
            }
            Control::Clear => {
                timeout.clear();
            }
            Control::Complete => {
                timeout.complete();
            }
            Control::Postpone(time) => {
                timeout.postpone(time.as_str());
            }
            Control::Advance(time) => {
                timeout.advance(time.as_str());
            }
            Control::Times(n) => {
                timeout.times(*n);
            }
            Control::Status => {}
        }
    }
}
