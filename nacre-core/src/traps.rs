//! Facilities for configuring trap handlers.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::{error, sys};

/// Type of signal that can be trapped in the shell.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub enum TrapSignal {
    /// A system signal.
    Signal(sys::signal::Signal),
    /// The `EXIT` trap (signal 0).
    Exit,
}

impl Display for TrapSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signal(s) => write!(f, "{s}"),
            Self::Exit => write!(f, "EXIT"),
        }
    }
}

impl FromStr for TrapSignal {
    type Err = error::Error;
    fn from_str(s: &str) -> Result<Self, <Self as FromStr>::Err> {
        if let Ok(n) = s.parse::<i32>() {
            Self::try_from(n)
        } else {
            Self::try_from(s)
        }
    }
}

impl TryFrom<i32> for TrapSignal {
    type Error = error::Error;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Exit,
            value => Self::Signal(sys::signal::parse_signal_number(value)?),
        })
    }
}

impl TryFrom<&str> for TrapSignal {
    type Error = error::Error;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Ok(match value.to_ascii_uppercase().as_str() {
            "EXIT" => Self::Exit,
            _ => Self::Signal(sys::signal::parse_signal_name(value)?),
        })
    }
}

impl TrapSignal {
    /// Returns the signal number associated with this trap signal.
    pub fn number(self) -> i32 {
        match self {
            Self::Signal(s) => sys::signal::signal_number(s),
            Self::Exit => 0,
        }
    }
}

/// Configuration for trap handlers in the shell.
#[derive(Clone, Default)]
pub struct TrapHandlerConfig {
    /// Registered handlers for traps; maps signal type to command.
    pub(crate) handlers: HashMap<TrapSignal, String>,
    /// Current depth of the handler stack.
    pub(crate) handler_depth: i32,
}

impl TrapHandlerConfig {
    /// Iterates over the registered handlers for trap signals.
    pub fn iter_handlers(&self) -> impl Iterator<Item = (TrapSignal, &str)> {
        self.handlers
            .iter()
            .map(|(signal, cmd)| (*signal, cmd.as_str()))
    }

    /// Tries to find the handler associated with the given signal.
    ///
    /// # Arguments
    ///
    /// * `signal_type` - The type of signal to get the handler for.
    pub fn get_handler(&self, signal_type: TrapSignal) -> Option<&str> {
        self.handlers.get(&signal_type).map(|s| s.as_str())
    }

    /// Registers a handler for a trap signal.
    ///
    /// # Arguments
    ///
    /// * `signal_type` - The type of signal to register a handler for.
    /// * `command` - The command to execute when the signal is trapped.
    pub fn register_handler(&mut self, signal_type: TrapSignal, command: String) {
        let _ = self.handlers.insert(signal_type, command);
    }

    /// Removes handlers for a trap signal.
    ///
    /// # Arguments
    ///
    /// * `signal_type` - The type of signal to remove handlers for.
    pub fn remove_handlers(&mut self, signal_type: TrapSignal) {
        self.handlers.remove(&signal_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn parses_signal_specs() {
        assert!(matches!("EXIT".parse::<TrapSignal>(), Ok(TrapSignal::Exit)));
        assert!(matches!("0".parse::<TrapSignal>(), Ok(TrapSignal::Exit)));
        assert!(matches!(
            "INT".parse::<TrapSignal>(),
            Ok(TrapSignal::Signal(sys::signal::Signal::SIGINT))
        ));
        assert!(matches!(
            "SIGTERM".parse::<TrapSignal>(),
            Ok(TrapSignal::Signal(sys::signal::Signal::SIGTERM))
        ));
        assert!("NOSUCHSIG".parse::<TrapSignal>().is_err());
    }

    #[test]
    fn handler_registration_round_trips() {
        let mut config = TrapHandlerConfig::default();
        config.register_handler(TrapSignal::Exit, "echo bye".into());
        assert_eq!(config.get_handler(TrapSignal::Exit), Some("echo bye"));

        config.remove_handlers(TrapSignal::Exit);
        assert_eq!(config.get_handler(TrapSignal::Exit), None);
    }
}
