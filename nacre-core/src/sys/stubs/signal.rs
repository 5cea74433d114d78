//! Signal stubs for platforms without POSIX signals.

use crate::error;

/// Minimal stand-in for POSIX signals on platforms that lack them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub(crate) enum Signal {
    SIGINT,
    SIGTERM,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SIGINT => write!(f, "SIGINT"),
            Self::SIGTERM => write!(f, "SIGTERM"),
        }
    }
}

impl Signal {
    pub(crate) const fn as_i32(self) -> i32 {
        match self {
            Self::SIGINT => 2,
            Self::SIGTERM => 15,
        }
    }
}

pub(crate) fn install_trap_handler(_signal: Signal) -> Result<(), error::Error> {
    Err(error::Error::NotSupportedOnThisPlatform("signal traps"))
}

pub(crate) fn uninstall_trap_handler(_signal: Signal) -> Result<(), error::Error> {
    Ok(())
}

pub(crate) fn restore_all_dispositions() -> Result<(), error::Error> {
    Ok(())
}

pub(crate) fn take_pending_signals() -> Vec<i32> {
    vec![]
}

pub(crate) const fn signal_number(signal: Signal) -> i32 {
    signal.as_i32()
}

pub(crate) fn parse_signal_name(name: &str) -> Result<Signal, error::Error> {
    match name.to_ascii_uppercase().as_str() {
        "INT" | "SIGINT" => Ok(Signal::SIGINT),
        "TERM" | "SIGTERM" => Ok(Signal::SIGTERM),
        _ => Err(error::Error::InvalidSignal(name.into())),
    }
}

pub(crate) fn parse_signal_number(number: i32) -> Result<Signal, error::Error> {
    match number {
        2 => Ok(Signal::SIGINT),
        15 => Ok(Signal::SIGTERM),
        _ => Err(error::Error::InvalidSignal(number.to_string())),
    }
}

pub(crate) use tokio::signal::ctrl_c as await_ctrl_c;
