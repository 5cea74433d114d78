//! Signal processing utilities.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error;

pub(crate) use nix::sys::signal::Signal;

/// Largest signal number we track pending delivery for.
const MAX_TRACKED_SIGNAL: usize = 64;

/// Process-wide array of pending-trap flags, indexed by signal number. This is
/// the only state a signal handler touches; everything else happens at safe
/// points in the interpreter loop.
static PENDING_SIGNALS: [AtomicBool; MAX_TRACKED_SIGNAL] =
    [const { AtomicBool::new(false) }; MAX_TRACKED_SIGNAL];

/// Dispositions saved when trap handlers were installed, keyed by signal
/// number. Only written from normal (non-handler) context.
static SAVED_DISPOSITIONS: Mutex<Option<HashMap<i32, nix::sys::signal::SigAction>>> =
    Mutex::new(None);

extern "C" fn note_signal(signo: std::os::raw::c_int) {
    if let Ok(index) = usize::try_from(signo) {
        if index < MAX_TRACKED_SIGNAL {
            PENDING_SIGNALS[index].store(true, Ordering::SeqCst);
        }
    }
}

/// Installs a flag-setting handler for the given signal, saving the prior
/// disposition the first time the signal is trapped.
pub(crate) fn install_trap_handler(signal: Signal) -> Result<(), error::Error> {
    if matches!(signal, Signal::SIGKILL | Signal::SIGSTOP) {
        return Err(error::Error::UntrappableSignal(signal.to_string()));
    }

    let action = nix::sys::signal::SigAction::new(
        nix::sys::signal::SigHandler::Handler(note_signal),
        nix::sys::signal::SaFlags::SA_RESTART,
        nix::sys::signal::SigSet::empty(),
    );

    // SAFETY: the handler only stores to an atomic flag, which is
    // async-signal-safe.
    let saved = unsafe { nix::sys::signal::sigaction(signal, &action) }?;

    let mut dispositions = SAVED_DISPOSITIONS.lock().unwrap();
    dispositions
        .get_or_insert_with(HashMap::new)
        .entry(signal as i32)
        .or_insert(saved);

    Ok(())
}

/// Restores the disposition the given signal had before a trap was installed.
pub(crate) fn uninstall_trap_handler(signal: Signal) -> Result<(), error::Error> {
    let mut dispositions = SAVED_DISPOSITIONS.lock().unwrap();
    if let Some(saved) = dispositions
        .as_mut()
        .and_then(|map| map.remove(&(signal as i32)))
    {
        // SAFETY: restoring a previously retrieved disposition.
        unsafe { nix::sys::signal::sigaction(signal, &saved) }?;
    }

    if let Ok(index) = usize::try_from(signal as i32) {
        if index < MAX_TRACKED_SIGNAL {
            PENDING_SIGNALS[index].store(false, Ordering::SeqCst);
        }
    }

    Ok(())
}

/// Restores all saved signal dispositions; used at shell exit.
pub(crate) fn restore_all_dispositions() -> Result<(), error::Error> {
    let saved: Vec<(i32, nix::sys::signal::SigAction)> = {
        let mut dispositions = SAVED_DISPOSITIONS.lock().unwrap();
        dispositions
            .take()
            .map(|map| map.into_iter().collect())
            .unwrap_or_default()
    };

    for (signo, action) in saved {
        if let Ok(signal) = Signal::try_from(signo) {
            // SAFETY: restoring a previously retrieved disposition.
            unsafe { nix::sys::signal::sigaction(signal, &action) }?;
        }
    }

    Ok(())
}

/// Drains and returns the numbers of all signals that have been delivered
/// since the last scan.
pub(crate) fn take_pending_signals() -> Vec<i32> {
    let mut pending = vec![];
    for (index, flag) in PENDING_SIGNALS.iter().enumerate() {
        if flag.swap(false, Ordering::SeqCst) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            pending.push(index as i32);
        }
    }
    pending
}

pub(crate) const fn signal_number(signal: Signal) -> i32 {
    signal as i32
}

pub(crate) fn parse_signal_name(name: &str) -> Result<Signal, error::Error> {
    let mut s = name.to_ascii_uppercase();

    // Support signal names without the SIG prefix, e.g. HUP -> SIGHUP.
    if !s.starts_with("SIG") {
        s.insert_str(0, "SIG");
    }

    Signal::from_str(s.as_str()).map_err(|_| error::Error::InvalidSignal(name.into()))
}

pub(crate) fn parse_signal_number(number: i32) -> Result<Signal, error::Error> {
    Signal::try_from(number).map_err(|_| error::Error::InvalidSignal(number.to_string()))
}

pub(crate) use tokio::signal::ctrl_c as await_ctrl_c;
