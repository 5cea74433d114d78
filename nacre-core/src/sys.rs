//! Platform abstraction layer; facilities here dispatch to a per-platform
//! implementation or fail with a "not supported" error.

#[cfg(unix)]
pub(crate) mod unix;
#[cfg(unix)]
pub(crate) use unix as platform;

#[cfg(not(unix))]
pub(crate) mod stubs;
#[cfg(not(unix))]
pub(crate) use stubs as platform;

#[cfg(any(unix, windows))]
pub(crate) mod os_pipe;
#[cfg(any(unix, windows))]
pub(crate) mod tokio_process;

pub(crate) use platform::fs;
pub(crate) use platform::pipes;
pub(crate) use platform::process;
pub(crate) use platform::signal;
pub(crate) use platform::users;
