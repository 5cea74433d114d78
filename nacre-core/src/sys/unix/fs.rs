//! Filesystem utilities.

use std::path::Path;

use crate::error;

/// Extension trait for POSIX-style path access checks.
pub(crate) trait PathExt {
    /// Checks if the path is executable by the current user.
    fn executable(&self) -> bool;
}

impl PathExt for Path {
    fn executable(&self) -> bool {
        nix::unistd::access(self, nix::unistd::AccessFlags::X_OK).is_ok()
    }
}

pub(crate) fn open_null_file() -> Result<std::fs::File, error::Error> {
    let null_file = std::fs::File::options()
        .read(true)
        .write(true)
        .open("/dev/null")?;

    Ok(null_file)
}

pub(crate) fn get_default_executable_search_paths() -> Vec<String> {
    ["/usr/local/sbin", "/usr/local/bin", "/usr/sbin", "/usr/bin", "/sbin", "/bin"]
        .iter()
        .map(|s| (*s).to_owned())
        .collect()
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn set_umask(mask: u32) -> Result<u32, error::Error> {
    let mode = nix::sys::stat::Mode::from_bits_truncate(mask as nix::libc::mode_t);
    let prior = nix::sys::stat::umask(mode);
    Ok(u32::from(prior.bits()))
}

pub(crate) fn get_umask() -> Result<u32, error::Error> {
    // There's no way to query the umask without mutating it.
    let current = nix::sys::stat::umask(nix::sys::stat::Mode::empty());
    nix::sys::stat::umask(current);
    Ok(u32::from(current.bits()))
}
