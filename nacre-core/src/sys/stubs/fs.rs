//! Filesystem stubs for platforms without POSIX access checks.

use std::path::Path;

use crate::error;

pub(crate) trait PathExt {
    fn executable(&self) -> bool;
}

impl PathExt for Path {
    fn executable(&self) -> bool {
        true
    }
}

pub(crate) fn open_null_file() -> Result<std::fs::File, error::Error> {
    error::unimp("null file not supported on this platform")
}

pub(crate) fn get_default_executable_search_paths() -> Vec<String> {
    vec![]
}

pub(crate) fn set_umask(_mask: u32) -> Result<u32, error::Error> {
    Err(error::Error::NotSupportedOnThisPlatform("umask"))
}

pub(crate) fn get_umask() -> Result<u32, error::Error> {
    Err(error::Error::NotSupportedOnThisPlatform("umask"))
}
