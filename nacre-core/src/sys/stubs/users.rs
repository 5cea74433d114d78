//! User database stubs.

use std::path::PathBuf;

pub(crate) fn get_user_home_dir(_username: &str) -> Option<PathBuf> {
    None
}

pub(crate) fn get_current_user_home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

pub(crate) fn get_process_id() -> i32 {
    std::process::id().try_into().unwrap_or(i32::MAX)
}

pub(crate) fn get_parent_process_id() -> i32 {
    0
}
