//! User database lookups.

use std::path::PathBuf;

pub(crate) fn get_user_home_dir(username: &str) -> Option<PathBuf> {
    if let Ok(Some(user_info)) = nix::unistd::User::from_name(username) {
        return Some(user_info.dir);
    }

    None
}

pub(crate) fn get_current_user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    if let Ok(Some(user_info)) = nix::unistd::User::from_uid(nix::unistd::getuid()) {
        return Some(user_info.dir);
    }

    None
}

pub(crate) fn get_process_id() -> i32 {
    nix::unistd::getpid().as_raw()
}

pub(crate) fn get_parent_process_id() -> i32 {
    nix::unistd::getppid().as_raw()
}
