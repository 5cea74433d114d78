//! Searching for executables in the shell's path.

use std::path::{Path, PathBuf};

use crate::sys::fs::PathExt;

/// The outcome of resolving a command name against `$PATH`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PathResolution {
    /// An executable file was found at the given path.
    Executable(PathBuf),
    /// A matching file exists but may not be executed.
    NotExecutable(PathBuf),
    /// No matching file was found.
    NotFound,
}

/// Resolves the given command name against the colon-delimited search path.
///
/// # Arguments
///
/// * `name` - The command name to resolve.
/// * `path_value` - The value of `$PATH`.
pub(crate) fn search(name: &str, path_value: &str) -> PathResolution {
    let mut non_executable_match = None;

    for dir in path_value.split(':') {
        let dir = if dir.is_empty() { "." } else { dir };

        let candidate = Path::new(dir).join(name);
        if candidate.is_file() {
            if candidate.executable() {
                return PathResolution::Executable(candidate);
            }

            non_executable_match.get_or_insert(candidate);
        }
    }

    match non_executable_match {
        Some(path) => PathResolution::NotExecutable(path),
        None => PathResolution::NotFound,
    }
}

/// Resolves a command name containing a path separator directly, without
/// consulting `$PATH`.
///
/// # Arguments
///
/// * `name` - The pathful command name.
pub(crate) fn resolve_direct(name: &str) -> PathResolution {
    let candidate = PathBuf::from(name);
    if !candidate.is_file() {
        PathResolution::NotFound
    } else if candidate.executable() {
        PathResolution::Executable(candidate)
    } else {
        PathResolution::NotExecutable(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn finds_executables_in_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let exe_path = dir.path().join("runme");
        std::fs::write(&exe_path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&exe_path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let plain_path = dir.path().join("data");
        std::fs::write(&plain_path, "").unwrap();

        let path_value = dir.path().to_string_lossy().to_string();

        assert_eq!(
            search("runme", &path_value),
            PathResolution::Executable(exe_path)
        );
        assert_eq!(
            search("data", &path_value),
            PathResolution::NotExecutable(plain_path)
        );
        assert_eq!(search("absent", &path_value), PathResolution::NotFound);
    }
}
