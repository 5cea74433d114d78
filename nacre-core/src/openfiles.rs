//! Managing files open within a shell instance.

use std::collections::HashMap;
#[cfg(unix)]
use std::os::fd::AsFd;
use std::process::Stdio;

use crate::error;
use crate::sys;

/// Represents a file open in a shell context.
pub enum OpenFile {
    /// The original standard input this process was started with.
    Stdin(std::io::Stdin),
    /// The original standard output this process was started with.
    Stdout(std::io::Stdout),
    /// The original standard error this process was started with.
    Stderr(std::io::Stderr),
    /// A file open for reading or writing.
    File(std::fs::File),
    /// A read end of a pipe.
    PipeReader(OpenPipeReader),
    /// A write end of a pipe.
    PipeWriter(OpenPipeWriter),
}

/// Returns an open file that will discard all I/O.
pub fn null() -> Result<OpenFile, error::Error> {
    let file = sys::fs::open_null_file()?;
    Ok(OpenFile::File(file))
}

impl Clone for OpenFile {
    fn clone(&self) -> Self {
        self.try_dup().unwrap()
    }
}

impl OpenFile {
    /// Tries to duplicate the open file.
    pub fn try_dup(&self) -> Result<Self, error::Error> {
        let result = match self {
            Self::Stdin(_) => Self::Stdin(std::io::stdin()),
            Self::Stdout(_) => Self::Stdout(std::io::stdout()),
            Self::Stderr(_) => Self::Stderr(std::io::stderr()),
            Self::File(f) => Self::File(f.try_clone()?),
            Self::PipeReader(f) => Self::PipeReader(f.0.try_clone()?.into()),
            Self::PipeWriter(f) => Self::PipeWriter(f.0.try_clone()?.into()),
        };

        Ok(result)
    }

    /// Converts the open file into an `OwnedFd`.
    #[cfg(unix)]
    pub(crate) fn into_owned_fd(self) -> Result<std::os::fd::OwnedFd, error::Error> {
        match self {
            Self::Stdin(f) => Ok(f.as_fd().try_clone_to_owned()?),
            Self::Stdout(f) => Ok(f.as_fd().try_clone_to_owned()?),
            Self::Stderr(f) => Ok(f.as_fd().try_clone_to_owned()?),
            Self::File(f) => Ok(f.into()),
            Self::PipeReader(r) => Ok(std::os::fd::OwnedFd::from(r.0)),
            Self::PipeWriter(w) => Ok(std::os::fd::OwnedFd::from(w.0)),
        }
    }
}

impl From<std::fs::File> for OpenFile {
    fn from(file: std::fs::File) -> Self {
        Self::File(file)
    }
}

impl From<OpenFile> for Stdio {
    fn from(open_file: OpenFile) -> Self {
        match open_file {
            OpenFile::Stdin(_) => Self::inherit(),
            OpenFile::Stdout(_) => Self::inherit(),
            OpenFile::Stderr(_) => Self::inherit(),
            OpenFile::File(f) => f.into(),
            OpenFile::PipeReader(f) => f.0.into(),
            OpenFile::PipeWriter(f) => f.0.into(),
        }
    }
}

impl std::io::Read for OpenFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Stdin(f) => f.read(buf),
            Self::Stdout(_) => Err(std::io::Error::other(error::Error::OpenFileNotReadable(
                "stdout",
            ))),
            Self::Stderr(_) => Err(std::io::Error::other(error::Error::OpenFileNotReadable(
                "stderr",
            ))),
            Self::File(f) => f.read(buf),
            Self::PipeReader(reader) => reader.0.read(buf),
            Self::PipeWriter(_) => Err(std::io::Error::other(error::Error::OpenFileNotReadable(
                "pipe writer",
            ))),
        }
    }
}

impl std::io::Write for OpenFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Stdin(_) => Err(std::io::Error::other(error::Error::OpenFileNotWritable(
                "stdin",
            ))),
            Self::Stdout(f) => f.write(buf),
            Self::Stderr(f) => f.write(buf),
            Self::File(f) => f.write(buf),
            Self::PipeReader(_) => Err(std::io::Error::other(error::Error::OpenFileNotWritable(
                "pipe reader",
            ))),
            Self::PipeWriter(writer) => writer.0.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdin(_) => Ok(()),
            Self::Stdout(f) => f.flush(),
            Self::Stderr(f) => f.flush(),
            Self::File(f) => f.flush(),
            Self::PipeReader(_) => Ok(()),
            Self::PipeWriter(writer) => writer.0.flush(),
        }
    }
}

/// Represents the open files in a shell context. Redirections applied for a
/// single command mutate a command-scoped clone of this table; dropping the
/// clone is what restores the prior state.
#[derive(Clone)]
pub struct OpenFiles {
    /// Maps shell file descriptors to open files.
    files: HashMap<u32, OpenFile>,
}

impl Default for OpenFiles {
    fn default() -> Self {
        Self {
            files: HashMap::from([
                (Self::STDIN_FD, OpenFile::Stdin(std::io::stdin())),
                (Self::STDOUT_FD, OpenFile::Stdout(std::io::stdout())),
                (Self::STDERR_FD, OpenFile::Stderr(std::io::stderr())),
            ]),
        }
    }
}

impl OpenFiles {
    /// File descriptor used for standard input.
    pub const STDIN_FD: u32 = 0;
    /// File descriptor used for standard output.
    pub const STDOUT_FD: u32 = 1;
    /// File descriptor used for standard error.
    pub const STDERR_FD: u32 = 2;

    /// Returns a new default table of open files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves the file backing standard input in this context.
    pub fn stdin(&self) -> Option<&OpenFile> {
        self.files.get(&Self::STDIN_FD)
    }

    /// Retrieves the file backing standard output in this context.
    pub fn stdout(&self) -> Option<&OpenFile> {
        self.files.get(&Self::STDOUT_FD)
    }

    /// Retrieves the file backing standard error in this context.
    pub fn stderr(&self) -> Option<&OpenFile> {
        self.files.get(&Self::STDERR_FD)
    }

    /// Tries to remove an open file by its file descriptor, returning the
    /// removed file if the descriptor was in use.
    ///
    /// # Arguments
    ///
    /// * `fd`: The file descriptor to remove.
    pub fn remove(&mut self, fd: u32) -> Option<OpenFile> {
        self.files.remove(&fd)
    }

    /// Tries to look up the `OpenFile` associated with the given file descriptor.
    ///
    /// # Arguments
    ///
    /// * `fd`: The file descriptor to look up.
    pub fn get(&self, fd: u32) -> Option<&OpenFile> {
        self.files.get(&fd)
    }

    /// Checks if the given file descriptor is in use.
    pub fn contains(&self, fd: u32) -> bool {
        self.files.contains_key(&fd)
    }

    /// Associates the given file descriptor with the provided file, returning
    /// the previously associated file (if any).
    ///
    /// # Arguments
    ///
    /// * `fd`: The file descriptor to associate with the file.
    /// * `file`: The file to associate with the file descriptor.
    pub fn set(&mut self, fd: u32, file: OpenFile) -> Option<OpenFile> {
        self.files.insert(fd, file)
    }

    /// Iterates over the (fd, file) pairs in the table.
    pub fn iter(&self) -> impl Iterator<Item = (&u32, &OpenFile)> {
        self.files.iter()
    }
}

impl IntoIterator for OpenFiles {
    type Item = (u32, OpenFile);
    type IntoIter = <HashMap<u32, OpenFile> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

/// Creates a new pipe, returning its reader and writer ends.
pub fn pipe() -> Result<(OpenPipeReader, OpenPipeWriter), error::Error> {
    let (reader, writer) = sys::pipes::pipe()?;
    Ok((OpenPipeReader(reader), OpenPipeWriter(writer)))
}

/// An opaque wrapper around a pipe reader implementation.
pub struct OpenPipeReader(pub(crate) sys::pipes::PipeReader);

impl From<sys::pipes::PipeReader> for OpenPipeReader {
    fn from(reader: sys::pipes::PipeReader) -> Self {
        Self(reader)
    }
}

impl From<OpenPipeReader> for OpenFile {
    fn from(value: OpenPipeReader) -> Self {
        Self::PipeReader(value)
    }
}

/// An opaque wrapper around a pipe writer implementation.
pub struct OpenPipeWriter(pub(crate) sys::pipes::PipeWriter);

impl From<sys::pipes::PipeWriter> for OpenPipeWriter {
    fn from(writer: sys::pipes::PipeWriter) -> Self {
        Self(writer)
    }
}

impl From<OpenPipeWriter> for OpenFile {
    fn from(value: OpenPipeWriter) -> Self {
        Self::PipeWriter(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn default_table_covers_stdio() {
        let files = OpenFiles::default();
        assert!(files.contains(OpenFiles::STDIN_FD));
        assert!(files.contains(OpenFiles::STDOUT_FD));
        assert!(files.contains(OpenFiles::STDERR_FD));
        assert!(!files.contains(3));
    }

    #[test]
    fn cloned_table_is_independent() {
        let mut original = OpenFiles::default();
        let mut cloned = original.clone();

        cloned.remove(OpenFiles::STDOUT_FD);
        assert!(original.contains(OpenFiles::STDOUT_FD));

        let (reader, _writer) = pipe().unwrap();
        cloned.set(7, reader.into());
        assert!(!original.contains(7));
        assert!(cloned.contains(7));

        original.remove(OpenFiles::STDIN_FD);
        assert!(cloned.contains(OpenFiles::STDIN_FD));
    }

    #[test]
    fn pipe_round_trips_data() {
        let (reader, writer) = pipe().unwrap();
        let mut writer: OpenFile = writer.into();
        let mut reader: OpenFile = reader.into();

        writer.write_all(b"ping").unwrap();
        drop(writer);

        let mut contents = String::new();
        reader.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "ping");
    }
}
