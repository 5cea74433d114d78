//! Anonymous pipe support, shared across platforms that provide it.

use crate::error;

pub(crate) use os_pipe::{PipeReader, PipeWriter};

pub(crate) fn pipe() -> Result<(PipeReader, PipeWriter), error::Error> {
    let (reader, writer) = os_pipe::pipe()?;
    Ok((reader, writer))
}
