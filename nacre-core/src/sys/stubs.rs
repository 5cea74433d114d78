pub(crate) mod fs;
pub(crate) mod signal;
pub(crate) mod users;

pub(crate) use crate::sys::os_pipe as pipes;
pub(crate) use crate::sys::tokio_process as process;
