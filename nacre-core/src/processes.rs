//! Process management.

use crate::{error, sys};

/// A waitable future that will yield the results of a child process's execution.
pub(crate) type WaitableChildProcess = std::pin::Pin<
    Box<dyn futures::Future<Output = Result<std::process::Output, std::io::Error>> + Send + Sync>,
>;

/// Tracks a child process being awaited.
pub struct ChildProcess {
    /// If available, the process ID of the child.
    pid: Option<sys::process::ProcessId>,
    /// A waitable future that will yield the results of a child process's execution.
    exec_future: WaitableChildProcess,
}

impl ChildProcess {
    /// Wraps a child process and its future.
    pub(crate) fn new(pid: Option<sys::process::ProcessId>, child: sys::process::Child) -> Self {
        Self {
            pid,
            exec_future: Box::pin(child.wait_with_output()),
        }
    }

    /// Returns the process's ID.
    pub const fn pid(&self) -> Option<sys::process::ProcessId> {
        self.pid
    }

    /// Waits for the process to exit. A SIGINT delivered while we're waiting
    /// goes to the child as well; we keep waiting until the child finishes
    /// with it one way or the other.
    pub async fn wait(&mut self) -> Result<std::process::Output, error::Error> {
        loop {
            tokio::select! {
                output = &mut self.exec_future => {
                    break Ok(output?)
                },
                _ = sys::signal::await_ctrl_c() => {
                    // The child received it too; either it handles it or it
                    // terminates and we observe the exit.
                },
            }
        }
    }

}
