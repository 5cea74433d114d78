//! Job management.

use std::fmt::Display;
use std::sync::{Arc, OnceLock};

use futures::FutureExt;

use crate::error;
use crate::interp::ExecutionResult;
use crate::sys;

pub(crate) type JobJoinHandle = tokio::task::JoinHandle<Result<ExecutionResult, error::Error>>;

/// A slot through which a background task reports the process ID of the first
/// external process it spawns; read when `$!` is expanded.
pub(crate) type PidSlot = Arc<OnceLock<sys::process::ProcessId>>;

/// The lifecycle state of a managed job.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobState {
    /// The job is running.
    Running,
    /// The job has finished.
    Done,
    /// The job was terminated by a signal.
    Signaled,
}

impl Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Done => write!(f, "Done"),
            Self::Signaled => write!(f, "Terminated"),
        }
    }
}

/// Manages the jobs that are currently owned by the shell.
#[derive(Default)]
pub struct JobManager {
    /// The jobs that are currently managed by the shell.
    pub jobs: Vec<Job>,
}

impl JobManager {
    /// Returns a new job manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a job to the job manager; returns an immutable reference to it.
    ///
    /// # Arguments
    ///
    /// * `job` - The job to add.
    pub fn add(&mut self, mut job: Job) -> &Job {
        let id = self.jobs.iter().map(|j| j.id).max().unwrap_or(0) + 1;
        job.id = id;
        self.jobs.push(job);
        self.jobs.last().unwrap()
    }

    /// Returns the process ID most recently reported by a background job, for `$!`.
    pub fn last_background_pid(&self) -> Option<sys::process::ProcessId> {
        self.jobs
            .iter()
            .rev()
            .find_map(|job| job.pid_slot.get().copied())
    }

    /// Waits for all managed jobs to complete, returning the completed jobs.
    pub async fn wait_all(&mut self) -> Result<Vec<Job>, error::Error> {
        for job in &mut self.jobs {
            job.wait().await?;
        }

        Ok(self.sweep_completed_jobs())
    }

    /// Polls all managed jobs, returning those that have completed since the
    /// last check.
    pub fn poll(&mut self) -> Vec<Job> {
        let mut i = 0;
        let mut completed = vec![];
        while i != self.jobs.len() {
            if self.jobs[i].poll_done() {
                completed.push(self.jobs.remove(i));
            } else {
                i += 1;
            }
        }

        completed
    }

    fn sweep_completed_jobs(&mut self) -> Vec<Job> {
        let mut completed = vec![];

        let mut i = 0;
        while i != self.jobs.len() {
            if !matches!(self.jobs[i].state, JobState::Running) {
                completed.push(self.jobs.remove(i));
            } else {
                i += 1;
            }
        }

        completed
    }
}

/// A background job.
pub struct Job {
    /// The job's ID, assigned by the job manager.
    pub id: usize,
    /// The command the job is running, for display purposes.
    pub command: String,
    /// The current state of the job.
    pub state: JobState,
    /// The exit status of the job, once it has completed.
    pub last_status: Option<u8>,
    /// Handle for the task executing the job.
    join_handle: Option<JobJoinHandle>,
    /// Slot reporting the first external process ID spawned by the job.
    pub(crate) pid_slot: PidSlot,
}

impl Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]   {}    {}", self.id, self.state, self.command)
    }
}

impl Job {
    /// Returns a new running job.
    ///
    /// # Arguments
    ///
    /// * `join_handle` - Handle for the task executing the job.
    /// * `pid_slot` - Slot the task reports its first spawned process ID through.
    /// * `command` - The command the job runs.
    pub(crate) fn new(join_handle: JobJoinHandle, pid_slot: PidSlot, command: String) -> Self {
        Self {
            id: 0,
            command,
            state: JobState::Running,
            last_status: None,
            join_handle: Some(join_handle),
            pid_slot,
        }
    }

    /// Renders the job in the `[id] pid` style used when launching a
    /// background job in an interactive shell.
    pub fn to_pid_style_string(&self) -> String {
        let pid_str = self
            .pid_slot
            .get()
            .map_or_else(String::new, |pid| pid.to_string());
        std::format!("[{}] {}", self.id, pid_str)
    }

    /// Waits for the job to complete, recording its final state.
    pub async fn wait(&mut self) -> Result<(), error::Error> {
        if let Some(join_handle) = self.join_handle.take() {
            let result = join_handle.await??;
            self.last_status = Some(result.exit_code);
            self.state = if result.exit_code > 128 {
                JobState::Signaled
            } else {
                JobState::Done
            };
        }

        Ok(())
    }

    fn poll_done(&mut self) -> bool {
        if let Some(join_handle) = &mut self.join_handle {
            if let Some(result) = join_handle.now_or_never() {
                self.join_handle = None;
                if let Ok(Ok(execution_result)) = result {
                    self.last_status = Some(execution_result.exit_code);
                    self.state = if execution_result.exit_code > 128 {
                        JobState::Signaled
                    } else {
                        JobState::Done
                    };
                } else {
                    self.last_status = Some(1);
                    self.state = JobState::Done;
                }
                return true;
            }
        } else {
            return true;
        }

        false
    }
}
