use std::io::Write;

use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::{commands, error};

/// Waits for background jobs to complete.
#[derive(Parser)]
pub(crate) struct WaitCommand {
    /// Job specs (%n) to wait for; when absent, waits for all jobs.
    job_specs: Vec<String>,
}

impl builtins::Command for WaitCommand {
    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        if self.job_specs.is_empty() {
            context.shell.jobs.wait_all().await?;
            return Ok(ExitCode::Success);
        }

        let mut last_status = 0;
        for spec in &self.job_specs {
            let Some(id) = parse_job_spec(spec) else {
                writeln!(context.stderr(), "wait: {spec}: invalid job spec")?;
                return Ok(ExitCode::InvalidUsage);
            };

            let Some(job) = context.shell.jobs.jobs.iter_mut().find(|j| j.id == id) else {
                // An unknown job waits on nothing and reports 127.
                last_status = 127;
                continue;
            };

            job.wait().await?;
            last_status = job.last_status.unwrap_or(0);
        }

        // Sweep anything that completed.
        context.shell.jobs.poll();

        Ok(ExitCode::Custom(last_status))
    }
}

fn parse_job_spec(spec: &str) -> Option<usize> {
    spec.strip_prefix('%')?.parse().ok()
}
