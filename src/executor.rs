//! at(1)-backed command executor.

use std::path::PathBuf;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use calcron_core::ports::{CommandExecutor, JobId};
use calcron_core::{CalcronError, CalcronResult};
use chrono::NaiveDateTime;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

pub struct AtExecutor {
    binary: String,
}

impl AtExecutor {
    pub fn new(binary: impl Into<String>) -> Self {
        AtExecutor {
            binary: binary.into(),
        }
    }

    fn binary_path(&self) -> CalcronResult<PathBuf> {
        which::which(&self.binary)
            .map_err(|_| CalcronError::Executor(format!("'{}' not found in PATH", self.binary)))
    }

    async fn run(&self, args: &[String], stdin: Option<&str>) -> CalcronResult<Output> {
        let binary = self.binary_path()?;
        debug!(binary = %binary.display(), ?args, "Running at");

        let mut child = Command::new(&binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CalcronError::Executor(format!("Failed to spawn {}: {}", binary.display(), e))
            })?;

        let mut pipe = child
            .stdin
            .take()
            .ok_or_else(|| CalcronError::Executor("at stdin unavailable".into()))?;
        if let Some(input) = stdin {
            pipe.write_all(input.as_bytes()).await?;
            pipe.write_all(b"\n").await?;
        }
        drop(pipe);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(CalcronError::Executor(format!(
                "{} exited with status {}: {}",
                self.binary,
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }
}

/// The `-t` time argument, `[[CC]YY]MMDDhhmm`.
pub fn at_time(at: NaiveDateTime) -> String {
    at.format("%Y%m%d%H%M").to_string()
}

/// Find the job number in at's `job 12 at Thu Oct 15 10:00:00 2026` line.
pub fn parse_job_id(output: &str) -> Option<JobId> {
    output.lines().find_map(|line| {
        let mut words = line.split_whitespace();
        if words.next()? != "job" {
            return None;
        }
        let id = words.next()?;
        (words.next()? == "at" && id.chars().all(|c| c.is_ascii_digit())).then(|| id.to_string())
    })
}

#[async_trait]
impl CommandExecutor for AtExecutor {
    async fn schedule(&self, command: &str, at: NaiveDateTime) -> CalcronResult<JobId> {
        let output = self
            .run(&["-t".to_string(), at_time(at)], Some(command))
            .await?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let id = parse_job_id(&stderr).ok_or_else(|| {
            CalcronError::Executor(format!("No job id in at output: {}", stderr.trim()))
        })?;

        info!(job = %id, %at, command, "Scheduled");
        Ok(id)
    }

    async fn cancel(&self, job_ids: &[JobId]) -> CalcronResult<()> {
        if job_ids.is_empty() {
            return Ok(());
        }

        let mut args = vec!["-d".to_string()];
        args.extend(job_ids.iter().cloned());
        self.run(&args, None).await?;

        info!(jobs = ?job_ids, "Cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_job_id() {
        let stderr = concat!(
            "warning: commands will be executed using /bin/sh\n",
            "job 42 at Thu Oct 15 10:00:00 2026\n"
        );
        assert_eq!(parse_job_id(stderr), Some("42".to_string()));
        assert_eq!(parse_job_id("job 7 at 2026-10-15 10:00"), Some("7".to_string()));
        assert_eq!(parse_job_id("Can't open /var/run/atd.pid"), None);
        assert_eq!(parse_job_id("job queue empty"), None);
    }

    #[test]
    fn test_at_time() {
        let at = NaiveDate::from_ymd_opt(2026, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        assert_eq!(at_time(at), "202603070905");
    }

    #[tokio::test]
    async fn test_cancel_nothing_does_not_spawn() {
        let executor = AtExecutor::new("definitely-not-an-at-binary");
        executor.cancel(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_binary_is_executor_error() {
        let executor = AtExecutor::new("definitely-not-an-at-binary");
        let at = NaiveDate::from_ymd_opt(2026, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();

        assert!(matches!(
            executor.schedule("true", at).await,
            Err(CalcronError::Executor(_))
        ));
    }
}
