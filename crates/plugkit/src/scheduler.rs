//! Job scheduler - runs external commands with bounded concurrency
//!
//! A [`Job`] is one subprocess invocation. Jobs are handed to a
//! [`CommandRunner`], which produces exactly one [`JobResult`] per job.
//! [`run_jobs`] and [`run_bounded`] fan work out over a rayon pool sized by
//! `n_threads`; the pool size is the only concurrency control.

use crate::error::Result;
use rayon::prelude::*;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Exit code reported for a job killed after reaching its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Standard error reported for a job killed after reaching its timeout.
pub const TIMEOUT_MESSAGE: &str = "PROCESS REACHED TIMEOUT.";

/// Exit code reported when the executable could not be spawned.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Default per-job timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a killed job's output pipes may take to close.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// A single subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Program to execute
    pub executable: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Working directory (inherited when `None`)
    pub cwd: Option<PathBuf>,
    /// Time after which the process is killed
    pub timeout: Duration,
}

impl Job {
    /// Create a job with the default timeout.
    pub fn new<I, S>(executable: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            executable: executable.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The job as a single display string, `executable arg1 arg2 ...`.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.executable.clone()
        } else {
            format!("{} {}", self.executable, self.args.join(" "))
        }
    }
}

/// How a finished job should be treated by its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Exit code 0, nothing on stderr
    Success,
    /// Exit code 0 but stderr was written; dependent steps still run
    Warning,
    /// Non-zero exit code (including timeouts); dependent steps are skipped
    Failed,
}

/// Captured outcome of a [`Job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl JobResult {
    /// Result of a job that was killed after reaching its timeout.
    pub fn timed_out(duration: Duration) -> Self {
        Self {
            exit_code: TIMEOUT_EXIT_CODE,
            stdout: String::new(),
            stderr: TIMEOUT_MESSAGE.to_string(),
            duration,
        }
    }

    /// Result of a job whose executable could not be started.
    pub fn spawn_failed(error: &std::io::Error, duration: Duration) -> Self {
        Self {
            exit_code: SPAWN_FAILURE_EXIT_CODE,
            stdout: String::new(),
            stderr: error.to_string(),
            duration,
        }
    }

    /// Classify the result.
    pub fn status(&self) -> JobStatus {
        if self.exit_code != 0 {
            JobStatus::Failed
        } else if !self.stderr.trim().is_empty() {
            JobStatus::Warning
        } else {
            JobStatus::Success
        }
    }

    /// Whether the job was killed on timeout.
    pub fn is_timeout(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE && self.stderr == TIMEOUT_MESSAGE
    }
}

/// Launches jobs.
///
/// This trait is the seam between the pipeline and the operating system:
/// - [`ProcessRunner`] spawns real processes
/// - tests substitute a scripted runner
pub trait CommandRunner: Send + Sync {
    /// Run a job to completion (or timeout) and capture its output.
    fn run(&self, job: &Job) -> JobResult;
}

/// Runner that spawns real subprocesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, job: &Job) -> JobResult {
        let start = Instant::now();
        log::debug!("Running: {}", job.command_line());

        let mut command = Command::new(&job.executable);
        command
            .args(&job.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &job.cwd {
            command.current_dir(cwd);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return JobResult::spawn_failed(&e, start.elapsed()),
        };

        // Both pipes are drained on their own threads so a chatty process
        // cannot block on a full pipe while we wait on the other one.
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let status = match child.wait_timeout(job.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                log::debug!("Timed out after {:?}: {}", job.timeout, job.command_line());
                settle_readers(job, [stdout_reader, stderr_reader]);
                return JobResult::timed_out(start.elapsed());
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                settle_readers(job, [stdout_reader, stderr_reader]);
                return JobResult::spawn_failed(&e, start.elapsed());
            }
        };

        let stdout = stdout_reader.map(join_reader).unwrap_or_default();
        let stderr = stderr_reader.map(join_reader).unwrap_or_default();

        JobResult {
            // Killed by a signal: no exit code
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
            duration: start.elapsed(),
        }
    }
}

/// Each pipe is owned by its reader thread and closed when that thread ends.
fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

fn join_reader(reader: mpsc::Receiver<String>) -> String {
    reader.recv().unwrap_or_default()
}

/// Wait up to [`KILL_GRACE`] for the readers of a killed job to reach EOF.
///
/// A grandchild that inherited a pipe keeps it open past the kill; its
/// reader then closes the pipe when the grandchild exits.
fn settle_readers<const N: usize>(job: &Job, readers: [Option<mpsc::Receiver<String>>; N]) {
    let deadline = Instant::now() + KILL_GRACE;
    for reader in readers.into_iter().flatten() {
        let left = deadline.saturating_duration_since(Instant::now());
        if reader.recv_timeout(left).is_err() {
            log::debug!("Output pipe still open after kill: {}", job.command_line());
        }
    }
}

/// Number of worker threads used when none is configured.
///
/// Detected CPU count, or 1 if it cannot be determined.
pub fn default_threads() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Map `f` over `items` with at most `n_threads` calls in flight.
///
/// Results come back in input order regardless of completion order.
pub fn run_bounded<T, R, F>(items: Vec<T>, n_threads: usize, f: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync + Send,
{
    let n_threads = n_threads.max(1);

    if n_threads == 1 || items.len() <= 1 {
        return Ok(items.into_iter().map(f).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads.min(items.len()))
        .build()?;

    Ok(pool.install(|| {
        items
            .into_par_iter()
            .with_max_len(1)
            .map(&f)
            .collect()
    }))
}

/// Run jobs with at most `n_threads` in flight, returning results in job order.
pub fn run_jobs(
    runner: &dyn CommandRunner,
    jobs: &[Job],
    n_threads: usize,
) -> Result<Vec<JobResult>> {
    run_bounded(jobs.iter().collect(), n_threads, |job| runner.run(job))
}
