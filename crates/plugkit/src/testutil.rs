//! Test doubles shared by unit tests.

use crate::scheduler::{CommandRunner, Job, JobResult};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// A [`CommandRunner`] that answers from a script instead of spawning.
///
/// Rules match when their pattern is a substring of the job's command line;
/// the first matching rule wins. Unmatched jobs succeed with empty output,
/// except `git version`, which reports a recent git.
pub(crate) struct ScriptedRunner {
    responses: Vec<(String, JobResult)>,
    delays: Vec<(String, Duration)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            delays: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Succeed with `stdout`.
    pub fn respond(self, pattern: &str, stdout: &str) -> Self {
        self.result(pattern, 0, stdout, "")
    }

    /// Succeed but write `stderr`.
    pub fn warn(self, pattern: &str, stderr: &str) -> Self {
        self.result(pattern, 0, "", stderr)
    }

    /// Exit with `exit_code` and `stderr`.
    pub fn fail(self, pattern: &str, exit_code: i32, stderr: &str) -> Self {
        self.result(pattern, exit_code, "", stderr)
    }

    pub fn result(mut self, pattern: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.responses.push((
            pattern.to_string(),
            JobResult {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                duration: Duration::ZERO,
            },
        ));
        self
    }

    /// Sleep before answering; past the job's timeout the job times out.
    pub fn delay(mut self, pattern: &str, delay: Duration) -> Self {
        self.delays.push((pattern.to_string(), delay));
        self
    }

    /// Command lines seen so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls whose command line contains `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(pattern)).count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, job: &Job) -> JobResult {
        let line = job.command_line();
        self.calls.lock().unwrap().push(line.clone());

        if let Some((_, delay)) = self.delays.iter().find(|(p, _)| line.contains(p.as_str())) {
            if *delay > job.timeout {
                thread::sleep(job.timeout);
                return JobResult::timed_out(job.timeout);
            }
            thread::sleep(*delay);
        }

        if let Some((_, result)) = self.responses.iter().find(|(p, _)| line.contains(p.as_str())) {
            return result.clone();
        }

        let stdout = if line.ends_with(" version") {
            "git version 2.43.0"
        } else {
            ""
        };

        JobResult {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
            duration: Duration::ZERO,
        }
    }
}
