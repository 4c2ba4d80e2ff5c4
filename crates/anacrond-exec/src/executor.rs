//! Command execution — runs due jobs as external processes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tracing::{debug, warn};

use anacrond_types::Job;

/// Commands with this extension are resolved against the script directory and
/// run through the interpreter.
const SCRIPT_EXT: &str = ".py";

/// Interpreter used when `which python3` fails.
const FALLBACK_INTERPRETER: &str = "/usr/bin/python3";

/// How one execution attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Process ran and exited zero.
    Success,
    /// Process ran and exited non-zero.
    Failed,
    /// Deadline expired; the process was killed.
    TimedOut,
    /// Script command whose file is missing; nothing ran.
    ScriptNotFound,
    /// The process could not be started.
    SpawnFailed,
}

/// Result of one execution attempt. Every failure mode collapses into a
/// report the scheduler can log; nothing propagates out of the executor.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub outcome: Outcome,
    /// Combined stdout + stderr, or the error text when nothing ran.
    pub output: String,
    pub exit_code: Option<i32>,
}

impl ExecutionReport {
    /// Whether a process run was actually attempted. Run state only advances
    /// for attempted executions.
    pub fn attempted(&self) -> bool {
        self.outcome != Outcome::ScriptNotFound
    }

    pub fn success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// Runs a job's command as an external process, capturing merged output and
/// exit status under a bounded deadline.
pub struct Executor {
    script_dir: PathBuf,
    interpreter: PathBuf,
    timeout: Duration,
}

impl Executor {
    /// Create an executor. The interpreter is resolved once here; pass an
    /// explicit path to skip the `which` lookup.
    pub fn new(script_dir: PathBuf, interpreter: Option<PathBuf>, timeout: Duration) -> Self {
        let interpreter = interpreter.unwrap_or_else(resolve_interpreter);
        debug!(
            interpreter = %interpreter.display(),
            script_dir = %script_dir.display(),
            "Executor ready"
        );
        Self {
            script_dir,
            interpreter,
            timeout,
        }
    }

    /// Whether a command names a script (by extension convention).
    pub fn is_script(command: &str) -> bool {
        command.ends_with(SCRIPT_EXT)
    }

    /// Run one job to completion or deadline and report the outcome.
    pub async fn run(&self, job: &Job) -> ExecutionReport {
        let command_line = if Self::is_script(&job.command) {
            let script_path = self.script_dir.join(&job.command);
            if !script_path.exists() {
                return ExecutionReport {
                    outcome: Outcome::ScriptNotFound,
                    output: format!("Script not found: {}", job.command),
                    exit_code: None,
                };
            }
            format!(
                "{} \"{}\"",
                self.interpreter.display(),
                script_path.display()
            )
        } else {
            job.command.clone()
        };

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(&command_line);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Dropping the in-flight future on timeout must take the child with it.
        cmd.kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                let exit_code = output.status.code().unwrap_or(-1);
                let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                ExecutionReport {
                    outcome: if exit_code == 0 {
                        Outcome::Success
                    } else {
                        Outcome::Failed
                    },
                    output: combined,
                    exit_code: Some(exit_code),
                }
            }
            Ok(Err(e)) => ExecutionReport {
                outcome: Outcome::SpawnFailed,
                output: format!("Command execution failed: {e}"),
                exit_code: None,
            },
            Err(_) => ExecutionReport {
                outcome: Outcome::TimedOut,
                output: format!("Execution timed out after {}s", self.timeout.as_secs()),
                exit_code: None,
            },
        }
    }
}

/// Whether `name` exists in the script directory. Used by job-creation
/// validation.
pub fn script_exists(script_dir: &Path, name: &str) -> bool {
    script_dir.join(name).exists()
}

/// Script files available in the script directory, sorted by name.
pub fn list_scripts(script_dir: &Path) -> Vec<String> {
    let mut scripts: Vec<String> = std::fs::read_dir(script_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter(|name| name.ends_with(SCRIPT_EXT))
                .collect()
        })
        .unwrap_or_default();
    scripts.sort();
    scripts
}

/// Locate the script interpreter via `which python3`, falling back to a fixed
/// path when the lookup fails or finds nothing.
fn resolve_interpreter() -> PathBuf {
    match std::process::Command::new("which").arg("python3").output() {
        Ok(output) if output.status.success() => {
            let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if path.is_empty() {
                PathBuf::from(FALLBACK_INTERPRETER)
            } else {
                PathBuf::from(path)
            }
        }
        _ => {
            warn!("which python3 failed, using {FALLBACK_INTERPRETER}");
            PathBuf::from(FALLBACK_INTERPRETER)
        }
    }
}
