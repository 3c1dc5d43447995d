// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External process payload

use super::{Execution, ExecutionError, OutputSink};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use pj_core::TerminationStatus;
use std::io::{BufRead, BufReader, Read};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct ProcessState {
    pid: Option<u32>,
    stopped: bool,
    interrupted: bool,
}

/// Spawns a child process and relays its stdout/stderr lines as output
pub struct ProcessExecution {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    cwd: Option<PathBuf>,
    state: Mutex<ProcessState>,
}

impl ProcessExecution {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
            cwd: None,
            state: Mutex::new(ProcessState::default()),
        }
    }

    /// First element is the program; `None` when the command line is empty
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn lock_state(&self) -> MutexGuard<'_, ProcessState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn outcome(&self, status: ExitStatus) -> Result<TerminationStatus, ExecutionError> {
        if self.lock_state().stopped {
            return Ok(TerminationStatus::Stopped);
        }
        if status.success() {
            return Ok(TerminationStatus::Completed);
        }
        match (status.code(), status.signal()) {
            (Some(code), _) => Err(ExecutionError::failed(
                "EXIT_CODE",
                format!("process exited with code {}", code),
            )),
            (None, Some(signal)) => Err(ExecutionError::failed(
                "SIGNAL",
                format!("process terminated by signal {}", signal),
            )),
            (None, None) => Err(ExecutionError::failed("UNKNOWN_EXIT", "process exited abnormally")),
        }
    }
}

fn relay(stream: impl Read, is_error: bool, output: &dyn OutputSink) {
    let reader = BufReader::new(stream);
    for chunk in reader.split(b'\n') {
        let Ok(bytes) = chunk else { break };
        let line = String::from_utf8_lossy(&bytes);
        output.output(line.trim_end_matches('\r'), is_error);
    }
}

impl Execution for ProcessExecution {
    fn execute(&self, output: &dyn OutputSink) -> Result<TerminationStatus, ExecutionError> {
        let mut child = {
            let mut state = self.lock_state();
            if state.stopped {
                return Ok(TerminationStatus::Stopped);
            }
            let mut command = Command::new(&self.program);
            command
                .args(&self.args)
                .envs(self.env.iter().map(|(k, v)| (k, v)))
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            if let Some(cwd) = &self.cwd {
                command.current_dir(cwd);
            }
            let child = command.spawn().map_err(|e| {
                ExecutionError::failed(
                    "SPAWN_FAILED",
                    format!("failed to start {}: {}", self.program, e),
                )
            })?;
            state.pid = Some(child.id());
            tracing::debug!(pid = child.id(), command = %self.command_line(), "process started");
            child
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let waited = std::thread::scope(|scope| {
            if let Some(stdout) = stdout {
                scope.spawn(move || relay(stdout, false, output));
            }
            if let Some(stderr) = stderr {
                scope.spawn(move || relay(stderr, true, output));
            }
            child.wait()
        });
        self.lock_state().pid = None;

        let status = waited.map_err(|e| {
            ExecutionError::failed("WAIT_FAILED", format!("failed to wait for process: {}", e))
        })?;
        tracing::debug!(?status, "process exited");
        self.outcome(status)
    }

    fn stop(&self) {
        let mut state = self.lock_state();
        state.stopped = true;
        if state.interrupted {
            return;
        }
        let Some(pid) = state.pid else { return };
        let Ok(raw) = i32::try_from(pid) else { return };
        if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
            tracing::warn!(pid, error = %e, "failed to terminate process");
        }
    }

    fn interrupt(&self) {
        let mut state = self.lock_state();
        state.interrupted = true;
        state.stopped = true;
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
