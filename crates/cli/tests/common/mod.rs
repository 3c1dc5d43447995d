// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test utilities for CLI integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Isolated sockets, history and locks for one test
pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config("")
    }

    /// Extra TOML appended after the isolated paths
    pub fn with_config(extra: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let config = format!(
            "[persistence]\npath = \"{}\"\n\n[lock]\ndir = \"{}\"\ntimeout = \"200ms\"\n\n{}\n",
            dir.path().join("history.jsonl").display(),
            dir.path().join("locks").display(),
            extra
        );
        std::fs::write(dir.path().join("pj.toml"), config).expect("Failed to write config");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn socket_dir(&self) -> PathBuf {
        self.dir.path().join("sockets")
    }

    fn apply_env(&self, command: &mut std::process::Command) {
        command
            .env("PJ_CONFIG", self.dir.path().join("pj.toml"))
            .env("PJ_SOCKET_DIR", self.socket_dir())
            .env("PJ_LOG", "off")
            .env_remove("RUST_LOG");
    }

    /// `pj` command bound to this environment
    pub fn pj(&self) -> assert_cmd::Command {
        let mut command = std::process::Command::new(assert_cmd::cargo::cargo_bin("pj"));
        self.apply_env(&mut command);
        assert_cmd::Command::from_std(command)
    }

    /// Start `pj` in the background; the process is killed when the guard drops
    pub fn spawn(&self, args: &[&str]) -> Background {
        let mut command = std::process::Command::new(assert_cmd::cargo::cargo_bin("pj"));
        self.apply_env(&mut command);
        let child = command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn pj");
        Background { child: Some(child) }
    }

    /// Stdout of `pj <args>`
    pub fn stdout(&self, args: &[&str]) -> String {
        let output = self.pj().args(args).output().expect("Failed to run pj");
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    /// Poll `pj <args>` until its stdout contains `needle`
    pub fn wait_for_output(&self, args: &[&str], needle: &str) -> String {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let stdout = self.stdout(args);
            if stdout.contains(needle) {
                return stdout;
            }
            assert!(
                Instant::now() < deadline,
                "`pj {}` never printed {:?}; last output:\n{}",
                args.join(" "),
                needle,
                stdout
            );
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

pub struct Background {
    child: Option<Child>,
}

impl Background {
    /// Wait for exit and return (success, stdout, stderr)
    pub fn finish(mut self) -> (bool, String, String) {
        let child = self.child.take().expect("already finished");
        let output = child.wait_with_output().expect("Failed to wait for pj");
        (
            output.status.success(),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        )
    }
}

impl Drop for Background {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
