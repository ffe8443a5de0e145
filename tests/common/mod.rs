//! Common test utilities for bugpen integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/bugpen/` directory.

#![allow(dead_code)]

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// Each `TestEnv` owns a temporary data directory passed to every command
/// via `BP_DATA_DIR`, making tests parallel-safe. Commands run as a
/// principal given to `bp()`, so one environment can host several actors.
pub struct TestEnv {
    pub data_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with an isolated data directory.
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment and initialize bugpen.
    pub fn init() -> Self {
        let env = Self::new();
        env.bp("setup").args(["system", "init"]).assert().success();
        env
    }

    /// Get a Command for the bp binary acting as the given principal.
    pub fn bp(&self, principal: &str) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_bp"));
        cmd.env("BP_DATA_DIR", self.data_dir.path());
        cmd.args(["--as", principal]);
        cmd
    }

    /// Get the path to the data directory.
    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }

    /// Run a command, assert success, and parse its JSON output.
    pub fn json(&self, principal: &str, args: &[&str]) -> serde_json::Value {
        let output = self.bp(principal).args(args).output().unwrap();
        assert!(
            output.status.success(),
            "command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    /// Get a principal's public short id (creating the user on first use).
    pub fn short_id(&self, principal: &str) -> String {
        self.json(principal, &["whoami"])["short_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Create a project as the given principal and return its public id.
    pub fn create_project(&self, principal: &str, title: &str) -> String {
        self.json(principal, &["project", "create", title])["public_id"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
