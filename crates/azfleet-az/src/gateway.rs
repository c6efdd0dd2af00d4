//! The command gateway trait and its process-backed implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::AzCommand;
use crate::error::{AzError, Result};

/// Runs management commands against Azure and decodes their JSON output.
///
/// This is the single chokepoint through which the fleet tooling talks to
/// the cloud platform. Implementations must not retry.
#[async_trait]
pub trait AzGateway: Send + Sync {
    /// Run a command and return its decoded output.
    ///
    /// An empty successful response yields an empty JSON object when
    /// `no_data_ok` is set.
    ///
    /// # Errors
    ///
    /// Returns `AzError::CommandFailed` on a non-zero exit, `AzError::NoData`
    /// when output was required but absent, and `AzError::Decode` when the
    /// output is not JSON.
    async fn run(&self, command: &AzCommand, description: &str, no_data_ok: bool)
        -> Result<Value>;
}

/// Gateway that shells out to the `az` executable.
#[derive(Debug, Clone)]
pub struct AzCli {
    program: PathBuf,
}

impl AzCli {
    /// Locate the Azure CLI for the current platform.
    ///
    /// On Windows the CLI is a batch wrapper, so `PATH` is searched for
    /// `az.cmd`; elsewhere `az` is resolved by the OS at spawn time.
    ///
    /// # Errors
    ///
    /// Returns `AzError::Locate` if `az.cmd` is not on `PATH` (Windows only).
    pub fn locate() -> Result<Self> {
        if cfg!(windows) {
            let path = std::env::var_os("PATH").unwrap_or_default();
            find_in_path(&path, "az.cmd")
                .map(Self::with_program)
                .ok_or_else(|| AzError::Locate("az.cmd".to_string()))
        } else {
            Ok(Self::with_program("az"))
        }
    }

    /// Use an explicit executable path.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The executable this gateway invokes.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

fn find_in_path(path: &std::ffi::OsStr, file_name: &str) -> Option<PathBuf> {
    std::env::split_paths(path)
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.exists())
}

#[async_trait]
impl AzGateway for AzCli {
    async fn run(
        &self,
        command: &AzCommand,
        description: &str,
        no_data_ok: bool,
    ) -> Result<Value> {
        info!("{description}");
        debug!(command = %command, "invoking az");

        let mut process = Command::new(&self.program);
        process.args(command.args());
        if !command.has_arg("--output") && !command.has_arg("-o") {
            process.args(["--output", "json"]);
        }

        let output = process.output().await.map_err(|source| AzError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        decode_output(
            description,
            output.status.success(),
            output.status.code(),
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
            no_data_ok,
        )
    }
}

/// Turn captured process output into the gateway result.
///
/// # Errors
///
/// See [`AzGateway::run`].
pub(crate) fn decode_output(
    description: &str,
    success: bool,
    code: Option<i32>,
    stdout: &str,
    stderr: &str,
    no_data_ok: bool,
) -> Result<Value> {
    if !success {
        return Err(AzError::CommandFailed {
            description: description.to_string(),
            code,
            stderr: stderr.trim().to_string(),
        });
    }

    if stdout.trim().is_empty() {
        if no_data_ok {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        return Err(AzError::NoData {
            description: description.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    serde_json::from_str(stdout).map_err(|source| AzError::Decode {
        description: description.to_string(),
        source,
    })
}
