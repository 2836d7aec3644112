//! External program invocation.

use crate::error::{PkiError, Result};
use std::ffi::OsString;
use std::process::Command;

/// A program plus arguments, run to completion with captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<OsString>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Run and return trimmed stdout.
    ///
    /// Non-zero exit, or failure to spawn, is `ExternalCommandFailed`.
    pub fn run(&self) -> Result<String> {
        tracing::debug!(
            program = %self.program,
            args = ?self.args,
            "running external command"
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| PkiError::ExternalCommandFailed {
                program: self.program.clone(),
                status: "not started".to_string(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(PkiError::ExternalCommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
