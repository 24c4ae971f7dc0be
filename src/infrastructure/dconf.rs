//! Configuration-store adapter.
//!
//! Exports and imports a settings subtree through the `dconf` command line
//! tool. The dump is treated as an opaque byte blob.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use crate::domain::{AppError, Result};

/// Snapshot access to an external key-value settings store.
pub trait ConfigStore: Send + Sync {
    /// Export the subtree at `namespace`.
    ///
    /// # Errors
    /// Returns `ExternalTool` if the export cannot be produced.
    fn dump(&self, namespace: &str) -> Result<Vec<u8>>;

    /// Import `data` into the subtree at `namespace`.
    ///
    /// # Errors
    /// Returns `ExternalTool` if the import is rejected.
    fn load(&self, namespace: &str, data: &[u8]) -> Result<()>;
}

/// [`ConfigStore`] backed by the `dconf` binary.
#[derive(Debug, Clone)]
pub struct DconfCli {
    program: String,
}

impl DconfCli {
    /// Use `program` (normally `dconf`) for dump and load.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn spawn_error(&self, err: std::io::Error) -> AppError {
        let message = if err.kind() == std::io::ErrorKind::NotFound {
            format!("'{}' not found in PATH", self.program)
        } else {
            format!("could not run '{}'", self.program)
        };

        AppError::ExternalTool {
            tool: self.program.clone(),
            message,
            source: Some(err),
        }
    }

    fn check_status(&self, action: &str, output: &Output) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(AppError::tool(
            &self.program,
            format!("{action} exited with {}: {}", output.status, stderr.trim()),
        ))
    }
}

impl Default for DconfCli {
    fn default() -> Self {
        Self::new("dconf")
    }
}

impl ConfigStore for DconfCli {
    fn dump(&self, namespace: &str) -> Result<Vec<u8>> {
        tracing::debug!(program = %self.program, namespace, "Dumping settings");

        let output = Command::new(&self.program)
            .args(["dump", namespace])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        self.check_status("dump", &output)?;

        tracing::info!(bytes = output.stdout.len(), namespace, "Settings exported");
        Ok(output.stdout)
    }

    fn load(&self, namespace: &str, data: &[u8]) -> Result<()> {
        tracing::debug!(program = %self.program, namespace, bytes = data.len(), "Loading settings");

        let mut child = Command::new(&self.program)
            .args(["load", namespace])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Feed stdin from its own thread so a chatty stderr cannot stall the write.
        let stdin = child.stdin.take();
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(data),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });

        let output = output.map_err(|e| AppError::ExternalTool {
            tool: self.program.clone(),
            message: "failed to wait for load".into(),
            source: Some(e),
        })?;

        match written {
            // A tool that exits early closes its stdin; the exit status reports why.
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => {
                return Err(AppError::ExternalTool {
                    tool: self.program.clone(),
                    message: "failed to write settings to stdin".into(),
                    source: Some(e),
                })
            }
            Err(_) => return Err(AppError::tool(&self.program, "stdin writer panicked")),
        }

        self.check_status("load", &output)?;

        tracing::info!(namespace, "Settings imported");
        Ok(())
    }
}
