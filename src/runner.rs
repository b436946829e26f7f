use log::debug;

use crate::connection::{DeviceBridge, RemoteCommand};
use crate::error::InjectError;
use crate::output::Output;

/// Runs bridge commands one at a time, printing a `Running: ...` status line for each and
/// turning a non-zero exit into an error.
pub struct CommandRunner<B> {
    bridge: B,
    output: Output,
}

impl<B: DeviceBridge> CommandRunner<B> {
    pub fn new(bridge: B, output: Output) -> Self {
        Self { bridge, output }
    }

    /// Execute one command and return its trimmed stdout.
    pub async fn execute(
        &mut self,
        command: impl Into<RemoteCommand>,
        description: &str,
    ) -> Result<String, InjectError> {
        let command = command.into();
        self.output.print(&format!("Running: {description}... "));

        let result = match self.bridge.run(&command).await {
            Ok(result) => result,
            Err(e) => {
                self.output.println("FAIL");
                return Err(e);
            }
        };

        if !result.success() {
            self.output.println("FAIL");
            return Err(InjectError::CommandFailed {
                description: description.to_string(),
                command: command.to_string(),
                code: result.code,
                stderr: result.stderr.trim().to_string(),
            });
        }

        self.output.println("PASS");
        let stdout = result.stdout.trim();
        if !stdout.is_empty() {
            debug!("{description}: {stdout}");
        }
        Ok(stdout.to_string())
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn into_bridge(self) -> B {
        self.bridge
    }
}
