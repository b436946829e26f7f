use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, warn};
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::InjectError;

const DEVICES_HEADER: &str = "List of devices attached";

/// Argument list handed to the bridge executable, e.g. `["shell", "mkdir -p /x"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    args: Vec<String>,
}

impl RemoteCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Tokenize a bridge command line on whitespace. Quotes are not interpreted.
    pub fn parse(command: &str) -> Self {
        Self::new(command.split_whitespace())
    }

    pub fn devices() -> Self {
        Self::new(["devices"])
    }

    /// Run `command` through the device's shell. The command travels as a single argument, so
    /// globs, pipes and quoting are evaluated on the device.
    pub fn shell(command: impl Into<String>) -> Self {
        Self::new(["shell".to_string(), command.into()])
    }

    pub fn push(local_path: impl Into<String>, remote_path: impl Into<String>) -> Self {
        Self::new(["push".to_string(), local_path.into(), remote_path.into()])
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The device-side command line, if this is a `shell` invocation.
    pub fn shell_command(&self) -> Option<String> {
        match self.args.split_first() {
            Some((first, rest)) if first == "shell" => Some(rest.join(" ")),
            _ => None,
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

impl From<&str> for RemoteCommand {
    fn from(command: &str) -> Self {
        Self::parse(command)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// `None` when the bridge process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Abstraction over the tool that carries commands to the device.
pub trait DeviceBridge {
    /// Run one bridge command to completion.
    ///
    /// A non-zero exit status is reported through [`CommandResult::code`]; `Err` is reserved for
    /// failing to run the bridge at all.
    fn run(
        &mut self,
        command: &RemoteCommand,
    ) -> impl Future<Output = Result<CommandResult, InjectError>> + Send;
}

/// Bridge that spawns the `adb` executable once per command.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    program: PathBuf,
    serial: Option<String>,
    timeout: Option<Duration>,
}

impl AdbBridge {
    pub fn new(
        program: impl Into<PathBuf>,
        serial: Option<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            program: program.into(),
            serial,
            timeout,
        }
    }
}

impl DeviceBridge for AdbBridge {
    async fn run(&mut self, command: &RemoteCommand) -> Result<CommandResult, InjectError> {
        let mut cmd = Command::new(&self.program);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(command.args()).kill_on_drop(true);
        debug!("{} {command}", self.program.display());

        let output = cmd.output();
        let output = match self.timeout {
            Some(after) => timeout(after, output).await.map_err(|_| InjectError::Timeout {
                command: command.to_string(),
                after,
            })?,
            None => output.await,
        }
        .map_err(|source| InjectError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        let result = CommandResult {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!("exit status {:?}", result.code);
        Ok(result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedDevice {
    pub serial: String,
    pub state: String,
}

/// Parse the output of `adb devices`.
///
/// The header line and the `* daemon ...` chatter adb prints while starting its server are
/// skipped.
pub fn parse_devices(output: &str) -> Vec<AttachedDevice> {
    let mut devices = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(DEVICES_HEADER) || line.starts_with('*') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(serial) = fields.next() else {
            continue;
        };
        let state = fields.next().unwrap_or("unknown");
        if state != "device" {
            warn!("device {serial} is in state {state:?}");
        }
        devices.push(AttachedDevice {
            serial: serial.to_string(),
            state: state.to_string(),
        });
    }
    devices
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    type Responder = Box<dyn FnMut(&RemoteCommand) -> Result<CommandResult, InjectError> + Send>;

    /// Bridge that records every command and answers from a closure.
    pub struct ScriptedBridge {
        pub issued: Vec<RemoteCommand>,
        responder: Responder,
    }

    impl ScriptedBridge {
        pub fn new<F>(responder: F) -> Self
        where
            F: FnMut(&RemoteCommand) -> Result<CommandResult, InjectError> + Send + 'static,
        {
            Self {
                issued: Vec::new(),
                responder: Box::new(responder),
            }
        }

        pub fn issued_lines(&self) -> Vec<String> {
            self.issued.iter().map(ToString::to_string).collect()
        }
    }

    impl DeviceBridge for ScriptedBridge {
        async fn run(&mut self, command: &RemoteCommand) -> Result<CommandResult, InjectError> {
            self.issued.push(command.clone());
            (self.responder)(command)
        }
    }

    pub fn ok(stdout: &str) -> Result<CommandResult, InjectError> {
        Ok(CommandResult {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    pub fn failed(code: i32, stderr: &str) -> Result<CommandResult, InjectError> {
        Ok(CommandResult {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }
}
