use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InjectError {
    #[error(
        "Certificate is required. Please provide it as an argument.\nExample: certinject <cert_name>.0"
    )]
    MissingCertificate,
    #[error("Certificate path has no file name: {0}")]
    InvalidCertificatePath(PathBuf),
    #[error("No ADB devices connected.")]
    NoDevices,
    #[error("Device {0} is not attached. Check `adb devices`.")]
    DeviceNotFound(String),
    #[error("Command '{command}' failed ({description}): {stderr}")]
    CommandFailed {
        description: String,
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Command '{command}' did not finish within {after:?}")]
    Timeout { command: String, after: Duration },
    #[error("Unexpected PID {token:?} in output of: {description}")]
    InvalidPid { description: String, token: String },
    #[error("No zygote processes found.")]
    NoZygote,
}
