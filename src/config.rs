use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::error::InjectError;

#[derive(Parser, Debug)]
#[command(version, about = "Inject a system certificate into an Android device.")]
pub struct Args {
    /// Path to the certificate to be injected, conventionally named <subject_hash>.0.
    certificate_path: Option<PathBuf>,

    /// adb executable used to reach the device.
    #[arg(long, default_value = "adb")]
    adb: PathBuf,

    /// Serial of the device to use when more than one is attached.
    #[arg(short, long)]
    serial: Option<String>,

    /// Give up on any single adb command after this many seconds. By default commands may run
    /// indefinitely.
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,
}

/// Locations on the device the injection works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePaths {
    /// Scratch directory holding the backup of the current trust set.
    pub tmp_dir: String,
    /// Where the new certificate is pushed before being moved into place.
    pub upload_dir: String,
    /// Trust anchors consulted by the Conscrypt APEX module.
    pub conscrypt_dir: String,
    /// System certificate directory, shadowed by a tmpfs.
    pub system_dir: String,
    pub selinux_label: String,
}

impl Default for DevicePaths {
    fn default() -> Self {
        DevicePaths {
            tmp_dir: "/data/local/tmp/tmp-ca-copy".to_string(),
            upload_dir: "/data/local/tmp".to_string(),
            conscrypt_dir: "/apex/com.android.conscrypt/cacerts".to_string(),
            system_dir: "/system/etc/security/cacerts".to_string(),
            selinux_label: "u:object_r:system_file:s0".to_string(),
        }
    }
}

/// The local certificate file to inject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub local_path: String,
    /// Name the certificate gets on the device.
    pub file_name: String,
}

impl Certificate {
    pub fn from_path(path: &Path) -> Result<Self, InjectError> {
        let invalid = || InjectError::InvalidCertificatePath(path.to_path_buf());
        let local_path = path.to_str().ok_or_else(invalid)?.to_string();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(invalid)?
            .to_string();
        Ok(Certificate {
            local_path,
            file_name,
        })
    }
}

#[derive(Debug)]
pub struct Config {
    pub certificate: Certificate,
    pub adb: PathBuf,
    pub serial: Option<String>,
    pub timeout: Option<Duration>,
    pub paths: DevicePaths,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, InjectError> {
        let path = args
            .certificate_path
            .ok_or(InjectError::MissingCertificate)?;
        Ok(Config {
            certificate: Certificate::from_path(&path)?,
            adb: args.adb,
            serial: args.serial,
            timeout: args.timeout.map(Duration::from_secs),
            paths: DevicePaths::default(),
        })
    }
}
