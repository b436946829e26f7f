//! The injection recipe.
//!
//! The system certificate directory is shadowed by a tmpfs holding the original certificates plus
//! the new one. The Conscrypt APEX keeps its own read-only copy of the trust anchors, so the
//! modified directory is then bind-mounted over it inside the mount namespace of every zygote
//! (covering apps forked from now on) and of every app already running.

use std::collections::HashSet;
use std::fmt;

use log::{debug, info, warn};

use crate::config::{Certificate, DevicePaths};
use crate::connection::{DeviceBridge, RemoteCommand, parse_devices};
use crate::error::InjectError;
use crate::runner::CommandRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Processes whose mount namespace received the bind mount.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionReport {
    pub zygote_pids: Vec<Pid>,
    pub app_pids: Vec<Pid>,
}

/// Modify the device checked by [`check_devices`], stopping at the first failing step.
///
/// Nothing is rolled back on failure.
pub async fn inject<B: DeviceBridge>(
    runner: &mut CommandRunner<B>,
    certificate: &Certificate,
    paths: &DevicePaths,
) -> Result<InjectionReport, InjectError> {
    remount_system_certs(runner, paths).await?;
    install_certificate(runner, certificate, paths).await?;

    let zygote_pids = zygote_pids(runner).await?;
    for pid in &zygote_pids {
        bind_mount_certs(runner, paths, *pid, "zygote").await?;
    }

    let app_pids = app_pids(runner, &zygote_pids).await?;
    if app_pids.is_empty() {
        warn!("no app processes descend from zygotes {zygote_pids:?}");
        runner
            .output()
            .println("Warning: No app processes found to inject the mount.");
    }
    for pid in &app_pids {
        bind_mount_certs(runner, paths, *pid, "app").await?;
    }

    info!(
        "injected into {} zygote and {} app processes",
        zygote_pids.len(),
        app_pids.len()
    );
    Ok(InjectionReport {
        zygote_pids,
        app_pids,
    })
}

/// Make sure a device is attached, and that it is `serial` when one is given. Issues nothing
/// that modifies the device.
pub async fn check_devices<B: DeviceBridge>(
    runner: &mut CommandRunner<B>,
    serial: Option<&str>,
) -> Result<(), InjectError> {
    let output = runner
        .execute(RemoteCommand::devices(), "Checking ADB devices")
        .await?;
    let devices = parse_devices(&output);
    if devices.is_empty() {
        return Err(InjectError::NoDevices);
    }

    match serial {
        Some(serial) => {
            if !devices.iter().any(|device| device.serial == serial) {
                return Err(InjectError::DeviceNotFound(serial.to_string()));
            }
        }
        None if devices.len() > 1 => {
            warn!(
                "{} devices attached and no serial given, adb picks the target",
                devices.len()
            );
        }
        None => {}
    }
    Ok(())
}

/// Shadow the system certificate directory with a tmpfs that holds a copy of the current trust
/// set.
async fn remount_system_certs<B: DeviceBridge>(
    runner: &mut CommandRunner<B>,
    paths: &DevicePaths,
) -> Result<(), InjectError> {
    let DevicePaths {
        tmp_dir,
        conscrypt_dir,
        system_dir,
        ..
    } = paths;

    runner
        .execute(
            RemoteCommand::shell(format!("mkdir -p -m 700 {tmp_dir}")),
            "Creating temporary directory on device",
        )
        .await?;
    runner
        .execute(
            RemoteCommand::shell(format!("cp {conscrypt_dir}/* {tmp_dir}/")),
            "Backing up existing certificates",
        )
        .await?;
    runner
        .execute(
            RemoteCommand::shell(format!("mount -t tmpfs tmpfs {system_dir}")),
            "Mounting tmpfs over system cert directory",
        )
        .await?;
    runner
        .execute(
            RemoteCommand::shell(format!("mv {tmp_dir}/* {system_dir}/")),
            "Restoring original certificates",
        )
        .await?;
    Ok(())
}

async fn install_certificate<B: DeviceBridge>(
    runner: &mut CommandRunner<B>,
    certificate: &Certificate,
    paths: &DevicePaths,
) -> Result<(), InjectError> {
    let upload_path = format!("{}/{}", paths.upload_dir, certificate.file_name);
    runner
        .execute(
            RemoteCommand::push(certificate.local_path.as_str(), upload_path),
            "Pushing new certificate to device",
        )
        .await?;
    runner
        .execute(
            RemoteCommand::shell(format!(
                "mv {}/{} {}/",
                paths.upload_dir,
                shell_quote(&certificate.file_name),
                paths.system_dir
            )),
            "Moving new certificate into cert directory",
        )
        .await?;

    // every file, so the new certificate matches the restored ones
    let all_certs = format!("{}/*", paths.system_dir);
    runner
        .execute(
            RemoteCommand::shell(format!("chown root:root {all_certs}")),
            "Updating certificate ownership",
        )
        .await?;
    runner
        .execute(
            RemoteCommand::shell(format!("chmod 644 {all_certs}")),
            "Setting certificate permissions",
        )
        .await?;
    runner
        .execute(
            RemoteCommand::shell(format!("chcon {} {all_certs}", paths.selinux_label)),
            "Setting SELinux labels",
        )
        .await?;
    Ok(())
}

async fn zygote_pids<B: DeviceBridge>(
    runner: &mut CommandRunner<B>,
) -> Result<Vec<Pid>, InjectError> {
    let mut pids = Vec::new();
    for (process, description) in [
        ("zygote", "Getting zygote PIDs"),
        ("zygote64", "Getting zygote64 PIDs"),
    ] {
        // pidof exits 1 when nothing matches, which is not an error for either variant
        let output = runner
            .execute(
                RemoteCommand::shell(format!("pidof {process} || true")),
                description,
            )
            .await?;
        pids.extend(parse_pids(&output, description)?);
    }
    let pids = dedup(pids);
    debug!("zygote pids: {pids:?}");

    if pids.is_empty() {
        return Err(InjectError::NoZygote);
    }
    Ok(pids)
}

/// Direct children of the zygotes, i.e. the running app processes.
async fn app_pids<B: DeviceBridge>(
    runner: &mut CommandRunner<B>,
    zygote_pids: &[Pid],
) -> Result<Vec<Pid>, InjectError> {
    let description = "Getting app PIDs from zygote";
    let zygote_list = zygote_pids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    let output = runner
        .execute(
            RemoteCommand::shell(format!(
                "echo \"{zygote_list}\" | xargs -n1 ps -o PID -P | grep -v PID || true"
            )),
            description,
        )
        .await?;
    let pids = dedup(parse_pids(&output, description)?);
    debug!("app pids: {pids:?}");
    Ok(pids)
}

async fn bind_mount_certs<B: DeviceBridge>(
    runner: &mut CommandRunner<B>,
    paths: &DevicePaths,
    pid: Pid,
    kind: &str,
) -> Result<(), InjectError> {
    runner
        .execute(
            RemoteCommand::shell(format!(
                "nsenter --mount=/proc/{pid}/ns/mnt -- /bin/mount --bind {} {}",
                paths.system_dir, paths.conscrypt_dir
            )),
            &format!("Injecting mount into {kind} PID {pid}"),
        )
        .await?;
    Ok(())
}

fn parse_pids(output: &str, description: &str) -> Result<Vec<Pid>, InjectError> {
    output
        .split_whitespace()
        .map(|token| {
            token
                .parse::<u32>()
                .map(Pid)
                .map_err(|_| InjectError::InvalidPid {
                    description: description.to_string(),
                    token: token.to_string(),
                })
        })
        .collect()
}

fn dedup(pids: Vec<Pid>) -> Vec<Pid> {
    let mut seen = HashSet::new();
    pids.into_iter().filter(|pid| seen.insert(*pid)).collect()
}

/// Single-quote `s` for the device shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
