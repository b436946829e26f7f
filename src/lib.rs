use anyhow::{Context, Error};
use clap::Parser;
use env_logger::Env;

pub mod config;
pub mod connection;
pub mod error;
pub mod inject;
pub mod output;
pub mod runner;

use crate::config::{Args, Config};
use crate::connection::AdbBridge;
use crate::output::Output;
use crate::runner::CommandRunner;

pub use crate::output::OutputCallback;

async fn run(args: Args, output: Output) -> Result<(), Error> {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("off")).try_init();

    let config = Config::from_args(args)?;
    let bridge = AdbBridge::new(config.adb.clone(), config.serial.clone(), config.timeout);
    let mut runner = CommandRunner::new(bridge, output);

    inject::check_devices(&mut runner, config.serial.as_deref()).await?;
    let report = inject::inject(&mut runner, &config.certificate, &config.paths)
        .await
        .with_context(|| {
            format!(
                "Failed to inject {}. The device may be left partially modified; a reboot restores the original certificates.",
                config.certificate.local_path
            )
        })?;

    runner.output().println(&format!(
        "System certificate injected ({} zygote, {} app processes)",
        report.zygote_pids.len(),
        report.app_pids.len()
    ));
    Ok(())
}

/// Run the injector with CLI arguments and optional output callback
///
/// # Example
/// ```no_run
/// // if the callback is None, stdout/stderr is going to be used
/// let result = certinject::run_with_callback(
///     ["9a5ba575.0"],
///     Some(Box::new(|output| {
///         print!("{}", output);
///     })),
/// );
/// ```
pub fn run_with_callback<'a>(
    args: impl IntoIterator<Item = &'a str>,
    callback: Option<OutputCallback>,
) -> Result<(), Error> {
    let output = match callback {
        Some(cb) => Output::Callback(cb),
        None => Output::Stdio,
    };

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?
        .block_on(async {
            let args = std::iter::once("certinject").chain(args);
            match Args::try_parse_from(args) {
                Ok(parsed_args) => run(parsed_args, output).await,
                Err(e) => {
                    output.eprintln(&e.to_string());
                    Ok(())
                }
            }
        })
}

/// Get the version of the injector
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Run the CLI injector
///
/// This function is public so the binary can call it, library users should use `run_with_callback`
/// instead.
pub async fn main_cli() -> Result<(), Error> {
    let args = Args::parse();
    run(args, Output::default()).await
}
