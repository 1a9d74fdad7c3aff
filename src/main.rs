//! frame-collector - collect frames from a data server or re-validate them.
//!
//! ```text
//! frame-collector [collect]
//! frame-collector validate <dir> [--samples N]
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use frame_collector::control::write_stdout_json;
use frame_collector::persist::FileSink;
use frame_collector::validation::{full_report, DEFAULT_SAMPLE_SIZE};
use frame_collector::{CollectionController, CollectorConfig};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const ENV_DATA_DIR: &str = "COLLECTOR_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "collected";

const USAGE: &str = "usage: frame-collector [collect]\n       frame-collector validate <dir> [--samples N]";

enum Command {
    Collect,
    Validate { dir: PathBuf, samples: usize },
    Help,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    match parse_args(env::args().skip(1))? {
        Command::Collect => collect().await,
        Command::Validate { dir, samples } => validate(dir, samples).await,
        Command::Help => {
            eprintln!("{USAGE}");
            Ok(())
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Command> {
    let command = match args.next().as_deref() {
        None | Some("collect") => Command::Collect,
        Some("-h" | "--help" | "help") => Command::Help,
        Some("validate") => {
            let dir = args.next().context(USAGE)?;
            let mut samples = DEFAULT_SAMPLE_SIZE;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--samples" => {
                        let value = args.next().context("--samples needs a value")?;
                        samples = value
                            .parse()
                            .with_context(|| format!("invalid --samples value {value:?}"))?;
                    }
                    other => bail!("unexpected argument {other:?}\n{USAGE}"),
                }
            }
            Command::Validate {
                dir: PathBuf::from(dir),
                samples,
            }
        }
        Some(other) => bail!("unknown command {other:?}\n{USAGE}"),
    };
    Ok(command)
}

async fn collect() -> Result<()> {
    let config = CollectorConfig::from_env().context("failed to load configuration")?;
    let data_dir = env::var(ENV_DATA_DIR).unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
    info!(
        addr = %config.address(),
        target = config.target_messages,
        data_dir = %data_dir,
        "starting frame-collector"
    );

    let sink = FileSink::create(&data_dir)
        .await
        .context("failed to open data directory")?;
    let controller = CollectionController::new(config, Arc::new(sink));

    controller
        .start()
        .await
        .context("failed to start collection")?;

    tokio::select! {
        () = controller.wait_until_idle() => {}
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("interrupt received, stopping collection"),
                Err(err) => error!(error = %err, "failed to listen for shutdown signal"),
            }
            controller.force_stop();
            controller.wait_until_idle().await;
        }
    }

    let status = controller.status();
    info!(
        total = status.total_messages,
        errors = status.errors.len(),
        "collection finished"
    );
    write_stdout_json(&status).context("failed to write status")?;
    Ok(())
}

async fn validate(dir: PathBuf, samples: usize) -> Result<()> {
    let config = CollectorConfig::from_env().context("failed to load configuration")?;
    let records = FileSink::load_records(&dir)
        .await
        .with_context(|| format!("failed to read records from {}", dir.display()))?;
    info!(records = records.len(), dir = %dir.display(), "validating stored records");

    let report = full_report(&records, &config.limits, samples);
    write_stdout_json(&report).context("failed to write report")?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_default_command_is_collect() {
        assert!(matches!(parse_args(args(&[])).unwrap(), Command::Collect));
        assert!(matches!(
            parse_args(args(&["collect"])).unwrap(),
            Command::Collect
        ));
    }

    #[test]
    fn test_validate_arguments() {
        match parse_args(args(&["validate", "data", "--samples", "3"])).unwrap() {
            Command::Validate { dir, samples } => {
                assert_eq!(dir, PathBuf::from("data"));
                assert_eq!(samples, 3);
            }
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(parse_args(args(&["validate"])).is_err());
        assert!(parse_args(args(&["validate", "d", "--samples", "x"])).is_err());
        assert!(parse_args(args(&["frobnicate"])).is_err());
    }
}
