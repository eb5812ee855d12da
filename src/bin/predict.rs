//! Headless risk prediction.
//!
//! Reads one clinical record as JSON and prints the diagnosis as JSON.
//!
//! # Usage
//!
//! ```bash
//! predict [--model-dir <dir>] [<input.json>]   # stdin when no file is given
//! ```
//!
//! Input uses the field names of `RawClinicalInput`, e.g.
//! `{"age": 40, "sex": "M", "chest_pain": "ATA", "resting_bp": 120,
//!   "cholesterol": 200, "fasting_bs": 0, "resting_ecg": "Normal",
//!   "max_hr": 150, "exercise_angina": "N", "oldpeak": 1.0, "st_slope": "Up"}`
//!
//! Exit codes: 0 success, 1 invalid input or unusable model, 2 usage error.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cardiorisk::adapters::artifacts::ArtifactLoader;
use cardiorisk::adapters::sanitize::SanitizingMakeWriter;
use cardiorisk::application::ArtifactPredictionService;
use cardiorisk::config::AppConfig;
use cardiorisk::RawClinicalInput;

struct Args {
    model_dir: Option<PathBuf>,
    input: Option<PathBuf>,
}

fn usage() -> String {
    "Usage: predict [--model-dir <dir>] [<input.json>]".to_string()
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        model_dir: None,
        input: None,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--model-dir" => parsed.model_dir = Some(PathBuf::from(args.next().ok_or_else(usage)?)),
            "-h" | "--help" => return Err(usage()),
            _ if arg.starts_with("--") => return Err(usage()),
            _ if parsed.input.is_none() => parsed.input = Some(PathBuf::from(arg)),
            _ => return Err(usage()),
        }
    }

    Ok(parsed)
}

fn read_input(path: Option<&PathBuf>) -> Result<RawClinicalInput> {
    let raw = match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {path:?}"))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    RawClinicalInput::from_json(&raw).context("Invalid clinical record")
}

fn run(args: Args) -> Result<()> {
    let mut config = AppConfig::from_env();
    if let Some(dir) = args.model_dir {
        config.model_path = dir;
    }

    let input = read_input(args.input.as_ref())?;

    let artifacts = ArtifactLoader::from_config(&config)
        .load(&config.model_path)
        .with_context(|| format!("Failed to load model from {:?}", config.model_path))?;
    let service = ArtifactPredictionService::from_artifacts(artifacts)?;

    let diagnosis = service.predict(&input)?;
    println!("{}", serde_json::to_string_pretty(&diagnosis)?);
    Ok(())
}

fn main() -> ExitCode {
    // stdout carries the JSON result; logs go to stderr.
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
