//! wowlog-convert-worker - batch converter for combat log files.
//!
//! Converts every `*.txt` combat log in an input directory to NDJSON in the
//! output directory, in parallel, skipping files already converted.
//!
//! Usage: wowlog-convert-worker <input_dir> <output_dir> [max_files]
//!
//! Output: JSON report to stdout with converted/skipped counts and
//! aggregated error messages.

use std::fs;
use std::path::PathBuf;

use tracing_subscriber::filter::EnvFilter;
use wowlog_core::pipeline::convert_files;

/// Initialize logging, writing to WOWLOG_LOG_PATH if set, otherwise stderr.
fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    // If WOWLOG_LOG_PATH is set, append to that file (shared with a parent process)
    if let Ok(path) = std::env::var("WOWLOG_LOG_PATH") {
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(file)
                .init();
            return;
        }
    }

    // Fallback to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn discover_inputs(input_dir: &PathBuf) -> std::io::Result<Vec<PathBuf>> {
    let mut inputs: Vec<PathBuf> = fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
        })
        .collect();
    inputs.sort();
    Ok(inputs)
}

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        tracing::error!("Usage: wowlog-convert-worker <input_dir> <output_dir> [max_files]");
        std::process::exit(1);
    }

    let input_dir = PathBuf::from(&args[1]);
    let output_dir = PathBuf::from(&args[2]);
    let max_files = args.get(3).and_then(|v| v.parse::<usize>().ok());

    if let Err(e) = fs::create_dir_all(&output_dir) {
        tracing::error!(error = %e, "Failed to create output dir");
        std::process::exit(1);
    }

    let inputs = match discover_inputs(&input_dir) {
        Ok(inputs) => inputs,
        Err(e) => {
            tracing::error!(error = %e, dir = %input_dir.display(), "Failed to read input dir");
            std::process::exit(1);
        }
    };
    tracing::info!(count = inputs.len(), dir = %input_dir.display(), "discovered log files");

    let timer = std::time::Instant::now();
    match convert_files(&inputs, &output_dir, None, max_files) {
        Ok(report) => {
            tracing::info!(
                converted = report.converted,
                skipped = report.skipped,
                elapsed_ms = timer.elapsed().as_millis() as u64,
                "done"
            );
            // Report JSON to stdout for the parent process
            if let Ok(json) = serde_json::to_string(&report) {
                println!("{}", json);
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Conversion error");
            std::process::exit(1);
        }
    }
}
