//! sb-loader - load every capture of a document and stream its planes.

use std::ops::ControlFlow;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sb_loader::{
    CaptureLabels, CaptureLoader, CaptureReader, Config, LoadEvent, LoadSummary, ManifestReader,
    OutputFormat,
};

fn main() -> ExitCode {
    let config = Config::parse();
    init_logging(&config);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let reader = match ManifestReader::open(&config.file, config.error_policy()) {
        Ok(reader) => reader,
        Err(e) => {
            error!("Failed to open {}: {}", config.file.display(), e);
            return ExitCode::FAILURE;
        }
    };
    info!("opened {}", reader.identifier());

    match config.format {
        OutputFormat::Text => run_text(&config, &reader),
        OutputFormat::Json => run_json(&config, &reader),
    }
}

/// Initialize the tracing/logging subsystem. Logs go to stderr.
fn init_logging(config: &Config) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Text Output
// =============================================================================

fn run_text(config: &Config, reader: &ManifestReader) -> ExitCode {
    println!("Slidebook loader v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", config.file.display());

    match reader.capture_count() {
        Ok(count) => println!("captures: {}", count),
        Err(e) => {
            println!("Failed with error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let options = config.load_options();
    let loader = CaptureLoader::new(reader, options);
    let mut progress = TextProgress::default();
    let result = loader.run_with(|event| {
        progress.print(event);
        ControlFlow::Continue(())
    });

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            println!("Failed with error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    print_failures(&summary);
    println!("done");
    exit_code(&summary)
}

/// Prints loader events, keeping the labels of the current capture.
#[derive(Default)]
struct TextProgress {
    labels: CaptureLabels,
}

impl TextProgress {
    fn print(&mut self, event: LoadEvent<'_>) {
        match event {
            LoadEvent::Capture(metadata) => {
                self.labels = metadata.labels();
                print!("{}", metadata.detail());
            }
            LoadEvent::Position { metadata, position } => {
                println!("{}", metadata.header(position));
            }
            LoadEvent::Stack {
                metadata,
                position,
                timepoint,
                channel,
                ..
            } => {
                println!(
                    "read buffer capture: {} position: {} time: {} channel: {}",
                    self.labels.capture.format(metadata.capture_index),
                    self.labels.position.format(position),
                    self.labels.timepoint.format(timepoint),
                    self.labels.channel.format(channel)
                );
            }
        }
    }
}

fn print_failures(summary: &LoadSummary) {
    for capture in &summary.captures {
        if let Some(ref e) = capture.error {
            println!(
                "capture {} aborted: {}",
                u64::from(capture.metadata.capture_index) + 1,
                e
            );
        }
        for stream in &capture.streams {
            for failure in &stream.failures {
                let reason = failure
                    .error
                    .as_ref()
                    .map_or_else(|| "read failed".to_string(), |e| e.to_string());
                println!(
                    "failed plane capture: {} position: {} time: {} channel: {} z: {} ({})",
                    u64::from(stream.capture) + 1,
                    u64::from(stream.position) + 1,
                    u64::from(failure.coord.timepoint) + 1,
                    u64::from(failure.coord.channel) + 1,
                    failure.coord.z,
                    reason
                );
            }
        }
    }
}

// =============================================================================
// JSON Output
// =============================================================================

fn run_json(config: &Config, reader: &ManifestReader) -> ExitCode {
    let loader = CaptureLoader::new(reader, config.load_options());
    let summary = match loader.run() {
        Ok(summary) => summary,
        Err(e) => {
            let json = serde_json::json!({ "error": e.to_string() });
            println!("{}", json);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize report: {}", e);
            return ExitCode::FAILURE;
        }
    }
    exit_code(&summary)
}

fn exit_code(summary: &LoadSummary) -> ExitCode {
    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
