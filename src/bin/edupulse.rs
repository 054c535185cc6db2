//! EduPulse CLI - Command-line interface for the attention engine
//!
//! Commands:
//! - replay: Run a recorded landmark session through the pipeline
//! - validate: Validate recorded-frame NDJSON
//! - doctor: Diagnose engine configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use edupulse_attention::detector::{distinct_frame_count, replay_pair, Recording};
use edupulse_attention::{
    AttentionTracker, EmissionRecord, SessionAggregator, TrackerConfig, TrackerError,
    ENGINE_VERSION, PRODUCER_NAME,
};

/// EduPulse - attention inference for webcam learning sessions
#[derive(Parser)]
#[command(name = "edupulse")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Turn recorded facial landmarks into attention signals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recorded landmark session through the pipeline
    Replay {
        /// Input recorded-frame NDJSON (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output emission-record path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Tracker configuration JSON file (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write a session report to this path after the replay
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Validate recorded-frame NDJSON
    Validate {
        /// Input recorded-frame NDJSON (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose engine configuration and environment
    Doctor {
        /// Check a tracker configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one emission record per line)
    Ndjson,
    /// JSON array of emission records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), EdupulseCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            output_format,
            config,
            report,
        } => cmd_replay(
            &input,
            &output,
            output_format,
            config.as_deref(),
            report.as_deref(),
        ),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    output_format: OutputFormat,
    config: Option<&Path>,
    report: Option<&Path>,
) -> Result<(), EdupulseCliError> {
    let recording = Recording::from_ndjson(&read_input(input)?)?;
    if recording.frames.is_empty() {
        return Err(EdupulseCliError::NoFrames);
    }

    let tracker_config = match config {
        Some(path) => TrackerConfig::from_json(&fs::read_to_string(path)?)?,
        None => TrackerConfig::default(),
    };

    let (source, detector) = replay_pair(recording);
    let mut tracker = AttentionTracker::new(tracker_config, source, detector)?;

    let aggregator = SessionAggregator::shared();
    tracker.subscribe(SessionAggregator::sink(&aggregator));

    tracker.run()?;

    let session_report = aggregator.borrow().report();
    let output_data = format_output(&session_report.timeline, &output_format)?;
    write_output(output, &output_data)?;

    if let Some(report_path) = report {
        write_output(report_path, &(session_report.to_json()? + "\n"))?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), EdupulseCliError> {
    let recording = Recording::from_ndjson(&read_input(input)?)?;
    let issues = recording.validate();
    // A frame can carry more than one issue; count offending frames, not issues.
    let invalid_frames = distinct_frame_count(&issues);

    let report = ValidationReport {
        total_frames: recording.frames.len(),
        valid_frames: recording.frames.len().saturating_sub(invalid_frames),
        invalid_frames,
        issues,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total frames:   {}", report.total_frames);
        println!("Valid frames:   {}", report.valid_frames);
        println!("Invalid frames: {}", report.invalid_frames);

        if !report.issues.is_empty() {
            println!("\nIssues:");
            for issue in &report.issues {
                println!("  - Frame {}: {}", issue.index, issue.error);
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(EdupulseCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), EdupulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{PRODUCER_NAME} {ENGINE_VERSION}"),
    });

    // Check configuration file if provided
    if let Some(config_path) = config {
        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(content) => match TrackerConfig::from_json(&content) {
                    Ok(parsed) => {
                        checks.push(DoctorCheck {
                            name: "config".to_string(),
                            status: CheckStatus::Ok,
                            message: format!(
                                "Config valid (ear range {}..{}, window {})",
                                parsed.ear_min, parsed.ear_max, parsed.history_size
                            ),
                        });
                    }
                    Err(e) => {
                        checks.push(DoctorCheck {
                            name: "config".to_string(),
                            status: CheckStatus::Error,
                            message: format!("Invalid config: {e}"),
                        });
                    }
                },
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Cannot read config file: {e}"),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist (defaults would apply)".to_string(),
            });
        }
    }

    // Check stdin is available (for replaying piped recordings)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("EduPulse Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(EdupulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, EdupulseCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), EdupulseCliError> {
    if output.to_string_lossy() == "-" {
        print!("{data}");
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn format_output(
    records: &[EmissionRecord],
    format: &OutputFormat,
) -> Result<String, EdupulseCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
    }
}

// Error types

#[derive(Debug)]
enum EdupulseCliError {
    Io(io::Error),
    Engine(TrackerError),
    Json(serde_json::Error),
    NoFrames,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for EdupulseCliError {
    fn from(e: io::Error) -> Self {
        EdupulseCliError::Io(e)
    }
}

impl From<TrackerError> for EdupulseCliError {
    fn from(e: TrackerError) -> Self {
        EdupulseCliError::Engine(e)
    }
}

impl From<serde_json::Error> for EdupulseCliError {
    fn from(e: serde_json::Error) -> Self {
        EdupulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EdupulseCliError> for CliError {
    fn from(e: EdupulseCliError) -> Self {
        match e {
            EdupulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EdupulseCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'edupulse doctor' to check the configuration".to_string()),
            },
            EdupulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EdupulseCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            EdupulseCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{count} frames failed validation"),
                hint: Some("Fix validation issues and retry".to_string()),
            },
            EdupulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_frames: usize,
    valid_frames: usize,
    invalid_frames: usize,
    issues: Vec<edupulse_attention::detector::RecordingIssue>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
