//! Sense CLI - Command-line interface for Stress Sense
//!
//! Commands:
//! - init: Create the observation log if it does not exist
//! - score: Score a single image
//! - run: Score a stream of frames described on stdin (NDJSON)
//! - report: Aggregate statistics over the observation log
//! - doctor: Diagnose configuration and log health
//! - schema: Print the persisted log schema

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use stress_sense::logging::init_tracing;
use stress_sense::observation_log::COLUMNS;
use stress_sense::report::ReportEncoder;
use stress_sense::{
    DetectionError, EmotionDistribution, FrameAssessment, LogOutcome, LogSummary, ObservationLog,
    ReplaySource, SenseConfig, SenseError, StressProcessor, StressStatus, PRODUCER_NAME,
    SENSE_VERSION,
};

/// Sense - Frame-level stress classification from emotion and hair signals
#[derive(Parser)]
#[command(name = "sense")]
#[command(author = "Synheart AI Inc")]
#[command(version = SENSE_VERSION)]
#[command(about = "Score video frames into a stress status and keep an observation log", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Observation log path (overrides the config file)
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the observation log if it does not exist
    Init,

    /// Score a single image
    Score {
        /// Image file (PNG or JPEG)
        #[arg(short, long)]
        image: PathBuf,

        /// Emotion analyzer output for the image (use - for stdin).
        /// Without it the face is treated as not detected.
        #[arg(short, long)]
        emotions: Option<PathBuf>,

        /// Append the result to the observation log
        #[arg(long)]
        append: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score frames listed on stdin, one {"image": ..., "emotions": ...} per line
    Run {
        /// Persist every Nth frame (overrides the config file)
        #[arg(long)]
        sample_every: Option<u64>,

        /// Do not write to the observation log
        #[arg(long)]
        no_log: bool,

        /// Buffer output instead of flushing after each frame
        #[arg(long)]
        no_flush: bool,
    },

    /// Aggregate statistics over the observation log
    Report {
        /// Number of most recent observations to show
        #[arg(long)]
        recent: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and log health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the persisted log schema
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "warn" });

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

fn run(cli: Cli) -> Result<(), SenseCliError> {
    let config_path = cli.config.clone();

    // Doctor reports a broken config instead of failing on it
    if let Commands::Doctor { json } = cli.command {
        return cmd_doctor(config_path.as_deref(), cli.log, json);
    }

    let config = load_config(config_path.as_deref(), cli.log)?;

    match cli.command {
        Commands::Init => cmd_init(&config),

        Commands::Score {
            image,
            emotions,
            append,
            json,
        } => cmd_score(&config, &image, emotions.as_deref(), append, json),

        Commands::Run {
            sample_every,
            no_log,
            no_flush,
        } => {
            let mut config = config;
            if let Some(n) = sample_every {
                config.sample_every = n;
            }
            cmd_run(&config, no_log, !no_flush)
        }

        Commands::Report { recent, json } => {
            cmd_report(&config, recent.unwrap_or(config.recent_window), json)
        }

        Commands::Schema { json } => cmd_schema(json),

        Commands::Doctor { .. } => Ok(()),
    }
}

fn load_config(path: Option<&Path>, log_override: Option<PathBuf>) -> Result<SenseConfig, SenseCliError> {
    let mut config = match path {
        Some(path) => SenseConfig::load(path)?,
        None => SenseConfig::default(),
    };
    if let Some(log) = log_override {
        config.log_path = log;
    }
    Ok(config)
}

fn cmd_init(config: &SenseConfig) -> Result<(), SenseCliError> {
    let log = ObservationLog::new(config.log_path.clone());
    if log.init()? {
        println!("Created observation log at {}", log.path().display());
    } else {
        println!("Observation log already exists at {}", log.path().display());
    }
    Ok(())
}

fn cmd_score(
    config: &SenseConfig,
    image_path: &Path,
    emotions: Option<&Path>,
    append: bool,
    json: bool,
) -> Result<(), SenseCliError> {
    let frame = image::open(image_path).map_err(SenseError::from)?.to_rgb8();

    let mut single = config.clone();
    single.sample_every = 1;
    let mut processor = StressProcessor::with_config(ReplaySource::new(), &single)?;
    if !append {
        processor = processor.without_log();
    }

    if let Some(path) = emotions {
        let raw = read_input(path)?;
        processor
            .source_mut()
            .push(EmotionDistribution::from_json(&raw));
    }

    let processed = processor.process_frame(&frame);
    let output = FrameOutput::new(image_path, processed.frame_index, processed.assessment, &processed.log);

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_assessment(&output.assessment);
        if let Some(err) = &output.log_error {
            println!("Log:      append failed ({err})");
        } else if output.logged {
            println!("Log:      appended to {}", config.log_path.display());
        }
    }

    match processed.log {
        LogOutcome::Failed(e) => Err(e.into()),
        _ => Ok(()),
    }
}

fn cmd_run(config: &SenseConfig, no_log: bool, flush: bool) -> Result<(), SenseCliError> {
    let mut processor = StressProcessor::with_config(ReplaySource::new(), config)?;
    if no_log {
        processor = processor.without_log();
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let request: FrameRequest = serde_json::from_str(trimmed).map_err(|e| {
            SenseCliError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;

        let frame = image::open(&request.image).map_err(SenseError::from)?.to_rgb8();

        let emotions = match request.emotions {
            Some(value) => EmotionDistribution::from_value(value),
            None => Err(DetectionError::NoFace),
        };
        processor.source_mut().push(emotions);

        let processed = processor.process_frame(&frame);
        let output = FrameOutput::new(
            &request.image,
            processed.frame_index,
            processed.assessment,
            &processed.log,
        );

        writeln!(stdout, "{}", serde_json::to_string(&output)?)?;
        if flush {
            stdout.flush()?;
        }
    }

    stdout.flush()?;
    Ok(())
}

fn cmd_report(config: &SenseConfig, recent: usize, json: bool) -> Result<(), SenseCliError> {
    let log = ObservationLog::new(config.log_path.clone());
    let observations = log.read_all()?;
    let summary = LogSummary::from_observations(&observations, recent);

    if json {
        let encoder = ReportEncoder::new();
        println!(
            "{}",
            encoder.encode_to_json(&log.path().display().to_string(), summary)?
        );
        return Ok(());
    }

    println!("Stress Report");
    println!("=============");
    println!("Log: {}", log.path().display());

    if summary.is_empty() {
        println!("\nNo observations recorded yet.");
        return Ok(());
    }

    println!("Total observations:  {}", summary.total_observations);
    if let Some(mean) = summary.mean_total_score {
        println!("Mean total score:    {:.1}", mean);
    }
    if let Some(latest) = summary.latest_status {
        println!("Latest status:       {}", latest);
    }
    println!("High stress entries: {}", summary.high_stress_count);

    println!("\nBy status:");
    for status in StressStatus::ALL {
        println!(
            "  {:<13} {:>5}  [{}] {}",
            status.as_str(),
            summary.count(status),
            format_range(status),
            status.guidance()
        );
    }

    println!("\nLast {} observations:", summary.recent.len());
    println!("  {}", COLUMNS.join(" | "));
    for obs in &summary.recent {
        println!(
            "  {} | {} | {} | {} | {} | {} | {}",
            obs.waktu.format(stress_sense::types::TIMESTAMP_FORMAT),
            obs.ekspresi,
            obs.skor_ekspresi,
            obs.rambut,
            obs.skor_rambut,
            obs.total_skor,
            obs.status
        );
    }

    Ok(())
}

fn cmd_doctor(config_path: Option<&Path>, log_override: Option<PathBuf>, json: bool) -> Result<(), SenseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "sense_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Stress Sense version {}", SENSE_VERSION),
    });

    let config = match load_config(config_path, log_override.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: match config_path {
                    Some(path) => format!(
                        "Config {} valid (sample every {} frames)",
                        path.display(),
                        config.sample_every
                    ),
                    None => "Using default configuration".to_string(),
                },
            });
            Some(config)
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid configuration: {}", CliError::from(e).message),
            });
            None
        }
    };

    let log_path = config
        .map(|c| c.log_path)
        .or(log_override)
        .unwrap_or_else(|| SenseConfig::default().log_path);
    let log = ObservationLog::new(log_path);

    if log.path().exists() {
        match log.read_all() {
            Ok(observations) => checks.push(DoctorCheck {
                name: "observation_log".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Log {} valid ({} observations)",
                    log.path().display(),
                    observations.len()
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "observation_log".to_string(),
                status: CheckStatus::Error,
                message: format!("Log {} unreadable: {}", log.path().display(), e),
            }),
        }
    } else {
        checks.push(DoctorCheck {
            name: "observation_log".to_string(),
            status: CheckStatus::Warning,
            message: format!(
                "Log {} does not exist (run 'sense init')",
                log.path().display()
            ),
        });
    }

    // Check stdin is available (for streaming mode)
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
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: SENSE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Sense Doctor Report");
        println!("===================");
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
        Err(SenseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(json: bool) -> Result<(), SenseCliError> {
    let columns: Vec<SchemaColumn> = COLUMNS
        .iter()
        .copied()
        .map(|name| SchemaColumn {
            name,
            kind: column_kind(name),
            description: column_description(name),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&columns)?);
        return Ok(());
    }

    println!("Observation log schema (CSV, header row, one observation per row)");
    println!();
    for (i, column) in columns.iter().enumerate() {
        println!(
            "{}. {:<14} {:<8} {}",
            i + 1,
            column.name,
            column.kind,
            column.description
        );
    }
    println!();
    println!("Status values:");
    for status in StressStatus::ALL {
        println!("  - {} (total {})", status, format_range(status));
    }

    Ok(())
}

// Helper functions

fn read_input(path: &Path) -> Result<String, SenseCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn print_assessment(assessment: &FrameAssessment) {
    println!(
        "Ekspresi: {} (Skor: {})",
        assessment.emotion.label, assessment.emotion.score
    );
    println!(
        "Rambut:   {} (Skor: {}, edge density {:.4})",
        assessment.hair.label, assessment.hair.score, assessment.hair.edge_density
    );
    println!(
        "Status:   {} (Total: {}) - {}",
        assessment.status,
        assessment.total_score,
        assessment.status.guidance()
    );
}

fn format_range(status: StressStatus) -> String {
    match status.score_range() {
        (low, Some(high)) => format!("{low}-{high}"),
        (low, None) => format!("{low}+"),
    }
}

fn column_kind(name: &str) -> &'static str {
    match name {
        "skor_ekspresi" | "skor_rambut" | "total_skor" => "integer",
        _ => "string",
    }
}

fn column_description(name: &str) -> &'static str {
    match name {
        "waktu" => "Timestamp, YYYY-MM-DD HH:MM:SS",
        "ekspresi" => "Emotion label",
        "skor_ekspresi" => "Emotion sub-score",
        "rambut" => "Hair label",
        "skor_rambut" => "Hair sub-score",
        "total_skor" => "skor_ekspresi + skor_rambut",
        "status" => "Stress status",
        _ => "",
    }
}

// Input/output records

#[derive(Deserialize)]
struct FrameRequest {
    image: PathBuf,
    #[serde(default)]
    emotions: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct FrameOutput {
    frame_index: u64,
    image: String,
    assessment: FrameAssessment,
    logged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_error: Option<String>,
}

impl FrameOutput {
    fn new(image: &Path, frame_index: u64, assessment: FrameAssessment, log: &LogOutcome) -> Self {
        Self {
            frame_index,
            image: image.display().to_string(),
            assessment,
            logged: matches!(log, LogOutcome::Appended(_)),
            log_error: match log {
                LogOutcome::Failed(e) => Some(e.to_string()),
                _ => None,
            },
        }
    }
}

// Error types

#[derive(Debug)]
enum SenseCliError {
    Io(io::Error),
    Sense(SenseError),
    Json(serde_json::Error),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for SenseCliError {
    fn from(e: io::Error) -> Self {
        SenseCliError::Io(e)
    }
}

impl From<SenseError> for SenseCliError {
    fn from(e: SenseError) -> Self {
        SenseCliError::Sense(e)
    }
}

impl From<serde_json::Error> for SenseCliError {
    fn from(e: serde_json::Error) -> Self {
        SenseCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SenseCliError> for CliError {
    fn from(e: SenseCliError) -> Self {
        match e {
            SenseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SenseCliError::Sense(e) => {
                let (code, hint) = match &e {
                    SenseError::Config(_) => ("CONFIG_ERROR", "Check the TOML configuration file"),
                    SenseError::Image(_) => ("IMAGE_ERROR", "Use a PNG or JPEG frame"),
                    SenseError::SchemaMismatch { .. } | SenseError::CorruptRecord { .. } => {
                        ("LOG_ERROR", "Run 'sense doctor' to inspect the observation log")
                    }
                    _ => ("IO_ERROR", "Check file paths and permissions"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            SenseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SenseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            SenseCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each line must be {\"image\": path, \"emotions\": object or null}".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct SchemaColumn {
    name: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    description: &'static str,
}

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
