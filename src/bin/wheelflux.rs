//! Wheel Flux CLI - Command-line interface for Wheel Flux
//!
//! Commands:
//! - replay: Run a recorded wheel/pointer timeline and print the deliveries
//! - validate: Validate a timeline against the input schema
//! - doctor: Diagnose configuration files and environment
//! - schema: Describe the input schema

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wheel_flux::host::StaticHost;
use wheel_flux::pipeline::{replay_timeline, ReplayReport};
use wheel_flux::schema::{RawEventAdapter, ReplayRecord, SCHEMA_VERSION};
use wheel_flux::types::{DeliveryRecord, ElementGeometry};
use wheel_flux::{HandlerConfig, WheelConfig, WheelError, PRODUCER_NAME, WHEEL_FLUX_VERSION};

/// Wheel Flux - Wheel-scroll normalization and input shaping
#[derive(Parser)]
#[command(name = "wheelflux")]
#[command(version = WHEEL_FLUX_VERSION)]
#[command(about = "Normalize and shape recorded wheel input", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded timeline and print delivered events
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Processor configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Handler configuration file (JSON: throttle, debounce, intent)
        #[arg(long)]
        handler_config: Option<PathBuf>,

        /// Line height in pixels for line-mode deltas
        #[arg(long, default_value = "16")]
        line_height: f64,

        /// Page height in pixels for page-mode deltas
        #[arg(long, default_value = "800")]
        page_height: f64,

        /// Time to keep the clock running after the last record
        #[arg(long, default_value = "1000")]
        settle_ms: u64,

        /// Emulate a platform without the modern wheel event
        #[arg(long)]
        legacy: bool,

        /// Print a replay summary to stderr
        #[arg(long)]
        summary: bool,
    },

    /// Validate a timeline against the input schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a processor configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a handler configuration file
        #[arg(long)]
        handler_config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print input schema information
    Schema {
        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one delivery per line)
    Ndjson,
    /// JSON array of deliveries
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

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

fn run(cli: Cli) -> Result<(), WheelCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
            handler_config,
            line_height,
            page_height,
            settle_ms,
            legacy,
            summary,
        } => cmd_replay(ReplayArgs {
            input,
            output,
            input_format,
            output_format,
            config,
            handler_config,
            geometry: ElementGeometry::new(line_height, page_height),
            settle_ms,
            legacy,
            summary,
        }),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor {
            config,
            handler_config,
            json,
        } => cmd_doctor(config.as_deref(), handler_config.as_deref(), json),

        Commands::Schema { json_schema } => cmd_schema(json_schema),
    }
}

struct ReplayArgs {
    input: PathBuf,
    output: PathBuf,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<PathBuf>,
    handler_config: Option<PathBuf>,
    geometry: ElementGeometry,
    settle_ms: u64,
    legacy: bool,
    summary: bool,
}

fn cmd_replay(args: ReplayArgs) -> Result<(), WheelCliError> {
    if !(args.geometry.line_height_px > 0.0 && args.geometry.page_height_px > 0.0) {
        return Err(WheelCliError::Wheel(WheelError::InvalidConfig(
            "line and page heights must be positive".to_string(),
        )));
    }

    let records = read_records(&args.input, &args.input_format)?;
    if records.is_empty() {
        return Err(WheelCliError::NoEvents);
    }

    let config = match &args.config {
        Some(path) => WheelConfig::from_json(&fs::read_to_string(path)?)?,
        None => WheelConfig::default(),
    };
    let handler_config = match &args.handler_config {
        Some(path) => HandlerConfig::from_json(&fs::read_to_string(path)?)?,
        None => HandlerConfig::default(),
    };

    let mut host = StaticHost::new(args.geometry);
    if args.legacy {
        host = host.legacy();
    }

    let report = replay_timeline(&records, &config, &handler_config, host, args.settle_ms)?;
    info!(
        instance = %report.instance_id,
        records = records.len(),
        deliveries = report.deliveries.len(),
        "replay finished"
    );

    if args.summary {
        print_summary(&report);
    }

    let output_data = format_output(&report.deliveries, &args.output_format)?;
    if args.output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(&args.output, output_data)?;
    }

    Ok(())
}

fn print_summary(report: &ReplayReport) {
    eprintln!("Replay Summary");
    eprintln!("==============");
    eprintln!("Instance:          {}", report.instance_id);
    eprintln!("Wheel events:      {}", report.wheel_events);
    eprintln!("Suppressed:        {}", report.suppressed);
    eprintln!("Default prevented: {}", report.default_prevented);
    eprintln!("Deliveries:        {}", report.deliveries.len());
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), WheelCliError> {
    let records = read_records(input, &input_format)?;

    let results = RawEventAdapter::validate_records(&records);
    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - results.len(),
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                event_id: r.event_id.clone(),
                error: r.result.as_ref().map(|e| e.to_string()).unwrap_or_default(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Record {} (index {}): {}",
                    err.event_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(WheelCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn check_file<T>(
    name: &str,
    path: &Path,
    parse: impl Fn(&str) -> Result<T, String>,
) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist", path.display()),
        };
    }

    match fs::read_to_string(path) {
        Ok(content) => match parse(&content) {
            Ok(_) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Ok,
                message: format!("{} is valid", path.display()),
            },
            Err(e) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Error,
                message: e,
            },
        },
        Err(e) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read {}: {}", path.display(), e),
        },
    }
}

fn cmd_doctor(
    config: Option<&Path>,
    handler_config: Option<&Path>,
    json: bool,
) -> Result<(), WheelCliError> {
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck {
            name: "version".to_string(),
            status: CheckStatus::Ok,
            message: format!("Wheel Flux version {}", WHEEL_FLUX_VERSION),
        },
        DoctorCheck {
            name: "schema_version".to_string(),
            status: CheckStatus::Ok,
            message: format!("Input schema: {}", SCHEMA_VERSION),
        },
    ];

    if let Some(path) = config {
        checks.push(check_file("config", path, |content| {
            let config = WheelConfig::from_json(content)
                .map_err(|e| format!("Invalid config JSON: {}", e))?;
            config
                .validate()
                .map_err(|e| format!("Invalid config: {}", e))
        }));
    }

    if let Some(path) = handler_config {
        checks.push(check_file("handler_config", path, |content| {
            HandlerConfig::from_json(content)
                .map_err(|e| format!("Invalid handler config JSON: {}", e))
        }));
    }

    // Replay reads timelines from stdin with `--input -`
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
            message: "stdin is a pipe (replay from stdin ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: WHEEL_FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Wheel Flux Doctor Report");
        println!("========================");
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
        Err(WheelCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(json_schema: bool) -> Result<(), WheelCliError> {
    if json_schema {
        println!("{}", serde_json::to_string_pretty(&input_json_schema())?);
        return Ok(());
    }

    println!("Input Schema: {}", SCHEMA_VERSION);
    println!();
    println!("Each record carries a timestamp, an optional element id (default 1)");
    println!("and a kind: wheel, pointer_enter, pointer_move or pointer_leave.");
    println!();
    println!("Wheel records carry native delta fields, resolved in this order:");
    println!("  1. detail              legacy; deltaY = detail");
    println!("  2. wheelDelta          legacy; deltaY = -wheelDelta");
    println!("  3. wheelDeltaY         legacy; deltaY = -wheelDeltaY");
    println!("  4. wheelDeltaX         legacy; deltaX = -wheelDeltaX");
    println!("  5. axis                legacy; vertical delta moves to X when");
    println!("                         axis == HORIZONTAL_AXIS (default 1)");
    println!("  6. deltaY / deltaX     modern; taken as-is");
    println!("  deltaMode              0 pixel, 1 line, 2 page");
    println!();
    println!("Pointer records carry pointerX and pointerY (enter and move).");
    println!("Wheel records may carry args, forwarded to every delivery.");
    Ok(())
}

fn input_json_schema() -> serde_json::Value {
    let number = serde_json::json!({ "type": "number" });
    serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "$id": SCHEMA_VERSION,
        "title": "Wheel Flux replay record",
        "type": "object",
        "required": ["timestamp"],
        "properties": {
            "event_id": { "type": "string" },
            "timestamp": { "type": "string", "format": "date-time" },
            "element": { "type": "integer", "minimum": 0, "default": 1 },
            "kind": {
                "type": "string",
                "enum": ["wheel", "pointer_enter", "pointer_move", "pointer_leave"],
                "default": "wheel"
            },
            "detail": number,
            "wheelDelta": number,
            "wheelDeltaY": number,
            "wheelDeltaX": number,
            "axis": { "type": "integer" },
            "HORIZONTAL_AXIS": { "type": "integer" },
            "deltaX": number,
            "deltaY": number,
            "deltaMode": { "type": "integer", "enum": [0, 1, 2] },
            "pointerX": number,
            "pointerY": number,
            "args": { "type": "array" }
        }
    })
}

// Helper functions

fn read_records(input: &Path, format: &InputFormat) -> Result<Vec<ReplayRecord>, WheelCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let records = match format {
        InputFormat::Ndjson => RawEventAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => RawEventAdapter::parse_array(&input_data)?,
    };
    Ok(records)
}

fn format_output(
    deliveries: &[DeliveryRecord],
    format: &OutputFormat,
) -> Result<String, WheelCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for delivery in deliveries {
                out.push_str(&serde_json::to_string(delivery)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string(deliveries)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(deliveries)? + "\n"),
    }
}

// Error handling

#[derive(Debug)]
enum WheelCliError {
    Io(io::Error),
    Wheel(WheelError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for WheelCliError {
    fn from(e: io::Error) -> Self {
        WheelCliError::Io(e)
    }
}

impl From<WheelError> for WheelCliError {
    fn from(e: WheelError) -> Self {
        WheelCliError::Wheel(e)
    }
}

impl From<serde_json::Error> for WheelCliError {
    fn from(e: serde_json::Error) -> Self {
        WheelCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<WheelCliError> for CliError {
    fn from(e: WheelCliError) -> Self {
        match e {
            WheelCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            WheelCliError::Wheel(e) => {
                let (code, hint) = match &e {
                    WheelError::InvalidConfig(_) => {
                        ("CONFIG_ERROR", "Run 'wheelflux doctor --config <file>'")
                    }
                    WheelError::InvalidEvent(_) => {
                        ("VALIDATION_ERROR", "Run 'wheelflux validate' for details")
                    }
                    _ => ("PARSE_ERROR", "Ensure input matches the wheel.replay.v1 schema"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            WheelCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            WheelCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            WheelCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            WheelCliError::DoctorFailed => CliError {
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
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    event_id: Option<String>,
    error: String,
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
