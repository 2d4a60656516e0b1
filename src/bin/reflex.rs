//! Reflex CLI - Command-line interface for Reflex Timer
//!
//! Commands:
//! - calibrate: Measure known sleeps and report timer accuracy
//! - session: Run an interactive keyboard reaction-time session
//! - stats: Summarize a JSON array of millisecond measurements
//! - doctor: Diagnose clock resolution and monotonicity

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use rand::thread_rng;
use reflex_timer::clock::duration_to_ms;
use reflex_timer::{
    Clock, ConfigError, MeasurementSeries, MonotonicClock, SessionConfig, SessionController,
    SessionReport, Statistics, TrialOutcome, PRODUCER_NAME, REFLEX_VERSION,
};

/// Reflex - High-precision reaction-time measurement
#[derive(Parser)]
#[command(name = "reflex")]
#[command(author = "Synheart AI Inc")]
#[command(version = REFLEX_VERSION)]
#[command(about = "Measure reaction times with a monotonic high-precision timer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure known sleep durations and report timer accuracy
    Calibrate {
        /// Sleep duration per measurement (milliseconds)
        #[arg(long, default_value = "100")]
        sleep_ms: u64,

        /// Number of measurements
        #[arg(long, default_value = "10")]
        iterations: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run an interactive reaction-time session (press Enter on GO)
    Session {
        /// Session configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of trials
        #[arg(long)]
        trials: Option<usize>,

        /// Shortest pre-stimulus delay (seconds)
        #[arg(long)]
        min_delay: Option<f64>,

        /// Longest pre-stimulus delay (seconds)
        #[arg(long)]
        max_delay: Option<f64>,

        /// Response window (milliseconds)
        #[arg(long)]
        timeout_ms: Option<f64>,

        /// Write the session report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize a JSON array of millisecond measurements
    Stats {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose clock resolution and monotonicity
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ReflexCliError> {
    match cli.command {
        Commands::Calibrate {
            sleep_ms,
            iterations,
            json,
        } => cmd_calibrate(sleep_ms, iterations, json),

        Commands::Session {
            config,
            trials,
            min_delay,
            max_delay,
            timeout_ms,
            output,
            json,
        } => {
            let mut session_config = match config {
                Some(path) => SessionConfig::load(&path)?,
                None => SessionConfig::default(),
            };
            if let Some(trials) = trials {
                session_config.trials = trials;
            }
            if let Some(min_delay) = min_delay {
                session_config.min_delay_secs = min_delay;
            }
            if let Some(max_delay) = max_delay {
                session_config.max_delay_secs = max_delay;
            }
            if let Some(timeout_ms) = timeout_ms {
                session_config.response_timeout_ms = timeout_ms;
            }
            cmd_session(session_config, output.as_deref(), json)
        }

        Commands::Stats { input, json } => cmd_stats(&input, json),

        Commands::Doctor { json } => cmd_doctor(json),
    }
}

fn cmd_calibrate(sleep_ms: u64, iterations: usize, json: bool) -> Result<(), ReflexCliError> {
    if iterations == 0 {
        return Err(ReflexCliError::NoMeasurements);
    }

    let mut series = MeasurementSeries::new();
    for _ in 0..iterations {
        series.start_measurement()?;
        thread::sleep(Duration::from_millis(sleep_ms));
        series.stop_measurement()?;
    }

    let statistics = series.statistics();
    let target = sleep_ms as f64;
    let report = CalibrationReport {
        target_ms: target,
        iterations,
        mean_error_ms: statistics.average.map(|avg| avg - target),
        worst_error_ms: series
            .history()
            .iter()
            .map(|ms| (ms - target).abs())
            .fold(None, |worst: Option<f64>, err| Some(worst.map_or(err, |w| w.max(err)))),
        statistics,
        measurements: series.history().to_vec(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Timer Calibration");
        println!("=================");
        println!("Target sleep:   {:.3} ms", report.target_ms);
        println!("Iterations:     {}", report.iterations);
        print_statistics(&report.statistics);
        if let Some(err) = report.mean_error_ms {
            println!("Mean error:     {:+.3} ms", err);
        }
        if let Some(err) = report.worst_error_ms {
            println!("Worst error:    {:.3} ms", err);
        }
    }

    Ok(())
}

fn cmd_session(config: SessionConfig, output: Option<&Path>, json: bool) -> Result<(), ReflexCliError> {
    if !atty::is(atty::Stream::Stdin) {
        log::warn!("stdin is not a terminal; responses are read from piped input");
    }

    let responses = spawn_response_reader();
    let mut rng = thread_rng();
    let mut session = SessionController::new(config)?;

    println!("Reaction Time Session");
    println!("=====================");
    println!("1. Wait for GO to appear");
    println!("2. Press Enter as fast as you can");
    println!("3. Pressing early does not count\n");

    'trials: while !session.is_complete() {
        let delay = session.config().sample_stimulus_delay(&mut rng)?;
        let deadline = Instant::now() + delay;

        // Presses during the pre-stimulus delay are not responses
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match responses.recv_timeout(remaining) {
                Ok(()) => {
                    if session.movement_detected().is_none() {
                        println!("Too early, wait for GO");
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => break 'trials,
            }
        }

        println!("*** GO! ***");
        io::stdout().flush()?;
        if !session.stimulus_presented() {
            continue;
        }

        // Sleep until a response arrives or the window closes
        while let Some(remaining_ms) = session.remaining_response_ms() {
            let window = Duration::try_from_secs_f64(remaining_ms / 1000.0).unwrap_or(Duration::MAX);
            let outcome = match responses.recv_timeout(window) {
                Ok(()) => session.movement_detected(),
                Err(RecvTimeoutError::Timeout) => session.poll_timeout(),
                Err(RecvTimeoutError::Disconnected) => break 'trials,
            };
            match outcome {
                Some(TrialOutcome::Responded { reaction_ms }) => {
                    println!("Reaction time: {:.1} ms", reaction_ms);
                    break;
                }
                Some(TrialOutcome::TimedOut { .. }) => {
                    println!("Too slow, no response");
                    break;
                }
                Some(TrialOutcome::Skipped { reason }) => {
                    println!("Trial skipped: {}", reason);
                    break;
                }
                None => {}
            }
        }
    }

    let report = session.report();

    if let Some(path) = output {
        fs::write(path, report.to_json_pretty()?)?;
    }

    if json {
        println!("{}", report.to_json_pretty()?);
    } else {
        print_session_report(&report);
    }

    Ok(())
}

/// Forward each line on stdin as one response event
fn spawn_response_reader() -> Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

fn cmd_stats(input: &Path, json: bool) -> Result<(), ReflexCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let values: Vec<f64> = serde_json::from_str(&input_data)?;
    let statistics = Statistics::from_values(&values);

    if json {
        println!("{}", serde_json::to_string_pretty(&statistics)?);
    } else {
        println!("Measurement Statistics");
        println!("======================");
        print_statistics(&statistics);
    }

    Ok(())
}

fn cmd_doctor(json: bool) -> Result<(), ReflexCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "reflex_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Reflex version {}", REFLEX_VERSION),
    });

    let clock = MonotonicClock::new();

    // Smallest observable step between consecutive clock reads
    let mut resolution: Option<Duration> = None;
    let mut previous = clock.now();
    let mut went_backwards = false;
    for _ in 0..100_000 {
        let current = clock.now();
        if current < previous {
            went_backwards = true;
        }
        let step = current.saturating_duration_since(previous);
        if !step.is_zero() {
            resolution = Some(resolution.map_or(step, |r| r.min(step)));
        }
        previous = current;
    }

    checks.push(if went_backwards {
        DoctorCheck {
            name: "monotonicity".to_string(),
            status: CheckStatus::Error,
            message: "Clock went backwards between consecutive reads".to_string(),
        }
    } else {
        DoctorCheck {
            name: "monotonicity".to_string(),
            status: CheckStatus::Ok,
            message: "100000 consecutive reads were non-decreasing".to_string(),
        }
    });

    checks.push(match resolution {
        Some(step) if step < Duration::from_micros(100) => DoctorCheck {
            name: "resolution".to_string(),
            status: CheckStatus::Ok,
            message: format!("Smallest observed step {:.6} ms", duration_to_ms(step)),
        },
        Some(step) => DoctorCheck {
            name: "resolution".to_string(),
            status: CheckStatus::Warning,
            message: format!(
                "Coarse clock: smallest observed step {:.6} ms",
                duration_to_ms(step)
            ),
        },
        None => DoctorCheck {
            name: "resolution".to_string(),
            status: CheckStatus::Error,
            message: "Clock did not advance".to_string(),
        },
    });

    let mut series = MeasurementSeries::new();
    series.start_measurement()?;
    thread::sleep(Duration::from_millis(10));
    let slept = series.stop_measurement()?;
    checks.push(DoctorCheck {
        name: "sleep_10ms".to_string(),
        status: if (slept - 10.0).abs() <= 5.0 {
            CheckStatus::Ok
        } else {
            CheckStatus::Warning
        },
        message: format!("10 ms sleep measured as {:.3} ms", slept),
    });

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive sessions available)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Warning,
            message: "stdin is a pipe (session responses will be scripted)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: REFLEX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Reflex Doctor Report");
        println!("====================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ReflexCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn fmt_ms(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |ms| format!("{:.1} ms", ms))
}

fn print_statistics(statistics: &Statistics) {
    println!("Count:          {}", statistics.count);
    println!("Average:        {}", fmt_ms(statistics.average));
    println!("Fastest:        {}", fmt_ms(statistics.min));
    println!("Slowest:        {}", fmt_ms(statistics.max));
}

fn print_session_report(report: &SessionReport) {
    println!("\nTest Results");
    println!("============");
    println!("Session:        {}", report.session_id);
    println!("Trials:         {}", report.trials.len());
    println!("Responded:      {}", report.responded);
    println!("Timed out:      {}", report.timed_out);
    println!("Skipped:        {}", report.skipped);
    print_statistics(&report.statistics);
}

// Error types

#[derive(Debug)]
enum ReflexCliError {
    Io(io::Error),
    Json(serde_json::Error),
    Timer(reflex_timer::TimerError),
    Config(ConfigError),
    NoMeasurements,
    DoctorFailed,
}

impl From<io::Error> for ReflexCliError {
    fn from(e: io::Error) -> Self {
        ReflexCliError::Io(e)
    }
}

impl From<serde_json::Error> for ReflexCliError {
    fn from(e: serde_json::Error) -> Self {
        ReflexCliError::Json(e)
    }
}

impl From<reflex_timer::TimerError> for ReflexCliError {
    fn from(e: reflex_timer::TimerError) -> Self {
        ReflexCliError::Timer(e)
    }
}

impl From<ConfigError> for ReflexCliError {
    fn from(e: ConfigError) -> Self {
        ReflexCliError::Config(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ReflexCliError> for CliError {
    fn from(e: ReflexCliError) -> Self {
        match e {
            ReflexCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ReflexCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Input must be a JSON array of numbers".to_string()),
            },
            ReflexCliError::Timer(e) => CliError {
                code: "TIMER_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            ReflexCliError::Config(e) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check delay bounds, timeout and trial count".to_string()),
            },
            ReflexCliError::NoMeasurements => CliError {
                code: "NO_MEASUREMENTS".to_string(),
                message: "At least one iteration is required".to_string(),
                hint: Some("Pass --iterations 1 or more".to_string()),
            },
            ReflexCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct CalibrationReport {
    target_ms: f64,
    iterations: usize,
    mean_error_ms: Option<f64>,
    worst_error_ms: Option<f64>,
    statistics: Statistics,
    measurements: Vec<f64>,
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
