use chrono::Utc;
use clap::{Parser, Subcommand};
use ctsguard_core::pipeline::load_dataset;
use ctsguard_core::report::{render_html, render_summary, report_rows};
use ctsguard_core::row_log::read_rows;
use ctsguard_core::sink::write_atomic;
use ctsguard_core::*;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ctsguard")]
#[command(about = "Wrist posture monitor for carpal tunnel prevention", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor a telemetry stream and drive wrist feedback
    Monitor {
        /// Telemetry input: a file, serial device, or "-" for stdin
        #[arg(long, default_value = "-")]
        input: String,

        /// Fixed tick interval in seconds (replay); wall clock if omitted
        #[arg(long)]
        dt: Option<f64>,

        /// Write device commands here instead of stdout
        #[arg(long)]
        commands_out: Option<PathBuf>,

        /// Use static-hold pressures instead of typing pressures
        #[arg(long = "static")]
        static_hold: bool,

        /// Send a calibration request before monitoring
        #[arg(long)]
        calibrate: bool,
    },

    /// Estimate carpal tunnel pressure for one wrist posture
    Estimate {
        /// Flexion (+) / extension (-) angle in degrees
        #[arg(long, allow_hyphen_values = true)]
        flexion_extension: f64,

        /// Radial (+) / ulnar (-) deviation in degrees
        #[arg(long, allow_hyphen_values = true)]
        radial_ulnar: f64,

        /// Use static-hold pressures instead of typing pressures
        #[arg(long = "static")]
        static_hold: bool,
    },

    /// Regenerate the HTML report from the row log
    Report,

    /// List recent sessions
    History {
        /// Number of sessions to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show the effective configuration
    Config {
        /// Save it to the config file
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    ctsguard_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Commands::Monitor {
            input,
            dt,
            commands_out,
            static_hold,
            calibrate,
        } => cmd_monitor(
            config,
            data_dir,
            &input,
            dt,
            commands_out,
            static_hold,
            calibrate,
        ),
        Commands::Estimate {
            flexion_extension,
            radial_ulnar,
            static_hold,
        } => cmd_estimate(&config, flexion_extension, radial_ulnar, static_hold),
        Commands::Report => cmd_report(&config, &data_dir),
        Commands::History { limit } => cmd_history(&data_dir, limit),
        Commands::Config { write } => cmd_config(&config, cli.config.as_deref(), write),
    }
}

fn cmd_monitor(
    mut config: Config,
    data_dir: PathBuf,
    input: &str,
    dt: Option<f64>,
    commands_out: Option<PathBuf>,
    static_hold: bool,
    calibrate: bool,
) -> Result<()> {
    if static_hold {
        config.estimator.typing = false;
    }
    if let Some(dt) = dt {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(Error::Config(format!("--dt must be a positive number, got {}", dt)));
        }
    }

    std::fs::create_dir_all(&data_dir)?;

    let reader: Box<dyn BufRead> = if input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(input)
            .map_err(|e| Error::TransportUnavailable(format!("{}: {}", input, e)))?;
        Box::new(BufReader::new(file))
    };
    let mut source = ReaderSource::new(reader);

    let writer: Box<dyn Write> = match &commands_out {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };
    let mut commands = WriterCommandSink::new(writer);

    let sink = FileSink::new(&data_dir);
    let mut monitor = Monitor::from_config(&config, sink, Utc::now())?;

    if calibrate {
        monitor.request_calibration(&mut commands)?;
    }

    let observe = |report: &MonitorTick| {
        let Some(outcome) = report.classification else {
            return;
        };
        if outcome.zone_changed() {
            tracing::info!(
                "Zone {} -> {} (pressure {:.2} kPa)",
                outcome.previous_zone,
                outcome.zone,
                report.pressure.unwrap_or_default()
            );
        }
        if outcome.deep_red && outcome.zone_changed() {
            tracing::warn!("Pressure in deep red range");
        }
        if let Some(event) = outcome.event.filter(|e| e.is_sustained()) {
            tracing::info!("{:?} at dwell {:.1}s", event, outcome.dwell_seconds);
        }
    };

    let run_result = match dt {
        Some(dt) => {
            let mut clock = FixedStepClock::new(dt, Utc::now());
            monitor.run(&mut source, &mut commands, &mut clock, observe)
        }
        None => {
            let mut clock = WallClock::new();
            monitor.run(&mut source, &mut commands, &mut clock, observe)
        }
    };

    // The session ends the same way whether the source closed or failed
    if let Err(e) = &run_result {
        tracing::error!("Telemetry source failed, ending session: {}", e);
    }
    let ticks = monitor.tick_count();

    if let Some(command) = monitor.shutdown_command() {
        if let Err(e) = commands.send(command) {
            tracing::warn!("Could not silence device: {}", e);
        }
    }

    let end = monitor.finish(Utc::now());

    eprintln!();
    eprint!("{}", render_summary(&end.record.summary));
    eprintln!("  Ticks: {}", ticks);
    eprintln!("  Rows logged: {}", end.record.rows_logged);
    eprintln!("  Data: {}", data_dir.display());

    if !end.errors.is_empty() {
        eprintln!("Some session artifacts could not be written:");
        for error in &end.errors {
            eprintln!("  - {}", error);
        }
    }

    run_result.map(|_| ())
}

fn cmd_estimate(
    config: &Config,
    flexion_extension: f64,
    radial_ulnar: f64,
    static_hold: bool,
) -> Result<()> {
    let estimator = PressureEstimator::new(load_dataset(config)?);
    let typing = config.estimator.typing && !static_hold;

    let estimate = estimator.estimate(AngleSample::new(flexion_extension, radial_ulnar), typing)?;
    let zone = Zone::classify(
        estimate.pressure,
        config.classifier.medium_threshold,
        config.classifier.high_threshold,
    );

    let label = estimator
        .entry(&estimate)
        .map(|entry| entry.label.as_str())
        .unwrap_or("unknown");

    println!("{}: {:.2} kPa ({})", label, estimate.pressure, zone);
    Ok(())
}

fn cmd_report(config: &Config, data_dir: &Path) -> Result<()> {
    let csv_path = data_dir.join(sink::ROW_LOG_FILE);
    let report_path = data_dir.join(sink::REPORT_FILE);

    let rows = read_rows(&csv_path)?;
    if rows.is_empty() {
        println!("No rows logged yet - writing empty report.");
    }

    let report = report_rows(&rows, config.classifier.bad_posture_duration_threshold);
    write_atomic(&report_path, &render_html(&report))?;

    println!("✓ Report with {} rows written", report.len());
    println!("  HTML: {}", report_path.display());
    Ok(())
}

fn cmd_history(data_dir: &Path, limit: usize) -> Result<()> {
    let sessions = recent_sessions(&data_dir.join(sink::HISTORY_FILE), limit)?;

    if sessions.is_empty() {
        println!("No sessions recorded yet.");
        return Ok(());
    }

    for session in sessions {
        let summary = &session.summary;
        println!(
            "{}  {:>8.1}s total  {:>8.1}s bad ({:>5.1}%)  max {}  rows {}",
            session.ended_at.format("%Y-%m-%d %H:%M"),
            summary.total_time,
            summary.bad_posture_time,
            summary.bad_posture_percent,
            summary
                .max_pressure
                .map(|p| format!("{:.2} kPa", p))
                .unwrap_or_else(|| "n/a".into()),
            session.rows_logged
        );
    }

    Ok(())
}

fn cmd_config(config: &Config, path: Option<&Path>, write: bool) -> Result<()> {
    print!("{}", config.to_toml()?);

    if write {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Config::default_config_path);
        config.save_to(&path)?;
        println!("\n✓ Config saved to {}", path.display());
    }

    Ok(())
}
