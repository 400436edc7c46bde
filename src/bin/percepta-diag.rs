use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};

use percepta_fusion::fixtures::{ExpectationDiff, Fixture, FixtureCatalog};
use percepta_fusion::{
    init_logging, AppConfig, JsonSignalParser, ManualClock, MemoryStore, Observation,
    ObservationSession, ObservationStore, SessionReport, Signal, SqliteStore,
};

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("percepta-diag error: {err:?}");
            ExitCode::from(1)
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "percepta-diag", about = "Fixture replay + observation history CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn execute(self) -> Result<()> {
        match self.command {
            Command::Run(args) => run_command(args),
            Command::History(args) => history_command(args),
            Command::List => list_command(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a fixture through capture, fusion and smoothing.
    Run(RunArgs),
    /// Print stored observations.
    History(HistoryArgs),
    /// List bundled fixtures.
    List,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Fixture name (under fixtures/) or path to a fixture JSON file.
    #[arg(long)]
    fixture: String,
    /// Device identifier recorded on the observation.
    #[arg(long, default_value = "fixture-device")]
    device: String,
    /// Firmware hash recorded on the observation.
    #[arg(long)]
    firmware: Option<String>,
    /// SQLite database used for history (in-memory when omitted).
    #[arg(long)]
    db: Option<PathBuf>,
    /// Persist the resulting observation.
    #[arg(long, default_value_t = false)]
    save: bool,
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
struct HistoryArgs {
    /// SQLite database to read.
    #[arg(long)]
    db: PathBuf,
    /// Restrict to one device (all devices when omitted).
    #[arg(long, default_value = "")]
    device: String,
    /// Maximum number of observations (0 = all).
    #[arg(long, default_value_t = 10)]
    limit: usize,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

fn run_command(args: RunArgs) -> Result<()> {
    let fixture = FixtureCatalog::default().load(&args.fixture)?;

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::default(),
    };
    fixture.apply_to(&mut config);

    let store: Arc<dyn ObservationStore> = match &args.db {
        Some(path) => Arc::new(
            SqliteStore::open(path).with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Arc::new(MemoryStore::new()),
    };

    let mut session = ObservationSession::new(
        Box::new(fixture.camera()?),
        Box::new(JsonSignalParser::new()),
        Arc::clone(&store),
        config,
    )
    .with_clock(Arc::new(ManualClock::new(Utc::now())));
    if let Some(firmware) = &args.firmware {
        session = session.with_firmware(firmware.clone());
    }

    let report = session
        .observe(&args.device)
        .with_context(|| format!("observing fixture '{}'", fixture.name))?;

    if args.save {
        store
            .save(&report.observation)
            .context("saving observation")?;
    }

    let verdict = fixture
        .expect
        .as_ref()
        .map(|expect| expect.verify(&report.observation));

    match args.format {
        OutputFormat::Json => print_run_json(&fixture, &report, verdict.as_ref())?,
        OutputFormat::Table => print_run_table(&fixture, &report, verdict.as_ref()),
    }

    if let Some(Err(diff)) = verdict {
        bail!(
            "fixture '{}' failed {} expectation(s)",
            fixture.name,
            diff.failures.len()
        );
    }
    Ok(())
}

fn history_command(args: HistoryArgs) -> Result<()> {
    if !args.db.exists() {
        bail!("database {} does not exist", args.db.display());
    }
    let store = SqliteStore::open(&args.db)?;
    let observations = store.query(&args.device, args.limit)?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&observations)?),
        OutputFormat::Table => {
            if observations.is_empty() {
                println!("No observations stored.");
            }
            for observation in &observations {
                print_observation(observation);
                println!();
            }
        }
    }
    Ok(())
}

fn list_command() -> Result<()> {
    let catalog = FixtureCatalog::default();
    let names = catalog.discover()?;
    if names.is_empty() {
        println!("No fixtures found in {}", catalog.root().display());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn print_run_json(
    fixture: &Fixture,
    report: &SessionReport,
    verdict: Option<&std::result::Result<(), ExpectationDiff>>,
) -> Result<()> {
    let expectations = match verdict {
        None => serde_json::Value::Null,
        Some(Ok(())) => serde_json::json!({ "passed": true }),
        Some(Err(diff)) => {
            let mut value = diff.to_json();
            value["passed"] = serde_json::Value::Bool(false);
            value
        }
    };
    let payload = serde_json::json!({
        "fixture": fixture.name,
        "frames_captured": report.frames_captured,
        "smoothing": report.outcome.to_string(),
        "observation": report.observation,
        "expectations": expectations,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn print_run_table(
    fixture: &Fixture,
    report: &SessionReport,
    verdict: Option<&std::result::Result<(), ExpectationDiff>>,
) {
    println!("Fixture: {}", fixture.name);
    println!(
        "Frames:  {}/{}   Smoothing: {}",
        report.frames_captured,
        fixture.frames.len(),
        report.outcome
    );
    println!();
    print_observation(&report.observation);

    match verdict {
        None => {}
        Some(Ok(())) => println!("\nExpectations: PASS"),
        Some(Err(diff)) => {
            println!("\nExpectations: FAIL");
            for failure in &diff.failures {
                println!(
                    "  {:<10} {:<9} expected {:<10} actual {}",
                    failure.signal,
                    failure.field,
                    failure.expected,
                    failure.actual.as_deref().unwrap_or("(missing)")
                );
            }
        }
    }
}

fn print_observation(observation: &Observation) {
    println!("Observation {}", observation.id);
    println!("  device:    {}", observation.device_id);
    if let Some(firmware) = &observation.firmware_hash {
        println!("  firmware:  {}", firmware);
    }
    println!("  timestamp: {}", observation.timestamp.to_rfc3339());

    for signal in &observation.signals {
        match signal {
            Signal::Led(led) => {
                let state = match (led.on, led.is_blinking()) {
                    (true, true) => format!("blink {:.2}Hz", led.blink_hz),
                    (true, false) => "on".to_string(),
                    (false, _) => "off".to_string(),
                };
                let color = if led.color.is_unset() {
                    "-".to_string()
                } else {
                    format!("#{:02x}{:02x}{:02x}", led.color.r, led.color.g, led.color.b)
                };
                println!(
                    "  LED      {:<10} {:<14} {:<8} conf {:.2}",
                    led.name, state, color, led.confidence
                );
            }
            Signal::Display(display) => {
                println!(
                    "  DISPLAY  {:<10} {:<23} conf {:.2}{}",
                    display.name,
                    format!("\"{}\"", display.text),
                    display.confidence,
                    if display.changed { "  [changed]" } else { "" }
                );
                for entry in &display.history {
                    println!("             +{:>5}ms  \"{}\"", entry.offset_ms, entry.text);
                }
            }
            Signal::BootTiming(boot) => {
                println!(
                    "  BOOT     {:<10} {:<23} conf {:.2}",
                    "timing",
                    format!("{}ms", boot.duration_ms),
                    boot.confidence
                );
            }
        }
    }
}
