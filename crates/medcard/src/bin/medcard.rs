use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use medcard::envelope::PresentationContext;
use medcard::print::{IssueConfig, PrintError};
use medcard::qr::{self, QrSymbolCodec};
use medcard::scanner::{
    interpret, Clock, HistoryError, HistoryStore, ManualClock, ResultHandler, ScannerConfig,
    ScannerConfigError, ScannerSession, SequenceBackend, SequenceDevice, SequenceLoadError,
    SessionState, Silent, SystemClock, TerminalBell,
};
use medcard::EmergencyPayload;

#[derive(Parser, Debug)]
#[command(name = "medcard", version, about = "Issue and read emergency medical ID codes")]
struct Cli {
    /// Log verbosity: -v info, -vv debug, -vvv trace.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a payload JSON file into envelope text and, optionally, a PNG code.
    Encode(EncodeArgs),
    /// Interpret envelope text or the code in an image.
    Decode(DecodeArgs),
    /// Replay a directory of frames through the scanner.
    Scan(ScanArgs),
    /// Inspect, export or clear the scan history.
    History(HistoryArgs),
}

#[derive(Args, Debug)]
struct EncodeArgs {
    payload: PathBuf,
    /// Write the code as PNG.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Presentation context; repeat for several. The strongest wins.
    #[arg(long = "context", value_enum)]
    contexts: Vec<ContextArg>,
    /// Issue config JSON (contexts, module_px, quiet_zone).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Pixels per module side.
    #[arg(long)]
    module_px: Option<u32>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ContextArg {
    Printed,
    InApp,
    PoorLighting,
}

impl From<ContextArg> for PresentationContext {
    fn from(value: ContextArg) -> Self {
        match value {
            ContextArg::Printed => PresentationContext::Printed,
            ContextArg::InApp => PresentationContext::InApp,
            ContextArg::PoorLighting => PresentationContext::PoorLighting,
        }
    }
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Text read from a code.
    #[arg(required_unless_present = "image", conflicts_with = "image")]
    text: Option<String>,
    /// Image containing a QR code.
    #[arg(long)]
    image: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Directory of .png/.jpg frames, replayed in file-name order.
    frames: PathBuf,
    /// Scanner config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
    /// History directory; overrides the config.
    #[arg(long)]
    history_dir: Option<PathBuf>,
    /// Ring the terminal bell on a successful scan.
    #[arg(long)]
    bell: bool,
}

#[derive(Args, Debug)]
struct HistoryArgs {
    /// History directory.
    #[arg(long, default_value = "medcard-history", global = true)]
    dir: PathBuf,
    #[command(subcommand)]
    action: HistoryAction,
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// Print the history as JSON, newest first.
    List,
    /// Write a date-stamped export into a directory.
    Export { out_dir: PathBuf },
    /// Delete all entries.
    Clear,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Print(#[from] PrintError),
    #[error(transparent)]
    Config(#[from] ScannerConfigError),
    #[error(transparent)]
    Frames(#[from] SequenceLoadError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("no readable code found")]
    NoCode,
    #[error("scan failed: {0}")]
    Scan(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_verbose: u8) {
    medcard::core::init_tracing(false);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: u8) {
    use log::LevelFilter;

    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(err) = medcard::core::init_with_level(level) {
        eprintln!("logger already installed: {err}");
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Encode(args) => run_encode(args),
        Command::Decode(args) => run_decode(args),
        Command::Scan(args) => run_scan(args),
        Command::History(args) => run_history(args),
    }
}

fn run_encode(args: EncodeArgs) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(&args.payload)?;
    let payload: EmergencyPayload = serde_json::from_str(&raw)?;

    let mut cfg = match &args.config {
        Some(path) => IssueConfig::load_json(path)?,
        None => IssueConfig::default(),
    };
    if !args.contexts.is_empty() {
        cfg.contexts = args.contexts.iter().copied().map(Into::into).collect();
    }
    if let Some(px) = args.module_px {
        cfg.module_px = px;
    }

    let card = qr::issue(&payload, &cfg)?;
    if let Some(out) = &args.out {
        card.write_png(out)?;
        log::info!("wrote {}", out.display());
    }
    println!("{}", card.text());
    Ok(())
}

fn run_decode(args: DecodeArgs) -> Result<(), CliError> {
    if let Some(path) = &args.image {
        let result = qr::read_image(path)?.ok_or(CliError::NoCode)?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    let text = args.text.unwrap_or_default();
    println!("{}", serde_json::to_string_pretty(&interpret(&text))?);
    Ok(())
}

fn run_scan(args: ScanArgs) -> Result<(), CliError> {
    let cfg = match &args.config {
        Some(path) => ScannerConfig::load_json(path)?,
        None => ScannerConfig::default(),
    };
    let history_dir = args.history_dir.clone().unwrap_or_else(|| cfg.history_dir());

    let device = SequenceDevice::from_dir("replay", frames_label(&args.frames), &args.frames)?;
    let max_ticks = device.frames.len() as u64;
    let feedback: Box<dyn medcard::scanner::Feedback> = if args.bell {
        Box::new(TerminalBell)
    } else {
        Box::new(Silent)
    };
    let handler = ResultHandler::new(HistoryStore::in_dir(history_dir), feedback);

    // Replay runs on a virtual clock so ticks do not wait on the wall clock.
    let clock = ManualClock::starting_at(SystemClock.now_ms());
    let mut session = ScannerSession::new(
        SequenceBackend::new(vec![device]),
        QrSymbolCodec,
        handler,
        cfg,
    )
    .with_clock(Box::new(clock));

    session.start();
    match session.run_until_settled(Some(max_ticks)) {
        SessionState::Decoded => {
            let result = session.last_result().ok_or(CliError::NoCode)?;
            println!("{}", serde_json::to_string_pretty(result)?);
            Ok(())
        }
        SessionState::Error => Err(CliError::Scan(
            session.error_message().unwrap_or_else(|| "unknown error".into()),
        )),
        _ => {
            session.stop();
            Err(CliError::NoCode)
        }
    }
}

fn frames_label(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frames".into())
}

fn run_history(args: HistoryArgs) -> Result<(), CliError> {
    let mut store = HistoryStore::in_dir(&args.dir);
    match args.action {
        HistoryAction::List => println!("{}", store.export_json()?),
        HistoryAction::Export { out_dir } => {
            std::fs::create_dir_all(&out_dir)?;
            let path = store.export_today(&out_dir)?;
            println!("{}", path.display());
        }
        HistoryAction::Clear => {
            store.clear()?;
            println!("history cleared");
        }
    }
    Ok(())
}
