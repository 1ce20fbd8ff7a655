/// TuneShift - command-line host for the audio operations
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tuneshift_audio::{
    run_operation_with_progress, InputStream, OperationReport, Progress, RunFailurePolicy,
    Runtime, Session, StageRole,
};
use tuneshift_core::Operation;

mod config;
mod error;

use config::CliConfig;
use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "tuneshift")]
#[command(about = "Convert, stretch, shift and reverse audio files", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./tuneshift.toml when present)
    #[arg(short, long, global = true, env = "TUNESHIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Scratch directory for stages that buffer to disk
    #[arg(long, global = true)]
    scratch_dir: Option<PathBuf>,

    /// Frames read from the input per block
    #[arg(long, global = true)]
    block_frames: Option<usize>,

    /// Keep partial output when processing fails mid-stream
    #[arg(long, global = true)]
    keep_partial: bool,

    /// Replace existing output files
    #[arg(short = 'y', long, global = true)]
    overwrite: bool,

    /// Print progress to stderr
    #[arg(long, global = true)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcode a file to WAV or FLAC
    Convert {
        /// Input audio file
        input: PathBuf,
        /// Output file, `.wav` or `.flac`
        output: PathBuf,
    },
    /// Change tempo without changing pitch
    Tempo {
        input: PathBuf,
        output: PathBuf,
        /// Speed factor, e.g. 1.5 for 50% faster
        factor: String,
    },
    /// Shift pitch without changing tempo
    Pitch {
        input: PathBuf,
        output: PathBuf,
        /// Shift in cents, e.g. 1200 for one octave up
        #[arg(allow_hyphen_values = true)]
        cents: String,
    },
    /// Play a file backwards
    Reverse { input: PathBuf, output: PathBuf },
    /// Apply several operations in order
    Process {
        input: PathBuf,
        /// Output `.wav` or `.flac` file, or a directory to use a derived WAV name
        output: PathBuf,
        /// Operation such as `tempo:1.25`, `pitch:-300` or `reverse`
        #[arg(short = 'o', long = "op", required = true, allow_hyphen_values = true)]
        operations: Vec<String>,
    },
    /// Show signal and encoding of a file
    Info { input: PathBuf },
    /// List available stages
    Stages,
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tuneshift=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings =
        CliConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = cli.scratch_dir {
        settings.operation.scratch_dir = dir;
    }
    if let Some(frames) = cli.block_frames {
        settings.operation.block_frames = frames;
    }
    if cli.keep_partial {
        settings.operation.run_failure = RunFailurePolicy::Warn;
    }
    settings.output.overwrite |= cli.overwrite;
    settings.output.progress |= cli.progress;
    tracing::debug!(?settings, "configuration loaded");

    let outcome = match cli.command {
        Commands::Convert { input, output } => single(&settings, &input, &output, &Operation::Convert),
        Commands::Tempo {
            input,
            output,
            factor,
        } => single(&settings, &input, &output, &Operation::tempo(factor)),
        Commands::Pitch {
            input,
            output,
            cents,
        } => single(&settings, &input, &output, &Operation::pitch(cents)),
        Commands::Reverse { input, output } => single(&settings, &input, &output, &Operation::Reverse),
        Commands::Process {
            input,
            output,
            operations,
        } => process(&settings, &input, &output, &operations),
        Commands::Info { input } => info(&input),
        Commands::Stages => {
            stages();
            Ok(())
        }
    };
    Ok(outcome?)
}

fn single(settings: &CliConfig, input: &Path, output: &Path, operation: &Operation) -> Result<()> {
    check_overwrite(settings, output)?;

    let transform = operation.transform();
    let report = run_operation_with_progress(
        input,
        output,
        transform.as_ref(),
        &settings.operation,
        progress_printer(settings.output.progress),
    )?;
    finish_progress(settings.output.progress);
    print_report(&report, output);
    Ok(())
}

fn process(settings: &CliConfig, input: &Path, output: &Path, operations: &[String]) -> Result<()> {
    let operations = operations
        .iter()
        .map(|op| op.parse::<Operation>())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let workdir = tempfile::Builder::new()
        .prefix("tuneshift-session-")
        .tempdir_in(ensure_dir(&settings.operation.scratch_dir)?)?;
    let mut session = Session::open(input, workdir.path(), settings.operation.clone())?;
    for operation in operations {
        let report = session.apply(operation)?;
        tracing::info!("{report}");
    }

    let output = if output.is_dir() {
        output.join(session.suggested_file_name("wav"))
    } else {
        output.to_path_buf()
    };
    check_overwrite(settings, &output)?;

    let report = session.export(&output)?;
    println!("history (most recent first):");
    for entry in session.history() {
        println!("  {entry}");
    }
    print_report(&report, &output);
    Ok(())
}

fn info(input: &Path) -> Result<()> {
    let stream = InputStream::open(input)?;
    println!("{}", input.display());
    println!("  encoding: {}", stream.encoding());
    println!("  signal:   {}", stream.signal());
    if let Some(seconds) = stream.signal().duration_secs() {
        println!("  duration: {seconds:.2}s");
    }
    stream.close();
    Ok(())
}

fn stages() {
    let registry = Runtime::global().registry();
    for kind in registry.kinds() {
        let role = match kind.role() {
            StageRole::Source => "source",
            StageRole::Transform => "transform",
            StageRole::Sink => "sink",
        };
        println!("{:<8} {:<10} {:<45} {}", kind.name(), role, kind.usage(), kind.description());
    }
}

fn check_overwrite(settings: &CliConfig, output: &Path) -> Result<()> {
    if output.exists() && !settings.output.overwrite {
        return Err(CliError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists (use --overwrite)", output.display()),
        )));
    }
    Ok(())
}

fn ensure_dir(dir: &Path) -> Result<&Path> {
    std::fs::create_dir_all(dir)?;
    Ok(dir)
}

fn progress_printer(enabled: bool) -> impl FnMut(&Progress) -> ControlFlow<()> {
    let mut last_percent = None;
    move |progress: &Progress| {
        if enabled {
            if let Some(fraction) = progress.fraction() {
                let percent = (fraction * 100.0) as u32;
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    eprint!("\r{percent:>3}%");
                    let _ = std::io::stderr().flush();
                }
            }
        }
        ControlFlow::Continue(())
    }
}

fn finish_progress(enabled: bool) {
    if enabled {
        eprintln!();
    }
}

fn print_report(report: &OperationReport, output: &Path) {
    println!("{report}");
    println!("wrote {} ({})", output.display(), report.output_signal);
}
