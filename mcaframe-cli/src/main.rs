//! MCA list-mode converter CLI application.
//!
//! Converts raw 14-byte record files into frame-indexed columns and inspects
//! both raw and converted data.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use mcaframe_core::decoder::record_count;
use mcaframe_core::flags::Describe;
use mcaframe_core::{
    convert, output, ColumnStore, ConvertOptions, FieldOrder, FrameReader, MemoryStore,
    RecordReader,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Frame-segmenting converter for CAEN MCA list-mode files.
#[derive(Parser, Debug)]
#[command(name = "mcaframe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a raw record file into frame-indexed columns
    Convert(ConvertArgs),
    /// List the events of each frame in a converted container
    Frames(FramesArgs),
    /// Print raw records with their running frame number and flags
    Dump(DumpArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Input raw record file (.dat)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file path (.mcaf, .csv)
    ///
    /// The output format is determined by the file extension:
    /// - .mcaf: Binary container with event columns and frame index
    /// - .csv: Comma-separated event list (human-readable)
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Field order for CSV output.
    ///
    /// Comma-separated subset of n (frame number), t (trigger time),
    /// f (frame time), e (energy), x (extras).
    #[arg(short, long, default_value = "n,t,f,e,x")]
    fields: String,

    /// Also write a per-frame summary CSV to this path
    #[arg(long, value_name = "PATH")]
    frames_csv: Option<PathBuf>,

    /// Records decoded per read chunk
    #[arg(long, default_value_t = convert::DEFAULT_CHUNK_RECORDS)]
    chunk_records: usize,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct FramesArgs {
    /// Converted container (.mcaf)
    #[arg(value_name = "STORE")]
    store: PathBuf,

    /// Only show this frame
    #[arg(short, long)]
    frame: Option<usize>,

    /// Print frame headers without their events
    #[arg(long)]
    summary: bool,
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// Input raw record file (.dat)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Stop after this many records
    #[arg(short = 'n', long)]
    limit: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format)?;

    match cli.command {
        Command::Convert(args) => run_convert(args),
        Command::Frames(args) => run_frames(args),
        Command::Dump(args) => run_dump(args),
    }
}

fn init_logging(verbose: u8, format: LogFormat) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("mcaframe_core={level},mcaframe={level}")))
        .context("Invalid log filter")?;

    let subscriber = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
    Ok(())
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    let field_order = FieldOrder::from_str(&args.fields)
        .context("Invalid field format. Use comma-separated: n,t,f,e,x")?;

    // Validate the output format before doing any work
    let output_ext = args
        .output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mcaf")
        .to_lowercase();
    if output_ext != "mcaf" && output_ext != "csv" {
        anyhow::bail!(
            "Unsupported output format: .{}. Use .mcaf or .csv",
            output_ext
        );
    }

    let total_records = std::fs::metadata(&args.input)
        .map(|m| m.len() / mcaframe_core::RECORD_SIZE as u64)
        .unwrap_or(0);
    let progress = progress_bar(args.quiet, total_records)?;
    progress.set_message(format!(
        "Converting {:?}...",
        args.input.file_name().unwrap_or_default()
    ));

    let start_time = Instant::now();
    let options = ConvertOptions::default().with_chunk_records(args.chunk_records);
    let conversion = convert::convert_file_with_progress(&args.input, options, |n| {
        progress.set_position(n)
    })
    .with_context(|| format!("Failed to convert {}", args.input.display()))?;
    let convert_duration = start_time.elapsed();
    debug!(seconds = convert_duration.as_secs_f64(), "conversion finished");

    let store = &conversion.store;
    progress.set_message(format!(
        "Writing to {:?}...",
        args.output.file_name().unwrap_or_default()
    ));

    match output_ext.as_str() {
        "csv" => output::write_csv(&args.output, store.events(), field_order)
            .context("Failed to write CSV output")?,
        _ => output::write_store(&args.output, store).context("Failed to write container")?,
    }

    if let Some(frames_path) = &args.frames_csv {
        output::write_frames_csv(frames_path, store).context("Failed to write frame CSV")?;
    }

    let total_duration = start_time.elapsed();
    let stats = &conversion.stats;
    progress.finish_with_message(format!(
        "Done! Processed {} frames with {} detector events and {} other events in {:.2}s",
        store.frame_count(),
        stats.accepted,
        stats.records - stats.accepted - stats.markers,
        total_duration.as_secs_f64()
    ));
    info!(
        frames = store.frame_count(),
        events = stats.accepted,
        "conversion written"
    );

    if !args.quiet {
        let records_per_sec = stats.records as f64 / total_duration.as_secs_f64();
        eprintln!();
        eprintln!("Summary:");
        eprintln!("  Input:         {:?}", args.input);
        eprintln!("  Output:        {:?}", args.output);
        eprintln!("  Records:       {}", stats.records);
        eprintln!("  Frames:        {}", store.frame_count());
        eprintln!("  Events:        {}", stats.accepted);
        eprintln!("  Saturated:     {}", stats.rejected_saturated);
        eprintln!("  Non-positive:  {}", stats.rejected_non_positive);
        eprintln!("  Flagged:       {}", stats.rejected_marker_flag);
        if stats.before_first_marker > 0 {
            eprintln!("  Pre-marker:    {}", stats.before_first_marker);
        }
        if stats.backwards_time > 0 {
            eprintln!("  Time reversed: {}", stats.backwards_time);
        }
        eprintln!("  Duration:      {:.3}s", total_duration.as_secs_f64());
        eprintln!("  Throughput:    {:.0} records/s", records_per_sec);
    }

    Ok(())
}

fn progress_bar(quiet: bool, total_records: u64) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(total_records);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}")
            .context("Invalid progress template")?,
    );
    Ok(pb)
}

fn run_frames(args: FramesArgs) -> Result<()> {
    let store: MemoryStore = output::read_store(&args.store)
        .with_context(|| format!("Failed to read {}", args.store.display()))?;
    let reader = FrameReader::new(&store);

    println!("Number of events = {}", reader.event_count());
    println!("Number of frames = {}", reader.frame_count());

    let frames: Vec<usize> = match args.frame {
        Some(k) => vec![k],
        None => (0..reader.frame_count()).collect(),
    };

    for k in frames {
        let frame = reader.get_frame(k)?;
        println!(
            "Events for frame {} (number {}) starting at tick {}, {} ticks from start",
            frame.index, frame.frame_number, frame.start_time, frame.since_run_start
        );
        println!("This frame has {} events", frame.len());
        if !args.summary {
            for (time_offset, energy) in frame.iter() {
                println!("Time {}, energy {}", time_offset, energy);
            }
        }
    }
    Ok(())
}

fn run_dump(args: DumpArgs) -> Result<()> {
    let file = open_raw(&args.input)?;
    let mut records = RecordReader::new(file, convert::DEFAULT_CHUNK_RECORDS);
    let mut state = mcaframe_core::FrameState::default();
    let mut printed = 0u64;
    let limit = args.limit.unwrap_or(u64::MAX);

    'chunks: while let Some(chunk) = records.next_chunk()? {
        for record in chunk {
            if printed >= limit {
                break 'chunks;
            }
            (state, _) = mcaframe_core::step(state, &record);
            println!(
                "{}: {}  {}  {}  ({})",
                state.frame_number,
                record.trigger_time,
                record.trigger_time.wrapping_sub(state.frame_start_time) as i64,
                record.energy,
                Describe(record.extras)
            );
            printed += 1;
        }
    }
    Ok(())
}

fn open_raw(path: &Path) -> Result<File> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let len = file.metadata()?.len();
    record_count(len).with_context(|| format!("{} is not a raw record file", path.display()))?;
    Ok(file)
}
