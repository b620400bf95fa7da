//! mrcprep - Chinese MRC preprocessing CLI
//!
//! Streams newline-delimited JSON QA records through the preprocessing
//! stages: cleaning, paragraph selection, answer-span labeling, and
//! char-level feature alignment.
//!
//! # Usage
//!
//! ```bash
//! # Single stage
//! mrcprep clean < raw.jsonl > cleaned.jsonl
//!
//! # Paragraph selection with a 512-token budget
//! mrcprep rank --max-len 512 < cleaned.jsonl > ranked.jsonl
//!
//! # Answer-span labels for a training set
//! mrcprep label < ranked.jsonl > labeled.jsonl
//!
//! # The whole pipeline, 8-way parallel with a progress spinner
//! mrcprep run --max-len 512 --parallel 8 --progress -i raw.jsonl -o out.jsonl
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mrcprep::features::default_annotator;
use mrcprep::paragraph::SPLITTER;
use mrcprep::{
    process_stream, process_stream_parallel, FilterConfig, RankConfig, Stage, StageContext,
    StreamStats,
};

/// Chinese MRC preprocessing pipeline
#[derive(Parser)]
#[command(name = "mrcprep")]
#[command(
    author,
    version,
    about = "Chinese MRC preprocessing: cleaning, paragraph selection, answer-span labeling",
    long_about = r#"
mrcprep - Chinese MRC preprocessing pipeline

Streams one JSON record per line through the preprocessing stages and
writes one record per line. Lines that are not JSON objects are skipped;
records whose annotations do not resolve come out with empty labels.

STAGES:
  clean     - Unicode space / HTML / URL / repeat-spam removal
  filter    - unrelated-paragraph removal, supported-paragraph recovery
  rank      - relevance-ranked paragraph selection under a token budget
  label     - document concatenation and answer-span labeling
  features  - char-level POS/keyword/entity/match feature alignment

EXAMPLES:
  mrcprep clean < raw.jsonl > cleaned.jsonl
  mrcprep rank --max-len 512 < cleaned.jsonl > ranked.jsonl
  mrcprep run --parallel 8 --progress -i raw.jsonl -o out.jsonl
"#
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean text fields of each record
    #[command(visible_alias = "c")]
    Clean(IoArgs),

    /// Drop query-unrelated paragraphs, recover supporting paragraph ids
    Filter(FilterArgs),

    /// Select paragraphs under a token budget
    #[command(visible_alias = "r")]
    Rank(RankArgs),

    /// Concatenate content and resolve answer-span labels
    #[command(visible_alias = "l")]
    Label(IoArgs),

    /// Align char-level features
    #[command(visible_alias = "f")]
    Features(IoArgs),

    /// Run the whole pipeline
    Run(RankArgs),
}

#[derive(Args)]
struct IoArgs {
    /// Input file (defaults to stdin)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Number of parallel workers (1 = sequential)
    #[arg(short, long, default_value = "1")]
    parallel: usize,

    /// Records per parallel batch
    #[arg(long, default_value = "512")]
    batch_size: usize,

    /// Show a progress spinner on stderr
    #[arg(long)]
    progress: bool,

    /// Suppress the summary line
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args)]
struct FilterArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Drop paragraphs scoring at or below this against question+keyword
    #[arg(short, long, default_value = "0.0")]
    threshold: f64,
}

#[derive(Args)]
struct RankArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Passage token budget (title and splitters included)
    #[arg(short, long, default_value = "1024")]
    max_len: usize,

    /// Separator token between passage segments
    #[arg(long, default_value = SPLITTER)]
    splitter: String,

    /// Paragraph filter threshold (only used by `run`)
    #[arg(long, default_value = "0.0")]
    filter_threshold: f64,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Clean(io) => run_stages(&io, &[Stage::Clean], Configs::default()),
        Commands::Filter(args) => {
            let cfg = Configs {
                filter: FilterConfig {
                    threshold: args.threshold,
                },
                ..Default::default()
            };
            run_stages(&args.io, &[Stage::Filter], cfg)
        }
        Commands::Rank(args) => {
            let cfg = configs(&args);
            run_stages(&args.io, &[Stage::Rank], cfg)
        }
        Commands::Label(io) => run_stages(&io, &[Stage::Label], Configs::default()),
        Commands::Features(io) => run_stages(&io, &[Stage::Features], Configs::default()),
        Commands::Run(args) => {
            let cfg = configs(&args);
            run_stages(&args.io, &Stage::all(), cfg)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Default)]
struct Configs {
    rank: RankConfig,
    filter: FilterConfig,
}

fn configs(args: &RankArgs) -> Configs {
    Configs {
        rank: RankConfig {
            max_len: args.max_len,
            splitter: args.splitter.clone(),
        },
        filter: FilterConfig {
            threshold: args.filter_threshold,
        },
    }
}

fn run_stages(io_args: &IoArgs, stages: &[Stage], cfg: Configs) -> mrcprep::Result<()> {
    // `Send` bounds let the parallel path hand the stream to a pool thread.
    let reader: Box<dyn BufRead + Send> = match &io_args.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let writer: Box<dyn Write + Send> = match &io_args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let ctx = StageContext {
        annotator: default_annotator(),
        rank: cfg.rank,
        filter: cfg.filter,
    };

    let bar = if io_args.progress {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {pos} records {msg}")
                .expect("valid progress template"),
        );
        Some(bar)
    } else {
        None
    };
    let on_record = |stats: &StreamStats| {
        if let Some(bar) = &bar {
            bar.set_position(stats.written as u64);
            if stats.skipped > 0 {
                bar.set_message(format!("({} skipped)", stats.skipped));
            }
        }
    };

    let stats = if io_args.parallel > 1 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(io_args.parallel)
            .build()
            .map_err(|e| mrcprep::Error::invalid_input(e.to_string()))?
            .install(|| {
                process_stream_parallel(
                    reader,
                    writer,
                    stages,
                    &ctx,
                    io_args.batch_size,
                    on_record,
                )
            })?
    } else {
        process_stream(reader, writer, stages, &ctx, on_record)?
    };

    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }
    if !io_args.quiet {
        eprintln!(
            "processed {} records ({} skipped, {} read)",
            stats.written, stats.skipped, stats.read
        );
    }

    Ok(())
}
