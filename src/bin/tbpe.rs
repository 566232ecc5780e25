use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::ThreadPoolBuilder;
use serde::Deserialize;
use serde_json::json;
use tbpe::config::{IngestConfig, TrainerConfig, DEFAULT_SPECIAL_TOKEN_MARKER};
use tbpe::corpus::{decode_documents, load_documents};
use tbpe::model::BpeModel;
use tbpe::serialization::{self, gpt2};
use tbpe::special_tokens::dedup_in_place;
use tbpe::Trainer;

const DEFAULT_OUTPUT: &str = "tokenizer";
const TOKENIZER_FILE: &str = "tokenizer.json";

#[derive(Parser, Debug)]
#[command(author, version, about = "Byte-level BPE trainer", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a vocabulary and merge table from text inputs
    Train(TrainArgs),
    /// Inspect a persisted tokenizer
    Info(InfoArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Hugging Face tokenizer.json
    Hf,
    /// vocab.json + merges.txt
    Gpt2,
    /// Both layouts
    All,
}

impl OutputFormat {
    fn writes_hf(self) -> bool {
        matches!(self, Self::Hf | Self::All)
    }

    fn writes_gpt2(self) -> bool {
        matches!(self, Self::Gpt2 | Self::All)
    }
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Files or directories to ingest
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Target vocabulary size
    #[arg(long, value_name = "SIZE")]
    vocab_size: Option<usize>,

    /// Special tokens in id order (repeat flag; defaults to <|endoftext|>)
    #[arg(long = "special-token", value_name = "TOKEN")]
    special_tokens: Vec<String>,

    /// Train without any special token
    #[arg(long, conflicts_with = "special_tokens")]
    no_special_tokens: bool,

    /// Marker that merges may only produce as part of an exact special token
    #[arg(long, value_name = "STR", default_value = DEFAULT_SPECIAL_TOKEN_MARKER)]
    marker: String,

    /// Pre-tokenize special tokens like ordinary text
    #[arg(long)]
    no_isolate_special_tokens: bool,

    /// Maximum accepted merges
    #[arg(long, value_name = "COUNT")]
    max_merges: Option<usize>,

    /// Output layout
    #[arg(long, value_enum, default_value_t = OutputFormat::All)]
    format: OutputFormat,

    /// Also write truncated models of these vocabulary sizes (repeat flag)
    #[arg(long = "family-size", value_name = "SIZE")]
    family_sizes: Vec<usize>,

    /// Write the training report as JSON
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Disable per-iteration logging/progress
    #[arg(long)]
    no_progress: bool,

    /// Emit pretty JSON
    #[arg(long)]
    pretty: bool,

    /// Limit Rayon worker threads
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Disable recursive directory traversal
    #[arg(long)]
    no_recursive: bool,

    /// Follow symlinks during traversal
    #[arg(long)]
    follow_symlinks: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// tokenizer.json, or a directory holding vocab.json and merges.txt
    #[arg(short = 'm', long, value_name = "PATH")]
    tokenizer: PathBuf,

    /// Emit machine-readable JSON summary
    #[arg(long)]
    json: bool,
}

#[derive(Deserialize)]
struct TokenizerFile {
    model: ModelSection,
    #[serde(default)]
    added_tokens: Vec<AddedToken>,
}

#[derive(Deserialize)]
struct ModelSection {
    #[serde(rename = "type")]
    kind: String,
    vocab: serde_json::Map<String, serde_json::Value>,
    merges: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct AddedToken {
    content: String,
    #[serde(default)]
    special: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Info(args) => run_info(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = match (quiet, verbose) {
        (0, 0) => LevelFilter::Info,
        (0, 1) => LevelFilter::Debug,
        (0, _) => LevelFilter::Trace,
        (1, _) => LevelFilter::Warn,
        _ => LevelFilter::Error,
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn run_train(args: TrainArgs) -> Result<()> {
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("unable to configure Rayon thread pool")?;
    }

    let mut cfg = TrainerConfig::builder()
        .special_token_marker(args.marker.clone())
        .isolate_special_tokens(!args.no_isolate_special_tokens)
        .max_merges(args.max_merges)
        .show_progress(!args.no_progress);
    if let Some(vocab_size) = args.vocab_size {
        cfg = cfg.target_vocab_size(vocab_size);
    }
    if args.no_special_tokens {
        cfg = cfg.special_tokens(Vec::<String>::new());
    } else if !args.special_tokens.is_empty() {
        let mut special_tokens = args.special_tokens.clone();
        dedup_in_place(&mut special_tokens);
        if special_tokens.len() != args.special_tokens.len() {
            warn!("ignoring repeated --special-token values");
        }
        cfg = cfg.special_tokens(special_tokens);
    }
    let trainer_cfg = cfg.build()?;

    let ingest_cfg = IngestConfig::builder()
        .recursive(!args.no_recursive)
        .follow_symlinks(args.follow_symlinks)
        .build();

    let documents = load_documents(&args.inputs, &ingest_cfg)
        .with_context(|| "failed to load text corpus")?;
    let corpus_bytes: usize = documents.iter().map(Vec::len).sum();
    info!(
        "loaded {} documents totalling {:.2} MiB",
        documents.len(),
        bytes_to_mebibytes(corpus_bytes)
    );
    let texts = decode_documents(&documents).context("corpus is not valid UTF-8 text")?;

    let spinner = if args.no_progress {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} training merges... {elapsed}")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    };

    let trainer = Trainer::new(trainer_cfg);
    let start = Instant::now();
    let artifacts = trainer.train_from_texts(&texts)?;
    if let Some(pb) = spinner {
        pb.finish_with_message("training complete");
    }
    let elapsed = start.elapsed();

    let model = &artifacts.model;
    if model.vocab_size() < trainer.config().target_vocab_size {
        warn!(
            "corpus exhausted after {} merges; vocab {} is below the requested {}",
            model.merges().len(),
            model.vocab_size(),
            trainer.config().target_vocab_size
        );
    }

    write_model(model, &args.output, args.format, args.pretty)?;
    for &size in &args.family_sizes {
        let derived = model
            .derive_with_vocab(size)
            .with_context(|| format!("unable to derive family member of size {size}"))?;
        let dir = args.output.join(format!("vocab-{size}"));
        write_model(&derived, &dir, args.format, args.pretty)?;
        info!("wrote family member with vocab {size} to {}", dir.display());
    }

    if let Some(report) = &args.report {
        let json = artifacts.metrics.to_json(args.pretty)?;
        fs::write(report, json)
            .with_context(|| format!("failed to write report to {}", report.display()))?;
    }

    let throughput = if elapsed.as_secs_f64() > 0.0 {
        bytes_to_mebibytes(corpus_bytes) / elapsed.as_secs_f64()
    } else {
        0.0
    };
    info!(
        "training complete: merges={} vocab={} rejected={} stop={:?} duration={elapsed:.2?} throughput={throughput:.2} MiB/s",
        model.merges().len(),
        model.vocab_size(),
        artifacts.metrics.rejected.len(),
        artifacts.metrics.stop_reason
    );
    println!(
        "wrote vocab {} ({} merges) to {}",
        model.vocab_size(),
        model.merges().len(),
        args.output.display()
    );
    println!(
        "   corpus {:.2} MiB | duration {:.2?} | throughput {:.2} MiB/s",
        bytes_to_mebibytes(corpus_bytes),
        elapsed,
        throughput
    );

    Ok(())
}

fn write_model(model: &BpeModel, dir: &Path, format: OutputFormat, pretty: bool) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    if format.writes_hf() {
        let path = dir.join(TOKENIZER_FILE);
        serialization::save_huggingface_tokenizer(model, &path, pretty)
            .with_context(|| format!("failed to save tokenizer to {}", path.display()))?;
    }
    if format.writes_gpt2() {
        model
            .save_vocab_and_merges(dir)
            .with_context(|| format!("failed to save vocab/merges to {}", dir.display()))?;
    }
    Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
    let summary = if args.tokenizer.is_dir() {
        let files = gpt2::load_vocab_and_merges(&args.tokenizer)
            .with_context(|| format!("failed to load {}", args.tokenizer.display()))?;
        json!({
            "path": args.tokenizer.display().to_string(),
            "model_type": "BPE",
            "vocab_size": files.tokens.len(),
            "merges": files.merges.len(),
            "special_tokens": Vec::<String>::new(),
        })
    } else {
        let data = fs::read_to_string(&args.tokenizer)
            .with_context(|| format!("failed to read {}", args.tokenizer.display()))?;
        let parsed: TokenizerFile =
            serde_json::from_str(&data).context("failed to parse tokenizer.json")?;
        let special_tokens = parsed
            .added_tokens
            .iter()
            .filter(|token| token.special)
            .map(|token| token.content.clone())
            .collect::<Vec<_>>();
        json!({
            "path": args.tokenizer.display().to_string(),
            "model_type": parsed.model.kind,
            "vocab_size": parsed.model.vocab.len(),
            "merges": parsed.model.merges.len(),
            "special_tokens": special_tokens,
        })
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let Some(special_tokens) = summary["special_tokens"].as_array() else {
        bail!("malformed summary");
    };
    println!(
        "Model type    : {}",
        summary["model_type"].as_str().unwrap_or("unknown")
    );
    println!("Vocab size    : {}", summary["vocab_size"]);
    println!("Merges        : {}", summary["merges"]);
    if special_tokens.is_empty() {
        println!("Special tokens: (none)");
    } else {
        println!(
            "Special tokens: {}",
            special_tokens
                .iter()
                .map(|v| v.as_str().unwrap_or_default())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    Ok(())
}

fn bytes_to_mebibytes(bytes: usize) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
