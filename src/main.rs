use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use hanscan::cache::{CacheSpace, CacheStore, JsonDirStore};
use hanscan::hashing::text_hash;
use hanscan::pipeline::{build_analyzer, init_default_config, PipelineConfig};
use hanscan::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "hanscan")]
#[command(about = "Chinese reading helper: segment text, attach pinyin/definitions, cache by content hash", long_about = None)]
struct Args {
    /// Generate default config + prompt files, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write config/prompt files (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite existing config/prompt files when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input text file ("-" for stdin)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Also request sentence-level translations
    #[arg(long)]
    sentences: bool,

    /// Print the text hash and exit (no analysis)
    #[arg(long)]
    hash_only: bool,

    /// Print the cached bundle for a text hash and exit
    #[arg(long, value_name = "HASH")]
    show_cached: Option<String>,

    /// Config file path (default: search for hanscan.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Definition backend name from config
    #[arg(long)]
    define_backend: Option<String>,

    /// Sentence-translation backend name from config
    #[arg(long)]
    translate_backend: Option<String>,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let path = init_default_config(&dir, args.force)?;
        eprintln!("Config written: {}", path.display());
        return Ok(());
    }

    let progress = Arc::new(ConsoleProgress::new(!args.quiet));
    let workdir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let cfg = PipelineConfig::from_args(
        &workdir,
        args.config.clone(),
        args.define_backend.clone(),
        args.translate_backend.clone(),
    )?;

    if let Some(hash) = args.show_cached.as_deref() {
        let store = JsonDirStore::open(&cfg.cache_dir)?;
        match store.get(CacheSpace::Text, hash)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => eprintln!("No cached bundle for {hash}"),
        }
        return Ok(());
    }

    let text = read_input(args.input.as_deref())?;
    let hash = text_hash(&text);
    if args.hash_only {
        println!("{hash}");
        return Ok(());
    }

    let analyzer = build_analyzer(&cfg, progress.clone())?;
    let bundle = analyzer.analyze(&text, &hash, args.sentences)?;
    progress.info(format!(
        "{} phrases, {} definitions",
        bundle.phrases.len(),
        bundle.definitions.len()
    ));
    println!("{}", serde_json::to_string_pretty(&bundle)?);
    Ok(())
}

fn read_input(input: Option<&std::path::Path>) -> anyhow::Result<String> {
    match input {
        Some(p) if p.as_os_str() != "-" => {
            std::fs::read_to_string(p).with_context(|| format!("read input: {}", p.display()))
        }
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read stdin")?;
            Ok(buf)
        }
    }
}
