mod cli;

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use clap::Parser;

use cwhscore::config::{load_config, Config, ScoreProfile};
use cwhscore::directory::{CsvDirectory, InstrumentDirectory, InstrumentFilter};
use cwhscore::export::{join_labels, write_csv, ScanRecord};
use cwhscore::history::{read_series, CsvHistoryProvider};
use cwhscore::logging::init_tracing;
use cwhscore::params::{parse_assignment, ParamMeta, Tunable};
use cwhscore::scan::{ScanOutcome, Scanner};
use cwhscore::scoring::Scorer;
use cwhscore::shape::CupHandleParams;
use cwhscore::technical::TechnicalParams;

use crate::cli::{Cli, Commands, ConfigArgs, FiltersArgs, ScanArgs, ScoreArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scan(args) => run_scan(args),
        Commands::Score(args) => run_score(args),
        Commands::Filters(args) => run_filters(args),
        Commands::Params => {
            print_params("shape", CupHandleParams::param_meta());
            print_params("technical", TechnicalParams::param_meta());
            Ok(())
        },
    }
}

/// Profile or file first, then `--shape-param` overrides on top.
fn resolve_config(args: &ConfigArgs) -> Result<Config> {
    let mut config = match (&args.config, args.profile) {
        (Some(path), _) => load_config(path)?,
        (None, Some(profile)) => ScoreProfile::from(profile).config(),
        (None, None) => Config::default(),
    };

    if !args.shape_params.is_empty() {
        let parsed = args
            .shape_params
            .iter()
            .map(|s| parse_assignment(s))
            .collect::<cwhscore::Result<Vec<_>>>()
            .context("parsing --shape-param")?;
        let overrides: HashMap<&str, f64> = parsed.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        config.scoring.shape = config
            .scoring
            .shape
            .with_params(&overrides)
            .context("applying --shape-param")?;
    }
    Ok(config)
}

fn run_scan(args: ScanArgs) -> Result<()> {
    let mut config = resolve_config(&args.config)?;
    if let Some(threads) = args.threads {
        config.scan.max_concurrency = threads;
    }
    if let Some(pause) = args.pause_ms {
        config.scan.pacing_ms = pause;
    }
    if let Some(suffix) = args.suffix {
        config.scan.symbol_suffix = suffix;
    }
    if let Some(lookback) = args.lookback {
        config.scan.lookback = lookback;
    }
    config.validate().context("invalid scan settings")?;

    let directory = CsvDirectory::load(&args.instruments)
        .with_context(|| format!("loading instruments from {}", args.instruments.display()))?;
    let filter = InstrumentFilter {
        sectors: args.sector,
        segments: args.segment,
    };
    let instruments = directory.instruments(&filter);
    if instruments.is_empty() {
        println!("No instruments match the selected sectors and segments.");
        return Ok(());
    }

    let scorer = Scorer::new(config.scoring).context("building scorer")?;
    let provider = CsvHistoryProvider::new(&args.history_dir);
    let scanner = Scanner::new(scorer, provider, config.scan)?;
    let outcome = scanner.run_with_progress(&instruments, |done, total| {
        eprint!("\rscanned {done}/{total}");
        if done == total {
            eprintln!();
        }
    });

    if outcome.is_empty() {
        println!(
            "No instrument produced a score ({} skipped).",
            outcome.skipped.len()
        );
    } else {
        print_table(&outcome, args.top.unwrap_or(outcome.results.len()));
    }

    if let Some(path) = &args.out {
        let records: Vec<ScanRecord> = outcome.results.iter().map(ScanRecord::from).collect();
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_csv(BufWriter::new(file), &records, args.bom)
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), rows = records.len(), "results exported");
    }
    Ok(())
}

fn print_table(outcome: &ScanOutcome, top: usize) {
    println!(
        "{:>4}  {:<8} {:<24} {:>6} {:>5} {:>4} {:>4}  {}",
        "rank", "code", "name", "total", "shape", "tech", "pat", "signals"
    );
    for (rank, r) in outcome.top(top).iter().enumerate() {
        let b = &r.breakdown;
        let mut signals = b.technical_signals.clone();
        signals.extend(b.pattern_signals.iter().cloned());
        let name: String = r.name.chars().take(24).collect();
        println!(
            "{:>4}  {:<8} {:<24} {:>6.1} {:>5} {:>4} {:>4}  {}",
            rank + 1,
            r.code,
            name,
            b.total_score,
            if b.shape_detected { "yes" } else { "no" },
            b.technical_score,
            b.pattern_score,
            join_labels(&signals),
        );
    }
    if !outcome.skipped.is_empty() {
        println!("{} instrument(s) skipped", outcome.skipped.len());
    }
}

fn run_score(args: ScoreArgs) -> Result<()> {
    let mut config = resolve_config(&args.config)?;
    if let Some(lookback) = args.lookback {
        config.scan.lookback = lookback;
    }
    let series = read_series(&args.history, config.scan.lookback)
        .with_context(|| format!("reading {}", args.history.display()))?;
    if series.is_empty() {
        println!("{} holds no usable bars.", args.history.display());
        return Ok(());
    }
    let scorer = Scorer::new(config.scoring).context("building scorer")?;
    let detailed = scorer.score_detailed(&series);
    println!("{}", serde_json::to_string_pretty(&detailed)?);
    Ok(())
}

fn run_filters(args: FiltersArgs) -> Result<()> {
    let directory = CsvDirectory::load(&args.instruments)
        .with_context(|| format!("loading instruments from {}", args.instruments.display()))?;
    if directory.is_empty() {
        println!("The instrument file lists no instruments.");
        return Ok(());
    }
    println!("Sectors:");
    for sector in directory.sectors() {
        println!("  {sector}");
    }
    println!("Segments:");
    for segment in directory.segments() {
        println!("  {segment}");
    }
    Ok(())
}

fn print_params(group: &str, metas: &[ParamMeta]) {
    for m in metas {
        println!(
            "{group}.{:<28} {:<7} default {:<8} range [{}, {}] step {}  {}",
            m.name,
            format!("{:?}", m.param_type),
            m.default,
            m.range.0,
            m.range.1,
            m.range.2,
            m.description
        );
    }
}
