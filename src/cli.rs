use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use cwhscore::config::ScoreProfile;
use cwhscore::history::Lookback;

#[derive(Debug, Parser)]
#[command(
    name = "cwhscore",
    version,
    about = "Score equities for swing trades: cup-with-handle, technical indicators and candlestick patterns"
)]
pub struct Cli {
    /// Debug logging for this crate when RUST_LOG is unset
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Score every instrument in a directory file and rank the results
    Scan(ScanArgs),
    /// Score one history file and print the full breakdown as JSON
    Score(ScoreArgs),
    /// List the sectors and segments available for filtering
    Filters(FiltersArgs),
    /// List the tunable shape and technical parameters
    Params,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProfileArg {
    Swing,
    Balanced,
}

impl From<ProfileArg> for ScoreProfile {
    fn from(p: ProfileArg) -> Self {
        match p {
            ProfileArg::Swing => ScoreProfile::Swing,
            ProfileArg::Balanced => ScoreProfile::Balanced,
        }
    }
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long, help = "JSON configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, conflicts_with = "config", help = "Preset bands and lookback")]
    pub profile: Option<ProfileArg>,

    #[arg(long = "shape-param", value_name = "KEY=VALUE", help = "Override a shape parameter (repeatable)")]
    pub shape_params: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[arg(long, help = "CSV with code,name,sector,segment columns")]
    pub instruments: PathBuf,

    #[arg(long, help = "Directory holding <symbol>.csv price histories")]
    pub history_dir: PathBuf,

    #[arg(long, help = "Keep only this sector (repeatable)")]
    pub sector: Vec<String>,

    #[arg(long, help = "Keep only this market segment (repeatable)")]
    pub segment: Vec<String>,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[arg(long, help = "Worker threads")]
    pub threads: Option<usize>,

    #[arg(long, help = "Pause per worker after each instrument, in milliseconds")]
    pub pause_ms: Option<u64>,

    #[arg(long, help = "Suffix appended to codes to form history symbols")]
    pub suffix: Option<String>,

    #[arg(long, help = "History length: 3mo, 6mo, 1y or <n>d")]
    pub lookback: Option<Lookback>,

    #[arg(long, help = "Write all results to this CSV file")]
    pub out: Option<PathBuf>,

    #[arg(long, default_value_t = false, help = "Prefix the CSV with a UTF-8 byte-order mark")]
    pub bom: bool,

    #[arg(long, help = "Print only the N best results")]
    pub top: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ScoreArgs {
    #[arg(long, help = "CSV with Date,Open,High,Low,Close,Volume columns")]
    pub history: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[arg(long, help = "History length: 3mo, 6mo, 1y or <n>d")]
    pub lookback: Option<Lookback>,
}

#[derive(Debug, Args)]
pub struct FiltersArgs {
    #[arg(long)]
    pub instruments: PathBuf,
}
