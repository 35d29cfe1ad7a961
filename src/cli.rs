use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "ragdebug",
    version,
    about = "Derived chunk and question analytics for RAG evaluation runs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Collections(CollectionsArgs),
    Derive(DeriveArgs),
    Chunks(ChunksArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CollectionsArgs {
    #[arg(long, default_value = "collections")]
    pub collections_dir: PathBuf,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Either a standalone `--input` file or a `--collection`/`--run` pair.
#[derive(Args, Debug, Clone)]
pub struct RunSourceArgs {
    #[arg(long, default_value = "collections")]
    pub collections_dir: PathBuf,

    #[arg(long, requires = "run", conflicts_with = "input")]
    pub collection: Option<String>,

    #[arg(long, requires = "collection", conflicts_with = "input")]
    pub run: Option<String>,

    #[arg(long, required_unless_present = "collection")]
    pub input: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct DeriveArgs {
    #[command(flatten)]
    pub source: RunSourceArgs,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ChunkSort {
    Frequency,
    GtRate,
    ResponseRate,
    Contradictions,
}

impl ChunkSort {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Frequency => "frequency",
            Self::GtRate => "gt-rate",
            Self::ResponseRate => "response-rate",
            Self::Contradictions => "contradictions",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ChunksArgs {
    #[command(flatten)]
    pub source: RunSourceArgs,

    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: u64,

    #[arg(long, value_enum, default_value_t = ChunkSort::Frequency)]
    pub sort_by: ChunkSort,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
