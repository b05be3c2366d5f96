use clap::{Args, Parser, Subcommand};

use crate::logging::LogFormat;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Log output format (written to stderr).
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile a recipe into a cut.
    Compile(CompileArgs),
    /// Print the cut id and cut URI of a recipe.
    Hash(HashArgs),
    /// Write selection templates and a contact sheet for a candidates-only cut.
    Select(SelectArgs),
    /// Scaffold a new recipe from an existing one.
    NewCut(NewCutArgs),
}

#[derive(Debug, Args)]
pub struct CompileArgs {
    /// Recipe YAML path.
    #[arg(long)]
    pub recipe: String,

    /// Generate candidates per scene and stop before stitching.
    #[arg(long)]
    pub candidates_only: bool,

    /// Project root (episodes/, assets/, config/, output/).
    #[arg(long, default_value = ".")]
    pub root: String,

    /// Maximum candidates generated in parallel per scene.
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Font file for overlay text.
    #[arg(long)]
    pub font: Option<String>,

    /// Recipe JSON Schema; defaults to the built-in schema.
    #[arg(long)]
    pub schema: Option<String>,
}

#[derive(Debug, Args)]
pub struct HashArgs {
    /// Recipe YAML path.
    #[arg(long)]
    pub recipe: String,

    /// Recipe JSON Schema; defaults to the built-in schema.
    #[arg(long)]
    pub schema: Option<String>,
}

#[derive(Debug, Args)]
pub struct SelectArgs {
    /// Path to `output/cuts/<cut_id>/manifest/cut.manifest.json`.
    #[arg(long)]
    pub cut_manifest: String,

    #[arg(long, default_value = ".")]
    pub root: String,
}

#[derive(Debug, Args)]
pub struct NewCutArgs {
    /// Base recipe to copy.
    #[arg(long)]
    pub from: String,

    /// Title written to `metadata.title`.
    #[arg(long)]
    pub title: String,

    /// Output recipe path.
    #[arg(long)]
    pub out: String,

    /// Overwrite `--out` if it exists.
    #[arg(long)]
    pub force: bool,
}
