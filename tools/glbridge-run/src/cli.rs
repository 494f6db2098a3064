use std::path::PathBuf;

use clap::Parser;

use crate::output::OutputFormat;

/// Boot a compiled module against a headless graphics context, run its
/// entry export and wait for every thread it spawned.
#[derive(Parser, Debug)]
#[command(name = "glbridge-run", version, about)]
pub struct Cli {
    /// Module to run (binary `.wasm` or text `.wat`).
    pub module: PathBuf,

    /// TOML file with `[bridge]` and `[graphics]` tables.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Export to run instead of the configured entry.
    #[arg(long)]
    pub entry: Option<String>,

    /// Shared memory size in pages, used as both initial and maximum.
    #[arg(long)]
    pub pages: Option<u32>,

    /// Trace every import call with its raw arguments (needs RUST_LOG=trace).
    #[arg(long)]
    pub trace_imports: bool,

    /// Link imports outside the catalogue as traps.
    #[arg(long)]
    pub trap_unknown_imports: bool,

    /// Boot without a graphics context.
    #[arg(long)]
    pub no_graphics: bool,

    /// Output format for the run report.
    #[arg(long, value_enum, default_value = "human")]
    pub output: OutputFormat,
}
