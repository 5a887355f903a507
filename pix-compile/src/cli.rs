use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pix-compile")]
#[command(about = "Compile vendor-neutral firewall policy into PIX/FWSM commands")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Compile a policy snapshot into a command script.
    Compile(CompileArgs),
    /// Check a snapshot for shadowed or conflicting rules.
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Snapshot JSON file.
    pub file: PathBuf,
    /// Write the script to a file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Compile only the NAT ruleset.
    #[arg(long, conflicts_with = "policy_only")]
    pub nat_only: bool,
    /// Compile only the access-policy ruleset.
    #[arg(long)]
    pub policy_only: bool,
    /// Resource override TOML file.
    #[arg(long)]
    pub resources: Option<PathBuf>,
    /// Drop rules with structural problems instead of aborting.
    #[arg(long)]
    pub lenient: bool,
    /// Show pipeline diagnostics.
    #[arg(short, long)]
    pub verbose: bool,
    /// Suppress warnings.
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Snapshot JSON file.
    pub file: PathBuf,
    /// Fail on warnings, not only on errors.
    #[arg(long)]
    pub strict: bool,
}
