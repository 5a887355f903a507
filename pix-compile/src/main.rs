use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use pix_compile::compiler::{PixCompiler, Sections};
use pix_compile::resources::Resources;
use pix_compile::verify::{policy_findings, FindingSeverity};
use policy_model::ObjectSnapshot;

mod cli;

use cli::{CheckArgs, Cli, Command, CompileArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Compile(args) => run_compile(args),
        Command::Check(args) => run_check(args),
    }
}

fn load_snapshot(path: &Path) -> Result<ObjectSnapshot> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    ObjectSnapshot::from_json(&text)
        .with_context(|| format!("failed to load snapshot {}", path.display()))
}

fn run_compile(args: CompileArgs) -> Result<()> {
    let snapshot = load_snapshot(&args.file)?;
    let mut resources = Resources::builtin();
    if let Some(path) = &args.resources {
        resources.load_overrides(path)?;
    }

    let compiler = PixCompiler::new(Arc::new(snapshot))
        .with_resources(resources)
        .lenient(args.lenient);
    let sections = Sections { nat: !args.policy_only, policy: !args.nat_only };
    let out = compiler.compile_sections(sections)?;

    if !args.quiet {
        for warning in &out.warnings {
            eprintln!("{} {warning}", "warning:".yellow().bold());
        }
    }
    if args.verbose {
        for diag in &out.diagnostics {
            eprintln!("{} {diag}", "debug:".dimmed());
        }
    }

    match &args.output {
        Some(path) => fs::write(path, &out.script)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", out.script),
    }
    Ok(())
}

fn run_check(args: CheckArgs) -> Result<()> {
    let snapshot = load_snapshot(&args.file)?;
    let findings = policy_findings(&snapshot)?;

    let mut errors = 0usize;
    let mut warnings = 0usize;
    for finding in &findings {
        match finding.severity {
            FindingSeverity::Error => {
                errors += 1;
                eprintln!(
                    "{} [{}] {}",
                    "error:".red().bold(),
                    finding.code,
                    finding.message
                );
            }
            FindingSeverity::Warning => {
                warnings += 1;
                eprintln!(
                    "{} [{}] {}",
                    "warning:".yellow().bold(),
                    finding.code,
                    finding.message
                );
            }
        }
    }
    if findings.is_empty() {
        println!("{}", "no findings".green());
    }

    if errors > 0 {
        bail!("check failed: {errors} errors");
    }
    if args.strict && warnings > 0 {
        bail!("check failed in strict mode: {warnings} warnings");
    }
    Ok(())
}
