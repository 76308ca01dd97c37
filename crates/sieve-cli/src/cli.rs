//! Argument definitions and command execution.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sieve::{project_json_reader, project_json_str, Mask, Parser as MaskParser};
use tracing::{debug, info};

/// Parse, merge and apply field-projection masks.
#[derive(Debug, Parser)]
#[command(name = "sieve", version)]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Reject masks nested deeper than this
    #[arg(long, global = true, value_name = "N")]
    pub max_depth: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate a mask and print its canonical form
    Check(CheckArgs),

    /// Overlay masks left to right (earlier masks win) and print the result
    Merge(MergeArgs),

    /// Print the flat query projection of a mask as JSON
    Export(ExportArgs),

    /// Filter a JSON document through one or more masks
    Project(ProjectArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Mask expression
    #[arg(value_name = "EXPR", allow_hyphen_values = true)]
    pub expr: String,

    /// Print the structural JSON form instead of the expression
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Mask expressions, highest precedence first
    #[arg(value_name = "EXPR", required = true, allow_hyphen_values = true)]
    pub exprs: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Mask expression
    #[arg(value_name = "EXPR", allow_hyphen_values = true)]
    pub expr: String,
}

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Mask expression; repeat to layer masks, earlier ones win
    #[arg(
        short,
        long = "mask",
        value_name = "EXPR",
        env = "SIEVE_MASK",
        allow_hyphen_values = true
    )]
    pub masks: Vec<String>,

    /// Treat the input as JSON Lines and project each line on its own
    #[arg(long)]
    pub lines: bool,

    /// Input file (stdin when omitted)
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,
}

/// Runs one command against the given input and output streams.
pub fn run(cli: Cli, stdin: &mut dyn BufRead, out: &mut dyn Write) -> Result<()> {
    let parser = MaskParser::new().max_depth(cli.max_depth);
    match cli.command {
        Command::Check(args) => {
            let mask = parse_mask(&parser, &args.expr)?;
            if args.json {
                serde_json::to_writer(&mut *out, &mask).context("failed to encode mask")?;
                writeln!(out)?;
            } else {
                writeln!(out, "{mask}")?;
            }
        }
        Command::Merge(args) => {
            let masks = parse_masks(&parser, &args.exprs)?;
            writeln!(out, "{}", Mask::overlay_all(&masks))?;
        }
        Command::Export(args) => {
            let mask = parse_mask(&parser, &args.expr)?;
            let projection = sieve_query::export(Some(&mask));
            serde_json::to_writer(&mut *out, &projection).context("failed to encode projection")?;
            writeln!(out)?;
        }
        Command::Project(args) => project(&parser, args, stdin, out)?,
    }
    Ok(())
}

fn project(
    parser: &MaskParser,
    args: ProjectArgs,
    stdin: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<()> {
    let masks = parse_masks(parser, &args.masks)?;
    let mask = (!masks.is_empty()).then(|| Mask::overlay_all(&masks));
    debug!(mask = %mask.as_ref().map(Mask::to_text).unwrap_or_default(), "effective mask");

    match &args.file {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            project_input(mask.as_ref(), args.lines, &mut BufReader::new(file), out)
        }
        None => project_input(mask.as_ref(), args.lines, stdin, out),
    }
}

fn project_input(
    mask: Option<&Mask>,
    lines: bool,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<()> {
    if lines {
        let mut count = 0usize;
        for (index, line) in input.lines().enumerate() {
            let line = line.context("failed to read input")?;
            if line.trim().is_empty() {
                continue;
            }
            let projected =
                project_json_str(mask, &line).with_context(|| format!("line {}", index + 1))?;
            writeln!(out, "{projected}")?;
            count += 1;
        }
        info!(lines = count, "projected JSON lines");
    } else {
        project_json_reader(mask, input, &mut *out).context("projection failed")?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

fn parse_mask(parser: &MaskParser, text: &str) -> Result<Mask> {
    parser
        .parse(text)
        .with_context(|| format!("invalid mask {text:?}"))
}

fn parse_masks(parser: &MaskParser, texts: &[String]) -> Result<Vec<Mask>> {
    texts.iter().map(|text| parse_mask(parser, text)).collect()
}
