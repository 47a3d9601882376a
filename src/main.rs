use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use pngb_codegen::{EmitMode, EmitOptions, bytecode, dsl, emit_program};
use tracing::{Level, info};

#[derive(Debug, Default, Clone)]
struct Cli {
    program: Option<PathBuf>,
    out: Option<PathBuf>,
    base_dir: Option<PathBuf>,
    options: Option<PathBuf>,
    mode: Option<EmitMode>,
    validate: bool,
    summary: bool,
    disassemble: bool,
    verbose: bool,
}

const USAGE: &str = "--program <program.json> [--out <file.pngb>] [--base-dir <dir>] \
[--options <options.json>] [--mode legacy|runtime] [--validate] [--summary] [--disassemble] [--verbose]";

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        let value = |i: usize| {
            args.get(i + 1)
                .ok_or_else(|| anyhow!("missing value for {}", args[i]))
        };
        match args[i].as_str() {
            "--program" => {
                cli.program = Some(PathBuf::from(value(i)?));
                i += 2;
            }
            "--out" => {
                cli.out = Some(PathBuf::from(value(i)?));
                i += 2;
            }
            "--base-dir" => {
                cli.base_dir = Some(PathBuf::from(value(i)?));
                i += 2;
            }
            "--options" => {
                cli.options = Some(PathBuf::from(value(i)?));
                i += 2;
            }
            "--mode" => {
                cli.mode = Some(value(i)?.parse()?);
                i += 2;
            }
            "--validate" => {
                cli.validate = true;
                i += 1;
            }
            "--summary" => {
                cli.summary = true;
                i += 1;
            }
            "--disassemble" => {
                cli.disassemble = true;
                i += 1;
            }
            "--verbose" | "-v" => {
                cli.verbose = true;
                i += 1;
            }
            other => {
                return Err(anyhow!("unknown argument: {other} (usage: {USAGE})"));
            }
        }
    }
    Ok(cli)
}

fn emit_options(cli: &Cli, program_path: &Path) -> Result<EmitOptions> {
    let mut options = match cli.options.as_ref() {
        Some(path) => EmitOptions::load_from_path(path)?,
        None => EmitOptions {
            base_dir: program_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            ..EmitOptions::default()
        },
    };
    if let Some(dir) = cli.base_dir.as_ref() {
        options.base_dir = dir.clone();
    }
    if let Some(mode) = cli.mode {
        options.mode = mode;
    }
    if cli.validate {
        options.validate_wgsl = true;
    }
    Ok(options)
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&args)?;

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let program_path = cli
        .program
        .clone()
        .ok_or_else(|| anyhow!("--program is required (usage: {USAGE})"))?;
    let program = dsl::load_program_from_path(&program_path)?;
    let options = emit_options(&cli, &program_path)?;

    let compiled = emit_program(&program, &options)
        .with_context(|| format!("failed to emit {}", program_path.display()))?;

    if cli.summary {
        println!("{}", serde_json::to_string_pretty(&compiled.summary())?);
    }

    if cli.disassemble {
        for ins in bytecode::decode_instructions(compiled.artifact.opcodes.as_bytes())? {
            println!("{ins:?}");
        }
    }

    if let Some(out) = cli.out.as_ref() {
        let bytes = compiled.to_bytes();
        std::fs::write(out, &bytes)
            .with_context(|| format!("failed to write artifact to {}", out.display()))?;
        info!(path = %out.display(), bytes = bytes.len(), "wrote artifact");
    }

    Ok(())
}
