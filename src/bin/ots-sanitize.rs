//! Pass a font through the sandboxed OpenType Sanitizer.
//!
//! Reads a font from a file or stdin and writes the sanitized font to stdout,
//! or to `<output><extension>` with `--output`.
//!
//! Exits with 1 when the font is rejected or cannot be read, 2 on a usage
//! error and 3 when the sandbox itself fails.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ots_sandbox::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ots-sanitize")]
#[command(version, about = "Pass a font through the OpenType Sanitizer", long_about = None)]
struct Cli {
    /// Do not output errors and warnings
    #[arg(short, long)]
    quiet: bool,

    /// Output information about processed files
    #[arg(short, long)]
    verbose: bool,

    /// Set the output basename (instead of stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Extract a single font from a collection
    #[arg(long)]
    index: Option<u32>,

    /// Maximum output size in bytes (default: 8 times the input length)
    #[arg(long)]
    max_size: Option<usize>,

    /// Input font, or - for stdin
    input: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file = match &cli.input {
        Some(path) if path.as_os_str() != "-" => path.display().to_string(),
        _ => "stdin".to_string(),
    };

    match run(&cli, &file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: fatal: {}", file, e);
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Sandbox failures get their own status so scripts can tell them apart
/// from bad fonts.
fn exit_status(err: &SanitizerError) -> u8 {
    if err.is_fatal() {
        3
    } else {
        1
    }
}

fn run(cli: &Cli, file: &str) -> Result<()> {
    let input = match &cli.input {
        Some(path) if path.as_os_str() != "-" => std::fs::read(path)?,
        _ => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let mut options = ProcessOptions::new();
    if let Some(index) = cli.index {
        options = options.index(index);
    }
    if let Some(max_size) = cli.max_size {
        options = options.max_size(max_size);
    }
    if !cli.quiet {
        let file = file.to_string();
        options = options.messages(move |level, msg| eprintln!("{}: {}: {}", file, level, msg));
    }

    let output = ots_sandbox::process(&input, &options)?;
    let ext = extension(&output);

    let base = cli.output.as_deref().filter(|base| *base != "-");
    if cli.verbose {
        eprintln!(
            "{}: writing {}{} (length={}, input_length={}, input_type={})",
            file,
            base.unwrap_or(""),
            ext,
            output.len(),
            input.len(),
            extension(&input)
        );
    }

    match base {
        Some(base) => std::fs::write(format!("{}{}", base, ext), &output)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&output)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
