use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use lox_interpreter as lox;

use lox::interpreter::DEFAULT_MAX_CALL_DEPTH;
use lox::scanner::Scanner;
use lox::{RunOutcome, EXIT_STATIC_ERROR};

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Maximum depth of nested function calls before a stack overflow is reported
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    max_call_depth: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print tokens as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Runs input from a file as a Lox program
    Run { filename: PathBuf },
}

/// Memory-maps a script file.  Empty files are not mapped.
fn map_file(filename: &Path) -> Result<Option<Mmap>> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;

    let len = file
        .metadata()
        .context(format!("Failed to stat file {:?}", filename))?
        .len();

    if len == 0 {
        return Ok(None);
    }

    // SAFETY: the mapping is read-only and lives only for this process run;
    // concurrent truncation by another process is outside our control.
    let mmap = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", filename))?;

    info!("Mapped {} bytes from {:?}", mmap.len(), filename);

    Ok(Some(mmap))
}

fn source_text(mmap: &Option<Mmap>) -> Result<&str> {
    match mmap {
        Some(bytes) => std::str::from_utf8(bytes).context("Source is not valid UTF-8"),
        None => Ok(""),
    }
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // `[module:line] - message`, crate prefix stripped.
    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("lox_interpreter::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn tokenize(filename: &Path, json: bool) -> Result<i32> {
    let mmap = map_file(filename)?;
    let source = source_text(&mmap)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut tokenized = true;

    for token in Scanner::new(source) {
        match token {
            Ok(token) if json => {
                writeln!(out, "{}", serde_json::to_string(&token)?)?;
            }

            Ok(token) => writeln!(out, "{}", token)?,

            Err(e) => {
                tokenized = false;
                debug!("Tokenization debug: {}", e);
                eprintln!("{}", e);
            }
        }
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code {}", EXIT_STATIC_ERROR);
        return Ok(EXIT_STATIC_ERROR);
    }

    info!("Tokenization completed successfully");
    Ok(0)
}

fn run(filename: &Path, max_call_depth: usize) -> Result<i32> {
    let mmap = map_file(filename)?;
    let source = source_text(&mmap)?;

    info!("Provided input:\n {}", source);

    let outcome = lox::run_with_depth(source, Box::new(io::stdout()), max_call_depth);

    match &outcome {
        RunOutcome::Ok => info!("Program executed successfully"),

        RunOutcome::StaticErrors(errors) => {
            for e in errors {
                eprintln!("{}", e);
            }
        }

        RunOutcome::RuntimeError(e) => {
            debug!("Runtime debug: {}", e);
            eprintln!("{}", e);
        }
    }

    Ok(outcome.exit_code())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let code = match &args.commands {
        Commands::Tokenize { filename, json } => tokenize(filename, *json)?,
        Commands::Run { filename } => run(filename, args.max_call_depth)?,
    };

    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
