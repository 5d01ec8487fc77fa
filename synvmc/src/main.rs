use std::{
    fs::{self, File},
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use synvm_base::{
    codec,
    debugger::Debugger,
    io::{Chars, Lines},
    runner::{Options, Runner},
    vm::Machine,
    Error,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about, long_about, arg_required_else_help(true))]
struct Args {
    /// Program binary to execute
    file: PathBuf,

    /// Run under the interactive debugger
    #[arg(short, long)]
    debug: bool,

    /// Recognize `%` (toggle call tracing) and `+` (set last register) on input
    #[arg(long)]
    hooks: bool,

    /// Start with call tracing enabled
    #[arg(long)]
    trace_calls: bool,

    /// Write call traces here instead of stderr
    #[arg(long)]
    trace_file: Option<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_logging();

    let Args {
        file,
        debug,
        hooks,
        trace_calls,
        trace_file,
    } = Args::parse();

    let image = match fs::read(&file) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("vm-error: failed to read {}: {e}", file.display());
            return ExitCode::FAILURE;
        }
    };
    let diagnostics: Box<dyn Write> = match trace_file {
        Some(path) => match File::create(&path) {
            Ok(f) => Box::new(f),
            Err(e) => {
                eprintln!("vm-error: failed to create {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(io::stderr()),
    };

    let decoder = codec::Decoder::new(&image);
    if decoder.has_trailing_byte() {
        debug!(bytes = image.len(), "odd-sized image, last byte ignored");
    }
    let program: Vec<u16> = decoder.into_iter().collect();
    info!(file = %file.display(), words = program.len(), "loaded");

    let options = Options {
        input_hooks: hooks,
        trace_calls,
    };
    let runner = Runner::new(Machine::load(&program), Chars::new(io::stdin()), io::stdout())
        .with_options(options)
        .with_diagnostics(diagnostics);

    let res = if debug {
        Debugger::new(runner, Lines::new(io::stdin()), io::stdout()).run()
    } else {
        let mut runner = runner;
        runner.run()
    };

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::InputExhausted { addr }) => {
            info!(addr, "input closed, stopping");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("runtime-error: {e}");
            ExitCode::FAILURE
        }
    }
}
