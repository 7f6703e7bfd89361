use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::*;

use afnix_engine::error::EngineError;
use afnix_engine::eval::interp::Interp;
use afnix_frontend::SexprReader;

mod builtins;
mod repl;

#[derive(Parser, Debug)]
#[command(
    name = "afnix",
    about = "The AFNIX scripting language interpreter",
    disable_version_flag = true
)]
struct Options {
    /// Print the engine name, operating system and revision
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Force the interactive loop even when a unit is given
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// Compile the unit to a ready form file instead of executing it
    #[arg(short = 'c', long = "compile")]
    compile: bool,

    /// Source or compiled unit to execute
    unit: Option<String>,

    /// Arguments handed to the interpreter
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    env_logger::init();
    let options = match Options::try_parse() {
        Ok(options) => options,
        Err(err) => {
            use clap::error::ErrorKind;
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    std::process::exit(run(options));
}

fn run(options: Options) -> i32 {
    if options.version {
        println!(
            "afnix {} ({})",
            afnix_engine::revision(),
            afnix_engine::os_name()
        );
        return 0;
    }
    log::debug!("options: {:?}", options);
    let mut interp = Interp::new();
    interp.set_reader(Arc::new(SexprReader::new()));
    interp.set_args(options.args.clone());
    if let Err(err) = builtins::install(&interp) {
        report(&err);
        return exit_code(&err);
    }
    match options.unit {
        Some(ref name) if options.compile => {
            let output = compiled_path(name);
            match interp.compile(name, &output) {
                Ok(()) => 0,
                Err(err) => {
                    report(&err);
                    exit_code(&err)
                }
            }
        }
        Some(ref name) if !options.interactive => {
            // An interrupted batch run still exits with a failure code.
            let _ = ctrlc::set_handler(|| std::process::exit(3));
            match interp.loop_unit(name) {
                Ok(true) => 0,
                Ok(false) => 3,
                Err(err) => {
                    report(&err);
                    exit_code(&err)
                }
            }
        }
        _ => {
            match repl::ReplTerminal::new() {
                Ok(terminal) => interp.set_terminal(Box::new(terminal)),
                Err(err) => report(&err),
            }
            repl::print_banner();
            if interp.loop_terminal() {
                0
            } else {
                3
            }
        }
    }
}

/// Exit-code mapping: 1 for parse failures, 2 for a trapped
/// foreign-object exception, 3 for everything else.
fn exit_code(err: &EngineError) -> i32 {
    match err {
        EngineError::SyntaxError(_) => 1,
        EngineError::Throw(_) => 2,
        _ => 3,
    }
}

fn report(err: &EngineError) {
    eprintln!("{} {}", "error:".red().bold(), err);
}

fn compiled_path(name: &str) -> PathBuf {
    let stem = name.strip_suffix(".als").unwrap_or(name);
    PathBuf::from(format!("{}.axc", stem))
}
