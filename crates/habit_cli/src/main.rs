//! `habit-tracker` entry point.
//!
//! # Responsibility
//! - Bootstrap logging and the habit store under `~/.habit-tracker`.
//! - Hand stdin/stdout to the interactive session.
//! - Map startup failures to a non-zero exit code and a stderr message.

mod session;

use clap::Parser;
use habit_core::{init_logging, log_level_for, AppPaths, HabitStore, SystemClock};
use log::{error, info};
use session::Session;
use std::io;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "habit-tracker")]
#[command(version)]
#[command(about = "Track daily habits from the terminal")]
struct Cli {
    /// Write debug-level events to the log file
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match AppPaths::resolve_default() {
        Ok(paths) => paths,
        Err(err) => {
            eprintln!("Error resolving data directory: {err}");
            return ExitCode::FAILURE;
        }
    };

    // Running without a log file is preferable to not running at all.
    if let Err(err) = init_logging(log_level_for(cli.verbose), &paths.log_dir()) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let store = match HabitStore::initialize_at(&paths) {
        Ok(store) => store,
        Err(err) => {
            error!(
                "event=app_exit module=cli status=error error_code={}",
                err.code()
            );
            eprintln!("Error initializing storage: {err}");
            return ExitCode::FAILURE;
        }
    };

    let clock = SystemClock;
    let mut session = Session::new(&store, &clock);
    let stdin = io::stdin();
    let stdout = io::stdout();
    match session.run(stdin.lock(), stdout.lock()) {
        Ok(()) => {
            info!("event=app_exit module=cli status=ok");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=app_exit module=cli status=error error={err}");
            eprintln!("Error running program: {err}");
            ExitCode::FAILURE
        }
    }
}
