//! `takeown`: delegate, and exercise delegated rights to, ownership of files.

mod cli;
mod commands;
mod logger;

use clap::error::ErrorKind;
use clap::Parser;
use takeown_common::exitcode;
use takeown_core::CoreError;

use cli::{Cli, Command, KNOWN_SUBCOMMANDS};

fn main() {
    let cli = match Cli::try_parse_from(args_with_default_subcommand()) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exitcode::SUCCESS,
                _ => exitcode::USAGE,
            };
            std::process::exit(code);
        }
    };
    if logger::try_enable_trace(cli.trace).is_err() {
        eprintln!("error: the file /.trace must exist to enable tracing");
        std::process::exit(exitcode::PERMISSION_DENIED);
    }
    logger::init(cli.trace);

    tracing::debug!(?cli, "parsed command line");

    let result = match cli.command {
        Command::Add { user, paths } => commands::add::run(&user, &paths),
        Command::Remove { user, paths } => commands::remove::run(&user, &paths),
        Command::List { paths } => commands::list::run(&paths),
        Command::TakeOwnership {
            paths,
            recursive,
            simulate,
            verbose,
        } => commands::take_ownership::run(&paths, recursive, simulate, verbose),
    };

    let code = match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("takeown: {error:#}");
            exit_code_for(&error)
        }
    };

    std::process::exit(code);
}

/// Map a failed command's error to a process exit code. Commands bundle
/// every `CoreError` behind `anyhow::Context`, so the concrete error is
/// recovered by walking the causal chain.
fn exit_code_for(error: &anyhow::Error) -> i32 {
    for cause in error.chain() {
        if let Some(core_error) = cause.downcast_ref::<CoreError>() {
            return match core_error {
                CoreError::PermissionDenied { .. } | CoreError::NotDelegated { .. } => {
                    exitcode::PERMISSION_DENIED
                }
                _ => exitcode::OPERATION_ERROR,
            };
        }
    }
    exitcode::OPERATION_ERROR
}

/// Accept the upstream tool's old bare-paths shorthand (`takeown -r -v
/// path...` with no subcommand) by inserting `take-ownership` when the
/// first argument isn't already a known subcommand or a help/version flag.
fn args_with_default_subcommand() -> Vec<String> {
    let mut args: Vec<String> = std::env::args().collect();
    let needs_default = match args.get(1) {
        Some(first) => !KNOWN_SUBCOMMANDS.contains(&first.as_str()),
        None => false,
    };
    if needs_default {
        args.insert(1, "take-ownership".to_string());
    }
    args
}
