//! Command-line surface.
//!
//! The upstream tool this is modeled on dispatched purely on flags
//! (`-a user`, `-d user`, `-l`, bare paths meaning "take ownership"). We
//! expose the same four operations as explicit subcommands instead, which
//! plays nicer with `--help` and shell completion; `main` still accepts the
//! old bare-paths-means-take-ownership shorthand by inserting the
//! subcommand name when none of the known ones was typed.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "takeown", version, about = "Delegate and exercise rights to take ownership of files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable trace-level diagnostics. Only takes effect if `/.trace` exists,
    /// so that passing this flag alone cannot be used to fish for internal
    /// state on a production host.
    #[arg(short = 'T', long = "trace", global = true)]
    pub trace: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Grant a user the right to take ownership of one or more paths and
    /// their subtrees.
    Add {
        user: String,
        paths: Vec<PathBuf>,
    },

    /// Revoke a previously granted delegation from one or more paths.
    #[command(visible_alias = "rm")]
    Remove {
        user: String,
        paths: Vec<PathBuf>,
    },

    /// List delegations recorded on the volumes containing `paths` (or
    /// every mounted volume if none are given).
    List {
        paths: Vec<PathBuf>,
    },

    /// Take ownership of one or more paths, as the invoking user, if a
    /// delegation (or `CAP_CHOWN`) authorizes it.
    #[command(visible_alias = "take")]
    TakeOwnership {
        paths: Vec<PathBuf>,

        /// Recurse into directories.
        #[arg(short = 'r', long)]
        recursive: bool,

        /// Report what would happen without changing anything.
        #[arg(short = 's', long)]
        simulate: bool,

        /// Print a line for every path ownership is actually taken of.
        #[arg(short = 'v', long)]
        verbose: bool,
    },
}

pub const KNOWN_SUBCOMMANDS: &[&str] = &[
    "add",
    "remove",
    "rm",
    "list",
    "take-ownership",
    "take",
    "help",
    "-h",
    "--help",
    "-V",
    "--version",
];
