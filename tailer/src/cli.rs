//! Command line interface
//!
//! Three positional arguments are required. Fewer than that prints the usage
//! line and the process exits successfully.

use clap::Parser;
use clap::error::ErrorKind;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::{CommandSpec, DEFAULT_MAX_LINE_BYTES, DEFAULT_PUBLIC_DIR, DEFAULT_QUEUE_CAPACITY, TailerConfig};

pub const USAGE: &str = "Usage: tailer <ADDRESS:PORT> <WORKING DIR> <COMMAND> [ARGUMENTS]";

/// Runs a command and streams its output to WebSocket subscribers
#[derive(Parser, Debug)]
#[command(name = "tailer")]
#[command(about = "Runs a command and streams its output lines to WebSocket subscribers")]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Directory served at /
    #[arg(long, default_value = DEFAULT_PUBLIC_DIR)]
    pub public_dir: PathBuf,

    /// Lines a subscriber may have queued before it is ejected
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Longest line published, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_BYTES)]
    pub max_line_bytes: usize,

    /// Kill the child when shutdown starts
    #[arg(long)]
    pub kill_child: bool,

    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(value_name = "ADDRESS:PORT")]
    pub address: String,

    /// Working directory of the command
    #[arg(value_name = "WORKING DIR")]
    pub working_dir: PathBuf,

    /// Command to run
    #[arg(value_name = "COMMAND")]
    pub command: String,

    /// Arguments passed to the command verbatim
    #[arg(value_name = "ARGUMENTS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Args {
    /// Build the run configuration from the parsed arguments
    pub fn into_config(self) -> TailerConfig {
        let command = CommandSpec::new(self.command, self.working_dir).with_args(self.args);
        TailerConfig::new(self.address, command)
            .with_public_dir(self.public_dir)
            .with_queue_capacity(self.queue_capacity)
            .with_max_line_bytes(self.max_line_bytes)
            .with_kill_child_on_shutdown(self.kill_child)
    }
}

/// What the process was asked to do
#[derive(Debug)]
pub enum Invocation {
    Run(Box<Args>),
    /// Too few positional arguments
    Usage,
}

/// Parse the command line
///
/// Missing positionals map to [`Invocation::Usage`]; every other parse
/// failure (`--help`, unknown flags, bad numbers) is returned to the caller.
pub fn parse_invocation<I, T>(argv: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Args::try_parse_from(argv) {
        Ok(args) => Ok(Invocation::Run(Box::new(args))),
        Err(e) if e.kind() == ErrorKind::MissingRequiredArgument => Ok(Invocation::Usage),
        Err(e) => Err(e),
    }
}
