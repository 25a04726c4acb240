//! Runtime configuration for the tailer

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{TailerError, TailerResult};

/// Messages a subscriber may have queued before it is ejected
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Deadline for writing one frame to a subscriber
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Request timeout for plain HTTP traffic
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for graceful shutdown before connections are force-closed
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Longest line a reader will publish, in bytes
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Directory served at `/`
pub const DEFAULT_PUBLIC_DIR: &str = "./public";

/// The command to run and where to run it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
        }
    }

    /// Append arguments (fluent API)
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Complete configuration of one tailer run
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// `ADDRESS:PORT` to listen on
    pub listen_addr: String,

    pub command: CommandSpec,

    /// Root of the static front-end
    pub public_dir: PathBuf,

    pub queue_capacity: usize,
    pub write_timeout: Duration,
    pub http_timeout: Duration,
    pub shutdown_grace: Duration,
    pub max_line_bytes: usize,

    /// Kill the child once shutdown starts instead of leaving it running
    pub kill_child_on_shutdown: bool,
}

impl TailerConfig {
    /// Create a config with default limits
    pub fn new(listen_addr: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            command,
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            kill_child_on_shutdown: false,
        }
    }

    /// Configure static file root (fluent API)
    pub fn with_public_dir(mut self, public_dir: impl Into<PathBuf>) -> Self {
        self.public_dir = public_dir.into();
        self
    }

    /// Configure per-subscriber queue capacity (fluent API)
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Configure per-frame write deadline (fluent API)
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Configure HTTP request timeout (fluent API)
    pub fn with_http_timeout(mut self, http_timeout: Duration) -> Self {
        self.http_timeout = http_timeout;
        self
    }

    /// Configure graceful shutdown budget (fluent API)
    pub fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }

    /// Configure the line length limit (fluent API)
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Configure child kill on shutdown (fluent API)
    pub fn with_kill_child_on_shutdown(mut self, kill: bool) -> Self {
        self.kill_child_on_shutdown = kill;
        self
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> TailerResult<()> {
        if self.listen_addr.trim().is_empty() {
            return Err(TailerError::config("listen_addr", "must not be empty"));
        }
        if self.command.program.trim().is_empty() {
            return Err(TailerError::config("command", "must not be empty"));
        }
        if self.queue_capacity == 0 {
            return Err(TailerError::config("queue_capacity", "must be at least 1"));
        }
        if self.max_line_bytes == 0 {
            return Err(TailerError::config("max_line_bytes", "must be at least 1"));
        }
        if self.write_timeout.is_zero() {
            return Err(TailerError::config("write_timeout", "must be non-zero"));
        }
        Ok(())
    }
}
