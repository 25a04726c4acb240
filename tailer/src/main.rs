//! Main entry point for the tailer binary

use std::process::ExitCode;

use shared::{Component, component_debug, logging};
use tailer::cli::{Invocation, USAGE, parse_invocation};
use tailer::{RealProcessSupervisor, RealSubscriberRegistry, Tailer};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_invocation(std::env::args_os()) {
        Ok(Invocation::Run(args)) => args,
        Ok(Invocation::Usage) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(e) => e.exit(),
    };

    shared::logging::init_tracing_with_level(Some(&args.log_level));
    logging::log_startup(Component::Coordinator, "tailer");

    let config = args.into_config();
    component_debug!(
        Component::Coordinator,
        "Queue capacity: {}, max line: {} bytes, public dir: {}",
        config.queue_capacity,
        config.max_line_bytes,
        config.public_dir.display()
    );

    // Create tailer with dependency injection
    let tailer = Tailer::new(config, RealProcessSupervisor::new(), RealSubscriberRegistry::new());

    match tailer.run().await {
        Ok(report) => {
            component_debug!(Component::Coordinator, "{} lines published", report.lines_published());
            logging::log_success(Component::Coordinator, &format!("Tailer stopped gracefully ({})", report.trigger));
            ExitCode::SUCCESS
        }
        Err(e) => {
            let context = if e.is_startup() { "Startup" } else { "Shutdown" };
            logging::log_error(Component::Coordinator, context, &e);
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
