mod commands;

use clap::Parser;
use commands::{exit_code, EXIT_CONFIG_ERROR};
use shipyard_core::{install_signal_handler, PublishConfig};
use std::process::ExitCode;

/// Publish a build artifact to object storage and record it in the app's
/// release manifest.
///
/// All inputs come from the environment: ACCOUNT_ID, ACCESS_KEY,
/// ACCESS_SECRET, BUCKET, CHANNEL, APP_ID, VERSION, PLATFORM and
/// EXECUTABLE_PATH are required; ENDPOINT_URL and REGION are optional.
#[derive(Debug, Parser)]
#[command(name = "shipyard", version, verbatim_doc_comment)]
struct Cli {
    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false)]
    trace: bool,
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SHIPYARD_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let config = match PublishConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    install_signal_handler();

    match commands::publish::run(&config) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit_code(&e))
        }
    }
}
