use cligate::cli;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let filter_level = if verbose { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(filter_level.into()))
        .with_target(true) // Show module path
        .with_level(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::time())
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    match cli::Cli::try_parse() {
        Ok(cli) => {
            init_logging(cli.verbose);

            tracing::debug!("Verbose mode enabled");

            if let Err(e) = cli::run(cli) {
                eprintln!("error: {:#}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            use clap::error::ErrorKind;

            match e.kind() {
                ErrorKind::DisplayVersion | ErrorKind::DisplayHelp => {
                    e.print().ok();
                    std::process::exit(0);
                }
                _ => {
                    e.print().ok();
                    std::process::exit(2);
                }
            }
        }
    }
}
