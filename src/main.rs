use clap::Parser;
use tracing::{error, info, span, Level};
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let span = span!(Level::INFO, "main", context = "main");
    let _e = span.enter();
    info!("called");

    let args = cli::Args::parse();
    info!(command = ?args.command, "args");

    if let Err(err) = cli::run(args).await {
        error!(error_message = %format!("{:#}", err), "failed");
        eprintln!("objectgcs: {:#}", err);
        std::process::exit(1);
    }
}
