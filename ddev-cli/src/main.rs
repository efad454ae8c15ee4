use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod handlers;
mod style;

/// `info` for our own crates, `warn` for everything else. `DDEV_DEBUG` raises
/// both to `debug`; `RUST_LOG` replaces the whole filter.
fn init_tracing() {
    let default = if ddev_utils::env::is_debug() {
        "debug"
    } else {
        "warn,ddev_core=info,ddev_utils=info,ddev_platform=info,ddev_cli=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    init_tracing();

    if let Err(e) = handlers::run(cli).await {
        eprintln!("{} error: {:#}", style::CROSS, e);
        std::process::exit(ddev_core::error::exit_code(&e));
    }
}
