use rootdaemon::cli::Cli;

fn main() {
    // Parse arguments, detach and hand over to the target
    if let Err(e) = Cli::run() {
        tracing::error!("{:#}", e);
        eprintln!("✗ Error: {:#}", e);
        std::process::exit(1);
    }
}
