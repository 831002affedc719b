use clap::Parser;
use memocat::cli::{run, Cli};
use memocat::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Err(e) = init_tracing() {
        eprintln!("logging disabled: {e}");
    }

    run(cli).await
}
