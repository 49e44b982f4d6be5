use anyhow::Result;
use bit_change_detect::cli::Cli;
use clap::Parser;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bit_change_detect=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
