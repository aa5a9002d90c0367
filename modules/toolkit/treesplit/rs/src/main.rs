use biobit_treesplit_rs::Engine;
use biobit_treesplit_rs::cli::Args;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> eyre::Result<()> {
    // Library code logs through `log`, the subscriber picks those records up via tracing-log
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treesplit=info,biobit_treesplit_rs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Args::parse().into_config()?;
    let summary = Engine::new(config)?.run()?;
    print!("{summary}");
    Ok(())
}
