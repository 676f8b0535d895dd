//! catalog-sweep binary
//!
//! Loads the configuration, connects to the catalog admin API and runs the
//! requested cleanup command. See `catalog-sweep --help`.

use clap::Parser;
use tracing::info;

use catalog_sweep::cleanup::{AssumeYes, Confirm, ConsolePrompt};
use catalog_sweep::cli::{self, Cli};
use catalog_sweep::{Config, HttpRepository};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let directive = if cli.verbose {
        "catalog_sweep=debug"
    } else {
        "catalog_sweep=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    info!("Config file: {}", cli.config);

    let mut config = Config::load(&cli.config)?;
    cli.apply_overrides(&mut config);

    info!("Catalog: {}", config.catalog.url);

    let repo = HttpRepository::new(&config.catalog)?;
    let confirm: Box<dyn Confirm> = if cli.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(ConsolePrompt)
    };

    // Repository calls run one at a time
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let output = runtime.block_on(cli::execute(&cli, &config, &repo, confirm.as_ref()))?;
    println!("{}", output);

    Ok(())
}
