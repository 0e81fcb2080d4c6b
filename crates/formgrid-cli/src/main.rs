use anyhow::{Context, Result};
use clap::Parser;
use formgrid_cli::{init_logging, run, Cli, CliConfig};
use std::io::Write;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from environment variables, then apply flags
    let mut config = CliConfig::load().context("Failed to load configuration")?;
    cli.apply_to(&mut config).context("Invalid command-line options")?;

    init_logging(&config);
    config.log_warnings();
    config.validate().context("Invalid configuration")?;

    let output = run(cli.command, &config).await.context("Command failed")?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(output.stdout.as_bytes())
        .context("Failed to write output")?;
    stdout.flush().context("Failed to write output")?;

    if !output.success {
        std::process::exit(1);
    }
    Ok(())
}
