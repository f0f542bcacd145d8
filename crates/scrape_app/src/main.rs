mod platform;

use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use platform::logging::LogDestination;

/// Batch image scraper driven by newline-delimited JSON commands on stdin.
#[derive(Debug, Parser)]
#[command(name = "scrape_app", version)]
struct Cli {
    /// RON configuration file.
    #[arg(long, default_value = "scraper.ron")]
    config: PathBuf,
    /// Where log output goes.
    #[arg(long, value_enum, default_value_t = LogDestination::Terminal)]
    log: LogDestination,
    /// Minimum level that gets logged.
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    platform::logging::initialize(cli.log, cli.log_level);

    let config = platform::config::load_config(&cli.config);
    let service = platform::app::Service::new(config);
    platform::app::run(service).await
}
