use clap::Parser as _;
use medinfo_mcp::config::{Cli, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Must happen before argument parsing so `.env` values feed clap's env fallbacks.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = ServerConfig::from_cli(cli)?;
    medinfo_mcp::logging::init_tracing(&config.log_level, config.log_format)?;

    medinfo_mcp::run(config).await?;
    Ok(())
}
