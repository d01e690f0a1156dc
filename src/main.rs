use std::path::PathBuf;

use clap::Parser;
use libris_api::{
    api,
    config::{AppConfig, DEFAULT_JWT_SECRET},
    logging,
};

#[derive(Debug, Parser)]
#[command(name = "libris-api", about = "Library management backend")]
struct Cli {
    /// Extra settings file layered over config/default and config/local
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    logging::init_logging(&config.logging)?;

    if config.jwt.secret == DEFAULT_JWT_SECRET {
        tracing::warn!("Using the default JWT secret; set APP__JWT__SECRET");
    }

    api::server::start_server(&config).await
}
