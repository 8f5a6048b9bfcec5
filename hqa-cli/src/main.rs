//! `hqa`: manage collections, ingest tables, ask questions and run evaluations
//! against a hybrid Qdrant index.

mod app;
mod cli;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    hqa_telemetry::init_telemetry(&cli.telemetry_config())?;

    app::run(cli).await
}
