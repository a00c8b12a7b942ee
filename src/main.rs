use clap::Parser;
use flow_inspirations::cli::commands::{cmd_ingest, cmd_resolve, cmd_serve};
use flow_inspirations::cli::config::{Cli, Commands, load_config};
use flow_inspirations::logging;
use flow_inspirations::resolve::model::Recommendation;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = load_config(cli.config.as_deref());
    let aliases = cli.aliases.as_deref();

    match cli.command {
        Commands::Serve { bind } => {
            cmd_serve(bind.as_deref(), &config, aliases).await?;
        }
        Commands::Resolve { app, flow, text } => {
            let recommendation = Recommendation { app, flow, text };
            cmd_resolve(recommendation, &config, aliases).await?;
        }
        Commands::Ingest { app, flow, dir } => {
            cmd_ingest(&app, &flow, &dir, &config, aliases).await?;
        }
    }

    Ok(())
}
