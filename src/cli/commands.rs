use std::path::Path;

use log::warn;

use crate::cli::config::{
    AppConfig, ServiceConfig, build_alias_table, build_downloader, build_resolver, dust_api_key,
};
use crate::resolve::cascade::Resolver;
use crate::resolve::ingest::{ingest_batch, read_image_dir};
use crate::resolve::model::{Recommendation, ResolveResponse};
use crate::server::routes::{AppState, serve};

// ============================================================================
// serve subcommand
// ============================================================================

/// Run the HTTP API. Missing credentials don't stop the server: every
/// request answers with a configuration error instead.
pub async fn cmd_serve(
    bind: Option<&str>,
    config: &AppConfig,
    aliases_path: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let aliases = build_alias_table(aliases_path, config)?;

    let state = match ServiceConfig::from_env().and_then(|service| build_resolver(config, &service, aliases)) {
        Ok(resolver) => AppState::new(resolver),
        Err(e) => {
            warn!("starting without a backend: {}", e);
            AppState::misconfigured(e)
        }
    };

    let dust_key = dust_api_key(|key| std::env::var(key).ok());
    let state = state.with_downloader(build_downloader(config, &dust_key)?);

    let bind = bind.unwrap_or(config.server.bind.as_str());
    serve(bind, state).await?;
    Ok(())
}

// ============================================================================
// resolve subcommand
// ============================================================================

pub async fn cmd_resolve(
    recommendation: Recommendation,
    config: &AppConfig,
    aliases_path: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = configured_resolver(config, aliases_path)?;
    let response: ResolveResponse = resolver.resolve(&recommendation).await.into();
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

// ============================================================================
// ingest subcommand
// ============================================================================

pub async fn cmd_ingest(
    app: &str,
    flow: &str,
    dir: &str,
    config: &AppConfig,
    aliases_path: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = configured_resolver(config, aliases_path)?;
    let files = read_image_dir(Path::new(dir)).await?;

    let report = ingest_batch(
        resolver.catalog().as_ref(),
        resolver.objects().as_ref(),
        app,
        flow,
        files,
    )
    .await?;

    println!("Uploaded {} screens to flow {}", report.count, report.flow_id);
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn configured_resolver(
    config: &AppConfig,
    aliases_path: Option<&str>,
) -> Result<Resolver, Box<dyn std::error::Error>> {
    let aliases = build_alias_table(aliases_path, config)?;
    let service = ServiceConfig::from_env()?;
    Ok(build_resolver(config, &service, aliases)?)
}
