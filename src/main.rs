use act_zero::runtimes::tokio::spawn_actor;
use act_zero::AddrLike;
use doks_cloud_provider::cloud_provider;
use doks_cloud_provider::config::load_config;
use doks_cloud_provider::refresher::Refresher;
use std::sync::Arc;
use tracing::info;
use tracing::subscriber::set_global_default;
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

    let subscriber = Registry::default()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer);

    set_global_default(subscriber)?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;
    let config = load_config()?;

    let cloud_provider = cloud_provider::build_from_config(Arc::clone(&config)).await?;
    let resource_limiter = cloud_provider.resource_limiter()?;
    info!(
        provider = cloud_provider.name(),
        resource_limits = %resource_limiter,
        "Initialized cloud provider"
    );

    let refresher = spawn_actor(Refresher::new(cloud_provider, config.scan_interval));

    tokio::select! {
        _ = refresher.termination() => info!("Refresher terminated"),
        _ = tokio::signal::ctrl_c() => info!("Received interrupt, shutting down"),
    }

    Ok(())
}
