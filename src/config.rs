use crate::AppConfig;
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::time::Duration;

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(with = "humantime_serde", default = "default_scan_interval")]
    pub scan_interval: Duration,
    pub cloud_provider: CloudProvider,
    #[serde(default)]
    pub resource_limits: ResourceLimits,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CloudProvider {
    DigitalOcean {
        /// Path of the JSON cloud config holding cluster id, token and API url.
        cloud_config: String,
    },
}

#[derive(Deserialize, Debug, Default)]
pub struct ResourceLimits {
    #[serde(default)]
    pub min: HashMap<String, i64>,
    #[serde(default)]
    pub max: HashMap<String, i64>,
}

fn default_scan_interval() -> Duration {
    Duration::from_secs(10)
}

pub fn load_config() -> anyhow::Result<AppConfig> {
    let config_path = get_config_path()?;
    let file = File::open(&config_path)
        .with_context(|| format!("Failed to open config file {}", &config_path))?;

    Ok(Arc::new(
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file {}", &config_path))?,
    ))
}

fn get_config_path() -> anyhow::Result<String> {
    use std::env;
    use tracing::info;

    env::var("APP_CONFIG").or_else(|e| {
        info!(
            error = format!("{:?}", e).as_str(),
            "Missing or invalid APP_CONFIG env var, fallback to config.yml"
        );
        Ok("config.yml".to_string())
    })
}
