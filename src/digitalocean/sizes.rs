use super::Result;
use crate::digitalocean::request::get_list;
use crate::digitalocean::{Client, ListOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A droplet size. `memory` is reported in MiB, `disk` in GiB.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Size {
    pub slug: String,
    pub memory: u64,
    pub vcpus: u64,
    #[serde(default)]
    pub disk: u64,
    #[serde(default)]
    pub price_monthly: f64,
    #[serde(default)]
    pub price_hourly: f64,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub available: bool,
}

#[async_trait]
pub trait Sizes: Send + Sync {
    /// Lists all droplet sizes, following pagination.
    async fn list_sizes(&self) -> Result<Vec<Size>>;
}

#[async_trait]
impl Sizes for Client {
    #[tracing::instrument(name = "Sizes::list_sizes", skip(self))]
    async fn list_sizes(&self) -> Result<Vec<Size>> {
        let mut options = ListOptions::default();
        let mut all_sizes = vec![];

        loop {
            let (mut sizes, links): (Vec<Size>, _) = get_list(
                &self.http_client,
                &self.config,
                "v2/sizes",
                "/sizes",
                HashMap::new(),
                Some(&options),
            )
            .await?;

            let result_is_empty = sizes.is_empty();
            all_sizes.append(&mut sizes);

            if result_is_empty || links.is_last_page() {
                break;
            }

            options.page += 1;
        }

        Ok(all_sizes)
    }
}
