use crate::cloud_provider::digitalocean::DigitalOceanNodeGroup;
use crate::cloud_provider::{Error, Result};
use crate::digitalocean::{self, Kubernetes, Sizes};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Cloud config of the DigitalOcean provider.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Id of the DOKS cluster the autoscaler is running in.
    #[serde(default)]
    pub cluster_id: String,
    /// Access token of the account owning the cluster.
    #[serde(default)]
    pub token: String,
    /// DigitalOcean API address, `https://api.digitalocean.com/` when empty.
    #[serde(default)]
    pub url: String,
}

/// Static machine shape of a droplet size. Memory in bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capacity {
    pub cpus: u64,
    pub memory: u64,
}

/// Talks to the DigitalOcean API and caches the node groups (DOKS node pools)
/// of a single cluster.
pub struct Manager {
    client: Arc<dyn Kubernetes>,
    sizes: Arc<dyn Sizes>,
    cluster_id: String,
    node_groups: Vec<DigitalOceanNodeGroup>,
    capacity_by_droplet_slug: HashMap<String, Capacity>,
}

impl Manager {
    pub fn new(
        cluster_id: impl Into<String>,
        client: Arc<dyn Kubernetes>,
        sizes: Arc<dyn Sizes>,
    ) -> Self {
        Self {
            client,
            sizes,
            cluster_id: cluster_id.into(),
            node_groups: vec![],
            capacity_by_droplet_slug: HashMap::new(),
        }
    }

    /// Builds a manager from a JSON cloud config. A missing reader is treated
    /// like an empty config.
    pub fn from_reader<R: Read>(reader: Option<R>) -> Result<Self> {
        let config: Config = match reader {
            Some(reader) => serde_json::from_reader(reader)?,
            None => Config::default(),
        };

        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        if config.token.is_empty() {
            return Err(Error::MissingAccessToken);
        }
        if config.cluster_id.is_empty() {
            return Err(Error::MissingClusterId);
        }

        let mut builder = digitalocean::Client::builder()
            .api_token(config.token)
            .user_agent(user_agent());
        if !config.url.is_empty() {
            builder = builder.address(config.url);
        }

        let client = Arc::new(builder.build().map_err(Error::ClientInit)?);

        Ok(Self::new(config.cluster_id, client.clone(), client))
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn node_groups(&self) -> &[DigitalOceanNodeGroup] {
        &self.node_groups
    }

    pub(crate) fn node_groups_mut(&mut self) -> &mut Vec<DigitalOceanNodeGroup> {
        &mut self.node_groups
    }

    /// Re-lists the node pools of the cluster and replaces the cached node
    /// groups with the auto-scaled ones. On error the cache is left as it was.
    #[tracing::instrument(name = "Manager::refresh", skip(self), fields(cluster_id = %self.cluster_id))]
    pub async fn refresh(&mut self) -> Result<()> {
        self.ensure_capacity_map().await?;

        let node_pools = self.client.list_node_pools(&self.cluster_id).await?;

        let mut node_groups = Vec::with_capacity(node_pools.len());
        for node_pool in node_pools.into_iter().filter(|np| np.auto_scale) {
            let capacity = match self.capacity_by_droplet_slug.get(&node_pool.size) {
                Some(v) => *v,
                None => {
                    return Err(Error::MissingCapacity {
                        slug: node_pool.size,
                    })
                }
            };

            debug!(
                node_pool_id = node_pool.id.as_str(),
                name = node_pool.name.as_str(),
                min = node_pool.min_nodes,
                max = node_pool.max_nodes,
                cpus = capacity.cpus,
                memory = capacity.memory,
                "Adding node pool"
            );

            node_groups.push(DigitalOceanNodeGroup::new(
                self.cluster_id.clone(),
                Arc::clone(&self.client),
                node_pool,
                capacity,
            ));
        }

        if node_groups.is_empty() {
            debug!("cluster-autoscaler is disabled, no node pools are configured");
        }

        self.node_groups = node_groups;

        Ok(())
    }

    async fn ensure_capacity_map(&mut self) -> Result<()> {
        if !self.capacity_by_droplet_slug.is_empty() {
            return Ok(());
        }

        let sizes = self.sizes.list_sizes().await?;
        self.capacity_by_droplet_slug = sizes
            .into_iter()
            .map(|size| {
                let capacity = Capacity {
                    cpus: size.vcpus,
                    memory: size.memory * BYTES_PER_MIB,
                };

                (size.slug, capacity)
            })
            .collect();

        debug!(
            sizes = self.capacity_by_droplet_slug.len(),
            "Populated capacity map"
        );

        Ok(())
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("cluster_id", &self.cluster_id)
            .field("node_groups", &self.node_groups)
            .field("capacity_by_droplet_slug", &self.capacity_by_droplet_slug)
            .finish()
    }
}

fn user_agent() -> String {
    format!(
        "cluster-autoscaler-digitalocean/{}",
        env!("CARGO_PKG_VERSION")
    )
}
