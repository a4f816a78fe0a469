pub mod digitalocean;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;

use crate::config;
use crate::AppConfig;
use anyhow::Context;
pub use digitalocean::DigitalOceanCloudProvider;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not implemented")]
    NotImplemented,
    #[error("access token is not provided")]
    MissingAccessToken,
    #[error("cluster ID is not provided")]
    MissingClusterId,
    #[error("failed to parse cloud config")]
    ParseConfig(#[from] serde_json::Error),
    #[error("couldn't initialize DigitalOcean client: {0}")]
    ClientInit(#[source] crate::digitalocean::error::Error),
    #[error(transparent)]
    Api(#[from] crate::digitalocean::error::Error),
    #[error("no capacity data found for droplet slug {slug:?}")]
    MissingCapacity { slug: String },
    #[error("delta must be {expected}, have: {delta}")]
    InvalidDelta { expected: &'static str, delta: i32 },
    #[error("size increase is too large. current: {current} desired: {desired} max: {max}")]
    SizeIncreaseTooLarge { current: u32, desired: i64, max: u32 },
    #[error("size decrease is too small. current: {current} desired: {desired} min: {min}")]
    SizeDecreaseTooSmall { current: u32, desired: i64, min: u32 },
    #[error("couldn't {operation} size to {desired} (delta: {delta}). Current size is: {current}")]
    SizeMismatch {
        operation: &'static str,
        desired: u32,
        delta: i32,
        current: u32,
    },
    #[error("cannot delete node {node:?} with provider ID {provider_id:?} on node pool {node_pool:?}: node ID label {label:?} is missing")]
    MissingNodeIdLabel {
        node: String,
        provider_id: String,
        node_pool: String,
        label: &'static str,
    },
    #[error("deleting node failed for cluster: {cluster_id:?} node pool: {node_pool:?} node: {node:?}: {source}")]
    DeleteNode {
        cluster_id: String,
        node_pool: String,
        node: String,
        source: crate::digitalocean::error::Error,
    },
}

/// A Kubernetes node as seen by the autoscaler host.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub provider_id: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// A machine backing a node group, identified by its provider id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub status: Option<InstanceStatus>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstanceStatus {
    pub state: Option<InstanceState>,
    pub error_info: Option<InstanceErrorInfo>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum InstanceState {
    Running,
    Creating,
    Deleting,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceErrorInfo {
    pub error_class: InstanceErrorClass,
    pub error_code: String,
    pub error_message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceErrorClass {
    Other,
}

/// Shape of a node a group would add on scale-up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeTemplate {
    pub name: String,
    pub labels: HashMap<String, String>,
    pub capacity: Resources,
}

/// Memory in bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Resources {
    pub cpu: u64,
    pub memory: u64,
    pub pods: u64,
}

/// Cluster-wide bounds on resources, keyed by resource name (`cpu`, `memory`, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceLimiter {
    min_limits: HashMap<String, i64>,
    max_limits: HashMap<String, i64>,
}

impl ResourceLimiter {
    pub fn new(min_limits: HashMap<String, i64>, max_limits: HashMap<String, i64>) -> Self {
        Self {
            min_limits,
            max_limits,
        }
    }

    pub fn min(&self, resource: &str) -> i64 {
        self.min_limits.get(resource).copied().unwrap_or(0)
    }

    pub fn max(&self, resource: &str) -> i64 {
        self.max_limits.get(resource).copied().unwrap_or(i64::MAX)
    }

    pub fn resources(&self) -> Vec<&str> {
        let mut resources: Vec<&str> = self
            .min_limits
            .keys()
            .chain(self.max_limits.keys())
            .map(String::as_str)
            .collect();
        resources.sort_unstable();
        resources.dedup();

        resources
    }
}

impl fmt::Display for ResourceLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let limits: Vec<String> = self
            .resources()
            .into_iter()
            .map(|r| format!("{{{} : {} - {}}}", r, self.min(r), self.max(r)))
            .collect();

        write!(f, "{}", limits.join(", "))
    }
}

/// A set of machines with the same shape that the host can grow and shrink.
#[async_trait]
pub trait NodeGroup: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;
    fn min_size(&self) -> u32;
    fn max_size(&self) -> u32;

    /// Number of nodes the group should have. May differ from the number of
    /// nodes that are actually up.
    fn target_size(&self) -> Result<u32>;

    async fn increase_size(&mut self, delta: i32) -> Result<()>;

    async fn delete_nodes(&mut self, nodes: &[Node]) -> Result<()>;

    /// Lowers the target size without deleting running nodes.
    async fn decrease_target_size(&mut self, delta: i32) -> Result<()>;

    fn debug(&self) -> String;

    fn nodes(&self) -> Result<Vec<Instance>>;

    fn template_node(&self) -> Result<NodeTemplate>;

    fn exist(&self) -> bool;

    async fn create(&mut self) -> Result<()> {
        Err(Error::NotImplemented)
    }

    async fn delete(&mut self) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn autoprovisioned(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait CloudProvider: Send + Sync {
    fn name(&self) -> &str;

    fn node_groups(&self) -> Vec<&dyn NodeGroup>;

    fn node_group_mut(&mut self, id: &str) -> Option<&mut dyn NodeGroup>;

    /// Returns the group owning `node`, or `None` if the node is not managed
    /// by this provider.
    fn node_group_for_node(&self, node: &Node) -> Result<Option<&dyn NodeGroup>>;

    fn available_machine_types(&self) -> Result<Vec<String>>;

    async fn new_node_group(
        &mut self,
        machine_type: &str,
        labels: &HashMap<String, String>,
    ) -> Result<Box<dyn NodeGroup>>;

    fn resource_limiter(&self) -> Result<&ResourceLimiter>;

    async fn cleanup(&mut self) -> Result<()>;

    async fn refresh(&mut self) -> Result<()>;
}

pub async fn build_from_config(config: AppConfig) -> anyhow::Result<Box<dyn CloudProvider>> {
    let resource_limiter = ResourceLimiter::new(
        config.resource_limits.min.clone(),
        config.resource_limits.max.clone(),
    );

    let cloud_provider: Box<dyn CloudProvider> = match &config.cloud_provider {
        config::CloudProvider::DigitalOcean { cloud_config } => {
            let file = File::open(cloud_config)
                .with_context(|| format!("Failed to open cloud config {}", cloud_config))?;
            let manager = digitalocean::Manager::from_reader(Some(BufReader::new(file)))
                .with_context(|| format!("Failed to create manager from {}", cloud_config))?;

            Box::new(DigitalOceanCloudProvider::new(manager, resource_limiter).await?)
        }
    };

    Ok(cloud_provider)
}
