use super::Result;
use crate::digitalocean::request::{delete, get_list, put};
use crate::digitalocean::{Client, ListOptions};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Treats an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodePool {
    pub id: String,
    pub name: String,
    pub size: String,
    pub count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub auto_scale: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub min_nodes: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub max_nodes: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<Node>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: NodeStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub droplet_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

/// Lifecycle states the API reports for a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum NodeState {
    Provisioning,
    Running,
    Draining,
    Deleting,
}

impl NodeStatus {
    pub fn parsed_state(&self) -> Option<NodeState> {
        self.state.parse().ok()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NodePoolUpdateRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_scale: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_nodes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeDeleteRequest {
    /// Delete the node without draining it first.
    pub skip_drain: bool,
    /// Replace the node with a fresh one instead of shrinking the pool.
    pub replace: bool,
}

#[async_trait]
pub trait Kubernetes: Send + Sync {
    /// Lists all node pools of the given cluster, following pagination.
    async fn list_node_pools(&self, cluster_id: &str) -> Result<Vec<NodePool>>;

    async fn update_node_pool(
        &self,
        cluster_id: &str,
        pool_id: &str,
        request: &NodePoolUpdateRequest,
    ) -> Result<NodePool>;

    async fn delete_node(
        &self,
        cluster_id: &str,
        pool_id: &str,
        node_id: &str,
        request: Option<&NodeDeleteRequest>,
    ) -> Result<()>;
}

#[async_trait]
impl Kubernetes for Client {
    #[tracing::instrument(name = "Kubernetes::list_node_pools", skip(self))]
    async fn list_node_pools(&self, cluster_id: &str) -> Result<Vec<NodePool>> {
        let path = format!("v2/kubernetes/clusters/{}/node_pools", cluster_id);
        let mut options = ListOptions::default();
        let mut all_node_pools = vec![];

        loop {
            let (mut node_pools, links): (Vec<NodePool>, _) = get_list(
                &self.http_client,
                &self.config,
                &path,
                "/node_pools",
                HashMap::new(),
                Some(&options),
            )
            .await?;

            let result_is_empty = node_pools.is_empty();
            all_node_pools.append(&mut node_pools);

            if result_is_empty || links.is_last_page() {
                break;
            }

            options.page += 1;
        }

        Ok(all_node_pools)
    }

    #[tracing::instrument(name = "Kubernetes::update_node_pool", skip(self))]
    async fn update_node_pool(
        &self,
        cluster_id: &str,
        pool_id: &str,
        request: &NodePoolUpdateRequest,
    ) -> Result<NodePool> {
        let path = format!(
            "v2/kubernetes/clusters/{}/node_pools/{}",
            cluster_id, pool_id
        );

        put(&self.http_client, &self.config, &path, request, "/node_pool").await
    }

    #[tracing::instrument(name = "Kubernetes::delete_node", skip(self))]
    async fn delete_node(
        &self,
        cluster_id: &str,
        pool_id: &str,
        node_id: &str,
        request: Option<&NodeDeleteRequest>,
    ) -> Result<()> {
        let path = format!(
            "v2/kubernetes/clusters/{}/node_pools/{}/nodes/{}",
            cluster_id, pool_id, node_id
        );

        let mut params = HashMap::new();
        if let Some(request) = request {
            if request.skip_drain {
                params.insert(String::from("skip_drain"), String::from("1"));
            }
            if request.replace {
                params.insert(String::from("replace"), String::from("1"));
            }
        }

        delete(&self.http_client, &self.config, &path, params).await
    }
}
