use crate::cloud_provider::digitalocean::{to_provider_id, Capacity};
use crate::cloud_provider::{
    Error, Instance, InstanceErrorClass, InstanceErrorInfo, InstanceState, InstanceStatus, Node,
    NodeGroup, NodeTemplate, Resources, Result,
};
use crate::digitalocean::kubernetes::{
    self, Kubernetes, NodePool, NodePoolUpdateRequest, NodeState, NodeStatus,
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Label set by DOKS on every node, holding the node's id within its pool.
pub const NODE_ID_LABEL: &str = "doks.digitalocean.com/node-id";
pub const NODE_POOL_LABEL: &str = "doks.digitalocean.com/node-pool";
pub const NODE_POOL_ID_LABEL: &str = "doks.digitalocean.com/node-pool-id";
pub const INSTANCE_TYPE_LABEL: &str = "node.kubernetes.io/instance-type";

const MAX_PODS_PER_NODE: u64 = 110;
const UNKNOWN_ERROR_CODE: &str = "no-code-digitalocean";

/// A DOKS node pool as a node group of the autoscaler host.
pub struct DigitalOceanNodeGroup {
    id: String,
    cluster_id: String,
    client: Arc<dyn Kubernetes>,
    node_pool: NodePool,
    min_size: u32,
    max_size: u32,
    capacity: Capacity,
}

impl DigitalOceanNodeGroup {
    pub fn new(
        cluster_id: String,
        client: Arc<dyn Kubernetes>,
        node_pool: NodePool,
        capacity: Capacity,
    ) -> Self {
        Self {
            id: node_pool.id.clone(),
            cluster_id,
            client,
            min_size: node_pool.min_nodes,
            max_size: node_pool.max_nodes,
            node_pool,
            capacity,
        }
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    async fn resize(&mut self, operation: &'static str, desired: u32, delta: i32) -> Result<()> {
        let request = NodePoolUpdateRequest {
            name: self.node_pool.name.clone(),
            count: Some(desired),
            auto_scale: Some(self.node_pool.auto_scale),
            min_nodes: Some(self.node_pool.min_nodes),
            max_nodes: Some(self.node_pool.max_nodes),
            ..Default::default()
        };

        let updated = self
            .client
            .update_node_pool(&self.cluster_id, &self.id, &request)
            .await?;

        if updated.count != desired {
            return Err(Error::SizeMismatch {
                operation,
                desired,
                delta,
                current: updated.count,
            });
        }

        info!(
            node_pool_id = self.id.as_str(),
            from = self.node_pool.count,
            to = updated.count,
            "Resized node pool"
        );

        self.node_pool = updated;

        Ok(())
    }
}

#[async_trait]
impl NodeGroup for DigitalOceanNodeGroup {
    fn id(&self) -> &str {
        &self.id
    }

    fn min_size(&self) -> u32 {
        self.min_size
    }

    fn max_size(&self) -> u32 {
        self.max_size
    }

    fn target_size(&self) -> Result<u32> {
        Ok(self.node_pool.count)
    }

    #[tracing::instrument(name = "DigitalOceanNodeGroup::increase_size", skip(self), fields(node_pool_id = %self.id))]
    async fn increase_size(&mut self, delta: i32) -> Result<()> {
        if delta <= 0 {
            return Err(Error::InvalidDelta {
                expected: "positive",
                delta,
            });
        }

        let current = self.node_pool.count;
        let desired = i64::from(current) + i64::from(delta);
        if desired > i64::from(self.max_size) {
            return Err(Error::SizeIncreaseTooLarge {
                current,
                desired,
                max: self.max_size,
            });
        }

        self.resize("increase", desired as u32, delta).await
    }

    #[tracing::instrument(name = "DigitalOceanNodeGroup::delete_nodes", skip(self, nodes), fields(node_pool_id = %self.id))]
    async fn delete_nodes(&mut self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            let node_id = match node.labels.get(NODE_ID_LABEL) {
                Some(v) => v,
                None => {
                    return Err(Error::MissingNodeIdLabel {
                        node: node.name.clone(),
                        provider_id: node.provider_id.clone(),
                        node_pool: self.id.clone(),
                        label: NODE_ID_LABEL,
                    })
                }
            };

            self.client
                .delete_node(&self.cluster_id, &self.id, node_id, None)
                .await
                .map_err(|source| Error::DeleteNode {
                    cluster_id: self.cluster_id.clone(),
                    node_pool: self.id.clone(),
                    node: node_id.clone(),
                    source,
                })?;

            debug!(node = node.name.as_str(), node_id = node_id.as_str(), "Deleted node");

            // the pool shrinks by one for every deleted node
            self.node_pool.count = self.node_pool.count.saturating_sub(1);
        }

        Ok(())
    }

    #[tracing::instrument(name = "DigitalOceanNodeGroup::decrease_target_size", skip(self), fields(node_pool_id = %self.id))]
    async fn decrease_target_size(&mut self, delta: i32) -> Result<()> {
        if delta >= 0 {
            return Err(Error::InvalidDelta {
                expected: "negative",
                delta,
            });
        }

        let current = self.node_pool.count;
        let desired = i64::from(current) + i64::from(delta);
        if desired < i64::from(self.min_size) {
            return Err(Error::SizeDecreaseTooSmall {
                current,
                desired,
                min: self.min_size,
            });
        }

        self.resize("decrease", desired as u32, delta).await
    }

    fn debug(&self) -> String {
        format!(
            "cluster ID: {} node pool: {} (min:{} max:{})",
            self.cluster_id, self.id, self.min_size, self.max_size
        )
    }

    fn nodes(&self) -> Result<Vec<Instance>> {
        Ok(to_instances(&self.node_pool.nodes))
    }

    fn template_node(&self) -> Result<NodeTemplate> {
        let mut labels = self.node_pool.labels.clone();
        labels.insert(NODE_POOL_LABEL.to_owned(), self.node_pool.name.clone());
        labels.insert(NODE_POOL_ID_LABEL.to_owned(), self.id.clone());
        labels.insert(INSTANCE_TYPE_LABEL.to_owned(), self.node_pool.size.clone());

        Ok(NodeTemplate {
            name: format!("{}-template", self.node_pool.name),
            labels,
            capacity: Resources {
                cpu: self.capacity.cpus,
                memory: self.capacity.memory,
                pods: MAX_PODS_PER_NODE,
            },
        })
    }

    fn exist(&self) -> bool {
        true
    }
}

impl fmt::Debug for DigitalOceanNodeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalOceanNodeGroup")
            .field("id", &self.id)
            .field("cluster_id", &self.cluster_id)
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("target_size", &self.node_pool.count)
            .field("capacity", &self.capacity)
            .finish()
    }
}

fn to_instances(nodes: &[kubernetes::Node]) -> Vec<Instance> {
    nodes
        .iter()
        .map(|node| Instance {
            id: to_provider_id(&node.droplet_id),
            status: Some(to_instance_status(&node.status)),
        })
        .collect()
}

fn to_instance_status(status: &NodeStatus) -> InstanceStatus {
    let state = match status.parsed_state() {
        Some(NodeState::Provisioning) => InstanceState::Creating,
        Some(NodeState::Running) => InstanceState::Running,
        Some(NodeState::Draining) | Some(NodeState::Deleting) => InstanceState::Deleting,
        None => {
            return InstanceStatus {
                state: None,
                error_info: Some(InstanceErrorInfo {
                    error_class: InstanceErrorClass::Other,
                    error_code: UNKNOWN_ERROR_CODE.to_owned(),
                    error_message: status.message.clone(),
                }),
            }
        }
    };

    InstanceStatus {
        state: Some(state),
        error_info: None,
    }
}
