mod manager;
#[cfg(test)]
mod mock;
mod node_group;

use crate::cloud_provider::{
    CloudProvider, Error, Node, NodeGroup, ResourceLimiter, Result,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

pub use manager::{Capacity, Config, Manager};
pub use node_group::{DigitalOceanNodeGroup, NODE_ID_LABEL};

pub const PROVIDER_NAME: &str = "digitalocean";

const PROVIDER_ID_PREFIX: &str = "digitalocean://";

/// Builds the provider id the host uses for the node backed by `droplet_id`.
pub fn to_provider_id(droplet_id: &str) -> String {
    format!("{}{}", PROVIDER_ID_PREFIX, droplet_id)
}

/// Extracts the droplet id from a provider id. Ids without the
/// `digitalocean://` prefix are returned as they are.
pub fn to_node_id(provider_id: &str) -> &str {
    provider_id
        .strip_prefix(PROVIDER_ID_PREFIX)
        .unwrap_or(provider_id)
}

#[derive(Debug)]
pub struct DigitalOceanCloudProvider {
    manager: Manager,
    resource_limiter: ResourceLimiter,
}

impl DigitalOceanCloudProvider {
    /// Creates the provider and fills its node group cache. Fails if the
    /// initial refresh fails.
    pub async fn new(manager: Manager, resource_limiter: ResourceLimiter) -> Result<Self> {
        let mut provider = Self {
            manager,
            resource_limiter,
        };

        provider.manager.refresh().await?;

        info!(
            cluster_id = provider.manager.cluster_id(),
            node_groups = provider.manager.node_groups().len(),
            "Created DigitalOcean cloud provider"
        );

        Ok(provider)
    }
}

#[async_trait]
impl CloudProvider for DigitalOceanCloudProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn node_groups(&self) -> Vec<&dyn NodeGroup> {
        self.manager
            .node_groups()
            .iter()
            .map(|ng| ng as &dyn NodeGroup)
            .collect()
    }

    fn node_group_mut(&mut self, id: &str) -> Option<&mut dyn NodeGroup> {
        self.manager
            .node_groups_mut()
            .iter_mut()
            .find(|ng| ng.id() == id)
            .map(|ng| ng as &mut dyn NodeGroup)
    }

    fn node_group_for_node(&self, node: &Node) -> Result<Option<&dyn NodeGroup>> {
        let droplet_id = to_node_id(&node.provider_id);

        for node_group in self.manager.node_groups() {
            let instances = node_group.nodes()?;

            if instances.iter().any(|i| to_node_id(&i.id) == droplet_id) {
                return Ok(Some(node_group as &dyn NodeGroup));
            }
        }

        Ok(None)
    }

    fn available_machine_types(&self) -> Result<Vec<String>> {
        Ok(vec![])
    }

    async fn new_node_group(
        &mut self,
        _machine_type: &str,
        _labels: &HashMap<String, String>,
    ) -> Result<Box<dyn NodeGroup>> {
        Err(Error::NotImplemented)
    }

    fn resource_limiter(&self) -> Result<&ResourceLimiter> {
        Ok(&self.resource_limiter)
    }

    async fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        self.manager.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{node, node_pool, MockKubernetes, MockSizes};
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn test_cloud_provider(client: Option<MockKubernetes>) -> DigitalOceanCloudProvider {
        let client = client.unwrap_or_else(|| {
            MockKubernetes::default().with_listing(vec![
                node_pool(
                    "1",
                    "s-1vcpu-2gb",
                    true,
                    vec![node("1", "running", "1"), node("2", "running", "2")],
                ),
                node_pool(
                    "2",
                    "s-1vcpu-2gb",
                    true,
                    vec![node("3", "deleting", "3"), node("4", "running", "4")],
                ),
                node_pool(
                    "3",
                    "s-1vcpu-2gb",
                    true,
                    vec![node("5", "provisioning", "5"), node("6", "running", "6")],
                ),
                node_pool(
                    "4",
                    "s-1vcpu-2gb",
                    false,
                    vec![node("7", "draining", "7"), node("8", "running", "8")],
                ),
            ])
        });

        let manager = Manager::new("123456", Arc::new(client), Arc::new(MockSizes::default()));

        DigitalOceanCloudProvider::new(manager, ResourceLimiter::default())
            .await
            .unwrap()
    }

    fn cluster_node(droplet_id: &str) -> Node {
        Node {
            name: format!("node-{}", droplet_id),
            provider_id: to_provider_id(droplet_id),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_name() {
        let provider = test_cloud_provider(None).await;

        assert_eq!(PROVIDER_NAME, provider.name());
    }

    #[tokio::test]
    async fn test_node_groups() {
        let mut provider = test_cloud_provider(None).await;

        assert_eq!(3, provider.node_groups().len());

        provider.manager.node_groups_mut().clear();
        assert_eq!(0, provider.node_groups().len());
    }

    #[tokio::test]
    async fn test_new_fails_when_initial_refresh_fails() {
        let manager = Manager::new(
            "123456",
            Arc::new(MockKubernetes::default().with_failed_listing()),
            Arc::new(MockSizes::default()),
        );

        let result = DigitalOceanCloudProvider::new(manager, ResourceLimiter::default()).await;

        assert!(matches!(result, Err(Error::Api(_))));
    }

    #[tokio::test]
    async fn test_node_group_for_node() {
        let client = MockKubernetes::default().with_listing(vec![
            node_pool(
                "1",
                "s-1vcpu-2gb",
                true,
                vec![
                    node("2", "deleting", "droplet-2"),
                    node("3", "running", "droplet-3"),
                ],
            ),
            node_pool(
                "2",
                "s-1vcpu-2gb",
                true,
                vec![
                    node("4", "provisioning", "droplet-4"),
                    node("5", "draining", "droplet-5"),
                ],
            ),
        ]);
        let provider = test_cloud_provider(Some(client)).await;

        let node_group = provider
            .node_group_for_node(&cluster_node("droplet-4"))
            .unwrap();

        assert_eq!(Some("2"), node_group.map(|ng| ng.id()));
    }

    #[tokio::test]
    async fn test_node_group_for_node_with_bare_droplet_id() {
        let client = MockKubernetes::default().with_listing(vec![node_pool(
            "1",
            "s-1vcpu-2gb",
            true,
            vec![node("2", "running", "droplet-2")],
        )]);
        let provider = test_cloud_provider(Some(client)).await;

        let node = Node {
            name: String::from("node-2"),
            provider_id: String::from("droplet-2"),
            ..Default::default()
        };
        let node_group = provider.node_group_for_node(&node).unwrap();

        assert_eq!(Some("1"), node_group.map(|ng| ng.id()));
    }

    #[tokio::test]
    async fn test_node_group_for_unknown_node() {
        let client = MockKubernetes::default().with_listing(vec![node_pool(
            "1",
            "s-1vcpu-2gb",
            true,
            vec![
                node("2", "deleting", "droplet-2"),
                node("3", "running", "droplet-3"),
            ],
        )]);
        let provider = test_cloud_provider(Some(client)).await;

        let node_group = provider
            .node_group_for_node(&cluster_node("droplet-7"))
            .unwrap();

        assert!(node_group.is_none());
    }

    #[tokio::test]
    async fn test_node_group_for_node_of_disabled_pool() {
        let provider = test_cloud_provider(None).await;

        let node_group = provider.node_group_for_node(&cluster_node("8")).unwrap();

        assert!(node_group.is_none());
    }

    #[tokio::test]
    async fn test_node_group_mut_scales_cached_group() {
        let client = MockKubernetes::default().with_listing(vec![node_pool(
            "1",
            "s-1vcpu-2gb",
            true,
            vec![],
        )]);
        let mut provider = test_cloud_provider(Some(client)).await;

        provider
            .node_group_mut("1")
            .unwrap()
            .increase_size(1)
            .await
            .unwrap();

        assert_eq!(3, provider.node_groups()[0].target_size().unwrap());
        assert!(provider.node_group_mut("missing").is_none());
    }

    #[tokio::test]
    async fn test_refresh_replaces_node_groups() {
        let client = MockKubernetes::default()
            .with_listing(vec![node_pool("1", "s-1vcpu-2gb", true, vec![])])
            .with_listing(vec![
                node_pool("2", "s-1vcpu-2gb", true, vec![]),
                node_pool("3", "s-1vcpu-2gb", true, vec![]),
            ]);
        let mut provider = test_cloud_provider(Some(client)).await;

        provider.refresh().await.unwrap();

        let ids: Vec<&str> = provider.node_groups().iter().map(|ng| ng.id()).collect();
        assert_eq!(vec!["2", "3"], ids);
    }

    #[tokio::test]
    async fn test_unsupported_operations() {
        let mut provider = test_cloud_provider(None).await;

        assert!(provider.available_machine_types().unwrap().is_empty());
        assert!(matches!(
            provider.new_node_group("s-1vcpu-2gb", &HashMap::new()).await,
            Err(Error::NotImplemented)
        ));
        assert_eq!(
            &ResourceLimiter::default(),
            provider.resource_limiter().unwrap()
        );
        provider.cleanup().await.unwrap();
    }

    #[test]
    fn test_provider_id_round_trip() {
        assert_eq!("digitalocean://droplet-4", to_provider_id("droplet-4"));
        assert_eq!("droplet-4", to_node_id("digitalocean://droplet-4"));
        assert_eq!("droplet-4", to_node_id("droplet-4"));
    }
}
