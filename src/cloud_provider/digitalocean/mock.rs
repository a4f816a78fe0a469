use crate::digitalocean::error::Error;
use crate::digitalocean::kubernetes::{
    Kubernetes, Node, NodeDeleteRequest, NodePool, NodePoolUpdateRequest, NodeStatus,
};
use crate::digitalocean::sizes::{Size, Sizes};
use crate::digitalocean::Result;
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn node_pool(id: &str, size: &str, auto_scale: bool, nodes: Vec<Node>) -> NodePool {
    NodePool {
        id: id.to_owned(),
        name: format!("pool-{}", id),
        size: size.to_owned(),
        count: 2,
        auto_scale,
        min_nodes: 1,
        max_nodes: 5,
        nodes,
        ..Default::default()
    }
}

pub fn node(id: &str, state: &str, droplet_id: &str) -> Node {
    Node {
        id: id.to_owned(),
        name: format!("node-{}", id),
        status: NodeStatus {
            state: state.to_owned(),
            message: String::new(),
        },
        droplet_id: droplet_id.to_owned(),
        ..Default::default()
    }
}

fn bad_response(status: StatusCode) -> Error {
    Error::BadResponse {
        status,
        headers: HeaderMap::new(),
        body: String::new(),
    }
}

/// Replays queued node pool listings and records every mutation.
#[derive(Default)]
pub struct MockKubernetes {
    listings: Mutex<VecDeque<Result<Vec<NodePool>>>>,
    update_count: Option<u32>,
    failing_deletes: HashSet<String>,
    updates: Mutex<Vec<(String, NodePoolUpdateRequest)>>,
    deleted: Mutex<Vec<(String, String)>>,
}

impl MockKubernetes {
    pub fn with_listing(self, node_pools: Vec<NodePool>) -> Self {
        self.listings.lock().unwrap().push_back(Ok(node_pools));
        self
    }

    pub fn with_failed_listing(self) -> Self {
        self.listings
            .lock()
            .unwrap()
            .push_back(Err(bad_response(StatusCode::INTERNAL_SERVER_ERROR)));
        self
    }

    /// Makes updates report `count` regardless of the requested count.
    pub fn with_update_count(mut self, count: u32) -> Self {
        self.update_count = Some(count);
        self
    }

    pub fn with_failing_delete(mut self, node_id: &str) -> Self {
        self.failing_deletes.insert(node_id.to_owned());
        self
    }

    pub fn updates(&self) -> Vec<(String, NodePoolUpdateRequest)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Kubernetes for MockKubernetes {
    async fn list_node_pools(&self, _cluster_id: &str) -> Result<Vec<NodePool>> {
        self.listings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(bad_response(StatusCode::NOT_FOUND)))
    }

    async fn update_node_pool(
        &self,
        _cluster_id: &str,
        pool_id: &str,
        request: &NodePoolUpdateRequest,
    ) -> Result<NodePool> {
        self.updates
            .lock()
            .unwrap()
            .push((pool_id.to_owned(), request.clone()));

        Ok(NodePool {
            id: pool_id.to_owned(),
            name: request.name.clone(),
            count: self.update_count.or(request.count).unwrap_or_default(),
            auto_scale: request.auto_scale.unwrap_or_default(),
            min_nodes: request.min_nodes.unwrap_or_default(),
            max_nodes: request.max_nodes.unwrap_or_default(),
            ..Default::default()
        })
    }

    async fn delete_node(
        &self,
        _cluster_id: &str,
        pool_id: &str,
        node_id: &str,
        _request: Option<&NodeDeleteRequest>,
    ) -> Result<()> {
        if self.failing_deletes.contains(node_id) {
            return Err(bad_response(StatusCode::INTERNAL_SERVER_ERROR));
        }

        self.deleted
            .lock()
            .unwrap()
            .push((pool_id.to_owned(), node_id.to_owned()));

        Ok(())
    }
}

/// Serves a fixed set of droplet sizes and counts how often it was asked.
pub struct MockSizes {
    sizes: Vec<Size>,
    fail: bool,
    calls: AtomicUsize,
}

impl Default for MockSizes {
    fn default() -> Self {
        let size = |slug: &str, vcpus: u64, memory: u64| Size {
            slug: slug.to_owned(),
            vcpus,
            memory,
            available: true,
            ..Default::default()
        };

        Self {
            sizes: vec![
                size("s-1vcpu-2gb", 1, 2048),
                size("s-2vcpu-4gb", 2, 4096),
                size("s-4vcpu-8gb", 4, 8192),
            ],
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MockSizes {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sizes for MockSizes {
    async fn list_sizes(&self) -> Result<Vec<Size>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(bad_response(StatusCode::SERVICE_UNAVAILABLE));
        }

        Ok(self.sizes.clone())
    }
}
