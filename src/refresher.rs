use crate::actor;
use crate::cloud_provider::CloudProvider;
use act_zero::runtimes::tokio::Timer;
use act_zero::timer::Tick;
use act_zero::{send, Actor, ActorError, ActorResult, Addr, Produces, WeakAddr};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Refreshes the node group cache of a cloud provider every `interval`.
pub struct Refresher {
    cloud_provider: Box<dyn CloudProvider>,
    interval: Duration,
    timer: Timer,
    addr: WeakAddr<Self>,
}

impl Refresher {
    pub fn new(cloud_provider: Box<dyn CloudProvider>, interval: Duration) -> Self {
        Self {
            cloud_provider,
            interval,
            timer: Default::default(),
            addr: Default::default(),
        }
    }
}

impl fmt::Display for Refresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Refresher ({})", self.cloud_provider.name())
    }
}

#[async_trait]
impl Actor for Refresher {
    #[tracing::instrument(
        name = "Refresher::started",
        skip(self, addr),
        fields(interval = ?self.interval)
    )]
    async fn started(&mut self, addr: Addr<Self>) -> ActorResult<()>
    where
        Self: Sized,
    {
        info!("Started {}", self);

        self.addr = addr.downgrade();
        self.timer
            .set_interval_weak(self.addr.clone(), self.interval);

        Produces::ok(())
    }

    async fn error(&mut self, error: ActorError) -> bool {
        actor::handle_error(error)
    }
}

#[async_trait]
impl Tick for Refresher {
    async fn tick(&mut self) -> ActorResult<()> {
        if self.timer.tick() {
            send!(self.addr.refresh());
        }

        Produces::ok(())
    }
}

impl Refresher {
    #[tracing::instrument(name = "Refresher::refresh", skip(self))]
    pub async fn refresh(&mut self) -> ActorResult<()> {
        self.cloud_provider
            .refresh()
            .await
            .map_err(anyhow::Error::new)
            .map_err(actor::Error::from)?;

        let node_groups = self.cloud_provider.node_groups();
        info!(node_groups = node_groups.len(), "Refreshed node groups");

        for node_group in node_groups {
            debug!(
                id = node_group.id(),
                target_size = ?node_group.target_size().ok(),
                "{}",
                node_group.debug()
            );
        }

        Produces::ok(())
    }
}

#[cfg(test)]
impl Refresher {
    pub async fn node_group_ids(&mut self) -> ActorResult<Vec<String>> {
        Produces::ok(
            self.cloud_provider
                .node_groups()
                .iter()
                .map(|ng| ng.id().to_owned())
                .collect(),
        )
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        info!("Drop {}", self);
    }
}
