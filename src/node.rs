//! Node orchestration: wires configuration, the shared API state, the
//! optional background resolve loop and the HTTP server together.

use crate::api;
use crate::config::Config;
use crate::error::ChainError;
use crate::sync::ResolveOutcome;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    Ready,
    ShuttingDown,
}

pub struct Node {
    pub config: Config,
    pub api: Arc<api::Node>,
}

impl Node {
    pub async fn init(config: Config) -> Result<Self, ChainError> {
        let api = Arc::new(api::Node::from_config(&config)?);
        api.set_state(NodeState::Booting).await;

        info!(
            bind = %config.network.bind_address,
            port = config.network.api_port,
            peers = api.network.directory().len(),
            max_attempts = api.mining_bound().max_attempts,
            "Starting FileChain node"
        );

        Ok(Self { config, api })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ChainError> {
        let ip: IpAddr = self.config.network.bind_address.parse().map_err(|_| {
            ChainError::Config(format!(
                "network.bind_address {:?} is not an IP address",
                self.config.network.bind_address
            ))
        })?;
        Ok(SocketAddr::new(ip, self.config.network.api_port))
    }

    /// Runs until `shutdown` resolves.
    pub async fn start<F>(self, shutdown: F) -> Result<(), ChainError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.bind_addr()?;

        let resolve_task = self
            .config
            .network
            .auto_resolve_interval()
            .map(|every| spawn_resolve_loop(self.api.clone(), every));

        let result = api::run_api_server(self.api.clone(), addr, shutdown).await;

        if let Some(task) = resolve_task {
            task.abort();
        }
        if let Err(e) = &result {
            error!(error = %e, "API server failed");
        }
        result
    }
}

/// Periodically applies the longest-chain rule against the peer directory.
fn spawn_resolve_loop(node: Arc<api::Node>, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "background chain resolution enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately; peers are rarely up yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if node.network.directory().is_empty() {
                continue;
            }
            let report = node.resolver.resolve().await;
            if report.outcome == ResolveOutcome::Replaced {
                info!(length = report.length, "background resolve adopted a longer chain");
            }
        }
    })
}

/// Completes on Ctrl-C. If the signal handler cannot be installed the node
/// keeps running rather than exiting at once.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
