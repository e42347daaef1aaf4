//! Provisioning seam.
//!
//! # Responsibilities
//! - Abstract the external provisioning collaborator behind a trait
//! - Ship a warm-pool implementation: lease a pre-configured address,
//!   treat the first successful readiness response as the bootstrap signal
//!
//! The image/bootstrap collaborator proper stays external; everything the
//! controller needs is "give me an address", "is it ready yet", and "take
//! it back".

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;

use crate::config::schema::ProvisionerConfig;
use crate::error::FleetError;

/// Handle to a freshly provisioned instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionedInstance {
    pub addr: SocketAddr,
}

/// The provisioning collaborator as the fleet controller sees it.
pub trait Provisioner: Send + Sync + 'static {
    /// Acquire a new instance. Transient failures are retried by the
    /// caller with backoff.
    fn provision(&self) -> impl Future<Output = Result<ProvisionedInstance, FleetError>> + Send;

    /// Block until the instance reports ready. The caller bounds this with
    /// the bootstrap timeout and terminates on expiry.
    fn await_ready(
        &self,
        instance: ProvisionedInstance,
    ) -> impl Future<Output = Result<(), FleetError>> + Send;

    /// Release the instance.
    fn terminate(
        &self,
        instance: ProvisionedInstance,
    ) -> impl Future<Output = Result<(), FleetError>> + Send;
}

/// Leases addresses from a configured warm pool. Readiness is the first
/// successful HTTP response from the instance's ready path.
pub struct AddressPoolProvisioner {
    ready_path: String,
    free: Mutex<Vec<SocketAddr>>,
    client: Client<HttpConnector, Body>,
}

impl AddressPoolProvisioner {
    pub fn new(config: &ProvisionerConfig) -> Self {
        // Addresses were validated at config load.
        let free = config
            .warm_pool
            .iter()
            .filter_map(|a| a.parse().ok())
            .collect();
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            ready_path: config.ready_path.clone(),
            free: Mutex::new(free),
            client,
        }
    }

    pub fn available(&self) -> usize {
        self.free.lock().expect("warm pool mutex poisoned").len()
    }

    async fn probe_ready(&self, addr: SocketAddr) -> bool {
        let uri = format!("http://{}{}", addr, self.ready_path);
        let request = match Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "fleet-control-bootstrap")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!("Failed to build readiness request: {}", e);
                return false;
            }
        };
        match self.client.request(request).await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

impl Provisioner for AddressPoolProvisioner {
    async fn provision(&self) -> Result<ProvisionedInstance, FleetError> {
        let addr = self
            .free
            .lock()
            .expect("warm pool mutex poisoned")
            .pop()
            .ok_or_else(|| {
                FleetError::TransientProvisioning("warm pool exhausted".to_string())
            })?;
        tracing::debug!(addr = %addr, "Leased instance address from warm pool");
        Ok(ProvisionedInstance { addr })
    }

    async fn await_ready(&self, instance: ProvisionedInstance) -> Result<(), FleetError> {
        let mut poll = time::interval(Duration::from_secs(1));
        loop {
            poll.tick().await;
            if self.probe_ready(instance.addr).await {
                return Ok(());
            }
        }
    }

    async fn terminate(&self, instance: ProvisionedInstance) -> Result<(), FleetError> {
        let mut free = self.free.lock().expect("warm pool mutex poisoned");
        if !free.contains(&instance.addr) {
            free.push(instance.addr);
        }
        tracing::debug!(addr = %instance.addr, "Returned instance address to warm pool");
        Ok(())
    }
}
