//! Health probe implementations.

use async_trait::async_trait;
use portal_types::{HealthProbe, HealthStatus, Service};

/// Simulated probe: no real check is performed, a service reports healthy
/// with the configured probability (default 70%).
pub struct SimulatedProbe {
    healthy_ratio: f64,
}

impl SimulatedProbe {
    pub fn new() -> Self {
        Self { healthy_ratio: 0.7 }
    }
}

impl Default for SimulatedProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProbe for SimulatedProbe {
    async fn probe(&self, _service: &Service) -> HealthStatus {
        if rand::random::<f64>() < self.healthy_ratio {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }
}

/// Probe that always returns the same status; used by tests.
pub struct FixedProbe(pub HealthStatus);

#[async_trait]
impl HealthProbe for FixedProbe {
    async fn probe(&self, _service: &Service) -> HealthStatus {
        self.0
    }
}
