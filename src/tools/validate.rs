//! Backend validation
//!
//! Every configured backend gets one liveness probe (`list_tools`) at
//! startup. Probes run concurrently, each behind its own timeout, so a hung
//! backend cannot hold up the others. Failures are logged and the backend is
//! dropped; only an empty result is fatal.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{info, warn};

use crate::error::{Result, WeaveError};

use super::{ToolBackend, ToolSpec};

/// A backend that passed its probe, with the tools the probe returned.
#[derive(Clone)]
pub struct ValidatedBackend {
    pub backend: Arc<dyn ToolBackend>,
    pub tools: Vec<ToolSpec>,
}

impl ValidatedBackend {
    pub fn name(&self) -> &str {
        self.backend.name()
    }
}

impl std::fmt::Debug for ValidatedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedBackend")
            .field("backend", &self.backend.name())
            .field("tools", &self.tools.len())
            .finish()
    }
}

async fn probe(backend: &Arc<dyn ToolBackend>, timeout: Duration) -> Result<Vec<ToolSpec>> {
    match tokio::time::timeout(timeout, backend.list_tools()).await {
        Ok(Ok(tools)) => Ok(tools),
        Ok(Err(e)) => Err(WeaveError::Backend {
            backend: backend.name().to_string(),
            message: e.to_string(),
        }),
        Err(_) => Err(WeaveError::Backend {
            backend: backend.name().to_string(),
            message: format!("liveness probe timed out after {}s", timeout.as_secs_f32()),
        }),
    }
}

/// Probe all backends and keep the ones that answer.
///
/// Survivors keep their input order. Returns
/// `WeaveError::Config("No tool backends available")` when none survive.
pub async fn validate_backends(
    backends: Vec<Arc<dyn ToolBackend>>,
    probe_timeout: Duration,
) -> Result<Vec<ValidatedBackend>> {
    let started = Instant::now();
    let probes = backends.iter().map(|b| probe(b, probe_timeout));
    let results = join_all(probes).await;

    let mut validated = Vec::with_capacity(backends.len());
    for (backend, result) in backends.into_iter().zip(results) {
        match result {
            Ok(tools) => {
                info!(
                    backend = %backend.name(),
                    transport = %backend.transport(),
                    tools = tools.len(),
                    "Backend validated"
                );
                validated.push(ValidatedBackend { backend, tools });
            }
            Err(e) => {
                warn!(backend = %backend.name(), error = %e, "Dropping backend");
            }
        }
    }

    if validated.is_empty() {
        return Err(WeaveError::Config("No tool backends available".into()));
    }

    info!(
        validated = validated.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Backend validation finished"
    );
    Ok(validated)
}
