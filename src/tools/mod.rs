//! Tools module - backends, validation and the aggregated registry
//!
//! # Overview
//!
//! - [`Tool`]: an in-process capability (`math::AddTool`, ...)
//! - [`ToolBackend`]: an independently reachable source of tools, either a
//!   [`LocalBackend`] or a remote [`mcp::McpBackend`]
//! - [`validate_backends`]: concurrent liveness probing at startup
//! - [`ToolRegistry`]: the merged, read-only name → capability mapping
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use toolweave::config::CollisionPolicy;
//! use toolweave::tools::{math::math_backend, validate_backends, ToolBackend, ToolRegistry};
//!
//! # tokio_test::block_on(async {
//! let backends: Vec<Arc<dyn ToolBackend>> = vec![Arc::new(math_backend())];
//! let validated = validate_backends(backends, Duration::from_secs(5)).await.unwrap();
//! let registry = ToolRegistry::aggregate(validated, CollisionPolicy::LastWins).unwrap();
//! assert!(registry.has("divide"));
//! # });
//! ```

mod backend;
pub mod math;
pub mod mcp;
mod registry;
mod types;
mod validate;

use std::sync::Arc;

pub use backend::{LocalBackend, ToolBackend, ToolSpec};
pub use registry::{ToolEntry, ToolRegistry};
pub use types::{Tool, ToolContext, ToolOutput};
pub use validate::{validate_backends, ValidatedBackend};

use crate::config::BackendsConfig;
use crate::error::Result;

/// Build the backend list described by configuration, in declaration order.
///
/// The built-in math backend, when enabled, comes first. Remote backends are
/// not contacted here; that happens in [`validate_backends`].
pub fn backends_from_config(config: &BackendsConfig) -> Result<Vec<Arc<dyn ToolBackend>>> {
    let mut backends: Vec<Arc<dyn ToolBackend>> = Vec::new();
    if config.builtin_math {
        backends.push(Arc::new(math::math_backend()));
    }
    for server in &config.servers {
        backends.push(Arc::new(mcp::McpBackend::from_config(server)?));
    }
    Ok(backends)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendServerConfig, BackendTransport};

    #[test]
    fn test_backends_from_config_order() {
        let mut config = BackendsConfig::default();
        config.servers.push(BackendServerConfig {
            name: "db".into(),
            transport: BackendTransport::Http,
            command: None,
            args: vec![],
            env: Default::default(),
            url: Some("http://127.0.0.1:8001/mcp".into()),
            headers: Default::default(),
            timeout_secs: 5,
        });

        let backends = backends_from_config(&config).unwrap();
        let names: Vec<_> = backends.iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["math", "db"]);
        assert_eq!(backends[1].transport(), "http");
    }

    #[test]
    fn test_backends_from_config_without_math() {
        let config = BackendsConfig {
            builtin_math: false,
            ..Default::default()
        };
        assert!(backends_from_config(&config).unwrap().is_empty());
    }
}
