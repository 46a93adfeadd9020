//! Tool registry for Toolweave
//!
//! The registry merges the tool sets of all validated backends into one
//! ordered, immutable name → capability mapping. It is built once at startup
//! and shared read-only (`Arc<ToolRegistry>`) across sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::CollisionPolicy;
use crate::error::{Result, WeaveError};
use crate::providers::ToolDefinition;

use super::{ToolBackend, ToolContext, ToolOutput, ToolSpec, ValidatedBackend};

/// One resolvable tool.
#[derive(Clone)]
pub struct ToolEntry {
    /// Name exposed to the reasoning engine
    pub name: String,
    /// Name on the owning backend
    pub remote_name: String,
    /// Backend-provided description and schema
    pub spec: ToolSpec,
    /// Owning backend
    pub backend: Arc<dyn ToolBackend>,
}

impl ToolEntry {
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn definition(&self) -> ToolDefinition {
        self.spec.definition(&self.name)
    }
}

impl std::fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEntry")
            .field("name", &self.name)
            .field("remote_name", &self.remote_name)
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// Aggregated, read-only tool registry.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use serde_json::json;
/// use toolweave::config::CollisionPolicy;
/// use toolweave::tools::{math::math_backend, validate_backends, ToolBackend, ToolContext, ToolRegistry};
///
/// # tokio_test::block_on(async {
/// let backends: Vec<Arc<dyn ToolBackend>> = vec![Arc::new(math_backend())];
/// let validated = validate_backends(backends, Duration::from_secs(1)).await.unwrap();
/// let registry = ToolRegistry::aggregate(validated, CollisionPolicy::LastWins).unwrap();
///
/// let out = registry.invoke("add", json!({"a": 3, "b": 4}), &ToolContext::new()).await;
/// assert_eq!(out.for_llm, "7");
/// # });
/// ```
#[derive(Debug, Default)]
pub struct ToolRegistry {
    entries: Vec<ToolEntry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// A registry with no tools.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge the tool sets of validated backends.
    ///
    /// Order is backend order, then tool order within each backend. On a
    /// name collision:
    /// - `LastWins`: the later backend's tool replaces the earlier one in
    ///   place (the name keeps its first position); a warning names both
    ///   backends.
    /// - `Error`: aggregation fails with a configuration error.
    /// - `Namespace`: every tool is exposed as `{backend}_{tool}`, so
    ///   collisions can only come from duplicate backend names, which are
    ///   reported as a configuration error.
    pub fn aggregate(validated: Vec<ValidatedBackend>, policy: CollisionPolicy) -> Result<Self> {
        let mut registry = Self::default();

        for ValidatedBackend { backend, tools } in validated {
            for spec in tools {
                let name = match policy {
                    CollisionPolicy::Namespace => format!("{}_{}", backend.name(), spec.name),
                    _ => spec.name.clone(),
                };
                let entry = ToolEntry {
                    name: name.clone(),
                    remote_name: spec.name.clone(),
                    spec,
                    backend: Arc::clone(&backend),
                };

                match registry.index.get(&name).copied() {
                    None => {
                        registry.index.insert(name, registry.entries.len());
                        registry.entries.push(entry);
                    }
                    Some(idx) => {
                        let previous = registry.entries[idx].backend_name().to_string();
                        match policy {
                            CollisionPolicy::LastWins => {
                                warn!(
                                    tool = %name,
                                    previous_backend = %previous,
                                    winning_backend = %entry.backend_name(),
                                    "Tool name collision, last registered backend wins"
                                );
                                registry.entries[idx] = entry;
                            }
                            CollisionPolicy::Error | CollisionPolicy::Namespace => {
                                return Err(WeaveError::Config(format!(
                                    "tool '{}' is provided by both '{}' and '{}'",
                                    name,
                                    previous,
                                    entry.backend_name()
                                )));
                            }
                        }
                    }
                }
            }
        }

        info!(tools = registry.entries.len(), ?policy, "Tool registry aggregated");
        Ok(registry)
    }

    /// Invoke a tool by its exposed name.
    ///
    /// Never fails: an unknown tool, a transport failure or a tool-side error
    /// all come back as an error `ToolOutput` whose text starts with
    /// `Error:`, so the reasoning engine can react to it.
    pub async fn invoke(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolOutput {
        let Some(entry) = self.get(name) else {
            warn!(tool = %name, "Tool not found");
            return ToolOutput::error(format!("Error: tool not found: {}", name));
        };

        let start = Instant::now();
        let result = entry
            .backend
            .call_tool(&entry.remote_name, args, ctx)
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(output) if output.is_error => {
                warn!(tool = %name, backend = %entry.backend_name(), duration_ms, "Tool reported an error");
                if output.for_llm.starts_with("Error") {
                    output
                } else {
                    ToolOutput::error(format!("Error: {}", output.for_llm))
                }
            }
            Ok(output) => {
                info!(tool = %name, backend = %entry.backend_name(), duration_ms, "Tool executed successfully");
                output
            }
            Err(e) => {
                error!(tool = %name, backend = %entry.backend_name(), error = %e, duration_ms, "Tool execution failed");
                ToolOutput::error(format!("Error: {}", e))
            }
        }
    }

    /// Look up an entry by exposed name.
    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Entries in registry order.
    pub fn entries(&self) -> &[ToolEntry] {
        &self.entries
    }

    /// Tool definitions, in registry order, for the reasoning engine.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries.iter().map(ToolEntry::definition).collect()
    }

    /// Exposed tool names, in registry order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
