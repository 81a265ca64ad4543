use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use tandem_core::error::{Result, TandemError};
use tandem_core::traits::Capability;

/// Registry of available capabilities.
///
/// The engine treats every capability as idempotent-enough for the agent to
/// retry manually; the registry itself never retries.
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    /// Register a capability.
    pub fn register(&mut self, capability: impl Capability) {
        let name = capability.name().to_string();
        self.capabilities.insert(name, Arc::new(capability));
    }

    /// Get a capability by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    /// List all registered capability names.
    pub fn list(&self) -> Vec<&str> {
        self.capabilities.keys().map(|s| s.as_str()).collect()
    }

    /// Collect the usage instruction blocks for the given toolset names,
    /// skipping names that are not registered.
    pub fn usage_instructions(&self, toolsets: &[String]) -> String {
        toolsets
            .iter()
            .filter_map(|name| self.get(name))
            .map(|c| c.usage())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Invoke a capability by name, bounded by its declared timeout.
    ///
    /// A timeout is a call failure, not a process abort.
    pub async fn invoke(&self, name: &str, argument: String) -> Result<String> {
        let capability = self
            .get(name)
            .ok_or_else(|| TandemError::CapabilityNotFound(name.to_string()))?;

        let timeout_secs = capability.timeout_secs();
        debug!(capability = name, timeout_secs, "Invoking capability");

        let timeout = std::time::Duration::from_secs(timeout_secs);
        match tokio::time::timeout(timeout, capability.invoke(argument)).await {
            Ok(result) => result,
            Err(_) => Err(TandemError::CapabilityTimeout {
                name: name.to_string(),
                timeout_secs,
            }),
        }
    }

    /// Create a registry with all built-in capabilities registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(crate::builtin::calculator::CalculatorCapability);
        registry
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;

    struct SlowCapability;

    impl Capability for SlowCapability {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps past its own timeout"
        }

        fn usage(&self) -> String {
            String::new()
        }

        fn invoke(&self, _argument: String) -> BoxFuture<'_, Result<String>> {
            Box::pin(async {
                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                Ok("too late".to_string())
            })
        }

        fn timeout_secs(&self) -> u64 {
            1
        }
    }

    #[tokio::test]
    async fn test_unknown_capability() {
        let registry = CapabilityRegistry::new();
        let err = registry.invoke("nope", "x".into()).await.unwrap_err();
        assert!(matches!(err, TandemError::CapabilityNotFound(name) if name == "nope"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_times_out() {
        let mut registry = CapabilityRegistry::new();
        registry.register(SlowCapability);

        let err = registry.invoke("slow", String::new()).await.unwrap_err();
        assert!(matches!(
            err,
            TandemError::CapabilityTimeout { timeout_secs: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_builtins_include_calculator() {
        let registry = CapabilityRegistry::with_builtins();
        assert!(registry.get("calculator").is_some());
        assert!(registry.list().contains(&"calculator"));
        assert_eq!(registry.invoke("calculator", "2+2".into()).await.unwrap(), "4");
    }

    #[test]
    fn test_usage_instructions_skip_unknown() {
        let registry = CapabilityRegistry::with_builtins();
        let usage = registry.usage_instructions(&["calculator".into(), "missing".into()]);
        assert!(usage.contains("ACTION: calculator"));
        assert!(!usage.contains("missing"));
    }
}
