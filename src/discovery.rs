//! Discovery boundary (spec §6): a host-implemented source of tools the
//! [`crate::lifecycle::LifecycleManager`] pulls from at startup, in
//! addition to whatever the host registers by hand. The teacher has no
//! discovery concept (tools are always registered explicitly); this is
//! new code grounded on `registry.rs`'s registration API and
//! `ToolMetadata`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::DynTool;
use crate::core::ToolMetadata;

/// Options passed to a [`Discovery`] implementation, e.g. search paths
/// or a plugin directory. Left intentionally open — the core does not
/// interpret these, only the host's discovery implementation does.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    pub paths: Vec<String>,
    pub tags: Vec<String>,
}

/// A tool found by discovery, not yet registered.
pub struct DiscoveredTool {
    pub metadata: ToolMetadata,
    pub tool: Box<dyn DynTool>,
}

/// Consumed-only boundary (spec §6): the core calls `discover` during
/// [`crate::lifecycle::LifecycleManager::initialize`] and registers
/// whatever comes back, skipping duplicates by tool name. No concrete
/// implementation ships in this crate — file-system plugin loading,
/// network registries, etc. are host concerns.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn discover(&self, options: &DiscoveryOptions) -> Vec<DiscoveredTool>;
}

/// A `Discovery` that finds nothing; the default when a host doesn't
/// wire one up.
pub struct NullDiscovery;

#[async_trait]
impl Discovery for NullDiscovery {
    async fn discover(&self, _options: &DiscoveryOptions) -> Vec<DiscoveredTool> {
        Vec::new()
    }
}
