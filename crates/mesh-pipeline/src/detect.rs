// SPDX-License-Identifier: MIT OR Apache-2.0
//! One-shot environment capability probe.
//!
//! Probes a fixed local port range for live agents (via card
//! discovery), assumes the local MCP toolbox is always present, and
//! gates code intelligence on the `code-intel` build feature. The
//! resulting tier decides full fan-out vs. fallback execution.

use std::time::Duration;

use mesh_client::AgentClient;
use tracing::{debug, info};

/// Ordered capability tiers; higher unlocks more of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CapabilityTier {
    /// Template generation only.
    Basic,
    /// Local toolbox, no agents.
    McpOnly,
    /// Agents plus local toolbox.
    A2aMcp,
    /// Agents, toolbox, and code intelligence.
    Full,
}

impl std::fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Basic => "basic",
            Self::McpOnly => "mcp-only",
            Self::A2aMcp => "a2a+mcp",
            Self::Full => "full",
        };
        f.write_str(s)
    }
}

/// Probe configuration.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// First port of the sweep.
    pub base_port: u16,
    /// How many consecutive ports to probe.
    pub port_count: u16,
    /// Per-probe timeout.
    pub probe_timeout: Duration,
    /// Force the basic tier without probing.
    pub single_agent: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            base_port: 41100,
            port_count: 4,
            probe_timeout: Duration::from_millis(400),
            single_agent: false,
        }
    }
}

/// What the probe found.
#[derive(Debug, Clone)]
pub struct Detection {
    /// The resulting tier.
    pub tier: CapabilityTier,
    /// Base URLs of the live agents, in port order.
    pub agent_endpoints: Vec<String>,
    /// Whether the local toolbox is available (always true today).
    pub mcp_available: bool,
    /// Whether code intelligence is compiled in.
    pub code_intel: bool,
}

/// Probe the environment once and classify it.
pub async fn detect(cfg: &DetectorConfig) -> Detection {
    // The local toolbox ships with the process.
    let mcp_available = true;
    let code_intel = cfg!(feature = "code-intel");

    if cfg.single_agent {
        info!(target: "mesh.pipeline", "single-agent mode forces the basic tier");
        return Detection {
            tier: CapabilityTier::Basic,
            agent_endpoints: Vec::new(),
            mcp_available,
            code_intel,
        };
    }

    let mut handles = Vec::with_capacity(cfg.port_count as usize);
    for offset in 0..cfg.port_count {
        let port = cfg.base_port + offset;
        let timeout = cfg.probe_timeout;
        handles.push(tokio::spawn(async move {
            let url = format!("http://127.0.0.1:{port}");
            let client = AgentClient::new(&url).with_timeout(timeout);
            match client.discover_agent().await {
                Ok(card) => {
                    debug!(target: "mesh.pipeline", %url, agent = %card.name, "probe hit");
                    Some(url)
                }
                Err(_) => None,
            }
        }));
    }

    let mut agent_endpoints = Vec::new();
    for handle in handles {
        // A panicked probe counts as a miss.
        if let Ok(Some(url)) = handle.await {
            agent_endpoints.push(url);
        }
    }

    let tier = classify(!agent_endpoints.is_empty(), mcp_available, code_intel);
    info!(
        target: "mesh.pipeline",
        %tier,
        agents = agent_endpoints.len(),
        code_intel,
        "capability detection complete"
    );
    Detection {
        tier,
        agent_endpoints,
        mcp_available,
        code_intel,
    }
}

fn classify(agents: bool, mcp: bool, code_intel: bool) -> CapabilityTier {
    match (agents, mcp, code_intel) {
        (true, true, true) => CapabilityTier::Full,
        (true, true, false) => CapabilityTier::A2aMcp,
        (false, true, _) => CapabilityTier::McpOnly,
        _ => CapabilityTier::Basic,
    }
}
