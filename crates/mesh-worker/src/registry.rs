// SPDX-License-Identifier: MIT OR Apache-2.0
//! Specialist registry with ordered startup and teardown.
//!
//! The roster is fixed: research, schema, planning, task-writer, bound
//! to `base_port .. base_port+3` in that order. Startup is
//! all-or-nothing; teardown runs in reverse order.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use mesh_core::{AgentCard, AgentSkill};
use mesh_server::{AgentServer, ServerHandle};
use tracing::{info, warn};

use crate::base::{BaseWorker, Processor};
use crate::planning::{self, CodeIntel, PlanningProcessor};
use crate::research::{self, ResearchProcessor};
use crate::schema::{self, SchemaProcessor};
use crate::taskwriter::{self, TaskWriterProcessor};

/// The fixed specialist roster, in spawn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialistRole {
    /// Codebase and platform research.
    Research,
    /// Entity translation and interface contracts.
    Schema,
    /// Code-graph planning and milestone grouping.
    Planning,
    /// Per-file task specifications.
    TaskWriter,
}

impl SpecialistRole {
    /// Spawn order of the roster.
    pub const ROSTER: [SpecialistRole; 4] = [
        SpecialistRole::Research,
        SpecialistRole::Schema,
        SpecialistRole::Planning,
        SpecialistRole::TaskWriter,
    ];

    /// Stable role name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Schema => "schema",
            Self::Planning => "planning",
            Self::TaskWriter => "task-writer",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::Research => "explores the codebase and researches the platform baseline",
            Self::Schema => "translates entity notation and writes interface contracts",
            Self::Planning => "builds code graphs and groups work into milestones",
            Self::TaskWriter => "writes per-file task specifications and validates dependencies",
        }
    }

    fn skill_ids(&self) -> &'static [&'static str] {
        match self {
            Self::Research => research::SKILLS,
            Self::Schema => schema::SKILLS,
            Self::Planning => planning::SKILLS,
            Self::TaskWriter => taskwriter::SKILLS,
        }
    }

    /// The card this specialist serves at the given URL.
    #[must_use]
    pub fn card(&self, url: &str) -> AgentCard {
        let skills = self
            .skill_ids()
            .iter()
            .map(|id| AgentSkill::new(*id, format!("{id} skill")).with_tags(&[self.as_str()]))
            .collect();
        AgentCard::new(self.as_str(), self.description(), url, skills)
    }
}

impl std::fmt::Display for SpecialistRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared configuration of the specialist roster.
#[derive(Clone)]
pub struct WorkerConfig {
    /// Project root the research and planning agents read.
    pub project_root: PathBuf,
    /// Optional code-intelligence service for the planning agent.
    pub code_intel: Option<Arc<dyn CodeIntel>>,
}

impl WorkerConfig {
    /// Config rooted at the given project directory, no code intel.
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            code_intel: None,
        }
    }
}

/// Constructs and spawns the specialist roster.
pub struct SpecialistRegistry {
    config: WorkerConfig,
}

impl SpecialistRegistry {
    /// A registry over the given configuration.
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// Construct one specialist worker without starting a server.
    #[must_use]
    pub fn spawn(&self, role: SpecialistRole, url: &str) -> Arc<BaseWorker> {
        let processor: Arc<dyn Processor> = match role {
            SpecialistRole::Research => {
                Arc::new(ResearchProcessor::new(&self.config.project_root))
            }
            SpecialistRole::Schema => Arc::new(SchemaProcessor::new()),
            SpecialistRole::Planning => Arc::new(PlanningProcessor::new(
                &self.config.project_root,
                self.config.code_intel.clone(),
            )),
            SpecialistRole::TaskWriter => Arc::new(TaskWriterProcessor::new()),
        };
        Arc::new(BaseWorker::new(role.card(url), processor))
    }

    /// Start the full roster on `127.0.0.1:base_port + i` in declared
    /// order.
    ///
    /// # Errors
    ///
    /// On any start failure, every already-started agent is stopped in
    /// reverse order and the first error is returned.
    pub async fn spawn_all(&self, base_port: u16) -> anyhow::Result<RunningRoster> {
        let mut running: Vec<(SpecialistRole, ServerHandle)> = Vec::new();

        for (i, role) in SpecialistRole::ROSTER.into_iter().enumerate() {
            let port = base_port + i as u16;
            let addr: SocketAddr = format!("127.0.0.1:{port}")
                .parse()
                .expect("loopback address");
            let worker = self.spawn(role, &format!("http://{addr}"));

            match AgentServer::new(addr, worker).start().await {
                Ok(handle) => {
                    info!(target: "mesh.worker", %role, %addr, "specialist started");
                    running.push((role, handle));
                }
                Err(e) => {
                    let first_error =
                        e.context(format!("start {role} agent on {addr}"));
                    // Unwind in reverse order.
                    while let Some((role, handle)) = running.pop() {
                        if let Err(stop_err) = handle.stop().await {
                            warn!(target: "mesh.worker", %role, error = %stop_err, "stop during unwind failed");
                        }
                    }
                    return Err(first_error);
                }
            }
        }
        Ok(RunningRoster { agents: running })
    }
}

/// The started roster; holds one server handle per specialist.
pub struct RunningRoster {
    agents: Vec<(SpecialistRole, ServerHandle)>,
}

impl std::fmt::Debug for RunningRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningRoster")
            .field(
                "agents",
                &self
                    .agents
                    .iter()
                    .map(|(role, handle)| (*role, handle.addr()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl RunningRoster {
    /// Base URLs of the running agents, in roster order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<String> {
        self.agents.iter().map(|(_, h)| h.url()).collect()
    }

    /// Roles and addresses of the running agents.
    #[must_use]
    pub fn agents(&self) -> Vec<(SpecialistRole, SocketAddr)> {
        self.agents.iter().map(|(r, h)| (*r, h.addr())).collect()
    }

    /// Stop every agent in reverse order.
    ///
    /// # Errors
    ///
    /// Keeps stopping on failure and reports the first error
    /// encountered.
    pub async fn stop_all(mut self) -> anyhow::Result<()> {
        let mut first_error: Option<anyhow::Error> = None;
        while let Some((role, handle)) = self.agents.pop() {
            if let Err(e) = handle.stop().await {
                warn!(target: "mesh.worker", %role, error = %e, "specialist stop failed");
                first_error.get_or_insert(e.context(format!("stop {role} agent")));
            } else {
                info!(target: "mesh.worker", %role, "specialist stopped");
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
