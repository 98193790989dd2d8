//! Pipeline configuration
//!
//! One TOML file describes the workers, their transitions, the record
//! schemas, and the store and reasoner backends. Unlike most settings,
//! a pipeline that fails its checks is an error, never a silent default.

use crate::graph::TransitionGraph;
use crate::orchestrator::{
    Orchestrator, OrchestratorConfig, DEFAULT_MAX_ROUNDS, DEFAULT_TERMINATION_TOKEN,
};
use crate::worker::{ExecutorWorker, ReasoningWorker, ValidatorWorker, Worker};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use storecrew_core::{
    Capability, ConfigError, OperationValidator, Role, SchemaRegistry, SchemaRule, WorkerSpec,
};
use storecrew_llm::{ChatCompletionsReasoner, Reasoner, ScriptStep, ScriptedReasoner};
use storecrew_store::{DocumentStore, JsonFileStore, MemoryStore, MutationExecutor, StoreResult};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker that speaks first.
    pub entry: String,
    pub max_rounds: u32,
    /// Whole word that ends the conversation when a worker says it.
    pub termination_token: String,
    /// Workers whose turn ends the conversation.
    pub terminal: Vec<String>,
    pub timeouts: TimeoutConfig,
    pub workers: Vec<WorkerSpec>,
    /// worker -> workers that may speak right after it, in preference order.
    pub transitions: BTreeMap<String, Vec<String>>,
    /// record kind -> rule.
    pub schemas: BTreeMap<String, SchemaRule>,
    pub store: StoreConfig,
    pub reasoner: ReasonerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub reasoning_secs: u64,
    pub executor_secs: u64,
    pub gate_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    Memory,
    JsonFile { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ReasonerConfig {
    /// Every worker answers with `reply`. For dry runs.
    Scripted { reply: String },
    ChatCompletions {
        model: String,
        #[serde(default)]
        base_url: Option<String>,
        /// Environment variable holding the API key.
        #[serde(default)]
        api_key_env: Option<String>,
        #[serde(default)]
        temperature: f32,
    },
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let reasoning = |name: &str, role: Role| {
            WorkerSpec::new(name, role).with_capability(Capability::ReasoningCall)
        };
        Self {
            entry: "supervisor".into(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            termination_token: DEFAULT_TERMINATION_TOKEN.into(),
            terminal: Vec::new(),
            timeouts: TimeoutConfig::default(),
            workers: vec![
                reasoning("supervisor", Role::Supervisor),
                reasoning("generator", Role::Generator),
                WorkerSpec::new("validator", Role::Validator),
                WorkerSpec::new("executor", Role::Executor).with_capability(Capability::MutationCall),
            ],
            transitions: BTreeMap::from([
                ("supervisor".to_string(), vec!["generator".to_string()]),
                ("generator".to_string(), vec!["validator".to_string(), "supervisor".to_string()]),
                ("validator".to_string(), vec!["executor".to_string(), "generator".to_string()]),
                ("executor".to_string(), vec!["supervisor".to_string(), "generator".to_string()]),
            ]),
            schemas: BTreeMap::new(),
            store: StoreConfig::default(),
            reasoner: ReasonerConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { reasoning_secs: 60, executor_secs: 30, gate_secs: 300 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self { Self::Memory }
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self::Scripted { reply: DEFAULT_TERMINATION_TOKEN.into() }
    }
}

// ============================================================
// Loading
// ============================================================

impl PipelineConfig {
    /// Load and check a pipeline from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content)
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Loaded pipeline from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Everything that can be checked without touching the store or network.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.graph()?;
        self.schema_registry()?;
        if self.max_rounds == 0 {
            return Err(ConfigError::InvalidRoundLimit);
        }
        if self.termination_token.trim().is_empty() {
            return Err(ConfigError::Invalid("termination token must not be empty".into()));
        }
        Ok(())
    }

    pub fn graph(&self) -> Result<TransitionGraph, ConfigError> {
        let mut builder = TransitionGraph::builder(&self.entry).workers(self.workers.iter().cloned());
        for (from, to) in &self.transitions {
            builder = builder.edges(from, to.iter().cloned());
        }
        for t in &self.terminal {
            builder = builder.terminal(t);
        }
        builder.build()
    }

    pub fn schema_registry(&self) -> Result<SchemaRegistry, ConfigError> {
        let mut registry = SchemaRegistry::new();
        for (kind, rule) in &self.schemas {
            registry
                .register(kind, rule.clone())
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(registry)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_rounds: self.max_rounds,
            termination_token: self.termination_token.clone(),
            gate_timeout: Duration::from_secs(self.timeouts.gate_secs),
        }
    }

    /// Open the configured store backend.
    pub async fn open_store(&self) -> StoreResult<Arc<dyn DocumentStore>> {
        let store: Arc<dyn DocumentStore> = match &self.store {
            StoreConfig::Memory => Arc::new(MemoryStore::new()),
            StoreConfig::JsonFile { path } => Arc::new(JsonFileStore::open(path).await?),
        };
        Ok(store)
    }

    /// Build the configured reasoner. `api_key` overrides `api_key_env`.
    pub fn reasoner(&self, api_key: Option<String>) -> Arc<dyn Reasoner> {
        match &self.reasoner {
            ReasonerConfig::Scripted { reply } => {
                Arc::new(ScriptedReasoner::new().with_fallback(ScriptStep::text(reply.clone())))
            }
            ReasonerConfig::ChatCompletions { model, base_url, api_key_env, temperature } => {
                let mut r = ChatCompletionsReasoner::new(model.clone()).with_temperature(*temperature);
                if let Some(url) = base_url {
                    r = r.with_base_url(url.clone());
                }
                let key = api_key.or_else(|| api_key_env.as_ref().and_then(|v| std::env::var(v).ok()));
                if let Some(key) = key {
                    r = r.with_api_key(key);
                }
                Arc::new(r)
            }
        }
    }

    /// Wire workers to the reasoner and store, one per declared worker.
    pub fn build_orchestrator(
        &self,
        reasoner: Arc<dyn Reasoner>,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Orchestrator, ConfigError> {
        let graph = Arc::new(self.graph()?);
        let schemas = Arc::new(self.schema_registry()?);
        let executor = Arc::new(
            MutationExecutor::new(store).with_timeout(Duration::from_secs(self.timeouts.executor_secs)),
        );
        let reasoning_timeout = Duration::from_secs(self.timeouts.reasoning_secs);

        let workers: Vec<Arc<dyn Worker>> = graph
            .workers()
            .map(|spec| -> Arc<dyn Worker> {
                match spec.role {
                    Role::Validator => Arc::new(ValidatorWorker::new(
                        spec.clone(),
                        OperationValidator::new(schemas.clone()),
                    )),
                    Role::Executor => Arc::new(ExecutorWorker::new(spec.clone(), executor.clone())),
                    Role::Supervisor | Role::Generator | Role::DomainSpecialist => Arc::new(
                        ReasoningWorker::new(spec.clone(), reasoner.clone())
                            .with_timeout(reasoning_timeout)
                            .with_termination_token(&self.termination_token),
                    ),
                }
            })
            .collect();

        Orchestrator::new(graph, workers, self.orchestrator_config())
    }
}
