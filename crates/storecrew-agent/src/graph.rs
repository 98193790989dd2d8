//! Transition graph — which worker may speak right after which
//!
//! Built once and checked up front; a graph that could let a request reach
//! the executor unvalidated, or strand the conversation, is rejected.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use storecrew_core::{Capability, ConfigError, Role, WorkerSpec};

#[derive(Clone, Debug)]
pub struct TransitionGraph {
    workers: BTreeMap<String, WorkerSpec>,
    /// Successors in declaration order; the first is the fallback choice.
    edges: BTreeMap<String, Vec<String>>,
    entry: String,
    terminals: BTreeSet<String>,
}

impl TransitionGraph {
    pub fn builder(entry: impl Into<String>) -> TransitionGraphBuilder {
        TransitionGraphBuilder {
            entry: entry.into(),
            workers: Vec::new(),
            edges: Vec::new(),
            terminals: Vec::new(),
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn worker(&self, name: &str) -> Option<&WorkerSpec> {
        self.workers.get(name)
    }

    pub fn workers(&self) -> impl Iterator<Item = &WorkerSpec> {
        self.workers.values()
    }

    pub fn successors(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn allows(&self, from: &str, to: &str) -> bool {
        self.successors(from).iter().any(|s| s == to)
    }

    pub fn is_terminal(&self, name: &str) -> bool {
        self.terminals.contains(name)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if !self.workers.contains_key(&self.entry) {
            return Err(ConfigError::UnknownWorker(self.entry.clone()));
        }
        for t in &self.terminals {
            if !self.workers.contains_key(t) {
                return Err(ConfigError::UnknownWorker(t.clone()));
            }
        }

        for spec in self.workers.values() {
            check_capabilities(spec)?;
        }

        if self.workers[&self.entry].role == Role::Executor {
            return Err(ConfigError::ExecutorEntry(self.entry.clone()));
        }

        for (from, tos) in &self.edges {
            for to in tos {
                if self.workers[to].role == Role::Executor && self.workers[from].role != Role::Validator {
                    return Err(ConfigError::UnvalidatedExecution {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
            }
        }

        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([self.entry.as_str()]);
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name) {
                continue;
            }
            let next = self.successors(name);
            if next.is_empty() && !self.is_terminal(name) {
                return Err(ConfigError::DeadEnd(name.to_string()));
            }
            queue.extend(next.iter().map(String::as_str));
        }
        Ok(())
    }
}

fn check_capabilities(spec: &WorkerSpec) -> Result<(), ConfigError> {
    let mutates = spec.can(Capability::MutationCall);
    match spec.role {
        Role::Executor if !mutates => Err(ConfigError::capability(
            &spec.name,
            "executor requires mutation_call",
        )),
        Role::Executor => Ok(()),
        _ if mutates => Err(ConfigError::capability(
            &spec.name,
            "only an executor may hold mutation_call",
        )),
        role if role.uses_reasoning() && !spec.can(Capability::ReasoningCall) => Err(
            ConfigError::capability(&spec.name, format!("{} requires reasoning_call", role)),
        ),
        _ => Ok(()),
    }
}

pub struct TransitionGraphBuilder {
    entry: String,
    workers: Vec<WorkerSpec>,
    edges: Vec<(String, String)>,
    terminals: Vec<String>,
}

impl TransitionGraphBuilder {
    pub fn worker(mut self, spec: WorkerSpec) -> Self {
        self.workers.push(spec);
        self
    }

    pub fn workers<I: IntoIterator<Item = WorkerSpec>>(mut self, specs: I) -> Self {
        self.workers.extend(specs);
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    pub fn edges<I, S>(mut self, from: impl Into<String>, to: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let from = from.into();
        for t in to {
            self.edges.push((from.clone(), t.into()));
        }
        self
    }

    pub fn terminal(mut self, name: impl Into<String>) -> Self {
        self.terminals.push(name.into());
        self
    }

    pub fn build(self) -> Result<TransitionGraph, ConfigError> {
        let mut workers = BTreeMap::new();
        for mut spec in self.workers {
            let name = spec.name.trim().to_string();
            if name.is_empty() {
                return Err(ConfigError::Invalid("worker name must not be empty".into()));
            }
            spec.name = name.clone();
            if workers.insert(name.clone(), spec).is_some() {
                return Err(ConfigError::DuplicateWorker(name));
            }
        }

        let mut edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (from, to) in self.edges {
            for name in [&from, &to] {
                if !workers.contains_key(name) {
                    return Err(ConfigError::UnknownWorker(name.clone()));
                }
            }
            let succ = edges.entry(from).or_default();
            if !succ.contains(&to) {
                succ.push(to);
            }
        }

        let graph = TransitionGraph {
            workers,
            edges,
            entry: self.entry,
            terminals: self.terminals.into_iter().collect(),
        };
        graph.check()?;
        Ok(graph)
    }
}
