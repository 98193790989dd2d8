//! Speaker selection
//!
//! A selector only proposes; the orchestrator checks every proposal against
//! the transition graph.

use crate::graph::TransitionGraph;
use storecrew_core::{contains_word, Payload, Role};
use tracing::debug;

pub trait SpeakerSelector: Send + Sync {
    /// Name the worker to speak after `current`, given the payload it just
    /// produced. `None` means there is no one to hand over to.
    fn select(&self, graph: &TransitionGraph, current: &str, payload: &Payload) -> Option<String>;
}

/// Routes by conversation phase.
///
/// In order: a successor named in a text payload; the successor whose role
/// handles the payload's phase; the first declared successor.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhaseSelector;

impl PhaseSelector {
    /// Find a candidate named in free text. Exact (trimmed, case-insensitive)
    /// answers win over mentions inside a longer reply.
    pub fn parse_routing_decision<'a>(text: &str, candidates: &'a [String]) -> Option<&'a String> {
        let trimmed = text.trim().trim_end_matches('.').to_lowercase();
        if let Some(exact) = candidates.iter().find(|c| c.to_lowercase() == trimmed) {
            return Some(exact);
        }
        candidates.iter().find(|c| contains_word(text, c))
    }

    fn wanted_roles(payload: &Payload) -> &'static [Role] {
        match payload {
            Payload::Request(_) => &[Role::Validator],
            Payload::Validated(_) => &[Role::Executor],
            Payload::Result(r) if r.is_error() => &[Role::Generator, Role::DomainSpecialist],
            Payload::Result(_) => &[Role::Supervisor],
            Payload::Text(_) => &[],
        }
    }
}

impl SpeakerSelector for PhaseSelector {
    fn select(&self, graph: &TransitionGraph, current: &str, payload: &Payload) -> Option<String> {
        let candidates = graph.successors(current);
        if candidates.is_empty() {
            return None;
        }

        if let Payload::Text(text) = payload {
            if let Some(named) = Self::parse_routing_decision(text, candidates) {
                debug!(from = current, to = %named, "routing by name");
                return Some(named.clone());
            }
        }

        for role in Self::wanted_roles(payload) {
            if let Some(found) = candidates
                .iter()
                .find(|c| graph.worker(c).is_some_and(|w| w.role == *role))
            {
                return Some(found.clone());
            }
        }

        candidates.first().cloned()
    }
}

/// Always hands over to the same worker.
#[derive(Clone, Debug)]
pub struct FixedSelector(pub String);

impl SpeakerSelector for FixedSelector {
    fn select(&self, _graph: &TransitionGraph, _current: &str, _payload: &Payload) -> Option<String> {
        Some(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn routing_decision_exact_and_embedded() {
        let c = names(&["writer", "expert"]);
        assert_eq!(PhaseSelector::parse_routing_decision("  Expert. ", &c), Some(&c[1]));
        assert_eq!(
            PhaseSelector::parse_routing_decision("I would hand this to writer next", &c),
            Some(&c[0])
        );
        assert_eq!(PhaseSelector::parse_routing_decision("rewriter", &c), None);
    }
}
