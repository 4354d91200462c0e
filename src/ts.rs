//! Finite transition systems produced by the abstraction.
//!
//! States are `0..num_states`, one per region of the partition they were built
//! from, each labeled with the atomic propositions that hold in that region.
//! Edges may carry an [`ActionLabel`] naming the environment and/or system
//! action (the discrete mode) under which the transition is available.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::matrix::BoolMatrix;

/// Environment / system action annotation of an edge.
///
/// Components that do not vary across modes are left out (`None`).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionLabel {
    pub env: Option<String>,
    pub sys: Option<String>,
}

impl ActionLabel {
    pub fn is_empty(&self) -> bool {
        self.env.is_none() && self.sys.is_none()
    }
}

impl Display for ActionLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(env) = &self.env {
            parts.push(format!("env_actions={}", env));
        }
        if let Some(sys) = &self.sys {
            parts.push(format!("sys_actions={}", sys));
        }
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// A directed, possibly labeled, edge between two states.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
    pub label: ActionLabel,
}

/// A finite transition system with proposition-labeled states.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionSystem {
    atomic_propositions: BTreeSet<String>,
    labels: Vec<BTreeSet<String>>,
    env_actions: BTreeSet<String>,
    sys_actions: BTreeSet<String>,
    transitions: BTreeSet<Transition>,
}

impl TransitionSystem {
    /// Creates a system with one state per entry of `labels`.
    pub fn new(atomic_propositions: BTreeSet<String>, labels: Vec<BTreeSet<String>>) -> Self {
        Self {
            atomic_propositions,
            labels,
            ..Default::default()
        }
    }

    pub fn num_states(&self) -> usize {
        self.labels.len()
    }

    pub fn states(&self) -> std::ops::Range<usize> {
        0..self.num_states()
    }

    pub fn atomic_propositions(&self) -> &BTreeSet<String> {
        &self.atomic_propositions
    }

    /// Propositions that hold in `state`.
    pub fn label_of(&self, state: usize) -> &BTreeSet<String> {
        &self.labels[state]
    }

    pub fn env_actions(&self) -> &BTreeSet<String> {
        &self.env_actions
    }

    pub fn sys_actions(&self) -> &BTreeSet<String> {
        &self.sys_actions
    }

    pub fn add_env_action(&mut self, action: impl Into<String>) {
        self.env_actions.insert(action.into());
    }

    pub fn add_sys_action(&mut self, action: impl Into<String>) {
        self.sys_actions.insert(action.into());
    }

    pub fn add_transition(&mut self, from: usize, to: usize, label: ActionLabel) {
        assert!(
            from < self.num_states() && to < self.num_states(),
            "Transition {} -> {} out of range ({} states)",
            from,
            to,
            self.num_states()
        );
        self.transitions.insert(Transition { from, to, label });
    }

    /// Adds an unlabeled edge `i -> j` for every entry `(j, i)` of `adj`.
    pub fn add_adj(&mut self, adj: &BoolMatrix) {
        self.add_labeled_adj(adj, &ActionLabel::default());
    }

    /// Adds an edge `i -> j` labeled with `label` for every entry `(j, i)` of `adj`.
    pub fn add_labeled_adj(&mut self, adj: &BoolMatrix, label: &ActionLabel) {
        for (to, from) in adj.iter() {
            self.add_transition(from, to, label.clone());
        }
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    /// Whether `from -> to` exists under any label.
    pub fn has_transition(&self, from: usize, to: usize) -> bool {
        self.transitions.iter().any(|t| t.from == from && t.to == to)
    }

    /// Whether `from -> to` exists under exactly `label`.
    pub fn has_labeled_transition(&self, from: usize, to: usize, label: &ActionLabel) -> bool {
        self.transitions.contains(&Transition {
            from,
            to,
            label: label.clone(),
        })
    }

    /// Distinct successors of `state`, in increasing order.
    pub fn successors(&self, state: usize) -> BTreeSet<usize> {
        self.transitions
            .iter()
            .filter(|t| t.from == state)
            .map(|t| t.to)
            .collect()
    }
}

impl Display for TransitionSystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Transition system with {} states", self.num_states())?;
        writeln!(f, "  atomic propositions: {:?}", self.atomic_propositions)?;
        for (s, label) in self.labels.iter().enumerate() {
            writeln!(f, "  s{}: {:?}", s, label)?;
        }
        writeln!(f, "  transitions:")?;
        for t in &self.transitions {
            if t.label.is_empty() {
                writeln!(f, "    s{} -> s{}", t.from, t.to)?;
            } else {
                writeln!(f, "    s{} -> s{} {}", t.from, t.to, t.label)?;
            }
        }
        Ok(())
    }
}
