//! Per-iteration hooks into the refinement loop.
//!
//! An [`Observer`] is called once per checked pair, after the decision has been
//! applied, with a read-only [`Snapshot`] of the working state. Observers are
//! for plotting, progress reports and tests; they cannot change the result.

use crate::matrix::BoolMatrix;
use crate::partition::Region;

/// What the engine decided for one candidate pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The source was replaced by its reachable part; the listed regions were appended.
    Split { new_regions: Vec<usize> },
    /// The whole source reaches the target.
    Feasible,
    /// No usable part of the source reaches the target.
    Infeasible,
}

/// Working state after one iteration of the refinement loop.
#[derive(Debug)]
pub struct Snapshot<'a, S> {
    /// Zero-based iteration counter.
    pub iteration: usize,
    pub source: usize,
    pub target: usize,
    pub decision: &'a Decision,
    pub regions: &'a [Region<S>],
    pub adjacency: &'a BoolMatrix,
    /// `transitions.get(j, i)` iff region `j` is reachable from region `i`.
    pub transitions: &'a BoolMatrix,
}

pub trait Observer<S> {
    fn on_iteration(&mut self, snapshot: &Snapshot<'_, S>);
}

impl<S, F> Observer<S> for F
where
    F: FnMut(&Snapshot<'_, S>),
{
    fn on_iteration(&mut self, snapshot: &Snapshot<'_, S>) {
        self(snapshot)
    }
}

/// One recorded iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub source: usize,
    pub target: usize,
    pub decision: Decision,
    pub num_regions: usize,
}

/// Observer that records the sequence of decisions.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub steps: Vec<Step>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_splits(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.decision, Decision::Split { .. }))
            .count()
    }
}

impl<S> Observer<S> for Recorder {
    fn on_iteration(&mut self, snapshot: &Snapshot<'_, S>) {
        self.steps.push(Step {
            source: snapshot.source,
            target: snapshot.target,
            decision: snapshot.decision.clone(),
            num_regions: snapshot.regions.len(),
        });
    }
}
