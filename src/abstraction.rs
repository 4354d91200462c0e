//! Abstraction results.
//!
//! [`AbstractPwa`] is the output of one refinement run: the refined partition,
//! its transition system and four positional maps (`map[i]` describes region
//! `i` of the refined partition):
//!
//! - `ppp2pwa`: region of the (prop + subsystem)-preserving partition `pwa_ppp`
//!   the region descends from,
//! - `ppp2sys`: index of the active subsystem,
//! - `ppp2orig`: region of the original, proposition-only partition `orig_ppp`,
//! - plus the parameters the run used.
//!
//! [`MergedPartition`] and [`AbstractSwitched`] are the outputs of merging
//! several per-mode abstractions. Per-mode results are shared through [`Arc`].
//!
//! All of them are built once and read-only afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::dynamics::{Dynamics, Mode};
use crate::error::{Error, Result};
use crate::matrix::BoolMatrix;
use crate::params::DiscretizeParams;
use crate::partition::{Partition, Region};
use crate::ts::TransitionSystem;

/// Discrete abstraction of (piecewise-affine) dynamics over one partition.
#[derive(Debug, Clone)]
pub struct AbstractPwa<S, T> {
    ppp: Partition<S>,
    ts: TransitionSystem,
    transitions: BoolMatrix,
    dynamics: Dynamics<T>,
    pwa_ppp: Partition<S>,
    ppp2pwa: Vec<usize>,
    ppp2sys: Vec<usize>,
    orig_ppp: Partition<S>,
    ppp2orig: Vec<usize>,
    disc_params: DiscretizeParams,
}

impl<S, T> AbstractPwa<S, T> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ppp: Partition<S>,
        ts: TransitionSystem,
        transitions: BoolMatrix,
        dynamics: Dynamics<T>,
        pwa_ppp: Partition<S>,
        ppp2pwa: Vec<usize>,
        ppp2sys: Vec<usize>,
        orig_ppp: Partition<S>,
        ppp2orig: Vec<usize>,
        disc_params: DiscretizeParams,
    ) -> Self {
        let n = ppp.len();
        assert_eq!(ts.num_states(), n, "One state per region");
        assert_eq!(transitions.size(), n);
        assert_eq!(ppp2pwa.len(), n);
        assert_eq!(ppp2sys.len(), n);
        assert_eq!(ppp2orig.len(), n);
        Self {
            ppp,
            ts,
            transitions,
            dynamics,
            pwa_ppp,
            ppp2pwa,
            ppp2sys,
            orig_ppp,
            ppp2orig,
            disc_params,
        }
    }

    /// The refined partition; region `i` is state `i` of [`ts`](Self::ts).
    pub fn ppp(&self) -> &Partition<S> {
        &self.ppp
    }

    pub fn ts(&self) -> &TransitionSystem {
        &self.ts
    }

    /// `transitions().get(j, i)` iff region `j` is reachable from region `i`.
    pub fn transitions(&self) -> &BoolMatrix {
        &self.transitions
    }

    pub fn dynamics(&self) -> &Dynamics<T> {
        &self.dynamics
    }

    /// Partition preserving both propositions and subsystem domains (convexified
    /// unless the run was conservative).
    pub fn pwa_ppp(&self) -> &Partition<S> {
        &self.pwa_ppp
    }

    pub fn ppp2pwa(&self) -> &[usize] {
        &self.ppp2pwa
    }

    pub fn ppp2sys(&self) -> &[usize] {
        &self.ppp2sys
    }

    /// The proposition-only partition the run started from.
    pub fn orig_ppp(&self) -> &Partition<S> {
        &self.orig_ppp
    }

    pub fn ppp2orig(&self) -> &[usize] {
        &self.ppp2orig
    }

    pub fn disc_params(&self) -> &DiscretizeParams {
        &self.disc_params
    }

    pub fn len(&self) -> usize {
        self.ppp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ppp.is_empty()
    }

    /// Region of `pwa_ppp` that region `i` descends from.
    pub fn pwa_region(&self, i: usize) -> (usize, &Region<S>) {
        let j = self.ppp2pwa[i];
        (j, &self.pwa_ppp[j])
    }

    /// Subsystem active in region `i`.
    pub fn active_subsystem(&self, i: usize) -> (usize, &T) {
        let k = self.ppp2sys[i];
        (k, &self.dynamics.subsystems()[k])
    }

    /// Region of `orig_ppp` that region `i` descends from.
    pub fn orig_region(&self, i: usize) -> (usize, &Region<S>) {
        let j = self.ppp2orig[i];
        (j, &self.orig_ppp[j])
    }
}

fn write_map(f: &mut Formatter<'_>, title: &str, map: &[usize]) -> std::fmt::Result {
    writeln!(f, "Map PPP Regions ---> {}:", title)?;
    for (i, other) in map.iter().enumerate() {
        writeln!(f, "\t\t{} -> {}", i, other)?;
    }
    Ok(())
}

impl<S, T> Display for AbstractPwa<S, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Partition with {} regions", self.ppp.len())?;
        for (i, region) in self.ppp.regions().iter().enumerate() {
            writeln!(f, "\t{}: {:?}", i, region.props)?;
        }
        write!(f, "{}", self.ts)?;
        writeln!(f, "{}", "-".repeat(30))?;
        write_map(f, "PWA PPP Regions", &self.ppp2pwa)?;
        write_map(f, "PWA Subsystems", &self.ppp2sys)?;
        write_map(f, "Original PPP Regions", &self.ppp2orig)?;
        writeln!(f, "Discretization Options:\n\t{}", self.disc_params)
    }
}

/// Common refinement of several per-mode partitions.
#[derive(Debug, Clone)]
pub struct MergedPartition<S, T> {
    ppp: Partition<S>,
    ppp2modes: BTreeMap<Mode, Vec<usize>>,
    ap_labeling: Vec<BTreeSet<String>>,
    modes: BTreeMap<Mode, Arc<AbstractPwa<S, T>>>,
}

impl<S, T> MergedPartition<S, T> {
    pub(crate) fn new(
        ppp: Partition<S>,
        ppp2modes: BTreeMap<Mode, Vec<usize>>,
        ap_labeling: Vec<BTreeSet<String>>,
        modes: BTreeMap<Mode, Arc<AbstractPwa<S, T>>>,
    ) -> Self {
        assert!(ppp2modes.values().all(|m| m.len() == ppp.len()));
        assert_eq!(ap_labeling.len(), ppp.len());
        Self {
            ppp,
            ppp2modes,
            ap_labeling,
            modes,
        }
    }

    /// The merged partition, preserving propositions and the dynamics of every mode.
    pub fn ppp(&self) -> &Partition<S> {
        &self.ppp
    }

    /// `ppp2modes()[mode][i]` is the region of `modes()[mode].ppp()` containing merged region `i`.
    pub fn ppp2modes(&self) -> &BTreeMap<Mode, Vec<usize>> {
        &self.ppp2modes
    }

    /// Proposition label of every merged region.
    pub fn ap_labeling(&self) -> &[BTreeSet<String>] {
        &self.ap_labeling
    }

    pub fn modes(&self) -> &BTreeMap<Mode, Arc<AbstractPwa<S, T>>> {
        &self.modes
    }

    pub fn mode(&self, mode: &Mode) -> Result<&AbstractPwa<S, T>> {
        self.modes
            .get(mode)
            .map(Arc::as_ref)
            .ok_or_else(|| Error::UnknownMode(mode.clone()))
    }

    /// Region of `mode`'s own refined partition containing merged region `i`.
    pub fn parent(&self, mode: &Mode, i: usize) -> Result<usize> {
        let parents = self
            .ppp2modes
            .get(mode)
            .ok_or_else(|| Error::UnknownMode(mode.clone()))?;
        parents.get(i).copied().ok_or(Error::UnknownRegion {
            region: i,
            len: parents.len(),
        })
    }

    /// Region of `mode`'s `pwa_ppp` containing merged region `i`, with its index.
    pub fn region_to_subsystem_region(&self, mode: &Mode, i: usize) -> Result<(usize, &Region<S>)> {
        let region_idx = self.parent(mode, i)?;
        Ok(self.mode(mode)?.pwa_region(region_idx))
    }

    /// Subsystem of `mode` active in merged region `i`, with its index.
    pub fn region_to_active_subsystem(&self, mode: &Mode, i: usize) -> Result<(usize, &T)> {
        let region_idx = self.parent(mode, i)?;
        Ok(self.mode(mode)?.active_subsystem(region_idx))
    }
}

/// Abstraction of switched dynamics: one common partition and transition
/// system, with per-mode action labels on the edges.
#[derive(Debug, Clone)]
pub struct AbstractSwitched<S, T> {
    merged: MergedPartition<S, T>,
    ts: TransitionSystem,
    transitions: BTreeMap<Mode, BoolMatrix>,
}

impl<S, T> AbstractSwitched<S, T> {
    pub(crate) fn new(
        merged: MergedPartition<S, T>,
        ts: TransitionSystem,
        transitions: BTreeMap<Mode, BoolMatrix>,
    ) -> Self {
        assert_eq!(ts.num_states(), merged.ppp().len(), "One state per merged region");
        Self {
            merged,
            ts,
            transitions,
        }
    }

    pub fn merged(&self) -> &MergedPartition<S, T> {
        &self.merged
    }

    pub fn ppp(&self) -> &Partition<S> {
        self.merged.ppp()
    }

    pub fn ppp2modes(&self) -> &BTreeMap<Mode, Vec<usize>> {
        self.merged.ppp2modes()
    }

    pub fn modes(&self) -> &BTreeMap<Mode, Arc<AbstractPwa<S, T>>> {
        self.merged.modes()
    }

    /// Common transition system over the merged regions.
    pub fn ts(&self) -> &TransitionSystem {
        &self.ts
    }

    /// Transitions of the merged partition that are feasible in `mode`.
    pub fn mode_transitions(&self, mode: &Mode) -> Result<&BoolMatrix> {
        self.transitions
            .get(mode)
            .ok_or_else(|| Error::UnknownMode(mode.clone()))
    }

    pub fn region_to_subsystem_region(&self, mode: &Mode, i: usize) -> Result<(usize, &Region<S>)> {
        self.merged.region_to_subsystem_region(mode, i)
    }

    pub fn region_to_active_subsystem(&self, mode: &Mode, i: usize) -> Result<(usize, &T)> {
        self.merged.region_to_active_subsystem(mode, i)
    }
}

impl<S, T> Display for AbstractSwitched<S, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Abstraction of switched system")?;
        writeln!(f, "common partition: {} regions", self.ppp().len())?;
        write!(f, "common ts:\n{}", self.ts)?;
        for (mode, ab) in self.modes() {
            writeln!(f, "mode: {}, with abstraction:\n{}", mode, ab)?;
        }
        Ok(())
    }
}
