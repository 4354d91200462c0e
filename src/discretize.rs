//! Single-mode refinement engine.
//!
//! [`Discretizer`] refines a proposition-preserving partition until every
//! candidate pair of regions `(i, j)` has a definite answer to "can a
//! controlled trajectory move from `i` into `j` within the horizon". Each
//! answer either certifies the transition, refutes it, or splits `i` into the
//! part that reaches `j` and the connected pieces of the part that does not.
//!
//! Working state is an append-only arena: split regions keep their index,
//! new pieces are appended, and the adjacency, transition and candidate
//! matrices grow with it.

use std::cell::RefCell;
use std::iter;

use log::{debug, info};

use crate::abstraction::AbstractPwa;
use crate::dynamics::{Dynamics, Subsystem};
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::matrix::{reachable_within, refresh_candidates, BoolMatrix};
use crate::observer::{Decision, Observer, Snapshot};
use crate::oracle::{FeasibilityQuery, Oracle};
use crate::params::DiscretizeParams;
use crate::partition::{convexify, pwa_partition, Partition, Region};
use crate::ts::TransitionSystem;

/// Refinement engine over a geometry backend and a feasibility oracle.
pub struct Discretizer<'a, G: Geometry, O> {
    geometry: &'a G,
    oracle: &'a O,
    observer: RefCell<Option<&'a mut dyn Observer<G::Set>>>,
}

impl<'a, G: Geometry, O> Discretizer<'a, G, O> {
    pub fn new(geometry: &'a G, oracle: &'a O) -> Self {
        Self {
            geometry,
            oracle,
            observer: RefCell::new(None),
        }
    }

    /// Installs a hook called after every iteration of the refinement loop.
    pub fn with_observer(mut self, observer: &'a mut dyn Observer<G::Set>) -> Self {
        self.observer = RefCell::new(Some(observer));
        self
    }

    pub fn geometry(&self) -> &'a G {
        self.geometry
    }

    pub fn oracle(&self) -> &'a O {
        self.oracle
    }

    fn notify(&self, snapshot: &Snapshot<'_, G::Set>) {
        let mut observer = self.observer.borrow_mut();
        if let Some(observer) = observer.as_deref_mut() {
            observer.on_iteration(snapshot);
        }
    }
}

/// Partition the refinement loop starts from, with its maps to the input partition.
struct Preprocessed<S> {
    /// Proposition and subsystem preserving partition (convex unless conservative).
    pwa_ppp: Partition<S>,
    ppp2sys: Vec<usize>,
    ppp2orig: Vec<usize>,
}

/// Mutable state of one refinement run.
struct Refinement<S> {
    regions: Vec<Region<S>>,
    adj: BoolMatrix,
    transitions: BoolMatrix,
    candidates: BoolMatrix,
    ppp2pwa: Vec<usize>,
    ppp2sys: Vec<usize>,
    ppp2orig: Vec<usize>,
}

impl<S: Clone> Refinement<S> {
    fn new(pre: &Preprocessed<S>, trans_length: usize) -> Self {
        let n = pre.pwa_ppp.len();
        let adj = pre.pwa_ppp.adjacency().clone();
        let candidates = reachable_within(trans_length, &adj, &adj);
        debug!("starting IJ:\n{}", candidates);
        Self {
            regions: pre.pwa_ppp.regions().to_vec(),
            adj,
            transitions: BoolMatrix::new(n),
            candidates,
            ppp2pwa: (0..n).collect(),
            ppp2sys: pre.ppp2sys.clone(),
            ppp2orig: pre.ppp2orig.clone(),
        }
    }

    /// Replaces region `i` by `isect` and appends the connected pieces of `diff`.
    ///
    /// Returns the indices of the appended regions.
    fn split<G>(
        &mut self,
        geometry: &G,
        params: &DiscretizeParams,
        i: usize,
        j: usize,
        isect: S,
        diff: S,
    ) -> Result<Vec<usize>>
    where
        G: Geometry<Set = S>,
    {
        let pieces = geometry.decompose(&diff)?;
        let first_new = self.regions.len();
        let num_new = pieces.len();
        let new_regions: Vec<usize> = (first_new..first_new + num_new).collect();

        self.regions[i] = self.regions[i].relabel(isect);
        for piece in pieces {
            let region = self.regions[i].relabel(piece);
            self.regions.push(region);
            self.ppp2sys.push(self.ppp2sys[i]);
            self.ppp2pwa.push(self.ppp2pwa[i]);
            self.ppp2orig.push(self.ppp2orig[i]);
        }

        // Nothing is known to reach the shrunken region i any more.
        self.transitions.grow(num_new);
        self.transitions.clear_row(i);
        if i != j {
            // The remnant of i is exactly the part reaching j.
            self.transitions.set(j, i, true);
        }

        let old_neighbors: Vec<usize> = self.adj.row(i).iter().filter(|&k| k != i).collect();
        self.adj.clear_row(i);
        self.adj.clear_column(i);
        self.adj.grow(num_new);
        self.adj.set(i, i, true);
        for &r in &new_regions {
            self.adj.set_symmetric(i, r, true);
            self.adj.set(r, r, true);
        }
        for (a, &r) in new_regions.iter().enumerate() {
            for &q in &new_regions[..a] {
                if geometry.is_adjacent(&self.regions[r].set, &self.regions[q].set)? {
                    self.adj.set_symmetric(r, q, true);
                }
            }
        }

        let remove_trans = params.remove_trans && params.trans_length == 1;
        for k in old_neighbors {
            for r in iter::once(i).chain(new_regions.iter().copied()) {
                if geometry.is_adjacent(&self.regions[r].set, &self.regions[k].set)? {
                    self.adj.set_symmetric(r, k, true);
                } else if remove_trans {
                    self.transitions.set_symmetric(r, k, false);
                }
            }
        }

        self.candidates.grow(num_new);
        let adj_k = reachable_within(params.trans_length, &self.adj, &self.adj);
        for r in iter::once(i).chain(new_regions.iter().copied()) {
            refresh_candidates(&mut self.candidates, &adj_k, &self.transitions, r);
        }

        debug!(
            "updated adj:\n{}\nupdated trans:\n{}\nupdated IJ:\n{}",
            self.adj, self.transitions, self.candidates
        );
        Ok(new_regions)
    }
}

impl<'a, G, O> Discretizer<'a, G, O>
where
    G: Geometry,
{
    /// Splits along subsystem domains, then convexifies unless `conservative`.
    fn preprocess<T>(
        &self,
        part: &Partition<G::Set>,
        dynamics: &Dynamics<T>,
        params: &mut DiscretizeParams,
    ) -> Result<Preprocessed<G::Set>>
    where
        T: Subsystem<G::Set>,
    {
        let g = self.geometry;
        let (pwa_ppp, ppp2sys, ppp2orig) = if dynamics.is_piecewise() {
            let pwa = pwa_partition(g, dynamics.subsystems(), part)?;
            (pwa.partition, pwa.subsystem_of, pwa.parent_of)
        } else {
            (part.clone(), vec![0; part.len()], (0..part.len()).collect())
        };

        if params.conservative {
            return Ok(Preprocessed {
                pwa_ppp,
                ppp2sys,
                ppp2orig,
            });
        }

        let (convex, new2old) = convexify(g, &pwa_ppp)?;
        for (region, r) in convex.regions().iter().enumerate() {
            let pieces = g.num_pieces(&r.set);
            if pieces > 1 {
                return Err(Error::Convexification { region, pieces });
            }
        }
        // Trajectories may leave the starting cell, so removal is moot.
        params.remove_trans = false;
        Ok(Preprocessed {
            pwa_ppp: convex,
            ppp2sys: new2old.iter().map(|&k| ppp2sys[k]).collect(),
            ppp2orig: new2old.iter().map(|&k| ppp2orig[k]).collect(),
        })
    }

    /// Refines `part` under `dynamics` and builds the transition system.
    pub fn discretize<T>(
        &self,
        part: &Partition<G::Set>,
        dynamics: &Dynamics<T>,
        params: &DiscretizeParams,
    ) -> Result<AbstractPwa<G::Set, T>>
    where
        T: Subsystem<G::Set> + Clone,
        O: Oracle<G::Set, T>,
    {
        params.validate()?;
        let g = self.geometry;
        let mut params = params.clone();

        let pre = self.preprocess(part, dynamics, &mut params)?;
        info!(
            "discretize: {} input regions, {} after preprocessing, params {}",
            part.len(),
            pre.pwa_ppp.len(),
            params
        );

        let subsystems = dynamics.subsystems();
        let mut disturbance_radii = Vec::with_capacity(subsystems.len());
        for subsystem in subsystems {
            let radius = match subsystem.disturbance() {
                Some(w) => g.chebyshev_radius(w)?,
                None => 0.0,
            };
            disturbance_radii.push(radius);
        }

        let mut state = Refinement::new(&pre, params.trans_length);
        let mut iteration = 0;

        while let Some((j, i)) = state.candidates.first() {
            state.candidates.set(j, i, false);

            let k = state.ppp2sys[i];
            let rd = disturbance_radii[k];
            let trans_set = if params.conservative {
                None
            } else {
                Some(&pre.pwa_ppp[state.ppp2pwa[i]].set)
            };

            let si = &state.regions[i].set;
            let sj = &state.regions[j].set;
            let query = FeasibilityQuery::new(si, sj, &subsystems[k], &params).with_trans_set(trans_set);
            let s0 = self.oracle.solve_feasible(&query)?;

            let isect = g.intersect(si, &s0)?;
            let vol1 = g.volume(&isect)?;
            let r_isect = g.chebyshev_radius(&isect)?;
            let diff = g.difference(si, &s0)?;
            let vol2 = g.volume(&diff)?;
            let r_diff = g.chebyshev_radius(&diff)?;

            info!(
                "working with states {} (#polytopes = {}) and {} (#polytopes = {}), \
                 active subsystem {}, S0 volume {}",
                i,
                g.num_pieces(si),
                j,
                g.num_pieces(sj),
                k,
                g.volume(&s0)?
            );

            let min_vol = params.min_cell_volume;
            let decision = if vol1 > min_vol && r_isect > rd && vol2 > min_vol && r_diff > rd {
                let new_regions = state.split(g, &params, i, j, isect, diff)?;
                info!("adding states {} and {:?}", i, new_regions);
                Decision::Split { new_regions }
            } else if vol2 < params.abs_tol {
                info!("transition found");
                state.transitions.set(j, i, true);
                Decision::Feasible
            } else {
                info!("no transition found, diff vol: {}, intersect vol: {}", vol2, vol1);
                state.transitions.set(j, i, false);
                Decision::Infeasible
            };

            self.notify(&Snapshot {
                iteration,
                source: i,
                target: j,
                decision: &decision,
                regions: &state.regions,
                adjacency: &state.adj,
                transitions: &state.transitions,
            });
            iteration += 1;
        }

        info!(
            "discretize: done after {} iterations, {} regions, {} transitions",
            iteration,
            state.regions.len(),
            state.transitions.count()
        );

        let labels = state.regions.iter().map(|r| r.props.clone()).collect();
        let atomic_propositions = pre.pwa_ppp.prop_regions().keys().cloned().collect();
        let mut ts = TransitionSystem::new(atomic_propositions, labels);
        ts.add_adj(&state.transitions);

        let ppp = Partition::with_adjacency(
            pre.pwa_ppp.domain().clone(),
            state.regions,
            state.adj,
            pre.pwa_ppp.prop_regions().clone(),
        )?;

        Ok(AbstractPwa::new(
            ppp,
            ts,
            state.transitions,
            dynamics.clone(),
            pre.pwa_ppp,
            state.ppp2pwa,
            state.ppp2sys,
            part.clone(),
            state.ppp2orig,
            params,
        ))
    }
}

/// Refines `part` under `dynamics` without an observer.
pub fn discretize<G, O, T>(
    geometry: &G,
    oracle: &O,
    part: &Partition<G::Set>,
    dynamics: &Dynamics<T>,
    params: &DiscretizeParams,
) -> Result<AbstractPwa<G::Set, T>>
where
    G: Geometry,
    O: Oracle<G::Set, T>,
    T: Subsystem<G::Set> + Clone,
{
    Discretizer::new(geometry, oracle).discretize(part, dynamics, params)
}
