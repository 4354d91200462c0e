//! Abstraction of switched systems.
//!
//! Every mode is refined on its own, starting from the same partition. The
//! per-mode partitions are then intersected into one common partition
//! ([`merge_partitions`]), transitions are re-checked on it per mode
//! ([`get_transitions`]), and the per-mode relations are combined into one
//! transition system with action-labelled edges ([`merge_abstractions`]).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::abstraction::{AbstractPwa, AbstractSwitched, MergedPartition};
use crate::discretize::Discretizer;
use crate::dynamics::{HybridSys, Mode, Subsystem};
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::matrix::{reachable_within, BoolMatrix};
use crate::oracle::{FeasibilityQuery, Oracle};
use crate::params::{DiscretizeParams, SwitchedParams};
use crate::partition::{compute_adjacency, Partition, Region};
use crate::ts::{ActionLabel, TransitionSystem};

/// Intersections with a smaller Chebyshev radius are not merged regions.
const MERGE_RADIUS: f64 = 1e-5;

type Abstractions<S, T> = BTreeMap<Mode, Arc<AbstractPwa<S, T>>>;

impl<'a, G, O> Discretizer<'a, G, O>
where
    G: Geometry,
{
    /// Abstracts every mode of `hybrid` over `part` and merges the results.
    ///
    /// Returns `None` if `hybrid` has no modes.
    pub fn discretize_switched<T>(
        &self,
        part: &Partition<G::Set>,
        hybrid: &HybridSys<T>,
        params: &SwitchedParams,
    ) -> Result<Option<AbstractSwitched<G::Set, T>>>
    where
        T: Subsystem<G::Set> + Clone,
        O: Oracle<G::Set, T>,
    {
        info!("discretizing hybrid system with {} modes", hybrid.len());

        let mut abstractions = BTreeMap::new();
        for (mode, dynamics) in hybrid.modes() {
            debug!("{}", "-".repeat(30));
            info!("abstracting mode: {}", mode);
            let ab = self.discretize(part, dynamics, params.for_mode(mode))?;
            debug!("mode abstraction:\n{}", ab);
            abstractions.insert(mode.clone(), Arc::new(ab));
        }

        let Some(merged) = merge_partitions(self.geometry(), abstractions)? else {
            return Ok(None);
        };
        info!("merged partition has {} states", merged.ppp().len());

        let mut transitions = BTreeMap::new();
        for (mode, _) in hybrid.modes() {
            let trans = get_transitions(self.oracle(), &merged, mode, params.for_mode(mode))?;
            transitions.insert(mode.clone(), trans);
        }

        Ok(Some(merge_abstractions(merged, transitions)))
    }
}

/// Abstracts every mode of `hybrid` over `part` without an observer.
pub fn discretize_switched<G, O, T>(
    geometry: &G,
    oracle: &O,
    part: &Partition<G::Set>,
    hybrid: &HybridSys<T>,
    params: &SwitchedParams,
) -> Result<Option<AbstractSwitched<G::Set, T>>>
where
    G: Geometry,
    O: Oracle<G::Set, T>,
    T: Subsystem<G::Set> + Clone,
{
    Discretizer::new(geometry, oracle).discretize_switched(part, hybrid, params)
}

/// Fails unless every abstraction shares the first one's domain and propositions.
fn check_consistency<G, T>(geometry: &G, abstractions: &Abstractions<G::Set, T>) -> Result<()>
where
    G: Geometry,
{
    let mut iter = abstractions.iter();
    let Some((first_mode, first)) = iter.next() else {
        return Ok(());
    };
    let p1 = first.ppp();
    for (mode, ab) in iter {
        let p2 = ab.ppp();
        let mismatch = || Error::PropositionSetMismatch {
            first: first_mode.clone(),
            second: mode.clone(),
        };
        if p1.prop_names() != p2.prop_names() {
            return Err(mismatch());
        }
        for (name, set) in p1.prop_regions() {
            if !geometry.is_equal(set, &p2.prop_regions()[name])? {
                return Err(mismatch());
            }
        }
        if !geometry.is_equal(p1.domain(), p2.domain())? {
            return Err(Error::DomainMismatch {
                first: first_mode.clone(),
                second: mode.clone(),
            });
        }
    }
    Ok(())
}

/// Merged regions of one step of [`merge_partitions`].
struct MergeStep<S> {
    regions: Vec<Region<S>>,
    parents: BTreeMap<Mode, Vec<usize>>,
    labels: Vec<BTreeSet<String>>,
}

/// Intersects the current merged regions with the partition of `cur_mode`.
fn merge_partition_pair<G, T>(
    geometry: &G,
    old: MergeStep<G::Set>,
    ab2: &AbstractPwa<G::Set, T>,
    cur_mode: &Mode,
) -> Result<MergeStep<G::Set>>
where
    G: Geometry,
{
    info!("merging partitions with mode {}", cur_mode);

    let mut parents: BTreeMap<Mode, Vec<usize>> =
        old.parents.keys().map(|m| (m.clone(), Vec::new())).collect();
    parents.insert(cur_mode.clone(), Vec::new());
    let mut regions = Vec::new();
    let mut labels = Vec::new();

    for (i, region) in old.regions.iter().enumerate() {
        for (j, other) in ab2.ppp().regions().iter().enumerate() {
            let isect = geometry.intersect(&region.set, &other.set)?;
            if geometry.chebyshev_radius(&isect)? < MERGE_RADIUS {
                continue;
            }
            debug!("merging region A{} with B{}", i, j);

            let idx = regions.len();
            for (mode, old_parents) in &old.parents {
                if let Some(p) = parents.get_mut(mode) {
                    p.push(old_parents[i]);
                }
            }
            if let Some(p) = parents.get_mut(cur_mode) {
                p.push(j);
            }

            // Both partitions come from the same proposition-preserving
            // partition, so overlapping regions must agree on labels.
            let label1 = &old.labels[i];
            let label2 = ab2.ts().label_of(j);
            if label1 != label2 {
                return Err(Error::PropositionMismatch {
                    region: idx,
                    mode: cur_mode.clone(),
                    first: label1.clone(),
                    second: label2.clone(),
                });
            }

            regions.push(region.relabel(isect));
            labels.push(label1.clone());
        }
    }

    Ok(MergeStep {
        regions,
        parents,
        labels,
    })
}

/// Intersects the partitions of all abstractions into one common partition.
///
/// The first mode (in [`Mode`] order) seeds the merge. Returns `None` if
/// `abstractions` is empty.
pub fn merge_partitions<G, T>(
    geometry: &G,
    abstractions: Abstractions<G::Set, T>,
) -> Result<Option<MergedPartition<G::Set, T>>>
where
    G: Geometry,
{
    let Some((init_mode, ab0)) = abstractions.iter().next() else {
        warn!("abstractions empty, nothing to merge");
        return Ok(None);
    };
    check_consistency(geometry, &abstractions)?;

    let regions = ab0.ppp().regions().to_vec();
    let mut step = MergeStep {
        parents: BTreeMap::from([(init_mode.clone(), (0..regions.len()).collect())]),
        labels: regions.iter().map(|r| r.props.clone()).collect(),
        regions,
    };
    for (mode, ab) in abstractions.iter().skip(1) {
        step = merge_partition_pair(geometry, step, ab, mode)?;
    }

    // Regions can only touch if their parents touch in every mode.
    let parents = &step.parents;
    let adj = compute_adjacency(geometry, &step.regions, |i, j| {
        abstractions.iter().all(|(mode, ab)| {
            let (pi, pj) = (parents[mode][i], parents[mode][j]);
            pi == pj || ab.ppp().adjacency().get(pi, pj)
        })
    })?;

    let ppp = Partition::with_adjacency(
        ab0.ppp().domain().clone(),
        step.regions,
        adj,
        ab0.ppp().prop_regions().clone(),
    )?;
    Ok(Some(MergedPartition::new(ppp, step.parents, step.labels, abstractions)))
}

/// Transitions of the merged partition that are feasible in `mode`.
///
/// Uses the active subsystem and the transition set of the region of `mode`'s
/// own abstraction that contains each merged region.
pub fn get_transitions<S, O, T>(
    oracle: &O,
    merged: &MergedPartition<S, T>,
    mode: &Mode,
    params: &DiscretizeParams,
) -> Result<BoolMatrix>
where
    O: Oracle<S, T>,
{
    info!("checking which transitions remain feasible after merging");
    let part = merged.ppp();
    let candidates = reachable_within(params.trans_length, part.adjacency(), part.adjacency());
    let mut transitions = BoolMatrix::new(part.len());

    let mut n_checked = 0;
    let mut n_found = 0;
    for (j, i) in candidates.iter() {
        n_checked += 1;
        debug!("checking transition: {} -> {}", i, j);

        let trans_set = if params.conservative {
            None
        } else {
            let (_, region) = merged.region_to_subsystem_region(mode, i)?;
            Some(&region.set)
        };
        let (_, subsystem) = merged.region_to_active_subsystem(mode, i)?;
        let query = FeasibilityQuery::new(&part[i].set, &part[j].set, subsystem, params)
            .with_trans_set(trans_set);

        if oracle.is_feasible(&query)? {
            transitions.set(j, i, true);
            n_found += 1;
            debug!("\tfeasible transition");
        } else {
            debug!("\tnot feasible transition");
        }
    }

    info!("checked: {}", n_checked);
    info!("found: {}", n_found);
    if n_checked > 0 {
        info!(
            "survived merging: {:.1} %",
            100.0 * n_found as f64 / n_checked as f64
        );
    }
    Ok(transitions)
}

/// Edge labels per mode.
///
/// The environment action is named only if it varies across modes; the system
/// action is named if it varies, or if the environment action is not named.
fn action_labels<'m>(modes: impl IntoIterator<Item = &'m Mode>) -> BTreeMap<Mode, ActionLabel> {
    let modes: Vec<&Mode> = modes.into_iter().collect();
    let env: BTreeSet<&str> = modes.iter().map(|m| m.env.as_str()).collect();
    let sys: BTreeSet<&str> = modes.iter().map(|m| m.sys.as_str()).collect();
    let with_env = env.len() > 1;
    let with_sys = sys.len() > 1 || !with_env;
    modes
        .into_iter()
        .map(|m| {
            let label = ActionLabel {
                env: with_env.then(|| m.env.clone()),
                sys: with_sys.then(|| m.sys.clone()),
            };
            (m.clone(), label)
        })
        .collect()
}

/// Builds the common transition system over the merged partition.
pub fn merge_abstractions<S, T>(
    merged: MergedPartition<S, T>,
    transitions: BTreeMap<Mode, BoolMatrix>,
) -> AbstractSwitched<S, T> {
    let aps: BTreeSet<String> = merged.ppp().prop_regions().keys().cloned().collect();
    info!("APs: {:?}", aps);

    let labels = merged.ppp().regions().iter().map(|r| r.props.clone()).collect();
    let mut ts = TransitionSystem::new(aps, labels);

    let actions = action_labels(transitions.keys());
    for (mode, adj) in &transitions {
        let label = &actions[mode];
        if let Some(env) = &label.env {
            ts.add_env_action(env.clone());
        }
        if let Some(sys) = &label.sys {
            ts.add_sys_action(sys.clone());
        }
        ts.add_labeled_adj(adj, label);
    }

    AbstractSwitched::new(merged, ts, transitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::boxes::{BoxGeometry, BoxSet};
    use crate::dynamics::Dynamics;
    use crate::integrator::{Integrator, IntegratorOracle};

    fn interval(lo: f64, hi: f64) -> BoxSet {
        BoxSet::interval(lo, hi)
    }

    fn labeled_line(g: &BoxGeometry) -> Partition<BoxSet> {
        Partition::new(
            g,
            interval(0.0, 3.0),
            vec![
                Region::new(interval(0.0, 2.0), ["a"]),
                Region::new(interval(2.0, 3.0), ["b"]),
            ],
            BTreeMap::from([
                ("a".to_string(), interval(0.0, 2.0)),
                ("b".to_string(), interval(2.0, 3.0)),
            ]),
        )
        .unwrap()
    }

    fn integrator(bound: f64) -> Dynamics<Integrator> {
        Dynamics::linear(Integrator::new(interval(0.0, 3.0), vec![bound]))
    }

    fn switched_params() -> SwitchedParams {
        SwitchedParams::new(
            DiscretizeParams::default()
                .with_horizon(1)
                .with_min_cell_volume(0.5),
        )
    }

    #[test]
    fn test_merge_of_split_and_unsplit_modes() {
        let g = BoxGeometry::default();
        let oracle = IntegratorOracle::default();
        let part = labeled_line(&g);
        let moving = Mode::new("e", "move");
        let parked = Mode::new("e", "park");
        let hybrid = HybridSys::new()
            .with_mode(moving.clone(), integrator(1.0))
            .with_mode(parked.clone(), integrator(0.0));

        let ab = discretize_switched(&g, &oracle, &part, &hybrid, &switched_params())
            .unwrap()
            .unwrap();
        println!("{}", ab);

        assert_eq!(ab.modes()[&moving].len(), 3);
        assert_eq!(ab.modes()[&parked].len(), 2);

        // [1,2] {a}, [2,3] {b}, [0,1] {a}
        assert_eq!(ab.ppp().len(), 3);
        assert_eq!(ab.ppp2modes()[&moving], vec![0, 1, 2]);
        assert_eq!(ab.ppp2modes()[&parked], vec![0, 1, 0]);
        assert!(ab.ppp().check_adjacency());
        assert!(ab.ppp().adjacency().get(0, 2));
        assert!(!ab.ppp().adjacency().get(1, 2));
        assert!(ab.ppp().check_cover(&g, 1e-9).unwrap());

        let (k, sys) = ab.region_to_active_subsystem(&parked, 2).unwrap();
        assert_eq!(k, 0);
        assert_eq!(sys.input_bound(), &[0.0]);
        let (r, region) = ab.region_to_subsystem_region(&parked, 2).unwrap();
        assert_eq!(r, 0);
        assert_eq!(region.set, interval(0.0, 2.0));

        let moves = ab.mode_transitions(&moving).unwrap();
        let parks = ab.mode_transitions(&parked).unwrap();
        assert_eq!(moves.count(), 7);
        assert_eq!(parks.count(), 3);
        assert!(moves.get(0, 2));
        assert!(!parks.get(0, 2));

        let label = ActionLabel {
            env: None,
            sys: Some("move".to_string()),
        };
        assert!(ab.ts().has_labeled_transition(2, 0, &label));
        assert_eq!(ab.ts().num_transitions(), 10);
        assert!(ab.ts().env_actions().is_empty());
        assert_eq!(ab.ts().sys_actions().len(), 2);
        assert_eq!(ab.ts().label_of(2), &BTreeSet::from(["a".to_string()]));
    }

    #[test]
    fn test_empty_hybrid_system_yields_nothing() {
        let g = BoxGeometry::default();
        let oracle = IntegratorOracle::default();
        let part = labeled_line(&g);
        let hybrid = HybridSys::<Integrator>::new();

        let res = discretize_switched(&g, &oracle, &part, &hybrid, &switched_params()).unwrap();
        assert!(res.is_none());

        let empty: Abstractions<BoxSet, Integrator> = BTreeMap::new();
        assert!(merge_partitions(&g, empty).unwrap().is_none());
    }

    fn abstract_mode(g: &BoxGeometry, part: &Partition<BoxSet>) -> Arc<AbstractPwa<BoxSet, Integrator>> {
        let oracle = IntegratorOracle::default();
        let params = DiscretizeParams::default().with_horizon(1);
        Arc::new(
            crate::discretize::discretize(g, &oracle, part, &integrator(1.0), &params).unwrap(),
        )
    }

    #[test]
    fn test_domain_mismatch_is_fatal() {
        let g = BoxGeometry::default();
        let short = Partition::new(
            &g,
            interval(0.0, 2.0),
            vec![Region::unlabeled(interval(0.0, 2.0))],
            BTreeMap::new(),
        )
        .unwrap();
        let long = Partition::new(
            &g,
            interval(0.0, 3.0),
            vec![Region::unlabeled(interval(0.0, 3.0))],
            BTreeMap::new(),
        )
        .unwrap();
        let abstractions = BTreeMap::from([
            (Mode::new("e", "s0"), abstract_mode(&g, &short)),
            (Mode::new("e", "s1"), abstract_mode(&g, &long)),
        ]);

        let res = merge_partitions(&g, abstractions);
        assert!(matches!(res, Err(Error::DomainMismatch { .. })));
    }

    #[test]
    fn test_proposition_set_mismatch_is_fatal() {
        let g = BoxGeometry::default();
        let with_p = Partition::new(
            &g,
            interval(0.0, 2.0),
            vec![Region::new(interval(0.0, 2.0), ["p"])],
            BTreeMap::from([("p".to_string(), interval(0.0, 2.0))]),
        )
        .unwrap();
        let with_q = Partition::new(
            &g,
            interval(0.0, 2.0),
            vec![Region::new(interval(0.0, 2.0), ["q"])],
            BTreeMap::from([("q".to_string(), interval(0.0, 2.0))]),
        )
        .unwrap();
        let abstractions = BTreeMap::from([
            (Mode::new("e", "s0"), abstract_mode(&g, &with_p)),
            (Mode::new("e", "s1"), abstract_mode(&g, &with_q)),
        ]);

        let res = merge_partitions(&g, abstractions);
        assert!(matches!(res, Err(Error::PropositionSetMismatch { .. })));
    }

    #[test]
    fn test_label_mismatch_is_fatal() {
        let g = BoxGeometry::default();
        let props = BTreeMap::from([("p".to_string(), interval(0.0, 1.0))]);
        let left = Partition::new(
            &g,
            interval(0.0, 2.0),
            vec![
                Region::new(interval(0.0, 1.0), ["p"]),
                Region::unlabeled(interval(1.0, 2.0)),
            ],
            props.clone(),
        )
        .unwrap();
        let right = Partition::new(
            &g,
            interval(0.0, 2.0),
            vec![
                Region::unlabeled(interval(0.0, 1.0)),
                Region::new(interval(1.0, 2.0), ["p"]),
            ],
            props,
        )
        .unwrap();
        let abstractions = BTreeMap::from([
            (Mode::new("e", "s0"), abstract_mode(&g, &left)),
            (Mode::new("e", "s1"), abstract_mode(&g, &right)),
        ]);

        let res = merge_partitions(&g, abstractions);
        assert!(matches!(res, Err(Error::PropositionMismatch { region: 0, .. })));
    }

    #[test]
    fn test_unknown_mode_lookup() {
        let g = BoxGeometry::default();
        let part = labeled_line(&g);
        let abstractions = BTreeMap::from([(Mode::new("e", "s0"), abstract_mode(&g, &part))]);
        let merged = merge_partitions(&g, abstractions).unwrap().unwrap();

        assert_eq!(merged.ppp().len(), merged.modes()[&Mode::new("e", "s0")].len());
        let res = merged.region_to_active_subsystem(&Mode::new("e", "s9"), 0);
        assert!(matches!(res, Err(Error::UnknownMode(_))));

        let n = merged.ppp().len();
        let res = merged.region_to_subsystem_region(&Mode::new("e", "s0"), n);
        assert!(matches!(res, Err(Error::UnknownRegion { region, len }) if region == n && len == n));
        assert_eq!(merged.parent(&Mode::new("e", "s0"), n - 1).unwrap(), n - 1);

        assert_eq!(merged.ap_labeling().len(), n);
        for (label, region) in merged.ap_labeling().iter().zip(merged.ppp().regions()) {
            assert_eq!(label, &region.props);
        }
    }

    #[test]
    fn test_action_labels() {
        let only_sys = [Mode::new("e", "left"), Mode::new("e", "right")];
        let labels = action_labels(&only_sys);
        assert_eq!(labels[&only_sys[0]].env, None);
        assert_eq!(labels[&only_sys[0]].sys.as_deref(), Some("left"));

        let only_env = [Mode::new("calm", "s"), Mode::new("windy", "s")];
        let labels = action_labels(&only_env);
        assert_eq!(labels[&only_env[1]].env.as_deref(), Some("windy"));
        assert_eq!(labels[&only_env[1]].sys, None);

        let both = [Mode::new("calm", "l"), Mode::new("windy", "r")];
        let labels = action_labels(&both);
        assert!(labels[&both[0]].env.is_some() && labels[&both[0]].sys.is_some());

        let single = [Mode::new("e", "s")];
        let labels = action_labels(&single);
        assert_eq!(labels[&single[0]].sys.as_deref(), Some("s"));
        assert_eq!(labels[&single[0]].env, None);
    }
}
