//! Properties of the single-mode refinement engine.
//!
//! Runs the engine on line and grid partitions with the box backend and the
//! integrator oracle, and checks the invariants every result must satisfy.

use std::collections::{BTreeMap, BTreeSet};

use discretize_rs::abstraction::AbstractPwa;
use discretize_rs::boxes::{Aabb, BoxGeometry, BoxSet};
use discretize_rs::discretize::{discretize, Discretizer};
use discretize_rs::dynamics::Dynamics;
use discretize_rs::error::{Error, Result};
use discretize_rs::geometry::Geometry;
use discretize_rs::integrator::{Integrator, IntegratorOracle};
use discretize_rs::observer::Recorder;
use discretize_rs::oracle::{FeasibilityQuery, Oracle};
use discretize_rs::params::DiscretizeParams;
use discretize_rs::partition::{prop_partition, Partition};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use test_log::test;

fn unit_line(n: usize) -> (BoxSet, BTreeMap<String, BoxSet>) {
    let domain = BoxSet::interval(0.0, n as f64);
    let props = BTreeMap::from([("odd".to_string(), {
        let cells = (0..n)
            .filter(|i| i % 2 == 1)
            .map(|i| Aabb::new(vec![i as f64], vec![i as f64 + 1.0]))
            .collect();
        BoxSet::from_boxes(cells)
    })]);
    (domain, props)
}

/// A `n × n` grid of unit cells, each labeled "p" with probability 1/2.
fn random_grid(n: usize, rng: &mut impl Rng) -> (BoxSet, BTreeMap<String, BoxSet>) {
    let domain = BoxSet::rect([0.0, 0.0], [n as f64, n as f64]);
    let mut cells = Vec::new();
    for x in 0..n {
        for y in 0..n {
            if rng.random_bool(0.5) {
                let (x, y) = (x as f64, y as f64);
                cells.push(Aabb::new(vec![x, y], vec![x + 1.0, y + 1.0]));
            }
        }
    }
    (domain, BTreeMap::from([("p".to_string(), BoxSet::from_boxes(cells))]))
}

/// Transitions as pairs of region lower corners, independent of region numbering.
fn geometric_transitions(g: &BoxGeometry, ab: &AbstractPwa<BoxSet, Integrator>) -> BTreeSet<(String, String)> {
    let corner = |i: usize| format!("{:?}", g.bounding_box(&ab.ppp()[i].set).unwrap().lower);
    ab.ts().transitions().map(|t| (corner(t.from), corner(t.to))).collect()
}

fn check_invariants(g: &BoxGeometry, ab: &AbstractPwa<BoxSet, Integrator>, min_cell_volume: f64) {
    let ppp = ab.ppp();
    assert!(ppp.check_adjacency());
    assert!(ppp.check_cover(g, 1e-9).unwrap());

    let domain_volume = g.volume(ppp.domain()).unwrap();
    assert!(ppp.len() as f64 <= domain_volume / min_cell_volume);

    assert_eq!(ab.ppp2orig().len(), ppp.len());
    assert_eq!(ab.ppp2pwa().len(), ppp.len());
    assert_eq!(ab.ts().num_states(), ppp.len());
    for (i, region) in ppp.regions().iter().enumerate() {
        // Every refined region lies inside its ancestors and keeps their labels.
        let (_, orig) = ab.orig_region(i);
        assert!(g.is_subset(&region.set, &orig.set).unwrap());
        assert_eq!(region.props, orig.props);
        let (_, pwa) = ab.pwa_region(i);
        assert!(g.is_subset(&region.set, &pwa.set).unwrap());
        assert_eq!(ab.ts().label_of(i), &region.props);
    }
    for t in ab.ts().transitions() {
        assert!(ab.transitions().get(t.to, t.from));
    }
}

// ─── Line Partitions ───────────────────────────────────────────────────────────

#[test]
fn line_ends_as_half_cells() {
    let g = BoxGeometry::default();
    let oracle = IntegratorOracle::default();
    let (domain, props) = unit_line(4);
    let part = prop_partition(&g, domain.clone(), props).unwrap();
    assert_eq!(part.len(), 4);

    let dynamics = Dynamics::linear(Integrator::new(domain, vec![0.5]));
    let params = DiscretizeParams::default().with_horizon(1).with_min_cell_volume(0.3);
    let ab = discretize(&g, &oracle, &part, &dynamics, &params).unwrap();
    println!("{}", ab);

    check_invariants(&g, &ab, 0.3);
    // Every unit cell is halved: 8 cells, 7 neighbor pairs both ways, 8 self-loops.
    assert_eq!(ab.ppp().len(), 8);
    for region in ab.ppp().regions() {
        assert!((g.volume(&region.set).unwrap() - 0.5).abs() < 1e-9);
    }
    assert_eq!(ab.ts().num_transitions(), 22);
}

#[test]
fn trans_length_beyond_diameter_changes_nothing() {
    let g = BoxGeometry::default();
    let oracle = IntegratorOracle::default();
    let (domain, props) = unit_line(4);
    let part = prop_partition(&g, domain.clone(), props).unwrap();
    let dynamics = Dynamics::linear(Integrator::new(domain, vec![0.5]));
    let params = DiscretizeParams::default().with_horizon(1).with_min_cell_volume(0.3);

    let near = discretize(&g, &oracle, &part, &dynamics, &params).unwrap();
    let far = discretize(&g, &oracle, &part, &dynamics, &params.clone().with_trans_length(4)).unwrap();

    check_invariants(&g, &far, 0.3);
    assert_eq!(near.ppp().len(), far.ppp().len());
    assert_eq!(geometric_transitions(&g, &near), geometric_transitions(&g, &far));
}

#[test]
fn observer_sees_every_iteration() {
    let g = BoxGeometry::default();
    let oracle = IntegratorOracle::default();
    let (domain, props) = unit_line(3);
    let part = prop_partition(&g, domain.clone(), props).unwrap();
    let dynamics = Dynamics::linear(Integrator::new(domain, vec![0.5]));
    let params = DiscretizeParams::default().with_horizon(1).with_min_cell_volume(0.3);

    let mut recorder = Recorder::new();
    let ab = Discretizer::new(&g, &oracle)
        .with_observer(&mut recorder)
        .discretize(&part, &dynamics, &params)
        .unwrap();

    assert_eq!(recorder.steps.last().map(|s| s.num_regions), Some(ab.ppp().len()));
    assert_eq!(ab.ppp().len() - part.len(), recorder.num_splits());
    for (k, step) in recorder.steps.iter().enumerate().skip(1) {
        assert!(step.num_regions >= recorder.steps[k - 1].num_regions);
    }

    let plain = discretize(&g, &oracle, &part, &dynamics, &params).unwrap();
    assert_eq!(plain.transitions(), ab.transitions());
}

// ─── Grid Partitions ───────────────────────────────────────────────────────────

#[test]
fn random_grids_keep_invariants() {
    let g = BoxGeometry::default();
    let oracle = IntegratorOracle::default();
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    for _ in 0..3 {
        let (domain, props) = random_grid(3, &mut rng);
        let part = prop_partition(&g, domain.clone(), props).unwrap();
        assert!(part.check_cover(&g, 1e-9).unwrap());

        let dynamics = Dynamics::linear(Integrator::new(domain, vec![0.5, 0.5]));
        let params = DiscretizeParams::default().with_horizon(1).with_min_cell_volume(0.3);
        let ab = discretize(&g, &oracle, &part, &dynamics, &params).unwrap();
        println!("grid: {} -> {} regions", part.len(), ab.ppp().len());

        check_invariants(&g, &ab, 0.3);
    }
}

#[test]
fn conservative_grid_keeps_invariants() {
    let g = BoxGeometry::default();
    let oracle = IntegratorOracle::default();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let (domain, props) = random_grid(3, &mut rng);
    let part = prop_partition(&g, domain.clone(), props).unwrap();
    let dynamics = Dynamics::linear(Integrator::new(domain, vec![0.5, 0.5]));
    let params = DiscretizeParams::default()
        .with_horizon(1)
        .with_min_cell_volume(0.3)
        .with_conservative(true)
        .with_remove_trans(true);
    let ab = discretize(&g, &oracle, &part, &dynamics, &params).unwrap();

    check_invariants(&g, &ab, 0.3);
    assert_eq!(ab.pwa_ppp().len(), part.len());
}

#[test]
fn disturbance_larger_than_cells_prevents_splits() {
    let g = BoxGeometry::default();
    let oracle = IntegratorOracle::default();
    let (domain, props) = unit_line(4);
    let part = prop_partition(&g, domain.clone(), props).unwrap();
    let dynamics = Dynamics::linear(
        Integrator::new(domain, vec![1.5]).with_disturbance(BoxSet::interval(-1.0, 1.0)),
    );
    let params = DiscretizeParams::default().with_horizon(1).with_min_cell_volume(0.1);
    let ab = discretize(&g, &oracle, &part, &dynamics, &params).unwrap();

    // Pieces would be thinner than the disturbance ball.
    assert_eq!(ab.ppp().len(), part.len());
    check_invariants(&g, &ab, 0.1);
}

// ─── Failures ──────────────────────────────────────────────────────────────────

struct FailingOracle;

impl Oracle<BoxSet, Integrator> for FailingOracle {
    fn solve_feasible(&self, _query: &FeasibilityQuery<'_, BoxSet, Integrator>) -> Result<BoxSet> {
        Err(Error::oracle("LP solver did not converge"))
    }

    fn is_feasible(&self, _query: &FeasibilityQuery<'_, BoxSet, Integrator>) -> Result<bool> {
        Err(Error::oracle("LP solver did not converge"))
    }
}

#[test]
fn oracle_failure_propagates() {
    let g = BoxGeometry::default();
    let part = Partition::new(
        &g,
        BoxSet::interval(0.0, 1.0),
        vec![discretize_rs::partition::Region::unlabeled(BoxSet::interval(0.0, 1.0))],
        BTreeMap::new(),
    )
    .unwrap();
    let dynamics = Dynamics::linear(Integrator::new(BoxSet::interval(0.0, 1.0), vec![1.0]));

    let res = discretize(&g, &FailingOracle, &part, &dynamics, &DiscretizeParams::default());
    assert!(matches!(res, Err(Error::Oracle(_))));
}
