//! Labeled partitions of a continuous domain.
//!
//! A [`Partition`] is an ordered list of [`Region`]s covering a domain, each
//! labeled with atomic propositions, together with a symmetric and reflexive
//! adjacency relation. Region indices are positions in that list.
//!
//! The preprocessing helpers of the refinement engine live here too:
//!
//! - [`prop_partition`] builds a proposition-preserving partition of a domain,
//! - [`pwa_partition`] splits a partition along the domains of PWA subsystems,
//! - [`convexify`] replaces every region by its convex pieces.
//!
//! All of them return index maps from the new regions to the old ones.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;

use log::{debug, warn};

use crate::dynamics::Subsystem;
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::matrix::BoolMatrix;

/// Chebyshev radius below which a pwa-split region is reported as suspiciously small.
const SMALL_REGION_RADIUS: f64 = 1e-5;

/// A labeled subset of the domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Region<S> {
    pub set: S,
    pub props: BTreeSet<String>,
}

impl<S> Region<S> {
    pub fn new<P>(set: S, props: impl IntoIterator<Item = P>) -> Self
    where
        P: Into<String>,
    {
        Self {
            set,
            props: props.into_iter().map(Into::into).collect(),
        }
    }

    pub fn unlabeled(set: S) -> Self {
        Self {
            set,
            props: BTreeSet::new(),
        }
    }

    /// Same labels, different set.
    pub fn relabel(&self, set: S) -> Self {
        Self {
            set,
            props: self.props.clone(),
        }
    }
}

/// Proposition-preserving partition of a domain.
#[derive(Debug, Clone)]
pub struct Partition<S> {
    domain: S,
    regions: Vec<Region<S>>,
    adj: BoolMatrix,
    prop_regions: BTreeMap<String, S>,
}

impl<S: Clone> Partition<S> {
    /// Creates a partition, computing adjacency between all pairs of regions.
    pub fn new<G>(
        geometry: &G,
        domain: S,
        regions: Vec<Region<S>>,
        prop_regions: BTreeMap<String, S>,
    ) -> Result<Self>
    where
        G: Geometry<Set = S>,
    {
        let adj = compute_adjacency(geometry, &regions, |_, _| true)?;
        Self::with_adjacency(domain, regions, adj, prop_regions)
    }

    /// Creates a partition from a precomputed adjacency matrix.
    ///
    /// Fails if the matrix does not match the regions, or is not symmetric and reflexive.
    pub fn with_adjacency(
        domain: S,
        regions: Vec<Region<S>>,
        adj: BoolMatrix,
        prop_regions: BTreeMap<String, S>,
    ) -> Result<Self> {
        if regions.is_empty() {
            return Err(Error::InvalidPartition("partition has no regions".to_string()));
        }
        if adj.size() != regions.len() {
            return Err(Error::InvalidPartition(format!(
                "adjacency is {}x{} but there are {} regions",
                adj.size(),
                adj.size(),
                regions.len()
            )));
        }
        if !adj.is_symmetric() || !adj.is_reflexive() {
            return Err(Error::InvalidPartition(
                "adjacency must be symmetric and reflexive".to_string(),
            ));
        }
        Ok(Self {
            domain,
            regions,
            adj,
            prop_regions,
        })
    }
}

impl<S> Partition<S> {
    pub fn domain(&self) -> &S {
        &self.domain
    }

    pub fn regions(&self) -> &[Region<S>] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Adjacency relation: `adjacency().get(i, j)` iff regions `i` and `j` touch.
    pub fn adjacency(&self) -> &BoolMatrix {
        &self.adj
    }

    pub fn prop_regions(&self) -> &BTreeMap<String, S> {
        &self.prop_regions
    }

    /// Names of the atomic propositions labeling this partition.
    pub fn prop_names(&self) -> BTreeSet<&str> {
        self.prop_regions.keys().map(String::as_str).collect()
    }

    /// Whether the adjacency relation is symmetric and reflexive.
    pub fn check_adjacency(&self) -> bool {
        self.adj.size() == self.regions.len() && self.adj.is_symmetric() && self.adj.is_reflexive()
    }

    /// Whether regions cover the domain without overlapping, up to `tol` in volume.
    pub fn check_cover<G>(&self, geometry: &G, tol: f64) -> Result<bool>
    where
        G: Geometry<Set = S>,
    {
        let domain_volume = geometry.volume(&self.domain)?;
        let mut total = 0.0;
        for region in &self.regions {
            total += geometry.volume(&region.set)?;
        }
        if (total - domain_volume).abs() > tol * domain_volume.max(1.0) {
            debug!("cover: total volume {} vs domain volume {}", total, domain_volume);
            return Ok(false);
        }
        for (i, a) in self.regions.iter().enumerate() {
            for b in &self.regions[..i] {
                let overlap = geometry.volume(&geometry.intersect(&a.set, &b.set)?)?;
                if overlap > tol {
                    debug!("cover: region {} overlaps another region by {}", i, overlap);
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

impl<S> Index<usize> for Partition<S> {
    type Output = Region<S>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.regions[index]
    }
}

/// Adjacency between `regions`, testing geometry only for pairs accepted by `candidate`.
///
/// The result is reflexive; `candidate(i, j)` is asked for `j < i` only.
pub fn compute_adjacency<G, F>(
    geometry: &G,
    regions: &[Region<G::Set>],
    candidate: F,
) -> Result<BoolMatrix>
where
    G: Geometry,
    F: Fn(usize, usize) -> bool,
{
    let n = regions.len();
    let mut adj = BoolMatrix::identity(n);
    for i in 0..n {
        for j in 0..i {
            if candidate(i, j) && geometry.is_adjacent(&regions[i].set, &regions[j].set)? {
                adj.set_symmetric(i, j, true);
            }
        }
    }
    Ok(adj)
}

/// Adjacency of regions derived from a parent partition: only regions whose
/// parents touch (or coincide) are tested geometrically.
fn adjacency_from_parents<G>(
    geometry: &G,
    regions: &[Region<G::Set>],
    parents: &[usize],
    parent_adj: &BoolMatrix,
) -> Result<BoolMatrix>
where
    G: Geometry,
{
    compute_adjacency(geometry, regions, |i, j| {
        let (pi, pj) = (parents[i], parents[j]);
        pi == pj || parent_adj.get(pi, pj)
    })
}

/// Builds a proposition-preserving partition of `domain`.
///
/// Each proposition splits every current region into the part inside it (which
/// gains the label) and the part outside; parts are decomposed into connected
/// pieces and empty parts are dropped.
pub fn prop_partition<G>(
    geometry: &G,
    domain: G::Set,
    prop_regions: BTreeMap<String, G::Set>,
) -> Result<Partition<G::Set>>
where
    G: Geometry,
{
    let mut regions = vec![Region::unlabeled(domain.clone())];
    for (name, prop_set) in &prop_regions {
        let mut next = Vec::new();
        for region in &regions {
            let inside = geometry.intersect(&region.set, prop_set)?;
            if geometry.chebyshev_radius(&inside)? > 0.0 {
                for piece in geometry.decompose(&inside)? {
                    let mut labeled = region.relabel(piece);
                    labeled.props.insert(name.clone());
                    next.push(labeled);
                }
            }
            let outside = geometry.difference(&region.set, prop_set)?;
            if geometry.chebyshev_radius(&outside)? > 0.0 {
                for piece in geometry.decompose(&outside)? {
                    next.push(region.relabel(piece));
                }
            }
        }
        regions = next;
    }
    debug!("prop_partition: {} regions", regions.len());
    Partition::new(geometry, domain, regions, prop_regions)
}

/// Result of [`pwa_partition`].
#[derive(Debug, Clone)]
pub struct PwaPartition<S> {
    pub partition: Partition<S>,
    /// Region index -> index of the subsystem active on it.
    pub subsystem_of: Vec<usize>,
    /// Region index -> index of the region of the input partition it came from.
    pub parent_of: Vec<usize>,
}

/// Splits `partition` along the domains of `subsystems`.
///
/// Subsystems are the outer loop and regions the inner one, so new regions are
/// grouped by subsystem. Only full-dimensional intersections are kept.
pub fn pwa_partition<G, T>(
    geometry: &G,
    subsystems: &[T],
    partition: &Partition<G::Set>,
) -> Result<PwaPartition<G::Set>>
where
    G: Geometry,
    T: Subsystem<G::Set>,
{
    let mut regions = Vec::new();
    let mut subsystem_of = Vec::new();
    let mut parent_of = Vec::new();

    for (k, subsystem) in subsystems.iter().enumerate() {
        for (j, region) in partition.regions().iter().enumerate() {
            let isect = geometry.intersect(subsystem.domain(), &region.set)?;
            let radius = geometry.chebyshev_radius(&isect)?;
            if radius <= 0.0 {
                continue;
            }
            if radius < SMALL_REGION_RADIUS {
                warn!(
                    "pwa_partition: region {} of subsystem {} is very small (Chebyshev radius {}), \
                     discretization may fail",
                    j, k, radius
                );
            }
            regions.push(region.relabel(isect));
            subsystem_of.push(k);
            parent_of.push(j);
        }
    }

    let adj = adjacency_from_parents(geometry, &regions, &parent_of, partition.adjacency())?;
    let partition = Partition::with_adjacency(
        partition.domain().clone(),
        regions,
        adj,
        partition.prop_regions().clone(),
    )?;
    Ok(PwaPartition {
        partition,
        subsystem_of,
        parent_of,
    })
}

/// Replaces every region by its convex pieces.
///
/// Returns the convex partition and the map from new region index to old region index.
pub fn convexify<G>(geometry: &G, partition: &Partition<G::Set>) -> Result<(Partition<G::Set>, Vec<usize>)>
where
    G: Geometry,
{
    let mut regions = Vec::new();
    let mut new2old = Vec::new();
    for (i, region) in partition.regions().iter().enumerate() {
        for piece in geometry.convex_pieces(&region.set)? {
            regions.push(region.relabel(piece));
            new2old.push(i);
        }
    }
    let adj = adjacency_from_parents(geometry, &regions, &new2old, partition.adjacency())?;
    let convex = Partition::with_adjacency(
        partition.domain().clone(),
        regions,
        adj,
        partition.prop_regions().clone(),
    )?;
    Ok((convex, new2old))
}
