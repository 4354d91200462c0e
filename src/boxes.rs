//! Reference geometry backend: finite unions of axis-aligned boxes.
//!
//! A [`BoxSet`] is a list of pairwise interior-disjoint [`Aabb`]s. Every
//! operation keeps that representation: differences are computed by slicing
//! boxes along each axis, so results never need a general polytope library.
//! Boxes thinner than the backend tolerance in any axis are dropped.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::geometry::{BoundingBox, ChebyshevBall, Geometry};

/// Axis-aligned box `[lower, upper]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Aabb {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Aabb {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        assert_eq!(lower.len(), upper.len(), "Bounds must have the same dimension");
        assert!(
            lower.iter().zip(&upper).all(|(l, u)| l <= u),
            "Lower bound {:?} exceeds upper bound {:?}",
            lower,
            upper
        );
        Self { lower, upper }
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn width(&self, d: usize) -> f64 {
        self.upper[d] - self.lower[d]
    }

    pub fn volume(&self) -> f64 {
        (0..self.dim()).map(|d| self.width(d)).product()
    }

    /// Radius of the largest inscribed ball: half the smallest width.
    pub fn inradius(&self) -> f64 {
        (0..self.dim())
            .map(|d| self.width(d) / 2.0)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn center(&self) -> Vec<f64> {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(l, u)| (l + u) / 2.0)
            .collect()
    }

    /// Length of the overlap of the projections on axis `d` (negative if apart).
    fn overlap(&self, other: &Aabb, d: usize) -> f64 {
        self.upper[d].min(other.upper[d]) - self.lower[d].max(other.lower[d])
    }

    /// Whether the interiors intersect.
    fn overlaps(&self, other: &Aabb, tol: f64) -> bool {
        (0..self.dim()).all(|d| self.overlap(other, d) > tol)
    }

    /// Whether the boxes share a facet (or more).
    ///
    /// The closed boxes must meet in every axis, with positive overlap in all
    /// axes but at most one.
    fn touches(&self, other: &Aabb, tol: f64) -> bool {
        let mut thin = 0;
        for d in 0..self.dim() {
            let overlap = self.overlap(other, d);
            if overlap < -tol {
                return false;
            }
            if overlap <= tol {
                thin += 1;
            }
        }
        thin <= 1
    }

    fn intersection(&self, other: &Aabb, tol: f64) -> Option<Aabb> {
        if !self.overlaps(other, tol) {
            return None;
        }
        let lower = self.lower.iter().zip(&other.lower).map(|(a, b)| a.max(*b)).collect();
        let upper = self.upper.iter().zip(&other.upper).map(|(a, b)| a.min(*b)).collect();
        Some(Aabb { lower, upper })
    }

    /// `self \ other` as interior-disjoint boxes, sliced axis by axis.
    fn subtract(&self, other: &Aabb, tol: f64) -> Vec<Aabb> {
        if !self.overlaps(other, tol) {
            return vec![self.clone()];
        }
        let mut rest = self.clone();
        let mut pieces = Vec::new();
        for d in 0..self.dim() {
            if other.lower[d] > rest.lower[d] + tol {
                let mut below = rest.clone();
                below.upper[d] = other.lower[d];
                rest.lower[d] = other.lower[d];
                pieces.push(below);
            }
            if other.upper[d] < rest.upper[d] - tol {
                let mut above = rest.clone();
                above.lower[d] = other.upper[d];
                rest.upper[d] = other.upper[d];
                pieces.push(above);
            }
        }
        // `rest` now lies inside `other`.
        pieces
    }

    /// The union as a box, if the boxes are flush along one full facet.
    fn merge(&self, other: &Aabb, tol: f64) -> Option<Aabb> {
        let mut axis = None;
        for d in 0..self.dim() {
            let same = (self.lower[d] - other.lower[d]).abs() <= tol
                && (self.upper[d] - other.upper[d]).abs() <= tol;
            if same {
                continue;
            }
            let flush = (self.upper[d] - other.lower[d]).abs() <= tol
                || (other.upper[d] - self.lower[d]).abs() <= tol;
            if !flush || axis.is_some() {
                return None;
            }
            axis = Some(d);
        }
        let mut merged = self.clone();
        if let Some(d) = axis {
            merged.lower[d] = self.lower[d].min(other.lower[d]);
            merged.upper[d] = self.upper[d].max(other.upper[d]);
        }
        Some(merged)
    }

    /// Grows the box by `margin[d]` on both sides of axis `d` (shrinks if negative).
    ///
    /// Returns `None` if the box vanishes.
    pub fn dilate(&self, margin: &[f64]) -> Option<Aabb> {
        assert_eq!(margin.len(), self.dim(), "Margin must match the box dimension");
        let lower: Vec<f64> = self.lower.iter().zip(margin).map(|(l, m)| l - m).collect();
        let upper: Vec<f64> = self.upper.iter().zip(margin).map(|(u, m)| u + m).collect();
        if lower.iter().zip(&upper).any(|(l, u)| l > u) {
            return None;
        }
        Some(Aabb { lower, upper })
    }
}

/// A finite union of interior-disjoint boxes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxSet {
    boxes: Vec<Aabb>,
}

impl BoxSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Boxes must be pairwise interior-disjoint.
    pub fn from_boxes(boxes: Vec<Aabb>) -> Self {
        Self { boxes }
    }

    pub fn from_box(b: Aabb) -> Self {
        Self { boxes: vec![b] }
    }

    /// The 1-D interval `[lo, hi]`.
    pub fn interval(lo: f64, hi: f64) -> Self {
        Self::from_box(Aabb::new(vec![lo], vec![hi]))
    }

    /// The box `[lower, upper]`.
    pub fn rect(lower: impl Into<Vec<f64>>, upper: impl Into<Vec<f64>>) -> Self {
        Self::from_box(Aabb::new(lower.into(), upper.into()))
    }

    pub fn boxes(&self) -> &[Aabb] {
        &self.boxes
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Dimension, or `None` for the empty set.
    pub fn dim(&self) -> Option<usize> {
        self.boxes.first().map(Aabb::dim)
    }
}

impl FromIterator<Aabb> for BoxSet {
    fn from_iter<I: IntoIterator<Item = Aabb>>(iter: I) -> Self {
        Self::from_boxes(iter.into_iter().collect())
    }
}

/// [`Geometry`] over [`BoxSet`]s.
#[derive(Debug, Clone)]
pub struct BoxGeometry {
    /// Widths and overlaps up to `tol` count as zero.
    pub tol: f64,
}

impl Default for BoxGeometry {
    fn default() -> Self {
        Self { tol: 1e-9 }
    }
}

impl BoxGeometry {
    pub fn new(tol: f64) -> Self {
        Self { tol }
    }

    fn check_dims(&self, a: &BoxSet, b: &BoxSet) -> Result<()> {
        match (a.dim(), b.dim()) {
            (Some(da), Some(db)) if da != db => Err(Error::geometry(format!(
                "dimension mismatch: {} vs {}",
                da, db
            ))),
            _ => Ok(()),
        }
    }

    fn is_thin(&self, b: &Aabb) -> bool {
        (0..b.dim()).any(|d| b.width(d) <= self.tol)
    }

    /// `a ∪ b`, keeping the boxes interior-disjoint.
    pub fn union(&self, a: &BoxSet, b: &BoxSet) -> Result<BoxSet> {
        let extra = self.difference(b, a)?;
        Ok(a.boxes.iter().chain(&extra.boxes).cloned().collect())
    }

    /// Union of every box of `a` grown by `margin`.
    ///
    /// Grown boxes may overlap each other; overlaps are sliced away.
    pub fn dilate(&self, a: &BoxSet, margin: &[f64]) -> Result<BoxSet> {
        let mut result = BoxSet::empty();
        for b in &a.boxes {
            if let Some(grown) = b.dilate(margin) {
                if !self.is_thin(&grown) {
                    result = self.union(&result, &BoxSet::from_box(grown))?;
                }
            }
        }
        Ok(result)
    }

    /// The `n` largest boxes of `a`, by volume.
    pub fn largest(&self, a: &BoxSet, n: usize) -> BoxSet {
        let mut boxes = a.boxes.clone();
        boxes.sort_by(|x, y| y.volume().total_cmp(&x.volume()));
        boxes.truncate(n);
        BoxSet::from_boxes(boxes)
    }

    /// Whether `a ⊆ b` up to measure zero.
    pub fn is_subset(&self, a: &BoxSet, b: &BoxSet) -> Result<bool> {
        Ok(self.volume(&self.difference(a, b)?)? <= self.tol)
    }
}

/// Disjoint-set forest over `n` elements.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Keep the smaller index as root so components come out in box order.
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

impl Geometry for BoxGeometry {
    type Set = BoxSet;

    fn intersect(&self, a: &BoxSet, b: &BoxSet) -> Result<BoxSet> {
        self.check_dims(a, b)?;
        let mut boxes = Vec::new();
        for x in &a.boxes {
            for y in &b.boxes {
                if let Some(z) = x.intersection(y, self.tol) {
                    boxes.push(z);
                }
            }
        }
        Ok(BoxSet::from_boxes(boxes))
    }

    fn difference(&self, a: &BoxSet, b: &BoxSet) -> Result<BoxSet> {
        self.check_dims(a, b)?;
        let mut pieces = a.boxes.clone();
        for y in &b.boxes {
            pieces = pieces.iter().flat_map(|x| x.subtract(y, self.tol)).collect();
        }
        pieces.retain(|x| !self.is_thin(x));
        Ok(BoxSet::from_boxes(pieces))
    }

    fn volume(&self, a: &BoxSet) -> Result<f64> {
        Ok(a.boxes.iter().map(Aabb::volume).sum())
    }

    fn chebyshev_ball(&self, a: &BoxSet) -> Result<ChebyshevBall> {
        let best = a
            .boxes
            .iter()
            .max_by(|x, y| x.inradius().total_cmp(&y.inradius()));
        Ok(match best {
            Some(b) => ChebyshevBall {
                radius: b.inradius(),
                center: b.center(),
            },
            None => ChebyshevBall::empty(),
        })
    }

    fn is_adjacent(&self, a: &BoxSet, b: &BoxSet) -> Result<bool> {
        self.check_dims(a, b)?;
        Ok(a
            .boxes
            .iter()
            .any(|x| b.boxes.iter().any(|y| x.touches(y, self.tol))))
    }

    fn decompose(&self, a: &BoxSet) -> Result<Vec<BoxSet>> {
        let n = a.boxes.len();
        let mut components = UnionFind::new(n);
        for i in 0..n {
            for j in 0..i {
                if a.boxes[i].touches(&a.boxes[j], self.tol) {
                    components.union(i, j);
                }
            }
        }
        let mut groups: BTreeMap<usize, Vec<Aabb>> = BTreeMap::new();
        for (i, b) in a.boxes.iter().enumerate() {
            groups.entry(components.find(i)).or_default().push(b.clone());
        }
        Ok(groups.into_values().map(BoxSet::from_boxes).collect())
    }

    fn convex_pieces(&self, a: &BoxSet) -> Result<Vec<BoxSet>> {
        let mut boxes = a.boxes.clone();
        // Merge flush pairs until none is left.
        'outer: loop {
            for i in 0..boxes.len() {
                for j in 0..i {
                    if let Some(merged) = boxes[j].merge(&boxes[i], self.tol) {
                        boxes[j] = merged;
                        boxes.remove(i);
                        continue 'outer;
                    }
                }
            }
            break;
        }
        Ok(boxes.into_iter().map(BoxSet::from_box).collect())
    }

    fn bounding_box(&self, a: &BoxSet) -> Result<BoundingBox> {
        let first = a
            .boxes
            .first()
            .ok_or_else(|| Error::geometry("bounding box of an empty set"))?;
        let mut lower = first.lower.clone();
        let mut upper = first.upper.clone();
        for b in &a.boxes[1..] {
            for d in 0..b.dim() {
                lower[d] = lower[d].min(b.lower[d]);
                upper[d] = upper[d].max(b.upper[d]);
            }
        }
        Ok(BoundingBox { lower, upper })
    }

    fn num_pieces(&self, a: &BoxSet) -> usize {
        a.boxes.len()
    }
}
