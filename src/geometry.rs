//! The geometry contract consumed by the refinement engine.
//!
//! A [`Geometry`] backend owns the representation of regions (a convex
//! polytope or a finite union of them) and answers every set-level question
//! the engine asks. The engine itself never looks inside a set.
//!
//! The crate ships one backend, [`BoxGeometry`][crate::boxes::BoxGeometry],
//! which represents regions as unions of axis-aligned boxes. Polytope or
//! LP-backed libraries plug in by implementing this trait.

use std::fmt::Debug;

use crate::error::Result;

/// The largest ball inscribed in a set.
///
/// For a union of convex pieces this is the largest ball over the pieces.
/// The empty set has radius `0.0` and an empty center.
#[derive(Debug, Clone, PartialEq)]
pub struct ChebyshevBall {
    pub radius: f64,
    pub center: Vec<f64>,
}

impl ChebyshevBall {
    pub fn empty() -> Self {
        Self {
            radius: 0.0,
            center: Vec::new(),
        }
    }
}

/// Axis-aligned bounding box `[lower, upper]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Set operations over (unions of) convex polytopes.
pub trait Geometry {
    /// Region representation.
    type Set: Clone + Debug;

    /// `a ∩ b`.
    fn intersect(&self, a: &Self::Set, b: &Self::Set) -> Result<Self::Set>;

    /// `a \ b`.
    fn difference(&self, a: &Self::Set, b: &Self::Set) -> Result<Self::Set>;

    fn volume(&self, a: &Self::Set) -> Result<f64>;

    fn chebyshev_ball(&self, a: &Self::Set) -> Result<ChebyshevBall>;

    /// Whether `a` and `b` touch along a boundary of positive (d-1)-measure, or overlap.
    fn is_adjacent(&self, a: &Self::Set, b: &Self::Set) -> Result<bool>;

    /// Connected components of `a`. Finite, computed eagerly.
    fn decompose(&self, a: &Self::Set) -> Result<Vec<Self::Set>>;

    /// A covering of `a` by convex sets; an already convex set yields one piece,
    /// the empty set yields none.
    fn convex_pieces(&self, a: &Self::Set) -> Result<Vec<Self::Set>>;

    fn bounding_box(&self, a: &Self::Set) -> Result<BoundingBox>;

    /// Number of convex polytopes in the representation of `a`.
    fn num_pieces(&self, a: &Self::Set) -> usize;

    fn chebyshev_radius(&self, a: &Self::Set) -> Result<f64> {
        Ok(self.chebyshev_ball(a)?.radius)
    }

    /// Set equality, up to measure zero.
    fn is_equal(&self, a: &Self::Set, b: &Self::Set) -> Result<bool> {
        Ok(self.volume(&self.difference(a, b)?)? <= 0.0
            && self.volume(&self.difference(b, a)?)? <= 0.0)
    }
}
