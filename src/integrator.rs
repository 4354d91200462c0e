//! Reference oracle: single integrators with box-bounded inputs.
//!
//! Each [`Integrator`] subsystem evolves as `x⁺ = x + u + w` on its domain,
//! with `|u_d| ≤ ū_d` per axis and an optional box disturbance `w ∈ W`.
//! In `N` steps the state can move by at most `N·(ū_d − w̄_d)` along axis `d`
//! regardless of the disturbance, where `w̄_d` is the largest magnitude of `W`
//! along that axis. The predecessor set of a target is therefore the target
//! grown by that margin. The model is exact for `N = 1`; for longer horizons
//! intermediate states are not constrained to the transition set.

use crate::boxes::{BoxGeometry, BoxSet};
use crate::dynamics::Subsystem;
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::oracle::{FeasibilityQuery, Oracle};

#[derive(Debug, Clone, PartialEq)]
pub struct Integrator {
    domain: BoxSet,
    input_bound: Vec<f64>,
    disturbance: Option<BoxSet>,
}

impl Integrator {
    /// An undisturbed integrator with input bounds `|u_d| ≤ input_bound[d]`.
    pub fn new(domain: BoxSet, input_bound: Vec<f64>) -> Self {
        assert!(
            input_bound.iter().all(|&u| u >= 0.0),
            "Input bounds must be non-negative"
        );
        Self {
            domain,
            input_bound,
            disturbance: None,
        }
    }

    /// Adds the disturbance set `W`, which must have the dimension of the input.
    pub fn with_disturbance(mut self, disturbance: BoxSet) -> Self {
        if let Some(dim) = disturbance.dim() {
            assert_eq!(dim, self.dim(), "Disturbance must match the input dimension");
        }
        self.disturbance = Some(disturbance);
        self
    }

    pub fn input_bound(&self) -> &[f64] {
        &self.input_bound
    }

    pub fn dim(&self) -> usize {
        self.input_bound.len()
    }

    /// Largest disturbance magnitude per axis.
    fn disturbance_bound(&self) -> Vec<f64> {
        let mut bound = vec![0.0_f64; self.dim()];
        if let Some(w) = &self.disturbance {
            for b in w.boxes() {
                for (d, wd) in bound.iter_mut().enumerate() {
                    *wd = wd.max(b.lower()[d].abs()).max(b.upper()[d].abs());
                }
            }
        }
        bound
    }

    /// Per-axis displacement guaranteed within `horizon` steps.
    pub fn reach_margin(&self, horizon: usize) -> Vec<f64> {
        self.input_bound
            .iter()
            .zip(self.disturbance_bound())
            .map(|(u, w)| horizon as f64 * (u - w))
            .collect()
    }
}

impl Subsystem<BoxSet> for Integrator {
    fn domain(&self) -> &BoxSet {
        &self.domain
    }

    fn disturbance(&self) -> Option<&BoxSet> {
        self.disturbance.as_ref()
    }
}

/// [`Oracle`] for [`Integrator`] subsystems over [`BoxGeometry`].
#[derive(Debug, Clone, Default)]
pub struct IntegratorOracle {
    geometry: BoxGeometry,
}

impl IntegratorOracle {
    pub fn new(geometry: BoxGeometry) -> Self {
        Self { geometry }
    }
}

impl Oracle<BoxSet, Integrator> for IntegratorOracle {
    fn solve_feasible(&self, query: &FeasibilityQuery<'_, BoxSet, Integrator>) -> Result<BoxSet> {
        let g = &self.geometry;
        let target = g.largest(query.to, query.max_num_poly);
        if let Some(dim) = target.dim() {
            if dim != query.subsystem.dim() {
                return Err(Error::oracle(format!(
                    "subsystem has dimension {} but target has dimension {}",
                    query.subsystem.dim(),
                    dim
                )));
            }
        }
        let reach = g.dilate(&target, &query.subsystem.reach_margin(query.horizon))?;
        let mut s0 = g.intersect(query.from, &reach)?;
        if let Some(trans_set) = query.trans_set {
            s0 = g.intersect(&s0, trans_set)?;
        }
        Ok(s0)
    }

    fn is_feasible(&self, query: &FeasibilityQuery<'_, BoxSet, Integrator>) -> Result<bool> {
        let s0 = self.solve_feasible(query)?;
        self.geometry.is_subset(query.from, &s0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::boxes::Aabb;
    use crate::params::DiscretizeParams;

    #[test]
    fn test_predecessor_is_dilated_target() {
        let oracle = IntegratorOracle::default();
        let sys = Integrator::new(BoxSet::interval(0.0, 10.0), vec![1.0]);
        let from = BoxSet::interval(0.0, 5.0);
        let to = BoxSet::interval(5.0, 6.0);
        let params = DiscretizeParams::default().with_horizon(2);

        let query = FeasibilityQuery::new(&from, &to, &sys, &params);
        let s0 = oracle.solve_feasible(&query).unwrap();
        assert_eq!(s0, BoxSet::interval(3.0, 5.0));
        assert!(!oracle.is_feasible(&query).unwrap());

        let close = BoxSet::interval(3.5, 5.0);
        let query = FeasibilityQuery::new(&close, &to, &sys, &params);
        assert!(oracle.is_feasible(&query).unwrap());
    }

    #[test]
    fn test_trans_set_restricts_predecessor() {
        let oracle = IntegratorOracle::default();
        let sys = Integrator::new(BoxSet::interval(0.0, 10.0), vec![1.0]);
        let from = BoxSet::interval(4.0, 5.0);
        let to = BoxSet::interval(5.0, 6.0);
        let stay = BoxSet::interval(4.5, 6.0);
        let params = DiscretizeParams::default().with_horizon(1);

        let query = FeasibilityQuery::new(&from, &to, &sys, &params).with_trans_set(Some(&stay));
        assert_eq!(oracle.solve_feasible(&query).unwrap(), BoxSet::interval(4.5, 5.0));
    }

    #[test]
    fn test_disturbance_reduces_reach() {
        let oracle = IntegratorOracle::default();
        let sys = Integrator::new(BoxSet::interval(0.0, 10.0), vec![1.0])
            .with_disturbance(BoxSet::interval(-0.25, 0.25));
        assert_eq!(sys.reach_margin(2), vec![1.5]);

        let from = BoxSet::interval(0.0, 5.0);
        let to = BoxSet::interval(5.0, 6.0);
        let params = DiscretizeParams::default().with_horizon(1);
        let query = FeasibilityQuery::new(&from, &to, &sys, &params);
        assert_eq!(oracle.solve_feasible(&query).unwrap(), BoxSet::interval(4.25, 5.0));
    }

    #[test]
    fn test_disturbance_margin_per_axis() {
        let domain = BoxSet::rect([0.0, 0.0], [4.0, 4.0]);
        let w = BoxSet::from_boxes(vec![
            Aabb::new(vec![-0.5, -0.1], vec![0.0, 0.1]),
            Aabb::new(vec![0.0, -0.1], vec![0.25, 0.2]),
        ]);
        let sys = Integrator::new(domain, vec![1.0, 0.5]).with_disturbance(w);
        let margin = sys.reach_margin(2);
        assert!((margin[0] - 1.0).abs() < 1e-12);
        assert!((margin[1] - 0.6).abs() < 1e-12);

        let oracle = IntegratorOracle::new(BoxGeometry::default());
        let from = BoxSet::rect([0.0, 0.0], [2.0, 1.0]);
        let to = BoxSet::rect([2.0, 0.0], [3.0, 1.0]);
        let params = DiscretizeParams::default().with_horizon(2);
        let query = FeasibilityQuery::new(&from, &to, &sys, &params);
        let s0 = oracle.solve_feasible(&query).unwrap();
        assert_eq!(oracle.geometry.bounding_box(&s0).unwrap().lower, vec![1.0, 0.0]);
    }

    #[test]
    #[should_panic(expected = "Disturbance must match the input dimension")]
    fn test_disturbance_of_wrong_dimension_is_rejected() {
        let _ = Integrator::new(BoxSet::rect([0.0, 0.0], [1.0, 1.0]), vec![1.0, 1.0])
            .with_disturbance(BoxSet::interval(-0.1, 0.1));
    }

    #[test]
    fn test_dimension_mismatch_is_an_oracle_error() {
        let oracle = IntegratorOracle::default();
        let sys = Integrator::new(BoxSet::interval(0.0, 1.0), vec![1.0]);
        let from = BoxSet::rect([0.0, 0.0], [1.0, 1.0]);
        let params = DiscretizeParams::default();
        let query = FeasibilityQuery::new(&from, &from, &sys, &params);
        assert!(matches!(oracle.solve_feasible(&query), Err(Error::Oracle(_))));
    }
}
