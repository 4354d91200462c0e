//! The reachability oracle consumed by the refinement engine.
//!
//! Given a start region, a target region and an active subsystem, the oracle
//! computes the N-step predecessor set of the target inside the start region
//! (usually by solving linear programs). The engine only calls it; retries,
//! solver choice and numerics are the oracle's business.

use crate::error::Result;
use crate::params::DiscretizeParams;

/// One reachability question: "which states of `from` reach `to`?"
#[derive(Debug)]
pub struct FeasibilityQuery<'a, S, T> {
    pub from: &'a S,
    pub to: &'a S,
    pub subsystem: &'a T,
    /// Horizon length `N`.
    pub horizon: usize,
    /// Allow re-planning at intermediate steps.
    pub closed_loop: bool,
    /// In closed loop, also accept reaching the target in fewer than `N` steps.
    pub use_all_horizon: bool,
    /// Set the trajectory must stay in; `None` means "stay in `from`".
    pub trans_set: Option<&'a S>,
    /// Maximum number of polytopes of `to` considered.
    pub max_num_poly: usize,
}

impl<S, T> Clone for FeasibilityQuery<'_, S, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, T> Copy for FeasibilityQuery<'_, S, T> {}

impl<'a, S, T> FeasibilityQuery<'a, S, T> {
    /// Builds a query with horizon and policy options taken from `params`.
    pub fn new(from: &'a S, to: &'a S, subsystem: &'a T, params: &DiscretizeParams) -> Self {
        Self {
            from,
            to,
            subsystem,
            horizon: params.horizon,
            closed_loop: params.closed_loop,
            use_all_horizon: params.use_all_horizon,
            trans_set: None,
            max_num_poly: params.max_num_poly,
        }
    }

    pub fn with_trans_set(mut self, trans_set: Option<&'a S>) -> Self {
        self.trans_set = trans_set;
        self
    }
}

/// Finite-horizon reachability over set type `S` and subsystem type `T`.
pub trait Oracle<S, T> {
    /// The predecessor set S0 ⊆ `from` of states that reach `to` within the horizon.
    fn solve_feasible(&self, query: &FeasibilityQuery<'_, S, T>) -> Result<S>;

    /// Whether every state of `from` reaches `to` within the horizon.
    fn is_feasible(&self, query: &FeasibilityQuery<'_, S, T>) -> Result<bool>;
}
