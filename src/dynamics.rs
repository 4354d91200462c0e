//! Continuous dynamics as seen by the refinement engine.
//!
//! The engine never inspects system matrices. It only needs, per region, the
//! active subsystem (to hand to the [`Oracle`][crate::oracle::Oracle]) and that
//! subsystem's domain and disturbance set. Those capabilities are the
//! [`Subsystem`] trait; [`Dynamics`] is the linear / piecewise-affine variant
//! and [`HybridSys`] a set of such dynamics keyed by discrete [`Mode`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use crate::error::{Error, Result};

/// Capabilities of one affine subsystem over a set type `S`.
pub trait Subsystem<S> {
    /// The sub-domain of the state space on which this subsystem is active.
    fn domain(&self) -> &S;

    /// The additive disturbance set, or `None` for undisturbed dynamics.
    fn disturbance(&self) -> Option<&S>;
}

/// Dynamics of a single mode.
#[derive(Debug, Clone)]
pub enum Dynamics<T> {
    /// One linear subsystem active on the whole domain.
    Linear(T),
    /// Several subsystems, each active on its own sub-domain.
    PiecewiseAffine(Vec<T>),
}

impl<T> Dynamics<T> {
    pub fn linear(subsystem: T) -> Self {
        Dynamics::Linear(subsystem)
    }

    pub fn piecewise(subsystems: Vec<T>) -> Result<Self> {
        if subsystems.is_empty() {
            return Err(Error::InvalidParams(
                "piecewise-affine dynamics need at least one subsystem".to_string(),
            ));
        }
        Ok(Dynamics::PiecewiseAffine(subsystems))
    }

    pub fn is_piecewise(&self) -> bool {
        matches!(self, Dynamics::PiecewiseAffine(_))
    }

    /// All subsystems; a linear system has exactly one, with index 0.
    pub fn subsystems(&self) -> &[T] {
        match self {
            Dynamics::Linear(sys) => std::slice::from_ref(sys),
            Dynamics::PiecewiseAffine(list) => list,
        }
    }

    pub fn subsystem(&self, index: usize) -> Option<&T> {
        self.subsystems().get(index)
    }
}

/// A discrete mode: an (environment action, system action) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mode {
    pub env: String,
    pub sys: String,
}

impl Mode {
    pub fn new(env: impl Into<String>, sys: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            sys: sys.into(),
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.env, self.sys)
    }
}

/// Switched dynamics: one [`Dynamics`] per discrete mode.
#[derive(Debug, Clone)]
pub struct HybridSys<T> {
    modes: BTreeMap<Mode, Dynamics<T>>,
}

impl<T> Default for HybridSys<T> {
    fn default() -> Self {
        Self {
            modes: BTreeMap::new(),
        }
    }
}

impl<T> HybridSys<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: Mode, dynamics: Dynamics<T>) -> Self {
        self.insert(mode, dynamics);
        self
    }

    /// Adds (or replaces) the dynamics of `mode`.
    pub fn insert(&mut self, mode: Mode, dynamics: Dynamics<T>) -> Option<Dynamics<T>> {
        self.modes.insert(mode, dynamics)
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn dynamics(&self, mode: &Mode) -> Option<&Dynamics<T>> {
        self.modes.get(mode)
    }

    /// Modes in their canonical (sorted) order.
    pub fn modes(&self) -> impl Iterator<Item = (&Mode, &Dynamics<T>)> {
        self.modes.iter()
    }

    /// Distinct environment actions over all modes.
    pub fn env_actions(&self) -> BTreeSet<&str> {
        self.modes.keys().map(|m| m.env.as_str()).collect()
    }

    /// Distinct system actions over all modes.
    pub fn sys_actions(&self) -> BTreeSet<&str> {
        self.modes.keys().map(|m| m.sys.as_str()).collect()
    }
}
