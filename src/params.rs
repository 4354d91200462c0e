//! Discretization parameters.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::dynamics::Mode;
use crate::error::{Error, Result};

/// Options of one refinement run.
///
/// Defaults:
///
/// | Option | Default |
/// |--------|---------|
/// | `horizon` | 10 |
/// | `min_cell_volume` | 0.1 |
/// | `closed_loop` | true |
/// | `conservative` | false |
/// | `max_num_poly` | 5 |
/// | `use_all_horizon` | false |
/// | `trans_length` | 1 |
/// | `remove_trans` | false |
/// | `abs_tol` | 1e-7 |
#[derive(Debug, Clone, PartialEq)]
pub struct DiscretizeParams {
    /// Horizon length `N`, at least 1.
    pub horizon: usize,
    /// Cells smaller than this are never created by a split.
    pub min_cell_volume: f64,
    /// Use the closed-loop reachability algorithm.
    pub closed_loop: bool,
    /// If true, trajectories must stay inside the starting cell. Otherwise they may
    /// move inside the convexified proposition-preserving cell the start descends from.
    pub conservative: bool,
    /// Maximum number of polytopes of a region used in reachability analysis.
    pub max_num_poly: usize,
    /// In closed loop, also look for reachability in fewer than `N` steps.
    pub use_all_horizon: bool,
    /// Number of cells a transition may cross: 1 checks only neighbors,
    /// 2 neighbors of neighbors, and so on.
    pub trans_length: usize,
    /// Actively remove found transitions between cells that stop being neighbors.
    pub remove_trans: bool,
    /// Maximum volume of an "empty" polytope.
    pub abs_tol: f64,
}

impl Default for DiscretizeParams {
    fn default() -> Self {
        Self {
            horizon: 10,
            min_cell_volume: 0.1,
            closed_loop: true,
            conservative: false,
            max_num_poly: 5,
            use_all_horizon: false,
            trans_length: 1,
            remove_trans: false,
            abs_tol: 1e-7,
        }
    }
}

impl DiscretizeParams {
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }
    pub fn with_min_cell_volume(mut self, min_cell_volume: f64) -> Self {
        self.min_cell_volume = min_cell_volume;
        self
    }
    pub fn with_closed_loop(mut self, closed_loop: bool) -> Self {
        self.closed_loop = closed_loop;
        self
    }
    pub fn with_conservative(mut self, conservative: bool) -> Self {
        self.conservative = conservative;
        self
    }
    pub fn with_max_num_poly(mut self, max_num_poly: usize) -> Self {
        self.max_num_poly = max_num_poly;
        self
    }
    pub fn with_use_all_horizon(mut self, use_all_horizon: bool) -> Self {
        self.use_all_horizon = use_all_horizon;
        self
    }
    pub fn with_trans_length(mut self, trans_length: usize) -> Self {
        self.trans_length = trans_length;
        self
    }
    pub fn with_remove_trans(mut self, remove_trans: bool) -> Self {
        self.remove_trans = remove_trans;
        self
    }
    pub fn with_abs_tol(mut self, abs_tol: f64) -> Self {
        self.abs_tol = abs_tol;
        self
    }

    /// Checks the preconditions of a refinement run.
    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(Error::InvalidParams("horizon must be at least 1".to_string()));
        }
        if self.trans_length == 0 {
            return Err(Error::InvalidParams(
                "trans_length must be at least 1".to_string(),
            ));
        }
        if self.max_num_poly == 0 {
            return Err(Error::InvalidParams(
                "max_num_poly must be at least 1".to_string(),
            ));
        }
        if !(self.min_cell_volume.is_finite() && self.min_cell_volume > 0.0) {
            return Err(Error::InvalidParams(format!(
                "min_cell_volume must be positive and finite, got {}",
                self.min_cell_volume
            )));
        }
        if !(self.abs_tol.is_finite() && self.abs_tol >= 0.0) {
            return Err(Error::InvalidParams(format!(
                "abs_tol must be non-negative and finite, got {}",
                self.abs_tol
            )));
        }
        Ok(())
    }
}

impl Display for DiscretizeParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{N: {}, trans_length: {}, closed_loop: {}, conservative: {}, \
             use_all_horizon: {}, min_cell_volume: {}, max_num_poly: {}}}",
            self.horizon,
            self.trans_length,
            self.closed_loop,
            self.conservative,
            self.use_all_horizon,
            self.min_cell_volume,
            self.max_num_poly
        )
    }
}

/// Per-mode parameters of a switched abstraction.
#[derive(Debug, Clone)]
pub struct SwitchedParams {
    default: DiscretizeParams,
    per_mode: BTreeMap<Mode, DiscretizeParams>,
}

impl Default for SwitchedParams {
    /// Every mode uses `N = 1` and `trans_length = 1`.
    fn default() -> Self {
        Self::new(DiscretizeParams::default().with_horizon(1).with_trans_length(1))
    }
}

impl SwitchedParams {
    /// Uses `default` for every mode without an override.
    pub fn new(default: DiscretizeParams) -> Self {
        Self {
            default,
            per_mode: BTreeMap::new(),
        }
    }

    pub fn with_mode(mut self, mode: Mode, params: DiscretizeParams) -> Self {
        self.per_mode.insert(mode, params);
        self
    }

    pub fn for_mode(&self, mode: &Mode) -> &DiscretizeParams {
        self.per_mode.get(mode).unwrap_or(&self.default)
    }
}
