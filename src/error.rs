//! Error types.
//!
//! Invariant violations (convexification, merge consistency) are fatal and
//! returned immediately. Failures of the geometry backend or the feasibility
//! oracle are wrapped as-is and never retried.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::dynamics::Mode;

/// Boxed error coming from an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Crate result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A region had more than one convex piece after convexification.
    #[error("problem in convexification: region {region} has {pieces} convex pieces")]
    Convexification { region: usize, pieces: usize },

    /// Two geometrically overlapping regions of different modes carry different labels.
    #[error(
        "inconsistent AP labels between intersecting regions: \
         merged region {region} has {first:?} but mode {mode} has {second:?}"
    )]
    PropositionMismatch {
        region: usize,
        mode: Mode,
        first: BTreeSet<String>,
        second: BTreeSet<String>,
    },

    #[error("partitions of modes {first} and {second} have different domains")]
    DomainMismatch { first: Mode, second: Mode },

    #[error("partitions of modes {first} and {second} have different sets of continuous propositions")]
    PropositionSetMismatch { first: Mode, second: Mode },

    #[error("mode {0} has no abstraction")]
    UnknownMode(Mode),

    #[error("region {region} does not exist, the partition has {len} regions")]
    UnknownRegion { region: usize, len: usize },

    #[error("invalid discretization parameters: {0}")]
    InvalidParams(String),

    #[error("invalid partition: {0}")]
    InvalidPartition(String),

    #[error("geometry backend failed")]
    Geometry(#[source] BoxError),

    #[error("feasibility oracle failed")]
    Oracle(#[source] BoxError),
}

impl Error {
    /// Wraps a failure of the geometry backend.
    pub fn geometry(err: impl Into<BoxError>) -> Self {
        Error::Geometry(err.into())
    }

    /// Wraps a failure of the feasibility oracle.
    pub fn oracle(err: impl Into<BoxError>) -> Self {
        Error::Oracle(err.into())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_external_error_is_kept_as_source() {
        let err = Error::oracle("LP solver returned status INFEASIBLE_OR_UNBOUNDED");
        assert_eq!(err.to_string(), "feasibility oracle failed");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("LP solver returned status INFEASIBLE_OR_UNBOUNDED")
        );
    }

    #[test]
    fn test_display_mentions_modes() {
        let err = Error::DomainMismatch {
            first: Mode::new("e0", "s0"),
            second: Mode::new("e0", "s1"),
        };
        assert_eq!(
            err.to_string(),
            "partitions of modes (e0, s0) and (e0, s1) have different domains"
        );
    }
}
