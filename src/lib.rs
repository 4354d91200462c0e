//! # discretize-rs: finite abstractions of piecewise-affine dynamics
//!
//! **`discretize-rs`** computes a finite transition system that soundly abstracts a
//! continuous-state system (linear, piecewise-affine, or switched among discrete modes)
//! for temporal-logic planning.
//!
//! ## How it works
//!
//! The state space starts out partitioned into regions labeled with atomic propositions.
//! The refinement engine repeatedly picks a pair of nearby regions `(i, j)` and asks a
//! reachability oracle for the states of `i` that can be steered into `j` within the
//! horizon. If only part of `i` can, `i` is split into that part and the rest, so that
//! in the end every transition of the abstraction is either certain or absent.
//!
//! ## Key Features
//!
//! - **Backend-Agnostic**: Set operations go through the [`Geometry`][crate::geometry::Geometry]
//!   trait and reachability through the [`Oracle`][crate::oracle::Oracle] trait.
//!   A box-based backend ([`boxes`]) and an integrator oracle ([`integrator`]) are included.
//! - **Stable Indices**: Split regions keep their index and new pieces are appended, so the
//!   maps from refined regions to their ancestors stay valid.
//! - **Switched Systems**: Per-mode abstractions are merged into one common partition with
//!   action-labelled transitions.
//! - **Observable**: An [`Observer`][crate::observer::Observer] sees every iteration of the loop.
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::collections::BTreeMap;
//!
//! use discretize_rs::boxes::{BoxGeometry, BoxSet};
//! use discretize_rs::discretize::Discretizer;
//! use discretize_rs::dynamics::Dynamics;
//! use discretize_rs::integrator::{Integrator, IntegratorOracle};
//! use discretize_rs::params::DiscretizeParams;
//! use discretize_rs::partition::prop_partition;
//!
//! let g = BoxGeometry::default();
//! let oracle = IntegratorOracle::default();
//!
//! // 1. Label the domain [0, 3] with two propositions
//! let part = prop_partition(
//!     &g,
//!     BoxSet::interval(0.0, 3.0),
//!     BTreeMap::from([
//!         ("home".to_string(), BoxSet::interval(0.0, 2.0)),
//!         ("goal".to_string(), BoxSet::interval(2.0, 3.0)),
//!     ]),
//! )
//! .unwrap();
//!
//! // 2. Dynamics x+ = x + u with |u| <= 1
//! let dynamics = Dynamics::linear(Integrator::new(BoxSet::interval(0.0, 3.0), vec![1.0]));
//!
//! // 3. Refine with a one-step horizon
//! let params = DiscretizeParams::default().with_horizon(1).with_min_cell_volume(0.5);
//! let ab = Discretizer::new(&g, &oracle).discretize(&part, &dynamics, &params).unwrap();
//!
//! // "home" was split into the part next to "goal" and the rest
//! assert_eq!(ab.ppp().len(), 3);
//! assert!(ab.ts().has_transition(0, 1));
//! ```
//!
//! ## Core Components
//!
//! - **[`discretize`]**: The refinement engine and the [`Discretizer`][crate::discretize::Discretizer] manager.
//! - **[`switched`]**: Abstraction of switched systems and merging of partitions.
//! - **[`abstraction`]**: The result records and their index lookups.
//! - **[`partition`]**: Labeled partitions and their preprocessing.

pub mod abstraction;
pub mod bitset;
pub mod boxes;
pub mod discretize;
pub mod dynamics;
pub mod error;
pub mod geometry;
pub mod integrator;
pub mod matrix;
pub mod observer;
pub mod oracle;
pub mod params;
pub mod partition;
pub mod switched;
pub mod ts;
