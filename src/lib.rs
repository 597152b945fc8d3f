#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(clippy::all, clippy::cargo, clippy::nursery, missing_docs)]
#![doc = include_str!("../README.md")]

/// Exact symbolic algebra: polynomials and rational functions.
pub mod symbolic;
/// Domain-tagged expressions and the transforms between domains.
pub mod domain;
/// Shared numeric helpers for evaluating symbolic results.
pub mod math;
/// Circuit components, formulation, solvers and network algebra.
pub mod circuits;
/// Analysis configuration and memoizing sessions.
pub mod session;
/// Error types shared between modules.
pub mod errors;

/// Common exports for downstream crates.
pub mod prelude;
