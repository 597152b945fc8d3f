//! Circuit model, formulation, solvers and network algebra.

/// Analysis requests, modified nodal formulation and solutions.
pub mod analysis;
/// Component kinds, records and validation.
pub mod component;
/// Circuit graph: nodes, islands and supernodes.
pub mod graph;
/// One-port equivalents and their composition.
pub mod network;
/// Exact linear solvers.
pub mod solver;
/// MNA stamping helpers.
pub mod stamp;
/// Two-port network representations and conversions.
pub mod twoport;

pub use analysis::{analyze, analyze_with, transfer_function, transfer_function_with, Analysis, LinearSystem, Solution, Unknown};
pub use component::{element, Component, ComponentKind, ComponentRecord};
pub use graph::{Circuit, REFERENCE_NODE};
pub use network::{one_port, one_port_with, ConnectionKind, Network, OnePort};
pub use solver::{AdjugateSolver, GaussianSolver, LinearSolver, SolverStrategy};
pub use twoport::{two_port, two_port_with, ParameterSet, TwoPort};
