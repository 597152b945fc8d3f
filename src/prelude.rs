//! Convenience re-exports for building and analyzing circuits.

pub use crate::circuits::{
    analysis::{analyze, analyze_with, transfer_function, transfer_function_with, Analysis, Solution, Unknown},
    component::{element, Component, ComponentKind, ComponentRecord},
    graph::Circuit,
    network::{one_port, one_port_with, ConnectionKind, Network, OnePort},
    solver::SolverStrategy,
    twoport::{two_port, two_port_with, ParameterSet, TwoPort},
};
pub use crate::domain::{
    Domain, DomainExpr, LaplaceConvention, Phasor, Signal, TransformConfig, Transformer,
};
pub use crate::errors::{CircuitError, Result};
pub use crate::math::{bindings, mag_db, phase_deg, phasor, CScalar, Scalar};
pub use crate::session::{AnalysisConfig, Analyzer};
pub use crate::symbolic::RatFunc;
