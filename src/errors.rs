//! Shared error types used across submodules.

use thiserror::Error;

use crate::domain::Domain;

/// Convenience alias used by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, CircuitError>;

/// Top-level error type for the crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CircuitError {
    /// A component's terminal list does not fit its kind, or a control
    /// reference is missing or of the wrong kind.
    #[error("invalid topology at '{component}': {reason}")]
    Topology {
        /// Offending component.
        component: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Two components share a name.
    #[error("duplicate component name '{name}'")]
    DuplicateName {
        /// Repeated name.
        name: String,
    },
    /// A connected group of nodes has no path to the reference node.
    #[error("floating subcircuit with nodes {nodes:?}")]
    FloatingSubcircuit {
        /// Nodes of the isolated island.
        nodes: Vec<String>,
    },
    /// Two expressions from incompatible domains were combined.
    #[error("domain mismatch in {operation}: {left} vs {right}")]
    DomainMismatch {
        /// Domain of the left operand.
        left: Domain,
        /// Domain of the right operand.
        right: Domain,
        /// Operation that was attempted.
        operation: String,
    },
    /// The MNA matrix is singular (for example a loop of voltage sources).
    #[error("singular system; culprits: {culprits:?}")]
    SingularSystem {
        /// Components implicated in the dependency.
        culprits: Vec<String>,
    },
    /// An unknown is not constrained by any equation.
    #[error("unbounded system: unknown '{unknown}' is unconstrained")]
    UnboundedSystem {
        /// Label of the unconstrained unknown.
        unknown: String,
    },
    /// A two-port parameter set does not exist for this network.
    #[error("{to} parameters cannot be derived from {from}: {entry} vanishes")]
    SingularParameter {
        /// Source parameter set.
        from: String,
        /// Requested parameter set.
        to: String,
        /// Entry or determinant that vanished.
        entry: String,
    },
    /// A connection of ports or one-ports is physically inconsistent.
    #[error("invalid port connection: {reason}")]
    InvalidPortConnection {
        /// Explanation.
        reason: String,
    },
    /// A component value is outside its allowed range.
    #[error("invalid value for '{component}': {reason}")]
    InvalidValue {
        /// Offending component.
        component: String,
        /// Explanation.
        reason: String,
    },
    /// A domain transform is not expressible in closed form.
    #[error("cannot transform from {from} to {to}: {reason}")]
    Transform {
        /// Source domain.
        from: Domain,
        /// Target domain.
        to: Domain,
        /// Explanation.
        reason: String,
    },
    /// A formula could not be parsed.
    #[error("cannot parse '{input}': {reason}")]
    Parse {
        /// Raw input.
        input: String,
        /// Explanation.
        reason: String,
    },
    /// A component, node or unknown was referenced but does not exist.
    #[error("unknown reference '{name}'")]
    UnknownReference {
        /// Missing name.
        name: String,
    },
}

impl CircuitError {
    /// Shorthand for [`CircuitError::Topology`].
    pub(crate) fn topology(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Topology {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`CircuitError::InvalidValue`].
    pub(crate) fn invalid_value(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`CircuitError::InvalidPortConnection`].
    pub(crate) fn port(reason: impl Into<String>) -> Self {
        Self::InvalidPortConnection {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`CircuitError::UnknownReference`].
    pub(crate) fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownReference { name: name.into() }
    }
}
