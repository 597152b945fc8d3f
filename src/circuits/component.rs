//! Component kinds and validated component records.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use num_traits::{Signed, Zero};

use crate::domain::{Domain, DomainExpr};
use crate::errors::{CircuitError, Result};
use crate::symbolic::RatFunc;

/// Closed set of primitive circuit elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComponentKind {
    /// Resistor `R`.
    Resistor,
    /// Inductor `L`, optional initial current.
    Inductor,
    /// Capacitor `C`, optional initial voltage.
    Capacitor,
    /// Generic impedance `Z(s)`.
    Impedance,
    /// Generic admittance `Y(s)`.
    Admittance,
    /// Independent voltage source.
    VoltageSource,
    /// Independent current source; the current is injected into the first node.
    CurrentSource,
    /// Voltage-controlled voltage source `[out+, out-, ctrl+, ctrl-]`.
    Vcvs,
    /// Voltage-controlled current source `[out+, out-, ctrl+, ctrl-]`.
    Vccs,
    /// Current-controlled current source, controlled by a named branch.
    Cccs,
    /// Current-controlled voltage source, controlled by a named branch.
    Ccvs,
    /// Ideal transformer `[p+, p-, s+, s-]` with turns ratio `n`.
    Transformer,
    /// Mutual inductance `M` between two named inductors.
    MutualInductance,
    /// Op-amp `[out, ref, in+, in-]`; ideal nullor unless a gain is given.
    OpAmp,
    /// Port marker (open circuit between its terminals).
    Port,
    /// Ideal wire.
    Wire,
}

impl ComponentKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::Resistor,
        Self::Inductor,
        Self::Capacitor,
        Self::Impedance,
        Self::Admittance,
        Self::VoltageSource,
        Self::CurrentSource,
        Self::Vcvs,
        Self::Vccs,
        Self::Cccs,
        Self::Ccvs,
        Self::Transformer,
        Self::MutualInductance,
        Self::OpAmp,
        Self::Port,
        Self::Wire,
    ];

    /// Netlist code (`R`, `L`, `TF`, ...).
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Resistor => "R",
            Self::Inductor => "L",
            Self::Capacitor => "C",
            Self::Impedance => "Z",
            Self::Admittance => "Y",
            Self::VoltageSource => "V",
            Self::CurrentSource => "I",
            Self::Vcvs => "E",
            Self::Vccs => "G",
            Self::Cccs => "F",
            Self::Ccvs => "H",
            Self::Transformer => "TF",
            Self::MutualInductance => "K",
            Self::OpAmp => "O",
            Self::Port => "P",
            Self::Wire => "W",
        }
    }

    /// Number of terminals.
    #[must_use]
    pub const fn terminal_count(self) -> usize {
        match self {
            Self::MutualInductance => 0,
            Self::Vcvs | Self::Vccs | Self::Transformer | Self::OpAmp => 4,
            _ => 2,
        }
    }

    /// Number of named controlling components.
    #[must_use]
    pub const fn control_count(self) -> usize {
        match self {
            Self::Cccs | Self::Ccvs => 1,
            Self::MutualInductance => 2,
            _ => 0,
        }
    }

    /// True when the element introduces an auxiliary branch-current unknown.
    #[must_use]
    pub const fn has_branch_current(self) -> bool {
        matches!(
            self,
            Self::Inductor
                | Self::VoltageSource
                | Self::Vcvs
                | Self::Ccvs
                | Self::Transformer
                | Self::OpAmp
                | Self::Wire
        )
    }

    /// Independent sources, zeroed in the dead network.
    #[must_use]
    pub const fn is_independent_source(self) -> bool {
        matches!(self, Self::VoltageSource | Self::CurrentSource)
    }

    /// Elements whose branch current is imposed rather than set by the
    /// terminal voltages.
    #[must_use]
    pub const fn is_current_defined(self) -> bool {
        matches!(self, Self::CurrentSource | Self::Vccs | Self::Cccs)
    }

    /// Elements whose terminal voltage difference is imposed.
    #[must_use]
    pub const fn is_voltage_defined(self) -> bool {
        matches!(self, Self::VoltageSource | Self::Wire | Self::Vcvs | Self::Ccvs)
    }

    /// Zero-impedance elements that tie their terminals into a supernode.
    #[must_use]
    pub const fn is_zero_impedance(self) -> bool {
        matches!(self, Self::VoltageSource | Self::Wire)
    }

    const fn value_required(self) -> Option<bool> {
        match self {
            Self::Port | Self::Wire => None,
            Self::OpAmp => Some(false),
            _ => Some(true),
        }
    }

    const fn must_be_positive(self) -> bool {
        matches!(self, Self::Resistor | Self::Inductor | Self::Capacitor)
    }

    const fn accepts_initial_condition(self) -> bool {
        matches!(self, Self::Inductor | Self::Capacitor)
    }

    /// Terminal index pairs that carry current, used for connectivity.
    ///
    /// Controlling terminals of E, G and O draw no current; both windings of
    /// a transformer do, but they stay separate pairs.
    #[must_use]
    pub const fn conducting_pairs(self) -> &'static [(usize, usize)] {
        match self {
            Self::MutualInductance | Self::Port => &[],
            Self::Transformer => &[(0, 1), (2, 3)],
            _ => &[(0, 1)],
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ComponentKind {
    type Err = CircuitError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|k| k.code() == code)
            .ok_or_else(|| CircuitError::Parse {
                input: s.to_string(),
                reason: "unknown component kind".into(),
            })
    }
}

/// Unvalidated component description as produced by a netlist reader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRecord {
    /// Unique name.
    pub name: String,
    /// Element kind.
    pub kind: ComponentKind,
    /// Ordered terminal node names.
    pub nodes: Vec<String>,
    /// Value (resistance, source waveform, gain, ...).
    pub value: Option<DomainExpr>,
    /// Initial inductor current or capacitor voltage at `t = 0⁻`.
    pub initial_condition: Option<RatFunc>,
    /// Names of controlling components.
    pub controls: Vec<String>,
    /// Opaque drawing hints passed through to renderers.
    pub hints: BTreeMap<String, String>,
    /// Skips the positivity check on numeric R, L and C values.
    pub allow_nonpositive: bool,
}

impl ComponentRecord {
    /// Record with the given terminals and no value.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, kind: ComponentKind, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind,
            nodes: nodes.into_iter().map(Into::into).collect(),
            value: None,
            initial_condition: None,
            controls: Vec::new(),
            hints: BTreeMap::new(),
            allow_nonpositive: false,
        }
    }

    /// Sets the value.
    #[must_use]
    pub fn with_value(mut self, value: DomainExpr) -> Self {
        self.value = Some(value);
        self
    }

    /// Parses a domain-free formula (`"Ra"`, `"1.5e3"`, `"1/(s*C)"`) as the value.
    pub fn with_formula(self, formula: &str) -> Result<Self> {
        let value: RatFunc = formula.parse()?;
        let domain = if value.contains("s") {
            Domain::Laplace
        } else {
            Domain::Constant
        };
        Ok(self.with_value(DomainExpr::from_ratfunc(domain, value)?))
    }

    /// Sets the initial condition.
    #[must_use]
    pub fn with_initial_condition(mut self, value: RatFunc) -> Self {
        self.initial_condition = Some(value);
        self
    }

    /// Sets the controlling component names.
    #[must_use]
    pub fn with_controls<I, S>(mut self, controls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.controls = controls.into_iter().map(Into::into).collect();
        self
    }

    /// Attaches a drawing hint.
    #[must_use]
    pub fn with_hint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.hints.insert(key.into(), value.into());
        self
    }

    /// Permits zero or negative R, L and C values.
    #[must_use]
    pub fn allow_nonpositive(mut self) -> Self {
        self.allow_nonpositive = true;
        self
    }
}

/// Parses `formula` and builds a two-terminal record in one step.
pub fn element(
    name: &str,
    kind: ComponentKind,
    nodes: [&str; 2],
    formula: &str,
) -> Result<ComponentRecord> {
    ComponentRecord::new(name, kind, nodes).with_formula(formula)
}

/// Validated, immutable circuit element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component {
    record: ComponentRecord,
}

impl Component {
    /// Validates terminal count, controls, value domain and sign.
    pub fn new(record: ComponentRecord) -> Result<Self> {
        let kind = record.kind;
        let name = record.name.as_str();
        if name.is_empty() {
            return Err(CircuitError::topology(name, "component name is empty"));
        }
        if record.nodes.len() != kind.terminal_count() {
            return Err(CircuitError::topology(
                name,
                format!(
                    "{kind} needs {} terminals, got {}",
                    kind.terminal_count(),
                    record.nodes.len()
                ),
            ));
        }
        if let Some(node) = record.nodes.iter().find(|n| n.trim().is_empty()) {
            return Err(CircuitError::topology(name, format!("blank node name '{node}'")));
        }
        if record.controls.len() != kind.control_count() {
            return Err(CircuitError::topology(
                name,
                format!(
                    "{kind} needs {} controlling components, got {}",
                    kind.control_count(),
                    record.controls.len()
                ),
            ));
        }
        match (kind.value_required(), &record.value) {
            (Some(true), None) => {
                return Err(CircuitError::invalid_value(name, format!("{kind} needs a value")))
            }
            (None, Some(_)) => {
                return Err(CircuitError::invalid_value(name, format!("{kind} takes no value")))
            }
            _ => {}
        }
        if let Some(value) = &record.value {
            check_value(&record, value)?;
        }
        if record.initial_condition.is_some() && !kind.accepts_initial_condition() {
            return Err(CircuitError::invalid_value(
                name,
                format!("{kind} has no initial condition"),
            ));
        }
        Ok(Self { record })
    }

    /// Name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Kind.
    #[must_use]
    pub const fn kind(&self) -> ComponentKind {
        self.record.kind
    }

    /// Terminal node names.
    #[must_use]
    pub fn nodes(&self) -> &[String] {
        &self.record.nodes
    }

    /// Value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&DomainExpr> {
        self.record.value.as_ref()
    }

    /// Initial condition, if any.
    #[must_use]
    pub const fn initial_condition(&self) -> Option<&RatFunc> {
        self.record.initial_condition.as_ref()
    }

    /// Controlling component names.
    #[must_use]
    pub fn controls(&self) -> &[String] {
        &self.record.controls
    }

    /// Drawing hints.
    #[must_use]
    pub const fn hints(&self) -> &BTreeMap<String, String> {
        &self.record.hints
    }

    /// The record this component was built from.
    #[must_use]
    pub const fn record(&self) -> &ComponentRecord {
        &self.record
    }

    /// Copy with a different value, validated again.
    pub fn with_value(&self, value: Option<DomainExpr>) -> Result<Self> {
        let mut record = self.record.clone();
        record.value = value;
        Self::new(record)
    }

    /// Copy with a different initial condition.
    pub fn with_initial_condition(&self, value: Option<RatFunc>) -> Result<Self> {
        let mut record = self.record.clone();
        record.initial_condition = value;
        Self::new(record)
    }
}

fn check_value(record: &ComponentRecord, value: &DomainExpr) -> Result<()> {
    let kind = record.kind;
    let passive_domain = matches!(value.domain(), Domain::Constant | Domain::Laplace);
    if !kind.is_independent_source() && !passive_domain {
        return Err(CircuitError::invalid_value(
            &record.name,
            format!("{kind} value must be a constant or an s-domain expression, got {} domain", value.domain()),
        ));
    }
    if !kind.must_be_positive() || record.allow_nonpositive {
        return Ok(());
    }
    let numeric = value
        .as_ratfunc()
        .filter(|_| value.domain() == Domain::Constant)
        .and_then(RatFunc::as_constant);
    if let Some(c) = numeric {
        if !c.im.is_zero() || !c.re.is_positive() {
            return Err(CircuitError::invalid_value(
                &record.name,
                format!("{kind} value {value} must be positive"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_count_mismatch_is_topology_error() {
        let rec = ComponentRecord::new("R1", ComponentKind::Resistor, ["1", "2", "3"])
            .with_formula("10")
            .unwrap();
        assert!(matches!(
            Component::new(rec),
            Err(CircuitError::Topology { component, .. }) if component == "R1"
        ));
    }

    #[test]
    fn numeric_values_must_be_positive() {
        let rec = element("R1", ComponentKind::Resistor, ["1", "0"], "-5").unwrap();
        assert!(matches!(
            Component::new(rec.clone()),
            Err(CircuitError::InvalidValue { .. })
        ));
        assert!(Component::new(rec.allow_nonpositive()).is_ok());
        let symbolic = element("R2", ComponentKind::Resistor, ["1", "0"], "-Ra").unwrap();
        assert!(Component::new(symbolic).is_ok());
    }

    #[test]
    fn mutual_inductance_may_be_negative() {
        let rec = ComponentRecord::new("K1", ComponentKind::MutualInductance, Vec::<String>::new())
            .with_formula("-M")
            .unwrap()
            .with_controls(["L1", "L2"]);
        assert!(Component::new(rec).is_ok());
    }

    #[test]
    fn kinds_parse_from_codes() {
        assert_eq!("tf".parse::<ComponentKind>().unwrap(), ComponentKind::Transformer);
        assert_eq!("V".parse::<ComponentKind>().unwrap(), ComponentKind::VoltageSource);
        assert!("Q".parse::<ComponentKind>().is_err());
    }

    #[test]
    fn initial_conditions_only_on_reactive_elements() {
        let rec = element("R1", ComponentKind::Resistor, ["1", "0"], "1")
            .unwrap()
            .with_initial_condition(RatFunc::one());
        assert!(Component::new(rec).is_err());
        let cap = element("C1", ComponentKind::Capacitor, ["1", "0"], "C")
            .unwrap()
            .with_initial_condition(RatFunc::symbol("v0"))
            .with_hint("dir", "down");
        let c = Component::new(cap).unwrap();
        assert_eq!(c.hints().get("dir").map(String::as_str), Some("down"));
    }
}
