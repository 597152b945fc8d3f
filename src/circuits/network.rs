//! One-port networks: Thevenin/Norton equivalents and their series/parallel
//! algebra.

use tracing::debug;

use crate::domain::transform::{TransformConfig, Transformer};
use crate::domain::{Domain, DomainExpr, LAPLACE_VAR};
use crate::errors::{CircuitError, Result};
use crate::session::AnalysisConfig;
use crate::symbolic::RatFunc;

use super::analysis::{source_value, Analysis};
use super::component::{Component, ComponentKind, ComponentRecord};
use super::graph::Circuit;

/// Connection topology for a collection of one-ports.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Series connection (open-circuit voltages and impedances add).
    Series,
    /// Parallel connection (short-circuit currents and admittances add).
    Parallel,
}

/// Terminal behavior of a two-terminal network in the `s` domain.
///
/// With `I` the current entering the `p` terminal, a Thevenin form reads
/// `V = voc + z·I` and a Norton form reads `I = y·V - isc`. An ideal voltage
/// source has `z = 0` and no admittance; an ideal current source has `y = 0`
/// and no impedance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OnePort {
    voc: Option<RatFunc>,
    isc: Option<RatFunc>,
    z: Option<RatFunc>,
    y: Option<RatFunc>,
}

impl OnePort {
    /// Thevenin equivalent: `voc` in series with `z`.
    #[must_use]
    pub fn thevenin(voc: RatFunc, z: RatFunc) -> Self {
        let y = z.recip();
        let isc = voc.checked_div(&z);
        Self {
            voc: Some(voc),
            isc,
            z: Some(z),
            y,
        }
    }

    /// Norton equivalent: `isc` in parallel with `y`.
    #[must_use]
    pub fn norton(isc: RatFunc, y: RatFunc) -> Self {
        let z = y.recip();
        let voc = isc.checked_div(&y);
        Self {
            voc,
            isc: Some(isc),
            z,
            y: Some(y),
        }
    }

    /// Passive impedance.
    #[must_use]
    pub fn impedance(z: RatFunc) -> Self {
        Self::thevenin(RatFunc::zero(), z)
    }

    /// Ideal voltage source.
    #[must_use]
    pub fn voltage_source(v: RatFunc) -> Self {
        Self::thevenin(v, RatFunc::zero())
    }

    /// Ideal current source pushing `i` out of the `p` terminal.
    #[must_use]
    pub fn current_source(i: RatFunc) -> Self {
        Self::norton(i, RatFunc::zero())
    }

    /// Terminal model of a single two-terminal component, with initial
    /// conditions as series (inductor) or series-step (capacitor) sources.
    pub fn from_component(component: &Component) -> Result<Self> {
        Self::from_component_with(component, &Transformer::cached(TransformConfig::default()))
    }

    /// Like [`OnePort::from_component`] with an explicit transformer.
    pub fn from_component_with(component: &Component, transformer: &Transformer) -> Result<Self> {
        let s = RatFunc::symbol(LAPLACE_VAR);
        let value = || {
            component
                .value()
                .and_then(DomainExpr::as_ratfunc)
                .cloned()
                .ok_or_else(|| CircuitError::invalid_value(component.name(), "missing value"))
        };
        let ic = component.initial_condition().cloned().unwrap_or_else(RatFunc::zero);
        let nonzero = |v: Option<RatFunc>| {
            v.ok_or_else(|| CircuitError::invalid_value(component.name(), "zero value"))
        };
        match component.kind() {
            ComponentKind::Resistor | ComponentKind::Impedance => Ok(Self::impedance(value()?)),
            ComponentKind::Admittance => Ok(Self::norton(RatFunc::zero(), value()?)),
            ComponentKind::Inductor => {
                let l = value()?;
                Ok(Self::thevenin(-(&l * &ic), &s * &l))
            }
            ComponentKind::Capacitor => {
                let sc = &s * &value()?;
                let z = nonzero(sc.recip())?;
                let voc = nonzero(ic.checked_div(&s))?;
                Ok(Self::thevenin(voc, z))
            }
            ComponentKind::VoltageSource => Ok(Self::voltage_source(source_value(
                component,
                Domain::Laplace,
                transformer,
            )?)),
            ComponentKind::CurrentSource => Ok(Self::current_source(source_value(
                component,
                Domain::Laplace,
                transformer,
            )?)),
            ComponentKind::Wire => Ok(Self::voltage_source(RatFunc::zero())),
            kind => Err(CircuitError::topology(
                component.name(),
                format!("{kind} is not a two-terminal one-port"),
            )),
        }
    }

    /// Open-circuit voltage, absent for an ideal current source.
    #[must_use]
    pub const fn open_circuit_voltage(&self) -> Option<&RatFunc> {
        self.voc.as_ref()
    }

    /// Short-circuit current, absent for an ideal voltage source.
    #[must_use]
    pub const fn short_circuit_current(&self) -> Option<&RatFunc> {
        self.isc.as_ref()
    }

    /// Thevenin impedance, absent for an ideal current source.
    #[must_use]
    pub const fn thevenin_impedance(&self) -> Option<&RatFunc> {
        self.z.as_ref()
    }

    /// Norton admittance, absent for an ideal voltage source.
    #[must_use]
    pub const fn norton_admittance(&self) -> Option<&RatFunc> {
        self.y.as_ref()
    }

    /// Open-circuit voltage as a Laplace-domain expression.
    #[must_use]
    pub fn voc_expr(&self) -> Option<DomainExpr> {
        self.voc.clone().map(DomainExpr::laplace)
    }

    /// Short-circuit current as a Laplace-domain expression.
    #[must_use]
    pub fn isc_expr(&self) -> Option<DomainExpr> {
        self.isc.clone().map(DomainExpr::laplace)
    }

    /// True for a zero-impedance port.
    #[must_use]
    pub const fn is_ideal_voltage_source(&self) -> bool {
        self.y.is_none()
    }

    /// True for a zero-admittance port.
    #[must_use]
    pub const fn is_ideal_current_source(&self) -> bool {
        self.z.is_none()
    }

    /// Series connection: the same current flows through both ports.
    pub fn series(&self, other: &Self) -> Result<Self> {
        match (self.thevenin_parts(), other.thevenin_parts()) {
            (Some((v1, z1)), Some((v2, z2))) => Ok(Self::thevenin(v1 + v2, z1 + z2)),
            (None, Some(_)) => Ok(self.clone()),
            (Some(_), None) => Ok(other.clone()),
            (None, None) => Err(CircuitError::port(
                "two ideal current sources in series force conflicting currents",
            )),
        }
    }

    /// Parallel connection: both ports share the terminal voltage.
    pub fn parallel(&self, other: &Self) -> Result<Self> {
        match (self.norton_parts(), other.norton_parts()) {
            (Some((i1, y1)), Some((i2, y2))) => Ok(Self::norton(i1 + i2, y1 + y2)),
            (None, Some(_)) => Ok(self.clone()),
            (Some(_), None) => Ok(other.clone()),
            (None, None) => Err(CircuitError::port(
                "two ideal voltage sources in parallel force conflicting voltages",
            )),
        }
    }

    /// Folds `ports` with one connection kind.
    pub fn combine(kind: ConnectionKind, ports: &[Self]) -> Result<Self> {
        let (first, rest) = ports
            .split_first()
            .ok_or_else(|| CircuitError::port("nothing to combine"))?;
        rest.iter().try_fold(first.clone(), |acc, p| match kind {
            ConnectionKind::Series => acc.series(p),
            ConnectionKind::Parallel => acc.parallel(p),
        })
    }

    fn thevenin_parts(&self) -> Option<(RatFunc, RatFunc)> {
        Some((self.voc.clone()?, self.z.clone()?))
    }

    fn norton_parts(&self) -> Option<(RatFunc, RatFunc)> {
        Some((self.isc.clone()?, self.y.clone()?))
    }
}

/// Named group of one-ports sharing a connection style.
#[derive(Debug, Clone)]
pub struct Network {
    name: String,
    connection: ConnectionKind,
    members: Vec<OnePort>,
}

impl Network {
    /// Creates an empty network.
    #[must_use]
    pub fn new(name: impl Into<String>, connection: ConnectionKind) -> Self {
        Self {
            name: name.into(),
            connection,
            members: Vec::new(),
        }
    }

    /// Adds a member.
    pub fn add(&mut self, port: OnePort) {
        self.members.push(port);
    }

    /// Adds a component's terminal model.
    pub fn add_component(&mut self, component: &Component) -> Result<()> {
        self.members.push(OnePort::from_component(component)?);
        Ok(())
    }

    /// Equivalent one-port of all members.
    pub fn equivalent(&self) -> Result<OnePort> {
        OnePort::combine(self.connection, &self.members)
    }

    /// Returns the name of the network.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the connection topology.
    #[must_use]
    pub const fn connection_kind(&self) -> ConnectionKind {
        self.connection
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true when no members are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// `config` with floating islands allowed: test sources may attach to a
/// part of the network that has no path to ground.
fn port_config(config: &AnalysisConfig) -> AnalysisConfig {
    config.clone().allow_floating(true)
}

fn is_degenerate(e: &CircuitError) -> bool {
    matches!(
        e,
        CircuitError::SingularSystem { .. } | CircuitError::UnboundedSystem { .. }
    )
}

fn test_source(name: String, kind: ComponentKind, p: &str, n: &str, value: i64) -> ComponentRecord {
    ComponentRecord::new(name, kind, [p, n]).with_value(DomainExpr::laplace(RatFunc::integer(value)))
}

fn difference(analysis: &Analysis, p: &str, n: &str) -> Result<RatFunc> {
    Ok(&analysis.node_voltage(p)? - &analysis.node_voltage(n)?)
}

fn thevenin_of(circuit: &Circuit, p: &str, n: &str, config: &AnalysisConfig) -> Result<OnePort> {
    let config = port_config(config);
    let open = Analysis::run(circuit, Domain::Laplace, &config)?;
    let voc = difference(&open, p, n)?;
    let stimulus = test_source(circuit.fresh_name("Itest"), ComponentKind::CurrentSource, p, n, 1);
    let driven = circuit.dead()?.with_component(stimulus)?;
    let z = difference(&Analysis::run(&driven, Domain::Laplace, &config)?, p, n)?;
    Ok(OnePort::thevenin(voc, z))
}

fn norton_of(circuit: &Circuit, p: &str, n: &str, config: &AnalysisConfig) -> Result<OnePort> {
    let config = port_config(config);
    let short_name = circuit.fresh_name("Wtest");
    let shorted = circuit.with_component(ComponentRecord::new(
        short_name.clone(),
        ComponentKind::Wire,
        [p, n],
    ))?;
    let isc = Analysis::run(&shorted, Domain::Laplace, &config)?.branch_current(&short_name)?;
    let source_name = circuit.fresh_name("Vtest");
    let stimulus = test_source(source_name.clone(), ComponentKind::VoltageSource, p, n, 1);
    let driven = circuit.dead()?.with_component(stimulus)?;
    let y = -Analysis::run(&driven, Domain::Laplace, &config)?.branch_current(&source_name)?;
    Ok(OnePort::norton(isc, y))
}

/// Thevenin/Norton equivalent of `circuit` seen between nodes `p` and `n`.
///
/// The Thevenin form comes from the open-circuit voltage and a 1 A test
/// current on the dead network; when that system is degenerate (the port
/// behaves as a current source) the Norton form is extracted from the
/// short-circuit current and a 1 V test source instead.
pub fn one_port(circuit: &Circuit, p: &str, n: &str) -> Result<OnePort> {
    one_port_with(circuit, p, n, &AnalysisConfig::default())
}

/// [`one_port`] with the solver and transform settings of `config`.
/// Floating islands are always allowed.
pub fn one_port_with(circuit: &Circuit, p: &str, n: &str, config: &AnalysisConfig) -> Result<OnePort> {
    for node in [p, n] {
        if !circuit.has_node(node) {
            return Err(CircuitError::unknown(node));
        }
    }
    if p == n {
        return Err(CircuitError::port("port terminals must be distinct nodes"));
    }
    if !circuit.islands().iter().any(|g| g.contains(p) && g.contains(n)) {
        return Err(CircuitError::port(format!(
            "nodes {p} and {n} are not connected"
        )));
    }
    match thevenin_of(circuit, p, n, config) {
        Err(e) if is_degenerate(&e) => {
            debug!(error = %e, "thevenin extraction failed, trying norton form");
            norton_of(circuit, p, n, config)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuits::component::element;
    use ComponentKind::{Capacitor, CurrentSource, Inductor, Resistor, VoltageSource};

    fn rf(text: &str) -> RatFunc {
        text.parse().unwrap()
    }

    fn port(kind: ComponentKind, value: &str) -> OnePort {
        let record = element("X", kind, ["a", "b"], value).unwrap();
        OnePort::from_component(&Component::new(record).unwrap()).unwrap()
    }

    #[test]
    fn series_network_adds_impedances() {
        let mut network = Network::new("series", ConnectionKind::Series);
        network.add(port(Resistor, "R1"));
        network.add(port(Resistor, "R2"));
        let eq = network.equivalent().unwrap();
        assert_eq!(eq.thevenin_impedance(), Some(&rf("R1 + R2")));
    }

    #[test]
    fn parallel_network_combines_admittance() {
        let mut network = Network::new("parallel", ConnectionKind::Parallel);
        network.add(port(Resistor, "R"));
        network.add(port(Resistor, "R"));
        let eq = network.equivalent().unwrap();
        assert_eq!(eq.thevenin_impedance(), Some(&rf("R/2")));
    }

    #[test]
    fn composition_is_associative_and_commutative() {
        let a = port(VoltageSource, "Va").series(&port(Resistor, "Ra")).unwrap();
        let b = port(CurrentSource, "Ib").parallel(&port(Resistor, "Rb")).unwrap();
        let c = port(Capacitor, "C");
        let left = a.series(&b).unwrap().series(&c).unwrap();
        let right = c.series(&b.series(&a).unwrap()).unwrap();
        assert_eq!(left, right);
        let left = a.parallel(&b).unwrap().parallel(&c).unwrap();
        let right = b.parallel(&c.parallel(&a).unwrap()).unwrap();
        assert_eq!(left.open_circuit_voltage(), right.open_circuit_voltage());
        assert_eq!(left.short_circuit_current(), right.short_circuit_current());
    }

    #[test]
    fn ideal_sources_conflict() {
        let v1 = port(VoltageSource, "1");
        let v2 = port(VoltageSource, "2");
        assert!(matches!(
            v1.parallel(&v2),
            Err(CircuitError::InvalidPortConnection { .. })
        ));
        let i1 = port(CurrentSource, "1");
        assert!(matches!(
            i1.series(&i1),
            Err(CircuitError::InvalidPortConnection { .. })
        ));
        // A current source in series with a resistor is still that source.
        assert_eq!(i1.series(&port(Resistor, "R")).unwrap(), i1);
    }

    #[test]
    fn inductor_initial_current_is_a_series_source() {
        let record = element("L1", Inductor, ["a", "b"], "L")
            .unwrap()
            .with_initial_condition(rf("i0"));
        let p = OnePort::from_component(&Component::new(record).unwrap()).unwrap();
        assert_eq!(p.open_circuit_voltage(), Some(&rf("-L*i0")));
        assert_eq!(p.thevenin_impedance(), Some(&rf("s*L")));
    }

    #[test]
    fn source_with_rl_load() {
        let circuit = Circuit::build([
            element("V1", VoltageSource, ["1", "0"], "10").unwrap(),
            element("R1", Resistor, ["1", "2"], "R1").unwrap(),
            element("L1", Inductor, ["2", "3"], "L1").unwrap(),
        ])
        .unwrap();
        let p = one_port(&circuit, "3", "0").unwrap();
        assert_eq!(p.open_circuit_voltage(), Some(&rf("10/s")));
        assert_eq!(p.short_circuit_current(), Some(&rf("10/(L1*s^2 + R1*s)")));
        assert_eq!(p.thevenin_impedance(), Some(&rf("R1 + s*L1")));
    }

    #[test]
    fn current_source_port_falls_back_to_norton() {
        let circuit = Circuit::build([element("I1", CurrentSource, ["1", "0"], "2").unwrap()]).unwrap();
        let p = one_port(&circuit, "1", "0").unwrap();
        assert!(p.is_ideal_current_source());
        assert_eq!(p.short_circuit_current(), Some(&rf("2/s")));
        assert_eq!(p.norton_admittance(), Some(&RatFunc::zero()));
    }

    #[test]
    fn disconnected_terminals_are_rejected() {
        let circuit = Circuit::build([
            element("R1", Resistor, ["1", "0"], "R").unwrap(),
            element("R2", Resistor, ["2", "3"], "R").unwrap(),
        ])
        .unwrap();
        assert!(matches!(
            one_port(&circuit, "1", "2"),
            Err(CircuitError::InvalidPortConnection { .. })
        ));
    }
}
