//! Circuit formulation and symbolic solution.
//!
//! [`formulate`] turns a [`Circuit`] into a [`LinearSystem`] by modified
//! nodal analysis; [`Analysis`] solves it and derives every node voltage,
//! branch voltage and branch current from the unknown vector.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info_span};

use crate::domain::signal::Signal;
use crate::domain::transform::Transformer;
use crate::domain::{Domain, DomainExpr, Phasor, LAPLACE_VAR, OMEGA_VAR};
use crate::errors::{CircuitError, Result};
use crate::session::AnalysisConfig;
use crate::symbolic::RatFunc;

use super::component::{Component, ComponentKind};
use super::graph::{Circuit, REFERENCE_NODE};
use super::solver::SolverError;
use super::stamp::{MnaBuilder, Node, UnknownMap};

/// Square system `A x = b` over node voltages and auxiliary currents.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    /// System matrix.
    pub matrix: DMatrix<RatFunc>,
    /// Right-hand side.
    pub rhs: DVector<RatFunc>,
    /// Meaning of each unknown.
    pub unknowns: UnknownMap,
    /// Domain the coefficients live in.
    pub domain: Domain,
}

impl LinearSystem {
    /// Number of unknowns.
    #[must_use]
    pub fn size(&self) -> usize {
        self.rhs.len()
    }

    /// First unknown whose column is identically zero.
    #[must_use]
    pub fn zero_column(&self) -> Option<usize> {
        (0..self.matrix.ncols()).find(|&c| self.matrix.column(c).iter().all(RatFunc::is_zero))
    }

    /// First equation whose row is identically zero.
    #[must_use]
    pub fn zero_row(&self) -> Option<usize> {
        (0..self.matrix.nrows()).find(|&r| self.matrix.row(r).iter().all(RatFunc::is_zero))
    }
}

/// Quantity an analysis can report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Unknown {
    /// Voltage of a node relative to its reference.
    NodeVoltage(String),
    /// Current entering a component's first terminal.
    BranchCurrent(String),
    /// Voltage across a component's first terminal pair.
    BranchVoltage(String),
}

impl Unknown {
    /// Node voltage target.
    pub fn voltage(node: impl Into<String>) -> Self {
        Self::NodeVoltage(node.into())
    }

    /// Branch current target.
    pub fn current(component: impl Into<String>) -> Self {
        Self::BranchCurrent(component.into())
    }

    /// Branch voltage target.
    pub fn branch_voltage(component: impl Into<String>) -> Self {
        Self::BranchVoltage(component.into())
    }
}

impl fmt::Display for Unknown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeVoltage(n) => write!(f, "V({n})"),
            Self::BranchCurrent(c) => write!(f, "I({c})"),
            Self::BranchVoltage(c) => write!(f, "VB({c})"),
        }
    }
}

impl FromStr for Unknown {
    type Err = CircuitError;

    fn from_str(text: &str) -> Result<Self> {
        let text = text.trim();
        let inner = |prefix: &str| {
            text.strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(')'))
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        };
        if let Some(name) = inner("VB(") {
            Ok(Self::BranchVoltage(name))
        } else if let Some(name) = inner("V(") {
            Ok(Self::NodeVoltage(name))
        } else if let Some(name) = inner("I(") {
            Ok(Self::BranchCurrent(name))
        } else {
            Err(CircuitError::Parse {
                input: text.to_string(),
                reason: "expected V(node), I(component) or VB(component)".into(),
            })
        }
    }
}

/// How element values enter the system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnalysisMode {
    /// Transient analysis in `s` with initial conditions.
    Laplace,
    /// Sinusoidal steady state at angular frequency `omega`.
    Phasor {
        /// Common source frequency.
        omega: RatFunc,
    },
}

impl AnalysisMode {
    /// Phasor mode for [`Domain::Phasor`], Laplace mode otherwise. Every
    /// non-zero source must be a sinusoid at one shared frequency in phasor
    /// mode; without sources the frequency is the free symbol `omega`.
    pub fn for_domain(circuit: &Circuit, domain: Domain, transformer: &Transformer) -> Result<Self> {
        if domain != Domain::Phasor {
            return Ok(Self::Laplace);
        }
        let mut omega: Option<(String, RatFunc)> = None;
        for c in circuit.components().iter().filter(|c| c.kind().is_independent_source()) {
            let Some(value) = c.value().filter(|v| !v.is_zero()) else {
                continue;
            };
            if value.domain() == Domain::Constant {
                return Err(CircuitError::DomainMismatch {
                    left: Domain::Constant,
                    right: Domain::Phasor,
                    operation: format!("phasor analysis of DC source {}", c.name()),
                });
            }
            let phasor = value.to_with(Domain::Phasor, transformer)?;
            let Some(p) = phasor.as_phasor() else { continue };
            match &omega {
                Some((first, w)) if w != p.omega() => {
                    return Err(CircuitError::DomainMismatch {
                        left: Domain::Phasor,
                        right: Domain::Phasor,
                        operation: format!(
                            "sources {first} and {} run at different frequencies",
                            c.name()
                        ),
                    })
                }
                Some(_) => {}
                None => omega = Some((c.name().to_string(), p.omega().clone())),
            }
        }
        Ok(Self::Phasor {
            omega: omega.map_or_else(|| RatFunc::symbol(OMEGA_VAR), |(_, w)| w),
        })
    }

    /// Domain the system is solved in.
    #[must_use]
    pub const fn solving_domain(&self) -> Domain {
        match self {
            Self::Laplace => Domain::Laplace,
            Self::Phasor { .. } => Domain::Phasor,
        }
    }

    /// Value substituted for `s` in impedances.
    fn s(&self) -> RatFunc {
        match self {
            Self::Laplace => RatFunc::symbol(LAPLACE_VAR),
            Self::Phasor { omega } => &RatFunc::j() * omega,
        }
    }

    fn wrap(&self, x: RatFunc) -> DomainExpr {
        match self {
            Self::Laplace => DomainExpr::laplace(x),
            Self::Phasor { omega } => DomainExpr::phasor(Phasor::new(x, omega.clone())),
        }
    }
}

/// Element models evaluated for one analysis mode.
struct Models<'a> {
    mode: &'a AnalysisMode,
    transformer: &'a Transformer,
    s: RatFunc,
}

impl<'a> Models<'a> {
    fn new(mode: &'a AnalysisMode, transformer: &'a Transformer) -> Self {
        Self {
            mode,
            transformer,
            s: mode.s(),
        }
    }

    const fn transient(&self) -> bool {
        matches!(self.mode, AnalysisMode::Laplace)
    }

    /// Passive value with `s` replaced for the active mode.
    fn passive(&self, c: &Component) -> Result<RatFunc> {
        let value = c
            .value()
            .and_then(DomainExpr::as_ratfunc)
            .ok_or_else(|| CircuitError::invalid_value(c.name(), "missing value"))?;
        if self.transient() {
            return Ok(value.clone());
        }
        value.subs(LAPLACE_VAR, &self.s).ok_or_else(|| {
            CircuitError::invalid_value(c.name(), "value has a pole at the analysis frequency")
        })
    }

    /// Independent source value in the solving domain.
    fn source(&self, c: &Component) -> Result<RatFunc> {
        source_value(c, self.mode.solving_domain(), self.transformer)
    }

    fn recip(c: &Component, z: &RatFunc) -> Result<RatFunc> {
        z.recip()
            .ok_or_else(|| CircuitError::invalid_value(c.name(), "zero impedance"))
    }

    /// Admittance of a two-terminal passive element.
    fn admittance(&self, c: &Component) -> Result<RatFunc> {
        let v = self.passive(c)?;
        match c.kind() {
            ComponentKind::Resistor | ComponentKind::Impedance => Self::recip(c, &v),
            ComponentKind::Admittance => Ok(v),
            ComponentKind::Capacitor => Ok(&self.s * &v),
            _ => Err(CircuitError::topology(c.name(), "not an admittance element")),
        }
    }

    /// `C·v(0⁻)` for capacitors, zero in steady state.
    fn charge(&self, c: &Component) -> Result<RatFunc> {
        match (self.transient(), c.initial_condition()) {
            (true, Some(v0)) => Ok(&self.passive(c)? * v0),
            _ => Ok(RatFunc::zero()),
        }
    }

    /// `L·i(0⁻)` for inductors, zero in steady state.
    fn flux(&self, c: &Component) -> Result<RatFunc> {
        match (self.transient(), c.initial_condition()) {
            (true, Some(i0)) => Ok(&self.passive(c)? * i0),
            _ => Ok(RatFunc::zero()),
        }
    }
}

/// Independent source value in `domain` (Laplace or phasor). A constant
/// source is switched on at `t = 0`, so `5` becomes `5/s` in the Laplace
/// domain.
pub(crate) fn source_value(c: &Component, domain: Domain, transformer: &Transformer) -> Result<RatFunc> {
    let Some(value) = c.value().filter(|v| !v.is_zero()) else {
        return Ok(RatFunc::zero());
    };
    let value = match (value.domain(), value.as_ratfunc()) {
        (Domain::Constant, Some(k)) => DomainExpr::time(Signal::step(k.clone())),
        _ => value.clone(),
    };
    let converted = value.to_with(domain, transformer)?;
    match (converted.as_ratfunc(), converted.as_phasor()) {
        (Some(r), _) => Ok(r.clone()),
        (None, Some(p)) => Ok(p.amplitude().clone()),
        _ => Err(CircuitError::invalid_value(c.name(), "source value has no usable form")),
    }
}

/// Nodes used as references: the ground node plus, when `allow_floating`,
/// the smallest node of every island that does not reach it.
pub fn reference_nodes(circuit: &Circuit, allow_floating: bool) -> Result<BTreeSet<String>> {
    let mut refs = BTreeSet::new();
    if circuit.has_reference() {
        refs.insert(REFERENCE_NODE.to_string());
    }
    let floating = circuit.floating_islands();
    if floating.is_empty() {
        return Ok(refs);
    }
    if !allow_floating {
        return Err(CircuitError::FloatingSubcircuit {
            nodes: floating.into_iter().flatten().collect(),
        });
    }
    for island in floating {
        if let Some(local) = island.into_iter().next() {
            debug!(node = %local, "local reference for floating island");
            refs.insert(local);
        }
    }
    Ok(refs)
}

fn branch_of(unknowns: &UnknownMap, owner: &Component, target: &str) -> Result<usize> {
    unknowns.branch(target).ok_or_else(|| {
        CircuitError::topology(owner.name(), format!("'{target}' carries no branch current"))
    })
}

/// Second stamping pass for a single component.
fn stamp_component(
    mna: &mut MnaBuilder,
    c: &Component,
    circuit: &Circuit,
    unknowns: &UnknownMap,
    models: &Models<'_>,
) -> Result<()> {
    let nodes: Vec<Node> = c.nodes().iter().map(|n| unknowns.node(n)).collect();
    let own = || branch_of(unknowns, c, c.name());
    match c.kind() {
        ComponentKind::Resistor | ComponentKind::Impedance | ComponentKind::Admittance => {
            mna.stamp_admittance(nodes[0], nodes[1], &models.admittance(c)?);
        }
        ComponentKind::Capacitor => {
            mna.stamp_capacitor(nodes[0], nodes[1], &models.admittance(c)?, &models.charge(c)?);
        }
        ComponentKind::Inductor => {
            let z = &models.s * &models.passive(c)?;
            mna.stamp_inductor(nodes[0], nodes[1], own()?, &z, &models.flux(c)?);
        }
        ComponentKind::VoltageSource => {
            mna.stamp_voltage_source(nodes[0], nodes[1], own()?, &models.source(c)?);
        }
        ComponentKind::CurrentSource => {
            mna.stamp_current_source(nodes[0], nodes[1], &models.source(c)?);
        }
        ComponentKind::Vcvs => {
            let mu = models.passive(c)?;
            mna.stamp_vcvs(nodes[0], nodes[1], nodes[2], nodes[3], own()?, &mu);
        }
        ComponentKind::Vccs => {
            let g = models.passive(c)?;
            mna.stamp_vccs(nodes[0], nodes[1], nodes[2], nodes[3], &g);
        }
        ComponentKind::Cccs => {
            let ctrl = branch_of(unknowns, c, &c.controls()[0])?;
            mna.stamp_cccs(nodes[0], nodes[1], ctrl, &models.passive(c)?);
        }
        ComponentKind::Ccvs => {
            let ctrl = branch_of(unknowns, c, &c.controls()[0])?;
            mna.stamp_ccvs(nodes[0], nodes[1], own()?, ctrl, &models.passive(c)?);
        }
        ComponentKind::Transformer => {
            let n = models.passive(c)?;
            mna.stamp_transformer(nodes[0], nodes[1], nodes[2], nodes[3], own()?, &n);
        }
        ComponentKind::MutualInductance => {
            let m = models.passive(c)?;
            let (l1, l2) = (circuit.require(&c.controls()[0])?, circuit.require(&c.controls()[1])?);
            let (k1, k2) = (branch_of(unknowns, c, l1.name())?, branch_of(unknowns, c, l2.name())?);
            mna.stamp_mutual(k1, k2, &(&models.s * &m));
            if models.transient() {
                if let Some(i2) = l2.initial_condition() {
                    mna.stamp_branch_source(k1, &-(&m * i2));
                }
                if let Some(i1) = l1.initial_condition() {
                    mna.stamp_branch_source(k2, &-(&m * i1));
                }
            }
        }
        ComponentKind::OpAmp => {
            let gain = match c.value() {
                Some(_) => Some(models.passive(c)?),
                None => None,
            };
            mna.stamp_opamp(nodes[0], nodes[1], nodes[2], nodes[3], own()?, gain.as_ref());
        }
        ComponentKind::Port => {}
        ComponentKind::Wire => {
            mna.stamp_voltage_source(nodes[0], nodes[1], own()?, &RatFunc::zero());
        }
    }
    Ok(())
}

/// Builds the MNA system of `circuit` for `mode`.
///
/// Structural defects are reported before any algebra: loops of ideal
/// voltage sources and wires as [`CircuitError::SingularSystem`], islands
/// without a reference as [`CircuitError::FloatingSubcircuit`] (unless
/// `config.allow_floating`), and unknowns that appear in no equation as
/// [`CircuitError::UnboundedSystem`].
pub fn formulate(circuit: &Circuit, mode: &AnalysisMode, config: &AnalysisConfig) -> Result<LinearSystem> {
    if let Some(culprits) = circuit.zero_impedance_loop() {
        return Err(CircuitError::SingularSystem { culprits });
    }
    let references = reference_nodes(circuit, config.allow_floating)?;

    // Pass 1: every unknown gets its index before any coefficient is written.
    let unknowns = UnknownMap::assign(circuit, &references);
    debug!(
        nodes = unknowns.node_count(),
        branches = unknowns.branch_count(),
        "assigned unknowns"
    );

    // Pass 2: coefficients.
    let transformer = config.transformer();
    let models = Models::new(mode, &transformer);
    let mut mna = MnaBuilder::for_unknowns(&unknowns);
    for c in circuit.components() {
        stamp_component(&mut mna, c, circuit, &unknowns, &models)?;
    }
    let system = mna.build(unknowns, mode.solving_domain());
    // Row i is the equation owned by unknown i: KCL of its node or the
    // constraint of its branch.
    if let Some(i) = system.zero_column().or_else(|| system.zero_row()) {
        return Err(CircuitError::UnboundedSystem {
            unknown: system.unknowns.label(i).to_string(),
        });
    }
    Ok(system)
}

/// Elements responsible for a singular system.
///
/// Structural causes come first: a node group fed only through
/// current-defined elements (its common voltage is free), then a loop of
/// voltage-defined elements. Otherwise the components touching the
/// unresolved `columns` are reported.
fn culprits(circuit: &Circuit, unknowns: &UnknownMap, columns: &[usize]) -> Vec<String> {
    let unreferenced = circuit
        .current_cutsets()
        .into_iter()
        .find(|(group, _)| group.iter().all(|n| unknowns.node(n).is_some()));
    if let Some((_, cut)) = unreferenced {
        return cut;
    }
    if let Some(mut names) = circuit.voltage_defined_loop() {
        names.sort();
        return names;
    }
    let mut names = BTreeSet::new();
    for &col in columns {
        let label = unknowns.label(col);
        if let Some(node) = label.strip_prefix("V(").and_then(|l| l.strip_suffix(')')) {
            names.extend(circuit.incident(node).into_iter().map(|(c, _)| c.name().to_string()));
        } else if let Some(name) = label.strip_prefix("I(").and_then(|l| l.strip_suffix(')')) {
            names.insert(name.to_string());
        }
    }
    names.into_iter().collect()
}

/// Solves `system` with the configured strategy.
pub fn solve_system(circuit: &Circuit, system: &LinearSystem, config: &AnalysisConfig) -> Result<Vec<RatFunc>> {
    let solver = config.solver.select(system.size(), config.adjugate_limit);
    debug!(solver = solver.name(), size = system.size(), "solving linear system");
    match solver.solve(&system.matrix, &system.rhs) {
        Ok(x) => Ok(x.iter().cloned().collect()),
        Err(SolverError::Singular { columns }) => Err(CircuitError::SingularSystem {
            culprits: culprits(circuit, &system.unknowns, &columns),
        }),
        Err(SolverError::Dimension { .. }) => Err(CircuitError::SingularSystem {
            culprits: Vec::new(),
        }),
    }
}

/// Solved circuit state.
#[derive(Debug, Clone)]
pub struct Analysis {
    circuit: Circuit,
    mode: AnalysisMode,
    transformer: Transformer,
    unknowns: UnknownMap,
    x: Vec<RatFunc>,
}

impl Analysis {
    /// Formulates and solves `circuit`. `domain` selects the mode: phasor
    /// analysis for [`Domain::Phasor`], Laplace analysis for every other
    /// domain.
    pub fn run(circuit: &Circuit, domain: Domain, config: &AnalysisConfig) -> Result<Self> {
        let _span = info_span!(
            "analysis",
            components = circuit.components().len(),
            domain = %domain
        )
        .entered();
        let transformer = config.transformer();
        let mode = AnalysisMode::for_domain(circuit, domain, &transformer)?;
        let system = formulate(circuit, &mode, config)?;
        let x = solve_system(circuit, &system, config)?;
        Ok(Self {
            circuit: circuit.clone(),
            mode,
            transformer,
            unknowns: system.unknowns,
            x,
        })
    }

    /// Analysis mode in effect.
    #[must_use]
    pub const fn mode(&self) -> &AnalysisMode {
        &self.mode
    }

    /// Unknown assignment of the solved system.
    #[must_use]
    pub const fn unknowns(&self) -> &UnknownMap {
        &self.unknowns
    }

    /// Voltage of `node` in the solving domain; zero for reference nodes.
    pub fn node_voltage(&self, node: &str) -> Result<RatFunc> {
        if !self.circuit.has_node(node) {
            return Err(CircuitError::unknown(node));
        }
        Ok(self
            .unknowns
            .node(node)
            .map_or_else(RatFunc::zero, |i| self.x[i].clone()))
    }

    fn branch_unknown(&self, name: &str) -> Result<RatFunc> {
        self.unknowns
            .branch_index(name)
            .map(|i| self.x[i].clone())
            .ok_or_else(|| CircuitError::topology(name, "carries no branch current"))
    }

    fn terminal_voltage(&self, c: &Component, a: usize, b: usize) -> Result<RatFunc> {
        Ok(&self.node_voltage(&c.nodes()[a])? - &self.node_voltage(&c.nodes()[b])?)
    }

    /// Voltage across the first terminal pair of `component`.
    pub fn branch_voltage(&self, component: &str) -> Result<RatFunc> {
        let c = self.circuit.require(component)?;
        if c.nodes().len() < 2 {
            return Err(CircuitError::topology(component, "has no terminals"));
        }
        self.terminal_voltage(c, 0, 1)
    }

    /// Current entering `component` at each terminal, in terminal order.
    pub fn terminal_currents(&self, component: &str) -> Result<Vec<RatFunc>> {
        let c = self.circuit.require(component)?;
        let models = Models::new(&self.mode, &self.transformer);
        let zero = RatFunc::zero;
        let pair = |i: RatFunc| {
            let back = -&i;
            vec![i, back]
        };
        let currents = match c.kind() {
            ComponentKind::Resistor
            | ComponentKind::Impedance
            | ComponentKind::Admittance
            | ComponentKind::Capacitor => {
                let v = self.terminal_voltage(c, 0, 1)?;
                pair(&(&models.admittance(c)? * &v) - &models.charge(c)?)
            }
            ComponentKind::Inductor
            | ComponentKind::VoltageSource
            | ComponentKind::Ccvs
            | ComponentKind::Wire => pair(self.branch_unknown(c.name())?),
            ComponentKind::CurrentSource => pair(-models.source(c)?),
            ComponentKind::Vcvs | ComponentKind::OpAmp => {
                let mut out = pair(self.branch_unknown(c.name())?);
                out.extend([zero(), zero()]);
                out
            }
            ComponentKind::Vccs => {
                let vc = self.terminal_voltage(c, 2, 3)?;
                let mut out = pair(-(&models.passive(c)? * &vc));
                out.extend([zero(), zero()]);
                out
            }
            ComponentKind::Cccs => {
                let ctrl = self.branch_unknown(&c.controls()[0])?;
                pair(&models.passive(c)? * &ctrl)
            }
            ComponentKind::Transformer => {
                let i = self.branch_unknown(c.name())?;
                let secondary = &models.passive(c)? * &i;
                let mut out = pair(i);
                out.extend(pair(-secondary));
                out
            }
            ComponentKind::MutualInductance => Vec::new(),
            ComponentKind::Port => vec![zero(), zero()],
        };
        Ok(currents)
    }

    /// Current entering the first terminal of `component`.
    pub fn branch_current(&self, component: &str) -> Result<RatFunc> {
        self.terminal_currents(component)?
            .into_iter()
            .next()
            .ok_or_else(|| CircuitError::topology(component, "has no terminals"))
    }

    /// Sum of currents leaving `node` into the components attached to it.
    /// Zero in every solved state.
    pub fn kcl_residual(&self, node: &str) -> Result<RatFunc> {
        if !self.circuit.has_node(node) {
            return Err(CircuitError::unknown(node));
        }
        let mut total = RatFunc::zero();
        for (c, terminal) in self.circuit.incident(node) {
            total = &total + &self.terminal_currents(c.name())?[terminal];
        }
        Ok(total)
    }

    /// Raw value of `unknown` in the solving domain.
    pub fn quantity(&self, unknown: &Unknown) -> Result<RatFunc> {
        match unknown {
            Unknown::NodeVoltage(n) => self.node_voltage(n),
            Unknown::BranchCurrent(c) => self.branch_current(c),
            Unknown::BranchVoltage(c) => self.branch_voltage(c),
        }
    }

    /// `unknown` as a tagged expression in the solving domain.
    pub fn value(&self, unknown: &Unknown) -> Result<DomainExpr> {
        Ok(self.mode.wrap(self.quantity(unknown)?))
    }

    /// Every node voltage and auxiliary current as targets.
    #[must_use]
    pub fn default_targets(&self) -> Vec<Unknown> {
        let nodes = self
            .circuit
            .nodes()
            .filter(|n| !self.unknowns.is_reference(n))
            .map(Unknown::voltage);
        let branches = self
            .circuit
            .components()
            .iter()
            .filter(|c| self.unknowns.branch(c.name()).is_some())
            .map(|c| Unknown::current(c.name()));
        nodes.chain(branches).collect()
    }

    /// Collects `targets` (every unknown when empty) converted to `domain`.
    pub fn solution(&self, targets: &[Unknown], domain: Domain) -> Result<Solution> {
        let targets = if targets.is_empty() {
            self.default_targets()
        } else {
            targets.to_vec()
        };
        let mut values = BTreeMap::new();
        for target in targets {
            let native = self.value(&target)?;
            let value = if native.domain() == domain {
                native
            } else {
                native.to_with(domain, &self.transformer)?
            };
            values.insert(target, value);
        }
        Ok(Solution { domain, values })
    }
}

/// Mapping from requested unknowns to domain-tagged results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    domain: Domain,
    values: BTreeMap<Unknown, DomainExpr>,
}

impl Solution {
    /// Domain every value is expressed in.
    #[must_use]
    pub const fn domain(&self) -> Domain {
        self.domain
    }

    /// Value of `unknown`, if it was requested.
    #[must_use]
    pub fn get(&self, unknown: &Unknown) -> Option<&DomainExpr> {
        self.values.get(unknown)
    }

    /// Value by label such as `V(1)` or `I(V1)`.
    #[must_use]
    pub fn get_label(&self, label: &str) -> Option<&DomainExpr> {
        label.parse().ok().and_then(|u: Unknown| self.values.get(&u))
    }

    /// Entries in unknown order.
    pub fn iter(&self) -> impl Iterator<Item = (&Unknown, &DomainExpr)> {
        self.values.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing was requested or solved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Solves `circuit` for `targets` in `domain` with the default configuration.
pub fn analyze(circuit: &Circuit, targets: &[Unknown], domain: Domain) -> Result<Solution> {
    analyze_with(circuit, targets, domain, &AnalysisConfig::default())
}

/// Solves `circuit` for `targets` in `domain`.
pub fn analyze_with(
    circuit: &Circuit,
    targets: &[Unknown],
    domain: Domain,
    config: &AnalysisConfig,
) -> Result<Solution> {
    Analysis::run(circuit, domain, config)?.solution(targets, domain)
}

/// Zero-state transfer function `V(output) / input` in `s`, with every other
/// independent source turned off.
pub fn transfer_function(circuit: &Circuit, input_source: &str, output_node: &str) -> Result<RatFunc> {
    transfer_function_with(circuit, input_source, output_node, &AnalysisConfig::default())
}

/// [`transfer_function`] under `config`.
pub fn transfer_function_with(
    circuit: &Circuit,
    input_source: &str,
    output_node: &str,
    config: &AnalysisConfig,
) -> Result<RatFunc> {
    let input = circuit.require(input_source)?;
    if !input.kind().is_independent_source() {
        return Err(CircuitError::topology(
            input_source,
            "transfer function input must be an independent source",
        ));
    }
    if !circuit.has_node(output_node) {
        return Err(CircuitError::unknown(output_node));
    }
    let mut records = circuit.records();
    for r in &mut records {
        r.initial_condition = None;
        if r.name == input_source {
            r.value = Some(DomainExpr::laplace(RatFunc::one()));
        } else if r.kind.is_independent_source() {
            r.value = Some(DomainExpr::constant(RatFunc::zero()));
        }
    }
    let driven = Circuit::build(records)?;
    Analysis::run(&driven, Domain::Laplace, config)?.node_voltage(output_node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuits::component::{element, ComponentRecord};
    use crate::circuits::solver::SolverStrategy;
    use crate::math::bindings;
    use approx::assert_relative_eq;
    use std::time::{Duration, Instant};
    use ComponentKind::{
        Capacitor, Cccs, Ccvs, CurrentSource, Inductor, MutualInductance, OpAmp, Resistor, Vccs, Vcvs, VoltageSource,
    };

    fn rf(text: &str) -> RatFunc {
        text.parse().unwrap()
    }

    fn divider() -> Circuit {
        Circuit::build([
            element("V1", VoltageSource, ["1", "0"], "5").unwrap(),
            element("Ra", Resistor, ["1", "2"], "Ra").unwrap(),
            element("Rb", Resistor, ["2", "0"], "Rb").unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn divider_node_voltages_in_s() {
        let sol = analyze(&divider(), &[Unknown::voltage("2")], Domain::Laplace).unwrap();
        let v = sol.get(&Unknown::voltage("2")).unwrap();
        assert_eq!(v, &DomainExpr::laplace(rf("5*Rb/((Ra + Rb)*s)")));
    }

    #[test]
    fn divider_settles_to_dc_value_in_time() {
        let sol = analyze(&divider(), &[Unknown::voltage("2")], Domain::Time).unwrap();
        let v = sol.get_label("V(2)").unwrap();
        let values = bindings([("Ra", 1.0), ("Rb", 4.0)]);
        assert_relative_eq!(v.eval_at(2.0, &values).unwrap().re, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn default_targets_cover_nodes_and_branches() {
        let sol = analyze(&divider(), &[], Domain::Laplace).unwrap();
        assert_eq!(sol.len(), 3);
        assert!(sol.get_label("I(V1)").is_some());
    }

    #[test]
    fn kcl_holds_at_every_node() {
        let circuit = Circuit::build([
            element("V1", VoltageSource, ["in", "0"], "1").unwrap(),
            element("R1", Resistor, ["in", "a"], "R1").unwrap(),
            element("L1", Inductor, ["a", "b"], "L1")
                .unwrap()
                .with_initial_condition(rf("i0")),
            element("C1", Capacitor, ["b", "0"], "C1")
                .unwrap()
                .with_initial_condition(rf("v0")),
            element("I1", CurrentSource, ["b", "0"], "Ix").unwrap(),
            ComponentRecord::new("G1", Vccs, ["a", "0", "b", "0"])
                .with_formula("gm")
                .unwrap(),
        ])
        .unwrap();
        let analysis = Analysis::run(&circuit, Domain::Laplace, &AnalysisConfig::default()).unwrap();
        for node in ["in", "a", "b", "0"] {
            assert!(analysis.kcl_residual(node).unwrap().is_zero(), "node {node}");
        }
    }

    #[test]
    fn adjugate_and_gaussian_agree() {
        let circuit = Circuit::build([
            element("V1", VoltageSource, ["1", "0"], "1").unwrap(),
            element("R1", Resistor, ["1", "2"], "R1").unwrap(),
            element("C1", Capacitor, ["2", "0"], "C1").unwrap(),
            element("R2", Resistor, ["2", "3"], "R2").unwrap(),
            element("C2", Capacitor, ["3", "0"], "C2").unwrap(),
        ])
        .unwrap();
        let target = [Unknown::voltage("3")];
        let adj = AnalysisConfig::default().with_solver(SolverStrategy::Adjugate);
        let gauss = AnalysisConfig::default().with_solver(SolverStrategy::Gaussian);
        let a = analyze_with(&circuit, &target, Domain::Laplace, &adj).unwrap();
        let g = analyze_with(&circuit, &target, Domain::Laplace, &gauss).unwrap();
        assert_eq!(a, g);
    }

    #[test]
    fn parallel_sources_are_singular() {
        let circuit = Circuit::build([
            element("V1", VoltageSource, ["1", "0"], "5").unwrap(),
            element("V2", VoltageSource, ["1", "0"], "3").unwrap(),
            element("R1", Resistor, ["1", "0"], "R").unwrap(),
        ])
        .unwrap();
        let err = analyze(&circuit, &[], Domain::Laplace).unwrap_err();
        assert_eq!(
            err,
            CircuitError::SingularSystem {
                culprits: vec!["V1".into(), "V2".into()]
            }
        );
    }

    #[test]
    fn floating_island_needs_permission() {
        let circuit = divider()
            .with_component(element("I9", CurrentSource, ["y", "x"], "1").unwrap())
            .unwrap()
            .with_component(element("R9", Resistor, ["x", "y"], "R9").unwrap())
            .unwrap();
        let err = analyze(&circuit, &[], Domain::Laplace).unwrap_err();
        assert_eq!(
            err,
            CircuitError::FloatingSubcircuit {
                nodes: vec!["x".into(), "y".into()]
            }
        );
        let config = AnalysisConfig::default().allow_floating(true);
        let sol = analyze_with(&circuit, &[Unknown::voltage("y")], Domain::Laplace, &config).unwrap();
        // x is the local reference; the source pushes 1/s into y.
        assert_eq!(sol.get_label("V(y)").unwrap(), &DomainExpr::laplace(rf("R9/s")));
    }

    #[test]
    fn current_source_alone_is_unbounded() {
        let circuit = Circuit::build([
            element("I1", CurrentSource, ["1", "0"], "1").unwrap(),
            element("C1", Capacitor, ["1", "0"], "C").unwrap(),
            element("I2", CurrentSource, ["2", "1"], "1").unwrap(),
        ])
        .unwrap();
        let err = analyze(&circuit, &[], Domain::Laplace).unwrap_err();
        assert_eq!(err, CircuitError::UnboundedSystem { unknown: "V(2)".into() });
    }

    #[test]
    fn controlled_sources_may_reference_later_branches() {
        // F1 mirrors the current of V1, which is declared after it.
        let circuit = Circuit::build([
            ComponentRecord::new("F1", Cccs, ["2", "0"])
                .with_formula("beta")
                .unwrap()
                .with_controls(["V1"]),
            element("R2", Resistor, ["2", "0"], "R2").unwrap(),
            element("V1", VoltageSource, ["1", "0"], "1").unwrap(),
            element("R1", Resistor, ["1", "0"], "R1").unwrap(),
        ])
        .unwrap();
        let analysis = Analysis::run(&circuit, Domain::Laplace, &AnalysisConfig::default()).unwrap();
        assert_eq!(analysis.node_voltage("2").unwrap(), rf("beta*R2/(R1*s)"));
        assert!(analysis.kcl_residual("2").unwrap().is_zero());
    }

    #[test]
    fn phasor_analysis_of_rc_lowpass() {
        let circuit = Circuit::build([
            ComponentRecord::new("V1", VoltageSource, ["1", "0"])
                .with_value(DomainExpr::phasor(Phasor::new(rf("1"), rf("w0")))),
            element("R1", Resistor, ["1", "2"], "R").unwrap(),
            element("C1", Capacitor, ["2", "0"], "C").unwrap(),
        ])
        .unwrap();
        let sol = analyze(&circuit, &[Unknown::voltage("2")], Domain::Phasor).unwrap();
        let v = sol.get_label("V(2)").unwrap().as_phasor().unwrap();
        assert_eq!(v.omega(), &rf("w0"));
        assert_eq!(v.amplitude(), &rf("1/(1 + j*w0*R*C)"));
    }

    #[test]
    fn phasor_analysis_rejects_dc_sources() {
        let err = analyze(&divider(), &[], Domain::Phasor).unwrap_err();
        assert!(matches!(err, CircuitError::DomainMismatch { .. }));
    }

    #[test]
    fn transfer_function_of_rc_lowpass() {
        let circuit = Circuit::build([
            element("V1", VoltageSource, ["1", "0"], "7").unwrap(),
            element("R1", Resistor, ["1", "2"], "R").unwrap(),
            element("C1", Capacitor, ["2", "0"], "C").unwrap(),
        ])
        .unwrap();
        let h = transfer_function(&circuit, "V1", "2").unwrap();
        assert_eq!(h, rf("1/(s*R*C + 1)"));
    }

    fn rc_ladder(sections: usize) -> Circuit {
        let mut records = vec![element("V1", VoltageSource, ["1", "0"], "1").unwrap()];
        for k in 1..=sections {
            let (a, b) = (k.to_string(), (k + 1).to_string());
            records.push(element(&format!("R{k}"), Resistor, [a.as_str(), b.as_str()], &format!("R{k}")).unwrap());
            records.push(element(&format!("C{k}"), Capacitor, [b.as_str(), "0"], &format!("C{k}")).unwrap());
        }
        Circuit::build(records).unwrap()
    }

    #[test]
    fn free_control_node_is_unbounded() {
        let circuit = divider()
            .with_component(
                ComponentRecord::new("E1", Vcvs, ["3", "0", "sense", "0"])
                    .with_formula("mu")
                    .unwrap(),
            )
            .unwrap()
            .with_component(element("R3", Resistor, ["3", "0"], "R3").unwrap())
            .unwrap();
        let err = analyze(&circuit, &[], Domain::Laplace).unwrap_err();
        assert_eq!(err, CircuitError::UnboundedSystem { unknown: "V(sense)".into() });
    }

    #[test]
    fn current_source_cutset_names_every_source() {
        let circuit = divider()
            .with_component(element("I1", CurrentSource, ["2", "a"], "1").unwrap())
            .unwrap()
            .with_component(element("C1", Capacitor, ["a", "b"], "C").unwrap())
            .unwrap()
            .with_component(element("I2", CurrentSource, ["b", "0"], "1").unwrap())
            .unwrap();
        let err = analyze(&circuit, &[], Domain::Laplace).unwrap_err();
        assert_eq!(
            err,
            CircuitError::SingularSystem {
                culprits: vec!["I1".into(), "I2".into()]
            }
        );
    }

    #[test]
    fn controlled_source_loop_names_its_members() {
        let circuit = Circuit::build([
            element("V1", VoltageSource, ["1", "0"], "1").unwrap(),
            element("R1", Resistor, ["1", "2"], "R1").unwrap(),
            element("R2", Resistor, ["2", "0"], "R2").unwrap(),
            ComponentRecord::new("E1", Vcvs, ["1", "0", "2", "0"])
                .with_formula("mu")
                .unwrap(),
        ])
        .unwrap();
        let err = analyze(&circuit, &[], Domain::Laplace).unwrap_err();
        assert_eq!(
            err,
            CircuitError::SingularSystem {
                culprits: vec!["E1".into(), "V1".into()]
            }
        );
    }

    #[test]
    fn kcl_holds_with_coupled_and_ideal_elements() {
        let circuit = Circuit::build([
            element("V1", VoltageSource, ["in", "0"], "1").unwrap(),
            element("L1", Inductor, ["in", "0"], "L1").unwrap(),
            element("L2", Inductor, ["b", "0"], "L2").unwrap(),
            element("R4", Resistor, ["b", "0"], "R4").unwrap(),
            ComponentRecord::new("K1", MutualInductance, Vec::<String>::new())
                .with_formula("M")
                .unwrap()
                .with_controls(["L1", "L2"]),
            ComponentRecord::new("H1", Ccvs, ["c", "0"])
                .with_formula("rm")
                .unwrap()
                .with_controls(["L2"]),
            ComponentRecord::new("TF1", ComponentKind::Transformer, ["c", "0", "e", "0"])
                .with_formula("n")
                .unwrap(),
            element("R3", Resistor, ["e", "0"], "R3").unwrap(),
            ComponentRecord::new("O1", OpAmp, ["f", "0", "e", "f"]),
            element("Rl", Resistor, ["f", "0"], "Rl").unwrap(),
        ])
        .unwrap();
        let analysis = Analysis::run(&circuit, Domain::Laplace, &AnalysisConfig::default()).unwrap();
        for node in ["in", "b", "c", "e", "f", "0"] {
            assert!(analysis.kcl_residual(node).unwrap().is_zero(), "node {node}");
        }
        assert_eq!(analysis.node_voltage("f").unwrap(), analysis.node_voltage("e").unwrap());
    }

    #[test]
    fn sinusoid_drives_rl_transient() {
        let circuit = Circuit::build([
            ComponentRecord::new("V1", VoltageSource, ["1", "0"])
                .with_value(DomainExpr::time(Signal::cos(rf("1"), &rf("3")))),
            element("R1", Resistor, ["1", "2"], "R").unwrap(),
            element("L1", Inductor, ["2", "0"], "L").unwrap(),
        ])
        .unwrap();
        let sol = analyze(&circuit, &[Unknown::current("L1")], Domain::Time).unwrap();
        let i = sol.get_label("I(L1)").unwrap();
        // i(t) = -e^-t/10 + cos(3t)/10 + 3 sin(3t)/10 for R = L = 1.
        let values = bindings([("R", 1.0), ("L", 1.0)]);
        for t in [1.0_f64, 2.5] {
            let expected = -0.1 * (-t).exp() + 0.1 * (3.0 * t).cos() + 0.3 * (3.0 * t).sin();
            assert_relative_eq!(i.eval_at(t, &values).unwrap().re, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn rc_ladders_solve_quickly() {
        let gauss = AnalysisConfig::default().with_solver(SolverStrategy::Gaussian);
        let adj = AnalysisConfig::default().with_solver(SolverStrategy::Adjugate);
        for sections in [4, 5] {
            let circuit = rc_ladder(sections);
            let target = [Unknown::voltage((sections + 1).to_string())];
            let start = Instant::now();
            let g = analyze_with(&circuit, &target, Domain::Laplace, &gauss).unwrap();
            assert!(start.elapsed() < Duration::from_secs(30), "{sections} sections");
            let a = analyze_with(&circuit, &target, Domain::Laplace, &adj).unwrap();
            assert_eq!(a, g);
        }
    }

    #[test]
    fn unknown_labels_round_trip() {
        for label in ["V(out)", "I(R1)", "VB(C2)"] {
            let u: Unknown = label.parse().unwrap();
            assert_eq!(u.to_string(), label);
        }
        assert!("X(1)".parse::<Unknown>().is_err());
    }
}
