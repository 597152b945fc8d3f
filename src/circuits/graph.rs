//! Circuit graph: nodes, components and the structural queries analysis
//! relies on (reference node, islands, supernodes, dangling terminals).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::warn;

use crate::errors::{CircuitError, Result};
use crate::symbolic::RatFunc;

use super::component::{Component, ComponentKind, ComponentRecord};

/// Name of the reference (ground) node.
pub const REFERENCE_NODE: &str = "0";

/// Union-find over node names.
#[derive(Debug, Default)]
struct NodeSets {
    parent: BTreeMap<String, String>,
}

impl NodeSets {
    fn find(&mut self, node: &str) -> String {
        let parent = self
            .parent
            .entry(node.to_string())
            .or_insert_with(|| node.to_string())
            .clone();
        if parent == node {
            return parent;
        }
        let root = self.find(&parent);
        self.parent.insert(node.to_string(), root.clone());
        root
    }

    fn union(&mut self, a: &str, b: &str) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        self.parent.insert(ra, rb);
        true
    }

    /// Groups keyed by their preferred representative: the reference node if
    /// present, otherwise the smallest name.
    fn groups(&mut self) -> Vec<BTreeSet<String>> {
        let nodes: Vec<String> = self.parent.keys().cloned().collect();
        let mut by_root: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for node in nodes {
            let root = self.find(&node);
            by_root.entry(root).or_default().insert(node);
        }
        by_root.into_values().collect()
    }
}

fn representative(group: &BTreeSet<String>) -> String {
    if group.contains(REFERENCE_NODE) {
        REFERENCE_NODE.to_string()
    } else {
        group.iter().next().cloned().unwrap_or_default()
    }
}

/// Immutable circuit: an ordered set of uniquely named components and the
/// nodes they reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Circuit {
    components: Vec<Component>,
    index: BTreeMap<String, usize>,
    nodes: BTreeSet<String>,
}

impl Circuit {
    /// Validates `records` and assembles a circuit.
    pub fn build<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = ComponentRecord>,
    {
        let mut components = Vec::new();
        let mut index = BTreeMap::new();
        let mut nodes = BTreeSet::new();
        for record in records {
            let component = Component::new(record)?;
            if index.contains_key(component.name()) {
                return Err(CircuitError::DuplicateName {
                    name: component.name().to_string(),
                });
            }
            nodes.extend(component.nodes().iter().cloned());
            index.insert(component.name().to_string(), components.len());
            components.push(component);
        }
        let circuit = Self {
            components,
            index,
            nodes,
        };
        circuit.check_controls()?;
        for node in circuit.dangling_nodes() {
            warn!(node = %node, "dangling node: only one terminal attached");
        }
        for name in circuit.self_loops() {
            warn!(component = %name, "component terminals are shorted together");
        }
        Ok(circuit)
    }

    fn check_controls(&self) -> Result<()> {
        for c in &self.components {
            for control in c.controls() {
                let target = self.component(control).ok_or_else(|| {
                    CircuitError::topology(c.name(), format!("control '{control}' does not exist"))
                })?;
                let ok = match c.kind() {
                    ComponentKind::MutualInductance => target.kind() == ComponentKind::Inductor,
                    _ => target.kind().has_branch_current(),
                };
                if !ok {
                    return Err(CircuitError::topology(
                        c.name(),
                        format!("control '{control}' of kind {} is not allowed", target.kind()),
                    ));
                }
            }
            if c.kind() == ComponentKind::MutualInductance && c.controls()[0] == c.controls()[1] {
                return Err(CircuitError::topology(
                    c.name(),
                    "mutual inductance needs two distinct inductors",
                ));
            }
        }
        Ok(())
    }

    /// Components in insertion order.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Looks a component up by name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.index.get(name).map(|&i| &self.components[i])
    }

    /// Looks a component up by name, failing with `UnknownReference`.
    pub fn require(&self, name: &str) -> Result<&Component> {
        self.component(name).ok_or_else(|| CircuitError::unknown(name))
    }

    /// Node names in sorted order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    /// True if `node` appears on some terminal.
    #[must_use]
    pub fn has_node(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }

    /// True if the reference node is present.
    #[must_use]
    pub fn has_reference(&self) -> bool {
        self.has_node(REFERENCE_NODE)
    }

    /// `(component, terminal index)` pairs attached to `node`.
    #[must_use]
    pub fn incident(&self, node: &str) -> Vec<(&Component, usize)> {
        self.components
            .iter()
            .flat_map(|c| {
                c.nodes()
                    .iter()
                    .enumerate()
                    .filter(move |(_, n)| n.as_str() == node)
                    .map(move |(t, _)| (c, t))
            })
            .collect()
    }

    /// Nodes touched by exactly one terminal.
    #[must_use]
    pub fn dangling_nodes(&self) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for c in &self.components {
            for n in c.nodes() {
                *counts.entry(n.as_str()).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .filter(|&(n, k)| k == 1 && n != REFERENCE_NODE)
            .map(|(n, _)| n.to_string())
            .collect()
    }

    /// Components whose conducting terminals are the same node.
    #[must_use]
    pub fn self_loops(&self) -> Vec<String> {
        self.components
            .iter()
            .filter(|c| {
                c.kind()
                    .conducting_pairs()
                    .iter()
                    .any(|&(a, b)| c.nodes()[a] == c.nodes()[b])
            })
            .map(|c| c.name().to_string())
            .collect()
    }

    fn connectivity(&self, keep: impl Fn(ComponentKind) -> bool) -> NodeSets {
        let mut sets = NodeSets::default();
        for node in &self.nodes {
            sets.find(node);
        }
        for c in self.components.iter().filter(|c| keep(c.kind())) {
            for &(a, b) in c.kind().conducting_pairs() {
                sets.union(&c.nodes()[a], &c.nodes()[b]);
            }
        }
        sets
    }

    /// Connected groups of nodes (through conducting terminal pairs).
    #[must_use]
    pub fn islands(&self) -> Vec<BTreeSet<String>> {
        self.connectivity(|_| true).groups()
    }

    /// Islands that do not contain the reference node.
    ///
    /// A node reached only by non-conducting terminals (controlling inputs,
    /// ports) is not an island of its own; its voltage is simply unconstrained.
    #[must_use]
    pub fn floating_islands(&self) -> Vec<BTreeSet<String>> {
        let conducting = self.conducting_nodes();
        self.islands()
            .into_iter()
            .filter(|g| !g.contains(REFERENCE_NODE))
            .filter(|g| g.iter().any(|n| conducting.contains(n.as_str())))
            .collect()
    }

    fn conducting_nodes(&self) -> BTreeSet<&str> {
        self.components
            .iter()
            .flat_map(|c| {
                c.kind()
                    .conducting_pairs()
                    .iter()
                    .flat_map(move |&(a, b)| [c.nodes()[a].as_str(), c.nodes()[b].as_str()])
            })
            .collect()
    }

    /// Node groups joined without passing through current-defined elements,
    /// each paired with the current-defined elements crossing its boundary.
    /// Groups holding the reference node are left out.
    #[must_use]
    pub fn current_cutsets(&self) -> Vec<(BTreeSet<String>, Vec<String>)> {
        let mut out = Vec::new();
        for group in self.connectivity(|k| !k.is_current_defined()).groups() {
            if group.contains(REFERENCE_NODE) {
                continue;
            }
            let cut: Vec<String> = self
                .components
                .iter()
                .filter(|c| c.kind().is_current_defined())
                .filter(|c| group.contains(&c.nodes()[0]) != group.contains(&c.nodes()[1]))
                .map(|c| c.name().to_string())
                .collect();
            if !cut.is_empty() {
                out.push((group, cut));
            }
        }
        out
    }

    /// Groups of two or more nodes tied together by voltage sources or wires.
    #[must_use]
    pub fn supernodes(&self) -> Vec<BTreeSet<String>> {
        self.connectivity(ComponentKind::is_zero_impedance)
            .groups()
            .into_iter()
            .filter(|g| g.len() > 1)
            .collect()
    }

    /// Representative of the supernode containing `node`: the reference node
    /// if the group contains it, otherwise the smallest name in the group.
    pub fn canonical_node(&self, node: &str) -> Result<String> {
        if !self.has_node(node) {
            return Err(CircuitError::unknown(node));
        }
        Ok(self
            .supernodes()
            .into_iter()
            .find(|g| g.contains(node))
            .map_or_else(|| node.to_string(), |g| representative(&g)))
    }

    /// First loop of voltage sources and wires, as the names of the elements
    /// along it.
    #[must_use]
    pub fn zero_impedance_loop(&self) -> Option<Vec<String>> {
        self.first_loop(ComponentKind::is_zero_impedance)
    }

    /// First loop of elements that impose their terminal voltage, controlled
    /// sources included.
    #[must_use]
    pub fn voltage_defined_loop(&self) -> Option<Vec<String>> {
        self.first_loop(ComponentKind::is_voltage_defined)
    }

    fn first_loop(&self, keep: impl Fn(ComponentKind) -> bool) -> Option<Vec<String>> {
        let mut adjacency: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
        let mut sets = NodeSets::default();
        for c in self.components.iter().filter(|c| keep(c.kind())) {
            let (a, b) = (c.nodes()[0].as_str(), c.nodes()[1].as_str());
            if !sets.union(a, b) {
                let mut culprits = path_between(&adjacency, a, b);
                culprits.push(c.name().to_string());
                return Some(culprits);
            }
            adjacency.entry(a).or_default().push((b, c.name()));
            adjacency.entry(b).or_default().push((a, c.name()));
        }
        None
    }

    /// New circuit with `record` appended.
    pub fn with_component(&self, record: ComponentRecord) -> Result<Self> {
        Self::build(self.records().into_iter().chain(std::iter::once(record)))
    }

    /// New circuit without the named component.
    pub fn without_component(&self, name: &str) -> Result<Self> {
        self.require(name)?;
        Self::build(self.records().into_iter().filter(|r| r.name != name))
    }

    /// New circuit with `symbol` replaced by `value` in every value and
    /// initial condition.
    pub fn substitute(&self, symbol: &str, value: &RatFunc) -> Result<Self> {
        let mut records = self.records();
        for r in &mut records {
            if let Some(v) = &r.value {
                r.value = Some(v.subs(symbol, value)?);
            }
            if let Some(ic) = &r.initial_condition {
                r.initial_condition = Some(ic.subs(symbol, value).ok_or_else(|| {
                    CircuitError::invalid_value(&r.name, "initial condition becomes singular")
                })?);
            }
        }
        Self::build(records)
    }

    /// The dead network: independent sources set to zero and initial
    /// conditions cleared.
    pub fn dead(&self) -> Result<Self> {
        let mut records = self.records();
        for r in &mut records {
            if r.kind.is_independent_source() {
                r.value = Some(crate::domain::DomainExpr::constant(RatFunc::zero()));
            }
            r.initial_condition = None;
        }
        Self::build(records)
    }

    /// Component records, for renderers and for deriving edited circuits.
    #[must_use]
    pub fn records(&self) -> Vec<ComponentRecord> {
        self.components.iter().map(|c| c.record().clone()).collect()
    }

    /// A component name not used in this circuit, derived from `stem`.
    #[must_use]
    pub fn fresh_name(&self, stem: &str) -> String {
        let mut name = stem.to_string();
        let mut k = 1;
        while self.index.contains_key(&name) {
            name = format!("{stem}_{k}");
            k += 1;
        }
        name
    }
}

fn path_between(adjacency: &BTreeMap<&str, Vec<(&str, &str)>>, from: &str, to: &str) -> Vec<String> {
    let mut prev: BTreeMap<&str, (&str, &str)> = BTreeMap::new();
    let mut queue = VecDeque::from([from]);
    let mut seen = BTreeSet::from([from]);
    while let Some(node) = queue.pop_front() {
        if node == to {
            break;
        }
        for &(next, via) in adjacency.get(node).into_iter().flatten() {
            if seen.insert(next) {
                prev.insert(next, (node, via));
                queue.push_back(next);
            }
        }
    }
    let mut names = Vec::new();
    let mut cursor = to;
    while let Some(&(back, via)) = prev.get(cursor) {
        names.push(via.to_string());
        cursor = back;
    }
    names.reverse();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuits::component::element;
    use ComponentKind::{Capacitor, CurrentSource, Resistor, Vcvs, VoltageSource, Wire};

    fn divider() -> Circuit {
        Circuit::build([
            element("V1", VoltageSource, ["1", "0"], "5").unwrap(),
            element("Ra", Resistor, ["1", "2"], "Ra").unwrap(),
            element("Rb", Resistor, ["2", "0"], "Rb").unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Circuit::build([
            element("R1", Resistor, ["1", "0"], "1").unwrap(),
            element("R1", Resistor, ["2", "0"], "1").unwrap(),
        ])
        .unwrap_err();
        assert_eq!(err, CircuitError::DuplicateName { name: "R1".into() });
    }

    #[test]
    fn islands_and_floating_groups() {
        let c = divider()
            .with_component(element("Rx", Resistor, ["a", "b"], "1").unwrap())
            .unwrap();
        assert_eq!(c.islands().len(), 2);
        let floating = c.floating_islands();
        assert_eq!(floating.len(), 1);
        assert!(floating[0].contains("a") && floating[0].contains("b"));
    }

    #[test]
    fn controlling_terminals_do_not_conduct() {
        let c = divider()
            .with_component(
                ComponentRecord::new("E1", Vcvs, ["3", "0", "sense", "0"])
                    .with_formula("mu")
                    .unwrap(),
            )
            .unwrap()
            .with_component(element("R3", Resistor, ["3", "0"], "1").unwrap())
            .unwrap();
        assert!(c.islands().iter().any(|g| g.len() == 1 && g.contains("sense")));
        assert!(c.floating_islands().is_empty());
        assert_eq!(c.dangling_nodes(), vec!["sense".to_string()]);
    }

    #[test]
    fn current_sources_bound_cutsets() {
        let c = divider()
            .with_component(element("I1", CurrentSource, ["2", "a"], "1").unwrap())
            .unwrap()
            .with_component(element("C1", Capacitor, ["a", "b"], "C").unwrap())
            .unwrap()
            .with_component(element("I2", CurrentSource, ["b", "0"], "1").unwrap())
            .unwrap();
        let cutsets = c.current_cutsets();
        assert_eq!(cutsets.len(), 1);
        assert_eq!(cutsets[0].0, BTreeSet::from(["a".to_string(), "b".to_string()]));
        assert_eq!(cutsets[0].1, vec!["I1".to_string(), "I2".to_string()]);
        assert!(c.floating_islands().is_empty());
    }

    #[test]
    fn supernodes_follow_sources_and_wires() {
        let c = divider()
            .with_component(ComponentRecord::new("W1", Wire, ["2", "3"]))
            .unwrap()
            .with_component(element("R3", Resistor, ["3", "0"], "1").unwrap())
            .unwrap();
        assert_eq!(c.canonical_node("1").unwrap(), "0");
        assert_eq!(c.canonical_node("3").unwrap(), "2");
        assert_eq!(c.supernodes().len(), 2);
    }

    #[test]
    fn parallel_sources_form_a_loop() {
        let c = Circuit::build([
            element("V1", VoltageSource, ["1", "0"], "5").unwrap(),
            element("V2", VoltageSource, ["1", "0"], "3").unwrap(),
        ])
        .unwrap();
        assert_eq!(c.zero_impedance_loop(), Some(vec!["V1".to_string(), "V2".to_string()]));
        assert_eq!(divider().zero_impedance_loop(), None);
    }

    #[test]
    fn dangling_terminals_and_edits() {
        let c = divider()
            .with_component(element("Rd", Resistor, ["2", "x"], "1").unwrap())
            .unwrap();
        assert_eq!(c.dangling_nodes(), vec!["x".to_string()]);
        let back = c.without_component("Rd").unwrap();
        assert_eq!(back, divider());
        assert!(matches!(
            c.without_component("nope"),
            Err(CircuitError::UnknownReference { .. })
        ));
    }

    #[test]
    fn controls_must_resolve() {
        let err = Circuit::build([
            element("R1", Resistor, ["1", "0"], "1").unwrap(),
            ComponentRecord::new("F1", ComponentKind::Cccs, ["1", "0"])
                .with_formula("beta")
                .unwrap()
                .with_controls(["R1"]),
        ])
        .unwrap_err();
        assert!(matches!(err, CircuitError::Topology { component, .. } if component == "F1"));
    }

    #[test]
    fn substitution_and_dead_network() {
        let c = divider().substitute("Ra", &RatFunc::integer(2)).unwrap();
        let ra = c.component("Ra").unwrap().value().unwrap();
        assert_eq!(ra.as_ratfunc(), Some(&RatFunc::integer(2)));
        let dead = divider().dead().unwrap();
        assert!(dead.component("V1").unwrap().value().unwrap().is_zero());
    }
}
