//! Symbolic MNA stamping.
//!
//! Stamping is a two-phase protocol. [`UnknownMap::assign`] walks the whole
//! component list first and fixes the index of every node voltage and
//! auxiliary branch current; only then does [`MnaBuilder`] fill coefficients,
//! so a controlled source may refer to a branch declared later in the netlist.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{DMatrix, DVector};

use crate::domain::Domain;
use crate::symbolic::RatFunc;

use super::analysis::LinearSystem;
use super::graph::Circuit;

/// Node index (0-based). Reference nodes are represented by `None`.
pub type Node = Option<usize>;

/// Index assignment for the unknown vector `[node voltages; branch currents]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnknownMap {
    nodes: BTreeMap<String, usize>,
    branches: BTreeMap<String, usize>,
    references: BTreeSet<String>,
    labels: Vec<String>,
}

impl UnknownMap {
    /// First stamping pass: every node not in `references` gets a voltage
    /// unknown (sorted by name), then every component that carries an
    /// auxiliary current gets a branch unknown, in netlist order.
    #[must_use]
    pub fn assign(circuit: &Circuit, references: &BTreeSet<String>) -> Self {
        let mut nodes = BTreeMap::new();
        let mut labels = Vec::new();
        for node in circuit.nodes().filter(|n| !references.contains(*n)) {
            nodes.insert(node.to_string(), labels.len());
            labels.push(format!("V({node})"));
        }
        let mut branches = BTreeMap::new();
        for c in circuit.components() {
            if c.kind().has_branch_current() {
                branches.insert(c.name().to_string(), branches.len());
                labels.push(format!("I({})", c.name()));
            }
        }
        Self {
            nodes,
            branches,
            references: references.clone(),
            labels,
        }
    }

    /// Index of a node voltage, `None` for reference nodes.
    #[must_use]
    pub fn node(&self, name: &str) -> Node {
        self.nodes.get(name).copied()
    }

    /// True if `name` is one of the reference nodes.
    #[must_use]
    pub fn is_reference(&self, name: &str) -> bool {
        self.references.contains(name)
    }

    /// Reference nodes, the global ground plus any local island references.
    #[must_use]
    pub const fn references(&self) -> &BTreeSet<String> {
        &self.references
    }

    /// Branch number of a component's auxiliary current (0-based among
    /// branches).
    #[must_use]
    pub fn branch(&self, component: &str) -> Option<usize> {
        self.branches.get(component).copied()
    }

    /// Absolute position of a branch current in the unknown vector.
    #[must_use]
    pub fn branch_index(&self, component: &str) -> Option<usize> {
        self.branch(component).map(|k| self.nodes.len() + k)
    }

    /// Number of node-voltage unknowns.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of branch-current unknowns.
    #[must_use]
    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// Total number of unknowns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when there is nothing to solve for.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label of unknown `i`, `V(node)` or `I(component)`.
    #[must_use]
    pub fn label(&self, i: usize) -> &str {
        self.labels.get(i).map_or("", String::as_str)
    }

    /// All labels in unknown order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Modified Nodal Analysis builder over rational functions.
///
/// Row `i < n` is the KCL equation of node `i` (currents leaving the node
/// into components equal currents injected by sources); row `n + k` is the
/// constitutive equation of branch `k`.
pub struct MnaBuilder {
    n: usize,
    a: DMatrix<RatFunc>,
    b: DVector<RatFunc>,
}

impl MnaBuilder {
    /// Empty system with `node_count` node unknowns and `branch_count`
    /// auxiliary currents.
    #[must_use]
    pub fn new(node_count: usize, branch_count: usize) -> Self {
        let size = node_count + branch_count;
        Self {
            n: node_count,
            a: DMatrix::from_element(size, size, RatFunc::zero()),
            b: DVector::from_element(size, RatFunc::zero()),
        }
    }

    /// Sized from a first-pass assignment.
    #[must_use]
    pub fn for_unknowns(unknowns: &UnknownMap) -> Self {
        Self::new(unknowns.node_count(), unknowns.branch_count())
    }

    const fn k_idx(&self, k: usize) -> usize {
        self.n + k
    }

    fn add(&mut self, row: usize, col: usize, v: &RatFunc) {
        let cell = &mut self.a[(row, col)];
        *cell = &*cell + v;
    }

    fn sub(&mut self, row: usize, col: usize, v: &RatFunc) {
        let cell = &mut self.a[(row, col)];
        *cell = &*cell - v;
    }

    fn add_rhs(&mut self, row: usize, v: &RatFunc) {
        let cell = &mut self.b[row];
        *cell = &*cell + v;
    }

    /// Stamps an admittance `y` between nodes `a` and `b`.
    pub fn stamp_admittance(&mut self, a: Node, b: Node, y: &RatFunc) {
        if y.is_zero() {
            return;
        }
        if let Some(i) = a {
            self.add(i, i, y);
        }
        if let Some(j) = b {
            self.add(j, j, y);
        }
        if let (Some(i), Some(j)) = (a, b) {
            self.sub(i, j, y);
            self.sub(j, i, y);
        }
    }

    /// Stamps a current source `i` injected into `pos` and drawn from `neg`.
    pub fn stamp_current_source(&mut self, pos: Node, neg: Node, i: &RatFunc) {
        if let Some(p) = pos {
            self.add_rhs(p, i);
        }
        if let Some(n) = neg {
            self.add_rhs(n, &-i);
        }
    }

    /// Couples branch `k` to its terminals: its current leaves `pos` and
    /// enters `neg`, and its constraint row reads `V(pos) - V(neg)`.
    pub fn stamp_branch(&mut self, pos: Node, neg: Node, k: usize) {
        let row = self.k_idx(k);
        let one = RatFunc::one();
        if let Some(p) = pos {
            self.add(p, row, &one);
            self.add(row, p, &one);
        }
        if let Some(n) = neg {
            self.sub(n, row, &one);
            self.sub(row, n, &one);
        }
    }

    /// Independent voltage source `V(pos) - V(neg) = v` on branch `k`.
    pub fn stamp_voltage_source(&mut self, pos: Node, neg: Node, k: usize, v: &RatFunc) {
        self.stamp_branch(pos, neg, k);
        let row = self.k_idx(k);
        self.add_rhs(row, v);
    }

    /// Voltage-controlled current source. Injects `g*(v_cp - v_cn)` into `op`
    /// and draws it from `on`.
    pub fn stamp_vccs(&mut self, op: Node, on: Node, cp: Node, cn: Node, g: &RatFunc) {
        if let Some(o) = op {
            if let Some(c) = cp {
                self.sub(o, c, g);
            }
            if let Some(c) = cn {
                self.add(o, c, g);
            }
        }
        if let Some(o) = on {
            if let Some(c) = cp {
                self.add(o, c, g);
            }
            if let Some(c) = cn {
                self.sub(o, c, g);
            }
        }
    }

    /// Voltage-controlled voltage source on branch `k`:
    /// `v(op) - v(on) = mu * (v(cp) - v(cn))`.
    #[allow(clippy::too_many_arguments)]
    pub fn stamp_vcvs(&mut self, op: Node, on: Node, cp: Node, cn: Node, k: usize, mu: &RatFunc) {
        self.stamp_branch(op, on, k);
        let row = self.k_idx(k);
        if let Some(c) = cp {
            self.sub(row, c, mu);
        }
        if let Some(c) = cn {
            self.add(row, c, mu);
        }
    }

    /// Current-controlled current source. The current `alpha * i_kc` flows
    /// through the element from `op` to `on`.
    pub fn stamp_cccs(&mut self, op: Node, on: Node, ctrl_k: usize, alpha: &RatFunc) {
        let col = self.k_idx(ctrl_k);
        if let Some(o) = op {
            self.add(o, col, alpha);
        }
        if let Some(o) = on {
            self.sub(o, col, alpha);
        }
    }

    /// Current-controlled voltage source on branch `k`:
    /// `v(op) - v(on) = r * i_kc`.
    pub fn stamp_ccvs(&mut self, op: Node, on: Node, k: usize, ctrl_k: usize, r: &RatFunc) {
        self.stamp_branch(op, on, k);
        let (row, col) = (self.k_idx(k), self.k_idx(ctrl_k));
        self.sub(row, col, r);
    }

    /// Inductor on branch `k` with impedance `z` (`sL`) and initial flux
    /// `flux0` (`L·i(0⁻)`): `V(a) - V(b) - z·I = -flux0`.
    pub fn stamp_inductor(&mut self, a: Node, b: Node, k: usize, z: &RatFunc, flux0: &RatFunc) {
        self.stamp_branch(a, b, k);
        let row = self.k_idx(k);
        self.sub(row, row, z);
        self.add_rhs(row, &-flux0);
    }

    /// Capacitor with admittance `y` (`sC`) and initial charge `q0`
    /// (`C·v(0⁻)`), modeled as `y` in parallel with a source injecting `q0`
    /// into `a`.
    pub fn stamp_capacitor(&mut self, a: Node, b: Node, y: &RatFunc, q0: &RatFunc) {
        self.stamp_admittance(a, b, y);
        if !q0.is_zero() {
            self.stamp_current_source(a, b, q0);
        }
    }

    /// Mutual coupling `zm` (`sM`) between inductor branches `k1` and `k2`.
    pub fn stamp_mutual(&mut self, k1: usize, k2: usize, zm: &RatFunc) {
        let (r1, r2) = (self.k_idx(k1), self.k_idx(k2));
        self.sub(r1, r2, zm);
        self.sub(r2, r1, zm);
    }

    /// Adds `v` to the right-hand side of branch `k`.
    pub fn stamp_branch_source(&mut self, k: usize, v: &RatFunc) {
        let row = self.k_idx(k);
        self.add_rhs(row, v);
    }

    /// Ideal transformer with turns ratio `n` on branch `k`:
    /// `V(pp) - V(pn) = n (V(sp) - V(sn))`, secondary current `-n·i_k`
    /// entering `sp`.
    pub fn stamp_transformer(&mut self, pp: Node, pn: Node, sp: Node, sn: Node, k: usize, n: &RatFunc) {
        self.stamp_branch(pp, pn, k);
        let row = self.k_idx(k);
        if let Some(p) = sp {
            self.sub(p, row, n);
            self.sub(row, p, n);
        }
        if let Some(q) = sn {
            self.add(q, row, n);
            self.add(row, q, n);
        }
    }

    /// Op-amp on branch `k`. The output current flows between `out` and
    /// `reference`; an ideal op-amp forces `V(inp) = V(inn)`, a finite gain
    /// `A` forces `V(out) - V(reference) = A (V(inp) - V(inn))`.
    pub fn stamp_opamp(
        &mut self,
        out: Node,
        reference: Node,
        inp: Node,
        inn: Node,
        k: usize,
        gain: Option<&RatFunc>,
    ) {
        if let Some(gain) = gain {
            self.stamp_vcvs(out, reference, inp, inn, k, gain);
            return;
        }
        let row = self.k_idx(k);
        let one = RatFunc::one();
        if let Some(o) = out {
            self.add(o, row, &one);
        }
        if let Some(r) = reference {
            self.sub(r, row, &one);
        }
        if let Some(p) = inp {
            self.add(row, p, &one);
        }
        if let Some(q) = inn {
            self.sub(row, q, &one);
        }
    }

    /// Returns (node_count, branch_count).
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.n, self.a.nrows() - self.n)
    }

    /// Finalizes the builder into a [`LinearSystem`].
    #[must_use]
    pub fn build(self, unknowns: UnknownMap, domain: Domain) -> LinearSystem {
        LinearSystem {
            matrix: self.a,
            rhs: self.b,
            unknowns,
            domain,
        }
    }

    /// Raw matrix and right-hand side.
    #[must_use]
    pub fn into_parts(self) -> (DMatrix<RatFunc>, DVector<RatFunc>) {
        (self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuits::solver::{GaussianSolver, LinearSolver};

    fn rf(text: &str) -> RatFunc {
        text.parse().unwrap()
    }

    fn solve(mna: MnaBuilder) -> DVector<RatFunc> {
        let (a, b) = mna.into_parts();
        GaussianSolver.solve(&a, &b).unwrap()
    }

    #[test]
    fn resistor_with_current_source() {
        let mut mna = MnaBuilder::new(1, 0);
        mna.stamp_admittance(Some(0), None, &rf("1/R"));
        mna.stamp_current_source(Some(0), None, &rf("I0"));
        assert_eq!(solve(mna)[0], rf("I0*R"));
    }

    #[test]
    fn voltage_divider_with_source() {
        let mut mna = MnaBuilder::new(2, 1);
        mna.stamp_voltage_source(Some(0), None, 0, &rf("10"));
        mna.stamp_admittance(Some(0), Some(1), &rf("1/R1"));
        mna.stamp_admittance(Some(1), None, &rf("1/R2"));
        let x = solve(mna);
        assert_eq!(x[1], rf("10*R2/(R1 + R2)"));
        // Source current enters the + terminal, so it is negative here.
        assert_eq!(x[2], rf("-10/(R1 + R2)"));
    }

    #[test]
    fn vccs_biases_node_as_expected() {
        let mut mna = MnaBuilder::new(2, 1);
        mna.stamp_voltage_source(Some(0), None, 0, &rf("1"));
        mna.stamp_admittance(Some(1), None, &rf("1/R"));
        mna.stamp_vccs(Some(1), None, Some(0), None, &rf("g"));
        assert_eq!(solve(mna)[1], rf("g*R"));
    }

    #[test]
    fn cccs_tracks_controlling_source_current() {
        let mut mna = MnaBuilder::new(2, 1);
        mna.stamp_voltage_source(Some(0), None, 0, &rf("1"));
        mna.stamp_admittance(Some(0), None, &rf("1/R"));
        mna.stamp_admittance(Some(1), None, &rf("1/R"));
        mna.stamp_cccs(Some(1), None, 0, &rf("1"));
        assert_eq!(solve(mna)[1], rf("1"));
    }

    #[test]
    fn inductor_branch_carries_initial_flux() {
        // Inductor shorted to ground through a resistor: I = L*i0/(sL + R).
        let mut mna = MnaBuilder::new(1, 1);
        mna.stamp_inductor(Some(0), None, 0, &rf("s*L"), &rf("L*i0"));
        mna.stamp_admittance(Some(0), None, &rf("1/R"));
        let x = solve(mna);
        assert_eq!(x[1], rf("L*i0/(s*L + R)"));
    }

    #[test]
    fn ideal_opamp_buffer_follows_input() {
        // out = node 1 fed back to in-, in+ driven by a source.
        let mut mna = MnaBuilder::new(2, 2);
        mna.stamp_voltage_source(Some(0), None, 0, &rf("vin"));
        mna.stamp_opamp(Some(1), None, Some(0), Some(1), 1, None);
        mna.stamp_admittance(Some(1), None, &rf("1/RL"));
        assert_eq!(solve(mna)[1], rf("vin"));
    }
}
