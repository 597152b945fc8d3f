//! Two-port network representations and parameter conversions.
//!
//! Port currents enter the `+` terminal of each port; `V1, I1` belong to
//! port 1 and `V2, I2` to port 2. The transmission (ABCD) set relates
//! `[V1, I1] = A·[V2, -I2]`.

use std::fmt;

use tracing::debug;

use crate::domain::{Domain, DomainExpr};
use crate::errors::{CircuitError, Result};
use crate::session::AnalysisConfig;
use crate::symbolic::RatFunc;

use super::analysis::Analysis;
use super::component::{ComponentKind, ComponentRecord};
use super::graph::Circuit;

/// 2×2 matrix of rational functions, row-major.
pub type Mat2 = [[RatFunc; 2]; 2];

/// Standard two-port parameter sets.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterSet {
    /// Impedance parameters.
    Z,
    /// Admittance parameters.
    Y,
    /// Hybrid parameters `[V1, I2] = H·[I1, V2]`.
    H,
    /// Inverse hybrid parameters `[I1, V2] = G·[V1, I2]`.
    G,
    /// Transmission (ABCD) parameters.
    A,
    /// Scattering parameters under the reference impedance.
    S,
    /// Scattering transfer parameters.
    T,
}

impl ParameterSet {
    /// Every set.
    pub const ALL: [Self; 7] = [Self::Z, Self::Y, Self::H, Self::G, Self::A, Self::S, Self::T];

    fn entry_name(self, i: usize, j: usize) -> String {
        match self {
            Self::A => ["A", "B", "C", "D"][2 * i + j].to_string(),
            _ => format!("{}{}{}", self.to_string().to_lowercase(), i + 1, j + 1),
        }
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Z => "Z",
            Self::Y => "Y",
            Self::H => "H",
            Self::G => "G",
            Self::A => "A",
            Self::S => "S",
            Self::T => "T",
        };
        f.write_str(s)
    }
}

fn mat_det(m: &Mat2) -> RatFunc {
    &(&m[0][0] * &m[1][1]) - &(&m[0][1] * &m[1][0])
}

fn mat_identity() -> Mat2 {
    [
        [RatFunc::one(), RatFunc::zero()],
        [RatFunc::zero(), RatFunc::one()],
    ]
}

fn mat_map2(a: &Mat2, b: &Mat2, f: impl Fn(&RatFunc, &RatFunc) -> RatFunc) -> Mat2 {
    [
        [f(&a[0][0], &b[0][0]), f(&a[0][1], &b[0][1])],
        [f(&a[1][0], &b[1][0]), f(&a[1][1], &b[1][1])],
    ]
}

fn mat_add(a: &Mat2, b: &Mat2) -> Mat2 {
    mat_map2(a, b, |x, y| x + y)
}

fn mat_sub(a: &Mat2, b: &Mat2) -> Mat2 {
    mat_map2(a, b, |x, y| x - y)
}

fn mat_scale(a: &Mat2, k: &RatFunc) -> Mat2 {
    mat_map2(a, a, |x, _| x * k)
}

fn mat_mul(a: &Mat2, b: &Mat2) -> Mat2 {
    let cell = |i: usize, j: usize| &(&a[i][0] * &b[0][j]) + &(&a[i][1] * &b[1][j]);
    [[cell(0, 0), cell(0, 1)], [cell(1, 0), cell(1, 1)]]
}

fn mat_inverse(m: &Mat2) -> Option<Mat2> {
    let det = mat_det(m);
    let inv = det.recip()?;
    Some([
        [&m[1][1] * &inv, -(&m[0][1] * &inv)],
        [-(&m[1][0] * &inv), &m[0][0] * &inv],
    ])
}

enum Divisor {
    Det,
    Entry(usize, usize),
}

/// Closed-form conversion between two of `Z, Y, H, G, A`.
fn direct(from: ParameterSet, to: ParameterSet, m: &Mat2) -> Result<Mat2> {
    use ParameterSet::{A, G, H, Y, Z};
    let [[p11, p12], [p21, p22]] = m.clone();
    let det = mat_det(m);
    let one = RatFunc::one();
    let (nums, divisor): ([RatFunc; 4], Divisor) = match (from, to) {
        (Z, Y) | (Y, Z) | (H, G) | (G, H) => ([p22, -p12, -p21, p11], Divisor::Det),
        (Z, H) | (Y, G) | (H, Z) | (G, Y) => ([det, p12, -p21, one], Divisor::Entry(1, 1)),
        (Z, G) | (Y, H) | (H, Y) | (G, Z) => ([one, -p12, p21, det], Divisor::Entry(0, 0)),
        (Z, A) | (A, Z) => ([p11, det, one, p22], Divisor::Entry(1, 0)),
        (Y, A) => ([-p22, -one, -det, -p11], Divisor::Entry(1, 0)),
        (H, A) => ([-det, -p11, -p22, -one], Divisor::Entry(1, 0)),
        (G, A) => ([one, p22, p11, det], Divisor::Entry(1, 0)),
        (A, Y) => ([p22, -det, -one, p11], Divisor::Entry(0, 1)),
        (A, H) => ([p12, det, -one, p21], Divisor::Entry(1, 1)),
        (A, G) => ([p21, -det, one, p12], Divisor::Entry(0, 0)),
        _ => {
            return Err(CircuitError::SingularParameter {
                from: from.to_string(),
                to: to.to_string(),
                entry: "no closed-form conversion".into(),
            })
        }
    };
    let (div, name) = match divisor {
        Divisor::Det => (mat_det(m), format!("det({from})")),
        Divisor::Entry(i, j) => (m[i][j].clone(), from.entry_name(i, j)),
    };
    let inv = div.recip().ok_or_else(|| CircuitError::SingularParameter {
        from: from.to_string(),
        to: to.to_string(),
        entry: name,
    })?;
    let [a, b, c, d] = nums;
    Ok([[&a * &inv, &b * &inv], [&c * &inv, &d * &inv]])
}

/// Two-port described by one parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TwoPort {
    set: ParameterSet,
    params: Mat2,
    z0: RatFunc,
    common_ground: bool,
}

impl TwoPort {
    /// Two-port with the given parameters, a 50 Ω reference impedance and a
    /// common ground between the ports.
    #[must_use]
    pub fn new(set: ParameterSet, params: Mat2) -> Self {
        Self {
            set,
            params,
            z0: RatFunc::integer(50),
            common_ground: true,
        }
    }

    /// Reference impedance for S and T parameters.
    #[must_use]
    pub fn with_reference_impedance(mut self, z0: RatFunc) -> Self {
        self.z0 = z0;
        self
    }

    /// Marks whether both ports share their `-` terminal.
    #[must_use]
    pub const fn with_common_ground(mut self, common_ground: bool) -> Self {
        self.common_ground = common_ground;
        self
    }

    /// Identity two-port (through connection): [[1, 0], [0, 1]].
    #[must_use]
    pub fn identity() -> Self {
        Self::new(ParameterSet::A, mat_identity())
    }

    /// Constructs a two-port from explicit ABCD elements.
    #[must_use]
    pub fn from_abcd(a: RatFunc, b: RatFunc, c: RatFunc, d: RatFunc) -> Self {
        Self::new(ParameterSet::A, [[a, b], [c, d]])
    }

    /// Series impedance `Z` represented as a two-port.
    #[must_use]
    pub fn series_impedance(z: RatFunc) -> Self {
        Self::from_abcd(RatFunc::one(), z, RatFunc::zero(), RatFunc::one())
    }

    /// Shunt admittance `Y` represented as a two-port.
    #[must_use]
    pub fn shunt_admittance(y: RatFunc) -> Self {
        Self::from_abcd(RatFunc::one(), RatFunc::zero(), y, RatFunc::one())
    }

    /// Parameter set of the stored matrix.
    #[must_use]
    pub const fn set(&self) -> ParameterSet {
        self.set
    }

    /// Stored matrix.
    #[must_use]
    pub const fn params(&self) -> &Mat2 {
        &self.params
    }

    /// Entry `(i, j)` (0-based) as a Laplace-domain expression.
    #[must_use]
    pub fn entry(&self, i: usize, j: usize) -> DomainExpr {
        DomainExpr::laplace(self.params[i][j].clone())
    }

    /// Reference impedance.
    #[must_use]
    pub const fn reference_impedance(&self) -> &RatFunc {
        &self.z0
    }

    /// True when both ports share their `-` terminal.
    #[must_use]
    pub const fn common_ground(&self) -> bool {
        self.common_ground
    }

    fn with_params(&self, set: ParameterSet, params: Mat2) -> Self {
        Self {
            set,
            params,
            z0: self.z0.clone(),
            common_ground: self.common_ground,
        }
    }

    fn singular(&self, to: ParameterSet, entry: impl Into<String>) -> CircuitError {
        CircuitError::SingularParameter {
            from: self.set.to_string(),
            to: to.to_string(),
            entry: entry.into(),
        }
    }

    /// Converts to `target`, failing with `SingularParameter` when the
    /// conversion needs to invert a vanishing quantity.
    pub fn to(&self, target: ParameterSet) -> Result<Self> {
        use ParameterSet::{S, T};
        if self.set == target {
            return Ok(self.clone());
        }
        let params = match (self.set, target) {
            (T, _) => return self.with_params(S, self.s_from_t()?).to(target),
            (_, T) => self.to(S)?.t_from_s()?,
            (_, S) => self.to_s()?,
            (S, _) => return self.from_s(target),
            (from, to) => direct(from, to, &self.params)?,
        };
        Ok(self.with_params(target, params))
    }

    /// S from ABCD with the closed-form normalization, falling back to the
    /// Z and Y matrix forms.
    fn to_s(&self) -> Result<Mat2> {
        let z0 = &self.z0;
        let inv_z0 = z0.recip().ok_or_else(|| self.singular(ParameterSet::S, "z0"))?;
        if let Ok(abcd) = self.to(ParameterSet::A) {
            let [[a, b], [c, d]] = &abcd.params;
            let b_n = b * &inv_z0;
            let c_n = c * z0;
            let den = &(&(a + &b_n) + &c_n) + d;
            if let Some(inv) = den.recip() {
                let two = RatFunc::integer(2);
                let s11 = &(&(&(a + &b_n) - &c_n) - d) * &inv;
                let s22 = &(&(&(&b_n - a) - &c_n) + d) * &inv;
                let s21 = &two * &inv;
                let s12 = &(&two * &mat_det(&abcd.params)) * &inv;
                return Ok([[s11, s12], [s21, s22]]);
            }
        }
        let id = mat_identity();
        if let Ok(z) = self.to(ParameterSet::Z) {
            let shifted = mat_scale(&id, z0);
            if let Some(inv) = mat_inverse(&mat_add(&z.params, &shifted)) {
                return Ok(mat_mul(&mat_sub(&z.params, &shifted), &inv));
            }
        }
        if let Ok(y) = self.to(ParameterSet::Y) {
            let scaled = mat_scale(&y.params, z0);
            if let Some(inv) = mat_inverse(&mat_add(&id, &scaled)) {
                return Ok(mat_mul(&mat_sub(&id, &scaled), &inv));
            }
        }
        Err(self.singular(ParameterSet::S, "Z + z0·I"))
    }

    /// Any set from S.
    fn from_s(&self, target: ParameterSet) -> Result<Self> {
        let s = &self.params;
        let id = mat_identity();
        let z0 = &self.z0;
        let candidates = [
            (ParameterSet::Z, mat_inverse(&mat_sub(&id, s)).map(|inv| {
                mat_scale(&mat_mul(&mat_add(&id, s), &inv), z0)
            })),
            (ParameterSet::Y, mat_inverse(&mat_add(&id, s)).and_then(|inv| {
                z0.recip()
                    .map(|g0| mat_scale(&mat_mul(&mat_sub(&id, s), &inv), &g0))
            })),
        ];
        let mut last = self.singular(target, "I - S");
        for (set, params) in candidates {
            let Some(params) = params else { continue };
            match self.with_params(set, params).to(target) {
                Ok(done) => return Ok(done),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    /// `T = [[-ΔS/S21, S11/S21], [-S22/S21, 1/S21]]`.
    fn t_from_s(&self) -> Result<Mat2> {
        let s = &self.params;
        let inv = s[1][0]
            .recip()
            .ok_or_else(|| self.singular(ParameterSet::T, "s21"))?;
        Ok([
            [-(&mat_det(s) * &inv), &s[0][0] * &inv],
            [-(&s[1][1] * &inv), inv],
        ])
    }

    /// `S = [[T12/T22, ΔT/T22], [1/T22, -T21/T22]]`.
    fn s_from_t(&self) -> Result<Mat2> {
        let t = &self.params;
        let inv = t[1][1]
            .recip()
            .ok_or_else(|| self.singular(ParameterSet::S, "t22"))?;
        Ok([
            [&t[0][1] * &inv, &mat_det(t) * &inv],
            [inv.clone(), -(&t[1][0] * &inv)],
        ])
    }

    fn summed(&self, rhs: &Self, set: ParameterSet, what: &str) -> Result<Self> {
        if !(self.common_ground && rhs.common_ground) {
            return Err(CircuitError::port(format!(
                "{what} connection needs a common ground on both two-ports"
            )));
        }
        let a = self.to(set)?;
        let b = rhs.to(set)?;
        Ok(self.with_params(set, mat_add(&a.params, &b.params)))
    }

    /// Cascades this two-port with `rhs` (i.e., self followed by rhs).
    pub fn cascade(&self, rhs: &Self) -> Result<Self> {
        let a = self.to(ParameterSet::A)?;
        let b = rhs.to(ParameterSet::A)?;
        Ok(self
            .with_params(ParameterSet::A, mat_mul(&a.params, &b.params))
            .with_common_ground(self.common_ground && rhs.common_ground))
    }

    /// Series-series connection: Z parameters add.
    pub fn series(&self, rhs: &Self) -> Result<Self> {
        self.summed(rhs, ParameterSet::Z, "series")
    }

    /// Parallel-parallel connection: Y parameters add.
    pub fn parallel(&self, rhs: &Self) -> Result<Self> {
        self.summed(rhs, ParameterSet::Y, "parallel")
    }

    /// Series-parallel connection: H parameters add.
    pub fn series_parallel(&self, rhs: &Self) -> Result<Self> {
        self.summed(rhs, ParameterSet::H, "series-parallel")
    }

    /// Parallel-series connection: G parameters add.
    pub fn parallel_series(&self, rhs: &Self) -> Result<Self> {
        self.summed(rhs, ParameterSet::G, "parallel-series")
    }

    /// Cascades a sequence of two-ports from first to last. Returns identity for empty.
    pub fn cascade_all<'a>(list: impl IntoIterator<Item = &'a Self>) -> Result<Self> {
        let mut iter = list.into_iter();
        let Some(first) = iter.next() else {
            return Ok(Self::identity());
        };
        iter.try_fold(first.clone(), |acc, t| acc.cascade(t))
    }

    /// T-section builder: series `za`, shunt `yb`, series `zc`.
    pub fn t_section(za: RatFunc, yb: RatFunc, zc: RatFunc) -> Result<Self> {
        Self::series_impedance(za)
            .cascade(&Self::shunt_admittance(yb))?
            .cascade(&Self::series_impedance(zc))
    }

    /// Π-section builder: shunt `y1`, series `z2`, shunt `y3`.
    pub fn pi_section(y1: RatFunc, z2: RatFunc, y3: RatFunc) -> Result<Self> {
        Self::shunt_admittance(y1)
            .cascade(&Self::series_impedance(z2))?
            .cascade(&Self::shunt_admittance(y3))
    }

    /// Input impedance at port 1 when port 2 is terminated by `z_load`.
    pub fn input_impedance(&self, z_load: &RatFunc) -> Result<RatFunc> {
        let abcd = self.to(ParameterSet::A)?;
        let [[a, b], [c, d]] = &abcd.params;
        let num = &(a * z_load) + b;
        let den = &(c * z_load) + d;
        num.checked_div(&den)
            .ok_or_else(|| self.singular(ParameterSet::A, "C·ZL + D"))
    }

    /// Reflection coefficient at port 1 against the reference impedance with
    /// `z_load` at port 2.
    pub fn reflection_at_port1(&self, z_load: &RatFunc) -> Result<RatFunc> {
        let zin = self.input_impedance(z_load)?;
        (&zin - &self.z0)
            .checked_div(&(&zin + &self.z0))
            .ok_or_else(|| self.singular(ParameterSet::S, "Zin + z0"))
    }

    /// True when `z12 = z21` (or the equivalent condition in Y or ABCD).
    #[must_use]
    pub fn is_reciprocal(&self) -> bool {
        if let Ok(z) = self.to(ParameterSet::Z) {
            return z.params[0][1] == z.params[1][0];
        }
        if let Ok(y) = self.to(ParameterSet::Y) {
            return y.params[0][1] == y.params[1][0];
        }
        self.to(ParameterSet::A)
            .map(|a| mat_det(&a.params).is_one())
            .unwrap_or(false)
    }
}

type PortPair<'a> = (&'a str, &'a str);

fn drive(
    circuit: &Circuit,
    kind: ComponentKind,
    ports: [PortPair<'_>; 2],
    active: usize,
    config: &AnalysisConfig,
) -> Result<(Analysis, [String; 2])> {
    let mut names = [String::new(), String::new()];
    let mut driven = circuit.dead()?;
    for (k, (p, n)) in ports.into_iter().enumerate() {
        let name = driven.fresh_name(&format!("{}test{}", kind.code(), k + 1));
        let value = RatFunc::integer(i64::from(k == active));
        let record = ComponentRecord::new(name.clone(), kind, [p, n])
            .with_value(DomainExpr::laplace(value));
        driven = driven.with_component(record)?;
        names[k] = name;
    }
    let config = config.clone().allow_floating(true);
    Ok((Analysis::run(&driven, Domain::Laplace, &config)?, names))
}

fn z_parameters(circuit: &Circuit, ports: [PortPair<'_>; 2], config: &AnalysisConfig) -> Result<Mat2> {
    let mut z = mat_identity();
    for j in 0..2 {
        let (analysis, _) = drive(circuit, ComponentKind::CurrentSource, ports, j, config)?;
        for (i, (p, n)) in ports.into_iter().enumerate() {
            z[i][j] = &analysis.node_voltage(p)? - &analysis.node_voltage(n)?;
        }
    }
    Ok(z)
}

fn y_parameters(circuit: &Circuit, ports: [PortPair<'_>; 2], config: &AnalysisConfig) -> Result<Mat2> {
    let mut y = mat_identity();
    for j in 0..2 {
        let (analysis, names) = drive(circuit, ComponentKind::VoltageSource, ports, j, config)?;
        for i in 0..2 {
            y[i][j] = -analysis.branch_current(&names[i])?;
        }
    }
    Ok(y)
}

/// Two-port parameters of the dead network between `port1` and `port2`.
///
/// Z parameters come from unit test currents with the other port open;
/// when that system is degenerate, Y parameters come from unit test
/// voltages with the other port shorted. The result is converted to `set`.
pub fn two_port(circuit: &Circuit, port1: PortPair<'_>, port2: PortPair<'_>, set: ParameterSet) -> Result<TwoPort> {
    two_port_with(circuit, port1, port2, set, &AnalysisConfig::default())
}

/// [`two_port`] with the solver and transform settings of `config`.
/// Floating islands are always allowed.
pub fn two_port_with(
    circuit: &Circuit,
    port1: PortPair<'_>,
    port2: PortPair<'_>,
    set: ParameterSet,
    config: &AnalysisConfig,
) -> Result<TwoPort> {
    for node in [port1.0, port1.1, port2.0, port2.1] {
        if !circuit.has_node(node) {
            return Err(CircuitError::unknown(node));
        }
    }
    if port1.0 == port1.1 || port2.0 == port2.1 {
        return Err(CircuitError::port("port terminals must be distinct nodes"));
    }
    let ports = [port1, port2];
    let common_ground = port1.1 == port2.1;
    let base = match z_parameters(circuit, ports, config) {
        Ok(z) => TwoPort::new(ParameterSet::Z, z),
        Err(e @ (CircuitError::SingularSystem { .. } | CircuitError::UnboundedSystem { .. })) => {
            debug!(error = %e, "open-circuit extraction failed, trying short-circuit form");
            TwoPort::new(ParameterSet::Y, y_parameters(circuit, ports, config)?)
        }
        Err(e) => return Err(e),
    };
    base.with_common_ground(common_ground).to(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuits::component::element;
    use ComponentKind::Resistor;

    fn rf(text: &str) -> RatFunc {
        text.parse().unwrap()
    }

    fn m(entries: [&str; 4]) -> Mat2 {
        [[rf(entries[0]), rf(entries[1])], [rf(entries[2]), rf(entries[3])]]
    }

    fn l_section() -> Circuit {
        Circuit::build([
            element("R1", Resistor, ["1", "2"], "R1").unwrap(),
            element("R2", Resistor, ["2", "0"], "R2").unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn cascade_identity_is_noop() {
        let t = TwoPort::series_impedance(rf("R"));
        let res = t.cascade(&TwoPort::identity()).unwrap();
        assert_eq!(res, t);
    }

    #[test]
    fn abcd_to_y_for_shunt_is_singular() {
        // A pure shunt has B = 0, so its Y matrix does not exist.
        let t = TwoPort::shunt_admittance(rf("Y"));
        let err = t.to(ParameterSet::Y).unwrap_err();
        assert_eq!(
            err,
            CircuitError::SingularParameter {
                from: "A".into(),
                to: "Y".into(),
                entry: "B".into()
            }
        );
        let z = t.to(ParameterSet::Z).unwrap();
        assert_eq!(z.params(), &m(["1/Y", "1/Y", "1/Y", "1/Y"]));
    }

    #[test]
    fn divider_z_to_abcd_and_back() {
        let tp = two_port(&l_section(), ("1", "0"), ("2", "0"), ParameterSet::Z).unwrap();
        assert_eq!(tp.params(), &m(["R1 + R2", "R2", "R2", "R2"]));
        let abcd = tp.to(ParameterSet::A).unwrap();
        assert_eq!(abcd.params(), &m(["(R1 + R2)/R2", "R1", "1/R2", "1"]));
        assert_eq!(abcd.to(ParameterSet::Z).unwrap(), tp);
    }

    #[test]
    fn every_conversion_round_trips() {
        let z = TwoPort::new(ParameterSet::Z, m(["a", "b", "c", "d"]));
        for set in ParameterSet::ALL {
            let there = z.to(set).unwrap();
            assert_eq!(there.to(ParameterSet::Z).unwrap(), z, "via {set}");
        }
    }

    #[test]
    fn singular_z_has_no_y() {
        let z = TwoPort::new(ParameterSet::Z, m(["R", "R", "R", "R"]));
        assert!(matches!(
            z.to(ParameterSet::Y),
            Err(CircuitError::SingularParameter { entry, .. }) if entry == "det(Z)"
        ));
    }

    #[test]
    fn sparams_of_series_r_match_expectations() {
        let t = TwoPort::series_impedance(rf("50"));
        let s = t.to(ParameterSet::S).unwrap();
        assert_eq!(s.params()[1][0], rf("2/3"));
        assert_eq!(s.params()[0][0], rf("1/3"));
        let back = s.to(ParameterSet::A).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn cascade_of_series_impedances_adds_b_terms() {
        let t = TwoPort::series_impedance(rf("Za"))
            .cascade(&TwoPort::series_impedance(rf("Zb")))
            .unwrap();
        assert_eq!(t, TwoPort::series_impedance(rf("Za + Zb")));
        assert!(t.is_reciprocal());
    }

    #[test]
    fn t_section_matches_cascade_all() {
        let t = TwoPort::t_section(rf("Za"), rf("Yb"), rf("Zc")).unwrap();
        assert_eq!(
            t.params(),
            &m(["1 + Za*Yb", "Za + Zc + Za*Yb*Zc", "Yb", "1 + Yb*Zc"])
        );
        let parts = [
            TwoPort::series_impedance(rf("Za")),
            TwoPort::shunt_admittance(rf("Yb")),
            TwoPort::series_impedance(rf("Zc")),
        ];
        assert_eq!(TwoPort::cascade_all(&parts).unwrap(), t);
        let matched = TwoPort::series_impedance(RatFunc::zero());
        assert!(matched.reflection_at_port1(&RatFunc::integer(50)).unwrap().is_zero());
    }

    #[test]
    fn series_connection_adds_z() {
        let a = TwoPort::new(ParameterSet::Z, m(["a", "b", "b", "d"]));
        let b = TwoPort::new(ParameterSet::Z, m(["1", "2", "2", "3"]));
        let sum = a.series(&b).unwrap();
        assert_eq!(sum.params(), &m(["a + 1", "b + 2", "b + 2", "d + 3"]));
        let floating = b.clone().with_common_ground(false);
        assert!(matches!(
            a.parallel(&floating),
            Err(CircuitError::InvalidPortConnection { .. })
        ));
    }

    #[test]
    fn loaded_divider_input_impedance() {
        let tp = two_port(&l_section(), ("1", "0"), ("2", "0"), ParameterSet::A).unwrap();
        let zin = tp.input_impedance(&rf("RL")).unwrap();
        assert_eq!(zin, rf("R1 + R2*RL/(R2 + RL)"));
    }

    #[test]
    fn series_element_falls_back_to_y() {
        // A lone series resistor has no Z parameters (port 2 open leaves
        // node 2 driven only by the test source).
        let circuit = Circuit::build([
            element("R1", Resistor, ["1", "2"], "R").unwrap(),
            element("Rg", Resistor, ["0", "g"], "1").unwrap(),
        ])
        .unwrap();
        let tp = two_port(&circuit, ("1", "0"), ("2", "0"), ParameterSet::Y).unwrap();
        assert_eq!(tp.params(), &m(["1/R", "-1/R", "-1/R", "1/R"]));
    }
}
