//! Closed-form time-domain signals.
//!
//! A [`Signal`] is a finite sum of terms `c * t^n * exp(a*t) * w(t) * support`
//! where `w` is one, `cos(√w2·t)` or `sin(√w2·t)/√w2`. Writing the sine with
//! its frequency divided out keeps every coefficient rational even when `√w2`
//! has no closed form.

use std::collections::HashMap;
use std::fmt;

use crate::math::{CScalar, Scalar};
use crate::symbolic::RatFunc;

/// Oscillatory factor of a term, parameterized by the squared angular
/// frequency.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Wave {
    /// No oscillation.
    One,
    /// `cos(√w2 · t)`.
    Cos(RatFunc),
    /// `sin(√w2 · t) / √w2`.
    SinOverOmega(RatFunc),
}

/// Where a term is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Support {
    /// Every `t` (two-sided).
    Always,
    /// `t >= 0`, i.e. multiplied by the unit step `u(t)`.
    Causal,
    /// The `k`-th derivative of the Dirac impulse.
    Impulse(u32),
}

/// Shape of a term, without its coefficient.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TermShape {
    /// Power of `t`.
    pub power: u32,
    /// Exponential rate `a` in `exp(a*t)`.
    pub rate: RatFunc,
    /// Oscillatory factor.
    pub wave: Wave,
    /// Support.
    pub support: Support,
}

impl TermShape {
    fn impulse(order: u32) -> Self {
        Self {
            power: 0,
            rate: RatFunc::zero(),
            wave: Wave::One,
            support: Support::Impulse(order),
        }
    }

    fn smooth(power: u32, rate: RatFunc, wave: Wave, support: Support) -> Self {
        Self {
            power,
            rate,
            wave,
            support,
        }
    }

    /// Value of the smooth part at `t = 0`, relative to its coefficient.
    fn value_at_zero(&self) -> RatFunc {
        match (&self.wave, self.power) {
            (Wave::SinOverOmega(_), _) | (_, 1..) => RatFunc::zero(),
            _ => RatFunc::one(),
        }
    }
}

impl fmt::Display for TermShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut factors = Vec::new();
        if let Support::Impulse(k) = self.support {
            return match k {
                0 => write!(f, "delta(t)"),
                k => write!(f, "delta^({k})(t)"),
            };
        }
        match self.power {
            0 => {}
            1 => factors.push("t".to_string()),
            n => factors.push(format!("t^{n}")),
        }
        if !self.rate.is_zero() {
            factors.push(format!("exp(({})*t)", self.rate));
        }
        match &self.wave {
            Wave::One => {}
            Wave::Cos(w2) => factors.push(format!("cos({}*t)", omega_text(w2))),
            Wave::SinOverOmega(w2) => match w2.sqrt() {
                Some(w) => factors.push(format!("sin(({w})*t)/({w})")),
                None => factors.push(format!("sin(sqrt({w2})*t)/sqrt({w2})")),
            },
        }
        if self.support == Support::Causal {
            factors.push("u(t)".to_string());
        }
        if factors.is_empty() {
            write!(f, "1")
        } else {
            write!(f, "{}", factors.join("*"))
        }
    }
}

fn omega_text(w2: &RatFunc) -> String {
    match w2.sqrt() {
        Some(w) => format!("({w})"),
        None => format!("sqrt({w2})"),
    }
}

/// Sum of closed-form terms in the time variable `t`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signal {
    terms: Vec<(TermShape, RatFunc)>,
}

impl Signal {
    /// The zero signal.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    fn from_terms(terms: Vec<(TermShape, RatFunc)>) -> Self {
        let mut merged: Vec<(TermShape, RatFunc)> = Vec::with_capacity(terms.len());
        for (shape, coeff) in terms {
            let (shape, coeff) = canonical_shape(shape, coeff);
            match merged.iter_mut().find(|(s, _)| *s == shape) {
                Some((_, c)) => *c = &*c + &coeff,
                None => merged.push((shape, coeff)),
            }
        }
        merged.retain(|(_, c)| !c.is_zero());
        merged.sort_by_cached_key(|(s, _)| s.to_string());
        Self { terms: merged }
    }

    fn single(shape: TermShape, coeff: RatFunc) -> Self {
        Self::from_terms(vec![(shape, coeff)])
    }

    /// A two-sided constant `c`.
    #[must_use]
    pub fn constant(c: RatFunc) -> Self {
        Self::single(
            TermShape::smooth(0, RatFunc::zero(), Wave::One, Support::Always),
            c,
        )
    }

    /// `c * u(t)`.
    #[must_use]
    pub fn step(c: RatFunc) -> Self {
        Self::single(
            TermShape::smooth(0, RatFunc::zero(), Wave::One, Support::Causal),
            c,
        )
    }

    /// `c * δ(t)`.
    #[must_use]
    pub fn impulse(c: RatFunc) -> Self {
        Self::single(TermShape::impulse(0), c)
    }

    /// `c * δ^(k)(t)`.
    #[must_use]
    pub fn impulse_derivative(c: RatFunc, order: u32) -> Self {
        Self::single(TermShape::impulse(order), c)
    }

    /// `c * t * u(t)`.
    #[must_use]
    pub fn ramp(c: RatFunc) -> Self {
        Self::single(
            TermShape::smooth(1, RatFunc::zero(), Wave::One, Support::Causal),
            c,
        )
    }

    /// `c * exp(a*t) * u(t)`.
    #[must_use]
    pub fn exponential(c: RatFunc, rate: RatFunc) -> Self {
        Self::single(TermShape::smooth(0, rate, Wave::One, Support::Causal), c)
    }

    /// Two-sided `c * cos(ω t)`.
    #[must_use]
    pub fn cos(c: RatFunc, omega: &RatFunc) -> Self {
        Self::single(
            TermShape::smooth(0, RatFunc::zero(), Wave::Cos(omega * omega), Support::Always),
            c,
        )
    }

    /// Two-sided `c * sin(ω t)`.
    #[must_use]
    pub fn sin(c: RatFunc, omega: &RatFunc) -> Self {
        Self::single(
            TermShape::smooth(
                0,
                RatFunc::zero(),
                Wave::SinOverOmega(omega * omega),
                Support::Always,
            ),
            &c * omega,
        )
    }

    /// `c * t^n * exp(a*t) * w(t)` with the given support.
    #[must_use]
    pub fn term(c: RatFunc, power: u32, rate: RatFunc, wave: Wave, support: Support) -> Self {
        Self::single(TermShape::smooth(power, rate, wave, support), c)
    }

    /// Polynomial in `t` with two-sided support, `None` if `p` is not a
    /// polynomial in `t`.
    #[must_use]
    pub fn from_polynomial(p: &RatFunc) -> Option<Self> {
        if p.denom().contains("t") {
            return None;
        }
        let den = RatFunc::from_poly(p.denom().clone());
        let terms = p
            .numer()
            .coeffs_in("t")
            .into_iter()
            .enumerate()
            .filter_map(|(n, c)| {
                let coeff = RatFunc::from_poly(c).checked_div(&den)?;
                Some((
                    TermShape::smooth(n as u32, RatFunc::zero(), Wave::One, Support::Always),
                    coeff,
                ))
            })
            .collect();
        Some(Self::from_terms(terms))
    }

    /// Terms in canonical order.
    pub fn terms(&self) -> impl Iterator<Item = (&TermShape, &RatFunc)> {
        self.terms.iter().map(|(s, c)| (s, c))
    }

    /// True for the zero signal.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Constant value when the signal is a two-sided constant.
    #[must_use]
    pub fn as_constant(&self) -> Option<RatFunc> {
        match self.terms.as_slice() {
            [] => Some(RatFunc::zero()),
            [(shape, c)]
                if shape.power == 0
                    && shape.rate.is_zero()
                    && shape.wave == Wave::One
                    && shape.support == Support::Always =>
            {
                Some(c.clone())
            }
            _ => None,
        }
    }

    /// True when some term is non-zero before `t = 0`.
    #[must_use]
    pub fn is_two_sided(&self) -> bool {
        self.terms.iter().any(|(s, _)| s.support == Support::Always)
    }

    /// Reinterprets two-sided terms as causal (`× u(t)`).
    #[must_use]
    pub fn causal_part(&self) -> Self {
        let terms = self
            .terms
            .iter()
            .map(|(s, c)| {
                let mut shape = s.clone();
                if shape.support == Support::Always {
                    shape.support = Support::Causal;
                }
                (shape, c.clone())
            })
            .collect();
        Self::from_terms(terms)
    }

    /// Sum.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self::from_terms(self.terms.iter().chain(&other.terms).cloned().collect())
    }

    /// Difference.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.scale(&RatFunc::integer(-1)))
    }

    /// Multiplies every coefficient by `c`.
    #[must_use]
    pub fn scale(&self, c: &RatFunc) -> Self {
        Self::from_terms(
            self.terms
                .iter()
                .map(|(s, k)| (s.clone(), k * c))
                .collect(),
        )
    }

    /// Pointwise product, `None` when the product leaves the representable
    /// family (impulses times step discontinuities, incommensurate
    /// frequencies).
    #[must_use]
    pub fn mul(&self, other: &Self) -> Option<Self> {
        let mut terms = Vec::new();
        for (sa, ca) in &self.terms {
            for (sb, cb) in &other.terms {
                terms.extend(term_product(sa, sb, &(ca * cb))?);
            }
        }
        Some(Self::from_terms(terms))
    }

    /// Time derivative in the distributional sense: causal terms contribute
    /// their jump at `t = 0` as an impulse.
    #[must_use]
    pub fn derivative(&self) -> Self {
        let mut terms = Vec::new();
        for (shape, c) in &self.terms {
            if let Support::Impulse(k) = shape.support {
                terms.push((TermShape::impulse(k + 1), c.clone()));
                continue;
            }
            if shape.power > 0 {
                let mut s = shape.clone();
                s.power -= 1;
                terms.push((s, c * &RatFunc::integer(i64::from(shape.power))));
            }
            if !shape.rate.is_zero() {
                terms.push((shape.clone(), c * &shape.rate));
            }
            match &shape.wave {
                Wave::One => {}
                Wave::Cos(w2) => {
                    let mut s = shape.clone();
                    s.wave = Wave::SinOverOmega(w2.clone());
                    terms.push((s, -(c * w2)));
                }
                Wave::SinOverOmega(w2) => {
                    let mut s = shape.clone();
                    s.wave = Wave::Cos(w2.clone());
                    terms.push((s, c.clone()));
                }
            }
            if shape.support == Support::Causal {
                let jump = c * &shape.value_at_zero();
                terms.push((TermShape::impulse(0), jump));
            }
        }
        Self::from_terms(terms)
    }

    /// Replaces a symbol in every coefficient, rate and frequency.
    #[must_use]
    pub fn subs(&self, x: &str, value: &RatFunc) -> Option<Self> {
        let mut terms = Vec::with_capacity(self.terms.len());
        for (shape, c) in &self.terms {
            let wave = match &shape.wave {
                Wave::One => Wave::One,
                Wave::Cos(w2) => Wave::Cos(w2.subs(x, value)?),
                Wave::SinOverOmega(w2) => Wave::SinOverOmega(w2.subs(x, value)?),
            };
            let new_shape = TermShape {
                power: shape.power,
                rate: shape.rate.subs(x, value)?,
                wave,
                support: shape.support,
            };
            terms.push((new_shape, c.subs(x, value)?));
        }
        Some(Self::from_terms(terms))
    }

    /// Numeric value at time `t` ignoring impulses; `None` if a symbol is
    /// unbound. Causal terms are zero for `t < 0`.
    #[must_use]
    pub fn eval(&self, t: Scalar, values: &HashMap<String, CScalar>) -> Option<CScalar> {
        let mut total = CScalar::new(0.0, 0.0);
        for (shape, c) in &self.terms {
            match shape.support {
                Support::Impulse(_) => continue,
                Support::Causal if t < 0.0 => continue,
                _ => {}
            }
            let mut v = c.eval(values)? * t.powi(shape.power as i32);
            v *= (shape.rate.eval(values)? * t).exp();
            v *= match &shape.wave {
                Wave::One => CScalar::new(1.0, 0.0),
                Wave::Cos(w2) => (w2.eval(values)?.sqrt() * t).cos(),
                Wave::SinOverOmega(w2) => {
                    let w = w2.eval(values)?.sqrt();
                    if w.norm() == 0.0 {
                        CScalar::new(t, 0.0)
                    } else {
                        (w * t).sin() / w
                    }
                }
            };
            total += v;
        }
        Some(total)
    }
}

fn canonical_shape(mut shape: TermShape, coeff: RatFunc) -> (TermShape, RatFunc) {
    match &shape.wave {
        Wave::Cos(w2) if w2.is_zero() => shape.wave = Wave::One,
        Wave::SinOverOmega(w2) if w2.is_zero() => {
            shape.wave = Wave::One;
            shape.power += 1;
        }
        _ => {}
    }
    (shape, coeff)
}

fn term_product(a: &TermShape, b: &TermShape, coeff: &RatFunc) -> Option<Vec<(TermShape, RatFunc)>> {
    match (a.support, b.support) {
        (Support::Impulse(_), Support::Impulse(_)) => None,
        (Support::Impulse(0), Support::Always) => {
            Some(vec![(TermShape::impulse(0), coeff * &b.value_at_zero())])
        }
        (Support::Always, Support::Impulse(0)) => {
            Some(vec![(TermShape::impulse(0), coeff * &a.value_at_zero())])
        }
        (Support::Impulse(_), _) | (_, Support::Impulse(_)) => None,
        (sa, sb) => {
            let support = if sa == Support::Causal || sb == Support::Causal {
                Support::Causal
            } else {
                Support::Always
            };
            let power = a.power + b.power;
            let rate = &a.rate + &b.rate;
            let waves = wave_product(&a.wave, &b.wave)?;
            Some(
                waves
                    .into_iter()
                    .map(|(wave, k)| {
                        (
                            TermShape::smooth(power, rate.clone(), wave, support),
                            coeff * &k,
                        )
                    })
                    .collect(),
            )
        }
    }
}

/// Product-to-sum identities with `A = √a`, `B = √b`.
fn wave_product(a: &Wave, b: &Wave) -> Option<Vec<(Wave, RatFunc)>> {
    let half = RatFunc::rational(1, 2);
    let squared = |x: &RatFunc| x * x;
    match (a, b) {
        (Wave::One, w) | (w, Wave::One) => Some(vec![(w.clone(), RatFunc::one())]),
        (Wave::Cos(wa), Wave::Cos(wb)) => {
            let (ra, rb) = (wa.sqrt()?, wb.sqrt()?);
            Some(vec![
                (Wave::Cos(squared(&(&ra + &rb))), half.clone()),
                (Wave::Cos(squared(&(&ra - &rb))), half),
            ])
        }
        (Wave::SinOverOmega(wa), Wave::SinOverOmega(wb)) => {
            let (ra, rb) = (wa.sqrt()?, wb.sqrt()?);
            let k = half.checked_div(&(&ra * &rb))?;
            Some(vec![
                (Wave::Cos(squared(&(&ra - &rb))), k.clone()),
                (Wave::Cos(squared(&(&ra + &rb))), -k),
            ])
        }
        (Wave::Cos(wa), Wave::SinOverOmega(wb)) | (Wave::SinOverOmega(wb), Wave::Cos(wa)) => {
            let (ra, rb) = (wa.sqrt()?, wb.sqrt()?);
            let k = half.checked_div(&rb)?;
            Some(vec![
                (Wave::SinOverOmega(squared(&(&ra + &rb))), &k * &(&ra + &rb)),
                (Wave::SinOverOmega(squared(&(&rb - &ra))), &k * &(&rb - &ra)),
            ])
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|(shape, c)| {
                let shape_text = shape.to_string();
                if shape_text == "1" {
                    format!("{c}")
                } else if c.is_one() {
                    shape_text
                } else if c.complexity() > 1 || !c.is_polynomial() {
                    format!("({c})*{shape_text}")
                } else {
                    format!("{c}*{shape_text}")
                }
            })
            .collect();
        write!(f, "{}", parts.join(" + "))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::math::bindings;

    fn rf(text: &str) -> RatFunc {
        text.parse().unwrap()
    }

    #[test]
    fn like_terms_merge_and_cancel() {
        let a = Signal::step(rf("2"));
        let b = Signal::step(rf("-2"));
        assert!(a.add(&b).is_zero());
        let c = Signal::exponential(rf("1"), rf("-a")).add(&Signal::exponential(rf("3"), rf("-a")));
        assert_eq!(c, Signal::exponential(rf("4"), rf("-a")));
    }

    #[test]
    fn derivative_of_causal_cosine_has_jump() {
        let x = Signal::cos(rf("A"), &rf("w")).causal_part();
        let dx = x.derivative();
        let expected = Signal::sin(rf("-A*w"), &rf("w"))
            .causal_part()
            .add(&Signal::impulse(rf("A")));
        assert_eq!(dx, expected);
    }

    #[test]
    fn product_of_cosines_uses_sum_frequencies() {
        let c1 = Signal::cos(RatFunc::one(), &rf("2"));
        let c2 = Signal::cos(RatFunc::one(), &rf("3"));
        let p = c1.mul(&c2).unwrap();
        let expected = Signal::cos(rf("1/2"), &rf("5")).add(&Signal::cos(rf("1/2"), &rf("1")));
        assert_eq!(p, expected);
    }

    #[test]
    fn numeric_value_respects_support() {
        let x = Signal::exponential(rf("2"), rf("-1"));
        let values = HashMap::new();
        assert_relative_eq!(x.eval(-0.5, &values).unwrap().re, 0.0);
        assert_relative_eq!(x.eval(1.0, &values).unwrap().re, 2.0 * (-1.0f64).exp(), epsilon = 1e-12);
        let s = Signal::sin(rf("1"), &rf("w"));
        let v = s.eval(0.25, &bindings([("w", 2.0)])).unwrap();
        assert_relative_eq!(v.re, 0.5f64.sin(), epsilon = 1e-12);
    }

    #[test]
    fn polynomial_formulas_become_signals() {
        let x = Signal::from_polynomial(&rf("3*t^2 + k")).unwrap();
        assert_eq!(x.terms().count(), 2);
        assert!(Signal::from_polynomial(&rf("1/t")).is_none());
    }
}
