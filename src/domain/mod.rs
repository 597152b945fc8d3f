//! Domain-tagged symbolic values.
//!
//! A [`DomainExpr`] records which mathematical domain a quantity lives in.
//! Arithmetic only combines values of the same domain (or a domain-free
//! constant with anything); moving between domains goes through
//! [`Transformer`].

use std::collections::HashMap;
use std::fmt;

use crate::errors::{CircuitError, Result};
use crate::math::{CScalar, Scalar};
use crate::symbolic::RatFunc;

mod partial;
/// Closed-form time-domain signals.
pub mod signal;
/// Transform rules and the transform cache.
pub mod transform;

pub use signal::{Signal, Support, TermShape, Wave};
pub use transform::{LaplaceConvention, TransformCache, TransformConfig, Transformer};

/// Symbol reserved for the Laplace variable.
pub const LAPLACE_VAR: &str = "s";
/// Symbol reserved for time.
pub const TIME_VAR: &str = "t";
/// Symbol reserved for angular frequency.
pub const OMEGA_VAR: &str = "omega";
/// Symbol reserved for cyclic frequency.
pub const FREQ_VAR: &str = "f";
/// Symbol reserved for the z-transform variable.
pub const Z_VAR: &str = "z";
/// Symbol standing for the circle constant in `ω = 2πf`.
pub const PI_SYMBOL: &str = "pi";

/// Mathematical domain of a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Domain {
    /// Domain-independent constant.
    Constant,
    /// Time domain, variable `t`.
    Time,
    /// Laplace domain, variable `s`.
    Laplace,
    /// Angular-frequency domain, variable `omega`.
    AngularFrequency,
    /// Fourier (cyclic frequency) domain, variable `f`.
    Fourier,
    /// Single-frequency sinusoidal steady state.
    Phasor,
    /// Discrete-time z domain, variable `z`.
    Discrete,
}

impl Domain {
    /// Native independent variable, if any.
    #[must_use]
    pub const fn variable(self) -> Option<&'static str> {
        match self {
            Self::Constant | Self::Phasor => None,
            Self::Time => Some(TIME_VAR),
            Self::Laplace => Some(LAPLACE_VAR),
            Self::AngularFrequency => Some(OMEGA_VAR),
            Self::Fourier => Some(FREQ_VAR),
            Self::Discrete => Some(Z_VAR),
        }
    }

    /// True for domains whose values are plain rational functions.
    #[must_use]
    pub const fn is_rational(self) -> bool {
        matches!(
            self,
            Self::Constant | Self::Laplace | Self::AngularFrequency | Self::Fourier | Self::Discrete
        )
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constant => "constant",
            Self::Time => "time",
            Self::Laplace => "s",
            Self::AngularFrequency => "omega",
            Self::Fourier => "f",
            Self::Phasor => "phasor",
            Self::Discrete => "z",
        };
        f.write_str(name)
    }
}

/// Complex amplitude `A` of `Re(A · e^{jωt})`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Phasor {
    amplitude: RatFunc,
    omega: RatFunc,
}

impl Phasor {
    /// Phasor with amplitude `amplitude` at angular frequency `omega`.
    #[must_use]
    pub fn new(amplitude: RatFunc, omega: RatFunc) -> Self {
        Self { amplitude, omega }
    }

    /// Complex amplitude.
    #[must_use]
    pub fn amplitude(&self) -> &RatFunc {
        &self.amplitude
    }

    /// Angular frequency.
    #[must_use]
    pub fn omega(&self) -> &RatFunc {
        &self.omega
    }

    /// `|A|²`.
    #[must_use]
    pub fn magnitude_squared(&self) -> RatFunc {
        &self.amplitude * &self.amplitude.conj()
    }
}

impl fmt::Display for Phasor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) at omega = {}", self.amplitude, self.omega)
    }
}

/// Underlying representation of a [`DomainExpr`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Rational function of the domain variable and free symbols.
    Rational(RatFunc),
    /// Time-domain signal.
    Signal(Signal),
    /// Steady-state phasor.
    Phasor(Phasor),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rational(r) => write!(f, "{r}"),
            Self::Signal(x) => write!(f, "{x}"),
            Self::Phasor(p) => write!(f, "{p}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
        }
    }
}

/// Symbolic value tagged with its domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainExpr {
    domain: Domain,
    value: Value,
}

impl DomainExpr {
    /// Domain-independent constant.
    #[must_use]
    pub fn constant(value: RatFunc) -> Self {
        Self {
            domain: Domain::Constant,
            value: Value::Rational(value),
        }
    }

    /// Laplace-domain value.
    #[must_use]
    pub fn laplace(value: RatFunc) -> Self {
        Self {
            domain: Domain::Laplace,
            value: Value::Rational(value),
        }
    }

    /// Time-domain signal.
    #[must_use]
    pub fn time(signal: Signal) -> Self {
        Self {
            domain: Domain::Time,
            value: Value::Signal(signal),
        }
    }

    /// Steady-state phasor.
    #[must_use]
    pub fn phasor(phasor: Phasor) -> Self {
        Self {
            domain: Domain::Phasor,
            value: Value::Phasor(phasor),
        }
    }

    /// Wraps a rational function in `domain`. Time-domain formulas must be
    /// polynomials in `t`; phasors need [`DomainExpr::phasor`].
    pub fn from_ratfunc(domain: Domain, value: RatFunc) -> Result<Self> {
        match domain {
            Domain::Time => Signal::from_polynomial(&value)
                .map(Self::time)
                .ok_or_else(|| CircuitError::Transform {
                    from: Domain::Constant,
                    to: Domain::Time,
                    reason: format!("'{value}' is not a polynomial in t"),
                }),
            Domain::Phasor => Err(CircuitError::Transform {
                from: Domain::Constant,
                to: Domain::Phasor,
                reason: "a phasor needs an explicit angular frequency".into(),
            }),
            _ => Ok(Self {
                domain,
                value: Value::Rational(value),
            }),
        }
    }

    /// Parses a formula into `domain`.
    pub fn parse(domain: Domain, text: &str) -> Result<Self> {
        Self::from_ratfunc(domain, text.parse()?)
    }

    /// Domain tag.
    #[must_use]
    pub const fn domain(&self) -> Domain {
        self.domain
    }

    /// Underlying representation.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Rational value for rational domains.
    #[must_use]
    pub fn as_ratfunc(&self) -> Option<&RatFunc> {
        match &self.value {
            Value::Rational(r) => Some(r),
            _ => None,
        }
    }

    /// Signal value for the time domain.
    #[must_use]
    pub fn as_signal(&self) -> Option<&Signal> {
        match &self.value {
            Value::Signal(x) => Some(x),
            _ => None,
        }
    }

    /// Phasor value.
    #[must_use]
    pub fn as_phasor(&self) -> Option<&Phasor> {
        match &self.value {
            Value::Phasor(p) => Some(p),
            _ => None,
        }
    }

    /// True when the value is identically zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match &self.value {
            Value::Rational(r) => r.is_zero(),
            Value::Signal(x) => x.is_zero(),
            Value::Phasor(p) => p.amplitude.is_zero(),
        }
    }

    /// Converts to `target` using the process-wide transform cache and the
    /// default (unilateral) configuration.
    pub fn to(&self, target: Domain) -> Result<Self> {
        Transformer::cached(TransformConfig::default()).convert(self, target)
    }

    /// Converts to `target` with an explicit transformer.
    pub fn to_with(&self, target: Domain, transformer: &Transformer) -> Result<Self> {
        transformer.convert(self, target)
    }

    fn mismatch(&self, other: &Self, op: BinaryOp) -> CircuitError {
        CircuitError::DomainMismatch {
            left: self.domain,
            right: other.domain,
            operation: op.name().to_string(),
        }
    }

    /// Sum; both sides share a domain or one is a constant.
    pub fn try_add(&self, other: &Self) -> Result<Self> {
        self.binary(other, BinaryOp::Add)
    }

    /// Difference; both sides share a domain or one is a constant.
    pub fn try_sub(&self, other: &Self) -> Result<Self> {
        self.binary(other, BinaryOp::Sub)
    }

    /// Product; both sides share a domain or one is a constant.
    pub fn try_mul(&self, other: &Self) -> Result<Self> {
        self.binary(other, BinaryOp::Mul)
    }

    /// Quotient; both sides share a domain or one is a constant.
    pub fn try_div(&self, other: &Self) -> Result<Self> {
        self.binary(other, BinaryOp::Div)
    }

    /// Negation.
    #[must_use]
    pub fn neg(&self) -> Self {
        let minus_one = RatFunc::integer(-1);
        let value = match &self.value {
            Value::Rational(r) => Value::Rational(-r),
            Value::Signal(x) => Value::Signal(x.scale(&minus_one)),
            Value::Phasor(p) => Value::Phasor(Phasor::new(-&p.amplitude, p.omega.clone())),
        };
        Self {
            domain: self.domain,
            value,
        }
    }

    /// Multiplies by a domain-free factor.
    #[must_use]
    pub fn scale(&self, k: &RatFunc) -> Self {
        let value = match &self.value {
            Value::Rational(r) => Value::Rational(r * k),
            Value::Signal(x) => Value::Signal(x.scale(k)),
            Value::Phasor(p) => Value::Phasor(Phasor::new(&p.amplitude * k, p.omega.clone())),
        };
        Self {
            domain: self.domain,
            value,
        }
    }

    fn binary(&self, other: &Self, op: BinaryOp) -> Result<Self> {
        match (&self.value, &other.value) {
            (Value::Rational(a), Value::Rational(b)) => {
                let domain = match (self.domain, other.domain) {
                    (d, e) if d == e => d,
                    (Domain::Constant, d) | (d, Domain::Constant) => d,
                    _ => return Err(self.mismatch(other, op)),
                };
                let value = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a.checked_div(b).ok_or_else(|| division_by_zero(other))?,
                };
                Ok(Self {
                    domain,
                    value: Value::Rational(value),
                })
            }
            (Value::Signal(_), _) | (_, Value::Signal(_)) => self.binary_time(other, op),
            (Value::Phasor(_), _) | (_, Value::Phasor(_)) => self.binary_phasor(other, op),
        }
    }

    fn lift_to_signal(&self) -> Option<Signal> {
        match (&self.value, self.domain) {
            (Value::Signal(x), _) => Some(x.clone()),
            (Value::Rational(c), Domain::Constant) => Some(Signal::constant(c.clone())),
            _ => None,
        }
    }

    fn binary_time(&self, other: &Self, op: BinaryOp) -> Result<Self> {
        let (Some(a), Some(b)) = (self.lift_to_signal(), other.lift_to_signal()) else {
            return Err(self.mismatch(other, op));
        };
        let value = match op {
            BinaryOp::Add => a.add(&b),
            BinaryOp::Sub => a.sub(&b),
            BinaryOp::Mul => a.mul(&b).ok_or_else(|| CircuitError::Transform {
                from: Domain::Time,
                to: Domain::Time,
                reason: format!("product of '{a}' and '{b}' has no closed form"),
            })?,
            BinaryOp::Div => {
                let divisor = b.as_constant().ok_or_else(|| CircuitError::Transform {
                    from: Domain::Time,
                    to: Domain::Time,
                    reason: format!("division by the time-varying signal '{b}'"),
                })?;
                let inv = divisor.recip().ok_or_else(|| division_by_zero(other))?;
                a.scale(&inv)
            }
        };
        Ok(Self::time(value))
    }

    fn binary_phasor(&self, other: &Self, op: BinaryOp) -> Result<Self> {
        match (&self.value, &other.value, op) {
            (Value::Phasor(p), Value::Phasor(q), _) if p.omega != q.omega => {
                Err(CircuitError::DomainMismatch {
                    left: Domain::Phasor,
                    right: Domain::Phasor,
                    operation: format!(
                        "{} of phasors at omega = {} and {}",
                        op.name(),
                        p.omega,
                        q.omega
                    ),
                })
            }
            (Value::Phasor(p), Value::Phasor(q), BinaryOp::Add) => Ok(Self::phasor(Phasor::new(
                &p.amplitude + &q.amplitude,
                p.omega.clone(),
            ))),
            (Value::Phasor(p), Value::Phasor(q), BinaryOp::Sub) => Ok(Self::phasor(Phasor::new(
                &p.amplitude - &q.amplitude,
                p.omega.clone(),
            ))),
            (Value::Phasor(p), Value::Phasor(q), BinaryOp::Div) => p
                .amplitude
                .checked_div(&q.amplitude)
                .map(Self::constant)
                .ok_or_else(|| division_by_zero(other)),
            (Value::Phasor(_), Value::Phasor(_), BinaryOp::Mul) => Err(CircuitError::Transform {
                from: Domain::Phasor,
                to: Domain::Phasor,
                reason: "the product of two sinusoids is not a single-frequency phasor".into(),
            }),
            (Value::Phasor(p), Value::Rational(c), _) if other.domain == Domain::Constant => {
                match op {
                    BinaryOp::Mul => Ok(self.scale(c)),
                    BinaryOp::Div => c
                        .recip()
                        .map(|inv| self.scale(&inv))
                        .ok_or_else(|| division_by_zero(other)),
                    _ if c.is_zero() => Ok(Self::phasor(p.clone())),
                    _ => Err(self.mismatch(other, op)),
                }
            }
            (Value::Rational(c), Value::Phasor(p), _) if self.domain == Domain::Constant => {
                match op {
                    BinaryOp::Mul => Ok(other.scale(c)),
                    BinaryOp::Add if c.is_zero() => Ok(Self::phasor(p.clone())),
                    BinaryOp::Sub if c.is_zero() => Ok(other.neg()),
                    _ => Err(self.mismatch(other, op)),
                }
            }
            _ => Err(self.mismatch(other, op)),
        }
    }

    /// Derivative with respect to the domain's native variable. Time-domain
    /// derivatives include the jump of causal terms at `t = 0`; phasors are
    /// multiplied by `jω`.
    pub fn differentiate(&self) -> Result<Self> {
        let value = match (&self.value, self.domain.variable()) {
            (Value::Signal(x), _) => Value::Signal(x.derivative()),
            (Value::Phasor(p), _) => Value::Phasor(Phasor::new(
                &(&p.amplitude * &RatFunc::j()) * &p.omega,
                p.omega.clone(),
            )),
            (Value::Rational(_), None) => Value::Rational(RatFunc::zero()),
            (Value::Rational(r), Some(var)) => Value::Rational(r.derivative(var)),
        };
        Ok(Self {
            domain: self.domain,
            value,
        })
    }

    /// Running integral `∫_{0⁻}^t x dt + initial` expressed in the value's own
    /// domain: a time signal is integrated directly, a Laplace value becomes
    /// `(X + initial) / s`, and the steady-state domains divide by `jω`
    /// (phasor and `omega`) or `j2πf` (Fourier), where `initial` must be zero.
    pub fn integrate(&self, initial: &RatFunc) -> Result<Self> {
        self.integrate_with(initial, &Transformer::cached(TransformConfig::default()))
    }

    /// [`DomainExpr::integrate`] with an explicit transformer.
    pub fn integrate_with(&self, initial: &RatFunc, transformer: &Transformer) -> Result<Self> {
        match &self.value {
            Value::Signal(x) => Ok(Self::time(transformer.integrate_signal(x, initial)?)),
            Value::Phasor(p) if initial.is_zero() => {
                let jw = &RatFunc::j() * &p.omega;
                let amplitude = p.amplitude.checked_div(&jw).ok_or_else(|| {
                    CircuitError::Transform {
                        from: Domain::Phasor,
                        to: Domain::Phasor,
                        reason: "cannot integrate a phasor at omega = 0".into(),
                    }
                })?;
                Ok(Self::phasor(Phasor::new(amplitude, p.omega.clone())))
            }
            Value::Rational(x) if self.domain == Domain::Laplace => {
                let s = RatFunc::symbol(LAPLACE_VAR);
                let value = (x + initial).checked_div(&s).unwrap_or_else(RatFunc::zero);
                Ok(Self::laplace(value))
            }
            Value::Rational(x) if initial.is_zero() && self.domain == Domain::AngularFrequency => {
                self.divided(x, &(&RatFunc::j() * &RatFunc::symbol(OMEGA_VAR)))
            }
            Value::Rational(x) if initial.is_zero() && self.domain == Domain::Fourier => {
                let two_pi = &RatFunc::integer(2) * &RatFunc::symbol(PI_SYMBOL);
                self.divided(x, &(&(&RatFunc::j() * &two_pi) * &RatFunc::symbol(FREQ_VAR)))
            }
            _ => Err(CircuitError::Transform {
                from: self.domain,
                to: self.domain,
                reason: format!("integration with initial value {initial} is not defined here"),
            }),
        }
    }

    fn divided(&self, x: &RatFunc, by: &RatFunc) -> Result<Self> {
        let value = x.checked_div(by).ok_or_else(|| CircuitError::Transform {
            from: self.domain,
            to: self.domain,
            reason: format!("cannot divide by {by}"),
        })?;
        Ok(Self {
            domain: self.domain,
            value: Value::Rational(value),
        })
    }

    /// Replaces `symbol` with `value` throughout.
    pub fn subs(&self, symbol: &str, value: &RatFunc) -> Result<Self> {
        let fail = || CircuitError::InvalidValue {
            component: symbol.to_string(),
            reason: format!("substituting {value} makes a denominator vanish"),
        };
        let new_value = match &self.value {
            Value::Rational(r) => Value::Rational(r.subs(symbol, value).ok_or_else(fail)?),
            Value::Signal(x) => Value::Signal(x.subs(symbol, value).ok_or_else(fail)?),
            Value::Phasor(p) => Value::Phasor(Phasor::new(
                p.amplitude.subs(symbol, value).ok_or_else(fail)?,
                p.omega.subs(symbol, value).ok_or_else(fail)?,
            )),
        };
        Ok(Self {
            domain: self.domain,
            value: new_value,
        })
    }

    /// Numeric value of a rational-domain expression or a phasor amplitude.
    /// The domain variable must be bound in `values`.
    #[must_use]
    pub fn eval(&self, values: &HashMap<String, CScalar>) -> Option<CScalar> {
        match &self.value {
            Value::Rational(r) => r.eval(values),
            Value::Phasor(p) => p.amplitude.eval(values),
            Value::Signal(_) => None,
        }
    }

    /// Numeric value of a time-domain expression at `t`.
    #[must_use]
    pub fn eval_at(&self, t: Scalar, values: &HashMap<String, CScalar>) -> Option<CScalar> {
        self.as_signal()?.eval(t, values)
    }
}

fn division_by_zero(divisor: &DomainExpr) -> CircuitError {
    CircuitError::InvalidValue {
        component: divisor.to_string(),
        reason: "division by zero".into(),
    }
}

impl fmt::Display for DomainExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rf(text: &str) -> RatFunc {
        text.parse().unwrap()
    }

    #[test]
    fn mixed_domains_are_rejected() {
        let a = DomainExpr::laplace(rf("1/s"));
        let b = DomainExpr::time(Signal::step(rf("1")));
        let err = a.try_add(&b).unwrap_err();
        assert!(matches!(
            err,
            CircuitError::DomainMismatch {
                left: Domain::Laplace,
                right: Domain::Time,
                ..
            }
        ));
    }

    #[test]
    fn constants_combine_with_any_domain() {
        let k = DomainExpr::constant(rf("2"));
        let h = DomainExpr::laplace(rf("1/(s + a)"));
        let scaled = k.try_mul(&h).unwrap();
        assert_eq!(scaled.domain(), Domain::Laplace);
        assert_eq!(scaled.as_ratfunc(), Some(&rf("2/(s + a)")));
        let x = DomainExpr::time(Signal::ramp(rf("1")));
        let shifted = x.try_add(&k).unwrap();
        assert_eq!(shifted.domain(), Domain::Time);
    }

    #[test]
    fn phasor_ratio_is_constant() {
        let v = DomainExpr::phasor(Phasor::new(rf("10"), rf("w")));
        let i = DomainExpr::phasor(Phasor::new(rf("2*j"), rf("w")));
        let z = v.try_div(&i).unwrap();
        assert_eq!(z, DomainExpr::constant(rf("-5*j")));
        let other = DomainExpr::phasor(Phasor::new(rf("1"), rf("2*w")));
        assert!(matches!(v.try_add(&other), Err(CircuitError::DomainMismatch { .. })));
    }

    #[test]
    fn differentiation_uses_native_variable() {
        let h = DomainExpr::laplace(rf("1/(s + a)"));
        assert_eq!(h.differentiate().unwrap(), DomainExpr::laplace(rf("-1/(s + a)^2")));
        let p = DomainExpr::phasor(Phasor::new(rf("1"), rf("w")));
        let dp = p.differentiate().unwrap();
        assert_eq!(dp.as_phasor().unwrap().amplitude(), &rf("j*w"));
    }

    #[test]
    fn integration_of_time_signal_adds_initial_value() {
        let i = DomainExpr::time(Signal::step(rf("I0")));
        let q = i.integrate(&rf("Q0")).unwrap();
        let expected = Signal::ramp(rf("I0")).add(&Signal::step(rf("Q0")));
        assert_eq!(q, DomainExpr::time(expected));
        assert_eq!(i.integrate(&RatFunc::zero()).unwrap().differentiate().unwrap(), i);
    }

    #[test]
    fn laplace_integration_divides_by_s() {
        let i = DomainExpr::time(Signal::step(rf("I0")));
        let via_time = i.integrate(&rf("Q0")).unwrap().to(Domain::Laplace).unwrap();
        let h = i.to(Domain::Laplace).unwrap();
        assert_eq!(h, DomainExpr::laplace(rf("I0/s")));
        let direct = h.integrate(&rf("Q0")).unwrap();
        assert_eq!(direct, DomainExpr::laplace(rf("I0/s^2 + Q0/s")));
        assert_eq!(direct, via_time);
    }

    #[test]
    fn frequency_integration_divides_by_j_omega() {
        let x = DomainExpr::from_ratfunc(Domain::AngularFrequency, rf("1/(a + j*omega)")).unwrap();
        let integral = x.integrate(&RatFunc::zero()).unwrap();
        assert_eq!(integral.domain(), Domain::AngularFrequency);
        let back = integral.as_ratfunc().unwrap() * &rf("j*omega");
        assert_eq!(Some(&back), x.as_ratfunc());
        assert!(x.integrate(&rf("1")).is_err());

        let y = DomainExpr::from_ratfunc(Domain::Fourier, rf("1/(a + 2*j*pi*f)")).unwrap();
        let integral = y.integrate(&RatFunc::zero()).unwrap();
        assert_eq!(integral.as_ratfunc(), Some(&rf("1/(2*j*pi*f*(a + 2*j*pi*f))")));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let a = DomainExpr::laplace(rf("s"));
        let zero = DomainExpr::constant(RatFunc::zero());
        assert!(a.try_div(&zero).is_err());
    }
}
