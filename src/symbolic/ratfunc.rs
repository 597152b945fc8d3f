//! Rational functions in canonical form.
//!
//! Numerator and denominator are kept coprime and the denominator is scaled so
//! that its leading coefficient is one. Two rational functions are therefore
//! algebraically equal exactly when they compare equal.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use num_traits::{One, Zero};

use crate::errors::CircuitError;
use crate::math::CScalar;

use super::number::{coeff_int, coeff_inverse, imaginary_unit, Coeff};
use super::parse::parse_formula;
use super::poly::Poly;

/// Quotient of two polynomials.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RatFunc {
    num: Poly,
    den: Poly,
}

impl RatFunc {
    /// Builds `num / den`, `None` when `den` is zero.
    #[must_use]
    pub fn new(num: Poly, den: Poly) -> Option<Self> {
        if den.is_zero() {
            None
        } else {
            Some(Self::normalized(num, den))
        }
    }

    fn normalized(num: Poly, den: Poly) -> Self {
        if num.is_zero() {
            return Self::zero();
        }
        let g = Poly::gcd(&num, &den);
        let (num, den) = if g.is_one() {
            (num, den)
        } else {
            let n = num.div_exact(&g).unwrap_or_else(|| num.clone());
            let d = den.div_exact(&g).unwrap_or_else(|| den.clone());
            (n, d)
        };
        Self::coprime(num, den)
    }

    /// Scales an already coprime pair so the denominator is monic.
    fn coprime(num: Poly, den: Poly) -> Self {
        if num.is_zero() {
            return Self::zero();
        }
        match coeff_inverse(&den.base_lc()) {
            Some(inv) if !inv.is_one() => Self {
                num: num.scale(&inv),
                den: den.scale(&inv),
            },
            _ => Self { num, den },
        }
    }

    /// Zero.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            num: Poly::zero(),
            den: Poly::one(),
        }
    }

    /// One.
    #[must_use]
    pub fn one() -> Self {
        Self::from_poly(Poly::one())
    }

    /// A polynomial viewed as a rational function.
    #[must_use]
    pub fn from_poly(p: Poly) -> Self {
        Self {
            num: p,
            den: Poly::one(),
        }
    }

    /// Exact constant.
    #[must_use]
    pub fn constant(c: Coeff) -> Self {
        Self::from_poly(Poly::constant(c))
    }

    /// Integer constant.
    #[must_use]
    pub fn integer(n: i64) -> Self {
        Self::from_poly(Poly::integer(n))
    }

    /// The rational number `n / d`; `d` must be non-zero.
    #[must_use]
    pub fn rational(n: i64, d: i64) -> Self {
        Self::new(Poly::integer(n), Poly::integer(d)).unwrap_or_else(Self::zero)
    }

    /// A free symbol.
    #[must_use]
    pub fn symbol(name: &str) -> Self {
        Self::from_poly(Poly::symbol(name))
    }

    /// The imaginary unit `j`.
    #[must_use]
    pub fn j() -> Self {
        Self::constant(imaginary_unit())
    }

    /// Numerator.
    #[must_use]
    pub fn numer(&self) -> &Poly {
        &self.num
    }

    /// Denominator (leading coefficient one).
    #[must_use]
    pub fn denom(&self) -> &Poly {
        &self.den
    }

    /// True for zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    /// True for one.
    #[must_use]
    pub fn is_one(&self) -> bool {
        self.den.is_one() && self.num.is_one()
    }

    /// Constant value, if free of symbols.
    #[must_use]
    pub fn as_constant(&self) -> Option<Coeff> {
        let n = self.num.as_constant()?;
        let d = self.den.as_constant()?;
        coeff_inverse(&d).map(|inv| n * inv)
    }

    /// True when the denominator is one.
    #[must_use]
    pub fn is_polynomial(&self) -> bool {
        self.den.is_one()
    }

    /// Symbols that occur in numerator or denominator.
    #[must_use]
    pub fn vars(&self) -> BTreeSet<String> {
        let mut v = self.num.vars();
        v.extend(self.den.vars());
        v
    }

    /// True if `x` occurs.
    #[must_use]
    pub fn contains(&self, x: &str) -> bool {
        self.num.contains(x) || self.den.contains(x)
    }

    /// Rough size used for pivot selection.
    #[must_use]
    pub fn complexity(&self) -> usize {
        self.num.term_count() + self.den.term_count()
    }

    /// Reciprocal, `None` for zero.
    #[must_use]
    pub fn recip(&self) -> Option<Self> {
        Self::new(self.den.clone(), self.num.clone())
    }

    /// Quotient, `None` when dividing by zero.
    #[must_use]
    pub fn checked_div(&self, rhs: &Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        Some(self.cross_mul(&rhs.den, &rhs.num))
    }

    /// Integer power; negative powers of zero are `None`.
    #[must_use]
    pub fn pow(&self, exp: i32) -> Option<Self> {
        let e = exp.unsigned_abs();
        let raised = Self {
            num: self.num.pow(e),
            den: self.den.pow(e),
        };
        if exp >= 0 {
            Some(raised)
        } else {
            raised.recip()
        }
    }

    /// Multiplies by an exact constant.
    #[must_use]
    pub fn scale(&self, c: &Coeff) -> Self {
        Self::coprime(self.num.scale(c), self.den.clone())
    }

    /// Partial derivative in `x`.
    #[must_use]
    pub fn derivative(&self, x: &str) -> Self {
        let dn = self.num.derivative(x);
        let dd = self.den.derivative(x);
        if dd.is_zero() {
            return Self::normalized(dn, self.den.clone());
        }
        Self::normalized(
            dn.mul(&self.den).sub(&self.num.mul(&dd)),
            self.den.mul(&self.den),
        )
    }

    /// Replaces the symbol `x` by `value`; `None` if the denominator vanishes.
    #[must_use]
    pub fn subs(&self, x: &str, value: &RatFunc) -> Option<Self> {
        if !self.contains(x) {
            return Some(self.clone());
        }
        let n = poly_subs(&self.num, x, value);
        let d = poly_subs(&self.den, x, value);
        n.checked_div(&d)
    }

    /// Numeric value with every symbol bound in `values`.
    #[must_use]
    pub fn eval(&self, values: &HashMap<String, CScalar>) -> Option<CScalar> {
        let n = self.num.eval(values)?;
        let d = self.den.eval(values)?;
        Some(n / d)
    }

    /// Complex conjugate; symbols are real.
    #[must_use]
    pub fn conj(&self) -> Self {
        Self::normalized(self.num.conj(), self.den.conj())
    }

    /// True when equal to its conjugate.
    #[must_use]
    pub fn is_real(&self) -> bool {
        self.num.is_real() && self.den.is_real()
    }

    /// Real part.
    #[must_use]
    pub fn re(&self) -> Self {
        (self + &self.conj()).scale(&(Coeff::one() / coeff_int(2)))
    }

    /// Imaginary part.
    #[must_use]
    pub fn im(&self) -> Self {
        let two_j = imaginary_unit() * coeff_int(2);
        (self - &self.conj()).scale(&(Coeff::one() / two_j))
    }

    /// Exact square root, if numerator and denominator allow one.
    #[must_use]
    pub fn sqrt(&self) -> Option<Self> {
        if let (Some(n), Some(d)) = (self.num.sqrt(), self.den.sqrt()) {
            return Self::new(n, d);
        }
        let n = self.num.mul(&self.den).sqrt()?;
        Self::new(n, self.den.clone())
    }

    // a/b + c/d with g = gcd(b, d): only factors of g can survive in both the
    // new numerator and the new denominator.
    fn add_ref(&self, rhs: &Self) -> Self {
        if self.is_zero() {
            return rhs.clone();
        }
        if rhs.is_zero() {
            return self.clone();
        }
        if self.den == rhs.den {
            return Self::normalized(self.num.add(&rhs.num), self.den.clone());
        }
        let g = Poly::gcd(&self.den, &rhs.den);
        if g.is_one() {
            return Self::coprime(
                self.num.mul(&rhs.den).add(&rhs.num.mul(&self.den)),
                self.den.mul(&rhs.den),
            );
        }
        let (Some(bg), Some(dg)) = (self.den.div_exact(&g), rhs.den.div_exact(&g)) else {
            return Self::normalized(
                self.num.mul(&rhs.den).add(&rhs.num.mul(&self.den)),
                self.den.mul(&rhs.den),
            );
        };
        let num = self.num.mul(&dg).add(&rhs.num.mul(&bg));
        if num.is_zero() {
            return Self::zero();
        }
        let h = Poly::gcd(&num, &g);
        let (num, g) = match (num.div_exact(&h), g.div_exact(&h)) {
            (Some(n), Some(gh)) if !h.is_one() => (n, gh),
            _ => (num, g),
        };
        Self::coprime(num, bg.mul(&dg).mul(&g))
    }

    fn sub_ref(&self, rhs: &Self) -> Self {
        self.add_ref(&rhs.neg_ref())
    }

    fn mul_ref(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::zero();
        }
        self.cross_mul(&rhs.num, &rhs.den)
    }

    // (a/b) * (c/d) for coprime pairs: cancelling gcd(a, d) and gcd(c, b)
    // leaves a coprime result.
    fn cross_mul(&self, c: &Poly, d: &Poly) -> Self {
        let g1 = Poly::gcd(&self.num, d);
        let g2 = Poly::gcd(c, &self.den);
        let cancel = |p: &Poly, g: &Poly| {
            if g.is_one() {
                p.clone()
            } else {
                p.div_exact(g).unwrap_or_else(|| p.clone())
            }
        };
        Self::coprime(
            cancel(&self.num, &g1).mul(&cancel(c, &g2)),
            cancel(&self.den, &g2).mul(&cancel(d, &g1)),
        )
    }

    fn neg_ref(&self) -> Self {
        Self {
            num: self.num.neg(),
            den: self.den.clone(),
        }
    }
}

fn poly_subs(p: &Poly, x: &str, value: &RatFunc) -> RatFunc {
    let mut acc = RatFunc::zero();
    for c in p.coeffs_in(x).into_iter().rev() {
        acc = &(&acc * value) + &RatFunc::from_poly(c);
    }
    acc
}

macro_rules! forward_binop {
    ($trait:ident, $method:ident, $inner:ident) => {
        impl $trait<&RatFunc> for &RatFunc {
            type Output = RatFunc;
            fn $method(self, rhs: &RatFunc) -> RatFunc {
                self.$inner(rhs)
            }
        }

        impl $trait<RatFunc> for RatFunc {
            type Output = RatFunc;
            fn $method(self, rhs: RatFunc) -> RatFunc {
                self.$inner(&rhs)
            }
        }

        impl $trait<&RatFunc> for RatFunc {
            type Output = RatFunc;
            fn $method(self, rhs: &RatFunc) -> RatFunc {
                self.$inner(rhs)
            }
        }
    };
}

forward_binop!(Add, add, add_ref);
forward_binop!(Sub, sub, sub_ref);
forward_binop!(Mul, mul, mul_ref);

impl Neg for RatFunc {
    type Output = RatFunc;
    fn neg(self) -> RatFunc {
        self.neg_ref()
    }
}

impl Neg for &RatFunc {
    type Output = RatFunc;
    fn neg(self) -> RatFunc {
        self.neg_ref()
    }
}

impl Zero for RatFunc {
    fn zero() -> Self {
        RatFunc::zero()
    }

    fn is_zero(&self) -> bool {
        RatFunc::is_zero(self)
    }
}

impl One for RatFunc {
    fn one() -> Self {
        RatFunc::one()
    }
}

impl From<i64> for RatFunc {
    fn from(n: i64) -> Self {
        RatFunc::integer(n)
    }
}

impl FromStr for RatFunc {
    type Err = CircuitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_formula(s)
    }
}

fn needs_parens(p: &Poly) -> bool {
    if p.term_count() > 1 {
        return true;
    }
    match p.terms().next() {
        Some((m, c)) => {
            let simple_coeff = c.im.is_zero() && c.re.is_integer();
            !(m.is_one() && simple_coeff || c.is_one() && m.degree() == 1)
        }
        None => false,
    }
}

impl fmt::Display for RatFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den.is_one() {
            return write!(f, "{}", self.num);
        }
        let num = if self.num.term_count() > 1 {
            format!("({})", self.num)
        } else {
            self.num.to_string()
        };
        if needs_parens(&self.den) {
            write!(f, "{num}/({})", self.den)
        } else {
            write!(f, "{num}/{}", self.den)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rf(text: &str) -> RatFunc {
        text.parse().unwrap()
    }

    #[test]
    fn canonical_form_makes_equality_structural() {
        let a = rf("(Ra*Rb + Rb^2)/(Ra + Rb)");
        assert_eq!(a, rf("Rb"));
        let b = rf("1/Ra + 1/Rb");
        assert_eq!(b, rf("(Ra + Rb)/(Ra*Rb)"));
        assert_eq!(rf("2/(4*s)"), rf("1/(2*s)"));
    }

    #[test]
    fn substitution_and_derivative() {
        let h = rf("1/(s*L + R)");
        let at_zero = h.subs("s", &RatFunc::zero()).unwrap();
        assert_eq!(at_zero, rf("1/R"));
        assert_eq!(h.derivative("s"), rf("-L/(s*L + R)^2"));
        assert!(rf("1/s").subs("s", &RatFunc::zero()).is_none());
    }

    #[test]
    fn real_and_imaginary_parts() {
        // 1/(1 + jwRC) = (1 - jwRC)/(1 + (wRC)^2)
        let h = rf("1/(1 + j*w*R*C)");
        assert_eq!(h.re(), rf("1/(1 + w^2*R^2*C^2)"));
        assert_eq!(h.im(), rf("-w*R*C/(1 + w^2*R^2*C^2)"));
        assert!(!h.is_real());
        assert!(h.re().is_real());
    }

    #[test]
    fn numeric_evaluation() {
        let h = rf("Rb/(Ra + Rb)");
        let mut values = HashMap::new();
        values.insert("Ra".to_string(), CScalar::new(1.0, 0.0));
        values.insert("Rb".to_string(), CScalar::new(3.0, 0.0));
        let v = h.eval(&values).unwrap();
        approx::assert_relative_eq!(v.re, 0.75, epsilon = 1e-12);
    }
}
