//! Sparse multivariate polynomials over Gaussian rationals.
//!
//! Multivariate division and GCD work recursively: a polynomial is viewed as a
//! univariate polynomial in its largest variable whose coefficients are
//! polynomials in the remaining variables.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use num_traits::{One, Zero};

use crate::math::CScalar;

use super::number::{
    coeff_int, coeff_inverse, coeff_sqrt, fmt_coeff, is_positive_oriented, is_real, to_complex64,
    Coeff,
};

/// Product of variables raised to positive powers, sorted by variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Monomial(Vec<(String, u32)>);

impl Monomial {
    /// The empty product.
    #[must_use]
    pub fn one() -> Self {
        Self(Vec::new())
    }

    /// `name^exp` (the empty product when `exp == 0`).
    #[must_use]
    pub fn var(name: &str, exp: u32) -> Self {
        if exp == 0 {
            Self::one()
        } else {
            Self(vec![(name.to_string(), exp)])
        }
    }

    /// True for the empty product.
    #[must_use]
    pub fn is_one(&self) -> bool {
        self.0.is_empty()
    }

    /// Exponent of `x` (zero when absent).
    #[must_use]
    pub fn exponent(&self, x: &str) -> u32 {
        self.0.iter().find(|(v, _)| v == x).map_or(0, |(_, e)| *e)
    }

    /// The monomial with `x` removed.
    #[must_use]
    pub fn without(&self, x: &str) -> Self {
        Self(self.0.iter().filter(|(v, _)| v != x).cloned().collect())
    }

    /// Total degree.
    #[must_use]
    pub fn degree(&self) -> u32 {
        self.0.iter().map(|(_, e)| *e).sum()
    }

    /// Variables with their exponents.
    pub fn factors(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(v, e)| (v.as_str(), *e))
    }

    /// Product of two monomials.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        let (a, b) = (&self.0, &other.0);
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                std::cmp::Ordering::Less => {
                    out.push(a[i].clone());
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    out.push(b[j].clone());
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    out.push((a[i].0.clone(), a[i].1 + b[j].1));
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        Self(out)
    }

    /// Largest monomial dividing both.
    #[must_use]
    pub fn gcd(&self, other: &Self) -> Self {
        Self(
            self.0
                .iter()
                .filter_map(|(v, e)| {
                    let f = other.exponent(v);
                    (f > 0).then(|| (v.clone(), (*e).min(f)))
                })
                .collect(),
        )
    }

    fn largest_var(&self) -> Option<&str> {
        self.0.last().map(|(v, _)| v.as_str())
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(v, e)| if *e == 1 { v.clone() } else { format!("{v}^{e}") })
            .collect();
        write!(f, "{}", parts.join("*"))
    }
}

/// Sparse polynomial with exact complex-rational coefficients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Poly {
    terms: BTreeMap<Monomial, Coeff>,
}

impl Poly {
    /// The zero polynomial.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// The constant one.
    #[must_use]
    pub fn one() -> Self {
        Self::constant(Coeff::one())
    }

    /// A constant polynomial.
    #[must_use]
    pub fn constant(c: Coeff) -> Self {
        let mut p = Self::zero();
        p.add_term(Monomial::one(), c);
        p
    }

    /// An integer constant.
    #[must_use]
    pub fn integer(n: i64) -> Self {
        Self::constant(coeff_int(n))
    }

    /// The polynomial `name`.
    #[must_use]
    pub fn symbol(name: &str) -> Self {
        Self::var_pow(name, 1)
    }

    /// The polynomial `name^exp`.
    #[must_use]
    pub fn var_pow(name: &str, exp: u32) -> Self {
        let mut p = Self::zero();
        p.add_term(Monomial::var(name, exp), Coeff::one());
        p
    }

    /// Accumulates `c * m`, dropping the term if it cancels.
    pub fn add_term(&mut self, m: Monomial, c: Coeff) {
        if c.is_zero() {
            return;
        }
        let cancel = match self.terms.get_mut(&m) {
            Some(existing) => {
                *existing = &*existing + &c;
                existing.is_zero()
            }
            None => {
                self.terms.insert(m, c);
                false
            }
        };
        if cancel {
            self.terms.retain(|_, v| !v.is_zero());
        }
    }

    /// Iterates over `(monomial, coefficient)` pairs.
    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &Coeff)> {
        self.terms.iter()
    }

    /// Number of non-zero terms.
    #[must_use]
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// True for the zero polynomial.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// True for the constant one.
    #[must_use]
    pub fn is_one(&self) -> bool {
        self.as_constant().is_some_and(|c| c.is_one())
    }

    /// The value of a constant polynomial (zero included).
    #[must_use]
    pub fn as_constant(&self) -> Option<Coeff> {
        match self.terms.len() {
            0 => Some(Coeff::zero()),
            1 => self.terms.get(&Monomial::one()).cloned(),
            _ => None,
        }
    }

    /// True if every coefficient is real.
    #[must_use]
    pub fn is_real(&self) -> bool {
        self.terms.values().all(is_real)
    }

    /// All variables that occur.
    #[must_use]
    pub fn vars(&self) -> BTreeSet<String> {
        self.terms
            .keys()
            .flat_map(|m| m.factors().map(|(v, _)| v.to_string()))
            .collect()
    }

    /// True if `x` occurs.
    #[must_use]
    pub fn contains(&self, x: &str) -> bool {
        self.terms.keys().any(|m| m.exponent(x) > 0)
    }

    /// The lexicographically largest variable, the recursion variable.
    #[must_use]
    pub fn main_var(&self) -> Option<String> {
        self.terms
            .keys()
            .filter_map(Monomial::largest_var)
            .max()
            .map(str::to_string)
    }

    /// Degree in `x`.
    #[must_use]
    pub fn degree_in(&self, x: &str) -> u32 {
        self.terms.keys().map(|m| m.exponent(x)).max().unwrap_or(0)
    }

    /// Total degree.
    #[must_use]
    pub fn total_degree(&self) -> u32 {
        self.terms.keys().map(Monomial::degree).max().unwrap_or(0)
    }

    /// Coefficients in `x`, indexed by power.
    #[must_use]
    pub fn coeffs_in(&self, x: &str) -> Vec<Poly> {
        let mut out = vec![Poly::zero(); self.degree_in(x) as usize + 1];
        for (m, c) in &self.terms {
            out[m.exponent(x) as usize].add_term(m.without(x), c.clone());
        }
        out
    }

    /// Inverse of [`Poly::coeffs_in`]; the coefficients must be free of `x`.
    #[must_use]
    pub fn from_coeffs_in(x: &str, coeffs: &[Poly]) -> Poly {
        let mut out = Poly::zero();
        for (k, c) in coeffs.iter().enumerate() {
            let xk = Monomial::var(x, k as u32);
            for (m, v) in &c.terms {
                out.add_term(m.mul(&xk), v.clone());
            }
        }
        out
    }

    /// Leading coefficient in `x`.
    #[must_use]
    pub fn lc_in(&self, x: &str) -> Poly {
        let d = self.degree_in(x);
        let mut out = Poly::zero();
        for (m, c) in &self.terms {
            if m.exponent(x) == d {
                out.add_term(m.without(x), c.clone());
            }
        }
        out
    }

    /// Leading numeric coefficient under the recursive variable order.
    #[must_use]
    pub fn base_lc(&self) -> Coeff {
        let mut p = self.clone();
        loop {
            match p.main_var() {
                Some(x) => p = p.lc_in(&x),
                None => return p.as_constant().unwrap_or_else(Coeff::zero),
            }
        }
    }

    /// Scales so that [`Poly::base_lc`] is one.
    #[must_use]
    pub fn monic(&self) -> Poly {
        match coeff_inverse(&self.base_lc()) {
            Some(inv) => self.scale(&inv),
            None => self.clone(),
        }
    }

    /// Multiplies every coefficient by `c`.
    #[must_use]
    pub fn scale(&self, c: &Coeff) -> Poly {
        let mut out = Poly::zero();
        for (m, v) in &self.terms {
            out.add_term(m.clone(), v * c);
        }
        out
    }

    /// Sum.
    #[must_use]
    pub fn add(&self, other: &Poly) -> Poly {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.add_term(m.clone(), c.clone());
        }
        out
    }

    /// Difference.
    #[must_use]
    pub fn sub(&self, other: &Poly) -> Poly {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.add_term(m.clone(), -c.clone());
        }
        out
    }

    /// Negation.
    #[must_use]
    pub fn neg(&self) -> Poly {
        self.scale(&coeff_int(-1))
    }

    /// Product.
    #[must_use]
    pub fn mul(&self, other: &Poly) -> Poly {
        let mut out = Poly::zero();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &other.terms {
                out.add_term(ma.mul(mb), ca * cb);
            }
        }
        out
    }

    /// Non-negative integer power.
    #[must_use]
    pub fn pow(&self, exp: u32) -> Poly {
        let mut out = Poly::one();
        let mut base = self.clone();
        let mut e = exp;
        while e > 0 {
            if e & 1 == 1 {
                out = out.mul(&base);
            }
            e >>= 1;
            if e > 0 {
                base = base.mul(&base);
            }
        }
        out
    }

    /// Complex conjugate; variables are taken as real.
    #[must_use]
    pub fn conj(&self) -> Poly {
        let mut out = Poly::zero();
        for (m, c) in &self.terms {
            out.add_term(m.clone(), c.conj());
        }
        out
    }

    /// Partial derivative with respect to `x`.
    #[must_use]
    pub fn derivative(&self, x: &str) -> Poly {
        let mut out = Poly::zero();
        for (m, c) in &self.terms {
            let e = m.exponent(x);
            if e == 0 {
                continue;
            }
            let rest = m.without(x).mul(&Monomial::var(x, e - 1));
            out.add_term(rest, c * coeff_int(i64::from(e)));
        }
        out
    }

    /// Exact quotient `self / divisor`, `None` when the division leaves a remainder.
    #[must_use]
    pub fn div_exact(&self, divisor: &Poly) -> Option<Poly> {
        if divisor.is_zero() {
            return None;
        }
        if self.is_zero() {
            return Some(Poly::zero());
        }
        if let Some(c) = divisor.as_constant() {
            return coeff_inverse(&c).map(|inv| self.scale(&inv));
        }
        let x = match (self.main_var(), divisor.main_var()) {
            (Some(a), Some(b)) => a.max(b),
            (None, Some(b)) => b,
            (_, None) => return None,
        };
        let db = divisor.degree_in(&x);
        if db == 0 {
            let mut quotient = Vec::new();
            for c in self.coeffs_in(&x) {
                quotient.push(c.div_exact(divisor)?);
            }
            return Some(Poly::from_coeffs_in(&x, &quotient));
        }
        let lb = divisor.lc_in(&x);
        let mut rem = self.clone();
        let mut quotient = Poly::zero();
        while !rem.is_zero() {
            let dr = rem.degree_in(&x);
            if dr < db {
                return None;
            }
            let t = rem.lc_in(&x).div_exact(&lb)?;
            let term = t.mul(&Poly::var_pow(&x, dr - db));
            rem = rem.sub(&term.mul(divisor));
            quotient = quotient.add(&term);
        }
        Some(quotient)
    }

    /// Monic greatest common divisor.
    #[must_use]
    pub fn gcd(a: &Poly, b: &Poly) -> Poly {
        if a.is_zero() {
            return b.monic();
        }
        if b.is_zero() {
            return a.monic();
        }
        if a.as_constant().is_some() || b.as_constant().is_some() {
            return Poly::one();
        }
        if a == b {
            return a.monic();
        }
        if a.term_count() == 1 || b.term_count() == 1 {
            return monomial_gcd(a, b);
        }
        let (va, vb) = (a.vars(), b.vars());
        if let Some(x) = va.difference(&vb).next() {
            return Poly::gcd(&a.content_in(x), b);
        }
        if let Some(x) = vb.difference(&va).next() {
            return Poly::gcd(a, &b.content_in(x));
        }
        if let Some(x) = va.iter().find(|x| a.degree_in(x) == 1 || b.degree_in(x) == 1) {
            return linear_gcd(a, b, x);
        }
        let x = match (a.main_var(), b.main_var()) {
            (Some(p), Some(q)) => p.max(q),
            _ => return Poly::one(),
        };
        if a.degree_in(&x) == 0 {
            return Poly::gcd(a, &b.content_in(&x));
        }
        if b.degree_in(&x) == 0 {
            return Poly::gcd(&a.content_in(&x), b);
        }
        let (ca, cb) = (a.content_in(&x), b.content_in(&x));
        let content = Poly::gcd(&ca, &cb);
        let pa = a.div_exact(&ca).unwrap_or_else(|| a.clone());
        let pb = b.div_exact(&cb).unwrap_or_else(|| b.clone());
        content.mul(&primitive_prs(pa, pb, &x)).monic()
    }

    /// GCD of the coefficients in `x`.
    #[must_use]
    pub fn content_in(&self, x: &str) -> Poly {
        let mut g = Poly::zero();
        for c in self.coeffs_in(x) {
            if c.is_zero() {
                continue;
            }
            g = Poly::gcd(&g, &c);
            if g.is_one() {
                break;
            }
        }
        g
    }

    /// `self` divided by its content in `x`.
    #[must_use]
    pub fn primitive_part_in(&self, x: &str) -> Poly {
        let c = self.content_in(x);
        self.div_exact(&c).unwrap_or_else(|| self.clone())
    }

    /// Exact square root, normalised so its leading coefficient is positive.
    #[must_use]
    pub fn sqrt(&self) -> Option<Poly> {
        if self.is_zero() {
            return Some(Poly::zero());
        }
        let Some(x) = self.main_var() else {
            return coeff_sqrt(&self.base_lc()).map(Poly::constant);
        };
        let cs = self.coeffs_in(&x);
        let d = cs.len() - 1;
        if d % 2 != 0 {
            return None;
        }
        let m = d / 2;
        let mut r = vec![Poly::zero(); m + 1];
        r[m] = cs[d].sqrt()?;
        let twice_lead = r[m].scale(&coeff_int(2));
        for k in (0..m).rev() {
            let mut acc = cs[m + k].clone();
            for i in (k + 1)..m {
                let j = m + k - i;
                if j > k && j < m {
                    acc = acc.sub(&r[i].mul(&r[j]));
                }
            }
            r[k] = acc.div_exact(&twice_lead)?;
        }
        let root = Poly::from_coeffs_in(&x, &r);
        if root.mul(&root) != *self {
            return None;
        }
        if is_positive_oriented(&root.base_lc()) {
            Some(root)
        } else {
            Some(root.neg())
        }
    }

    /// Numeric value; `None` if a variable has no value.
    #[must_use]
    pub fn eval(&self, values: &HashMap<String, CScalar>) -> Option<CScalar> {
        let mut total = CScalar::new(0.0, 0.0);
        for (m, c) in &self.terms {
            let mut term = to_complex64(c);
            for (v, e) in m.factors() {
                term *= values.get(v)?.powi(e as i32);
            }
            total += term;
        }
        Some(total)
    }
}

/// GCD when at least one operand is a single term.
fn monomial_gcd(a: &Poly, b: &Poly) -> Poly {
    let mut monomials = a.terms.keys().chain(b.terms.keys());
    let Some(first) = monomials.next() else {
        return Poly::one();
    };
    let m = monomials.fold(first.clone(), |acc, m| acc.gcd(m));
    let mut out = Poly::zero();
    out.add_term(m, Coeff::one());
    out
}

/// GCD through a variable `x` in which `a` or `b` has degree one.
///
/// A primitive polynomial of degree one in `x` is irreducible, so the
/// primitive parts share either all of it or nothing.
fn linear_gcd(a: &Poly, b: &Poly, x: &str) -> Poly {
    let (ca, cb) = (a.content_in(x), b.content_in(x));
    let content = Poly::gcd(&ca, &cb);
    let pa = a.div_exact(&ca).unwrap_or_else(|| a.clone());
    let pb = b.div_exact(&cb).unwrap_or_else(|| b.clone());
    let (linear, other) = if pa.degree_in(x) == 1 { (pa, pb) } else { (pb, pa) };
    if other.div_exact(&linear).is_some() {
        content.mul(&linear).monic()
    } else {
        content.monic()
    }
}

/// Primitive polynomial remainder sequence for primitive `f`, `g` in `x`.
fn primitive_prs(mut f: Poly, mut g: Poly, x: &str) -> Poly {
    loop {
        if f.degree_in(x) < g.degree_in(x) {
            std::mem::swap(&mut f, &mut g);
        }
        let r = pseudo_remainder(&f, &g, x);
        if r.is_zero() {
            return g;
        }
        if r.degree_in(x) == 0 {
            return Poly::one();
        }
        f = g;
        g = r.primitive_part_in(x);
    }
}

fn pseudo_remainder(f: &Poly, g: &Poly, x: &str) -> Poly {
    let dg = g.degree_in(x);
    let lg = g.lc_in(x);
    let mut r = f.clone();
    while !r.is_zero() && r.degree_in(x) >= dg {
        let dr = r.degree_in(x);
        let lr = r.lc_in(x);
        r = r
            .mul(&lg)
            .sub(&lr.mul(&Poly::var_pow(x, dr - dg)).mul(g));
    }
    r
}

impl fmt::Display for Poly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let mut ordered: Vec<(&Monomial, &Coeff)> = self.terms.iter().collect();
        ordered.sort_by(|a, b| b.0.degree().cmp(&a.0.degree()).then_with(|| a.0.cmp(b.0)));
        let mut out = String::new();
        for (idx, (m, c)) in ordered.into_iter().enumerate() {
            let text = if m.is_one() {
                fmt_coeff(c)
            } else if c.is_one() {
                m.to_string()
            } else if (-c.clone()).is_one() {
                format!("-{m}")
            } else {
                format!("{}*{m}", fmt_coeff(c))
            };
            if idx == 0 {
                out.push_str(&text);
            } else if let Some(rest) = text.strip_prefix('-') {
                out.push_str(" - ");
                out.push_str(rest);
            } else {
                out.push_str(" + ");
                out.push_str(&text);
            }
        }
        write!(f, "{out}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Poly {
        Poly::symbol(name)
    }

    #[test]
    fn exact_division_detects_remainders() {
        let a = sym("x").add(&Poly::integer(1));
        let b = sym("y").sub(&Poly::integer(2));
        let product = a.mul(&b);
        assert_eq!(product.div_exact(&a), Some(b.clone()));
        assert_eq!(product.div_exact(&b), Some(a.clone()));
        assert!(product.add(&Poly::one()).div_exact(&a).is_none());
    }

    #[test]
    fn multivariate_gcd_recovers_common_factor() {
        let common = sym("Ra").add(&sym("Rb"));
        let a = common.mul(&sym("s")).mul(&sym("L"));
        let b = common.mul(&sym("s").add(&Poly::integer(3)));
        assert_eq!(Poly::gcd(&a, &b), common);
        assert!(Poly::gcd(&sym("x"), &sym("y")).is_one());
    }

    #[test]
    fn gcd_of_univariate_polynomials() {
        // (x - 1)(x + 2) and (x - 1)^2
        let xm1 = sym("x").sub(&Poly::one());
        let a = xm1.mul(&sym("x").add(&Poly::integer(2)));
        let b = xm1.pow(2);
        assert_eq!(Poly::gcd(&a, &b), xm1);
    }

    #[test]
    fn gcd_shortcuts_agree_with_common_factors() {
        // monomial against polynomial
        let m = sym("R").pow(2).mul(&sym("s"));
        let p = sym("R").mul(&sym("s")).add(&sym("R").mul(&sym("C")));
        assert_eq!(Poly::gcd(&m, &p), sym("R"));
        // a variable present on one side only
        let a = sym("L").mul(&sym("s").add(&Poly::one()));
        let b = sym("s").add(&Poly::one());
        assert_eq!(Poly::gcd(&a, &b), b);
        // degree one in a shared variable
        let lin = sym("R").add(&sym("L").mul(&sym("s")));
        let a = lin.mul(&sym("C").mul(&sym("s")).add(&Poly::one()));
        let b = lin.mul(&sym("R")).mul(&sym("C").add(&sym("L")));
        let g = Poly::gcd(&a, &b);
        assert_eq!(g, lin.monic());
        assert!(Poly::gcd(&lin, &sym("R").add(&sym("s"))).is_one());
    }

    #[test]
    fn square_root_of_perfect_square() {
        let base = sym("a").sub(&sym("b")).scale(&coeff_int(3));
        let sq = base.mul(&base);
        let root = sq.sqrt().unwrap();
        assert_eq!(root.mul(&root), sq);
        assert!(sym("a").sqrt().is_none());
    }

    #[test]
    fn derivative_and_display() {
        let p = sym("s").pow(2).scale(&coeff_int(3)).add(&sym("s")).sub(&Poly::integer(2));
        assert_eq!(p.derivative("s").to_string(), "6*s + 1");
        assert_eq!(p.to_string(), "3*s^2 + s - 2");
    }
}
