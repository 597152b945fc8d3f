//! Univariate polynomials whose coefficients are rational functions of the
//! remaining symbols. Used for partial fractions in the transform variable.

use super::poly::Poly;
use super::ratfunc::RatFunc;

/// Polynomial in `var` with coefficients free of `var`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UPoly {
    var: String,
    coeffs: Vec<RatFunc>,
}

impl UPoly {
    /// Builds a polynomial from ascending coefficients.
    #[must_use]
    pub fn new(var: &str, coeffs: Vec<RatFunc>) -> Self {
        let mut p = Self {
            var: var.to_string(),
            coeffs,
        };
        p.trim();
        p
    }

    /// Zero polynomial.
    #[must_use]
    pub fn zero(var: &str) -> Self {
        Self::new(var, Vec::new())
    }

    /// Constant polynomial.
    #[must_use]
    pub fn constant(var: &str, c: RatFunc) -> Self {
        Self::new(var, vec![c])
    }

    /// `c * var^k`.
    #[must_use]
    pub fn monomial(var: &str, c: RatFunc, k: usize) -> Self {
        let mut coeffs = vec![RatFunc::zero(); k + 1];
        coeffs[k] = c;
        Self::new(var, coeffs)
    }

    /// Splits a multivariate polynomial along `var`.
    #[must_use]
    pub fn from_poly(p: &Poly, var: &str) -> Self {
        let coeffs = p
            .coeffs_in(var)
            .into_iter()
            .map(RatFunc::from_poly)
            .collect();
        Self::new(var, coeffs)
    }

    fn trim(&mut self) {
        while self.coeffs.last().is_some_and(RatFunc::is_zero) {
            self.coeffs.pop();
        }
    }

    /// Variable name.
    #[must_use]
    pub fn var(&self) -> &str {
        &self.var
    }

    /// Degree, `None` for zero.
    #[must_use]
    pub fn degree(&self) -> Option<usize> {
        self.coeffs.len().checked_sub(1)
    }

    /// True for the zero polynomial.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Coefficient of `var^k`.
    #[must_use]
    pub fn coeff(&self, k: usize) -> RatFunc {
        self.coeffs.get(k).cloned().unwrap_or_else(RatFunc::zero)
    }

    /// Ascending coefficients.
    #[must_use]
    pub fn coeffs(&self) -> &[RatFunc] {
        &self.coeffs
    }

    /// Leading coefficient (zero for the zero polynomial).
    #[must_use]
    pub fn lc(&self) -> RatFunc {
        self.coeffs.last().cloned().unwrap_or_else(RatFunc::zero)
    }

    /// Sum.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        let n = self.coeffs.len().max(other.coeffs.len());
        let coeffs = (0..n).map(|k| self.coeff(k) + other.coeff(k)).collect();
        Self::new(&self.var, coeffs)
    }

    /// Difference.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        let n = self.coeffs.len().max(other.coeffs.len());
        let coeffs = (0..n).map(|k| self.coeff(k) - other.coeff(k)).collect();
        Self::new(&self.var, coeffs)
    }

    /// Product.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        if self.is_zero() || other.is_zero() {
            return Self::zero(&self.var);
        }
        let mut coeffs = vec![RatFunc::zero(); self.coeffs.len() + other.coeffs.len() - 1];
        for (i, a) in self.coeffs.iter().enumerate() {
            if a.is_zero() {
                continue;
            }
            for (j, b) in other.coeffs.iter().enumerate() {
                coeffs[i + j] = &coeffs[i + j] + &(a * b);
            }
        }
        Self::new(&self.var, coeffs)
    }

    /// Multiplies every coefficient by `c`.
    #[must_use]
    pub fn scale(&self, c: &RatFunc) -> Self {
        Self::new(&self.var, self.coeffs.iter().map(|a| a * c).collect())
    }

    /// Non-negative power.
    #[must_use]
    pub fn pow(&self, exp: usize) -> Self {
        let mut out = Self::constant(&self.var, RatFunc::one());
        for _ in 0..exp {
            out = out.mul(self);
        }
        out
    }

    /// Derivative in `var`.
    #[must_use]
    pub fn derivative(&self) -> Self {
        let coeffs = self
            .coeffs
            .iter()
            .enumerate()
            .skip(1)
            .map(|(k, c)| c * &RatFunc::integer(k as i64))
            .collect();
        Self::new(&self.var, coeffs)
    }

    /// Scales to a leading coefficient of one.
    #[must_use]
    pub fn monic(&self) -> Self {
        match self.lc().recip() {
            Some(inv) => self.scale(&inv),
            None => self.clone(),
        }
    }

    /// Quotient and remainder, `None` for a zero divisor.
    #[must_use]
    pub fn divrem(&self, divisor: &Self) -> Option<(Self, Self)> {
        let dd = divisor.degree()?;
        let inv = divisor.lc().recip()?;
        let mut quotient = Self::zero(&self.var);
        let mut rem = self.clone();
        while let Some(dr) = rem.degree() {
            if dr < dd {
                break;
            }
            let t = &rem.lc() * &inv;
            let term = Self::monomial(&self.var, t, dr - dd);
            rem = rem.sub(&term.mul(divisor));
            quotient = quotient.add(&term);
        }
        Some((quotient, rem))
    }

    /// Exact quotient when the remainder vanishes.
    #[must_use]
    pub fn div_exact(&self, divisor: &Self) -> Option<Self> {
        let (q, r) = self.divrem(divisor)?;
        r.is_zero().then_some(q)
    }

    /// Monic greatest common divisor.
    #[must_use]
    pub fn gcd(a: &Self, b: &Self) -> Self {
        let (mut r0, mut r1) = (a.clone(), b.clone());
        while !r1.is_zero() {
            let rem = match r0.divrem(&r1) {
                Some((_, rem)) => rem,
                None => break,
            };
            r0 = r1;
            r1 = rem;
        }
        r0.monic()
    }

    /// Returns `(g, s, t)` with `s*a + t*b = g` and `g` monic.
    #[must_use]
    pub fn ext_gcd(a: &Self, b: &Self) -> (Self, Self, Self) {
        let var = a.var.clone();
        let one = Self::constant(&var, RatFunc::one());
        let (mut r0, mut r1) = (a.clone(), b.clone());
        let (mut s0, mut s1) = (one.clone(), Self::zero(&var));
        let (mut t0, mut t1) = (Self::zero(&var), one);
        while !r1.is_zero() {
            let Some((q, rem)) = r0.divrem(&r1) else {
                break;
            };
            let s2 = s0.sub(&q.mul(&s1));
            let t2 = t0.sub(&q.mul(&t1));
            r0 = std::mem::replace(&mut r1, rem);
            s0 = std::mem::replace(&mut s1, s2);
            t0 = std::mem::replace(&mut t1, t2);
        }
        match r0.lc().recip() {
            Some(inv) => (r0.scale(&inv), s0.scale(&inv), t0.scale(&inv)),
            None => (r0, s0, t0),
        }
    }

    /// Square-free decomposition (Yun): `self = lc * Π aᵢ^i` with monic `aᵢ`.
    #[must_use]
    pub fn square_free(&self) -> Vec<(Self, usize)> {
        let mut out = Vec::new();
        if self.degree().unwrap_or(0) == 0 {
            return out;
        }
        let f = self.monic();
        let df = f.derivative();
        let a0 = Self::gcd(&f, &df);
        let (Some(mut b), Some(c)) = (f.div_exact(&a0), df.div_exact(&a0)) else {
            return vec![(f, 1)];
        };
        let mut d = c.sub(&b.derivative());
        let mut i = 1;
        while b.degree().unwrap_or(0) > 0 {
            let a = Self::gcd(&b, &d);
            let (Some(next_b), Some(next_c)) = (b.div_exact(&a), d.div_exact(&a)) else {
                out.push((b, i));
                return out;
            };
            if a.degree().unwrap_or(0) > 0 {
                out.push((a, i));
            }
            b = next_b;
            d = next_c.sub(&b.derivative());
            i += 1;
        }
        out
    }

    /// Collapses back into a rational function.
    #[must_use]
    pub fn to_ratfunc(&self) -> RatFunc {
        let x = RatFunc::symbol(&self.var);
        let mut acc = RatFunc::zero();
        for c in self.coeffs.iter().rev() {
            acc = &(&acc * &x) + c;
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn up(text: &str) -> UPoly {
        let r: RatFunc = text.parse().unwrap();
        UPoly::from_poly(r.numer(), "s")
    }

    #[test]
    fn division_with_remainder() {
        let (q, r) = up("s^3 + 2*s + 1").divrem(&up("s + 1")).unwrap();
        assert_eq!(q, up("s^2 - s + 3"));
        assert_eq!(r, up("-2"));
    }

    #[test]
    fn extended_gcd_identity() {
        let a = up("s^2 + 3*s + 2");
        let b = up("s + 5");
        let (g, s, t) = UPoly::ext_gcd(&a, &b);
        assert_eq!(g.degree(), Some(0));
        assert_eq!(s.mul(&a).add(&t.mul(&b)), g);
    }

    #[test]
    fn square_free_splits_repeated_roots() {
        // (s + a)^2 (s + b)
        let f = up("(s + a)^2*(s + b)");
        let parts = UPoly::square_free(&f);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], (up("s + b"), 1));
        assert_eq!(parts[1], (up("s + a"), 2));
    }
}
