//! Inverse Laplace transform by partial fractions.
//!
//! The denominator is split into square-free parts, each part into linear
//! factors and real irreducible quadratics, and the proper part of the
//! fraction is separated factor by factor with the extended Euclidean
//! algorithm.
//!
//! Parts of degree three or more are split before that, first along the
//! parameters (the content with respect to a symbol is a factor free of it),
//! then by exact roots from the rational root test extended to monomials.

use std::collections::HashSet;

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive};

use crate::errors::{CircuitError, Result};
use crate::symbolic::{coeff_int, Monomial, Poly, RatFunc, UPoly};

use super::signal::{Signal, Support, Wave};
use super::{Domain, LAPLACE_VAR};

#[derive(Debug, Clone)]
struct Factor {
    base: UPoly,
    multiplicity: usize,
}

fn fail(reason: impl Into<String>) -> CircuitError {
    CircuitError::Transform {
        from: Domain::Laplace,
        to: Domain::Time,
        reason: reason.into(),
    }
}

/// Causal time signal whose unilateral Laplace transform is `f`.
pub(crate) fn inverse_laplace(f: &RatFunc) -> Result<Signal> {
    let num = UPoly::from_poly(f.numer(), LAPLACE_VAR);
    let den = UPoly::from_poly(f.denom(), LAPLACE_VAR);
    let (quotient, rem) = num
        .divrem(&den)
        .ok_or_else(|| fail("zero denominator"))?;

    let mut out = Signal::zero();
    for (k, c) in quotient.coeffs().iter().enumerate() {
        out = out.add(&Signal::impulse_derivative(c.clone(), k as u32));
    }
    if rem.is_zero() {
        return Ok(out);
    }

    let lc_inv = den
        .lc()
        .recip()
        .ok_or_else(|| fail("zero leading coefficient"))?;
    let rem = rem.scale(&lc_inv);
    let factors = factorize(&den.monic())?;
    for (numerator, factor, power) in separate(&rem, &factors)? {
        out = out.add(&elementary(&numerator, &factor, power)?);
    }
    Ok(out)
}

/// Linear and irreducible quadratic factors of a monic denominator.
fn factorize(den: &UPoly) -> Result<Vec<Factor>> {
    let var = den.var().to_string();
    let s = UPoly::monomial(&var, RatFunc::one(), 1);
    let mut factors = Vec::new();
    for (part, multiplicity) in den.square_free() {
        let mut part = part;
        if part.degree().unwrap_or(0) > 1 && part.coeff(0).is_zero() {
            factors.push(Factor {
                base: s.clone(),
                multiplicity,
            });
            part = part
                .div_exact(&s)
                .ok_or_else(|| fail("inconsistent zero root"))?;
        }
        for piece in split(&part) {
            match piece.degree() {
                None | Some(0) => {}
                Some(1) => factors.push(Factor {
                    base: piece,
                    multiplicity,
                }),
                Some(2) => factors.extend(split_quadratic(&piece, multiplicity)?),
                Some(d) => {
                    return Err(fail(format!(
                        "denominator factor {} of degree {d} has no closed-form roots",
                        piece.to_ratfunc()
                    )))
                }
            }
        }
    }
    Ok(factors)
}

/// Monic pieces of a monic square-free `part`; a piece of degree above two
/// is one no exact factor was found for.
fn split(part: &UPoly) -> Vec<UPoly> {
    if part.degree().unwrap_or(0) <= 2 {
        return vec![part.clone()];
    }
    match parameter_split(part).or_else(|| linear_root(part)) {
        Some((f, g)) => {
            let mut out = split(&f);
            out.extend(split(&g));
            out
        }
        None => vec![part.clone()],
    }
}

/// Splits off the content of the cleared numerator with respect to one of
/// the parameters.
fn parameter_split(part: &UPoly) -> Option<(UPoly, UPoly)> {
    let var = part.var();
    let cleared = part.to_ratfunc();
    let p = cleared.numer();
    let degree = p.degree_in(var);
    for x in p.vars().iter().filter(|x| x.as_str() != var) {
        let content = p.content_in(x);
        let d = content.degree_in(var);
        if d > 0 && d < degree {
            let f = UPoly::from_poly(&content, var).monic();
            let g = part.div_exact(&f)?;
            return Some((f, g));
        }
    }
    None
}

/// Splits off `var - r` for the first exact root among the candidates.
fn linear_root(part: &UPoly) -> Option<(UPoly, UPoly)> {
    root_candidates(part).into_iter().find_map(|r| {
        let factor = UPoly::new(part.var(), vec![-r, RatFunc::one()]);
        part.div_exact(&factor).map(|rest| (factor, rest))
    })
}

const MAX_ROOT_CANDIDATES: usize = 512;
const MAX_DIVISOR_SEARCH: u64 = 1_000_000_000_000;

/// `±(p·m₁)/(q·m₂)` with `p·m₁` dividing the constant term and `q·m₂` the
/// leading term of the cleared numerator. Needs both terms to be single real
/// monomials.
fn root_candidates(part: &UPoly) -> Vec<RatFunc> {
    let var = part.var();
    let cleared = part.to_ratfunc();
    let p = cleared.numer();
    if !p.is_real() {
        return Vec::new();
    }
    let coeffs = p.coeffs_in(var);
    let (Some(low), Some(high)) = (coeffs.first(), coeffs.last()) else {
        return Vec::new();
    };
    let (Some((m0, c0)), Some((mn, cn))) = (single_term(low), single_term(high)) else {
        return Vec::new();
    };
    let scale = p
        .terms()
        .fold(BigInt::one(), |acc, (_, c)| acc.lcm(c.re.denom()));
    let integer = |c: &BigRational| (c * BigRational::from_integer(scale.clone())).to_integer();
    let (Some(p_divs), Some(q_divs)) = (divisors(&integer(&c0)), divisors(&integer(&cn))) else {
        return Vec::new();
    };
    let (tops, bottoms) = (monomial_divisors(&m0), monomial_divisors(&mn));

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for q in &q_divs {
        for p in &p_divs {
            for bottom in &bottoms {
                for top in &tops {
                    for sign in [-1, 1] {
                        let mut num = Poly::zero();
                        num.add_term(top.clone(), coeff_int(sign * p));
                        let mut den = Poly::zero();
                        den.add_term(bottom.clone(), coeff_int(*q));
                        let Some(r) = RatFunc::new(num, den) else {
                            continue;
                        };
                        if seen.insert(r.clone()) {
                            out.push(r);
                            if out.len() >= MAX_ROOT_CANDIDATES {
                                return out;
                            }
                        }
                    }
                }
            }
        }
    }
    out
}

fn single_term(p: &Poly) -> Option<(Monomial, BigRational)> {
    if p.term_count() != 1 {
        return None;
    }
    p.terms().next().map(|(m, c)| (m.clone(), c.re.clone()))
}

/// Positive divisors of `|n|` in increasing order; `None` past the search
/// bound or for zero.
fn divisors(n: &BigInt) -> Option<Vec<i64>> {
    let n = n.abs().to_u64().filter(|&n| n > 0 && n <= MAX_DIVISOR_SEARCH)?;
    let mut low = Vec::new();
    let mut high = Vec::new();
    let mut d = 1;
    while d * d <= n {
        if n % d == 0 {
            low.push(i64::try_from(d).ok()?);
            if d * d != n {
                high.push(i64::try_from(n / d).ok()?);
            }
        }
        d += 1;
    }
    low.extend(high.into_iter().rev());
    Some(low)
}

fn monomial_divisors(m: &Monomial) -> Vec<Monomial> {
    let mut out = vec![Monomial::one()];
    for (v, e) in m.factors() {
        out = out
            .iter()
            .flat_map(|d| (0..=e).map(move |k| d.mul(&Monomial::var(v, k))))
            .collect();
    }
    out
}

/// `s² + b s + c` as two linear factors when its roots are exact, otherwise as
/// a single real irreducible quadratic.
fn split_quadratic(q: &UPoly, multiplicity: usize) -> Result<Vec<Factor>> {
    let var = q.var();
    let (b, c) = (q.coeff(1), q.coeff(0));
    let disc = &(&b * &b) - &(&RatFunc::integer(4) * &c);
    let real_coeffs = b.is_real() && c.is_real();
    if let Some(root) = disc.sqrt() {
        if root.is_real() || !real_coeffs {
            let half = RatFunc::rational(1, 2);
            let roots = [
                &(&(-&b) + &root) * &half,
                &(&(-&b) - &root) * &half,
            ];
            return Ok(roots
                .into_iter()
                .map(|r| Factor {
                    base: UPoly::new(var, vec![-r, RatFunc::one()]),
                    multiplicity,
                })
                .collect());
        }
    }
    if !real_coeffs {
        return Err(fail(format!("cannot factor {}", q.to_ratfunc())));
    }
    if multiplicity > 1 {
        return Err(fail(format!(
            "repeated quadratic factor ({})^{multiplicity}",
            q.to_ratfunc()
        )));
    }
    Ok(vec![Factor {
        base: q.clone(),
        multiplicity,
    }])
}

/// Splits `rem / Π Fᵢ^mᵢ` into `Σ Aᵢⱼ / Fᵢ^j` with `deg Aᵢⱼ < deg Fᵢ`.
fn separate(rem: &UPoly, factors: &[Factor]) -> Result<Vec<(UPoly, UPoly, usize)>> {
    let powers: Vec<UPoly> = factors
        .iter()
        .map(|f| f.base.pow(f.multiplicity))
        .collect();
    let mut pieces = Vec::new();
    let mut numerator = rem.clone();
    for (i, factor) in factors.iter().enumerate() {
        let g = &powers[i];
        let block = if i + 1 == factors.len() {
            numerator.clone()
        } else {
            let h = powers[i + 1..]
                .iter()
                .fold(UPoly::constant(rem.var(), RatFunc::one()), |acc, p| acc.mul(p));
            let (gcd, _, v) = UPoly::ext_gcd(g, &h);
            if gcd.degree() != Some(0) {
                return Err(fail("denominator factors are not coprime"));
            }
            let (_, a) = numerator
                .mul(&v)
                .divrem(g)
                .ok_or_else(|| fail("zero factor"))?;
            numerator = numerator
                .sub(&a.mul(&h))
                .div_exact(g)
                .ok_or_else(|| fail("partial fraction separation failed"))?;
            a
        };
        // Expand the block in base F: block = Σ dⱼ F^j.
        let mut rest = block;
        for j in 0..factor.multiplicity {
            let (q, digit) = rest
                .divrem(&factor.base)
                .ok_or_else(|| fail("zero factor"))?;
            if !digit.is_zero() {
                pieces.push((digit, factor.base.clone(), factor.multiplicity - j));
            }
            rest = q;
        }
    }
    Ok(pieces)
}

/// Inverse transform of `numerator / factor^power`.
fn elementary(numerator: &UPoly, factor: &UPoly, power: usize) -> Result<Signal> {
    match factor.degree() {
        Some(1) => {
            let root = -factor.coeff(0);
            let mut factorial = RatFunc::one();
            for k in 1..power {
                factorial = &factorial * &RatFunc::integer(k as i64);
            }
            let c = numerator
                .coeff(0)
                .checked_div(&factorial)
                .ok_or_else(|| fail("zero factorial"))?;
            let exponent = u32::try_from(power - 1).map_err(|_| fail("pole order overflow"))?;
            Ok(Signal::term(c, exponent, root, Wave::One, Support::Causal))
        }
        Some(2) if power == 1 => {
            let (b, c) = (factor.coeff(1), factor.coeff(0));
            let rate = &b * &RatFunc::rational(-1, 2);
            let w2 = &c - &(&rate * &rate);
            let alpha = numerator.coeff(1);
            let beta = numerator.coeff(0);
            let sine = &beta + &(&alpha * &rate);
            Ok(Signal::term(alpha, 0, rate.clone(), Wave::Cos(w2.clone()), Support::Causal)
                .add(&Signal::term(sine, 0, rate, Wave::SinOverOmega(w2), Support::Causal)))
        }
        _ => Err(fail(format!(
            "unsupported factor ({})^{power}",
            factor.to_ratfunc()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rf(text: &str) -> RatFunc {
        text.parse().unwrap()
    }

    #[test]
    fn distinct_real_poles() {
        let x = inverse_laplace(&rf("1/((s + 1)*(s + 2))")).unwrap();
        let expected =
            Signal::exponential(rf("1"), rf("-1")).add(&Signal::exponential(rf("-1"), rf("-2")));
        assert_eq!(x, expected);
    }

    #[test]
    fn improper_fraction_yields_impulses() {
        let x = inverse_laplace(&rf("(s + 3)/(s + 1)")).unwrap();
        let expected = Signal::impulse(rf("1")).add(&Signal::exponential(rf("2"), rf("-1")));
        assert_eq!(x, expected);
    }

    #[test]
    fn underdamped_pair_becomes_damped_sinusoid() {
        let x = inverse_laplace(&rf("1/(s^2 + 2*s + 5)")).unwrap();
        let expected = Signal::term(
            rf("1"),
            0,
            rf("-1"),
            Wave::SinOverOmega(rf("4")),
            Support::Causal,
        );
        assert_eq!(x, expected);
    }

    #[test]
    fn symbolic_rlc_keeps_general_quadratic() {
        // 1/(L C s^2 + R C s + 1) does not factor over the rationals in R, L, C.
        let x = inverse_laplace(&rf("1/(L*C*s^2 + R*C*s + 1)")).unwrap();
        assert_eq!(x.terms().count(), 1);
    }

    fn pole_count(x: &Signal) -> usize {
        x.terms().count()
    }

    #[test]
    fn numeric_cubic_splits_by_rational_roots() {
        let x = inverse_laplace(&rf("1/((s + 1)*(s + 2)*(s + 3))")).unwrap();
        let expected = Signal::exponential(rf("1/2"), rf("-1"))
            .add(&Signal::exponential(rf("-1"), rf("-2")))
            .add(&Signal::exponential(rf("1/2"), rf("-3")));
        assert_eq!(x, expected);
    }

    #[test]
    fn quartic_with_zero_root() {
        let x = inverse_laplace(&rf("6/(s^4 + 6*s^3 + 11*s^2 + 6*s)")).unwrap();
        let expected = Signal::step(rf("1"))
            .add(&Signal::exponential(rf("-3"), rf("-1")))
            .add(&Signal::exponential(rf("3"), rf("-2")))
            .add(&Signal::exponential(rf("-1"), rf("-3")));
        assert_eq!(x, expected);
    }

    #[test]
    fn symbolic_cubic_splits_along_parameters() {
        let x = inverse_laplace(&rf("1/((s + a)*(s + b)*(s + c))")).unwrap();
        assert_eq!(pole_count(&x), 3);
        let a_term = rf("1/((b - a)*(c - a))");
        assert!(x.terms().any(|(_, coeff)| *coeff == a_term));
    }

    #[test]
    fn monomial_roots_are_found() {
        // Every root is a multiple of a, so no parameter splits the cubic.
        let x = inverse_laplace(&rf("1/((s + a)*(s + 2*a)*(s + 3*a))")).unwrap();
        assert_eq!(pole_count(&x), 3);
    }

    #[test]
    fn driven_rl_denominator_splits() {
        // cos(3t) into a series RL: s/((s^2 + 9)(L s + R)).
        let x = inverse_laplace(&rf("s/((s^2 + 9)*(L*s + R))")).unwrap();
        assert_eq!(pole_count(&x), 3);
        let decay = rf("-R/(R^2 + 9*L^2)");
        assert!(x.terms().any(|(_, coeff)| *coeff == decay));
    }

    #[test]
    fn cubic_without_exact_roots_is_rejected() {
        let err = inverse_laplace(&rf("1/(s^3 + s + 1)")).unwrap_err();
        assert!(matches!(err, CircuitError::Transform { .. }));
    }
}
