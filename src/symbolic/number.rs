//! Exact Gaussian-rational coefficients.
//!
//! Every polynomial coefficient is a `Complex<BigRational>`, which keeps the
//! imaginary unit exact so that `s = jω` substitutions and phasor algebra never
//! fall back to floating point.

use num_bigint::BigInt;
use num_complex::Complex;
use num_integer::Roots;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::math::CScalar;

/// Exact complex rational coefficient.
pub type Coeff = Complex<BigRational>;

/// Integer coefficient.
#[must_use]
pub fn coeff_int(n: i64) -> Coeff {
    Complex::new(BigRational::from_integer(BigInt::from(n)), BigRational::zero())
}

/// Real rational coefficient.
#[must_use]
pub fn coeff_real(r: BigRational) -> Coeff {
    Complex::new(r, BigRational::zero())
}

/// The imaginary unit `j`.
#[must_use]
pub fn imaginary_unit() -> Coeff {
    Complex::new(BigRational::zero(), BigRational::one())
}

/// Multiplicative inverse, `None` for zero.
#[must_use]
pub fn coeff_inverse(c: &Coeff) -> Option<Coeff> {
    if c.is_zero() {
        None
    } else {
        Some(Coeff::one() / c)
    }
}

/// True when the coefficient has no imaginary part.
#[must_use]
pub fn is_real(c: &Coeff) -> bool {
    c.im.is_zero()
}

/// Canonical "positive" orientation used to pick one of `±c`.
#[must_use]
pub fn is_positive_oriented(c: &Coeff) -> bool {
    c.re.is_positive() || (c.re.is_zero() && !c.im.is_negative())
}

fn ratio_to_f64(r: &BigRational) -> f64 {
    match (r.numer().to_f64(), r.denom().to_f64()) {
        (Some(n), Some(d)) => n / d,
        _ => f64::NAN,
    }
}

/// Lossy conversion for numeric evaluation.
#[must_use]
pub fn to_complex64(c: &Coeff) -> CScalar {
    CScalar::new(ratio_to_f64(&c.re), ratio_to_f64(&c.im))
}

/// Exact square root of a non-negative rational, when it exists.
#[must_use]
pub fn rational_sqrt(r: &BigRational) -> Option<BigRational> {
    if r.is_negative() {
        return None;
    }
    let n = r.numer().sqrt();
    let d = r.denom().sqrt();
    if &(&n * &n) == r.numer() && &(&d * &d) == r.denom() {
        Some(BigRational::new(n, d))
    } else {
        None
    }
}

/// Exact square root of a Gaussian rational, when it exists.
///
/// For `a + bj` with `b != 0` the root `p + qj` satisfies `p² = (a + |z|)/2`
/// and `q = b / 2p`.
#[must_use]
pub fn coeff_sqrt(c: &Coeff) -> Option<Coeff> {
    if c.im.is_zero() {
        if c.re.is_negative() {
            let r = rational_sqrt(&-c.re.clone())?;
            return Some(Complex::new(BigRational::zero(), r));
        }
        return rational_sqrt(&c.re).map(coeff_real);
    }
    let modulus = rational_sqrt(&(&c.re * &c.re + &c.im * &c.im))?;
    let two = BigRational::from_integer(BigInt::from(2));
    let p = rational_sqrt(&((&c.re + &modulus) / &two))?;
    if p.is_zero() {
        return None;
    }
    let q = &c.im / (&two * &p);
    Some(Complex::new(p, q))
}

/// Parses an unsigned decimal literal such as `12`, `1.5`, `2e-3` exactly.
#[must_use]
pub fn parse_decimal(text: &str) -> Option<BigRational> {
    let (mantissa, exponent) = match text.find(|ch: char| ch == 'e' || ch == 'E') {
        Some(idx) => (&text[..idx], text[idx + 1..].parse::<i32>().ok()?),
        None => (text, 0),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let digits = format!("{int_part}{frac_part}");
    if !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    let numer: BigInt = digits.parse().ok()?;
    let scale = exponent - i32::try_from(frac_part.len()).ok()?;
    let ten = BigInt::from(10);
    let value = if scale >= 0 {
        BigRational::from_integer(numer * num_traits::pow(ten, scale.unsigned_abs() as usize))
    } else {
        BigRational::new(numer, num_traits::pow(ten, scale.unsigned_abs() as usize))
    };
    Some(value)
}

/// Human-readable coefficient (`3/2`, `-j`, `(1 + 2*j)`).
#[must_use]
pub fn fmt_coeff(c: &Coeff) -> String {
    if c.im.is_zero() {
        return c.re.to_string();
    }
    let imag = if c.im.is_one() {
        "j".to_string()
    } else if (-c.im.clone()).is_one() {
        "-j".to_string()
    } else {
        format!("{}*j", c.im)
    };
    if c.re.is_zero() {
        imag
    } else if imag.starts_with('-') {
        format!("({} - {})", c.re, &imag[1..])
    } else {
        format!("({} + {})", c.re, imag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_literals_are_exact() {
        let v = parse_decimal("1.25").unwrap();
        assert_eq!(v, BigRational::new(BigInt::from(5), BigInt::from(4)));
        let w = parse_decimal("2e-3").unwrap();
        assert_eq!(w, BigRational::new(BigInt::from(1), BigInt::from(500)));
        assert!(parse_decimal("1.2.3").is_none());
    }

    #[test]
    fn gaussian_square_roots() {
        let minus_sixteen = coeff_int(-16);
        assert_eq!(coeff_sqrt(&minus_sixteen), Some(Complex::new(BigRational::zero(), BigRational::from_integer(4.into()))));
        // (1 + 2j)^2 = -3 + 4j
        let z = Complex::new(BigRational::from_integer((-3).into()), BigRational::from_integer(4.into()));
        let root = coeff_sqrt(&z).unwrap();
        assert_eq!(&root * &root, z);
        assert!(coeff_sqrt(&coeff_int(2)).is_none());
    }

    #[test]
    fn coefficient_display() {
        assert_eq!(fmt_coeff(&coeff_int(3)), "3");
        assert_eq!(fmt_coeff(&imaginary_unit()), "j");
        assert_eq!(fmt_coeff(&(coeff_int(1) - imaginary_unit())), "(1 - j)");
    }
}
