//! Numeric scalar types used when symbolic results are evaluated.

use std::collections::HashMap;

/// Primary scalar type used across the crate.
pub type Scalar = f64;
/// Primary complex scalar type used for phasors and numeric evaluation.
pub type CScalar = num_complex::Complex<Scalar>;

/// Returns the complex exponential `e^(j * theta)` using `Scalar` precision.
#[must_use]
pub fn phasor(theta: Scalar) -> CScalar {
    CScalar::from_polar(1.0, theta)
}

/// Builds a symbol binding table from `(name, value)` pairs of real numbers.
#[must_use]
pub fn bindings<'a>(pairs: impl IntoIterator<Item = (&'a str, Scalar)>) -> HashMap<String, CScalar> {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), CScalar::new(value, 0.0)))
        .collect()
}

/// Magnitude in decibels (`20 log10 |h|`).
#[must_use]
pub fn mag_db(h: CScalar) -> Scalar {
    20.0 * h.norm().log10()
}

/// Phase in degrees.
#[must_use]
pub fn phase_deg(h: CScalar) -> Scalar {
    h.arg().to_degrees()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn phasor_has_unit_modulus() {
        let p = phasor(0.3);
        assert_relative_eq!(p.norm(), 1.0, epsilon = 1.0e-12);
        assert_relative_eq!(phase_deg(phasor(std::f64::consts::FRAC_PI_2)), 90.0, epsilon = 1.0e-9);
    }

    #[test]
    fn decibels_of_a_tenfold_gain() {
        assert_relative_eq!(mag_db(CScalar::new(10.0, 0.0)), 20.0, epsilon = 1.0e-12);
        let b = bindings([("R", 2.0)]);
        assert_eq!(b["R"], CScalar::new(2.0, 0.0));
    }
}
