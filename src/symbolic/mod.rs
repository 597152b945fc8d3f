//! Exact symbolic algebra backing every circuit quantity.
//!
//! Values are rational functions over Gaussian rationals, kept in a canonical
//! form so that algebraic equality is structural equality.

/// Exact complex-rational coefficients.
pub mod number;
/// Formula parser.
pub mod parse;
/// Sparse multivariate polynomials.
pub mod poly;
/// Canonical rational functions.
pub mod ratfunc;
/// Univariate polynomials over rational functions.
pub mod upoly;

pub use number::{coeff_int, coeff_real, imaginary_unit, to_complex64, Coeff};
pub use parse::parse_formula;
pub use poly::{Monomial, Poly};
pub use ratfunc::RatFunc;
pub use upoly::UPoly;
