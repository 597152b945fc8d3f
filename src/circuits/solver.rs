//! Exact linear solvers over rational functions.
//!
//! Each row of `[A | b]` is first multiplied by the least common multiple of
//! its denominators, so both methods below work in the polynomial ring and
//! build a rational function only once per unknown:
//!
//! - [`AdjugateSolver`]: `x = adj(A)·b / det(A)` with cofactor expansion.
//! - [`GaussianSolver`]: fraction-free (Bareiss) elimination pivoting on
//!   term count rather than numeric magnitude.
//!
//! Results are canonical [`RatFunc`]s, so when both methods succeed on the
//! same system they compare equal.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::symbolic::{Poly, RatFunc};

/// Default largest system solved with the adjugate method under
/// [`SolverStrategy::Auto`].
pub const DEFAULT_ADJUGATE_LIMIT: usize = 4;

/// Error types for linear solvers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    /// No unique solution. `columns` lists the unknowns that could not be
    /// eliminated.
    Singular {
        /// Unknown indices left without a pivot.
        columns: Vec<usize>,
    },
    /// Matrix and right-hand side do not agree in size.
    Dimension {
        /// Matrix shape.
        matrix: (usize, usize),
        /// Right-hand-side length.
        rhs: usize,
    },
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singular { columns } => write!(f, "matrix is singular in columns {columns:?}"),
            Self::Dimension { matrix, rhs } => {
                write!(f, "{}x{} matrix with right-hand side of length {rhs}", matrix.0, matrix.1)
            }
        }
    }
}

impl std::error::Error for SolverError {}

/// Solver selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverStrategy {
    /// Adjugate up to the configured size, Gaussian elimination above.
    #[default]
    Auto,
    /// Always the adjugate method.
    Adjugate,
    /// Always Gaussian elimination.
    Gaussian,
}

impl SolverStrategy {
    /// Concrete solver for a system of `size` unknowns.
    #[must_use]
    pub fn select(self, size: usize, adjugate_limit: usize) -> &'static dyn LinearSolver {
        match self {
            Self::Adjugate => &AdjugateSolver,
            Self::Gaussian => &GaussianSolver,
            Self::Auto if size <= adjugate_limit => &AdjugateSolver,
            Self::Auto => &GaussianSolver,
        }
    }
}

/// Trait for exact solvers of `A x = b`.
pub trait LinearSolver: Send + Sync {
    /// Solves the system.
    fn solve(&self, a: &DMatrix<RatFunc>, b: &DVector<RatFunc>) -> Result<DVector<RatFunc>, SolverError>;

    /// Returns solver name for logging.
    fn name(&self) -> &'static str;
}

fn check_shape(a: &DMatrix<RatFunc>, b: &DVector<RatFunc>) -> Result<(), SolverError> {
    if a.nrows() != a.ncols() || a.nrows() != b.len() {
        return Err(SolverError::Dimension {
            matrix: a.shape(),
            rhs: b.len(),
        });
    }
    Ok(())
}

fn lcm(p: &Poly, q: &Poly) -> Poly {
    let g = Poly::gcd(p, q);
    match q.div_exact(&g) {
        Some(rest) => p.mul(&rest),
        None => p.mul(q),
    }
}

/// `[A | b]` with every row scaled to polynomial entries.
#[derive(Debug, Clone)]
struct PolySystem {
    m: Vec<Vec<Poly>>,
    rhs: Vec<Poly>,
    /// Factor each row was multiplied by.
    scales: Vec<Poly>,
}

impl PolySystem {
    fn clear(a: &DMatrix<RatFunc>, b: &DVector<RatFunc>) -> Self {
        let n = a.nrows();
        let mut m = Vec::with_capacity(n);
        let mut rhs = Vec::with_capacity(n);
        let mut scales = Vec::with_capacity(n);
        for i in 0..n {
            let row: Vec<&RatFunc> = (0..a.ncols()).map(|j| &a[(i, j)]).chain([&b[i]]).collect();
            let scale = row
                .iter()
                .filter(|x| !x.is_zero())
                .fold(Poly::one(), |acc, x| lcm(&acc, x.denom()));
            let mut lifted: Vec<Poly> = row.iter().map(|x| lift(x, &scale)).collect();
            rhs.push(lifted.pop().unwrap_or_else(Poly::zero));
            m.push(lifted);
            scales.push(scale);
        }
        Self { m, rhs, scales }
    }
}

/// `x * scale` as a polynomial; `scale` is a multiple of the denominator.
fn lift(x: &RatFunc, scale: &Poly) -> Poly {
    if x.is_zero() {
        return Poly::zero();
    }
    match scale.div_exact(x.denom()) {
        Some(q) => x.numer().mul(&q),
        None => x.numer().mul(scale),
    }
}

/// Determinant by Laplace expansion along the first row of the submatrix
/// selected by `rows` and `cols`.
fn minor(m: &[Vec<Poly>], rows: &[usize], cols: &[usize]) -> Poly {
    match rows.len() {
        0 => Poly::one(),
        1 => m[rows[0]][cols[0]].clone(),
        2 => {
            let p = m[rows[0]][cols[0]].mul(&m[rows[1]][cols[1]]);
            let q = m[rows[0]][cols[1]].mul(&m[rows[1]][cols[0]]);
            p.sub(&q)
        }
        _ => {
            let (head, tail) = (rows[0], &rows[1..]);
            let mut det = Poly::zero();
            for (j, &c) in cols.iter().enumerate() {
                let entry = &m[head][c];
                if entry.is_zero() {
                    continue;
                }
                let rest: Vec<usize> = cols.iter().copied().filter(|&x| x != c).collect();
                let term = entry.mul(&minor(m, tail, &rest));
                det = if j % 2 == 0 { det.add(&term) } else { det.sub(&term) };
            }
            det
        }
    }
}

/// Classical adjoint (cofactor) method.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdjugateSolver;

impl AdjugateSolver {
    /// Determinant of a square matrix.
    #[must_use]
    pub fn determinant(a: &DMatrix<RatFunc>) -> RatFunc {
        let zero = DVector::from_element(a.nrows(), RatFunc::zero());
        let sys = PolySystem::clear(a, &zero);
        let idx: Vec<usize> = (0..a.nrows()).collect();
        let scale = sys.scales.iter().fold(Poly::one(), |acc, s| acc.mul(s));
        RatFunc::new(minor(&sys.m, &idx, &idx), scale).unwrap_or_else(RatFunc::zero)
    }

    /// Cofactor `C_ij = (-1)^(i+j) M_ij`.
    fn cofactor(m: &[Vec<Poly>], i: usize, j: usize) -> Poly {
        let n = m.len();
        let rows: Vec<usize> = (0..n).filter(|&r| r != i).collect();
        let cols: Vec<usize> = (0..n).filter(|&c| c != j).collect();
        let minor = minor(m, &rows, &cols);
        if (i + j) % 2 == 0 {
            minor
        } else {
            minor.neg()
        }
    }
}

impl LinearSolver for AdjugateSolver {
    fn solve(&self, a: &DMatrix<RatFunc>, b: &DVector<RatFunc>) -> Result<DVector<RatFunc>, SolverError> {
        check_shape(a, b)?;
        let n = a.nrows();
        let sys = PolySystem::clear(a, b);
        let idx: Vec<usize> = (0..n).collect();
        let det = minor(&sys.m, &idx, &idx);
        if det.is_zero() {
            // Elimination pinpoints which unknowns are undetermined.
            return match GaussianSolver.solve(a, b) {
                Err(e) => Err(e),
                Ok(_) => Err(SolverError::Singular {
                    columns: (0..n).collect(),
                }),
            };
        }
        let mut x = DVector::from_element(n, RatFunc::zero());
        for i in 0..n {
            // x_i = Σ_j adj(A)_ij b_j with adj(A)_ij = C_ji.
            let mut acc = Poly::zero();
            for (j, bj) in sys.rhs.iter().enumerate() {
                if bj.is_zero() {
                    continue;
                }
                acc = acc.add(&Self::cofactor(&sys.m, j, i).mul(bj));
            }
            x[i] = RatFunc::new(acc, det.clone()).ok_or_else(|| SolverError::Singular {
                columns: vec![i],
            })?;
        }
        Ok(x)
    }

    fn name(&self) -> &'static str {
        "adjugate"
    }
}

/// Fraction-free Gaussian elimination with term-count pivoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianSolver;

impl LinearSolver for GaussianSolver {
    fn solve(&self, a: &DMatrix<RatFunc>, b: &DVector<RatFunc>) -> Result<DVector<RatFunc>, SolverError> {
        check_shape(a, b)?;
        let n = a.nrows();
        let PolySystem { mut m, mut rhs, .. } = PolySystem::clear(a, b);
        let mut unresolved = Vec::new();
        let mut prev = Poly::one();
        let mut row = 0;

        for col in 0..n {
            let pivot = (row..n)
                .filter(|&r| !m[r][col].is_zero())
                .min_by_key(|&r| m[r][col].term_count());
            let Some(p) = pivot else {
                unresolved.push(col);
                continue;
            };
            m.swap(row, p);
            rhs.swap(row, p);
            let lead = m[row][col].clone();
            // Every update is a minor of the scaled matrix, so dividing by
            // the previous pivot is exact.
            let exact = |v: Poly, prev: &Poly| {
                v.div_exact(prev)
                    .ok_or_else(|| SolverError::Singular { columns: vec![col] })
            };
            for r in (row + 1)..n {
                let factor = std::mem::replace(&mut m[r][col], Poly::zero());
                for c in (col + 1)..n {
                    let v = lead.mul(&m[r][c]).sub(&factor.mul(&m[row][c]));
                    m[r][c] = exact(v, &prev)?;
                }
                let v = lead.mul(&rhs[r]).sub(&factor.mul(&rhs[row]));
                rhs[r] = exact(v, &prev)?;
            }
            prev = lead;
            row += 1;
        }
        if !unresolved.is_empty() {
            return Err(SolverError::Singular { columns: unresolved });
        }

        // With d the last pivot, y = d·x is polynomial and the triangular
        // rows give it by exact division.
        let d = prev;
        let mut y = vec![Poly::zero(); n];
        for i in (0..n).rev() {
            let mut acc = d.mul(&rhs[i]);
            for c in (i + 1)..n {
                if !m[i][c].is_zero() {
                    acc = acc.sub(&m[i][c].mul(&y[c]));
                }
            }
            y[i] = acc
                .div_exact(&m[i][i])
                .ok_or_else(|| SolverError::Singular { columns: vec![i] })?;
        }
        let mut x = DVector::from_element(n, RatFunc::zero());
        for (i, yi) in y.into_iter().enumerate() {
            x[i] = RatFunc::new(yi, d.clone()).ok_or_else(|| SolverError::Singular {
                columns: vec![i],
            })?;
        }
        Ok(x)
    }

    fn name(&self) -> &'static str {
        "gaussian"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rf(text: &str) -> RatFunc {
        text.parse().unwrap()
    }

    fn matrix(n: usize, entries: &[&str]) -> DMatrix<RatFunc> {
        DMatrix::from_row_iterator(n, n, entries.iter().map(|e| rf(e)))
    }

    fn vector(entries: &[&str]) -> DVector<RatFunc> {
        DVector::from_iterator(entries.len(), entries.iter().map(|e| rf(e)))
    }

    #[test]
    fn determinant_by_cofactors() {
        let a = matrix(3, &["a", "0", "0", "0", "b", "c", "0", "d", "e"]);
        assert_eq!(AdjugateSolver::determinant(&a), rf("a*(b*e - c*d)"));
    }

    #[test]
    fn methods_agree_on_symbolic_system() {
        let a = matrix(3, &["1/R1 + 1/R2", "-1/R2", "1", "-1/R2", "1/R2 + s*C", "0", "1", "0", "0"]);
        let b = vector(&["0", "0", "V"]);
        let x1 = AdjugateSolver.solve(&a, &b).unwrap();
        let x2 = GaussianSolver.solve(&a, &b).unwrap();
        assert_eq!(x1, x2);
        assert_eq!(x1[1], rf("V/(s*C*R2 + 1)"));
    }

    #[test]
    fn methods_agree_above_adjugate_limit() {
        let a = matrix(
            5,
            &[
                "a + b", "-b", "0", "0", "0",
                "-b", "b + c", "-c", "0", "0",
                "0", "-c", "c + d", "-d", "0",
                "0", "0", "-d", "d + e", "-e",
                "0", "0", "0", "-e", "e + s*f",
            ],
        );
        let b = vector(&["V*a", "0", "0", "0", "0"]);
        assert!(a.nrows() > DEFAULT_ADJUGATE_LIMIT);
        let x1 = AdjugateSolver.solve(&a, &b).unwrap();
        let x2 = GaussianSolver.solve(&a, &b).unwrap();
        assert_eq!(x1, x2);
        for i in 0..5 {
            let mut residual = -b[i].clone();
            for j in 0..5 {
                residual = &residual + &(&a[(i, j)] * &x2[j]);
            }
            assert!(residual.is_zero(), "row {i}");
        }
    }

    #[test]
    fn elimination_swaps_past_zero_pivots() {
        let a = matrix(3, &["0", "1/R", "0", "L*s", "0", "1", "0", "0", "1/(C*s)"]);
        let b = vector(&["p", "q", "r"]);
        let x = GaussianSolver.solve(&a, &b).unwrap();
        assert_eq!(x[1], rf("p*R"));
        assert_eq!(x[2], rf("r*C*s"));
        assert_eq!(x[0], rf("(q - r*C*s)/(L*s)"));
        assert_eq!(x, AdjugateSolver.solve(&a, &b).unwrap());
    }

    #[test]
    fn determinant_of_fractional_entries() {
        let a = matrix(2, &["1/R1", "1", "1/R2", "s*C"]);
        assert_eq!(AdjugateSolver::determinant(&a), rf("s*C/R1 - 1/R2"));
    }

    #[test]
    fn singular_columns_are_reported() {
        let a = matrix(2, &["x", "x", "y", "y"]);
        let b = vector(&["1", "2"]);
        let err = GaussianSolver.solve(&a, &b).unwrap_err();
        assert_eq!(err, SolverError::Singular { columns: vec![1] });
        assert!(matches!(
            AdjugateSolver.solve(&a, &b),
            Err(SolverError::Singular { .. })
        ));
    }

    #[test]
    fn strategy_selects_by_size() {
        assert_eq!(SolverStrategy::Auto.select(3, 4).name(), "adjugate");
        assert_eq!(SolverStrategy::Auto.select(5, 4).name(), "gaussian");
        assert_eq!(SolverStrategy::Gaussian.select(1, 4).name(), "gaussian");
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let a = matrix(2, &["1", "0", "0", "1"]);
        let b = vector(&["1"]);
        assert!(matches!(
            GaussianSolver.solve(&a, &b),
            Err(SolverError::Dimension { .. })
        ));
    }
}
