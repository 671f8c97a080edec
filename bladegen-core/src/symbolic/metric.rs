//! Metrics and their eigenbasis.
//!
//! Products under a non-diagonal metric are computed in the orthogonal
//! eigenbasis of the metric matrix. Every metric precomputes the blade
//! transforms into and out of that basis.

use super::blade;
use crate::bail_config;
use crate::error::Result;

const EIGEN_TOLERANCE: f64 = 1e-12;
const MAX_SWEEPS: usize = 64;

#[derive(Debug, Clone)]
pub struct Metric {
    pub name: String,
    /// Round symbolic results to remove numerical noise.
    pub round: bool,
    matrix: Vec<Vec<f64>>,
    eigenvalues: Vec<f64>,
    diagonal: bool,
    to_eigen: Vec<Vec<(u32, f64)>>,
    from_eigen: Vec<Vec<(u32, f64)>>,
}

impl Metric {
    pub fn euclidean(name: &str, dimension: usize) -> Self {
        Metric::from_diagonal(name, &vec![1.0; dimension])
    }

    pub fn from_diagonal(name: &str, diagonal: &[f64]) -> Self {
        let n = diagonal.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for (i, d) in diagonal.iter().enumerate() {
            matrix[i][i] = *d;
        }
        Metric {
            name: name.to_string(),
            round: false,
            matrix,
            eigenvalues: diagonal.to_vec(),
            diagonal: true,
            to_eigen: Vec::new(),
            from_eigen: Vec::new(),
        }
    }

    pub fn from_matrix(name: &str, matrix: Vec<Vec<f64>>, round: bool) -> Result<Self> {
        let n = matrix.len();
        for (i, row) in matrix.iter().enumerate() {
            if row.len() != n {
                bail_config!("metric '{}' is not square (row {} has {} entries)", name, i, row.len());
            }
            for (j, v) in row.iter().enumerate() {
                if (v - matrix[j][i]).abs() > EIGEN_TOLERANCE {
                    bail_config!("metric '{}' is not symmetric at ({}, {})", name, i, j);
                }
            }
        }

        let is_diagonal = (0..n).all(|i| (0..n).all(|j| i == j || matrix[i][j] == 0.0));
        if is_diagonal {
            let diag: Vec<f64> = (0..n).map(|i| matrix[i][i]).collect();
            let mut metric = Metric::from_diagonal(name, &diag);
            metric.round = round;
            return Ok(metric);
        }

        let (eigenvalues, vectors) = jacobi_eigen(&matrix);
        let blades = 1u32 << n;
        // e_i = sum_j V[i][j] f_j, f_j = sum_i V[i][j] e_i
        let to_eigen = (0..blades)
            .map(|b| transform_blade(b, n, |i, j| vectors[i][j]))
            .collect();
        let from_eigen = (0..blades)
            .map(|b| transform_blade(b, n, |j, i| vectors[i][j]))
            .collect();

        Ok(Metric {
            name: name.to_string(),
            round,
            matrix,
            eigenvalues,
            diagonal: false,
            to_eigen,
            from_eigen,
        })
    }

    pub fn dimension(&self) -> usize {
        self.matrix.len()
    }

    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.matrix
    }

    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    pub fn is_diagonal(&self) -> bool {
        self.diagonal
    }

    pub fn is_degenerate(&self) -> bool {
        self.eigenvalues.iter().any(|v| v.abs() < EIGEN_TOLERANCE)
    }

    pub fn is_positive_definite(&self) -> bool {
        self.eigenvalues.iter().all(|v| *v > EIGEN_TOLERANCE)
    }

    pub fn inner(&self, i: usize, j: usize) -> f64 {
        self.matrix[i][j]
    }

    pub(crate) fn to_eigenbasis(&self, bitmap: u32) -> &[(u32, f64)] {
        &self.to_eigen[bitmap as usize]
    }

    pub(crate) fn from_eigenbasis(&self, bitmap: u32) -> &[(u32, f64)] {
        &self.from_eigen[bitmap as usize]
    }
}

/// Express basis blade `bitmap` in another basis where vector `i` maps to
/// `sum_j coeff(i, j) * target_j`.
fn transform_blade(bitmap: u32, n: usize, coeff: impl Fn(usize, usize) -> f64) -> Vec<(u32, f64)> {
    let mut acc = vec![(0u32, 1.0)];
    for i in 0..n {
        if bitmap & (1 << i) == 0 {
            continue;
        }
        let vector: Vec<(u32, f64)> = (0..n)
            .map(|j| (1u32 << j, coeff(i, j)))
            .filter(|(_, c)| *c != 0.0)
            .collect();
        acc = blade::outer_numeric(&acc, &vector);
    }
    acc.retain(|(_, c)| c.abs() > 1e-15);
    acc
}

/// Cyclic Jacobi eigendecomposition of a symmetric matrix. Returns the
/// eigenvalues and a matrix whose columns are the matching eigenvectors.
pub fn jacobi_eigen(matrix: &[Vec<f64>]) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = matrix.len();
    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut v = vec![vec![0.0; n]; n];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |j| *j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[i][j] * a[i][j])
            .sum();
        if off < 1e-30 {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                if a[p][q].abs() < 1e-300 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for k in 0..n {
                    let akp = a[k][p];
                    let akq = a[k][q];
                    a[k][p] = c * akp - s * akq;
                    a[k][q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[p][k];
                    let aqk = a[q][k];
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let vkp = row[p];
                    let vkq = row[q];
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let values = (0..n).map(|i| a[i][i]).collect();
    (values, v)
}
