use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

/// Default sweep bound of the cyclic Jacobi iteration.
pub const DEFAULT_MAX_SWEEPS: usize = 50;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JacobiError {
    #[error("Jacobi rotation did not converge after {sweeps} sweeps")]
    NotConverged { sweeps: usize },
}

/// Eigen-decomposition of a symmetric 3x3 matrix.
///
/// `vectors` holds the eigenvectors as columns, in the same order as `values`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetricEigen3 {
    pub values: Vector3<f64>,
    pub vectors: Matrix3<f64>,
}

impl SymmetricEigen3 {
    /// Reorders eigenpairs so that eigenvalues are descending.
    ///
    /// Selection sort over three elements; eigenvector columns travel with
    /// their eigenvalue.
    pub fn sorted_descending(mut self) -> Self {
        for i in 0..2 {
            let mut k = i;
            let mut p = self.values[i];
            for j in (i + 1)..3 {
                if self.values[j] > p {
                    k = j;
                    p = self.values[j];
                }
            }
            if k != i {
                self.values.swap_rows(i, k);
                self.vectors.swap_columns(i, k);
            }
        }
        self
    }
}

/// Cyclic Jacobi diagonalization of a symmetric 3x3 matrix.
///
/// Only the upper triangle of `matrix` is read. Converges when the sum of the
/// absolute off-diagonal elements reaches exactly zero; small elements are
/// flushed to zero after the fourth sweep so that this happens in practice.
pub fn jacobi(matrix: &Matrix3<f64>, max_sweeps: usize) -> Result<SymmetricEigen3, JacobiError> {
    const N: usize = 3;

    let mut a = [[0.0f64; N]; N];
    for (i, row) in a.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = matrix[(i, j)];
        }
    }
    let mut v = [[0.0f64; N]; N];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    let mut d = [a[0][0], a[1][1], a[2][2]];
    let mut b = d;
    let mut z = [0.0f64; N];

    for sweep in 1..=max_sweeps {
        let off_diagonal: f64 = (0..N - 1)
            .flat_map(|p| ((p + 1)..N).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q].abs())
            .sum();

        if off_diagonal == 0.0 {
            return Ok(SymmetricEigen3 {
                values: Vector3::new(d[0], d[1], d[2]),
                vectors: Matrix3::new(
                    v[0][0], v[0][1], v[0][2], //
                    v[1][0], v[1][1], v[1][2], //
                    v[2][0], v[2][1], v[2][2],
                ),
            });
        }

        let threshold = if sweep < 4 {
            0.2 * off_diagonal / (N * N) as f64
        } else {
            0.0
        };

        for p in 0..N - 1 {
            for q in (p + 1)..N {
                let g = 100.0 * a[p][q].abs();
                if sweep > 4 && d[p].abs() + g == d[p].abs() && d[q].abs() + g == d[q].abs() {
                    a[p][q] = 0.0;
                } else if a[p][q].abs() > threshold {
                    let h = d[q] - d[p];
                    let t = if h.abs() + g == h.abs() {
                        a[p][q] / h
                    } else {
                        let theta = 0.5 * h / a[p][q];
                        let t = 1.0 / (theta.abs() + (1.0 + theta * theta).sqrt());
                        if theta < 0.0 { -t } else { t }
                    };
                    let c = 1.0 / (1.0 + t * t).sqrt();
                    let s = t * c;
                    let tau = s / (1.0 + c);
                    let h = t * a[p][q];
                    z[p] -= h;
                    z[q] += h;
                    d[p] -= h;
                    d[q] += h;
                    a[p][q] = 0.0;

                    for j in 0..p {
                        rotate(&mut a, s, tau, (j, p), (j, q));
                    }
                    for j in (p + 1)..q {
                        rotate(&mut a, s, tau, (p, j), (j, q));
                    }
                    for j in (q + 1)..N {
                        rotate(&mut a, s, tau, (p, j), (q, j));
                    }
                    for j in 0..N {
                        rotate(&mut v, s, tau, (j, p), (j, q));
                    }
                }
            }
        }

        for p in 0..N {
            b[p] += z[p];
            d[p] = b[p];
            z[p] = 0.0;
        }
    }

    Err(JacobiError::NotConverged { sweeps: max_sweeps })
}

#[inline]
fn rotate(m: &mut [[f64; 3]; 3], s: f64, tau: f64, (i, j): (usize, usize), (k, l): (usize, usize)) {
    let g = m[i][j];
    let h = m[k][l];
    m[i][j] = g - s * (h + g * tau);
    m[k][l] = h + s * (g - h * tau);
}
