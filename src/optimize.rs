//! Shared numeric kernels for portfolio construction: sample covariance,
//! dense matrix-vector algebra, and a dependency-free smallest-eigenvalue
//! estimate used to detect near-singular covariance matrices.
//!
//! No linear-algebra crate is used; everything here is a small, explicit
//! routine over `Vec<Vec<f64>>`. [`crate::portfolio::strategy`] builds on
//! these kernels with projected-gradient / damped fixed-point solvers
//! generalized to caller-supplied [`crate::portfolio::constraints::Constraints`].

pub(crate) fn column_means(matrix: &[Vec<f64>]) -> Vec<f64> {
    let rows = matrix.len();
    let cols = matrix[0].len();

    let mut sums = vec![0.0; cols];
    for row in matrix {
        for (j, v) in row.iter().enumerate() {
            sums[j] += *v;
        }
    }

    sums.into_iter().map(|s| s / rows as f64).collect()
}

pub(crate) fn covariance_matrix(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let rows = matrix.len();
    let cols = matrix[0].len();
    let means = column_means(matrix);

    let mut cov = vec![vec![0.0; cols]; cols];

    for row in matrix {
        for i in 0..cols {
            let di = row[i] - means[i];
            for j in i..cols {
                let dj = row[j] - means[j];
                cov[i][j] += di * dj;
            }
        }
    }

    let denom = (rows as f64 - 1.0).max(1.0);
    for i in 0..cols {
        for j in i..cols {
            let v = cov[i][j] / denom;
            cov[i][j] = v;
            cov[j][i] = v;
        }
        // Small ridge for numerical stability.
        cov[i][i] += 1e-10;
    }

    cov
}

pub(crate) fn mat_vec_mul(matrix: &[Vec<f64>], vec: &[f64]) -> Vec<f64> {
    matrix
        .iter()
        .map(|row| row.iter().zip(vec).map(|(a, b)| a * b).sum::<f64>())
        .collect()
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
}

/// Estimate of Σ's smallest eigenvalue via shifted power iteration.
///
/// Power iteration on `shift * I - Σ` (shift chosen past Σ's largest
/// eigenvalue via the Gershgorin circle bound) converges to the
/// eigenvector of Σ's *smallest* eigenvalue; the Rayleigh quotient at
/// that vector then recovers the eigenvalue itself. Cheap and adequate
/// for the near-singularity check callers use this for — not a general
/// eigensolver.
pub(crate) fn smallest_eigenvalue(cov: &[Vec<f64>]) -> f64 {
    let n = cov.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return cov[0][0];
    }

    let mut gershgorin_bound = 0.0_f64;
    for (i, row) in cov.iter().enumerate() {
        let radius: f64 = row
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, v)| v.abs())
            .sum();
        gershgorin_bound = gershgorin_bound.max(row[i].abs() + radius);
    }
    let shift = gershgorin_bound + 1.0;

    let mut v = vec![1.0 / (n as f64).sqrt(); n];
    for _ in 0..200 {
        let cov_v = mat_vec_mul(cov, &v);
        let shifted: Vec<f64> = cov_v.iter().zip(&v).map(|(cv, vi)| shift * vi - cv).collect();
        let norm = shifted.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm < 1e-15 {
            break;
        }
        let next: Vec<f64> = shifted.iter().map(|x| x / norm).collect();
        let delta = squared_distance(&next, &v);
        v = next;
        if delta < 1e-20 {
            break;
        }
    }

    let cov_v = mat_vec_mul(cov, &v);
    dot(&v, &cov_v) / dot(&v, &v).max(1e-12)
}

/// Zero out Σ's off-diagonal entries, leaving only asset-wise variances.
pub(crate) fn diagonal_only(cov: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = cov.len();
    let mut out = vec![vec![0.0; n]; n];
    for (i, row) in cov.iter().enumerate() {
        out[i][i] = row[i];
    }
    out
}
