//! Dense expansion of the factors, for checking and for callers that need them explicitly.

use crate::{
    assert,
    tile::{live_dim, BandMatrix, TileMatrix},
    ComplexField, Mat, MatRef, Parallelism, Side,
};
use faer::linalg::matmul::matmul;

/// Converts the transpositions `ipiv` into a permutation and its inverse.
///
/// `perm[i]` is the row of $A$ that ends up in row `i` of $P^\top A P$.
///
/// # Panics
/// Panics if an entry of `ipiv` is out of bounds.
#[track_caller]
pub fn permutation(ipiv: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let n = ipiv.len();
    let mut perm: Vec<usize> = (0..n).collect();
    for (i, &p) in ipiv.iter().enumerate() {
        assert!(p < n);
        perm.swap(i, p);
    }
    let mut perm_inv = vec![0usize; n];
    for (i, &p) in perm.iter().enumerate() {
        perm_inv[p] = i;
    }
    (perm, perm_inv)
}

/// Returns $P^\top A P$, i.e. the matrix whose entry `(i, j)` is `a[perm[i], perm[j]]`.
#[track_caller]
pub fn permute_symmetric<E: ComplexField>(a: MatRef<'_, E>, perm: &[usize]) -> Mat<E> {
    let n = perm.len();
    assert!(all(a.nrows() == n, a.ncols() == n));
    Mat::from_fn(n, n, |i, j| a.read(perm[i], perm[j]))
}

/// Expands the unit lower triangular factor $L$ stored in `a` by the factorization.
///
/// With [`Side::Upper`], the factor is read from the upper tiles, as $U^H$.
pub fn dense_l<E: ComplexField>(side: Side, a: &TileMatrix<E>) -> Mat<E> {
    let n = a.dim();
    let nb = a.block_size();
    let mt = a.tile_count();
    let mut l = Mat::identity(n, n);

    for c in 1..mt {
        let cols = live_dim(n, nb, c);
        for r in c..mt {
            let rows = live_dim(n, nb, r);
            let block = match side {
                Side::Lower => a
                    .tile(r, c - 1)
                    .as_ref()
                    .submatrix(0, 0, rows, cols)
                    .to_owned(),
                Side::Upper => a
                    .tile(c - 1, r)
                    .as_ref()
                    .submatrix(0, 0, cols, rows)
                    .adjoint()
                    .to_owned(),
            };
            for j in 0..cols {
                let start = if r == c { j + 1 } else { 0 };
                for i in start..rows {
                    l.write(r * nb + i, c * nb + j, block.read(i, j));
                }
            }
        }
    }
    l
}

/// Expands the block tridiagonal factor $T$.
#[inline]
pub fn dense_t<E: ComplexField>(t: &BandMatrix<E>) -> Mat<E> {
    t.to_dense()
}

/// Returns $L T L^H$ computed from the outputs of the factorization, which equals
/// $P^\top A P$ up to rounding errors.
pub fn reconstruct<E: ComplexField>(side: Side, a: &TileMatrix<E>, t: &BandMatrix<E>) -> Mat<E> {
    let n = a.dim();
    let l = dense_l(side, a);
    let t = dense_t(t);

    let mut lt = Mat::zeros(n, n);
    matmul(
        lt.as_mut(),
        l.as_ref(),
        t.as_ref(),
        None,
        E::faer_one(),
        Parallelism::None,
    );
    let mut out = Mat::zeros(n, n);
    matmul(
        out.as_mut(),
        lt.as_ref(),
        l.adjoint(),
        None,
        E::faer_one(),
        Parallelism::None,
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert;
    use crate::c64;

    #[test]
    fn permutation_from_transpositions() {
        let (perm, perm_inv) = permutation(&[0, 1, 4, 3, 4]);
        assert_eq!(perm, vec![0, 1, 4, 3, 2]);
        assert_eq!(perm_inv, vec![0, 1, 4, 3, 2]);

        let (perm, perm_inv) = permutation(&[2, 2, 3, 3]);
        assert_eq!(perm, vec![2, 0, 3, 1]);
        for i in 0..4 {
            assert_eq!(perm_inv[perm[i]], i);
        }
    }

    #[test]
    fn permute() {
        let a = Mat::<f64>::from_fn(3, 3, |i, j| (10 * i + j) as f64);
        let b = permute_symmetric(a.as_ref(), &[2, 0, 1]);
        assert_eq!(b.read(0, 0), 22.0);
        assert_eq!(b.read(0, 1), 20.0);
        assert_eq!(b.read(2, 0), 12.0);
    }

    #[test]
    fn unit_lower_from_tiles() {
        let (n, nb) = (5, 2);
        let dense = Mat::<c64>::from_fn(n, n, |i, j| c64::new(1.0 + i as f64, j as f64));
        let a = TileMatrix::from_dense(dense.as_ref(), nb);
        let l = dense_l(Side::Lower, &a);

        for j in 0..n {
            assert_eq!(l.read(j, j), c64::new(1.0, 0.0));
            for i in 0..j {
                assert_eq!(l.read(i, j), c64::new(0.0, 0.0));
            }
        }
        // first block column is the identity
        for i in 1..n {
            assert_eq!(l.read(i, 0), c64::new(0.0, 0.0));
        }
        for i in 2..n {
            assert_eq!(l.read(i, 1), c64::new(0.0, 0.0));
        }
        // L(m, n) is read from A(m, n - 1)
        assert_eq!(l.read(3, 2), dense.read(3, 0));
        assert_eq!(l.read(4, 2), dense.read(4, 0));
        assert_eq!(l.read(4, 3), dense.read(4, 1));

        let upper = TileMatrix::from_dense(dense.adjoint().to_owned().as_ref(), nb);
        let u = dense_l(Side::Upper, &upper);
        assert!(u == l);
    }

    #[test]
    fn reconstruct_identity_factor() {
        let (n, nb) = (4, 2);
        let a = TileMatrix::<f64>::zeros(n, nb);
        let t = BandMatrix::<f64>::zeros(n, nb);
        t.diag_mut(0).write(0, 0, 2.0);
        t.diag_mut(1).write(1, 1, -3.0);
        t.sub_mut(0).write(0, 1, 1.5);
        t.sup_mut(0).write(1, 0, 1.5);

        let out = reconstruct(Side::Lower, &a, &t);
        assert_eq!(out.read(0, 0), 2.0);
        assert_eq!(out.read(3, 3), -3.0);
        assert_eq!(out.read(2, 1), 1.5);
        assert_eq!(out.read(1, 2), 1.5);
        assert_eq!(out.read(1, 1), 0.0);
    }
}
