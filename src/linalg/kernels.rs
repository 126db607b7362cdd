//! Elementary tile kernels: copies, additions, triangle updates and Hermitian helpers.

use crate::{assert, ComplexField, Conj, MatMut, MatRef, Parallelism};
use faer::linalg::triangular_solve::{
    solve_unit_lower_triangular_in_place, solve_unit_lower_triangular_in_place_with_conj,
};
use reborrow::*;

/// Copies the lower triangular half of `src` (diagonal included) into `dst`.
#[track_caller]
pub fn copy_lower<E: ComplexField>(mut dst: MatMut<'_, E>, src: MatRef<'_, E>) {
    assert!(all(dst.nrows() == src.nrows(), dst.ncols() == src.ncols()));
    for j in 0..dst.ncols() {
        for i in j..dst.nrows() {
            dst.write(i, j, src.read(i, j));
        }
    }
}

/// Copies the upper triangular half of `src` (diagonal included) into `dst`.
#[track_caller]
pub fn copy_upper<E: ComplexField>(dst: MatMut<'_, E>, src: MatRef<'_, E>) {
    copy_lower(dst.transpose_mut(), src.transpose())
}

/// Sets the strictly upper triangular half of `dst` to `offdiag`, and its diagonal to `diag`.
pub fn set_upper<E: ComplexField>(mut dst: MatMut<'_, E>, offdiag: E, diag: E) {
    for j in 0..dst.ncols() {
        for i in 0..Ord::min(j, dst.nrows()) {
            dst.write(i, j, offdiag);
        }
        if j < dst.nrows() {
            dst.write(j, j, diag);
        }
    }
}

/// Sets the strictly lower triangular half of `dst` to zero.
pub fn zero_strictly_lower<E: ComplexField>(mut dst: MatMut<'_, E>) {
    for j in 0..dst.ncols() {
        for i in j + 1..dst.nrows() {
            dst.write(i, j, E::faer_zero());
        }
    }
}

/// Computes `dst += src`.
#[track_caller]
#[inline]
pub fn add_in_place<E: ComplexField>(mut dst: MatMut<'_, E>, src: MatRef<'_, E>) {
    dst += src;
}

/// Writes the adjoint of `src` into `dst`.
#[track_caller]
#[inline]
pub fn adjoint_into<E: ComplexField>(mut dst: MatMut<'_, E>, src: MatRef<'_, E>) {
    dst.copy_from(src.adjoint());
}

/// Completes a Hermitian matrix from its lower triangular half: the strictly upper half is
/// overwritten with the conjugate of the strictly lower half, and the imaginary part of the
/// diagonal is discarded.
#[track_caller]
pub fn mirror_lower<E: ComplexField>(mut mat: MatMut<'_, E>) {
    assert!(mat.nrows() == mat.ncols());
    let n = mat.nrows();
    for j in 0..n {
        let d = mat.read(j, j).faer_real();
        mat.write(j, j, E::faer_from_real(d));
        for i in j + 1..n {
            let v = mat.read(i, j).faer_conj();
            mat.write(j, i, v);
        }
    }
}

/// Completes a Hermitian matrix from its upper triangular half.
#[track_caller]
pub fn mirror_upper<E: ComplexField>(mat: MatMut<'_, E>) {
    mirror_lower(mat.transpose_mut())
}

/// Computes `rhs ← rhs·L⁻ᴴ`, where `L` is the unit lower triangular matrix stored in the
/// strictly lower half of `tril`.
///
/// Solved as `conj(L)·Xᵀ = rhsᵀ`.
#[track_caller]
pub fn solve_unit_lower_adjoint_on_the_right_in_place<E: ComplexField>(
    tril: MatRef<'_, E>,
    rhs: MatMut<'_, E>,
    parallelism: Parallelism,
) {
    assert!(all(tril.nrows() == tril.ncols(), rhs.ncols() == tril.nrows()));
    solve_unit_lower_triangular_in_place_with_conj(
        tril,
        Conj::Yes,
        rhs.transpose_mut(),
        parallelism,
    );
}

/// Computes `mat ← L⁻¹·mat·L⁻ᴴ` where `L` is the unit lower triangular matrix stored in the
/// strictly lower half of `tril`.
///
/// `mat` must be Hermitian and fully stored. The result is Hermitian in exact arithmetic; callers
/// that need it exactly Hermitian should follow up with [`mirror_lower`].
#[track_caller]
pub fn hermitian_congruence_in_place<E: ComplexField>(
    mut mat: MatMut<'_, E>,
    tril: MatRef<'_, E>,
    parallelism: Parallelism,
) {
    assert!(all(
        mat.nrows() == mat.ncols(),
        tril.nrows() == tril.ncols(),
        mat.nrows() == tril.nrows(),
    ));
    solve_unit_lower_triangular_in_place(tril, mat.rb_mut(), parallelism);
    solve_unit_lower_adjoint_on_the_right_in_place(tril, mat.rb_mut(), parallelism);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert;
    use crate::{c64, Mat};
    use assert_approx_eq::assert_approx_eq;
    use faer::linalg::matmul::{matmul, matmul_with_conj};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn triangle_copies() {
        let src = Mat::<f64>::from_fn(3, 3, |i, j| (1 + i + 3 * j) as f64);
        let mut lower = Mat::<f64>::zeros(3, 3);
        let mut upper = Mat::<f64>::zeros(3, 3);
        copy_lower(lower.as_mut(), src.as_ref());
        copy_upper(upper.as_mut(), src.as_ref());
        for j in 0..3 {
            for i in 0..3 {
                assert_eq!(lower.read(i, j), if i >= j { src.read(i, j) } else { 0.0 });
                assert_eq!(upper.read(i, j), if i <= j { src.read(i, j) } else { 0.0 });
            }
        }
    }

    #[test]
    fn set_and_zero_rectangular() {
        let mut a = Mat::<f64>::from_fn(3, 2, |_, _| 9.0);
        set_upper(a.as_mut(), 0.0, 1.0);
        assert_eq!(a.read(0, 0), 1.0);
        assert_eq!(a.read(1, 1), 1.0);
        assert_eq!(a.read(0, 1), 0.0);
        assert_eq!(a.read(2, 0), 9.0);
        assert_eq!(a.read(2, 1), 9.0);

        let mut b = Mat::<f64>::from_fn(2, 3, |_, _| 9.0);
        set_upper(b.as_mut(), 0.0, 1.0);
        assert_eq!(b.read(0, 2), 0.0);
        assert_eq!(b.read(1, 2), 0.0);
        assert_eq!(b.read(1, 0), 9.0);

        zero_strictly_lower(a.as_mut());
        assert_eq!(a.read(2, 0), 0.0);
        assert_eq!(a.read(1, 0), 0.0);
        assert_eq!(a.read(1, 1), 1.0);
    }

    #[test]
    fn mirror() {
        let mut a = Mat::<c64>::from_fn(3, 3, |i, j| c64::new(i as f64, (j + 1) as f64));
        mirror_lower(a.as_mut());
        for j in 0..3 {
            assert_eq!(a.read(j, j).im, 0.0);
            for i in 0..3 {
                assert_eq!(a.read(i, j), a.read(j, i).conj());
            }
        }
        assert_eq!(a.read(2, 0), c64::new(2.0, 1.0));
        assert_eq!(a.read(0, 2), c64::new(2.0, -1.0));

        let mut b = Mat::<c64>::from_fn(3, 3, |i, j| c64::new(i as f64, (j + 1) as f64));
        mirror_upper(b.as_mut());
        assert_eq!(b.read(0, 2), c64::new(0.0, 3.0));
        assert_eq!(b.read(2, 0), c64::new(0.0, -3.0));
    }

    #[test]
    fn add_and_adjoint() {
        let a = Mat::<c64>::from_fn(2, 3, |i, j| c64::new(i as f64, j as f64));
        let mut b = Mat::<c64>::from_fn(2, 3, |_, _| c64::new(1.0, 1.0));
        add_in_place(b.as_mut(), a.as_ref());
        assert_eq!(b.read(1, 2), c64::new(2.0, 3.0));

        let mut adj = Mat::<c64>::zeros(3, 2);
        adjoint_into(adj.as_mut(), a.as_ref());
        assert_eq!(adj.read(2, 1), c64::new(1.0, -2.0));
    }

    fn random_unit_lower(rng: &mut StdRng, n: usize) -> Mat<c64> {
        Mat::from_fn(n, n, |i, j| {
            if i == j {
                c64::new(1.0, 0.0)
            } else if i > j {
                c64::new(rng.gen::<f64>() - 0.5, rng.gen::<f64>() - 0.5)
            } else {
                c64::new(0.0, 0.0)
            }
        })
    }

    #[test]
    fn adjoint_solve_on_the_right() {
        let rng = &mut StdRng::seed_from_u64(2);
        let (m, n) = (3, 6);
        let l = random_unit_lower(rng, n);
        let b = Mat::<c64>::from_fn(m, n, |_, _| c64::new(rng.gen(), rng.gen()));

        // the strictly upper half is never read
        let mut tril = l.clone();
        for j in 0..n {
            for i in 0..j {
                tril.write(i, j, c64::new(f64::NAN, f64::NAN));
            }
        }

        let mut x = b.clone();
        solve_unit_lower_adjoint_on_the_right_in_place(tril.as_ref(), x.as_mut(), Parallelism::None);

        let mut prod = Mat::<c64>::zeros(m, n);
        matmul(
            prod.as_mut(),
            x.as_ref(),
            l.adjoint(),
            None,
            c64::new(1.0, 0.0),
            Parallelism::None,
        );
        for j in 0..n {
            for i in 0..m {
                assert_approx_eq!(prod.read(i, j).re, b.read(i, j).re);
                assert_approx_eq!(prod.read(i, j).im, b.read(i, j).im);
            }
        }
    }

    #[test]
    fn congruence() {
        let rng = &mut StdRng::seed_from_u64(3);
        let n = 5;
        let l = random_unit_lower(rng, n);
        let mut t = Mat::<c64>::from_fn(n, n, |_, _| c64::new(rng.gen(), rng.gen()));
        mirror_lower(t.as_mut());

        // a = l·t·lᴴ
        let mut lt = Mat::<c64>::zeros(n, n);
        let one = c64::new(1.0, 0.0);
        matmul_with_conj(lt.as_mut(), l.as_ref(), Conj::No, t.as_ref(), Conj::No, None, one, Parallelism::None);
        let mut a = Mat::<c64>::zeros(n, n);
        matmul_with_conj(
            a.as_mut(),
            lt.as_ref(),
            Conj::No,
            l.as_ref().transpose(),
            Conj::Yes,
            None,
            one,
            Parallelism::None,
        );

        hermitian_congruence_in_place(a.as_mut(), l.as_ref(), Parallelism::None);
        mirror_lower(a.as_mut());
        for j in 0..n {
            for i in 0..n {
                assert_approx_eq!(a.read(i, j).re, t.read(i, j).re);
                assert_approx_eq!(a.read(i, j).im, t.read(i, j).im);
            }
        }
    }
}
