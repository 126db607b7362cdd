//! LU factorization with partial pivoting of a tall panel, computed cooperatively by a group of
//! threads.
//!
//! The rows of the panel are split into contiguous stripes, one per thread. The factorization is
//! recursive over the columns; the threads synchronize at a barrier between phases:
//!
//! ```text
//!         c0    mid     c1
//!        ┌───────┬───────┐
//!   c0   │ A11   │ A12   │   1. factor [A11; A21] recursively
//!        │       │       │   2. A12 ← L11⁻¹·A12          (first thread)
//!   mid  ├───────┼───────┤   3. A22 -= A21·A12           (each thread on its own rows)
//!        │ A21   │ A22   │   4. factor A22 recursively
//!        │       │       │
//!        └───────┴───────┘
//! ```
//!
//! A single column is factored by a search for the pivot in each stripe, a reduction of the
//! per-stripe candidates by the first thread (which also swaps the pivot row into place), and a
//! scaling of each stripe by the inverse of the pivot. The pivot is the entry with the largest
//! score, ties being broken in favor of the smallest row index, so the factors do not depend on
//! the number of threads.

use crate::{assert, ComplexField, MatMut, MatRef, Parallelism};
use core::{cell::UnsafeCell, ops::Range};
use faer::linalg::{matmul::matmul, triangular_solve::solve_unit_lower_triangular_in_place};
use reborrow::*;
use std::sync::Barrier;

struct Candidate<R>(UnsafeCell<Option<(R, usize)>>);

// SAFETY: a candidate is written by its owning thread before a barrier and read by the leading
// thread after it.
unsafe impl<R: Send> Sync for Candidate<R> {}

struct Group<'a, E: ComplexField> {
    panel: MatRef<'a, E>,
    barrier: Barrier,
    size: usize,
    candidates: Box<[Candidate<E::Real>]>,
}

struct Lead<'a> {
    pivots: &'a mut [usize],
    first_zero: Option<usize>,
}

impl<E: ComplexField> Group<'_, E> {
    /// Rows owned by `rank`, restricted to `start..`.
    #[inline]
    fn stripe(&self, rank: usize, start: usize) -> Range<usize> {
        let m = self.panel.nrows();
        let chunk = (m + self.size - 1) / self.size;
        let lo = Ord::max(rank * chunk, start);
        let hi = Ord::min((rank + 1) * chunk, m);
        lo..Ord::max(lo, hi)
    }

    /// # Safety
    /// The caller must only write to elements that no other thread accesses during the current
    /// phase.
    #[inline]
    unsafe fn panel_mut(&self) -> MatMut<'_, E> {
        self.panel.const_cast()
    }
}

fn factor_column<E: ComplexField>(
    group: &Group<'_, E>,
    rank: usize,
    lead: Option<&mut Lead<'_>>,
    j: usize,
) {
    let panel = group.panel;
    let ncols = panel.ncols();

    let mut best: Option<(E::Real, usize)> = None;
    for i in group.stripe(rank, j) {
        let score = panel.read(i, j).faer_score();
        match best {
            Some((max, _)) if !(score > max) => {}
            _ => best = Some((score, i)),
        }
    }
    // SAFETY: each thread writes its own candidate before the barrier.
    unsafe { *group.candidates[rank].0.get() = best };
    group.barrier.wait();

    if let Some(lead) = lead {
        let mut pick = (E::Real::faer_zero(), j);
        let mut found = false;
        for candidate in group.candidates.iter() {
            // SAFETY: every thread is waiting at the next barrier.
            if let Some((score, i)) = unsafe { *candidate.0.get() } {
                if !found || score > pick.0 {
                    pick = (score, i);
                    found = true;
                }
            }
        }

        let (score, p) = pick;
        lead.pivots[j] = p;
        if score == E::Real::faer_zero() && lead.first_zero.is_none() {
            lead.first_zero = Some(j);
        }
        if p != j {
            // SAFETY: the other threads are waiting at the next barrier.
            let mut panel = unsafe { group.panel_mut() };
            for c in 0..ncols {
                let a = panel.read(j, c);
                let b = panel.read(p, c);
                panel.write(j, c, b);
                panel.write(p, c, a);
            }
        }
    }
    group.barrier.wait();

    let pivot = panel.read(j, j);
    if pivot != E::faer_zero() {
        let inv = pivot.faer_inv();
        // SAFETY: each thread writes its own rows of column `j`, below the pivot.
        let mut panel = unsafe { group.panel_mut() };
        for i in group.stripe(rank, j + 1) {
            let v = panel.read(i, j);
            panel.write(i, j, v.faer_mul(inv));
        }
    }
    group.barrier.wait();
}

fn factor_recursive<E: ComplexField>(
    group: &Group<'_, E>,
    rank: usize,
    mut lead: Option<&mut Lead<'_>>,
    col_start: usize,
    col_end: usize,
) {
    let n = col_end - col_start;
    if n == 1 {
        factor_column(group, rank, lead, col_start);
        return;
    }

    let mid = col_start + n / 2;
    let (bs, rest) = (mid - col_start, col_end - mid);
    factor_recursive(group, rank, lead.as_deref_mut(), col_start, mid);

    let panel = group.panel;
    if lead.is_some() {
        // SAFETY: only the leading thread writes during this phase, and the rows it writes are
        // not read by anyone else.
        let a12 = unsafe { group.panel_mut() }.submatrix_mut(col_start, mid, bs, rest);
        let l11 = panel.submatrix(col_start, col_start, bs, bs);
        solve_unit_lower_triangular_in_place(l11, a12, Parallelism::None);
    }
    group.barrier.wait();

    let rows = group.stripe(rank, mid);
    if !rows.is_empty() {
        let a21 = panel.submatrix(rows.start, col_start, rows.len(), bs);
        let a12 = panel.submatrix(col_start, mid, bs, rest);
        // SAFETY: each thread writes its own rows of `A22`, and `A21`, `A12` are only read.
        let a22 = unsafe { group.panel_mut() }.submatrix_mut(rows.start, mid, rows.len(), rest);
        matmul(
            a22,
            a21,
            a12,
            Some(E::faer_one()),
            E::faer_one().faer_neg(),
            Parallelism::None,
        );
    }
    group.barrier.wait();

    factor_recursive(group, rank, lead, mid, col_end);
}

/// Computes the LU factorization with partial pivoting of `panel` in place, using `group_size`
/// cooperating threads.
///
/// The factorization is such that $PA = LU$, where $L$ is unit lower trapezoidal and stored in
/// the strictly lower part of `panel`, and $U$ is upper trapezoidal and stored in the upper part
/// of `panel`. `pivots[j]` is the row that was swapped with row `j` at step `j`, so that
/// `pivots[j] ≥ j`.
///
/// An exactly zero pivot does not stop the factorization: its column is left unscaled, and the
/// index of the first such column is returned.
///
/// # Panics
/// Panics if `pivots.len() != min(panel.nrows(), panel.ncols())`.
#[track_caller]
pub fn lu_in_place<E: ComplexField>(
    panel: MatMut<'_, E>,
    pivots: &mut [usize],
    group_size: usize,
) -> Option<usize> {
    let mut panel = panel;
    let m = panel.nrows();
    let n = panel.ncols();
    let size = Ord::min(m, n);
    assert!(pivots.len() == size);
    if size == 0 {
        return None;
    }

    let group_size = group_size.clamp(1, m);
    let mut lead = Lead {
        pivots,
        first_zero: None,
    };

    {
        let group = Group {
            panel: panel.rb().submatrix(0, 0, m, size),
            barrier: Barrier::new(group_size),
            size: group_size,
            candidates: (0..group_size)
                .map(|_| Candidate(UnsafeCell::new(None)))
                .collect(),
        };
        let group = &group;

        if group_size == 1 {
            factor_recursive(group, 0, Some(&mut lead), 0, size);
        } else {
            std::thread::scope(|s| {
                for rank in 1..group_size {
                    s.spawn(move || factor_recursive(group, rank, None, 0, size));
                }
                factor_recursive(group, 0, Some(&mut lead), 0, size);
            });
        }
    }

    if n > size {
        // the row interchanges were only applied to the leading columns
        for j in 0..size {
            let p = lead.pivots[j];
            if p != j {
                for c in size..n {
                    let a = panel.read(j, c);
                    let b = panel.read(p, c);
                    panel.write(j, c, b);
                    panel.write(p, c, a);
                }
            }
        }
        let (l11, u12, _, _) = panel.rb_mut().split_at_mut(size, size);
        solve_unit_lower_triangular_in_place(l11.into_const(), u12, Parallelism::None);
    }

    lead.first_zero
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert;
    use crate::{c64, Mat};
    use assert_approx_eq::assert_approx_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn unpack(lu: &Mat<c64>) -> (Mat<c64>, Mat<c64>) {
        let (m, n) = (lu.nrows(), lu.ncols());
        let size = m.min(n);
        let l = Mat::from_fn(m, size, |i, j| {
            if i == j {
                c64::new(1.0, 0.0)
            } else if i > j {
                lu.read(i, j)
            } else {
                c64::new(0.0, 0.0)
            }
        });
        let u = Mat::from_fn(size, n, |i, j| {
            if i <= j {
                lu.read(i, j)
            } else {
                c64::new(0.0, 0.0)
            }
        });
        (l, u)
    }

    fn permuted(a: &Mat<c64>, pivots: &[usize]) -> Mat<c64> {
        let mut a = a.clone();
        for (j, &p) in pivots.iter().enumerate() {
            for c in 0..a.ncols() {
                let x = a.read(j, c);
                let y = a.read(p, c);
                a.write(j, c, y);
                a.write(p, c, x);
            }
        }
        a
    }

    #[test]
    fn test_lu() {
        let rng = &mut StdRng::seed_from_u64(4);
        for (m, n) in [(1, 1), (7, 1), (8, 3), (25, 8), (40, 16), (5, 8)] {
            let a = Mat::<c64>::from_fn(m, n, |_, _| c64::new(rng.gen(), rng.gen()));
            let mut reference = None;
            for group_size in [1, 2, 3, 8] {
                let mut lu = a.clone();
                let mut pivots = vec![0usize; m.min(n)];
                let zero = lu_in_place(lu.as_mut(), &mut pivots, group_size);
                assert!(zero.is_none());
                for (j, &p) in pivots.iter().enumerate() {
                    assert!(p >= j && p < m);
                }

                let (l, u) = unpack(&lu);
                let mut prod = Mat::<c64>::zeros(m, n);
                matmul(prod.as_mut(), l.as_ref(), u.as_ref(), None, c64::new(1.0, 0.0), Parallelism::None);
                let pa = permuted(&a, &pivots);
                for j in 0..n {
                    for i in 0..m {
                        assert_approx_eq!(prod.read(i, j).re, pa.read(i, j).re);
                        assert_approx_eq!(prod.read(i, j).im, pa.read(i, j).im);
                    }
                }
                for j in 0..m.min(n) {
                    for i in j + 1..m {
                        assert!(l.read(i, j).norm_sqr() <= 2.0 + 1e-12);
                    }
                }

                match &reference {
                    None => reference = Some((lu, pivots)),
                    Some((ref_lu, ref_pivots)) => {
                        assert_eq!(&pivots, ref_pivots);
                        for j in 0..n {
                            for i in 0..m {
                                assert_eq!(lu.read(i, j), ref_lu.read(i, j));
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn ties_pick_the_first_row() {
        let a = Mat::<f64>::from_fn(6, 2, |i, j| if j == 0 { [1.0, -3.0, 2.0, 3.0, -3.0, 0.5][i] } else { i as f64 });
        for group_size in [1, 2, 3, 6] {
            let mut lu = a.clone();
            let mut pivots = vec![0usize; 2];
            lu_in_place(lu.as_mut(), &mut pivots, group_size);
            assert_eq!(pivots[0], 1);
        }
    }

    #[test]
    fn zero_pivot() {
        // second column is a multiple of the first one
        let a = Mat::<f64>::from_fn(6, 3, |i, j| match j {
            0 => (i + 1) as f64,
            1 => 2.0 * (i + 1) as f64,
            _ => ((i * i) % 5) as f64,
        });
        for group_size in [1, 2, 4] {
            let mut lu = a.clone();
            let mut pivots = vec![0usize; 3];
            let zero = lu_in_place(lu.as_mut(), &mut pivots, group_size);
            assert_eq!(zero, Some(1));
            for i in 2..6 {
                assert!(lu.read(i, 1).is_finite());
            }
        }
    }

    #[test]
    fn empty() {
        let mut a = Mat::<f64>::zeros(0, 3);
        assert_eq!(lu_in_place(a.as_mut(), &mut [], 4), None);
    }
}
